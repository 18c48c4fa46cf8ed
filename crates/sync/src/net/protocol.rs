use rkyv::rancor;
use rkyv::util::AlignedVec;
use serde::{Deserialize, Serialize};

use crate::state::{Category, CollectionDelta, Meta};

pub const DEFAULT_TICK_RATE: u32 = 20;

/// One tick of changes from the host to a client.
///
/// Missing categories or meta mean "no change this tick". `tick` and
/// `timestamp` are as-of metadata and are never accumulated. Packets for a
/// session must be applied in non-decreasing tick order; see
/// `SequencedAccumulator` for a gate that drops stale ones.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct DeltaPacket {
    pub tick: u32,
    /// Epoch millis at send time.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "CollectionDelta::is_empty")]
    pub players: CollectionDelta,
    #[serde(default, skip_serializing_if = "CollectionDelta::is_empty")]
    pub enemies: CollectionDelta,
    #[serde(default, skip_serializing_if = "CollectionDelta::is_empty")]
    pub projectiles: CollectionDelta,
    #[serde(default, skip_serializing_if = "CollectionDelta::is_empty")]
    pub walls: CollectionDelta,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("malformed json packet: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{category} entry keyed {key:?} carries id {id:?}")]
    IdMismatch {
        category: Category,
        key: String,
        id: String,
    },
    #[error("{category} entry {id:?} uses reserved field name {field:?}")]
    ReservedField {
        category: Category,
        id: String,
        field: String,
    },
    #[error("{category} entry {id:?} has non-finite {field:?}")]
    NonFinite {
        category: Category,
        id: String,
        field: String,
    },
    #[error("meta value {key:?} is not finite")]
    NonFiniteMeta { key: String },
}

impl DeltaPacket {
    pub fn new(tick: u32, timestamp: u64) -> Self {
        Self {
            tick,
            timestamp,
            ..Default::default()
        }
    }

    pub fn collection(&self, category: Category) -> &CollectionDelta {
        match category {
            Category::Players => &self.players,
            Category::Enemies => &self.enemies,
            Category::Projectiles => &self.projectiles,
            Category::Walls => &self.walls,
        }
    }

    pub fn collection_mut(&mut self, category: Category) -> &mut CollectionDelta {
        match category {
            Category::Players => &mut self.players,
            Category::Enemies => &mut self.enemies,
            Category::Projectiles => &mut self.projectiles,
            Category::Walls => &mut self.walls,
        }
    }

    /// True when the packet carries only its tick envelope.
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
            && Category::ALL
                .iter()
                .all(|&category| self.collection(category).is_empty())
    }

    pub fn entry_count(&self) -> usize {
        Category::ALL
            .iter()
            .map(|&category| self.collection(category).len())
            .sum()
    }

    /// Boundary check for packets from the transport. Entries without an id
    /// take the id of their key; entries whose id disagrees with their key are
    /// rejected, as is anything `check_values` refuses.
    pub fn validate(&mut self) -> Result<(), PacketError> {
        for category in Category::ALL {
            for (key, change) in self.collection_mut(category).iter_mut() {
                let Some(change) = change else {
                    continue;
                };
                if change.id.is_empty() {
                    change.id.clone_from(key);
                } else if change.id != *key {
                    return Err(PacketError::IdMismatch {
                        category,
                        key: key.clone(),
                        id: change.id.clone(),
                    });
                }
            }
        }
        self.check_values()
    }

    /// Rejects what only one of the two codecs could carry: type-specific
    /// fields named like a built-in field, and NaN or infinite numbers. Both
    /// `encode` and `to_json` run this, so they fail on the same packets.
    pub fn check_values(&self) -> Result<(), PacketError> {
        for category in Category::ALL {
            for change in self.collection(category).values().flatten() {
                if let Some(field) = change.reserved_field() {
                    return Err(PacketError::ReservedField {
                        category,
                        id: change.id.clone(),
                        field: field.to_string(),
                    });
                }
                if let Some(field) = change.non_finite_field() {
                    return Err(PacketError::NonFinite {
                        category,
                        id: change.id.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        match self.meta.iter().find(|(_, value)| !value.is_finite()) {
            Some((key, _)) => Err(PacketError::NonFiniteMeta { key: key.clone() }),
            None => Ok(()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        self.check_values()?;
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        let mut packet = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(PacketError::Deserialize)?;
        packet.validate()?;
        Ok(packet)
    }

    pub fn to_json(&self) -> Result<String, PacketError> {
        self.check_values()?;
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PacketError> {
        let mut packet: Self = serde_json::from_str(json)?;
        packet.validate()?;
        Ok(packet)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, PacketError> {
        let mut packet: Self = serde_json::from_value(value)?;
        packet.validate()?;
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EntityDelta, EntityState, FieldValue};

    fn sample() -> DeltaPacket {
        let mut packet = DeltaPacket::new(7, 1_700_000_000_000);
        packet.players.insert(
            "p1".into(),
            Some(EntityDelta::from(
                EntityState::new("p1", "player", 100.0, 200.0).with_field("health", 100),
            )),
        );
        packet.enemies.insert("e9".into(), None);
        packet.meta.insert("score".into(), FieldValue::Int(12));
        packet
    }

    #[test]
    fn binary_codec_preserves_packet() {
        let packet = sample();
        let bytes = packet.encode().unwrap();
        let decoded = DeltaPacket::decode(&bytes).unwrap();

        assert_eq!(decoded, packet);
    }

    #[test]
    fn json_codec_preserves_packet() {
        let packet = sample();
        let decoded = DeltaPacket::from_json(&packet.to_json().unwrap()).unwrap();

        assert_eq!(decoded, packet);
    }

    #[test]
    fn json_omits_empty_categories() {
        let json = DeltaPacket::new(1, 5).to_json().unwrap();
        assert_eq!(json, r#"{"tick":1,"timestamp":5}"#);
    }

    #[test]
    fn json_null_is_removal() {
        let packet =
            DeltaPacket::from_json(r#"{"tick":3,"timestamp":9,"players":{"p1":null}}"#).unwrap();
        assert_eq!(packet.players.get("p1"), Some(&None));
        assert!(packet.enemies.is_empty());
    }

    #[test]
    fn missing_entry_id_comes_from_key() {
        let packet =
            DeltaPacket::from_json(r#"{"tick":1,"timestamp":0,"walls":{"w3":{"x":4}}}"#).unwrap();
        assert_eq!(packet.walls["w3"].as_ref().unwrap().id, "w3");
    }

    #[test]
    fn mismatched_entry_id_is_rejected() {
        let err = DeltaPacket::from_json(
            r#"{"tick":1,"timestamp":0,"enemies":{"e1":{"id":"e2","x":4}}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PacketError::IdMismatch {
                category: Category::Enemies,
                ..
            }
        ));
    }

    #[test]
    fn nested_field_values_are_rejected() {
        let result = DeltaPacket::from_json(
            r#"{"tick":1,"timestamp":0,"players":{"p1":{"id":"p1","loadout":{"gun":1}}}}"#,
        );
        assert!(matches!(result, Err(PacketError::Json(_))));
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let packet =
            DeltaPacket::from_json(r#"{"tick":2,"timestamp":0,"debug":{"fps":60}}"#).unwrap();
        assert!(packet.is_empty());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(DeltaPacket::decode(&[1, 2, 3]).is_err());
    }

    fn with_player(state: EntityState) -> DeltaPacket {
        let mut packet = DeltaPacket::new(4, 0);
        packet
            .players
            .insert(state.id.clone(), Some(EntityDelta::from(state)));
        packet
    }

    #[test]
    fn reserved_field_names_fail_both_codecs() {
        let packet = with_player(EntityState::new("p1", "player", 1.0, 1.0).with_field("x", 99));

        assert!(matches!(
            packet.encode(),
            Err(PacketError::ReservedField { category: Category::Players, ref field, .. }) if field == "x"
        ));
        assert!(matches!(packet.to_json(), Err(PacketError::ReservedField { .. })));
        assert!(matches!(
            packet.clone().validate(),
            Err(PacketError::ReservedField { .. })
        ));
    }

    #[test]
    fn non_finite_numbers_fail_both_codecs() {
        let position = with_player(EntityState::new("p1", "player", f64::NAN, 1.0));
        assert!(matches!(position.encode(), Err(PacketError::NonFinite { ref field, .. }) if field == "x"));
        assert!(matches!(position.to_json(), Err(PacketError::NonFinite { .. })));

        let field = with_player(EntityState::new("p1", "player", 1.0, 1.0).with_field("rot", f64::NAN));
        assert!(matches!(field.encode(), Err(PacketError::NonFinite { ref field, .. }) if field == "rot"));
        assert!(matches!(field.to_json(), Err(PacketError::NonFinite { .. })));

        let mut meta = DeltaPacket::new(1, 0);
        meta.meta.insert("ratio".into(), FieldValue::Float(f64::INFINITY));
        assert!(matches!(meta.encode(), Err(PacketError::NonFiniteMeta { .. })));
        assert!(matches!(meta.to_json(), Err(PacketError::NonFiniteMeta { .. })));
    }

    #[test]
    fn codecs_agree_on_accepted_packets() {
        let packet = with_player(
            EntityState::new("p1", "player", 3.0, 4.0)
                .with_field("rot", 0.25)
                .with_field("tag", "red"),
        );
        let from_binary = DeltaPacket::decode(&packet.encode().unwrap()).unwrap();
        let from_json = DeltaPacket::from_json(&packet.to_json().unwrap()).unwrap();

        assert_eq!(from_binary, from_json);
        assert_eq!(from_binary, packet);
    }
}
