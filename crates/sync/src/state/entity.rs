use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::value::FieldValue;

/// Wire names of the built-in entity fields. A type-specific field may not use
/// one: the flattened JSON form would carry the key twice.
pub const RESERVED_FIELDS: [&str; 6] = ["id", "type", "x", "y", "netVersion", "isDead"];

/// Full authoritative representation of one synchronized entity.
///
/// Two states with the same `id` and `entity_type` describe the same logical
/// entity; every other field may differ freely.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub net_version: u64,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityState {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            x,
            y,
            net_version: 0,
            is_dead: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn same_entity(&self, other: &EntityState) -> bool {
        self.id == other.id && self.entity_type == other.entity_type
    }

    /// Copy with the position rounded to whole units, so float noise below
    /// one unit never shows up as a change.
    pub fn quantized(&self) -> Self {
        let mut state = self.clone();
        state.x = state.x.round();
        state.y = state.y.round();
        state
    }

    /// Shallow-merges every field present in `delta`. Absent fields keep their
    /// current value.
    pub fn apply_delta(&mut self, delta: &EntityDelta) {
        if let Some(entity_type) = &delta.entity_type {
            self.entity_type.clone_from(entity_type);
        }
        if let Some(x) = delta.x {
            self.x = x;
        }
        if let Some(y) = delta.y {
            self.y = y;
        }
        if let Some(net_version) = delta.net_version {
            self.net_version = net_version;
        }
        if let Some(is_dead) = delta.is_dead {
            self.is_dead = is_dead;
        }
        for (name, value) in &delta.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

/// Partial entity state: always an `id`, plus whatever changed.
///
/// Absent means "unchanged", never "cleared". The accumulator keeps its
/// reconstructed records in this shape too, so a field never received stays
/// absent instead of being defaulted.
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
#[serde(rename_all = "camelCase")]
pub struct EntityDelta {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dead: Option<bool>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityDelta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// True when the delta carries nothing but its id.
    pub fn is_empty(&self) -> bool {
        self.entity_type.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.net_version.is_none()
            && self.is_dead.is_none()
            && self.fields.is_empty()
    }

    pub fn position(&self) -> Option<DVec2> {
        Some(DVec2::new(self.x?, self.y?))
    }

    /// First type-specific field whose name shadows a built-in one.
    pub fn reserved_field(&self) -> Option<&str> {
        self.fields
            .keys()
            .map(String::as_str)
            .find(|name| RESERVED_FIELDS.contains(name))
    }

    /// First field holding a NaN or infinite number, by wire name.
    pub fn non_finite_field(&self) -> Option<&str> {
        if self.x.is_some_and(|x| !x.is_finite()) {
            return Some("x");
        }
        if self.y.is_some_and(|y| !y.is_finite()) {
            return Some("y");
        }
        self.fields
            .iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| name.as_str())
    }

    /// Overlays `other` onto this record key by key.
    pub fn merge(&mut self, other: &EntityDelta) {
        if other.entity_type.is_some() {
            self.entity_type.clone_from(&other.entity_type);
        }
        self.x = other.x.or(self.x);
        self.y = other.y.or(self.y);
        self.net_version = other.net_version.or(self.net_version);
        self.is_dead = other.is_dead.or(self.is_dead);
        for (name, value) in &other.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// Full state, if the record knows `type`, `x` and `y`. `netVersion` and
    /// `isDead` fall back to their schema defaults (0 and false).
    pub fn to_state(&self) -> Option<EntityState> {
        Some(EntityState {
            id: self.id.clone(),
            entity_type: self.entity_type.clone()?,
            x: self.x?,
            y: self.y?,
            net_version: self.net_version.unwrap_or(0),
            is_dead: self.is_dead.unwrap_or(false),
            fields: self.fields.clone(),
        })
    }
}

impl From<EntityState> for EntityDelta {
    fn from(state: EntityState) -> Self {
        Self {
            id: state.id,
            entity_type: Some(state.entity_type),
            x: Some(state.x),
            y: Some(state.y),
            net_version: Some(state.net_version),
            is_dead: Some(state.is_dead),
            fields: state.fields,
        }
    }
}

impl From<&EntityState> for EntityDelta {
    fn from(state: &EntityState) -> Self {
        Self::from(state.clone())
    }
}
