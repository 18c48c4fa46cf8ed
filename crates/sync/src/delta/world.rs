use crate::net::DeltaPacket;
use crate::replication::Replicated;
use crate::state::{Category, EntityState, FieldValue, Meta, StateMap};

use super::collection::diff_collection;
use super::producer::SyncConfig;

/// Authoritative world held by the host: one keyed collection per category
/// plus the meta values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    pub players: StateMap,
    pub enemies: StateMap,
    pub projectiles: StateMap,
    pub walls: StateMap,
    pub meta: Meta,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, category: Category) -> &StateMap {
        match category {
            Category::Players => &self.players,
            Category::Enemies => &self.enemies,
            Category::Projectiles => &self.projectiles,
            Category::Walls => &self.walls,
        }
    }

    pub fn collection_mut(&mut self, category: Category) -> &mut StateMap {
        match category {
            Category::Players => &mut self.players,
            Category::Enemies => &mut self.enemies,
            Category::Projectiles => &mut self.projectiles,
            Category::Walls => &mut self.walls,
        }
    }

    pub fn insert(&mut self, category: Category, state: EntityState) {
        self.collection_mut(category).insert(state.id.clone(), state);
    }

    pub fn remove(&mut self, category: Category, id: &str) -> Option<EntityState> {
        self.collection_mut(category).remove(id)
    }

    /// Rebuilds `category` from the collaborators' current network states.
    /// Collaborators that opt out of sync are skipped.
    pub fn collect<'a, R, I>(&mut self, category: Category, entities: I)
    where
        R: Replicated + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let collection = self.collection_mut(category);
        collection.clear();
        for state in entities.into_iter().filter_map(Replicated::network_state) {
            collection.insert(state.id.clone(), state);
        }
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn entity_count(&self) -> usize {
        Category::ALL
            .iter()
            .map(|&category| self.collection(category).len())
            .sum()
    }
}

/// Host-side producer for one client. Keeps a per-category baseline of what
/// that client was last sent and turns a `WorldState` into one packet per tick.
#[derive(Debug, Default)]
pub struct WorldDeltaProducer {
    config: SyncConfig,
    baselines: [StateMap; 4],
    meta_baseline: Meta,
}

impl WorldDeltaProducer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn produce(&mut self, tick: u32, timestamp: u64, world: &WorldState) -> DeltaPacket {
        let mut packet = DeltaPacket::new(tick, timestamp);

        for category in Category::ALL {
            let current: StateMap = world
                .collection(category)
                .iter()
                .map(|(id, state)| (id.clone(), self.config.prepare(state)))
                .collect();
            let baseline = &mut self.baselines[category.index()];
            let delta = diff_collection(&current, baseline);

            for (id, change) in &delta {
                match change {
                    Some(_) => {
                        if let Some(state) = current.get(id) {
                            baseline.insert(id.clone(), state.clone());
                        }
                    }
                    None => {
                        baseline.remove(id);
                    }
                }
            }

            *packet.collection_mut(category) = delta;
        }

        for (key, value) in &world.meta {
            if self.meta_baseline.get(key) != Some(value) {
                self.meta_baseline.insert(key.clone(), value.clone());
                packet.meta.insert(key.clone(), value.clone());
            }
        }

        packet
    }

    pub fn baseline(&self, category: Category) -> &StateMap {
        &self.baselines[category.index()]
    }

    /// Drops every baseline so the next packet is a full snapshot.
    pub fn reset(&mut self) {
        for baseline in &mut self.baselines {
            baseline.clear();
        }
        self.meta_baseline.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldState {
        let mut world = WorldState::new();
        world.insert(Category::Players, EntityState::new("p1", "player", 0.0, 0.0));
        world.insert(Category::Walls, EntityState::new("w1", "crate", 50.0, 50.0));
        world.set_meta("score", 0);
        world
    }

    #[test]
    fn first_packet_is_full_snapshot() {
        let mut producer = WorldDeltaProducer::default();
        let packet = producer.produce(1, 1000, &world());

        assert_eq!(packet.tick, 1);
        assert_eq!(packet.timestamp, 1000);
        assert_eq!(packet.players.len(), 1);
        assert_eq!(packet.walls.len(), 1);
        assert!(packet.enemies.is_empty());
        assert_eq!(packet.meta.get("score"), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn quiet_tick_produces_empty_packet() {
        let mut producer = WorldDeltaProducer::default();
        let world = world();
        producer.produce(1, 1000, &world);

        let packet = producer.produce(2, 1016, &world);
        assert!(packet.is_empty());
        assert_eq!(packet.tick, 2);
    }

    #[test]
    fn removed_entity_is_sent_as_null_once() {
        let mut producer = WorldDeltaProducer::default();
        let mut world = world();
        producer.produce(1, 0, &world);

        world.remove(Category::Walls, "w1");
        let packet = producer.produce(2, 0, &world);
        assert_eq!(packet.walls.get("w1"), Some(&None));
        assert!(producer.baseline(Category::Walls).is_empty());

        let packet = producer.produce(3, 0, &world);
        assert!(packet.walls.is_empty());
    }

    #[test]
    fn only_changed_meta_keys_are_sent() {
        let mut producer = WorldDeltaProducer::default();
        let mut world = world();
        world.set_meta("wave", 1);
        producer.produce(1, 0, &world);

        world.set_meta("score", 10);
        let packet = producer.produce(2, 0, &world);
        assert_eq!(packet.meta.len(), 1);
        assert_eq!(packet.meta.get("score"), Some(&FieldValue::Int(10)));
    }

    #[test]
    fn baseline_is_quantized() {
        let mut producer = WorldDeltaProducer::default();
        let mut world = world();
        world.players.get_mut("p1").unwrap().x = 10.4;
        let packet = producer.produce(1, 0, &world);

        assert_eq!(packet.players["p1"].as_ref().unwrap().x, Some(10.0));
        assert_eq!(producer.baseline(Category::Players)["p1"].x, 10.0);
    }

    #[test]
    fn reset_forces_full_snapshot() {
        let mut producer = WorldDeltaProducer::default();
        let world = world();
        producer.produce(1, 0, &world);
        producer.reset();

        let packet = producer.produce(2, 0, &world);
        assert_eq!(packet.players.len(), 1);
        assert_eq!(packet.meta.len(), 1);
    }
}
