use crate::delta::{MergePolicy, MergeStats, merge_collection_delta};
use crate::net::DeltaPacket;
use crate::state::{Category, EntityDelta, Meta, RecordMap};

/// Full client-side view as of one packet. Owned by the caller; changing it
/// never affects the accumulator or later snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructedState {
    pub tick: u32,
    pub timestamp: u64,
    pub players: RecordMap,
    pub enemies: RecordMap,
    pub projectiles: RecordMap,
    pub walls: RecordMap,
    pub meta: Meta,
}

impl ReconstructedState {
    pub fn collection(&self, category: Category) -> &RecordMap {
        match category {
            Category::Players => &self.players,
            Category::Enemies => &self.enemies,
            Category::Projectiles => &self.projectiles,
            Category::Walls => &self.walls,
        }
    }

    pub fn get(&self, category: Category, id: &str) -> Option<&EntityDelta> {
        self.collection(category).get(id)
    }

    pub fn entity_count(&self) -> usize {
        Category::ALL
            .iter()
            .map(|&category| self.collection(category).len())
            .sum()
    }
}

/// Rebuilds the full state from the stream of delta packets.
///
/// Collections and meta are owned here and only mutated by `apply_delta`.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    players: RecordMap,
    enemies: RecordMap,
    projectiles: RecordMap,
    walls: RecordMap,
    meta: Meta,
    tick: u32,
    timestamp: u64,
    packets_applied: u64,
    last_stats: MergeStats,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `packet` and returns a copy of the resulting state.
    ///
    /// The packet is trusted as-is: it must have passed the transport's
    /// integrity checks (see `DeltaPacket::validate`).
    pub fn apply_delta(&mut self, packet: &DeltaPacket) -> ReconstructedState {
        let mut stats = MergeStats::default();
        for category in Category::ALL {
            let delta = packet.collection(category);
            if !delta.is_empty() {
                stats.absorb(merge_collection_delta(
                    self.collection_mut(category),
                    delta,
                    MergePolicy::ShallowMerge,
                ));
            }
        }

        for (key, value) in &packet.meta {
            self.meta.insert(key.clone(), value.clone());
        }

        if stats.ignored_removals > 0 {
            log::debug!(
                "Tick {}: {} removals for unknown ids ignored",
                packet.tick,
                stats.ignored_removals
            );
        }

        self.tick = packet.tick;
        self.timestamp = packet.timestamp;
        self.packets_applied += 1;
        self.last_stats = stats;
        self.snapshot()
    }

    /// Copy of the current state without applying anything.
    pub fn snapshot(&self) -> ReconstructedState {
        ReconstructedState {
            tick: self.tick,
            timestamp: self.timestamp,
            players: self.players.clone(),
            enemies: self.enemies.clone(),
            projectiles: self.projectiles.clone(),
            walls: self.walls.clone(),
            meta: self.meta.clone(),
        }
    }

    pub fn collection(&self, category: Category) -> &RecordMap {
        match category {
            Category::Players => &self.players,
            Category::Enemies => &self.enemies,
            Category::Projectiles => &self.projectiles,
            Category::Walls => &self.walls,
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn packets_applied(&self) -> u64 {
        self.packets_applied
    }

    pub fn last_stats(&self) -> MergeStats {
        self.last_stats
    }

    /// Explicit reinitialization, e.g. when rejoining a session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn collection_mut(&mut self, category: Category) -> &mut RecordMap {
        match category {
            Category::Players => &mut self.players,
            Category::Enemies => &mut self.enemies,
            Category::Projectiles => &mut self.projectiles,
            Category::Walls => &mut self.walls,
        }
    }
}
