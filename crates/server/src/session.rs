use anyhow::{Context, Result};

use skirmish::{
    Category, CollectionDelta, DeltaPacket, EntityDelta, EntityState, ReconstructedState,
    Reconciler, Replicated, SequencedAccumulator, WorldDeltaProducer, WorldState,
    apply_to_collaborators,
};

use crate::arena::{Actor, Arena, Rng};
use crate::config::ServerConfig;

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub ticks: u64,
    pub empty_packets: u64,
    pub entries: u64,
    pub binary_bytes: u64,
    pub json_bytes: u64,
    pub snaps: u64,
    pub despawned: u64,
    pub desyncs: u64,
}

impl SessionStats {
    pub fn avg_binary_bytes(&self) -> f64 {
        self.binary_bytes as f64 / self.ticks.max(1) as f64
    }

    pub fn avg_json_bytes(&self) -> f64 {
        self.json_bytes as f64 / self.ticks.max(1) as f64
    }
}

/// Client presentation objects for one category, driven by deltas.
#[derive(Debug, Default)]
struct Mirror {
    actors: Vec<Actor>,
}

impl Mirror {
    fn sync(&mut self, delta: &CollectionDelta) -> usize {
        for (id, change) in delta {
            let Some(change) = change else {
                continue;
            };
            if !self.actors.iter().any(|actor| actor.id == *id) {
                if let Some(actor) = Actor::from_record(change) {
                    self.actors.push(actor);
                }
            }
        }

        let before = self.actors.len();
        let gone = apply_to_collaborators(&mut self.actors, delta);
        self.actors
            .retain(|actor| !actor.is_destroyed() && !gone.contains(&actor.id));
        before - self.actors.len()
    }
}

/// Host and one client in a single process. Every packet goes through the
/// binary codec before the client sees it.
pub struct LoopbackSession {
    config: ServerConfig,
    arena: Arena,
    host: WorldDeltaProducer,
    client: SequencedAccumulator,
    mirrors: [Mirror; 4],
    reconciler: Reconciler,
    predicted: Option<EntityState>,
    rng: Rng,
    stats: SessionStats,
}

impl LoopbackSession {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            arena: Arena::new(&config),
            host: WorldDeltaProducer::new(config.sync.clone()),
            client: SequencedAccumulator::new(),
            mirrors: Default::default(),
            reconciler: Reconciler::new(config.reconcile.clone()),
            predicted: None,
            rng: Rng::new(config.seed.rotate_left(17)),
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn predicted(&self) -> Option<&EntityState> {
        self.predicted.as_ref()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn tick_once(&mut self, tick: u32, timestamp: u64, dt: f64) -> Result<()> {
        self.arena.step(dt);
        let world = self.arena.world();
        let packet = self.host.produce(tick, timestamp, &world);

        let bytes = packet.encode().context("encoding delta packet")?;
        let json = packet.to_json()?;
        if self.config.dump_json {
            log::debug!("Tick {}: {}", tick, json);
        }

        self.stats.ticks += 1;
        self.stats.entries += packet.entry_count() as u64;
        self.stats.binary_bytes += bytes.len() as u64;
        self.stats.json_bytes += json.len() as u64;
        if packet.is_empty() {
            self.stats.empty_packets += 1;
        }

        let received = DeltaPacket::decode(&bytes).context("decoding delta packet")?;
        let Some(state) = self.client.apply(&received) else {
            return Ok(());
        };

        for category in Category::ALL {
            let despawned = self.mirrors[category.index()].sync(received.collection(category));
            self.stats.despawned += despawned as u64;
        }

        self.stats.desyncs += self.verify(&world, &state) as u64;
        self.reconcile_local_player(&state);
        Ok(())
    }

    /// Counts reconstructed records that differ from what the host sent.
    fn verify(&self, world: &WorldState, state: &ReconstructedState) -> usize {
        let mut mismatches = 0;
        for category in Category::ALL {
            let authoritative = world.collection(category);
            let reconstructed = state.collection(category);
            if authoritative.len() != reconstructed.len() {
                log::warn!(
                    "Tick {}: {} has {} records, host has {}",
                    state.tick,
                    category,
                    reconstructed.len(),
                    authoritative.len()
                );
                mismatches += 1;
            }

            for (id, expected) in authoritative {
                let expected = self.config.sync.prepare(expected);
                let actual = reconstructed.get(id).and_then(EntityDelta::to_state);
                if actual.as_ref() != Some(&expected) {
                    log::warn!("Tick {}: {} {} diverged from host", state.tick, category, id);
                    mismatches += 1;
                }
            }
        }
        mismatches
    }

    /// Moves the locally predicted player toward the last authoritative
    /// position with some noise, then reconciles it.
    fn reconcile_local_player(&mut self, state: &ReconstructedState) {
        let Some(record) = state.get(Category::Players, &self.config.local_player) else {
            self.predicted = None;
            return;
        };
        if self.predicted.is_none() {
            self.predicted = record.to_state();
        }
        let Some(predicted) = self.predicted.as_mut() else {
            return;
        };

        if let Some(target) = record.position() {
            let noise = self.config.prediction_noise;
            let step = (target - predicted.position()) * 0.5;
            predicted.x += step.x + self.rng.range(-noise, noise);
            predicted.y += step.y + self.rng.range(-noise, noise);
        }

        let correction = self.reconciler.reconcile_record(predicted, record);
        if correction.is_some_and(|c| c.snapped()) {
            self.stats.snaps += 1;
        }
    }
}
