use crate::state::{EntityDelta, EntityState};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Round positions to whole units before diffing. Sub-unit float noise
    /// would otherwise produce a packet every tick.
    pub round_positions: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            round_positions: true,
        }
    }
}

impl SyncConfig {
    pub fn prepare(&self, state: &EntityState) -> EntityState {
        if self.round_positions {
            state.quantized()
        } else {
            state.clone()
        }
    }
}

/// Minimal delta taking `last_sent` to `current`.
///
/// Without a baseline (or with a baseline for a different id) the whole of
/// `current` is returned. Otherwise every field is compared by exact value and
/// only differing fields are included; `None` means nothing changed. A NaN
/// compares equal to a NaN so it is sent once, not every tick. Fields the
/// baseline had but `current` lacks are not reported.
pub fn compute_delta(current: &EntityState, last_sent: Option<&EntityState>) -> Option<EntityDelta> {
    let Some(last) = last_sent.filter(|last| last.id == current.id) else {
        return Some(EntityDelta::from(current));
    };

    let mut delta = EntityDelta::new(current.id.clone());
    if current.entity_type != last.entity_type {
        delta.entity_type = Some(current.entity_type.clone());
    }
    if !same_coordinate(current.x, last.x) {
        delta.x = Some(current.x);
    }
    if !same_coordinate(current.y, last.y) {
        delta.y = Some(current.y);
    }
    if current.net_version != last.net_version {
        delta.net_version = Some(current.net_version);
    }
    if current.is_dead != last.is_dead {
        delta.is_dead = Some(current.is_dead);
    }
    for (name, value) in &current.fields {
        if last.fields.get(name) != Some(value) {
            delta.fields.insert(name.clone(), value.clone());
        }
    }

    (!delta.is_empty()).then_some(delta)
}

/// Exact equality, except that NaN matches NaN so a stuck value goes quiet.
fn same_coordinate(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Per-entity producer that owns the last state it sent.
#[derive(Debug, Default)]
pub struct DeltaProducer {
    config: SyncConfig,
    last_sent: Option<EntityState>,
}

impl DeltaProducer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            last_sent: None,
        }
    }

    /// Diffs `current` against the baseline. The baseline only advances when a
    /// delta is produced.
    pub fn produce(&mut self, current: &EntityState) -> Option<EntityDelta> {
        let current = self.config.prepare(current);
        let delta = compute_delta(&current, self.last_sent.as_ref())?;
        self.last_sent = Some(current);
        Some(delta)
    }

    pub fn last_sent(&self) -> Option<&EntityState> {
        self.last_sent.as_ref()
    }

    /// Forgets the baseline; the next `produce` emits a full state.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
