use std::collections::BTreeMap;

use glam::DVec2;

use crate::state::{EntityDelta, EntityState, FieldValue};

pub const DEFAULT_SNAP_DISTANCE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Predicted positions further than this from the authoritative one are
    /// snapped; closer ones are left alone.
    pub snap_distance: f64,
    /// Extra fields always taken from the authoritative state. `isDead` is
    /// always authoritative and is not listed here.
    pub authoritative_fields: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snap_distance: DEFAULT_SNAP_DISTANCE,
            authoritative_fields: vec!["health".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Within tolerance; predicted position kept.
    Kept { distance: f64 },
    Snapped { distance: f64 },
}

impl Correction {
    pub fn distance(self) -> f64 {
        match self {
            Self::Kept { distance } | Self::Snapped { distance } => distance,
        }
    }

    pub fn snapped(self) -> bool {
        matches!(self, Self::Snapped { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Corrects `predicted` toward `authoritative` in place. Fields outside
    /// the policy keep their predicted values.
    pub fn reconcile(&self, predicted: &mut EntityState, authoritative: &EntityState) -> Correction {
        let correction = self.correct_position(predicted, authoritative.position());
        predicted.is_dead = authoritative.is_dead;
        self.overwrite_fields(predicted, &authoritative.fields);
        correction
    }

    /// Same policy against a reconstructed record, which may be sparse. Only
    /// fields the record knows are applied; returns `None` when it has no
    /// position.
    pub fn reconcile_record(
        &self,
        predicted: &mut EntityState,
        record: &EntityDelta,
    ) -> Option<Correction> {
        let correction = record
            .position()
            .map(|position| self.correct_position(predicted, position));
        if let Some(is_dead) = record.is_dead {
            predicted.is_dead = is_dead;
        }
        self.overwrite_fields(predicted, &record.fields);
        correction
    }

    fn correct_position(&self, predicted: &mut EntityState, authoritative: DVec2) -> Correction {
        let distance = predicted.position().distance(authoritative);
        if distance > self.config.snap_distance {
            log::debug!(
                "Snapping {} by {:.1} units to ({}, {})",
                predicted.id,
                distance,
                authoritative.x,
                authoritative.y
            );
            predicted.x = authoritative.x;
            predicted.y = authoritative.y;
            Correction::Snapped { distance }
        } else {
            Correction::Kept { distance }
        }
    }

    fn overwrite_fields(&self, predicted: &mut EntityState, source: &BTreeMap<String, FieldValue>) {
        for name in &self.config.authoritative_fields {
            if let Some(value) = source.get(name) {
                predicted.fields.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Reconciles with the default policy: snap beyond 10 units, `health` and
/// `isDead` always authoritative.
pub fn reconcile(predicted: &mut EntityState, authoritative: &EntityState) -> Correction {
    Reconciler::default().reconcile(predicted, authoritative)
}
