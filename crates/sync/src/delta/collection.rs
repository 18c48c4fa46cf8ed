use std::collections::hash_map::Entry;

use crate::state::{CollectionDelta, RecordMap, StateMap};

use super::producer::compute_delta;

/// Collection-level diff: new ids carry their full state, changed ids carry a
/// field delta, ids that vanished from `current` map to `None`.
pub fn diff_collection(current: &StateMap, previous: &StateMap) -> CollectionDelta {
    let mut delta: CollectionDelta = current
        .iter()
        .filter_map(|(id, state)| {
            compute_delta(state, previous.get(id)).map(|change| (id.clone(), Some(change)))
        })
        .collect();

    for id in previous.keys() {
        if !current.contains_key(id) {
            delta.insert(id.clone(), None);
        }
    }

    delta
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Each upsert replaces the whole record.
    Replace,
    /// Each upsert is overlaid onto the existing record.
    #[default]
    ShallowMerge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub upserted: usize,
    pub removed: usize,
    pub ignored_removals: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: MergeStats) {
        self.upserted += other.upserted;
        self.removed += other.removed;
        self.ignored_removals += other.ignored_removals;
    }
}

/// Applies `delta` onto `target` in place. Removing an id that is not present
/// is a no-op.
pub fn merge_collection_delta(
    target: &mut RecordMap,
    delta: &CollectionDelta,
    policy: MergePolicy,
) -> MergeStats {
    let mut stats = MergeStats::default();

    for (id, change) in delta {
        let Some(change) = change else {
            if target.remove(id).is_some() {
                stats.removed += 1;
            } else {
                stats.ignored_removals += 1;
            }
            continue;
        };

        match (target.entry(id.clone()), policy) {
            (Entry::Occupied(mut record), MergePolicy::ShallowMerge) => {
                record.get_mut().merge(change);
            }
            (Entry::Occupied(mut record), MergePolicy::Replace) => {
                record.insert(change.clone());
            }
            (Entry::Vacant(slot), _) => {
                slot.insert(change.clone());
            }
        }
        stats.upserted += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EntityDelta, EntityState, FieldValue};

    fn states(entries: &[EntityState]) -> StateMap {
        entries.iter().map(|s| (s.id.clone(), s.clone())).collect()
    }

    #[test]
    fn diff_reports_added_changed_and_removed() {
        let previous = states(&[
            EntityState::new("a", "grunt", 0.0, 0.0),
            EntityState::new("b", "grunt", 5.0, 5.0),
            EntityState::new("c", "grunt", 9.0, 9.0),
        ]);
        let current = states(&[
            EntityState::new("a", "grunt", 0.0, 0.0),
            EntityState::new("b", "grunt", 6.0, 5.0),
            EntityState::new("d", "brute", 1.0, 1.0),
        ]);

        let delta = diff_collection(&current, &previous);

        assert_eq!(delta.len(), 3);
        assert!(!delta.contains_key("a"));
        assert_eq!(delta["b"].as_ref().unwrap().x, Some(6.0));
        assert_eq!(delta["b"].as_ref().unwrap().y, None);
        assert_eq!(delta["c"], None);
        assert_eq!(delta["d"].as_ref().unwrap().entity_type.as_deref(), Some("brute"));
    }

    #[test]
    fn removing_unknown_id_is_noop() {
        let mut target = RecordMap::new();
        target.insert("a".into(), EntityDelta::new("a").with_position(1.0, 1.0));
        let before = target.clone();

        let delta = CollectionDelta::from([("ghost".to_string(), None)]);
        let stats = merge_collection_delta(&mut target, &delta, MergePolicy::ShallowMerge);

        assert_eq!(target, before);
        assert_eq!(stats.ignored_removals, 1);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn replace_drops_fields_not_resent() {
        let mut target = RecordMap::new();
        target.insert(
            "a".into(),
            EntityDelta::new("a").with_position(1.0, 1.0).with_field("health", 5),
        );

        let delta = CollectionDelta::from([(
            "a".to_string(),
            Some(EntityDelta::new("a").with_position(2.0, 2.0)),
        )]);
        merge_collection_delta(&mut target, &delta, MergePolicy::Replace);

        assert_eq!(target["a"].field("health"), None);
        assert_eq!(target["a"].x, Some(2.0));
    }

    #[test]
    fn shallow_merge_keeps_fields_not_resent() {
        let mut target = RecordMap::new();
        target.insert(
            "a".into(),
            EntityDelta::new("a").with_position(1.0, 1.0).with_field("health", 5),
        );

        let delta = CollectionDelta::from([(
            "a".to_string(),
            Some(EntityDelta::new("a").with_field("health", 4)),
        )]);
        let stats = merge_collection_delta(&mut target, &delta, MergePolicy::ShallowMerge);

        assert_eq!(stats.upserted, 1);
        assert_eq!(target["a"].field("health"), Some(&FieldValue::Int(4)));
        assert_eq!(target["a"].x, Some(1.0));
    }

    #[test]
    fn diff_then_merge_reconstructs_current() {
        let previous = states(&[
            EntityState::new("a", "grunt", 0.0, 0.0).with_field("health", 10),
            EntityState::new("b", "grunt", 5.0, 5.0),
        ]);
        let current = states(&[
            EntityState::new("a", "grunt", 3.0, 0.0).with_field("health", 7),
            EntityState::new("c", "brute", 1.0, 1.0),
        ]);

        let mut target: RecordMap = previous
            .iter()
            .map(|(id, s)| (id.clone(), EntityDelta::from(s)))
            .collect();
        merge_collection_delta(
            &mut target,
            &diff_collection(&current, &previous),
            MergePolicy::ShallowMerge,
        );

        let rebuilt: StateMap = target
            .values()
            .map(|record| (record.id.clone(), record.to_state().unwrap()))
            .collect();
        assert_eq!(rebuilt, current);
    }
}
