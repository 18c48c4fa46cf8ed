use std::collections::HashMap;

use crate::state::{CollectionDelta, EntityDelta, EntityState};

/// What a game object must offer to take part in sync.
pub trait Replicated {
    /// Stable for the object's whole lifetime.
    fn network_id(&self) -> &str;

    /// Current network fields, or `None` when the object does not take part
    /// in sync (an indestructible static obstacle, say).
    fn network_state(&self) -> Option<EntityState>;

    /// Applies an authoritative partial update. Fields the object does not
    /// know are ignored.
    fn apply_delta(&mut self, delta: &EntityDelta);

    /// Merges authoritative state into locally predicted state.
    fn reconcile(&mut self, authoritative: &EntityState);

    /// Set once the object has seen `isDead`.
    fn is_destroyed(&self) -> bool;
}

/// Routes each upsert in `delta` to the collaborator with that id.
///
/// Returns the ids the caller should tear down locally: objects that became
/// destroyed while applying, and objects the delta removed with `null`.
/// Entries for unknown ids are skipped.
pub fn apply_to_collaborators<R: Replicated>(
    entities: &mut [R],
    delta: &CollectionDelta,
) -> Vec<String> {
    let index: HashMap<String, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, entity)| (entity.network_id().to_string(), i))
        .collect();

    let mut gone = Vec::new();
    for (id, change) in delta {
        let Some(&i) = index.get(id) else {
            continue;
        };
        let entity = &mut entities[i];
        match change {
            Some(change) => {
                let was_destroyed = entity.is_destroyed();
                entity.apply_delta(change);
                if !was_destroyed && entity.is_destroyed() {
                    gone.push(id.clone());
                }
            }
            None => gone.push(id.clone()),
        }
    }
    gone.sort();
    gone
}
