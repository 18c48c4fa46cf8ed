pub mod client;
pub mod delta;
pub mod net;
pub mod reconcile;
pub mod replication;
pub mod simulation;
pub mod state;

pub use client::{DeltaAccumulator, ReconstructedState, SequencedAccumulator, tick_greater_than};
pub use delta::{
    DeltaProducer, MergePolicy, MergeStats, SyncConfig, WorldDeltaProducer, WorldState,
    compute_delta, diff_collection, merge_collection_delta,
};
pub use net::{DEFAULT_TICK_RATE, DeltaPacket, PacketError};
pub use reconcile::{Correction, DEFAULT_SNAP_DISTANCE, ReconcileConfig, Reconciler, reconcile};
pub use replication::{Replicated, apply_to_collaborators};
pub use simulation::{TickClock, current_time_ms};
pub use state::{
    Category, CollectionDelta, EntityDelta, EntityState, FieldValue, Meta, RESERVED_FIELDS,
    RecordMap, StateMap,
};
