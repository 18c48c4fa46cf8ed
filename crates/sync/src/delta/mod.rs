mod collection;
mod producer;
mod world;

pub use collection::{MergePolicy, MergeStats, diff_collection, merge_collection_delta};
pub use producer::{DeltaProducer, SyncConfig, compute_delta};
pub use world::{WorldDeltaProducer, WorldState};
