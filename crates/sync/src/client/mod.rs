mod accumulator;
mod sequencer;

pub use accumulator::{DeltaAccumulator, ReconstructedState};
pub use sequencer::{SequencedAccumulator, tick_greater_than};
