use crate::net::DeltaPacket;

use super::accumulator::{DeltaAccumulator, ReconstructedState};

const TICK_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wrap-aware `t1 > t2`.
#[inline]
pub fn tick_greater_than(t1: u32, t2: u32) -> bool {
    ((t1 > t2) && (t1 - t2 <= TICK_WRAP_THRESHOLD))
        || ((t1 < t2) && (t2 - t1 > TICK_WRAP_THRESHOLD))
}

/// Accumulator behind a tick gate for transports that may reorder.
///
/// A packet older than the last applied tick would roll fields back, so it is
/// dropped. A packet with the same tick is applied again, which is harmless.
#[derive(Debug, Default)]
pub struct SequencedAccumulator {
    inner: DeltaAccumulator,
    last_tick: Option<u32>,
    dropped: u64,
}

impl SequencedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, packet: &DeltaPacket) -> Option<ReconstructedState> {
        if self
            .last_tick
            .is_some_and(|last| tick_greater_than(last, packet.tick))
        {
            self.dropped += 1;
            log::debug!(
                "Dropping stale packet for tick {} (last applied {:?})",
                packet.tick,
                self.last_tick
            );
            return None;
        }

        self.last_tick = Some(packet.tick);
        Some(self.inner.apply_delta(packet))
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn accumulator(&self) -> &DeltaAccumulator {
        &self.inner
    }

    pub fn snapshot(&self) -> ReconstructedState {
        self.inner.snapshot()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.last_tick = None;
        self.dropped = 0;
    }
}
