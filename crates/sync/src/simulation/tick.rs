use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch millis, used to stamp outgoing packets.
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Fixed-rate tick counter fed by frame time.
#[derive(Debug, Clone)]
pub struct TickClock {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
    tick: u32,
}

impl TickClock {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
            tick: 0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Adds frame time, clamped so a long stall cannot queue a burst of ticks.
    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.min(0.25);
    }

    /// Advances one tick if enough time has accumulated.
    pub fn consume_tick(&mut self) -> Option<u32> {
        if self.accumulator < self.dt {
            return None;
        }
        self.accumulator -= self.dt;
        self.tick = self.tick.wrapping_add(1);
        Some(self.tick)
    }

    /// Advances one tick regardless of accumulated time.
    pub fn step(&mut self) -> u32 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulated_time_yields_ticks() {
        let mut clock = TickClock::new(20);

        clock.accumulate(0.1);
        assert_eq!(clock.consume_tick(), Some(1));
        assert_eq!(clock.consume_tick(), Some(2));
        assert_eq!(clock.consume_tick(), None);
    }

    #[test]
    fn stall_is_clamped() {
        let mut clock = TickClock::new(4);
        clock.accumulate(10.0);

        let mut ticks = 0;
        while clock.consume_tick().is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 1);
    }

    #[test]
    fn zero_rate_is_clamped() {
        let clock = TickClock::new(0);
        assert_eq!(clock.tick_rate(), 1);
    }

    #[test]
    fn timestamps_are_epoch_millis() {
        assert!(current_time_ms() > 1_600_000_000_000);
    }
}
