mod tick;

pub use tick::{TickClock, current_time_ms};
