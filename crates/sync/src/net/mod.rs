mod protocol;

pub use protocol::{DEFAULT_TICK_RATE, DeltaPacket, PacketError};
