use skirmish::{DEFAULT_TICK_RATE, ReconcileConfig, SyncConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    /// Ticks to run; 0 runs until interrupted.
    pub ticks: u32,
    pub players: usize,
    pub enemies: usize,
    pub walls: usize,
    pub arena_size: f64,
    pub seed: u64,
    pub realtime: bool,
    pub dump_json: bool,
    /// Max random drift per tick the loopback client adds to its predicted
    /// player, to exercise reconciliation.
    pub prediction_noise: f64,
    pub local_player: String,
    pub sync: SyncConfig,
    pub reconcile: ReconcileConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            ticks: 600,
            players: 4,
            enemies: 6,
            walls: 9,
            arena_size: 800.0,
            seed: 0x5EED,
            realtime: false,
            dump_json: false,
            prediction_noise: 1.5,
            local_player: "p1".to_string(),
            sync: SyncConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}
