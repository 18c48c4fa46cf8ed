mod arena;
mod config;
mod session;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use session::LoopbackSession;
use skirmish::{ReconcileConfig, SyncConfig, TickClock, current_time_ms};

#[derive(Parser)]
#[command(name = "skirmish-server")]
#[command(about = "Headless skirmish host with an in-process delta client")]
struct Args {
    #[arg(short, long, default_value_t = skirmish::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short = 'n', long, default_value_t = 600, help = "Ticks to run (0 = forever)")]
    ticks: u32,

    #[arg(long, default_value_t = 4)]
    players: usize,

    #[arg(long, default_value_t = 6, help = "Enemies per wave")]
    enemies: usize,

    #[arg(long, default_value_t = 9)]
    walls: usize,

    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,

    #[arg(long, help = "Pace ticks against the wall clock")]
    realtime: bool,

    #[arg(long, help = "Log every packet as JSON at debug level")]
    dump_json: bool,

    #[arg(long, help = "Diff raw float positions instead of whole units")]
    exact_positions: bool,

    #[arg(long, default_value_t = skirmish::DEFAULT_SNAP_DISTANCE)]
    snap_distance: f64,

    #[arg(long, default_value_t = 1.5, help = "Prediction drift per tick")]
    prediction_noise: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        ticks: args.ticks,
        players: args.players,
        enemies: args.enemies,
        walls: args.walls,
        seed: args.seed,
        realtime: args.realtime,
        dump_json: args.dump_json,
        prediction_noise: args.prediction_noise,
        sync: SyncConfig {
            round_positions: !args.exact_positions,
        },
        reconcile: ReconcileConfig {
            snap_distance: args.snap_distance,
            ..Default::default()
        },
        ..Default::default()
    };

    log::info!(
        "Running {} ticks at {} Hz ({} players, {} enemies/wave, {} walls)",
        config.ticks,
        config.tick_rate,
        config.players,
        config.enemies,
        config.walls
    );

    let mut clock = TickClock::new(config.tick_rate);
    let dt = f64::from(clock.dt());
    let realtime = config.realtime;
    let limit = config.ticks;
    let mut session = LoopbackSession::new(config);

    if realtime {
        let mut last = Instant::now();
        while limit == 0 || clock.tick() < limit {
            let now = Instant::now();
            clock.accumulate((now - last).as_secs_f32());
            last = now;
            while let Some(tick) = clock.consume_tick() {
                if limit != 0 && tick > limit {
                    break;
                }
                session.tick_once(tick, current_time_ms(), dt)?;
            }
            thread::sleep(Duration::from_millis(1));
        }
    } else {
        while limit == 0 || clock.tick() < limit {
            let tick = clock.step();
            session.tick_once(tick, current_time_ms(), dt)?;
        }
    }

    let stats = session.stats();
    log::info!(
        "{} ticks, {} entries, {} empty packets, {} despawns",
        stats.ticks,
        stats.entries,
        stats.empty_packets,
        stats.despawned
    );
    log::info!(
        "Avg packet: {:.1} bytes binary, {:.1} bytes json",
        stats.avg_binary_bytes(),
        stats.avg_json_bytes()
    );
    log::info!(
        "Final score {} at wave {}; {} reconciliation snaps",
        session.arena().score,
        session.arena().wave,
        stats.snaps
    );
    if let Some(predicted) = session.predicted() {
        log::info!(
            "Predicted {} ended at ({:.1}, {:.1})",
            predicted.id,
            predicted.x,
            predicted.y
        );
    }
    if stats.desyncs > 0 {
        log::warn!("{} reconstruction mismatches", stats.desyncs);
    }

    Ok(())
}
