use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rampgate::config::{PatternConfig, ScheduleConfig, SegmentConfig};
use rampgate::RateLimiter;

/// Drive a scheduled rate limiter from several threads and report grants.
#[derive(Parser, Debug)]
#[command(name = "rampgate", version, about)]
struct Args {
    /// Schedule definition (YAML or JSON); defaults to a built-in warm-up profile
    #[arg(short, long)]
    schedule: Option<PathBuf>,

    /// Number of caller threads
    #[arg(short, long, default_value_t = 10)]
    threads: usize,

    /// Stop once this many single-token requests have been granted
    #[arg(long, default_value_t = 100_500)]
    target: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    match args.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!("Starting Rampgate load driver");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.schedule {
        Some(path) => ScheduleConfig::from_file(path)?,
        None => warmup_profile(),
    };
    let schedule = config.build()?;
    let schedule_length = Duration::from_millis(schedule.total_duration_ms());
    info!(
        segments = schedule.len(),
        total_duration_ms = schedule.total_duration_ms(),
        max_tokens = schedule.max_tokens(),
        "Schedule loaded"
    );

    let limiter = RateLimiter::new(schedule);
    let barrier = Barrier::new(args.threads + 1);
    let granted = AtomicU64::new(0);
    let attempts = AtomicU64::new(0);

    let started = thread::scope(|s| {
        for _ in 0..args.threads {
            s.spawn(|| {
                barrier.wait();
                let started = Instant::now();
                while granted.load(Ordering::Relaxed) < args.target
                    && started.elapsed() <= schedule_length
                {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    if limiter.try_acquire_one() {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }

        barrier.wait();
        Instant::now()
    });
    let elapsed = started.elapsed();

    info!(
        threads = args.threads,
        granted = granted.load(Ordering::Relaxed),
        attempts = attempts.load(Ordering::Relaxed),
        remaining = limiter.state().available_tokens(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Load run finished"
    );

    Ok(())
}

/// 10 000 tokens/s for 10 s, then 100 tokens/s for 5 s.
fn warmup_profile() -> ScheduleConfig {
    ScheduleConfig {
        segments: vec![
            SegmentConfig {
                duration_secs: 10,
                pattern: PatternConfig::Constant { rate: 10_000.0 },
            },
            SegmentConfig {
                duration_secs: 5,
                pattern: PatternConfig::Constant { rate: 100.0 },
            },
        ],
        ..ScheduleConfig::default()
    }
}
