//! End-to-end pipeline: OS producers feed a reader-fair pool, three managed
//! generators with different generators and strategies estimate pi from it.
//!
//! Run with `RUST_LOG=debug cargo run -p seedpool-producers --example pipeline`
//! and stop it with Ctrl+C (or wait for the five-second timer).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg64;
use rand_xoshiro::Xoshiro256PlusPlus;
use seedpool_core::{
    ArbitraryJump, ByteQueue, CountedRng, EntropyManager, FairQueue, Mix, Replace,
    ReseedThresholds, Reseedable, RingPool, TurnLimits,
};
use seedpool_producers::{
    CancelToken, Conditioning, OsSeedSource, ProducerConfig, RetryConfig, RetryingSource,
    SeedProducer, ThreadSleeper,
};

const RUN_FOR: Duration = Duration::from_secs(5);

type SharedPool = Arc<FairQueue<RingPool>>;

fn estimate_pi<S: Reseedable>(
    mut rng: EntropyManager<S, SharedPool>,
    running: &AtomicBool,
) -> (u64, f64, u64) {
    let mut inside = 0u64;
    let mut samples = 0u64;
    while running.load(Ordering::Relaxed) {
        let x = rng.draw_f64();
        let y = rng.draw_f64();
        if x * x + y * y <= 1.0 {
            inside += 1;
        }
        samples += 1;
    }
    let pi = if samples == 0 {
        0.0
    } else {
        4.0 * inside as f64 / samples as f64
    };
    (samples, pi, rng.reseed_count())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let pool: SharedPool = Arc::new(FairQueue::reader_fair(
        RingPool::new(4096)?,
        TurnLimits::default(),
    )?);
    let cancel = CancelToken::new();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        c.cancel();
    })?;

    let plain = SeedProducer::new(OsSeedSource::new(), &pool, ProducerConfig::default())?
        .with_cancel_token(cancel.clone())
        .spawn()?;
    let retrying = RetryingSource::with_sleeper(
        OsSeedSource::new(),
        RetryConfig::default(),
        ThreadSleeper::with_cancel(cancel.clone()),
    );
    let conditioned = ProducerConfig {
        chunk_size: 512,
        conditioning: Conditioning::Sha256,
    };
    let hashed = SeedProducer::new(retrying, &pool, conditioned)?
        .with_cancel_token(cancel.clone())
        .spawn()?;

    // Generators seeded from a constant hold no real entropy until their first
    // reseed, so each manager starts its count at zero.
    let thresholds = ReseedThresholds::default();
    let replace = EntropyManager::with_initial_entropy(
        Replace::new(Pcg64::seed_from_u64(1)),
        0,
        thresholds,
        Arc::clone(&pool),
    )?
    .with_cancel_token(cancel.clone());
    let jump = EntropyManager::with_initial_entropy(
        ArbitraryJump::new(Pcg64::seed_from_u64(2), 16)?,
        0,
        // A 128-bit jump distance leaves less headroom than a full Pcg64 seed.
        ReseedThresholds {
            desired: 96,
            minimum: 48,
        },
        Arc::clone(&pool),
    )?
    .with_cancel_token(cancel.clone());
    let mixed = EntropyManager::with_initial_entropy(
        Mix::new(Xoshiro256PlusPlus::seed_from_u64(3), 32, 256)?,
        0,
        thresholds,
        Arc::clone(&pool),
    )?
    .with_cancel_token(cancel.clone());

    let started = Instant::now();
    let results = thread::scope(|s| {
        let running = &*running;
        let a = s.spawn(move || estimate_pi(replace, running));
        let b = s.spawn(move || estimate_pi(jump, running));
        let c = s.spawn(move || estimate_pi(mixed, running));

        while running.load(Ordering::Relaxed) && started.elapsed() < RUN_FOR {
            thread::sleep(Duration::from_millis(50));
        }
        running.store(false, Ordering::SeqCst);

        [("replace", a), ("arbitrary-jump", b), ("xoshiro-mix", c)]
            .map(|(name, handle)| (name, handle.join()))
    });

    pool.close();
    for (name, handle) in [("os", plain), ("os+sha256", hashed)] {
        match handle.join() {
            Ok(Ok(stats)) => println!(
                "producer {name:<10} {} chunks, {} bytes, stopped: {}",
                stats.chunks, stats.bytes_written, stats.stop
            ),
            Ok(Err(e)) => println!("producer {name:<10} failed: {e}"),
            Err(_) => println!("producer {name:<10} panicked"),
        }
    }
    for (name, result) in results {
        match result {
            Ok((samples, pi, reseeds)) => {
                println!("{name:<15} {samples:>10} samples  pi~{pi:.5}  {reseeds} reseeds")
            }
            Err(_) => println!("{name:<15} panicked"),
        }
    }
    Ok(())
}
