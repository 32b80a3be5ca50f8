use core_logic::{DelayKind, DelayPolicy, DelayRange, DelaysConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config() -> DelaysConfig {
    DelaysConfig {
        pre_start: DelayRange::new(0.0, 5.0),
        post_special_module: DelayRange::new(10.0, 90.0),
        between_wallets: DelayRange::new(66.0, 222.0),
        between_transactions: DelayRange::new(3.0, 8.0),
        between_modules: DelayRange::new(0.25, 0.75),
    }
}

#[test]
fn test_samples_stay_within_bounds() {
    let policy = DelayPolicy::new(config()).unwrap();

    for kind in DelayKind::ALL {
        let range = policy.range(kind);
        let lo = Duration::from_secs_f64(range.min);
        let hi = Duration::from_secs_f64(range.max);
        for _ in 0..10_000 {
            let d = policy.sample(kind);
            assert!(d >= lo && d <= hi, "{:?} sample {:?} outside [{:?}, {:?}]", kind, d, lo, hi);
        }
    }
}

#[test]
fn test_degenerate_range_returns_exact_value() {
    let mut cfg = config();
    cfg.between_transactions = DelayRange::new(4.5, 4.5);
    let policy = DelayPolicy::new(cfg).unwrap();

    assert_eq!(
        policy.sample(DelayKind::BetweenTransactions),
        Duration::from_secs_f64(4.5)
    );
}

#[test]
fn test_same_seed_same_sequence() {
    let a = DelayPolicy::from_seed(config(), 7).unwrap();
    let b = DelayPolicy::from_seed(config(), 7).unwrap();

    let seq_a: Vec<Duration> = (0..100).map(|_| a.sample(DelayKind::BetweenWallets)).collect();
    let seq_b: Vec<Duration> = (0..100).map(|_| b.sample(DelayKind::BetweenWallets)).collect();
    assert_eq!(seq_a, seq_b);

    a.reseed(7);
    let replay: Vec<Duration> = (0..100).map(|_| a.sample(DelayKind::BetweenWallets)).collect();
    assert_eq!(replay, seq_a);
}

#[test]
fn test_invalid_ranges_are_rejected() {
    let mut cfg = config();
    cfg.between_modules = DelayRange::new(10.0, 1.0);
    assert!(DelayPolicy::new(cfg).is_err());

    let mut cfg = config();
    cfg.pre_start = DelayRange::new(-1.0, 1.0);
    assert!(DelayPolicy::new(cfg).is_err());

    let mut cfg = config();
    cfg.pre_start = DelayRange::new(0.0, f64::NAN);
    assert!(DelayPolicy::new(cfg).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_wait_sleeps_for_sampled_duration() {
    let mut cfg = DelaysConfig::zero();
    cfg.between_modules = DelayRange::new(30.0, 30.0);
    let policy = DelayPolicy::new(cfg).unwrap();
    let token = CancellationToken::new();

    let start = tokio::time::Instant::now();
    assert!(policy.wait(DelayKind::BetweenModules, &token).await);
    assert!(start.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_wait_returns_early_on_cancel() {
    let mut cfg = DelaysConfig::zero();
    cfg.between_wallets = DelayRange::new(600.0, 600.0);
    let policy = DelayPolicy::new(cfg).unwrap();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let start = tokio::time::Instant::now();
    assert!(!policy.wait(DelayKind::BetweenWallets, &token).await);
    assert!(start.elapsed() < Duration::from_secs(600));
}
