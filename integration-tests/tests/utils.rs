#![allow(dead_code)]

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rollout_defs::{Parameters, PollSettings};
use rollout_utils::{IdGenerator, setup_logging};

static LOGGING: Once = Once::new();

/// Runs a test body with logging installed once per test binary.
pub async fn test_scaffold<F, Fut>(function_to_test: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    LOGGING.call_once(|| {
        // A logger may already be installed by another harness.
        let _ = setup_logging();
    });
    function_to_test().await;
}

pub fn parameters() -> Parameters {
    Parameters {
        namespace: "demo".to_string(),
        storage_class: "local-path".to_string(),
        version: "7.2.4".to_string(),
        node_address: "10.0.0.12".to_string(),
    }
}

pub fn versions() -> Vec<String> {
    vec!["7.0.14".to_string(), "7.2.4".to_string()]
}

/// One second between polls, discovery gives up after ten attempts.
pub fn poll_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(1),
        discovery_interval: Duration::from_secs(1),
        discovery_attempts: 10,
        apply_timeout: Duration::from_secs(10),
    }
}

pub fn seeded_ids() -> IdGenerator<StdRng> {
    IdGenerator::with_rng(StdRng::seed_from_u64(7))
}
