use crate::ConnectionGauge;

use proptest::prelude::*;
use tokio::time::{Duration, timeout};

#[test]
fn given_new_gauge_when_checked_then_idle_and_not_draining() {
    let gauge = ConnectionGauge::new();

    assert_eq!(gauge.active(), 0);
    assert!(!gauge.is_draining());
}

#[test]
fn given_permits_when_dropped_then_count_unwinds() {
    let gauge = ConnectionGauge::new();

    let first = gauge.acquire();
    let second = gauge.acquire();
    assert_eq!(gauge.active(), 2);

    drop(first);
    assert_eq!(gauge.active(), 1);
    drop(second);
    assert_eq!(gauge.active(), 0);
}

#[test]
fn given_panicking_scope_when_unwound_then_permit_released() {
    let gauge = ConnectionGauge::new();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _permit = gauge.acquire();
        panic!("boom");
    }));

    assert!(result.is_err());
    assert_eq!(gauge.active(), 0);
}

#[tokio::test]
async fn given_idle_gauge_when_wait_idle_then_resolves_immediately() {
    let gauge = ConnectionGauge::new();

    let result = timeout(Duration::from_millis(10), gauge.wait_idle()).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn given_busy_gauge_when_last_permit_drops_then_wait_idle_resolves() {
    let gauge = ConnectionGauge::new();
    let permit = gauge.acquire();

    let waiter = {
        let gauge = gauge.clone();
        tokio::spawn(async move { gauge.wait_idle().await })
    };

    // Still busy: the waiter must not resolve yet
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    drop(permit);

    let result = timeout(Duration::from_millis(100), waiter).await;
    assert!(result.is_ok(), "wait_idle should resolve after the last drop");
}

proptest! {
    /// The count always equals the number of outstanding permits, for any
    /// interleaving of acquires and releases; it can never go negative.
    #[test]
    fn gauge_count_matches_outstanding_permits(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
        let gauge = ConnectionGauge::new();
        let mut held = Vec::new();

        for acquire in ops {
            if acquire {
                held.push(gauge.acquire());
            } else {
                held.pop();
            }
            prop_assert_eq!(gauge.active(), held.len());
        }

        held.clear();
        prop_assert_eq!(gauge.active(), 0);
    }
}
