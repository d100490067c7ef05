mod common;
use common::*;

use hoymiles_bridge::dtu::{power_level_from_bits, power_level_to_bits, POWER_LIMIT_COIL};
use hoymiles_bridge::power_limit::{Outcome, PowerLimiter};
use std::time::Duration;

#[test]
fn bits_are_lsb_first() {
    assert_eq!(
        power_level_to_bits(5),
        [true, false, true, false, false, false, false, false]
    );
    assert_eq!(
        power_level_to_bits(100),
        [false, false, true, false, false, true, true, false]
    );
    assert_eq!(power_level_from_bits(&power_level_to_bits(100)), 100);
    assert_eq!(power_level_from_bits(&[true; 10]), 255);
}

#[tokio::test]
async fn write_then_read_round_trips() {
    common_setup();

    let mock = MockDtu::new();
    let mut dtu = Factory::dtu(&mock);

    for percentage in 5..=100 {
        assert!(dtu.write_power_level(percentage).await.unwrap());
        assert_eq!(dtu.read_power_level().await.unwrap(), percentage);
    }

    let state = mock.state();
    assert_eq!(state.coils.get(&POWER_LIMIT_COIL), Some(&false)); // 100 is even
    assert_eq!(state.coils.len(), 8);
}

#[tokio::test]
async fn out_of_range_is_rejected_without_io() {
    common_setup();

    let mock = MockDtu::new();
    let mut dtu = Factory::dtu(&mock);

    for percentage in [0, 3, 4, 101, 255] {
        assert!(matches!(
            dtu.write_power_level(percentage).await,
            Err(Error::Validation(_))
        ));
    }

    assert_eq!(mock.state().connect_attempts, 0);
    assert_eq!(mock.state().coil_writes, 0);
}

#[tokio::test]
async fn refused_write_returns_false() {
    common_setup();

    let mock = MockDtu::new();
    mock.state().refuse_coil_writes = true;
    let mut dtu = Factory::dtu(&mock);

    assert!(!dtu.write_power_level(50).await.unwrap());
}

#[tokio::test]
async fn limiter_throttles_and_keeps_pending_value() {
    common_setup();

    let mock = MockDtu::new();
    let mut dtu = Factory::dtu(&mock);
    let mut limiter = PowerLimiter::new(Duration::from_secs(3600));
    assert_eq!(limiter.current(), 100);

    assert_eq!(limiter.set(&mut dtu, 80).await.unwrap(), Outcome::Applied(80));
    assert_eq!(limiter.current(), 80);

    match limiter.set(&mut dtu, 60).await.unwrap() {
        Outcome::Throttled { pending, retry_in } => {
            assert_eq!(pending, 60);
            assert!(retry_in <= Duration::from_secs(3600));
        }
        other => panic!("expected throttling, got {:?}", other),
    }
    assert_eq!(limiter.pending(), Some(60));
    assert_eq!(limiter.current(), 80);
    assert_eq!(mock.state().coil_writes, 1);

    // still inside the interval
    assert_eq!(limiter.flush(&mut dtu).await.unwrap(), None);
    assert_eq!(dtu.read_power_level().await.unwrap(), 80);
}

#[tokio::test]
async fn limiter_flushes_pending_once_allowed() {
    common_setup();

    let mock = MockDtu::new();
    let mut dtu = Factory::dtu(&mock);
    let mut limiter = PowerLimiter::new(Duration::from_millis(50));

    limiter.set(&mut dtu, 70).await.unwrap();
    assert!(matches!(
        limiter.set(&mut dtu, 40).await.unwrap(),
        Outcome::Throttled { pending: 40, .. }
    ));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(limiter.flush(&mut dtu).await.unwrap(), Some(Outcome::Applied(40)));
    assert_eq!(limiter.pending(), None);
    assert_eq!(dtu.read_power_level().await.unwrap(), 40);
    assert_eq!(limiter.flush(&mut dtu).await.unwrap(), None);
}

#[tokio::test]
async fn limiter_validates_before_throttling() {
    common_setup();

    let mock = MockDtu::new();
    let mut dtu = Factory::dtu(&mock);
    let mut limiter = PowerLimiter::default();

    assert!(matches!(limiter.set(&mut dtu, 2).await, Err(Error::Validation(_))));
    assert_eq!(limiter.pending(), None);
}

#[tokio::test]
async fn refused_write_does_not_start_the_interval() {
    common_setup();

    let mock = MockDtu::new();
    mock.state().refuse_coil_writes = true;
    let mut dtu = Factory::dtu(&mock);
    let mut limiter = PowerLimiter::new(Duration::from_secs(3600));

    assert_eq!(limiter.set(&mut dtu, 50).await.unwrap(), Outcome::Refused(50));
    mock.state().refuse_coil_writes = false;
    assert_eq!(limiter.set(&mut dtu, 50).await.unwrap(), Outcome::Applied(50));
}
