mod common;

use common::{FakeBackend, FakeDiscovery, Listing, gateway, instance};
use memgate_domain::CircuitState;
use memgate_gateway::GatewayError;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_get_while_down_validates_and_completes() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    backend.seed("user:1", b"alice");
    let gateway = gateway(&discovery, &backend);

    assert_eq!(gateway.state(), CircuitState::Down);

    let value = gateway.get("user:1").await.unwrap();

    assert_eq!(value, b"alice".to_vec());
    assert_eq!(gateway.state(), CircuitState::Up);
    assert_eq!(gateway.address().as_deref(), Some("10.0.0.3:6379"));
    assert_eq!(backend.dialed(), vec!["10.0.0.3:6379".to_string()]);
    assert_eq!(discovery.calls(), 1);
}

#[tokio::test]
async fn test_set_while_down_validates_and_completes() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    gateway.set("user:2", b"bob").await.unwrap();

    assert_eq!(backend.value("user:2"), Some(b"bob".to_vec()));
    assert_eq!(gateway.state(), CircuitState::Up);
}

#[tokio::test]
async fn test_up_circuit_skips_discovery() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    gateway.set("a", b"1").await.unwrap();
    gateway.set("b", b"2").await.unwrap();
    gateway.get("a").await.unwrap();

    assert_eq!(discovery.calls(), 1);
    assert_eq!(backend.dialed().len(), 1, "pooled connection is reused");
}

#[tokio::test]
async fn test_failing_discovery_leaves_circuit_down() {
    let discovery = FakeDiscovery::failing();
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    let err = gateway.get("user:1").await.unwrap_err();
    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert_eq!(gateway.state(), CircuitState::Down);

    let err = gateway.set("user:1", b"alice").await.unwrap_err();
    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert_eq!(gateway.state(), CircuitState::Down);

    // One validation attempt per call, no network traffic.
    assert_eq!(discovery.calls(), 2);
    assert!(backend.log().is_empty());
    assert!(backend.dialed().is_empty());
}

#[tokio::test]
async fn test_mismatched_or_missing_instance_stays_down() {
    let discovery = FakeDiscovery::failing();
    discovery.respond_with(instance("someone-else", "10.0.0.9", 6379));
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    assert!(gateway.get("k").await.unwrap_err().is_unavailable());
    assert_eq!(gateway.state(), CircuitState::Down);

    discovery.respond_with(Listing::Empty);
    assert!(gateway.get("k").await.unwrap_err().is_unavailable());
    assert_eq!(gateway.state(), CircuitState::Down);
    assert!(backend.dialed().is_empty());
}

#[tokio::test]
async fn test_incomplete_address_stays_down() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 0);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    assert!(matches!(
        gateway.set("k", b"v").await,
        Err(GatewayError::CacheUnavailable { .. })
    ));
    assert_eq!(gateway.state(), CircuitState::Down);

    discovery.respond_with(instance(common::INSTANCE, "", 6379));
    assert!(gateway.set("k", b"v").await.is_err());
    assert_eq!(gateway.state(), CircuitState::Down);
    assert!(backend.dialed().is_empty());
}

#[tokio::test]
async fn test_increment_while_down_never_discovers() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    let err = gateway.increment_counter("hits").await.unwrap_err();

    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert_eq!(discovery.calls(), 0);
    assert_eq!(gateway.state(), CircuitState::Down);
    assert!(backend.log().is_empty());
}

#[tokio::test]
async fn test_increment_while_up() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    gateway.try_activate().await.unwrap();

    assert_eq!(gateway.increment_counter("hits").await.unwrap(), 1);
    assert_eq!(gateway.increment_counter("hits").await.unwrap(), 2);
    assert_eq!(discovery.calls(), 1);
}

#[tokio::test]
async fn test_missing_key_keeps_circuit_up() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    let err = gateway.get("absent").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.is_unavailable());
    assert_eq!(gateway.state(), CircuitState::Up);
}

#[tokio::test]
async fn test_command_failure_trips_and_next_call_revalidates() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    gateway.set("a", b"1").await.unwrap();
    assert_eq!(discovery.calls(), 1);

    backend.break_connections(true);
    let err = gateway.get("a").await.unwrap_err();
    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert_eq!(gateway.state(), CircuitState::Down);
    assert!(gateway.address().is_none());

    backend.break_connections(false);
    assert_eq!(gateway.get("a").await.unwrap(), b"1".to_vec());
    assert_eq!(discovery.calls(), 2);
    assert_eq!(gateway.state(), CircuitState::Up);
}

#[tokio::test]
async fn test_increment_failure_trips_without_revalidating() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);
    gateway.try_activate().await.unwrap();

    backend.break_connections(true);
    assert!(gateway.increment_counter("hits").await.is_err());
    assert_eq!(gateway.state(), CircuitState::Down);

    backend.break_connections(false);
    assert!(gateway.increment_counter("hits").await.is_err());
    assert_eq!(discovery.calls(), 1);
}

#[tokio::test]
async fn test_revalidation_builds_pool_for_new_address() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);

    gateway.set("a", b"1").await.unwrap();
    backend.break_connections(true);
    assert!(gateway.set("a", b"2").await.is_err());
    backend.break_connections(false);

    discovery.respond_with(instance(common::INSTANCE, "10.0.0.4", 6380));
    gateway.set("a", b"3").await.unwrap();

    assert_eq!(gateway.address().as_deref(), Some("10.0.0.4:6380"));
    assert_eq!(
        backend.dialed(),
        vec!["10.0.0.3:6379".to_string(), "10.0.0.4:6380".to_string()]
    );
}

#[tokio::test]
async fn test_failed_forced_validation_drops_circuit() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);
    gateway.try_activate().await.unwrap();

    discovery.respond_with(Listing::Fail);
    assert!(gateway.try_activate().await.is_err());

    assert_eq!(gateway.state(), CircuitState::Down);
}

#[tokio::test]
async fn test_slow_backend_times_out_instead_of_hanging() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);
    gateway.try_activate().await.unwrap();
    backend.respond_after(Duration::from_millis(400));

    let started = Instant::now();
    let err = gateway.get("a").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(350));
    assert!(matches!(
        err,
        GatewayError::Timeout {
            operation: "GET",
            timeout_ms: 100
        }
    ));
    assert_eq!(gateway.state(), CircuitState::Down);

    let err = gateway.set("a", b"1").await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(gateway.state(), CircuitState::Down);

    gateway.try_activate().await.unwrap();
    let started = Instant::now();
    let err = gateway.increment_counter("hits").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(350));
    assert!(matches!(
        err,
        GatewayError::Timeout {
            operation: "INCR",
            timeout_ms: 50
        }
    ));
    assert_eq!(gateway.state(), CircuitState::Down);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_gateway() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = Arc::new(gateway(&discovery, &backend));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                let key = format!("user:{i}");
                gateway.set(&key, key.as_bytes()).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(gateway.state(), CircuitState::Up);
    assert_eq!(backend.sets().len(), 16);
    // Racing callers may each pay for discovery; never more than one per call.
    assert!((1..=16).contains(&discovery.calls()));
}

#[tokio::test]
async fn test_get_string_decodes_utf8() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    backend.seed("greeting", "héllo".as_bytes());
    backend.seed("blob", &[0xff, 0xfe]);
    let gateway = gateway(&discovery, &backend);

    assert_eq!(gateway.get_string("greeting").await.unwrap(), "héllo");
    assert!(matches!(
        gateway.get_string("blob").await,
        Err(GatewayError::Redis(_))
    ));
    assert_eq!(gateway.state(), CircuitState::Up);
}

#[tokio::test]
async fn test_refused_connect_trips_circuit() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);
    gateway.try_activate().await.unwrap();

    backend.refuse_connect(true);
    let err = gateway.get("a").await.unwrap_err();
    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(gateway.state(), CircuitState::Down);

    backend.refuse_connect(false);
    gateway.set("a", b"1").await.unwrap();
    assert_eq!(gateway.state(), CircuitState::Up);
    assert_eq!(discovery.calls(), 2);
}

#[tokio::test]
async fn test_wrong_reply_shape_trips_circuit() {
    let discovery = FakeDiscovery::serving("10.0.0.3", 6379);
    let backend = FakeBackend::new();
    let gateway = gateway(&discovery, &backend);
    gateway.set("a", b"1").await.unwrap();

    backend.garble_replies(true);
    let err = gateway.get("a").await.unwrap_err();
    assert!(matches!(err, GatewayError::CacheUnavailable { .. }));
    assert!(err.to_string().contains("unexpected reply to GET"));
    assert_eq!(gateway.state(), CircuitState::Down);

    gateway.try_activate().await.unwrap();
    let err = gateway.increment_counter("hits").await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(gateway.state(), CircuitState::Down);
}
