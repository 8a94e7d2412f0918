//! Readiness probing against mock listeners.

mod common;

use std::time::{Duration, Instant};

use common::{quick_probe, start_stat_backend, start_tls_stat_backend, unused_port, TestPki, STAT_RESPONSE};
use zk_service_runner::config::TlsConfig;
use zk_service_runner::health::{ProbeError, ProbeTarget, ReadinessProber};

#[tokio::test]
async fn no_listener_gives_up_within_budget() {
    let config = quick_probe(3);
    let budget = config.retry_delay() * (config.max_attempts - 1);
    let prober = ReadinessProber::new(config);
    let target = ProbeTarget::new("127.0.0.1", unused_port());

    let started = Instant::now();
    assert!(!prober.probe(&target, &TlsConfig::insecure()).await);

    let elapsed = started.elapsed();
    assert!(elapsed >= budget, "returned after {elapsed:?}, before {budget:?}");
    assert!(
        elapsed < budget + Duration::from_millis(250),
        "returned after {elapsed:?}, budget {budget:?}"
    );
}

#[tokio::test]
async fn single_attempt_does_not_sleep() {
    let prober = ReadinessProber::new(quick_probe(1));
    let target = ProbeTarget::new("127.0.0.1", unused_port());
    let err = prober.attempt(&target, &TlsConfig::insecure()).await.unwrap_err();
    assert!(matches!(err, ProbeError::Connect(_)), "{err}");
    assert!(!prober.probe(&target, &TlsConfig::insecure()).await);
}

#[tokio::test]
async fn version_line_is_up_on_first_attempt() {
    let addr = start_stat_backend(STAT_RESPONSE).await;
    let prober = ReadinessProber::new(quick_probe(1));

    assert!(prober.probe(&ProbeTarget::loopback(addr.port()), &TlsConfig::insecure()).await);
}

#[tokio::test]
async fn other_reply_is_not_up() {
    let addr = start_stat_backend("imok").await;
    let prober = ReadinessProber::new(quick_probe(2));
    let target = ProbeTarget::new("127.0.0.1", addr.port());

    let err = prober.attempt(&target, &TlsConfig::insecure()).await.unwrap_err();
    assert!(matches!(err, ProbeError::UnexpectedResponse(ref line) if line == "imok"), "{err}");
    assert!(!prober.probe(&target, &TlsConfig::insecure()).await);
}

#[tokio::test]
async fn tls_listener_is_up_after_handshake() {
    let pki = TestPki::generate();
    let addr = start_tls_stat_backend(&pki.material(), STAT_RESPONSE).await;
    let prober = ReadinessProber::new(quick_probe(1));

    assert!(prober.probe(&ProbeTarget::loopback(addr.port()), &pki.tls()).await);
}

#[tokio::test]
async fn untrusted_tls_listener_is_never_up() {
    let pki = TestPki::generate();
    let addr = start_tls_stat_backend(&pki.material(), STAT_RESPONSE).await;
    let prober = ReadinessProber::new(quick_probe(3));
    let target = ProbeTarget::loopback(addr.port());

    let err = prober.attempt(&target, &pki.untrusting_tls()).await.unwrap_err();
    assert!(matches!(err, ProbeError::Handshake(_)), "{err}");
    assert!(!prober.probe(&target, &pki.untrusting_tls()).await);
}

#[tokio::test]
async fn credential_failures_are_retried_not_raised() {
    let addr = start_stat_backend(STAT_RESPONSE).await;
    let tls = TlsConfig::secure("/missing/keystore.pem", "pw", "/missing/truststore.pem", "pw");
    let prober = ReadinessProber::new(quick_probe(2));
    let target = ProbeTarget::loopback(addr.port());

    let err = prober.attempt(&target, &tls).await.unwrap_err();
    assert!(matches!(err, ProbeError::Credentials(_)), "{err}");
    assert!(!prober.probe(&target, &tls).await);
}

#[tokio::test]
async fn silent_peer_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = quick_probe(1);
    config.io_timeout_ms = 100;
    let prober = ReadinessProber::new(config);
    let err = prober
        .attempt(&ProbeTarget::new("127.0.0.1", port), &TlsConfig::insecure())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Timeout(_)), "{err}");
}
