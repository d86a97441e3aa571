//! End-to-end tests exercising the public API: configuration loading,
//! upstream construction, selection, outcome reporting, and diagnostics.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use stickylb::config::load_config;
use stickylb::metrics::MetricsCollector;
use stickylb::select::{Outcome, SelectError};
use stickylb::shared::SharedArena;
use stickylb::upstream::Upstream;
use stickylb::{SessionCache, SessionRequest};
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn build_upstreams(yaml: &str) -> (Vec<Arc<Upstream>>, Arc<MetricsCollector>) {
    let file = write_config(yaml);
    let config = load_config(file.path()).unwrap();

    let arena = SharedArena::new(config.global.shared_region_size);
    let metrics = Arc::new(MetricsCollector::new());
    let upstreams = config
        .upstreams
        .iter()
        .map(|u| Arc::new(Upstream::new(u, &arena, Arc::clone(&metrics)).unwrap()))
        .collect();
    (upstreams, metrics)
}

const SUFFIX_PAIR: &str = r#"
upstreams:
  - name: app
    affinity:
      cookie: JSESSIONID
      url_param: jsessionid
      match: suffix
    servers:
      - address: "127.0.0.1:9001"
        route: workerA
        max_fails: 2
        fail_timeout: 200ms
      - address: "127.0.0.1:9002"
        route: workerB
"#;

#[test]
fn test_cookie_affinity_sticks_across_requests() {
    let (upstreams, _) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];

    for _ in 0..10 {
        let mut ctx = upstream.start_request(&SessionRequest {
            cookie_header: Some("JSESSIONID=4fa1b8.workerB"),
            uri: "/cart",
        });
        let selected = upstream.select_peer(&mut ctx).unwrap();
        assert_eq!(selected.route, "workerB");
        assert_eq!(selected.address.port(), 9002);
        upstream.report_outcome(&mut ctx, Outcome::Success);
    }

    let snapshot = upstream.snapshot();
    assert_eq!(snapshot.total_requests, 10);
    assert_eq!(snapshot.total_active, 0);
    let worker_b = snapshot
        .peers
        .iter()
        .find(|p| p.route == "workerB")
        .unwrap();
    assert_eq!(worker_b.total, 10);
}

#[test]
fn test_url_affinity_when_cookies_disabled() {
    let (upstreams, _) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];

    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: None,
        uri: "/cart;jsessionid=4fa1b8.workerA?item=3",
    });
    let selected = upstream.select_peer(&mut ctx).unwrap();
    assert_eq!(selected.route, "workerA");
    upstream.report_outcome(&mut ctx, Outcome::Success);
}

#[test]
fn test_weighted_distribution_from_config() {
    let yaml = r#"
upstreams:
  - name: app
    servers:
      - address: "127.0.0.1:9001"
        route: a
        weight: 3
      - address: "127.0.0.1:9002"
        route: b
        weight: 2
      - address: "127.0.0.1:9003"
        route: c
        weight: 1
"#;
    let (upstreams, _) = build_upstreams(yaml);
    let upstream = &upstreams[0];

    let mut counts = [0u32; 3];
    for _ in 0..60 {
        let mut ctx = upstream.start_request(&SessionRequest {
            cookie_header: None,
            uri: "/",
        });
        let selected = upstream.select_peer(&mut ctx).unwrap();
        counts[selected.index] += 1;
        upstream.report_outcome(&mut ctx, Outcome::Success);
    }

    // Peers are weight-sorted, so index 0 carries weight 3.
    assert_eq!(counts, [30, 20, 10]);
}

#[test]
fn test_failover_and_recovery_through_facade() {
    let (upstreams, _) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];

    // Two failed attempts trip workerA's breaker (max_fails 2).
    let mut failed = 0;
    while failed < 2 {
        let mut ctx = upstream.start_request(&SessionRequest {
            cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
            uri: "/",
        });
        let selected = upstream.select_peer(&mut ctx).unwrap();
        let outcome = if selected.route == "workerA" {
            failed += 1;
            Outcome::Failure
        } else {
            Outcome::Success
        };
        upstream.report_outcome(&mut ctx, outcome);
    }

    // The session now lands on the healthy peer despite its token.
    for _ in 0..4 {
        let mut ctx = upstream.start_request(&SessionRequest {
            cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
            uri: "/",
        });
        let selected = upstream.select_peer(&mut ctx).unwrap();
        assert_eq!(selected.route, "workerB");
        upstream.report_outcome(&mut ctx, Outcome::Success);
    }

    // After fail_timeout (200ms) the pinned peer serves again.
    std::thread::sleep(Duration::from_millis(250));
    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
        uri: "/",
    });
    let selected = upstream.select_peer(&mut ctx).unwrap();
    assert_eq!(selected.route, "workerA");
    upstream.report_outcome(&mut ctx, Outcome::Success);
}

#[test]
fn test_retries_exhaust_to_busy() {
    let (upstreams, _) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];

    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: None,
        uri: "/",
    });

    let first = upstream.select_peer(&mut ctx).unwrap().index;
    upstream.report_outcome(&mut ctx, Outcome::Failure);

    let second = upstream.select_peer(&mut ctx).unwrap().index;
    assert_ne!(first, second);
    upstream.report_outcome(&mut ctx, Outcome::Failure);

    assert_eq!(ctx.tries(), 0);
    assert_eq!(
        upstream.select_peer(&mut ctx),
        Err(SelectError::NoPeerAvailable)
    );

    // Counters balance even though the request never succeeded.
    assert_eq!(upstream.snapshot().total_active, 0);
}

#[test]
fn test_concurrent_selection_storm() {
    let yaml = r#"
upstreams:
  - name: app
    affinity:
      match: suffix
    servers:
      - address: "127.0.0.1:9001"
        route: workerA
        weight: 2
        max_fails: 0
      - address: "127.0.0.1:9002"
        route: workerB
        max_fails: 0
      - address: "127.0.0.1:9003"
        route: workerC
        max_fails: 0
"#;
    let (upstreams, _) = build_upstreams(yaml);
    let upstream = Arc::clone(&upstreams[0]);

    let threads = 8;
    let per_thread = 500;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let upstream = Arc::clone(&upstream);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    let cookie_header = if i % 3 == 0 {
                        Some(format!("JSESSIONID=sess{t}x{i}.workerB"))
                    } else {
                        None
                    };
                    let mut ctx = upstream.start_request(&SessionRequest {
                        cookie_header: cookie_header.as_deref(),
                        uri: "/",
                    });
                    let selected = upstream.select_peer(&mut ctx).unwrap();
                    let outcome = if i % 7 == 0 {
                        Outcome::Failure
                    } else {
                        Outcome::Success
                    };
                    if cookie_header.is_some() {
                        assert_eq!(selected.route, "workerB");
                    }
                    upstream.report_outcome(&mut ctx, outcome);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = upstream.snapshot();
    let expected = (threads * per_thread) as u64;
    assert_eq!(snapshot.total_requests, expected);
    assert_eq!(snapshot.total_active, 0);

    let routed: u64 = snapshot.peers.iter().map(|p| p.total).sum();
    assert_eq!(routed, expected);
    for peer in &snapshot.peers {
        assert_eq!(peer.active, 0);
        assert!(peer.total > 0, "peer {} never selected", peer.name);
    }
}

#[test]
fn test_session_cache_follows_selection() {
    let (upstreams, _) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];
    let sessions: SessionCache<Vec<u8>> = SessionCache::new();

    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
        uri: "/",
    });
    let selected = upstream.select_peer(&mut ctx).unwrap();
    assert!(sessions.get(selected.index).is_none());
    sessions.save(selected.index, b"ticket".to_vec());
    upstream.report_outcome(&mut ctx, Outcome::Success);

    // The next request for the same session reaches the same peer and
    // finds its saved session.
    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
        uri: "/",
    });
    let selected = upstream.select_peer(&mut ctx).unwrap();
    assert_eq!(sessions.get(selected.index), Some(b"ticket".to_vec()));
    upstream.report_outcome(&mut ctx, Outcome::Success);
}

#[test]
fn test_status_text_after_traffic() {
    let (upstreams, metrics) = build_upstreams(SUFFIX_PAIR);
    let upstream = &upstreams[0];
    assert_eq!(upstream.name(), "app");

    let mut ctx = upstream.start_request(&SessionRequest {
        cookie_header: Some("JSESSIONID=4fa1b8.workerA"),
        uri: "/",
    });
    upstream.select_peer(&mut ctx).unwrap();
    upstream.report_outcome(&mut ctx, Outcome::Failure);

    let text = upstream.snapshot().to_string();
    assert!(text.contains("upstream app"));
    assert!(text.contains("route=workerA"));
    assert!(text.contains("fails=1/2"));
    assert!(text.contains("ago"));

    metrics.sync_gauges(&upstream.snapshot());
    let exposition = metrics.encode().unwrap();
    assert!(exposition.contains("stickylb_requests_total"));
    assert!(exposition.contains("stickylb_peer_failures_total"));
    assert!(exposition.contains("strategy=\"affinity\""));
}

#[test]
fn test_rejects_bad_config() {
    let file = write_config(
        r#"
upstreams:
  - name: app
    servers:
      - address: "127.0.0.1:9001"
        route: ""
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("empty route"));
}
