mod common;

use lab_bridge::{MetricsRegistry, MetricsServer};

fn get(addr: std::net::SocketAddr, path: &str) -> reqwest::blocking::Response {
    reqwest::blocking::get(format!("http://{addr}{path}")).unwrap()
}

#[test]
fn healthz_and_metrics_reflect_recorded_cells() {
    let registry = MetricsRegistry::new();
    let server = MetricsServer::new(registry.clone()).with_bind_addr("127.0.0.1");
    let addr = server.start(0, true).unwrap();

    let resp = get(addr, "/healthz");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.text().unwrap(), r#"{"ok":true}"#);

    registry.record_cell("llama-7b", "batch", "b=8", 31.0, 0);
    registry.record_cell("llama-7b", "batch", "b=16", 44.5, 1);
    registry.record_sweep_completion("llama-7b", "batch", 44.5);

    let resp = get(addr, "/metrics");
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let body = resp.text().unwrap();

    let tps = "llama_benchmark_throughput_tps";
    assert_eq!(common::sample(&body, tps, &[("model", "llama-7b"), ("config", "b=8")]), Some(31.0));
    assert_eq!(common::sample(&body, tps, &[("model", "llama-7b"), ("config", "b=16")]), Some(44.5));
    assert_eq!(
        common::sample(&body, "llama_benchmark_errors_total", &[("sweep_type", "batch")]),
        Some(1.0)
    );
    assert_eq!(
        common::sample(&body, "llama_benchmark_sweeps_total", &[("sweep_type", "batch")]),
        Some(1.0)
    );
    assert!(common::sample(&body, "llama_benchmark_last_sweep_timestamp", &[]).unwrap() > 0.0);

    assert_eq!(get(addr, "/").status(), 404);
    assert_eq!(get(addr, "/metrics/extra").status(), 404);
}

#[test]
fn metrics_route_absent_when_registry_disabled() {
    let server = MetricsServer::new(MetricsRegistry::disabled()).with_bind_addr("127.0.0.1");
    let addr = server.start(0, true).unwrap();

    let resp = get(addr, "/healthz");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().unwrap(), r#"{"ok":true}"#);
    assert_eq!(get(addr, "/metrics").status(), 404);
}

#[test]
fn second_start_is_noop() {
    let server = MetricsServer::new(MetricsRegistry::new()).with_bind_addr("127.0.0.1");
    let first = server.start(0, true).unwrap();
    let second = server.start(0, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(server.local_addr(), Some(first));
}

#[test]
fn occupied_port_is_a_bind_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let server = MetricsServer::new(MetricsRegistry::new()).with_bind_addr("127.0.0.1");
    let err = server.start(port, true).unwrap_err();
    assert!(matches!(err, lab_bridge::BridgeError::Bind { .. }));
    assert!(server.local_addr().is_none());
}
