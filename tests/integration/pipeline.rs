//! Probe actors → aggregator → topology actor
//!
//! These tests verify that:
//! - probe results flow into the topology without manual wiring
//! - a failed or timed out probe leaves the previous data (and therefore
//!   node statuses) in place, flagged stale
//! - probes fail independently of each other

use std::time::Duration;

use infra_topology::{
    actors::{ProbeHandle, TopologyHandle},
    architecture::parse_architecture,
    build_topology,
    layout::LayoutConfig,
    live::ProcessRuntime,
    probes::{container::ContainerProbe, ports::PortScanProbe},
    reconcile::{EdgeHealth, NodeStatus},
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{API_DB, TestRuntime, aggregator, runtime_container, wait_for_topology};

const PROBE_TIMEOUT: Duration = Duration::from_millis(200);
const NEVER: Duration = Duration::from_secs(3600);

fn ports_body(listening: bool) -> serde_json::Value {
    serde_json::json!({
        "ports": [
            { "port": 8080, "listening": listening, "process": { "pid": 4242, "command": "node", "runtime": "process" } },
            { "port": 5432, "listening": true, "process": { "pid": 99, "command": "postgres", "runtime": "docker" } }
        ]
    })
}

#[tokio::test]
async fn test_container_probe_drives_topology() {
    let aggregator = aggregator();
    let runtime = TestRuntime::with(vec![
        runtime_container("shop-db-1", "running"),
        runtime_container("shop-api-1", "running"),
    ]);

    let topology = TopologyHandle::spawn(
        parse_architecture(API_DB).unwrap(),
        LayoutConfig::default(),
        aggregator.clone(),
    );
    let containers = ProbeHandle::spawn(
        ContainerProbe::new(runtime),
        aggregator.clone(),
        NEVER,
        PROBE_TIMEOUT,
    );

    let graph = wait_for_topology(&topology, |graph| {
        graph
            .node("api")
            .is_some_and(|node| node.node.status == NodeStatus::Running)
    })
    .await;

    let api = &graph.node("api").unwrap().node;
    assert_eq!(api.status, NodeStatus::Running);
    assert_eq!(api.matched_container.as_deref(), Some("shop-api-1"));
    assert_eq!(api.cpu_percent, Some(40.0));
    assert_eq!(api.memory_mb, Some(256));
    assert_eq!(api.resolved_compose_project.as_deref(), Some("shop"));
    assert_eq!(api.resolved_compose_service.as_deref(), Some("shop-api-1"));
    assert_eq!(graph.node("db").unwrap().node.status, NodeStatus::Running);

    assert_eq!(graph.edges[0].health_color, EdgeHealth::Healthy);
    assert!(graph.edges[0].animated);

    containers.shutdown().await.unwrap();
    topology.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_container_runtime_failure_keeps_previous_state() {
    let aggregator = aggregator();
    let runtime = TestRuntime::with(vec![runtime_container("api", "running")]);
    let handle = ProbeHandle::spawn(
        ContainerProbe::new(runtime.clone()),
        aggregator.clone(),
        NEVER,
        PROBE_TIMEOUT,
    );
    let doc = parse_architecture(API_DB).unwrap();

    handle.poll_now().await.unwrap();
    let before = build_topology(&doc, &*aggregator.snapshot().await, &LayoutConfig::default());

    runtime.set_failing(true);
    assert!(handle.poll_now().await.is_err());

    let snapshot = aggregator.snapshot().await;
    let after = build_topology(&doc, &snapshot, &LayoutConfig::default());

    assert!(snapshot.containers.stale);
    assert!(snapshot.containers.last_error.is_some());
    assert_eq!(
        before.node("api").unwrap().node.status,
        after.node("api").unwrap().node.status
    );
    assert!(after.freshness.containers.stale);

    // the next success clears the flag
    runtime.set_failing(false);
    handle.poll_now().await.unwrap();
    assert!(!aggregator.snapshot().await.containers.stale);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_port_scan_timeout_keeps_previous_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ports_body(true)))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ports_body(false))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let doc = parse_architecture(API_DB).unwrap();
    let aggregator = aggregator();
    let mut events = aggregator.subscribe();
    let handle = ProbeHandle::spawn(
        PortScanProbe::new(format!("{}/api/ports", mock_server.uri()), doc.harvest_ports()),
        aggregator.clone(),
        NEVER,
        PROBE_TIMEOUT,
    );

    // the startup tick gets the fast response
    let event = events.recv().await.unwrap();
    assert!(event.success);

    let snapshot = aggregator.snapshot().await;
    assert_eq!(snapshot.ports().len(), 2);
    let before = build_topology(&doc, &snapshot, &LayoutConfig::default());
    let api_before = &before.node("api").unwrap().node;
    assert_eq!(api_before.status, NodeStatus::Running);
    assert_eq!(api_before.runtime, Some(ProcessRuntime::OsProcess));

    // the delayed mock answers from now on
    let result = handle.poll_now().await;
    assert!(result.is_err());

    let snapshot = aggregator.snapshot().await;
    assert!(snapshot.ports.stale);
    assert!(snapshot.port(8080).is_some_and(|port| port.listening));

    let after = build_topology(&doc, &snapshot, &LayoutConfig::default());
    assert_eq!(after.node("api").unwrap().node.status, NodeStatus::Running);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_probes_fail_independently() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let aggregator = aggregator();
    let containers = ProbeHandle::spawn(
        ContainerProbe::new(TestRuntime::with(vec![runtime_container("api", "exited")])),
        aggregator.clone(),
        NEVER,
        PROBE_TIMEOUT,
    );
    let ports = ProbeHandle::spawn(
        PortScanProbe::new(mock_server.uri(), vec![8080]),
        aggregator.clone(),
        NEVER,
        PROBE_TIMEOUT,
    );

    assert!(containers.poll_now().await.is_ok());
    assert!(ports.poll_now().await.is_err());

    let snapshot = aggregator.snapshot().await;
    assert!(!snapshot.containers.stale);
    assert!(snapshot.ports.stale);
    assert!(snapshot.ports.data.is_none());

    let graph = build_topology(
        &parse_architecture(API_DB).unwrap(),
        &snapshot,
        &LayoutConfig::default(),
    );
    assert_eq!(graph.node("api").unwrap().node.status, NodeStatus::Stopped);
    assert_eq!(graph.node("db").unwrap().node.status, NodeStatus::Expected);
    assert_eq!(graph.edges[0].health_color, EdgeHealth::Degraded);

    containers.shutdown().await.unwrap();
    ports.shutdown().await.unwrap();
}
