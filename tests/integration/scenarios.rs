//! End-to-end scenarios from files on disk to a laid out topology

use std::fs;

use chrono::Utc;
use infra_topology::{
    architecture::{ArchitectureIssue, read_architecture_file},
    build_topology,
    config::read_config_file,
    layout::LayoutDirection,
    live::{LiveContainer, LivePort, LiveSnapshot},
    probes::{Probe, container::ContainerProbe},
    reconcile::{EdgeHealth, NodeStatus},
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::tempdir;

use crate::helpers::{API_DB, TestRuntime, runtime_container};

fn container(name: &str, status: &str) -> LiveContainer {
    LiveContainer {
        id: String::new(),
        name: name.to_string(),
        image: String::new(),
        runtime_status: status.to_string(),
        cpu_percent: None,
        memory_mb: None,
        compose_project: None,
        compose_service: None,
        mounts: vec![],
        networks: vec![],
    }
}

fn with_containers(containers: Vec<LiveContainer>) -> LiveSnapshot {
    let mut snapshot = LiveSnapshot::default();
    snapshot.containers.record_success(containers, Utc::now());
    snapshot
}

#[test]
fn test_api_db_from_files() {
    let dir = tempdir().unwrap();
    let architecture_path = dir.path().join("architecture.json");
    let config_path = dir.path().join("config.json");
    fs::write(&architecture_path, API_DB).unwrap();
    fs::write(
        &config_path,
        r#"{ "pollIntervalMs": 2000, "layoutDirection": "TB", "rankSpacing": 100 }"#,
    )
    .unwrap();

    let doc = read_architecture_file(architecture_path.to_str().unwrap()).unwrap();
    let config = read_config_file(config_path.to_str().unwrap()).unwrap();
    assert_eq!(config.layout.direction, LayoutDirection::TopToBottom);
    assert!(doc.validate().is_empty());

    // api running
    let graph = build_topology(
        &doc,
        &with_containers(vec![container("api", "Up 5 minutes")]),
        &config.layout,
    );
    let api = graph.node("api").unwrap();
    let db = graph.node("db").unwrap();
    assert_eq!(api.node.status, NodeStatus::Running);
    assert_eq!(db.node.status, NodeStatus::Running);
    assert_eq!(graph.edges[0].health_color, EdgeHealth::Healthy);
    assert!(graph.edges[0].animated);

    let max_service_y = api.y + config.layout.node_height / 2.0;
    assert!(db.y > max_service_y + config.layout.rank_spacing);

    // api stopped
    let graph = build_topology(
        &doc,
        &with_containers(vec![container("api", "exited")]),
        &config.layout,
    );
    assert_eq!(graph.node("api").unwrap().node.status, NodeStatus::Stopped);
    assert_eq!(graph.node("db").unwrap().node.status, NodeStatus::Expected);
    assert_eq!(graph.edges[0].health_color, EdgeHealth::Degraded);

    // api gone
    let graph = build_topology(&doc, &with_containers(vec![]), &config.layout);
    assert_eq!(graph.node("api").unwrap().node.status, NodeStatus::Missing);
    assert_eq!(graph.edges[0].health_color, EdgeHealth::Broken);
    assert!(!graph.edges[0].animated);
}

#[test]
fn test_prefixed_container_and_unowned_port() {
    let doc = infra_topology::architecture::parse_architecture(API_DB).unwrap();

    let mut snapshot = with_containers(vec![container("myapp-api", "running")]);
    snapshot.ports.record_success(
        vec![LivePort {
            port: 5432,
            listening: true,
            owning_process: None,
        }],
        Utc::now(),
    );

    let graph = build_topology(&doc, &snapshot, &Default::default());

    let api = &graph.node("api").unwrap().node;
    assert_eq!(api.status, NodeStatus::Running);
    assert_eq!(api.matched_container.as_deref(), Some("myapp-api"));
    assert_eq!(graph.node("db").unwrap().node.status, NodeStatus::Running);
    assert_eq!(graph.edges[0].health_color, EdgeHealth::Healthy);
    assert!(graph.edges[0].animated);
}

#[test]
fn test_dangling_edge_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("architecture.json");
    fs::write(
        &path,
        r#"{
            "nodes": [
                { "id": "api", "kind": "service", "serviceRef": "api" },
                { "id": "db", "kind": "datastore", "volumeRef": "pgdata" }
            ],
            "edges": [
                { "id": "api-db", "source": "api", "target": "db", "kind": "network" },
                { "id": "api-cache", "source": "api", "target": "cache", "kind": "network" },
                { "id": "loop", "source": "api", "target": "api", "kind": "network" }
            ]
        }"#,
    )
    .unwrap();

    let doc = read_architecture_file(path.to_str().unwrap()).unwrap();
    assert_eq!(
        doc.validate(),
        vec![ArchitectureIssue::DanglingEdge {
            edge: "api-cache".to_string(),
            endpoint: "cache".to_string(),
        }]
    );

    let graph = build_topology(
        &doc,
        &with_containers(vec![container("api", "running")]),
        &Default::default(),
    );

    let edge_ids: Vec<&str> = graph
        .edges
        .iter()
        .map(|edge| edge.declared.id.as_str())
        .collect();
    assert_eq!(edge_ids, vec!["api-db", "loop"]);
    assert_eq!(graph.nodes.len(), 2);
}

#[test]
fn test_worker_does_not_claim_api_container() {
    let doc = infra_topology::architecture::parse_architecture(
        r#"{
            "nodes": [
                { "id": "api", "kind": "service", "serviceRef": "datatalk-api" },
                { "id": "worker", "kind": "service", "serviceRef": "datatalk-worker" }
            ]
        }"#,
    )
    .unwrap();

    let graph = build_topology(
        &doc,
        &with_containers(vec![container("datatalk-api", "running")]),
        &Default::default(),
    );

    assert_eq!(graph.node("api").unwrap().node.status, NodeStatus::Running);
    assert_eq!(graph.node("worker").unwrap().node.status, NodeStatus::Missing);
}

#[tokio::test]
async fn test_ambiguous_match_prefers_first_sorted_container() {
    let probe = ContainerProbe::new(TestRuntime::with(vec![
        runtime_container("shop-cache-2", "exited"),
        runtime_container("shop-cache-1", "running"),
    ]));
    let containers = probe.collect(Duration::from_secs(1)).await.unwrap();

    let doc = infra_topology::architecture::parse_architecture(
        r#"{ "nodes": [ { "id": "cache", "kind": "service", "serviceRef": "cache" } ] }"#,
    )
    .unwrap();
    let graph = build_topology(&doc, &with_containers(containers), &Default::default());

    let cache = &graph.node("cache").unwrap().node;
    assert_eq!(cache.matched_container.as_deref(), Some("shop-cache-1"));
    assert_eq!(cache.status, NodeStatus::Running);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "pollIntervalMs": 0 }"#).unwrap();

    assert!(read_config_file(path.to_str().unwrap()).is_err());
}
