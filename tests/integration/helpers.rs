//! Helper functions for integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use infra_topology::{
    LiveStateAggregator,
    actors::TopologyHandle,
    probes::{
        ProbeError, ProbeResult,
        container::{ContainerRuntime, CpuSample, RuntimeContainer, StatsSample},
    },
    topology::TopologyGraph,
};
use tokio::sync::broadcast;

/// `api` talks to `db` over tcp:5432
pub const API_DB: &str = r#"{
    "nodes": [
        { "id": "api", "kind": "service", "label": "API", "serviceRef": "api", "ports": ["8080:80"], "group": "shop" },
        { "id": "db", "kind": "datastore", "label": "Postgres", "volumeRef": "pgdata", "ports": ["5432"], "group": "shop" }
    ],
    "edges": [
        { "id": "api-db", "source": "api", "target": "db", "kind": "network", "protocol": "tcp", "port": 5432 }
    ],
    "groups": [ { "id": "shop", "label": "Shop", "kind": "compose" } ]
}"#;

pub fn aggregator() -> Arc<LiveStateAggregator> {
    let (event_tx, _) = broadcast::channel(64);
    Arc::new(LiveStateAggregator::new(event_tx))
}

pub fn runtime_container(name: &str, state: &str) -> RuntimeContainer {
    RuntimeContainer {
        id: format!("{name}-id"),
        name: name.to_string(),
        image: "example/image:latest".to_string(),
        state: state.to_string(),
        labels: HashMap::from([
            (
                "com.docker.compose.project".to_string(),
                "shop".to_string(),
            ),
            ("com.docker.compose.service".to_string(), name.to_string()),
        ]),
        mounts: vec![],
        networks: vec!["shop_default".to_string()],
    }
}

/// In-memory container runtime whose state tests can change between cycles
#[derive(Default)]
pub struct TestRuntime {
    containers: Mutex<Vec<RuntimeContainer>>,
    failing: AtomicBool,
}

impl TestRuntime {
    pub fn with(containers: Vec<RuntimeContainer>) -> Arc<Self> {
        Arc::new(Self {
            containers: Mutex::new(containers),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerRuntime for TestRuntime {
    async fn list_containers(&self) -> ProbeResult<Vec<RuntimeContainer>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProbeError::Runtime("daemon not reachable".to_string()));
        }
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn stats(&self, _id: &str) -> ProbeResult<StatsSample> {
        Ok(StatsSample {
            cpu: CpuSample {
                total_usage: 300,
                system_usage: Some(2_000),
                online_cpus: Some(2),
                percpu_count: 2,
            },
            precpu: CpuSample {
                total_usage: 100,
                system_usage: Some(1_000),
                online_cpus: Some(2),
                percpu_count: 2,
            },
            memory_usage: Some(256 * 1_048_576),
        })
    }
}

/// Poll the topology actor until `check` holds or a second has passed
pub async fn wait_for_topology<F>(handle: &TopologyHandle, check: F) -> Arc<TopologyGraph>
where
    F: Fn(&TopologyGraph) -> bool,
{
    let mut topology = handle.topology().await.unwrap();
    for _ in 0..100 {
        if check(&topology) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        topology = handle.topology().await.unwrap();
    }
    topology
}
