use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use infra_topology::{
    LiveStateAggregator,
    actors::{ProbeHandle, TopologyHandle},
    architecture::{ArchitectureDocument, read_architecture_file},
    build_topology,
    config::{Config, read_config_file},
    probes::{
        Probe,
        cloud::CloudMetadataProbe,
        container::{BollardRuntime, ContainerProbe},
        ports::PortScanProbe,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults apply when omitted)
    #[arg(short)]
    config: Option<String>,

    /// Declared architecture file
    #[arg(short)]
    architecture: String,

    /// Run every probe once, print the topology and exit
    #[arg(long)]
    once: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("infra_topology", LevelFilter::DEBUG),
        ("topology_hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Probes enabled by the configuration
struct Probes {
    containers: Option<ContainerProbe>,
    ports: Option<PortScanProbe>,
    cloud: Option<CloudMetadataProbe>,
}

fn build_probes(config: &Config, document: &ArchitectureDocument) -> Probes {
    let runtime = match &config.docker_socket {
        Some(socket) => BollardRuntime::connect_with_socket(socket),
        None => BollardRuntime::connect_local(),
    };
    let containers = match runtime {
        Ok(runtime) => Some(ContainerProbe::new(Arc::new(runtime))),
        Err(e) => {
            warn!("container runtime unavailable, container probe disabled: {e}");
            None
        }
    };

    let ports = config.port_scan_url.as_ref().map(|url| {
        let ports = document.harvest_ports();
        debug!("port scan covers {} declared ports", ports.len());
        PortScanProbe::new(url.clone(), ports)
    });

    let cloud = config
        .cloud
        .enabled
        .then(|| CloudMetadataProbe::new(&config.cloud, config.cloud_timeout()));

    Probes {
        containers,
        ports,
        cloud,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    let document = read_architecture_file(&args.architecture)?;
    for issue in document.validate() {
        warn!("architecture: {issue}");
    }

    let (event_tx, _) = broadcast::channel(64);
    let aggregator = Arc::new(LiveStateAggregator::new(event_tx));
    let probes = build_probes(&config, &document);

    if args.once {
        return run_once(&config, &document, probes, &aggregator).await;
    }

    let mut handles = vec![];
    if let Some(probe) = probes.containers {
        handles.push(ProbeHandle::spawn(
            probe,
            aggregator.clone(),
            config.poll_interval(),
            config.probe_timeout(),
        ));
    }
    if let Some(probe) = probes.ports {
        handles.push(ProbeHandle::spawn(
            probe,
            aggregator.clone(),
            config.port_scan_interval(),
            config.probe_timeout(),
        ));
    }
    if let Some(probe) = probes.cloud {
        handles.push(ProbeHandle::spawn(
            probe,
            aggregator.clone(),
            config.cloud_interval(),
            config.probe_timeout(),
        ));
    }
    info!("running {} probes", handles.len());

    let topology = TopologyHandle::spawn(document, config.layout, aggregator.clone());

    #[cfg(feature = "api")]
    {
        use infra_topology::api::{ApiConfig, ApiState, spawn_api_server};

        let state = ApiState::new(aggregator.clone(), topology.clone(), handles.clone());
        spawn_api_server(ApiConfig::from(&config.api), state).await?;
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    for handle in &handles {
        if let Err(e) = handle.shutdown().await {
            debug!("{}: {e:#}", handle.name);
        }
    }
    topology.shutdown().await?;

    Ok(())
}

/// Collect every probe once, concurrently, and print the resulting topology
async fn run_once(
    config: &Config,
    document: &ArchitectureDocument,
    probes: Probes,
    aggregator: &LiveStateAggregator,
) -> anyhow::Result<()> {
    let timeout = config.probe_timeout();

    tokio::join!(
        collect_once(probes.containers.as_ref(), aggregator, timeout),
        collect_once(probes.ports.as_ref(), aggregator, timeout),
        collect_once(probes.cloud.as_ref(), aggregator, timeout),
    );

    let snapshot = aggregator.snapshot().await;
    let topology = build_topology(document, &snapshot, &config.layout);

    println!("{}", serde_json::to_string_pretty(&topology)?);
    Ok(())
}

async fn collect_once<P: Probe>(
    probe: Option<&P>,
    aggregator: &LiveStateAggregator,
    timeout: Duration,
) {
    if let Some(probe) = probe {
        aggregator.record(probe.collect(timeout).await).await;
    }
}
