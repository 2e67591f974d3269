use std::net::{IpAddr, SocketAddr};

const API_PORT: &str = "TOPOLOGY_API_PORT";

const API_ADDR: &str = "TOPOLOGY_API_ADDR";

/// Apply `TOPOLOGY_API_ADDR` / `TOPOLOGY_API_PORT` on top of the configured bind address
pub fn resolve_bind_addr(configured: SocketAddr) -> SocketAddr {
    let ip = std::env::var(API_ADDR)
        .ok()
        .and_then(|res| res.parse::<IpAddr>().ok())
        .unwrap_or(configured.ip());
    let port = std::env::var(API_PORT)
        .ok()
        .and_then(|res| res.parse::<u16>().ok())
        .unwrap_or(configured.port());

    SocketAddr::new(ip, port)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Join a base URL and a path without doubling the separator
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
