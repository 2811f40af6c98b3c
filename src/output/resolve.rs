use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{DmxError, DmxResult};

/// Resolves `host` to one address, preferring IPv4. IP literals return
/// immediately; names are retried `attempts` times, `backoff` apart.
pub async fn resolve_host(host: &str, attempts: u32, backoff: Duration) -> DmxResult<IpAddr> {
    resolve_with(host, attempts, backoff, system_lookup).await
}

async fn system_lookup(host: String) -> io::Result<Vec<IpAddr>> {
    let addrs = tokio::net::lookup_host((host.as_str(), 0)).await?;
    Ok(addrs.map(|addr| addr.ip()).collect())
}

pub(crate) async fn resolve_with<F, Fut>(
    host: &str,
    attempts: u32,
    backoff: Duration,
    mut lookup: F,
) -> DmxResult<IpAddr>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = io::Result<Vec<IpAddr>>>,
{
    let host = host.trim();
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }
    if host.is_empty() {
        return Err(DmxError::transport_unavailable("no device host configured"));
    }

    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match lookup(host.to_string()).await {
            Ok(addrs) => {
                if let Some(addr) = preferred(&addrs) {
                    return Ok(addr);
                }
                log::warn!("[output] {} resolved to no addresses (attempt {}/{})", host, attempt, attempts);
            }
            Err(e) => {
                log::warn!("[output] Failed to resolve {} (attempt {}/{}): {}", host, attempt, attempts, e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    Err(DmxError::transport_unavailable(format!(
        "could not resolve '{}' after {} attempts",
        host, attempts
    )))
}

fn preferred(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
