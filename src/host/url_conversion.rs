use crate::{Error, Result};

use tokio::net::lookup_host;
use tracing::warn;

use std::net::{IpAddr, SocketAddr};

/// Converts a service URL (`host:port`, optionally prefixed with a scheme) to a socket address.
///
/// IPv4 and IPv6 literals are used as is, hostnames are resolved and the first address returned
/// by the resolver is used.
pub async fn socket_addr_from_service_url(service_url: &str) -> Result<SocketAddr> {
    let without_scheme = match service_url.find("://") {
        Some(i) => &service_url[i + 3..],
        None => service_url,
    };
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);

    if let Ok(address) = authority.parse::<SocketAddr>() {
        return Ok(address);
    }

    let (host, port) = split_host_port(authority)
        .ok_or_else(|| Error::UrlParseError(service_url.to_owned()))?;
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolved: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|err| Error::ResolveError(format!("{}: {}", host, err)))?
        .collect();
    if resolved.len() > 1 {
        warn!("{} resolved to {:?}, using {}", host, resolved, resolved[0]);
    }
    resolved.first().cloned().ok_or_else(|| Error::ResolveError(host.to_owned()))
}

/// The inverse of [socket_addr_from_service_url]: `ip:port`, with brackets around IPv6 hosts.
pub fn service_url_from_socket_addr(address: &SocketAddr) -> String {
    address.to_string()
}

fn split_host_port(authority: &str) -> Option<(&str, u16)> {
    let i = authority.rfind(':')?;
    let host = authority[..i].trim_start_matches('[').trim_end_matches(']');
    let port = authority[i + 1..].parse::<u16>().ok()?;
    if host.is_empty() {
        None
    } else {
        Some((host, port))
    }
}
