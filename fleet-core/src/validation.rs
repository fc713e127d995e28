//! Centralized validation for user and network inputs.
//!
//! Everything that ends up inside the proxy configuration file or an agent
//! URL passes through here first, so the route manager and agent client
//! never see raw, injectable strings.

use std::net::{IpAddr, Ipv6Addr};

use crate::error::{FleetError, Result};

/// Maximum username length accepted for routing keys.
const MAX_USERNAME_LEN: usize = 32;

/// Validate a username used as a routing key.
///
/// Usernames become part of nginx upstream names and dispatch rules, so the
/// character set is a strict allow-list: lowercase alphanumerics, `-` and
/// `_`, starting with an alphanumeric.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(FleetError::Validation(format!(
            "Username must be between 1 and {} characters",
            MAX_USERNAME_LEN
        )));
    }

    let mut chars = username.chars();
    let first = chars.next().expect("non-empty checked above");
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return Err(FleetError::Validation(format!(
            "Username '{}' must start with a lowercase letter or digit",
            username
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(FleetError::Validation(format!(
            "Username '{}' contains invalid characters (only [a-z0-9_-] allowed)",
            username
        )));
    }

    Ok(())
}

/// Validate a hostname according to RFC 1123 rules.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() || hostname.len() > 253 {
        return Err(FleetError::Validation(
            "Hostname must be between 1 and 253 characters".to_string(),
        ));
    }

    if hostname.starts_with('.') || hostname.ends_with('.') {
        return Err(FleetError::Validation(
            "Hostname cannot start or end with a dot".to_string(),
        ));
    }

    for label in hostname.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(FleetError::Validation(
                "Hostname labels must be between 1 and 63 characters".to_string(),
            ));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(FleetError::Validation(
                "Hostname labels cannot start or end with a hyphen".to_string(),
            ));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(FleetError::Validation(format!(
                "Hostname label '{}' contains invalid characters",
                label
            )));
        }
    }

    Ok(())
}

/// Validate a server address: a hostname, an IP literal, or a bracketed
/// IPv6 literal.
pub fn validate_server_address(server_addr: &str) -> Result<()> {
    if server_addr.is_empty() || server_addr.len() > 253 {
        return Err(FleetError::Validation(
            "Server address must be between 1 and 253 characters".to_string(),
        ));
    }

    if server_addr.contains('\0') || server_addr.chars().any(|c| c.is_control()) {
        return Err(FleetError::Validation(
            "Server address contains invalid control characters".to_string(),
        ));
    }

    if server_addr.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let ipv6_candidate = if server_addr.starts_with('[') && server_addr.ends_with(']') {
        &server_addr[1..server_addr.len() - 1]
    } else {
        server_addr
    };
    if ipv6_candidate.parse::<Ipv6Addr>().is_ok() {
        return Ok(());
    }

    // All-numeric dotted strings that failed IP parsing (e.g. "256.1.1.1")
    // are malformed addresses, not hostnames.
    let labels: Vec<&str> = server_addr.split('.').collect();
    if labels.len() >= 2
        && labels
            .iter()
            .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(FleetError::Validation(format!(
            "Invalid IP address format: {}",
            server_addr
        )));
    }

    validate_hostname(server_addr)
}

/// Validate a `host:port` target and split it into its parts.
///
/// The split happens on the last colon so bracketed IPv6 literals pass
/// through intact. Port 0 is rejected.
pub fn validate_host_port(target: &str) -> Result<(String, u16)> {
    let (host, port_str) = target.rsplit_once(':').ok_or_else(|| {
        FleetError::Validation(format!("Invalid target '{}': expected host:port", target))
    })?;

    let port: u16 = port_str.parse().map_err(|_| {
        FleetError::Validation(format!("Invalid port '{}' in target '{}'", port_str, target))
    })?;

    if port == 0 {
        return Err(FleetError::Validation(format!(
            "Port 0 is not a valid target port in '{}'",
            target
        )));
    }

    validate_server_address(host)?;

    Ok((host.to_string(), port))
}
