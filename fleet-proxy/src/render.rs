//! Text generation for per-user routing stanzas.
//!
//! All strings produced here are built from inputs that already passed the
//! strict validation in `fleet-core`; nothing user-controlled reaches the
//! configuration file unchecked.

use crate::kinds::ServiceKind;

/// Comment labelling a user's upstream blocks, kept directly above the
/// first block so removal can strip it together with the blocks.
pub fn user_label(username: &str) -> String {
    format!("# fleet-user: {}", username)
}

/// Failure/health parameters applied to every upstream target.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamParams {
    pub max_fails: u32,
    pub fail_timeout_secs: u32,
}

impl Default for UpstreamParams {
    fn default() -> Self {
        Self {
            max_fails: 3,
            fail_timeout_secs: 30,
        }
    }
}

/// Render one upstream block for a user's backend of the given kind.
pub fn upstream_block(
    kind: &ServiceKind,
    username: &str,
    target: &str,
    params: UpstreamParams,
) -> String {
    format!(
        "upstream {name} {{\n    server {target} max_fails={mf} fail_timeout={ft}s;\n}}\n",
        name = kind.upstream_name(username),
        target = target,
        mf = params.max_fails,
        ft = params.fail_timeout_secs,
    )
}

/// Render the dispatch map entry routing a user to their upstream.
///
/// The entry lives inside the kind's `map` section, directly below that
/// kind's anchor comment.
pub fn dispatch_line(kind: &ServiceKind, username: &str) -> String {
    format!("    {} {};", username, kind.upstream_name(username))
}

/// Baseline configuration carrying one dispatch map per kind, each with its
/// own anchor. Used to seed a fresh deployment and by tests.
pub fn scaffold_config(kinds: &[ServiceKind]) -> String {
    let mut out = String::new();
    out.push_str("map $http_host $fleet_noop {\n    default 0;\n}\n\n");

    for kind in kinds {
        out.push_str(&format!(
            "map $http_x_fleet_user ${}_backend {{\n    {}\n    default fleet_unrouted;\n}}\n\n",
            kind.name,
            kind.anchor()
        ));
    }

    out.push_str("upstream fleet_unrouted {\n    server 127.0.0.1:1;\n}\n");
    out
}
