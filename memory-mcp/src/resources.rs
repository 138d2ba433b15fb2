//! Read-only `memory://<tier>` resource URIs.

use serde_json::{json, Value};

use crate::error::McpError;
use crate::types::ResourceDescriptor;

/// The fixed resource registry advertised via `resources/list`.
#[must_use]
pub fn list_resources() -> Vec<ResourceDescriptor> {
    [
        ("memory://l2-insights", "L2 insights", "Compressed semantic fragments"),
        ("memory://working-memory", "Working memory", "Live bounded buffer contents"),
        ("memory://episode-memory", "Episode memory", "Query/reward/reflection episodes"),
        ("memory://l0-raw", "Raw dialogue", "Append-only L0 dialogue log"),
        ("memory://stale-memory", "Stale memory", "Archived working-memory items"),
    ]
    .into_iter()
    .map(|(uri, name, description)| ResourceDescriptor {
        uri: uri.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        mime_type: "application/json".to_string(),
    })
    .collect()
}

/// Parse a `memory://<tier>?<query>` URI into its tier and query string.
///
/// # Errors
///
/// Returns [`McpError::InvalidParams`] if `uri` doesn't start with the
/// `memory://` scheme or names an unknown tier.
pub fn parse_uri(uri: &str) -> Result<(&str, &str), McpError> {
    let rest = uri
        .strip_prefix("memory://")
        .ok_or_else(|| McpError::InvalidParams(format!("unsupported resource scheme: {uri}")))?;
    let (tier, query) = rest.split_once('?').unwrap_or((rest, ""));
    match tier {
        "l2-insights" | "working-memory" | "episode-memory" | "l0-raw" | "stale-memory" => {
            Ok((tier, query))
        }
        other => Err(McpError::InvalidParams(format!("unknown resource tier: {other}"))),
    }
}

/// Render a tier's already-fetched rows (JSON arrays produced by the
/// per-tier store calls the binary wires up) into the resource's response
/// envelope.
#[must_use]
pub fn render(tier: &str, rows: Value) -> Value {
    json!({ "tier": tier, "items": rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tier_with_query() {
        let (tier, query) = parse_uri("memory://working-memory?limit=10").unwrap();
        assert_eq!(tier, "working-memory");
        assert_eq!(query, "limit=10");
    }

    #[test]
    fn rejects_unknown_tier() {
        assert!(parse_uri("memory://bogus").is_err());
    }

    #[test]
    fn rejects_non_memory_scheme() {
        assert!(parse_uri("https://example.com").is_err());
    }

    #[test]
    fn list_resources_covers_all_five_tiers() {
        assert_eq!(list_resources().len(), 5);
    }
}
