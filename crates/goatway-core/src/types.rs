use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scope granted to a client API key. Gates which route groups a key may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// User-facing `/v1/*` proxy endpoints.
    Proxy,
    /// `/api/admin/*` management endpoints.
    Admin,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Proxy => write!(f, "proxy"),
            Scope::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "proxy" => Ok(Scope::Proxy),
            "admin" => Ok(Scope::Admin),
            other => Err(format!("unknown scope: {}", other)),
        }
    }
}

/// Parse a comma-separated scope list as stored in `api_keys.scopes`.
pub fn parse_scopes(raw: &str) -> Vec<Scope> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

pub fn format_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_roundtrip() {
        let scopes = vec![Scope::Proxy, Scope::Admin];
        let raw = format_scopes(&scopes);
        assert_eq!(raw, "proxy,admin");
        assert_eq!(parse_scopes(&raw), scopes);
    }

    #[test]
    fn unknown_scope_is_dropped() {
        assert_eq!(parse_scopes("proxy,bogus,admin"), vec![Scope::Proxy, Scope::Admin]);
    }
}
