//! Query string parsing
//!
//! `a=1&b&c = 2` becomes `{a: "1", b: "", c: "2"}`. Pairs split on the first
//! `=`, keys and values are trimmed. A missing query string is an empty map.

use std::collections::HashMap;
use std::net::SocketAddr;

use super::error::ApiError;
use crate::crawler::ServiceFilter;
use crate::types::parse_address;

/// Split a raw query string into trimmed key/value pairs
pub fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let Some(raw) = raw else {
        return params;
    };

    for pair in raw.split('&') {
        if pair.trim().is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        params.insert(key.trim().to_string(), value.trim().to_string());
    }

    params
}

/// Parameters accepted by `/peers`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeersQuery {
    /// Service requirement, `Any` when `srvmask` is absent
    pub filter: ServiceFilter,

    /// Client asked for getutxo-capable peers only
    pub getutxo: bool,

    /// Client asked us not to emit Cache-Control
    pub nocache: bool,
}

impl PeersQuery {
    pub fn from_raw(raw: Option<&str>) -> Result<Self, ApiError> {
        let params = parse_query(raw);

        let filter = match params.get("srvmask") {
            Some(value) => ServiceFilter::from_raw(parse_mask(value)?),
            None => ServiceFilter::Any,
        };

        Ok(Self {
            filter,
            getutxo: params.get("getutxo").map(|v| v == "true").unwrap_or(false),
            nocache: params.contains_key("nocache"),
        })
    }
}

/// Decimal or `0x`-prefixed hex integer
fn parse_mask(value: &str) -> Result<i64, ApiError> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => value.parse::<i64>(),
    };

    parsed.map_err(|_| ApiError::BadRequest(format!("invalid srvmask: {}", value)))
}

/// The address parameter of `/lookup` and `/force` is the whole query string
pub fn parse_address_param(raw: Option<&str>, default_port: u16) -> Result<SocketAddr, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing address".to_string()))?;

    parse_address(raw, default_port).map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_pairs() {
        let params = parse_query(Some(" srvmask = 3 &getutxo=true&nocache&x=a=b"));
        assert_eq!(params.get("srvmask").map(String::as_str), Some("3"));
        assert_eq!(params.get("getutxo").map(String::as_str), Some("true"));
        assert_eq!(params.get("nocache").map(String::as_str), Some(""));
        assert_eq!(params.get("x").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_missing_query_is_empty() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }

    #[test]
    fn test_peers_query_defaults() {
        let q = PeersQuery::from_raw(None).unwrap();
        assert_eq!(q.filter, ServiceFilter::Any);
        assert!(!q.getutxo);
        assert!(!q.nocache);
    }

    #[test]
    fn test_srvmask_is_masked_to_24_bits() {
        let q = PeersQuery::from_raw(Some("srvmask=0x1FFFFFFF")).unwrap();
        assert_eq!(q.filter, ServiceFilter::Require(0x00FF_FFFF));

        let q = PeersQuery::from_raw(Some("srvmask=536870911")).unwrap();
        assert_eq!(q.filter, ServiceFilter::Require(0x00FF_FFFF));

        let q = PeersQuery::from_raw(Some("srvmask=1")).unwrap();
        assert_eq!(q.filter, ServiceFilter::Require(1));
    }

    #[test]
    fn test_malformed_srvmask_is_bad_request() {
        assert!(matches!(
            PeersQuery::from_raw(Some("srvmask=lots")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            PeersQuery::from_raw(Some("srvmask")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_getutxo_only_literal_true() {
        assert!(PeersQuery::from_raw(Some("getutxo=true")).unwrap().getutxo);
        assert!(!PeersQuery::from_raw(Some("getutxo=TRUE")).unwrap().getutxo);
        assert!(!PeersQuery::from_raw(Some("getutxo=1")).unwrap().getutxo);
        assert!(!PeersQuery::from_raw(Some("getutxo")).unwrap().getutxo);
    }

    #[test]
    fn test_nocache_presence_flag() {
        assert!(PeersQuery::from_raw(Some("nocache")).unwrap().nocache);
        assert!(PeersQuery::from_raw(Some("nocache=false")).unwrap().nocache);
    }

    #[test]
    fn test_address_param() {
        assert_eq!(
            parse_address_param(Some("9.9.9.9"), 8333).unwrap(),
            "9.9.9.9:8333".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_address_param(Some("9.9.9.9:18444"), 8333).unwrap(),
            "9.9.9.9:18444".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(parse_address_param(None, 8333), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_address_param(Some("  "), 8333), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            parse_address_param(Some("9.9.9.9:port"), 8333),
            Err(ApiError::BadRequest(_))
        ));
    }
}
