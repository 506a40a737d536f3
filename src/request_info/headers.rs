//! Header map abstraction used by the `request_header_` and
//! `response_header_` variable families.

use std::collections::HashMap;

/// Read-only view of a request or response header map.
pub trait HeaderMap: Send + Sync {
    /// Value of header `name`, if present.
    fn get(&self, name: &str) -> Option<String>;
}

impl HeaderMap for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Lookups are case-insensitive, values that are not visible ASCII are
/// treated as absent.
impl HeaderMap for axum::http::HeaderMap {
    fn get(&self, name: &str) -> Option<String> {
        axum::http::HeaderMap::get(self, name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hashmap_headers() {
        let mut headers = HashMap::new();
        headers.insert("service".to_string(), "test".to_string());

        let map: &dyn HeaderMap = &headers;
        assert_eq!(map.get("service").as_deref(), Some("test"));
        assert!(map.get("Service").is_none());
    }

    #[test]
    fn test_http_headers() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));

        let map: &dyn HeaderMap = &headers;
        assert_eq!(map.get("X-Request-Id").as_deref(), Some("abc-123"));
        assert!(map.get("missing").is_none());
    }
}
