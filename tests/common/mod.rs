//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use sidecar_proxy::accesslog::AccessLogManager;
use sidecar_proxy::request_info::{HeaderMap, StreamRequestInfo};
use sidecar_proxy::variable::{register_builtin_variables, RequestContext, VariableRegistry};

/// Fresh registry with the built-in variables.
pub fn registry() -> Arc<VariableRegistry> {
    let registry = Arc::new(VariableRegistry::new());
    register_builtin_variables(&registry).unwrap();
    registry
}

/// Manager over a fresh registry with the built-in variables.
pub fn manager() -> Arc<AccessLogManager> {
    Arc::new(AccessLogManager::new(registry()))
}

/// Request info shaped like a proxied HTTP/1.1 request.
pub fn request_info() -> StreamRequestInfo {
    let mut info = StreamRequestInfo::new("HTTP/1.1");
    info.set_bytes_sent(2048);
    info.set_bytes_received(2048);
    info.set_upstream_local_address("127.0.0.1:23456");
    info.set_downstream_local_address(Some(addr("[2001:db8::68]:12200")));
    info.set_downstream_remote_address(Some(addr("127.0.0.1:53242")));
    info
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn headers(pairs: &[(&str, &str)]) -> Arc<dyn HeaderMap> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(map)
}

/// Request context with slots allocated for `registry`.
pub fn context(registry: &VariableRegistry, info: StreamRequestInfo) -> RequestContext {
    registry.new_variable_context(
        RequestContext::new()
            .with_request_info(Arc::new(info))
            .with_request_headers(headers(&[]))
            .with_response_headers(headers(&[])),
    )
}

/// Output path inside `dir`.
pub fn output(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

pub fn read(path: &str) -> String {
    fs::read_to_string(path).unwrap()
}
