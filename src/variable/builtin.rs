//! Built-in access-log variables backed by the request info.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::request_info::ResponseFlag;

use super::context::RequestContext;
use super::registry::VariableRegistry;
use super::types::{Variable, VariableError};

pub const VAR_START_TIME: &str = "start_time";
pub const VAR_REQUEST_RECEIVED_DURATION: &str = "request_received_duration";
pub const VAR_RESPONSE_RECEIVED_DURATION: &str = "response_received_duration";
pub const VAR_REQUEST_FINISHED_DURATION: &str = "request_finished_duration";
pub const VAR_BYTES_SENT: &str = "bytes_sent";
pub const VAR_BYTES_RECEIVED: &str = "bytes_received";
pub const VAR_PROTOCOL: &str = "protocol";
pub const VAR_RESPONSE_CODE: &str = "response_code";
pub const VAR_DURATION: &str = "duration";
pub const VAR_RESPONSE_FLAG: &str = "response_flag";
pub const VAR_UPSTREAM_LOCAL_ADDRESS: &str = "upstream_local_address";
pub const VAR_DOWNSTREAM_LOCAL_ADDRESS: &str = "downstream_local_address";
pub const VAR_DOWNSTREAM_REMOTE_ADDRESS: &str = "downstream_remote_address";
pub const VAR_UPSTREAM_HOST: &str = "upstream_host";

pub const REQUEST_HEADER_PREFIX: &str = "request_header_";
pub const RESPONSE_HEADER_PREFIX: &str = "response_header_";

/// `yyyy/MM/dd HH:mm:ss.SSS` in local time.
pub const START_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

type GetterResult = Result<Option<String>, VariableError>;

/// Register the built-in indexed variables and the header prefix families.
pub fn register_builtin_variables(registry: &VariableRegistry) -> Result<(), VariableError> {
    let builtins = [
        Variable::new_indexed(VAR_START_TIME, start_time),
        Variable::new_indexed(VAR_REQUEST_RECEIVED_DURATION, request_received_duration),
        Variable::new_indexed(VAR_RESPONSE_RECEIVED_DURATION, response_received_duration),
        Variable::new_indexed(VAR_REQUEST_FINISHED_DURATION, request_finished_duration),
        Variable::new_indexed(VAR_BYTES_SENT, bytes_sent),
        Variable::new_indexed(VAR_BYTES_RECEIVED, bytes_received),
        Variable::new_indexed(VAR_PROTOCOL, protocol),
        Variable::new_indexed(VAR_RESPONSE_CODE, response_code),
        Variable::new_indexed(VAR_DURATION, duration),
        Variable::new_indexed(VAR_RESPONSE_FLAG, response_flag),
        Variable::new_indexed(VAR_UPSTREAM_LOCAL_ADDRESS, upstream_local_address),
        Variable::new_indexed(VAR_DOWNSTREAM_LOCAL_ADDRESS, downstream_local_address),
        Variable::new_indexed(VAR_DOWNSTREAM_REMOTE_ADDRESS, downstream_remote_address),
        Variable::new_indexed(VAR_UPSTREAM_HOST, upstream_host),
    ];
    for variable in builtins {
        registry.register_variable(variable)?;
    }

    registry.register_prefix_variable(
        REQUEST_HEADER_PREFIX,
        Variable::new_basic(REQUEST_HEADER_PREFIX, request_header),
    )?;
    registry.register_prefix_variable(
        RESPONSE_HEADER_PREFIX,
        Variable::new_basic(RESPONSE_HEADER_PREFIX, response_header),
    )?;

    tracing::debug!(indexed = registry.indexed_count(), "Built-in variables registered");
    Ok(())
}

/// Go-style duration rendering: `0s`, `1.329µs`, `2.00000227s`.
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        "0s".to_string()
    } else {
        format!("{:?}", d)
    }
}

fn start_time(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    let start: DateTime<Local> = ctx.request_info()?.start_time().into();
    Ok(Some(start.format(START_TIME_FORMAT).to_string()))
}

fn request_received_duration(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(format_duration(ctx.request_info()?.request_received_duration())))
}

fn response_received_duration(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(format_duration(ctx.request_info()?.response_received_duration())))
}

fn request_finished_duration(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(format_duration(ctx.request_info()?.request_finished_duration())))
}

fn bytes_sent(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(ctx.request_info()?.bytes_sent().to_string()))
}

fn bytes_received(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(ctx.request_info()?.bytes_received().to_string()))
}

fn protocol(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(ctx.request_info()?.protocol().to_string()))
}

fn response_code(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(ctx.request_info()?.response_code().to_string()))
}

fn duration(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(format_duration(ctx.request_info()?.duration())))
}

// "true" when any response flag was recorded for the request.
fn response_flag(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    let flagged = ctx.request_info()?.get_response_flag(ResponseFlag::ALL);
    Ok(Some(flagged.to_string()))
}

fn upstream_local_address(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(Some(ctx.request_info()?.upstream_local_address().to_string()))
}

fn downstream_local_address(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(ctx
        .request_info()?
        .downstream_local_address()
        .map(|addr| addr.to_string()))
}

fn downstream_remote_address(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(ctx
        .request_info()?
        .downstream_remote_address()
        .map(|addr| addr.to_string()))
}

fn upstream_host(ctx: &RequestContext, _data: Option<&str>) -> GetterResult {
    Ok(ctx
        .request_info()?
        .upstream_host()
        .map(|host| host.hostname().to_string()))
}

fn request_header(ctx: &RequestContext, data: Option<&str>) -> GetterResult {
    let name = header_name(data, REQUEST_HEADER_PREFIX);
    Ok(ctx.request_headers()?.get(name))
}

fn response_header(ctx: &RequestContext, data: Option<&str>) -> GetterResult {
    let name = header_name(data, RESPONSE_HEADER_PREFIX);
    Ok(ctx.response_headers()?.get(name))
}

fn header_name<'a>(data: Option<&'a str>, prefix: &str) -> &'a str {
    let full = data.unwrap_or_default();
    full.strip_prefix(prefix).unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_info::{SimpleHost, StreamRequestInfo};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Instant, SystemTime, UNIX_EPOCH};

    fn registry() -> VariableRegistry {
        let registry = VariableRegistry::new();
        register_builtin_variables(&registry).unwrap();
        registry
    }

    fn context(registry: &VariableRegistry, info: StreamRequestInfo) -> RequestContext {
        let mut request_headers = HashMap::new();
        request_headers.insert("service".to_string(), "test".to_string());
        let mut response_headers = HashMap::new();
        response_headers.insert("Server".to_string(), "sidecar".to_string());

        registry.new_variable_context(
            RequestContext::new()
                .with_request_info(Arc::new(info))
                .with_request_headers(Arc::new(request_headers))
                .with_response_headers(Arc::new(response_headers)),
        )
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = registry();
        assert_eq!(registry.indexed_count(), 14);
        assert_eq!(
            register_builtin_variables(&registry),
            Err(VariableError::DuplicateName(VAR_START_TIME.into()))
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_nanos(1329)), "1.329µs");
        assert_eq!(format_duration(Duration::from_nanos(2_000_002_270)), "2.00000227s");
    }

    #[test]
    fn test_numeric_and_string_values() {
        let registry = registry();
        let mut info = StreamRequestInfo::new("Http1");
        info.set_bytes_sent(2048);
        info.set_bytes_received(1024);
        info.set_response_code(200);
        info.set_upstream_local_address("127.0.0.1:23456");
        let ctx = context(&registry, info);

        let get = |name: &str| registry.get_variable_value(&ctx, name).unwrap();
        assert_eq!(get(VAR_BYTES_SENT), "2048");
        assert_eq!(get(VAR_BYTES_RECEIVED), "1024");
        assert_eq!(get(VAR_RESPONSE_CODE), "200");
        assert_eq!(get(VAR_PROTOCOL), "Http1");
        assert_eq!(get(VAR_UPSTREAM_LOCAL_ADDRESS), "127.0.0.1:23456");
        assert_eq!(get(VAR_REQUEST_FINISHED_DURATION), "0s");
    }

    #[test]
    fn test_start_time_format() {
        let registry = registry();
        let mut info = StreamRequestInfo::default();
        let start = UNIX_EPOCH + Duration::from_millis(1_544_782_113_054);
        info.set_start_time(start);
        let ctx = context(&registry, info);

        let expected = DateTime::<Local>::from(start)
            .format("%Y/%m/%d %H:%M:%S.054")
            .to_string();
        assert_eq!(registry.get_variable_value(&ctx, VAR_START_TIME).unwrap(), expected);
    }

    #[test]
    fn test_durations() {
        let registry = registry();
        let mut info = StreamRequestInfo::default();
        info.set_start_time(SystemTime::now());
        info.set_response_received_duration(Instant::now() + Duration::from_secs(2));
        let ctx = context(&registry, info);

        let value = registry
            .get_variable_value(&ctx, VAR_RESPONSE_RECEIVED_DURATION)
            .unwrap();
        assert!(value.starts_with("2."), "unexpected duration {}", value);
        assert!(value.ends_with('s'));
        assert!(!registry.get_variable_value(&ctx, VAR_DURATION).unwrap().is_empty());
    }

    #[test]
    fn test_response_flag() {
        let registry = registry();
        let ctx = context(&registry, StreamRequestInfo::default());
        assert_eq!(registry.get_variable_value(&ctx, VAR_RESPONSE_FLAG).unwrap(), "false");

        let mut info = StreamRequestInfo::default();
        info.set_response_flag(ResponseFlag::UPSTREAM_REQUEST_TIMEOUT);
        let ctx = context(&registry, info);
        assert_eq!(registry.get_variable_value(&ctx, VAR_RESPONSE_FLAG).unwrap(), "true");
    }

    #[test]
    fn test_addresses_and_host() {
        let registry = registry();
        let mut info = StreamRequestInfo::default();
        info.set_downstream_local_address(Some("[2001:db8::68]:12200".parse().unwrap()));
        let ctx = context(&registry, info);

        assert_eq!(
            registry.get_variable_value(&ctx, VAR_DOWNSTREAM_LOCAL_ADDRESS).unwrap(),
            "[2001:db8::68]:12200"
        );
        assert_eq!(
            registry.get_variable_value(&ctx, VAR_DOWNSTREAM_REMOTE_ADDRESS).unwrap(),
            "-"
        );
        assert_eq!(registry.get_variable_value(&ctx, VAR_UPSTREAM_HOST).unwrap(), "-");

        let index = registry.lookup(VAR_UPSTREAM_HOST).unwrap().index().unwrap() as usize;
        assert!(ctx.slot(index).unwrap().not_found);

        let mut info = StreamRequestInfo::default();
        info.on_upstream_host_selected(Some(Arc::new(SimpleHost::new("backend-7", None))));
        let ctx = context(&registry, info);
        assert_eq!(registry.get_variable_value(&ctx, VAR_UPSTREAM_HOST).unwrap(), "backend-7");
    }

    #[test]
    fn test_header_families() {
        let registry = registry();
        registry.add_variable("request_header_service").unwrap();
        registry.add_variable("response_header_Server").unwrap();
        registry.add_variable("request_header_missing").unwrap();

        let ctx = context(&registry, StreamRequestInfo::default());
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_service").unwrap(),
            "test"
        );
        assert_eq!(
            registry.get_variable_value(&ctx, "response_header_Server").unwrap(),
            "sidecar"
        );
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_missing").unwrap(),
            "-"
        );
        // never promoted, resolved through the prefix without a slot
        assert_eq!(
            registry.get_variable_value(&ctx, "response_header_missing").unwrap(),
            "-"
        );
    }

    #[test]
    fn test_missing_request_info() {
        let registry = registry();
        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, VAR_BYTES_SENT),
            Err(VariableError::MissingContextValue("request_info"))
        );
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_x"),
            Err(VariableError::MissingContextValue("request_headers"))
        );
    }
}
