//! Concrete request descriptor filled in by the stream pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use super::{HostInfo, RequestInfo, ResponseFlag};

/// Request info recorded for a single downstream stream.
///
/// Timing setters take the instant an event happened and store the
/// duration since the request started.
#[derive(Debug, Clone)]
pub struct StreamRequestInfo {
    protocol: String,
    start_time: SystemTime,
    start_instant: Instant,
    response_flag: ResponseFlag,
    upstream_host: Option<Arc<dyn HostInfo>>,
    request_received_duration: Duration,
    response_received_duration: Duration,
    request_finished_duration: Duration,
    bytes_sent: u64,
    bytes_received: u64,
    response_code: u32,
    upstream_local_address: String,
    downstream_local_address: Option<SocketAddr>,
    downstream_remote_address: Option<SocketAddr>,
    health_check: bool,
}

impl StreamRequestInfo {
    /// Start tracking a request that arrives now.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            start_time: SystemTime::now(),
            start_instant: Instant::now(),
            response_flag: ResponseFlag::NONE,
            upstream_host: None,
            request_received_duration: Duration::ZERO,
            response_received_duration: Duration::ZERO,
            request_finished_duration: Duration::ZERO,
            bytes_sent: 0,
            bytes_received: 0,
            response_code: 0,
            upstream_local_address: String::new(),
            downstream_local_address: None,
            downstream_remote_address: None,
            health_check: false,
        }
    }

    /// Override the recorded wall-clock start time.
    ///
    /// The monotonic anchor used by the timing setters moves with it.
    pub fn set_start_time(&mut self, start: SystemTime) {
        let now = SystemTime::now();
        let anchor = Instant::now();
        let shifted = match now.duration_since(start) {
            Ok(behind) => anchor.checked_sub(behind),
            Err(ahead) => anchor.checked_add(ahead.duration()),
        };
        if let Some(shifted) = shifted {
            self.start_instant = shifted;
        }
        self.start_time = start;
    }

    pub fn set_request_received_duration(&mut self, at: Instant) {
        self.request_received_duration = at.saturating_duration_since(self.start_instant);
    }

    pub fn set_response_received_duration(&mut self, at: Instant) {
        self.response_received_duration = at.saturating_duration_since(self.start_instant);
    }

    pub fn set_request_finished_duration(&mut self, at: Instant) {
        self.request_finished_duration = at.saturating_duration_since(self.start_instant);
    }

    pub fn set_bytes_sent(&mut self, bytes: u64) {
        self.bytes_sent = bytes;
    }

    pub fn set_bytes_received(&mut self, bytes: u64) {
        self.bytes_received = bytes;
    }

    pub fn set_protocol(&mut self, protocol: impl Into<String>) {
        self.protocol = protocol.into();
    }

    pub fn set_response_code(&mut self, code: u32) {
        self.response_code = code;
    }

    /// Record a response flag; flags accumulate.
    pub fn set_response_flag(&mut self, flag: ResponseFlag) {
        self.response_flag |= flag;
    }

    pub fn on_upstream_host_selected(&mut self, host: Option<Arc<dyn HostInfo>>) {
        self.upstream_host = host;
    }

    pub fn set_upstream_local_address(&mut self, addr: impl Into<String>) {
        self.upstream_local_address = addr.into();
    }

    pub fn set_downstream_local_address(&mut self, addr: Option<SocketAddr>) {
        self.downstream_local_address = addr;
    }

    pub fn set_downstream_remote_address(&mut self, addr: Option<SocketAddr>) {
        self.downstream_remote_address = addr;
    }

    pub fn is_health_check(&self) -> bool {
        self.health_check
    }

    pub fn set_health_check(&mut self, health_check: bool) {
        self.health_check = health_check;
    }
}

impl Default for StreamRequestInfo {
    fn default() -> Self {
        Self::new("")
    }
}

impl RequestInfo for StreamRequestInfo {
    fn start_time(&self) -> SystemTime {
        self.start_time
    }

    fn request_received_duration(&self) -> Duration {
        self.request_received_duration
    }

    fn response_received_duration(&self) -> Duration {
        self.response_received_duration
    }

    fn request_finished_duration(&self) -> Duration {
        self.request_finished_duration
    }

    fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn response_code(&self) -> u32 {
        self.response_code
    }

    fn duration(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
    }

    fn get_response_flag(&self, flag: ResponseFlag) -> bool {
        self.response_flag.intersects(flag)
    }

    fn upstream_local_address(&self) -> &str {
        &self.upstream_local_address
    }

    fn downstream_local_address(&self) -> Option<SocketAddr> {
        self.downstream_local_address
    }

    fn downstream_remote_address(&self) -> Option<SocketAddr> {
        self.downstream_remote_address
    }

    fn upstream_host(&self) -> Option<Arc<dyn HostInfo>> {
        self.upstream_host.clone()
    }
}
