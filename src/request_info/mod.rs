//! Request descriptor consumed by the built-in variables.
//!
//! # Data Flow
//! ```text
//! request pipeline (external)
//!     → StreamRequestInfo (timings, bytes, addresses, upstream host)
//!     → RequestContext (attached as Arc<dyn RequestInfo>)
//!     → variable::builtin getters (stringified on demand)
//! ```
//!
//! # Design Decisions
//! - Read-only trait so the pipeline can supply its own descriptor
//! - Addresses and upstream host are optional; absence maps to "-"
//! - Durations are measured relative to the request start time

pub mod headers;
pub mod stream;

use std::fmt;
use std::net::SocketAddr;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub use headers::HeaderMap;
pub use stream::StreamRequestInfo;

/// Bitset of conditions recorded while a request was proxied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResponseFlag(u32);

impl ResponseFlag {
    pub const NONE: Self = Self(0);
    pub const NO_HEALTHY_UPSTREAM: Self = Self(0x2);
    pub const UPSTREAM_REQUEST_TIMEOUT: Self = Self(0x4);
    pub const UPSTREAM_LOCAL_RESET: Self = Self(0x8);
    pub const UPSTREAM_REMOTE_RESET: Self = Self(0x10);
    pub const UPSTREAM_CONNECTION_FAILURE: Self = Self(0x20);
    pub const UPSTREAM_CONNECTION_TERMINATION: Self = Self(0x40);
    pub const UPSTREAM_OVERFLOW: Self = Self(0x80);
    pub const NO_ROUTE_FOUND: Self = Self(0x100);
    pub const DELAY_INJECTED: Self = Self(0x200);
    pub const FAULT_INJECTED: Self = Self(0x400);
    pub const RATE_LIMITED: Self = Self(0x800);

    /// Every known flag bit.
    pub const ALL: Self = Self(0xffe);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is also set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ResponseFlag {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResponseFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ResponseFlag {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// The upstream host a request was forwarded to.
pub trait HostInfo: Send + Sync + fmt::Debug {
    fn hostname(&self) -> &str;

    fn address(&self) -> Option<SocketAddr> {
        None
    }
}

/// Upstream host described by a name and an optional address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleHost {
    pub hostname: String,
    pub address: Option<SocketAddr>,
}

impl SimpleHost {
    pub fn new(hostname: impl Into<String>, address: Option<SocketAddr>) -> Self {
        Self {
            hostname: hostname.into(),
            address,
        }
    }
}

impl HostInfo for SimpleHost {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn address(&self) -> Option<SocketAddr> {
        self.address
    }
}

/// Canonical per-request descriptor.
///
/// Implementations are read concurrently by access-log sinks, so every
/// accessor takes `&self`.
pub trait RequestInfo: Send + Sync {
    /// Wall-clock time the request arrived.
    fn start_time(&self) -> SystemTime;

    /// Time between arrival and the request being sent upstream.
    fn request_received_duration(&self) -> Duration;

    /// Time between arrival and the upstream response being received.
    fn response_received_duration(&self) -> Duration;

    /// Time between arrival and the request being finished.
    fn request_finished_duration(&self) -> Duration;

    fn bytes_sent(&self) -> u64;

    fn bytes_received(&self) -> u64;

    fn protocol(&self) -> &str;

    fn response_code(&self) -> u32;

    /// Time elapsed since the request started.
    fn duration(&self) -> Duration;

    /// True if any bit of `flag` was recorded for this request.
    fn get_response_flag(&self, flag: ResponseFlag) -> bool;

    fn upstream_local_address(&self) -> &str;

    fn downstream_local_address(&self) -> Option<SocketAddr>;

    fn downstream_remote_address(&self) -> Option<SocketAddr>;

    fn upstream_host(&self) -> Option<Arc<dyn HostInfo>>;
}
