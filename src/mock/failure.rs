//! Failure Injection for the Mock Server
//!
//! Routes are keyed by method and URL (query string ignored).

use std::collections::HashMap;

use crate::transport::Method;

/// Route identity for failure injection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    /// URL without its query string
    pub url: String,
}

impl RouteKey {
    pub fn new(method: Method, url: &str) -> Self {
        let url = url.split('?').next().unwrap_or(url);
        Self {
            method,
            url: url.to_string(),
        }
    }
}

/// Failure configuration for a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Answer with this status and body
    Status { status: u16, body: String },
    /// Fail before any response, like a refused connection
    ConnectionRefused,
}

#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub mode: FailureMode,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that answers with an HTTP error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Status {
                status,
                body: body.into(),
            },
            fail_count: None,
        }
    }

    pub fn connection_refused() -> Self {
        Self {
            mode: FailureMode::ConnectionRefused,
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock server
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<RouteKey, FailureConfig>,
    /// Call counts per route (for fail_count tracking)
    call_counts: HashMap<RouteKey, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, route: RouteKey, config: FailureConfig) {
        self.call_counts.insert(route.clone(), 0);
        self.configs.insert(route, config);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_route(&mut self, route: &RouteKey) {
        self.configs.remove(route);
        self.call_counts.remove(route);
    }

    /// Failure to apply to this call of the route, if any
    pub fn check(&mut self, route: &RouteKey) -> Option<FailureMode> {
        let config = self.configs.get(route)?;
        let count = self.call_counts.entry(route.clone()).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.mode.clone())
    }
}
