use std::sync::Arc;
use std::time::Duration;

use client::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            keep_alive_timeout: Duration::new(30, 0),
            max_request_timeout: Duration::new(30, 0),
        }
    }
    /// How long an idle connection is still considered usable
    ///
    /// Default is 30 seconds. Sending a request over a connection that
    /// has been idle for longer fails with `Error::Closed` instead of
    /// racing the server's own idle timeout.
    pub fn keep_alive_timeout(&mut self, value: Duration) -> &mut Self {
        self.keep_alive_timeout = value;
        self
    }
    /// Deadline for a whole request-response exchange
    ///
    /// Default is 30 seconds; the exchange fails with
    /// `Error::TimedOut` when it fires.
    pub fn max_request_timeout(&mut self, value: Duration) -> &mut Self {
        self.max_request_timeout = value;
        self
    }
    /// An Arc'd clone to pass to a constructor
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
