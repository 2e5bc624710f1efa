use std::sync::Arc;
use std::time::Duration;

use client;
use pool::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            max_connection: 100,
            connect_retry_count: 3,
            reconnect_wait_time: Duration::new(1, 0),
            idle_timeout: Duration::new(30, 0),
            short_connect_idle_timeout: Duration::new(1, 0),
            alive_detect_interval: Duration::new(30, 0),
            client_config: client::Config::new().done(),
        }
    }
    /// Cap on the free queue; surplus clients spill into the
    /// short-lived queue
    ///
    /// Default is 100.
    pub fn max_connection(&mut self, value: usize) -> &mut Self {
        self.max_connection = value;
        self
    }
    /// How many times a connect is attempted before the pool gives up
    /// and reports the host as refused
    ///
    /// Default is 3.
    pub fn connect_retry_count(&mut self, value: u32) -> &mut Self {
        self.connect_retry_count = value;
        self
    }
    /// Base wait between connect retries
    ///
    /// Jittered by a factor of [1.0, 1.2] and reduced by the time the
    /// failed attempt itself took. Default is 1 second.
    pub fn reconnect_wait_time(&mut self, value: Duration) -> &mut Self {
        self.reconnect_wait_time = value;
        self
    }
    /// Idle TTL of the free queue
    ///
    /// Default is 30 seconds. Eviction is generational, so a client is
    /// collected somewhere between one and two TTLs of idleness.
    pub fn idle_timeout(&mut self, value: Duration) -> &mut Self {
        self.idle_timeout = value;
        self
    }
    /// Idle TTL of the spillover queue
    ///
    /// Default is 1 second.
    pub fn short_connect_idle_timeout(&mut self, value: Duration)
        -> &mut Self
    {
        self.short_connect_idle_timeout = value;
        self
    }
    /// Base interval between probes of a dead host
    ///
    /// Jittered like the reconnect wait. Default is 30 seconds.
    pub fn alive_detect_interval(&mut self, value: Duration) -> &mut Self {
        self.alive_detect_interval = value;
        self
    }
    /// Configuration of the pooled connections themselves
    pub fn client_config(&mut self, value: &Arc<client::Config>)
        -> &mut Self
    {
        self.client_config = value.clone();
        self
    }
    /// An Arc'd clone to pass to a constructor
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
