use std::time::Duration;
use std::sync::Arc;

use websocket::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            ping_interval: Duration::new(10, 0),
            byte_timeout: Duration::new(60, 0),
            message_timeout: Duration::new(30, 0),
            max_packet_size: 10 << 20,
        }
    }
    /// Interval of pings sent on an otherwise idle connection
    ///
    /// Default is 10 seconds. Tune together with `message_timeout`.
    pub fn ping_interval(&mut self, dur: Duration) -> &mut Self {
        self.ping_interval = dur;
        self
    }
    /// Shut the connection down when no single byte arrives for this long
    ///
    /// Default is 60 seconds. This fires even in the middle of receiving
    /// a very large frame, so keep it above the time the slowest
    /// legitimate peer needs between two network packets.
    pub fn byte_timeout(&mut self, dur: Duration) -> &mut Self {
        self.byte_timeout = dur;
        self
    }
    /// Shut the connection down when no full message arrives for this long
    ///
    /// Default is 30 seconds, which pairs with the default ping interval:
    /// a peer that doesn't answer two pings is gone.
    pub fn message_timeout(&mut self, dur: Duration) -> &mut Self {
        self.message_timeout = dur;
        self
    }
    /// Largest accepted message, fragments included
    ///
    /// A frame declaring more than this aborts the connection.
    pub fn max_packet_size(&mut self, size: usize) -> &mut Self {
        self.max_packet_size = size;
        self
    }
    /// An Arc'd clone to pass to a constructor
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
