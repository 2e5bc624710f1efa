use std::sync::Arc;
use std::time::Duration;

use server::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            max_request_length: 3 << 20,
            keep_alive_timeout: Duration::new(60, 0),
            headers_timeout: Duration::new(10, 0),
            input_body_timeout: Duration::new(120, 0),
            output_body_timeout: Duration::new(120, 0),
        }
    }
    /// Maximum size of request head and body combined
    ///
    /// Default is 3 MiB. Anything larger is answered with a 400 page and
    /// the connection is closed.
    pub fn max_request_length(&mut self, value: usize) -> &mut Self {
        self.max_request_length = value;
        self
    }
    /// How long an idle keep-alive connection is kept around
    ///
    /// Default is 60 seconds.
    pub fn keep_alive_timeout(&mut self, value: Duration) -> &mut Self {
        self.keep_alive_timeout = value;
        self
    }
    /// Deadline for receiving the rest of a started request head
    pub fn headers_timeout(&mut self, value: Duration) -> &mut Self {
        self.headers_timeout = value;
        self
    }
    /// Deadline for receiving a whole request body
    pub fn input_body_timeout(&mut self, value: Duration) -> &mut Self {
        self.input_body_timeout = value;
        self
    }
    /// Deadline for generating and flushing a whole response
    pub fn output_body_timeout(&mut self, value: Duration) -> &mut Self {
        self.output_body_timeout = value;
        self
    }
    /// An Arc'd clone to pass to a constructor
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
