//! Websocket protocol: framing, session loop, client handshake
//!
//! Server-side sessions are initiated by the http server (hijack on
//! upgrade); this module owns everything that happens after the 101.

mod alloc;
mod codec;
mod config;
mod dispatcher;
mod error;
mod zero_copy;
pub mod client;
pub mod keys;
pub mod utf8;

pub use self::alloc::Packet;
pub use self::codec::{ServerCodec, ClientCodec};
pub use self::dispatcher::{Dispatcher, Loop};
pub use self::error::Error;
pub use self::zero_copy::{Frame, FrameHeader, HeaderParse};
pub use self::zero_copy::{parse_frame, parse_header, is_valid_close_code};
pub use self::zero_copy::{write_frame, write_packet, write_fragmented,
                          write_close};

use std::time::Duration;

/// Fine-grained configuration of a websocket session
#[derive(Debug, Clone)]
pub struct Config {
    ping_interval: Duration,
    byte_timeout: Duration,
    message_timeout: Duration,
    max_packet_size: usize,
}
