//! HTTP server protocol implementation
//!
//! `Proto` runs one accepted connection: it parses request heads, reads
//! bodies in the mode the codec asks for, and serializes responses. The
//! split between `Dispatcher` (one per connection) and `Codec` (one per
//! request) is the seam an application router plugs into; `buffered`
//! wraps that seam into a plain `handle(request, encoder)` service.

mod codec;
mod config;
mod encoder;
mod error;
mod error_page;
mod headers;
mod proto;
mod recv_mode;
mod request_target;
mod websocket;
pub mod buffered;

pub use self::codec::{Codec, Dispatcher, BodyKind};
pub use self::encoder::{Encoder, EncoderDone, ResponseConfig, WaitFlush};
pub use self::error::Error;
pub use self::error_page::error_page;
pub use self::headers::{Head, ContentKind, parse_query};
pub use self::proto::Proto;
pub use self::recv_mode::RecvMode;
pub use self::request_target::RequestTarget;
pub use self::websocket::{WebsocketAccept, WebsocketHandshake};

use std::time::Duration;

/// Fine-grained configuration of the HTTP server
#[derive(Debug, Clone)]
pub struct Config {
    max_request_length: usize,
    keep_alive_timeout: Duration,
    headers_timeout: Duration,
    input_body_timeout: Duration,
    output_body_timeout: Duration,
}
