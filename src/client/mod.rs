//! The HTTP/1.x client protocol implementation
//!
//! `Proto` is a `Sink` of request codecs over one connection; `Buffered`
//! is the fully-in-memory codec most callers want; `Connector` glues
//! resolving, connecting, proxying and redirects into one call. Pooling
//! and load balancing over this module live in `pool` and `balancer`.

mod buffered;
mod client;
mod config;
mod encoder;
mod errors;
mod head;
mod parser;
mod proto;
pub mod connector;

pub use self::buffered::{Buffered, Response};
pub use self::client::{Codec, BodyKind, RecvMode};
pub use self::connector::Connector;
pub use self::encoder::{Encoder, EncoderDone};
pub use self::errors::Error;
pub use self::head::HeaderIter;
pub use self::proto::Proto;

use std::borrow::Cow;
use std::time::Duration;

use httparse::Header;

use enums::Version;

/// Fine-grained configuration of a client connection
#[derive(Debug, Clone)]
pub struct Config {
    keep_alive_timeout: Duration,
    max_request_timeout: Duration,
}

/// A borrowed view of parsed response headers
///
/// Passed to `Codec::headers_received`; copy out whatever the response
/// handling needs, the buffer behind it is reused.
#[derive(Debug)]
pub struct Head<'a> {
    version: Version,
    code: u16,
    reason: &'a str,
    headers: &'a [Header<'a>],
    body_kind: BodyKind,
    connection_header: Option<Cow<'a, str>>,
    connection_close: bool,
}
