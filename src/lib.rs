//! HTTP/1.1 plumbing for embedding in `tokio` programs
//!
//! The crate is four layers, bottom up:
//!
//! * wire codecs: http heads, multipart bodies, websocket frames;
//! * `server`: a per-connection protocol future with pluggable codecs;
//! * `client` + `pool`: a sink-of-requests client and per-host pools
//!   with idle collection and host alive detection;
//! * `balancer` + `proxy`: selection over pools and a reverse-proxy
//!   dispatcher composing all of the above.
#![recursion_limit="100"]

extern crate base64;
extern crate byteorder;
extern crate futures;
extern crate futures_cpupool;
extern crate httparse;
#[cfg(feature="date_header")] extern crate httpdate;
extern crate netbuf;
extern crate rand;
extern crate sha1;
extern crate tk_bufstream;
extern crate tokio_core;
extern crate tokio_io;
extern crate url;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;

pub mod server;
pub mod client;
pub mod websocket;
pub mod multipart;
pub mod pool;
pub mod balancer;
pub mod proxy;
mod enums;
mod headers;
mod message;
mod chunked;
mod body_parser;
mod opt_future;

pub use enums::{Version, Status};
pub use opt_future::OptFuture;
