//! Client-side websocket handshake
//!
//! `HandshakeProto` issues the upgrade request with a fresh random key,
//! checks the 101 response (including the `Sec-WebSocket-Accept` value)
//! and yields framed halves ready for `Loop::client`.

use std::fmt::Display;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use futures::{Future, Async, Poll};
use httparse::{self, Header};
use tk_bufstream::{IoBuf, ReadBuf, WriteBuf, WriteFramed, ReadFramed};
use tokio_io::{AsyncRead, AsyncWrite};

use enums::Version;
use headers;
use message::{MessageState, HeaderError};
use websocket::error::ErrorEnum;
use websocket::keys::{Key, Accept};
use websocket::{ClientCodec, Error};


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers in the handshake response
const MAX_HEADERS: usize = 32;

/// Writer for the handshake request
///
/// The upgrade-specific headers are appended by `done()`; everything a
/// server might additionally want (`Host`, `Origin`, cookies) comes from
/// the `Authorizer`.
pub struct Encoder<S> {
    message: MessageState,
    buf: WriteBuf<S>,
    key: String,
}

/// Continuation returned from `Encoder::done`
pub struct EncoderDone<S> {
    buf: WriteBuf<S>,
}

/// Writes handshake request headers and inspects the response
///
/// `SimpleAuthorizer` is enough for most cases; implement this trait
/// yourself when the endpoint needs `Cookie`, `Authorization` or a
/// subprotocol choice parsed out of the response.
pub trait Authorizer<S> {
    /// Data parsed out of the response headers
    type Result: Sized;
    /// Write the request line and extra headers
    fn write_headers(&mut self, e: Encoder<S>) -> EncoderDone<S>;
    /// Inspect response headers of a successful handshake
    fn headers_received(&mut self, headers: &Head)
        -> Result<Self::Result, Error>;
}

/// A borrowed view of the handshake response headers
#[derive(Debug)]
pub struct Head<'a> {
    code: u16,
    reason: &'a str,
    headers: &'a [Header<'a>],
}

impl<'a> Head<'a> {
    pub fn code(&self) -> u16 {
        self.code
    }
    pub fn reason(&self) -> &'a str {
        self.reason
    }
    pub fn headers(&self) -> &'a [Header<'a>] {
        self.headers
    }
}

/// Future performing the handshake over a fresh connection
pub struct HandshakeProto<S, A> {
    input: Option<ReadBuf<S>>,
    output: Option<WriteBuf<S>>,
    accept: String,
    authorizer: A,
}

/// An authorizer that only sends `Host` and the request path
pub struct SimpleAuthorizer {
    host: String,
    path: String,
}

impl SimpleAuthorizer {
    pub fn new<A, B>(host: A, path: B) -> SimpleAuthorizer
        where A: Into<String>,
              B: Into<String>,
    {
        SimpleAuthorizer {
            host: host.into(),
            path: path.into(),
        }
    }
}

impl<S> Authorizer<S> for SimpleAuthorizer {
    type Result = ();
    fn write_headers(&mut self, mut e: Encoder<S>) -> EncoderDone<S> {
        e.request_line(&self.path);
        e.add_header("Host", &self.host).unwrap();
        e.done()
    }
    fn headers_received(&mut self, _headers: &Head)
        -> Result<Self::Result, Error>
    {
        Ok(())
    }
}

fn check_header(name: &str) {
    if name.eq_ignore_ascii_case("Connection") ||
        name.eq_ignore_ascii_case("Upgrade") ||
        name.eq_ignore_ascii_case("Sec-WebSocket-Key") ||
        name.eq_ignore_ascii_case("Sec-WebSocket-Version")
    {
        panic!("upgrade headers are written by the handshake itself");
    }
}

impl<S> Encoder<S> {
    /// Write the request line (the method is always GET)
    ///
    /// # Panics
    ///
    /// When the request line is already written.
    pub fn request_line(&mut self, path: &str) {
        self.message.request_line(&mut self.buf.out_buf,
            "GET", path, Version::Http11);
    }
    /// Add a header
    ///
    /// # Panics
    ///
    /// When called before `request_line` or with one of the headers the
    /// handshake manages itself.
    pub fn add_header<V: AsRef<[u8]>>(&mut self, name: &str, value: V)
        -> Result<(), HeaderError>
    {
        check_header(name);
        self.message.add_header(&mut self.buf.out_buf, name, value.as_ref())
    }
    /// Same as `add_header` but formats the value into the buffer
    pub fn format_header<D: Display>(&mut self, name: &str, value: D)
        -> Result<(), HeaderError>
    {
        check_header(name);
        self.message.format_header(&mut self.buf.out_buf, name, value)
    }
    /// Append the upgrade headers and finish the request
    pub fn done(mut self) -> EncoderDone<S> {
        self.message.add_header(&mut self.buf.out_buf,
            "Connection", b"upgrade").unwrap();
        self.message.add_header(&mut self.buf.out_buf,
            "Upgrade", b"websocket").unwrap();
        self.message.add_header(&mut self.buf.out_buf,
            "Sec-WebSocket-Key", self.key.as_bytes()).unwrap();
        self.message.add_header(&mut self.buf.out_buf,
            "Sec-WebSocket-Version", b"13").unwrap();
        self.message.done_headers(&mut self.buf.out_buf).unwrap();
        self.message.done(&mut self.buf.out_buf);
        EncoderDone { buf: self.buf }
    }
}

fn bytes_trim(mut x: &[u8]) -> &[u8] {
    while x.len() > 0 && matches!(x[0], b'\r' | b'\n' | b' ' | b'\t') {
        x = &x[1..];
    }
    while x.len() > 0 && matches!(x[x.len()-1], b'\r' | b'\n' | b' ' | b'\t')
    {
        x = &x[..x.len()-1];
    }
    x
}

impl<S, A: Authorizer<S>> HandshakeProto<S, A> {
    pub fn new(transport: S, mut authorizer: A) -> HandshakeProto<S, A>
        where S: AsyncRead + AsyncWrite
    {
        let key = format!("{}", Key::new());
        let accept = format!("{}", Accept::from_key_bytes(key.as_bytes()));
        let (tx, rx) = IoBuf::new(transport).split();
        let out = authorizer.write_headers(Encoder {
            message: MessageState::RequestStart,
            buf: tx,
            key: key,
        }).buf;
        HandshakeProto {
            authorizer: authorizer,
            input: Some(rx),
            output: Some(out),
            accept: accept,
        }
    }

    fn parse_headers(&mut self) -> Result<Option<A::Result>, Error> {
        let ref mut buf = self.input.as_mut()
            .expect("buffer still exists")
            .in_buf;
        let (res, bytes) = {
            let mut vec;
            let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
            let (code, reason, headers, bytes) = {
                let mut raw = httparse::Response::new(&mut headers);
                let mut result = raw.parse(&buf[..]);
                if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                    vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                    raw = httparse::Response::new(&mut vec);
                    result = raw.parse(&buf[..]);
                }
                match result.map_err(ErrorEnum::HeaderError)? {
                    httparse::Status::Complete(bytes) => {
                        let parsed: &[Header] = raw.headers;
                        (raw.code.unwrap(), raw.reason.unwrap(),
                         parsed, bytes)
                    }
                    _ => return Ok(None),
                }
            };
            if code != 101 {
                return Err(ErrorEnum::HandshakeFailed(code).into());
            }
            let mut upgrade = false;
            let mut connection = false;
            let mut accepted = false;
            for h in headers.iter() {
                if h.name.eq_ignore_ascii_case("Upgrade") {
                    upgrade = headers::is_websocket(h.value);
                } else if h.name.eq_ignore_ascii_case("Connection") {
                    connection = headers::has_token(h.value, "upgrade");
                } else if h.name
                    .eq_ignore_ascii_case("Sec-WebSocket-Accept")
                {
                    accepted =
                        bytes_trim(h.value) == self.accept.as_bytes();
                }
            }
            if !upgrade || !connection || !accepted {
                debug!("Handshake response lacks upgrade headers or \
                    the accept key doesn't match");
                return Err(ErrorEnum::HandshakeFailed(code).into());
            }
            let head = Head {
                code: code,
                reason: reason,
                headers: headers,
            };
            let data = self.authorizer.headers_received(&head)?;
            (data, bytes)
        };
        buf.consume(bytes);
        Ok(Some(res))
    }
}

impl<S, A> Future for HandshakeProto<S, A>
    where A: Authorizer<S>,
          S: AsyncRead + AsyncWrite,
{
    type Item = (WriteFramed<S, ClientCodec>, ReadFramed<S, ClientCodec>,
                 A::Result);
    type Error = Error;
    fn poll(&mut self) -> Poll<Self::Item, Error> {
        self.output.as_mut().expect("poll after complete")
            .flush().map_err(ErrorEnum::Io)?;
        self.input.as_mut().expect("poll after complete")
            .read().map_err(ErrorEnum::Io)?;
        if self.input.as_mut().expect("poll after complete").done() {
            return Err(ErrorEnum::Closed.into());
        }
        match self.parse_headers()? {
            Some(x) => {
                let inp = self.input.take()
                    .expect("input still here")
                    .framed(ClientCodec::new());
                let out = self.output.take()
                    .expect("output still here")
                    .framed(ClientCodec::new());
                Ok(Async::Ready((out, inp, x)))
            }
            None => Ok(Async::NotReady),
        }
    }
}
