//! Serializer state machine shared between responses and client requests
//!
//! Every write method puts bytes into the output buffer immediately; the
//! state enum only exists to make sure the caller cannot produce an
//! inconsistent message (body before headers, two content-lengths, a body
//! on a 304, and so on).

use std::fmt::Display;
use std::io::Write;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use tk_bufstream::Buf;

use enums::Version;

quick_error! {
    #[derive(Debug)]
    pub enum HeaderError {
        DuplicateContentLength {
            description("Content-Length is added twice")
        }
        DuplicateTransferEncoding {
            description("Transfer-Encoding is added twice")
        }
        InvalidHeaderName {
            description("header name contains invalid characters")
        }
        InvalidHeaderValue {
            description("header value contains invalid characters")
        }
        TransferEncodingAfterContentLength {
            description("Transfer-Encoding added when Content-Length is \
                already specified")
        }
        ContentLengthAfterTransferEncoding {
            description("Content-Length added after Transfer-Encoding")
        }
        CantDetermineBodySize {
            description("neither Content-Length nor Transfer-Encoding \
                is present in the headers")
        }
        BodyLengthHeader {
            description("Content-Length and Transfer-Encoding must be set \
                using the specialized methods")
        }
        RequireBodyless {
            description("message must not contain body length fields")
        }
    }
}

/// Progress of a single message being serialized
///
/// The same buffer must be passed to every method of one message.
#[derive(Debug)]
pub enum MessageState {
    /// Status line not yet written.
    ResponseStart { version: Version, body: Body, close: Close },
    /// Request line not yet written.
    RequestStart,
    /// Status or request line is in the buffer.
    Headers { body: Body, close: Close },
    /// Content-Length has been written.
    FixedHeaders { is_head: bool, close: Close, content_length: u64 },
    /// Transfer-Encoding: chunked has been written.
    ChunkedHeaders { is_head: bool, close: Close },
    /// Headers done, message has no body at all (1xx, 204, 304).
    Bodyless,
    /// Headers done, writing a fixed-size body.
    FixedBody { is_head: bool, content_length: u64 },
    /// Headers done, writing a chunked body.
    ChunkedBody { is_head: bool },
    /// Message finished.
    Done,
}

/// What to say in the `Connection` header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Close {
    /// Nothing; HTTP/1.1 default keep-alive (and all requests).
    Default,
    /// `Connection: close`.
    Close,
    /// `Connection: keep-alive`, for HTTP/1.0 peers that asked for it.
    KeepAlive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Body {
    /// Response carries a body.
    Normal,
    /// Response to a HEAD request: length fields yes, body bytes no.
    Head,
    /// Body is forbidden: 1xx, 204, 304.
    Denied,
    /// A request; always allowed to carry a (possibly empty) body.
    Request,
}

fn invalid_header(value: &[u8]) -> bool {
    value.iter().any(|&x| x == b'\r' || x == b'\n')
}

impl MessageState {
    /// Write the status line
    ///
    /// # Panics
    ///
    /// If a line was already written, or on a 100 (interim) code.
    pub fn response_status(&mut self, buf: &mut Buf, code: u16, reason: &str) {
        use self::Body::*;
        use self::MessageState::*;
        match *self {
            ResponseStart { version, mut body, close } => {
                assert!(code != 100);
                write!(buf, "{} {} {}\r\n", version, code, reason).unwrap();
                if (code >= 100 && code < 200) || code == 204 || code == 304 {
                    body = Denied;
                }
                *self = Headers { body: body, close: close };
            }
            ref state => {
                panic!("response_status() called on message in state {:?}",
                    state)
            }
        }
    }

    /// Write the request line
    ///
    /// # Panics
    ///
    /// If a line was already written.
    pub fn request_line(&mut self, buf: &mut Buf,
        method: &str, path: &str, version: Version)
    {
        use self::Body::*;
        use self::MessageState::*;
        match *self {
            RequestStart => {
                write!(buf, "{} {} {}\r\n", method, path, version).unwrap();
                *self = Headers { body: Request, close: Close::Default };
            }
            ref state => {
                panic!("request_line() called on message in state {:?}",
                    state)
            }
        }
    }

    fn write_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        buf.write_all(value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    fn write_formatted<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        write!(buf, "{}", value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    /// Add a header
    ///
    /// `Content-Length` and `Transfer-Encoding` must go through
    /// `add_length`/`add_chunked`; they drive the body framing and are
    /// rejected here.
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding")
        {
            return Err(BodyLengthHeader)
        }
        match *self {
            Headers { .. } | FixedHeaders { .. } | ChunkedHeaders { .. } => {
                self.write_header(buf, name, value)
            }
            ref state => {
                panic!("add_header() called on message in state {:?}", state)
            }
        }
    }

    /// Same as `add_header` but formats the value into the buffer
    pub fn format_header<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding")
        {
            return Err(BodyLengthHeader)
        }
        match *self {
            Headers { .. } | FixedHeaders { .. } | ChunkedHeaders { .. } => {
                self.write_formatted(buf, name, value)
            }
            ref state => {
                panic!("format_header() called on message in state {:?}",
                    state)
            }
        }
    }

    /// Write `Content-Length`, committing the message to a fixed body
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_length(&mut self, buf: &mut Buf, n: u64)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        use self::Body::*;
        match *self {
            FixedHeaders { .. } => Err(DuplicateContentLength),
            ChunkedHeaders { .. } => Err(ContentLengthAfterTransferEncoding),
            Headers { body: Denied, .. } => Err(RequireBodyless),
            Headers { body, close } => {
                self.write_formatted(buf, "Content-Length", n)?;
                *self = FixedHeaders { is_head: body == Head,
                                       close: close,
                                       content_length: n };
                Ok(())
            }
            ref state => {
                panic!("add_length() called on message in state {:?}", state)
            }
        }
    }

    /// Write `Transfer-Encoding: chunked`
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_chunked(&mut self, buf: &mut Buf)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        use self::Body::*;
        match *self {
            FixedHeaders { .. } => Err(TransferEncodingAfterContentLength),
            ChunkedHeaders { .. } => Err(DuplicateTransferEncoding),
            Headers { body: Denied, .. } => Err(RequireBodyless),
            Headers { body, close } => {
                self.write_header(buf, "Transfer-Encoding", b"chunked")?;
                *self = ChunkedHeaders { is_head: body == Head, close: close };
                Ok(())
            }
            ref state => {
                panic!("add_chunked() called on message in state {:?}", state)
            }
        }
    }

    /// True once the status or request line has been written
    pub fn is_started(&self) -> bool {
        !matches!(*self,
            MessageState::RequestStart |
            MessageState::ResponseStart { .. })
    }

    /// Finish the header section; returns whether a body is expected
    ///
    /// `false` for 1xx/204/304 and responses to HEAD requests.
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn done_headers(&mut self, buf: &mut Buf)
        -> Result<bool, HeaderError>
    {
        use self::Body::*;
        use self::MessageState::*;
        match *self {
            Headers { close, .. } |
            FixedHeaders { close, .. } |
            ChunkedHeaders { close, .. } => match close {
                Close::Close => {
                    self.add_header(buf, "Connection", b"close").unwrap();
                }
                Close::KeepAlive => {
                    self.add_header(buf, "Connection", b"keep-alive")
                        .unwrap();
                }
                Close::Default => {}
            },
            _ => {}
        }
        let expect_body = match *self {
            Headers { body: Denied, .. } => {
                *self = Bodyless;
                false
            }
            Headers { body: Request, .. } => {
                // a request without length headers has an empty body
                *self = FixedBody { is_head: false, content_length: 0 };
                true
            }
            Headers { body: Normal, .. } => {
                return Err(HeaderError::CantDetermineBodySize);
            }
            FixedHeaders { is_head, content_length, .. } => {
                *self = FixedBody { is_head: is_head,
                                    content_length: content_length };
                !is_head
            }
            ChunkedHeaders { is_head, .. } => {
                *self = ChunkedBody { is_head: is_head };
                !is_head
            }
            ref state => {
                panic!("done_headers() called on message in state {:?}",
                    state)
            }
        };
        buf.write(b"\r\n").unwrap();
        Ok(expect_body)
    }

    /// Write a piece of the body
    ///
    /// Fixed-size bodies are written as-is and counted against the declared
    /// length. Chunked bodies get the `<hex-size> CRLF data CRLF` framing
    /// per piece; empty pieces are ignored (an empty chunk would terminate
    /// the body). Bodies of HEAD responses are accepted and dropped.
    ///
    /// # Panics
    ///
    /// When called in the wrong state, or when a fixed body overflows the
    /// declared content length.
    pub fn write_body(&mut self, buf: &mut Buf, data: &[u8]) {
        use self::MessageState::*;
        match *self {
            Bodyless => panic!("message must not contain a body"),
            FixedBody { is_head, ref mut content_length } => {
                if data.len() as u64 > *content_length {
                    panic!("fixed-size body overflow: {} bytes left, \
                        got {} more", content_length, data.len());
                }
                if !is_head {
                    buf.write(data).unwrap();
                }
                *content_length -= data.len() as u64;
            }
            ChunkedBody { is_head } => if !is_head && data.len() > 0 {
                write!(buf, "{:x}\r\n", data.len()).unwrap();
                buf.write(data).unwrap();
                buf.write(b"\r\n").unwrap();
            },
            ref state => {
                panic!("write_body() called on message in state {:?}", state)
            }
        }
    }

    /// True once `done()` was called
    pub fn is_complete(&self) -> bool {
        matches!(*self, MessageState::Done)
    }

    /// Finish the message, emitting the chunked terminator if needed
    ///
    /// May be called multiple times.
    ///
    /// # Panics
    ///
    /// When a fixed-size body was not written in full.
    pub fn done(&mut self, buf: &mut Buf) {
        use self::MessageState::*;
        match *self {
            Bodyless => *self = Done,
            FixedBody { is_head: true, .. } |
            ChunkedBody { is_head: true } => *self = Done,
            FixedBody { is_head: false, content_length: 0 } => *self = Done,
            FixedBody { is_head: false, content_length } =>
                panic!("done() with {} body bytes remaining", content_length),
            ChunkedBody { is_head: false } => {
                buf.write(b"0\r\n\r\n").unwrap();
                *self = Done;
            }
            Done => {}
            ref state => {
                panic!("done() called on message in state {:?}", state);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use tk_bufstream::Buf;

    use super::{MessageState, Body, Close};
    use enums::Version;

    fn do_request<F>(fun: F) -> Buf
        where F: FnOnce(MessageState, &mut Buf)
    {
        let mut buf = Buf::new();
        fun(MessageState::RequestStart, &mut buf);
        buf
    }
    fn do_response11<F>(close: Close, fun: F) -> Buf
        where F: FnOnce(MessageState, &mut Buf)
    {
        let mut buf = Buf::new();
        fun(MessageState::ResponseStart {
            version: Version::Http11,
            body: Body::Normal,
            close: close,
        }, &mut buf);
        buf
    }
    fn do_head_response11<F>(fun: F) -> Buf
        where F: FnOnce(MessageState, &mut Buf)
    {
        let mut buf = Buf::new();
        fun(MessageState::ResponseStart {
            version: Version::Http11,
            body: Body::Head,
            close: Close::Default,
        }, &mut buf);
        buf
    }

    #[test]
    fn minimal_request() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "GET", "/", Version::Http11);
            msg.done_headers(buf).unwrap();
        })[..], "GET / HTTP/1.1\r\n\r\n".as_bytes());
    }

    #[test]
    fn request_with_body() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/submit", Version::Http11);
            msg.add_length(buf, 5).unwrap();
            msg.done_headers(buf).unwrap();
            msg.write_body(buf, b"hello");
            msg.done(buf);
        })[..], "POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"
            .as_bytes());
    }

    #[test]
    fn minimal_response() {
        assert_eq!(&do_response11(Close::Default, |mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_length(buf, 0).unwrap();
            msg.done_headers(buf).unwrap();
            msg.done(buf);
        })[..], "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".as_bytes());
    }

    #[test]
    fn close_response() {
        assert_eq!(&do_response11(Close::Close, |mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_length(buf, 0).unwrap();
            msg.done_headers(buf).unwrap();
            msg.done(buf);
        })[..], concat!("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n",
                        "Connection: close\r\n\r\n").as_bytes());
    }

    #[test]
    fn chunked_response() {
        assert_eq!(&do_response11(Close::Default, |mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_chunked(buf).unwrap();
            msg.done_headers(buf).unwrap();
            msg.write_body(buf, b"hello");
            msg.write_body(buf, b"");
            msg.write_body(buf, &[b'x'; 26]);
            msg.done(buf);
        })[..], concat!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
            "5\r\nhello\r\n",
            "1a\r\nxxxxxxxxxxxxxxxxxxxxxxxxxx\r\n",
            "0\r\n\r\n").as_bytes());
    }

    #[test]
    fn head_response_skips_body() {
        // length of the real entity, but no body bytes
        assert_eq!(&do_head_response11(|mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_length(buf, 500).unwrap();
            msg.done_headers(buf).unwrap();
            msg.write_body(buf, b"ignored");
            msg.done(buf);
        })[..], "HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n".as_bytes());
    }

    #[test]
    fn no_body_on_204() {
        assert_eq!(&do_response11(Close::Default, |mut msg, buf| {
            msg.response_status(buf, 204, "No Content");
            msg.add_length(buf, 500).unwrap_err();
            msg.done_headers(buf).unwrap();
            msg.done(buf);
        })[..], "HTTP/1.1 204 No Content\r\n\r\n".as_bytes());
    }

    #[test]
    fn length_header_rejected() {
        do_response11(Close::Default, |mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_header(buf, "Content-Length", b"10").unwrap_err();
            msg.add_length(buf, 0).unwrap();
            msg.done_headers(buf).unwrap();
        });
    }

    #[test]
    fn header_injection_rejected() {
        do_response11(Close::Default, |mut msg, buf| {
            msg.response_status(buf, 200, "OK");
            msg.add_header(buf, "X-Evil", b"a\r\nX-Oops: 1").unwrap_err();
            msg.add_length(buf, 0).unwrap();
            msg.done_headers(buf).unwrap();
        });
    }
}
