use std::fmt::Display;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use tk_bufstream::WriteBuf;

use enums::Version;
use headers::is_close;
use message::{MessageState, HeaderError};


/// The request writer handed to a client `Codec`
pub struct Encoder<S> {
    message: MessageState,
    buf: WriteBuf<S>,
    is_head: bool,
    close: bool,
}

/// Continuation returned from `Encoder::done`
///
/// Besides the write half it carries what the response parser needs to
/// know about the request: whether it was HEAD (bodyless response) and
/// whether we asked the server to close.
pub struct EncoderDone<S> {
    buf: WriteBuf<S>,
    is_head: bool,
    close: bool,
}

impl<S> EncoderDone<S> {
    pub fn is_head(&self) -> bool {
        self.is_head
    }
    pub fn is_close(&self) -> bool {
        self.close
    }
}

impl<S> Encoder<S> {
    /// Write the request line
    ///
    /// # Panics
    ///
    /// When the request line is already written.
    pub fn request_line(&mut self, method: &str, path: &str,
        version: Version)
    {
        self.message.request_line(&mut self.buf.out_buf,
            method, path, version);
        if method.eq_ignore_ascii_case("HEAD") {
            self.is_head = true;
        }
    }
    /// Add a header
    ///
    /// `Content-Length` and `Transfer-Encoding` must go through
    /// `add_length`/`add_chunked`.
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_header<V: AsRef<[u8]>>(&mut self, name: &str, value: V)
        -> Result<(), HeaderError>
    {
        if name.eq_ignore_ascii_case("Connection")
            && is_close(value.as_ref())
        {
            self.close = true;
        }
        self.message.add_header(&mut self.buf.out_buf, name,
            value.as_ref())
    }
    /// Same as `add_header` but formats the value into the buffer
    pub fn format_header<D: Display>(&mut self, name: &str, value: D)
        -> Result<(), HeaderError>
    {
        self.message.format_header(&mut self.buf.out_buf, name, value)
    }
    /// Add a `Content-Length` header
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_length(&mut self, n: u64) -> Result<(), HeaderError> {
        self.message.add_length(&mut self.buf.out_buf, n)
    }
    /// Add a `Transfer-Encoding: chunked` header
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn add_chunked(&mut self) -> Result<(), HeaderError> {
        self.message.add_chunked(&mut self.buf.out_buf)
    }
    /// Finish the headers
    ///
    /// # Panics
    ///
    /// When called in the wrong state.
    pub fn done_headers(&mut self) -> Result<(), HeaderError> {
        self.message.done_headers(&mut self.buf.out_buf)
            .map(|body_is_allowed| debug_assert!(body_is_allowed))
    }
    /// Write a piece of the request body
    pub fn write_body(&mut self, data: &[u8]) {
        self.message.write_body(&mut self.buf.out_buf, data)
    }
    /// Finish the request
    pub fn done(mut self) -> EncoderDone<S> {
        self.message.done(&mut self.buf.out_buf);
        EncoderDone {
            buf: self.buf,
            is_head: self.is_head,
            close: self.close,
        }
    }
}

pub fn new<S>(io: WriteBuf<S>) -> Encoder<S> {
    Encoder {
        message: MessageState::RequestStart,
        buf: io,
        is_head: false,
        close: false,
    }
}

pub fn get_inner<S>(e: EncoderDone<S>) -> WriteBuf<S> {
    e.buf
}
