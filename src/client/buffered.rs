//! Fully buffered request/response codec
//!
//! The request (including its body) is assembled up front and the
//! response is delivered through a oneshot channel, either buffered in
//! memory or streamed into an `io::Write` sink. This is the codec the
//! connector, the pool and the balancer all push around; the raw
//! `Codec` trait is there for anything more exotic.

use std::io::{self, Write};
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use futures::Async;
use futures::future::{FutureResult, ok};
use futures::sync::oneshot::{channel, Sender, Receiver};
use url::Url;

use enums::{Status, Version};
use client::{Codec, Encoder, EncoderDone, Error, Head, RecvMode};


enum BodyTarget {
    Memory,
    Sink(Box<io::Write>),
}

/// Codec writing a prepared request and buffering the response
pub struct Buffered {
    method: String,
    url: Url,
    via_proxy: bool,
    extra_headers: Vec<(String, Vec<u8>)>,
    body: Option<Vec<u8>>,
    target: BodyTarget,
    sender: Option<Sender<Result<Response, Error>>>,
    response: Option<Response>,
    max_response_length: usize,
}

/// A buffered response
///
/// When the request streamed its body into a sink, `body()` is empty
/// and the payload went to the sink instead.
#[derive(Debug)]
pub struct Response {
    code: u16,
    reason: String,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
}

impl Response {
    /// The status, when the code is one we have an enum variant for
    pub fn status(&self) -> Option<Status> {
        Status::from(self.code)
    }
    pub fn code(&self) -> u16 {
        self.code
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    /// End-to-end response headers
    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }
    /// First header with this name, if any
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }
    pub fn body(&self) -> &[u8] {
        &self.body
    }
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
    /// A redirect the client is allowed to follow automatically
    pub fn is_redirect(&self) -> bool {
        Status::from(self.code)
            .map(|s| s.is_redirect())
            .unwrap_or(false)
    }
    /// The `Location` header as a string
    pub fn location(&self) -> Option<String> {
        self.header("Location")
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

impl Buffered {
    /// An arbitrary request; `get`/`post` below are shortcuts
    pub fn request(method: &str, url: Url, body: Option<Vec<u8>>,
        content_type: Option<&str>)
        -> (Buffered, Receiver<Result<Response, Error>>)
    {
        let (tx, rx) = channel();
        let mut extra = Vec::new();
        if let Some(ctype) = content_type {
            extra.push(("Content-Type".to_string(),
                        ctype.as_bytes().to_vec()));
        }
        (Buffered {
            method: method.to_string(),
            url: url,
            via_proxy: false,
            extra_headers: extra,
            body: body,
            target: BodyTarget::Memory,
            sender: Some(tx),
            response: None,
            max_response_length: 10 << 20,
        }, rx)
    }
    /// Fetch a url with GET
    pub fn get(url: Url) -> (Buffered, Receiver<Result<Response, Error>>) {
        Buffered::request("GET", url, None, None)
    }
    /// Post a body to a url
    pub fn post(url: Url, body: Vec<u8>, content_type: &str)
        -> (Buffered, Receiver<Result<Response, Error>>)
    {
        Buffered::request("POST", url, Some(body), Some(content_type))
    }
    /// Fetch a url, streaming the response body into a sink
    ///
    /// The `Response` in the channel carries status and headers; the
    /// payload goes into `sink` as it arrives.
    pub fn download<W>(url: Url, sink: W)
        -> (Buffered, Receiver<Result<Response, Error>>)
        where W: io::Write + 'static
    {
        let (mut codec, rx) = Buffered::get(url);
        codec.target = BodyTarget::Sink(Box::new(sink));
        (codec, rx)
    }
    /// Add an extra request header
    pub fn add_header<V: AsRef<[u8]>>(&mut self, name: &str, value: V)
        -> &mut Self
    {
        self.extra_headers.push(
            (name.to_string(), value.as_ref().to_vec()));
        self
    }
    /// Use the absolute url in the request line (talking to a proxy)
    pub fn via_proxy(&mut self) -> &mut Self {
        self.via_proxy = true;
        self
    }
    /// Cap on the buffered response body; default 10 MiB
    pub fn max_response_length(&mut self, value: usize) -> &mut Self {
        self.max_response_length = value;
        self
    }

    fn complete(&mut self) {
        let response = self.response.take()
            .expect("response is being built");
        if let Some(sender) = self.sender.take() {
            sender.send(Ok(response)).ok();
        }
    }
}

impl<S> Codec<S> for Buffered {
    type Future = FutureResult<EncoderDone<S>, Error>;
    fn start_write(&mut self, mut e: Encoder<S>) -> Self::Future {
        let path = if self.via_proxy {
            self.url.as_str().to_string()
        } else {
            match self.url.query() {
                Some(q) => format!("{}?{}", self.url.path(), q),
                None => self.url.path().to_string(),
            }
        };
        e.request_line(&self.method, &path, Version::Http11);
        if let Some(host) = self.url.host_str() {
            match self.url.port() {
                Some(port) => {
                    e.format_header("Host",
                        format_args!("{}:{}", host, port)).unwrap();
                }
                None => {
                    e.add_header("Host", host).unwrap();
                }
            }
        }
        e.add_header("Connection", "keep-alive").unwrap();
        for &(ref name, ref value) in &self.extra_headers {
            e.add_header(name, value).unwrap();
        }
        match self.body {
            Some(ref body) => {
                e.add_length(body.len() as u64).unwrap();
                e.done_headers().unwrap();
                e.write_body(body);
            }
            None => {
                // POST without a body still declares its (zero) length
                if self.method == "POST" || self.method == "PUT" {
                    e.add_length(0).unwrap();
                }
                e.done_headers().unwrap();
            }
        }
        ok(e.done())
    }
    fn headers_received(&mut self, head: &Head)
        -> Result<RecvMode, Error>
    {
        let (code, reason) = head.raw_status();
        self.response = Some(Response {
            code: code,
            reason: reason.to_string(),
            headers: head.headers().map(|(name, value)| {
                (name.to_string(), value.to_vec())
            }).collect(),
            body: Vec::new(),
        });
        match self.target {
            BodyTarget::Memory => {
                Ok(RecvMode::Buffered(self.max_response_length))
            }
            BodyTarget::Sink(..) => Ok(RecvMode::Progressive(1)),
        }
    }
    fn data_received(&mut self, data: &[u8], end: bool)
        -> Result<Async<usize>, Error>
    {
        match self.target {
            BodyTarget::Memory => {
                debug_assert!(end);
                self.response.as_mut()
                    .expect("response is being built")
                    .body = data.to_vec();
                Ok(Async::Ready(data.len()))
            }
            BodyTarget::Sink(ref mut sink) => {
                sink.write_all(data)?;
                if end {
                    sink.flush()?;
                }
                Ok(Async::Ready(data.len()))
            }
        }.map(|res| {
            if end {
                self.complete();
            }
            res
        })
    }
}

impl Drop for Buffered {
    fn drop(&mut self) {
        // a codec dropped mid-exchange reports the failure itself;
        // transport errors are delivered here by the pool instead
        if let (true, Some(sender)) =
            (self.response.is_some(), self.sender.take())
        {
            sender.send(Err(Error::Canceled)).ok();
        }
    }
}
