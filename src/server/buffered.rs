//! Higher-level interface for serving fully buffered requests
//!
//! "Fully buffered" means the whole request (head, body, parsed forms)
//! is materialized on the heap before the service sees it, and the
//! service is a plain `handle(request, encoder)` call. The raw
//! `Dispatcher`/`Codec` interface underneath allows streaming and tighter
//! control; both styles can coexist on one listening socket.

use std::marker::PhantomData;
use std::net::SocketAddr;

use futures::{Async, Future, IntoFuture};
use futures::future::FutureResult;
use tk_bufstream::{ReadBuf, WriteBuf, ReadFramed, WriteFramed};
use tokio_core::reactor::Handle;

use enums::Version;
use multipart::{self, Part};
use server::headers::{ContentKind, parse_query};
use server::{Codec, Dispatcher, Encoder, EncoderDone, Error, Head};
use server::{RecvMode, WebsocketHandshake};
use websocket::ServerCodec as WebsocketCodec;

/// What the request body was declared (and parsed) as
#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    /// No `Content-Type` header
    Unknown,
    /// Plain payload, kept as raw bytes
    Text,
    /// `application/x-www-form-urlencoded`, parsed into `form()`
    UrlEncoded,
    /// `multipart/form-data`, parsed into `parts()`
    Multipart { boundary: String },
    /// `application/octet-stream`
    OctetStream,
}

/// A fully buffered request
#[derive(Debug)]
pub struct Request {
    peer_addr: SocketAddr,
    method: String,
    path: String,
    host: Option<String>,
    version: Version,
    headers: Vec<(String, Vec<u8>)>,
    queries: Vec<(String, String)>,
    body_kind: BodyKind,
    body: Vec<u8>,
    form: Vec<(String, String)>,
    parts: Vec<Part>,
    websocket_handshake: Option<WebsocketHandshake>,
}

pub struct BufferedDispatcher<S, N: NewService<S>> {
    addr: SocketAddr,
    max_request_length: usize,
    service: N,
    handle: Handle,
    phantom: PhantomData<S>,
}

pub struct BufferedCodec<R> {
    max_request_length: usize,
    service: R,
    request: Option<Request>,
    handle: Handle,
}

/// Service factory pairing an http handler with a websocket handler
pub struct WebsocketFactory<F, G> {
    service: F,
    websockets: G,
}

pub struct WebsocketService<F, G, T, U> {
    service: F,
    websockets: G,
    phantom: PhantomData<(T, U)>,
}

pub trait NewService<S> {
    type Future: Future<Item=EncoderDone<S>, Error=Error>;
    type Instance: Service<S, Future=Self::Future>;
    fn new(&self) -> Self::Instance;
}

pub trait Service<S> {
    type Future: Future<Item=EncoderDone<S>, Error=Error>;
    type WebsocketFuture: Future<Item=(), Error=()> + 'static;
    /// Called exactly once per complete request
    fn call(&mut self, request: Request, encoder: Encoder<S>)
        -> Self::Future;
    /// Called instead of `call` completion handling after a 101
    fn start_websocket(&mut self, output: WriteFramed<S, WebsocketCodec>,
                                  input: ReadFramed<S, WebsocketCodec>)
        -> Self::WebsocketFuture;
}

impl Request {
    /// Peer address of the underlying connection
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
    pub fn method(&self) -> &str {
        &self.method
    }
    /// Full request target, query string included
    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn version(&self) -> Version {
        self.version
    }
    pub fn host(&self) -> Option<&str> {
        self.host.as_ref().map(|x| &x[..])
    }
    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }
    /// First header with this name, if any
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        #[allow(unused_imports)]
        use std::ascii::AsciiExt;
        self.headers.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }
    /// Decoded query parameters (last value wins for repeated keys)
    pub fn queries(&self) -> &[(String, String)] {
        &self.queries
    }
    pub fn body_kind(&self) -> &BodyKind {
        &self.body_kind
    }
    /// The raw body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }
    /// Decoded urlencoded form fields (empty for other body kinds)
    pub fn form(&self) -> &[(String, String)] {
        &self.form
    }
    /// Multipart body parts (empty for other body kinds)
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
    pub fn websocket_handshake(&self) -> Option<&WebsocketHandshake> {
        self.websocket_handshake.as_ref()
    }
}

impl<S, F, G, H, I, T, U> NewService<S> for WebsocketFactory<F, G>
    where F: Fn() -> H,
          H: FnMut(Request, Encoder<S>) -> T,
          G: Fn() -> I,
          I: FnMut(WriteFramed<S, WebsocketCodec>,
                   ReadFramed<S, WebsocketCodec>) -> U,
          T: Future<Item=EncoderDone<S>, Error=Error>,
          U: Future<Item=(), Error=()> + 'static,
{
    type Future = T;
    type Instance = WebsocketService<H, I, T, U>;
    fn new(&self) -> Self::Instance {
        WebsocketService {
            service: (self.service)(),
            websockets: (self.websockets)(),
            phantom: PhantomData,
        }
    }
}

impl<S, H, I, T, U> Service<S> for WebsocketService<H, I, T, U>
    where H: FnMut(Request, Encoder<S>) -> T,
          I: FnMut(WriteFramed<S, WebsocketCodec>,
                   ReadFramed<S, WebsocketCodec>) -> U,
          T: Future<Item=EncoderDone<S>, Error=Error>,
          U: Future<Item=(), Error=()> + 'static,
{
    type Future = T;
    type WebsocketFuture = U;
    fn call(&mut self, request: Request, encoder: Encoder<S>) -> T {
        (self.service)(request, encoder)
    }
    fn start_websocket(&mut self, output: WriteFramed<S, WebsocketCodec>,
                                  input: ReadFramed<S, WebsocketCodec>)
        -> U
    {
        (self.websockets)(output, input)
    }
}

impl<S, T, R> NewService<S> for T
    where T: Fn() -> R,
          R: Service<S>,
{
    type Future = R::Future;
    type Instance = R;
    fn new(&self) -> R {
        (self)()
    }
}

impl<S, T, F> Service<S> for T
    where T: Fn(Request, Encoder<S>) -> F,
          F: Future<Item=EncoderDone<S>, Error=Error>,
{
    type Future = F;
    type WebsocketFuture = FutureResult<(), ()>;
    fn call(&mut self, request: Request, encoder: Encoder<S>) -> F {
        (self)(request, encoder)
    }
    fn start_websocket(&mut self, _output: WriteFramed<S, WebsocketCodec>,
                                  _input: ReadFramed<S, WebsocketCodec>)
        -> Self::WebsocketFuture
    {
        // this service doesn't do websockets
        Ok(()).into_future()
    }
}

impl<S, N: NewService<S>> BufferedDispatcher<S, N> {
    pub fn new(addr: SocketAddr, handle: &Handle, service: N)
        -> BufferedDispatcher<S, N>
    {
        BufferedDispatcher {
            addr: addr,
            max_request_length: 3 << 20,
            service: service,
            handle: handle.clone(),
            phantom: PhantomData,
        }
    }
    pub fn max_request_length(&mut self, value: usize) {
        self.max_request_length = value;
    }
}

impl<S, F, G, H, I, T, U> BufferedDispatcher<S, WebsocketFactory<F, G>>
    where F: Fn() -> H,
          H: FnMut(Request, Encoder<S>) -> T,
          G: Fn() -> I,
          I: FnMut(WriteFramed<S, WebsocketCodec>,
                   ReadFramed<S, WebsocketCodec>) -> U,
          T: Future<Item=EncoderDone<S>, Error=Error>,
          U: Future<Item=(), Error=()> + 'static,
{
    pub fn new_with_websockets(addr: SocketAddr, handle: &Handle,
        http: F, websockets: G)
        -> BufferedDispatcher<S, WebsocketFactory<F, G>>
    {
        BufferedDispatcher {
            addr: addr,
            max_request_length: 3 << 20,
            service: WebsocketFactory {
                service: http,
                websockets: websockets,
            },
            handle: handle.clone(),
            phantom: PhantomData,
        }
    }
}

impl<S, N: NewService<S>> Dispatcher<S> for BufferedDispatcher<S, N>
    where N::Instance: 'static,
{
    type Codec = BufferedCodec<N::Instance>;

    fn headers_received(&mut self, headers: &Head)
        -> Result<Self::Codec, Error>
    {
        let body_kind = match headers.content_kind() {
            ContentKind::Unknown => BodyKind::Unknown,
            ContentKind::Text => BodyKind::Text,
            ContentKind::UrlEncoded => BodyKind::UrlEncoded,
            ContentKind::Multipart { boundary } => BodyKind::Multipart {
                boundary: boundary.to_string(),
            },
            ContentKind::OctetStream => BodyKind::OctetStream,
        };
        Ok(BufferedCodec {
            max_request_length: self.max_request_length,
            service: self.service.new(),
            request: Some(Request {
                peer_addr: self.addr,
                method: headers.method().to_string(),
                path: headers.path().to_string(),
                host: headers.host().map(|x| x.to_string()),
                version: headers.version(),
                headers: headers.headers().iter().map(|&header| {
                    (header.name.to_string(), header.value.to_vec())
                }).collect(),
                queries: parse_query(headers.query().unwrap_or("")),
                body_kind: body_kind,
                body: Vec::new(),
                form: Vec::new(),
                parts: Vec::new(),
                websocket_handshake: headers.websocket_handshake(),
            }),
            handle: self.handle.clone(),
        })
    }
}

impl<S, R: Service<S> + 'static> Codec<S> for BufferedCodec<R> {
    type ResponseFuture = R::Future;
    fn recv_mode(&mut self) -> RecvMode {
        let req = self.request.as_ref().unwrap();
        if req.websocket_handshake.is_some() {
            RecvMode::hijack()
        } else {
            RecvMode::buffered_upfront(self.max_request_length)
        }
    }
    fn data_received(&mut self, data: &[u8], end: bool)
        -> Result<Async<usize>, Error>
    {
        debug_assert!(end);
        let req = self.request.as_mut().unwrap();
        req.body = data.to_vec();
        match req.body_kind {
            BodyKind::UrlEncoded => {
                let text = String::from_utf8_lossy(&req.body);
                req.form = parse_query(&text);
            }
            BodyKind::Multipart { ref boundary } => {
                req.parts = multipart::collect_parts(boundary, &req.body)
                    .map_err(Error::BadRequestBody)?;
            }
            _ => {}
        }
        Ok(Async::Ready(data.len()))
    }
    fn start_response(&mut self, e: Encoder<S>) -> R::Future {
        self.service.call(self.request.take().unwrap(), e)
    }
    fn hijack(&mut self, write_buf: WriteBuf<S>, read_buf: ReadBuf<S>) {
        let inp = read_buf.framed(WebsocketCodec::new());
        let out = write_buf.framed(WebsocketCodec::new());
        self.handle.spawn(self.service.start_websocket(out, inp));
    }
}
