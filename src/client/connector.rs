//! One-call client surface: resolve, connect, send, follow redirects
//!
//! A `Connector` owns no connections; every call makes a fresh one and
//! drops it afterwards. Put a `pool::Pool` (or a `balancer::Balancer`)
//! in front when connection reuse matters.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use base64;
use futures::Future;
use futures::future::{self, Either};
use futures_cpupool::CpuPool;
use tk_bufstream::{ReadFramed, WriteFramed};
use tokio_core::net::TcpStream;
use tokio_core::reactor::{Handle, Timeout};
use url::Url;
use url::percent_encoding::{utf8_percent_encode, DEFAULT_ENCODE_SET};

use futures::Sink;
use client::buffered::{Buffered, Response};
use client::proto::Proto;
use client::{Config, Error};
use multipart::FormBuilder;
use websocket::client::{HandshakeProto, SimpleAuthorizer};
use websocket::{self, ClientCodec};


/// The framed halves of an established websocket connection
pub type WebsocketPair = (WriteFramed<TcpStream, ClientCodec>,
                          ReadFramed<TcpStream, ClientCodec>);

/// High-level HTTP(S is external)/websocket client
#[derive(Clone)]
pub struct Connector {
    handle: Handle,
    resolver: CpuPool,
    config: Arc<Config>,
    timeout: Duration,
    proxy: Option<(String, u16)>,
    proxy_auth: Option<String>,
}

impl Connector {
    pub fn new(handle: &Handle) -> Connector {
        Connector {
            handle: handle.clone(),
            resolver: CpuPool::new(1),
            config: Config::new().done(),
            timeout: Duration::new(30, 0),
            proxy: None,
            proxy_auth: None,
        }
    }
    /// Use a custom connection config
    pub fn with_config(handle: &Handle, config: &Arc<Config>) -> Connector
    {
        Connector {
            config: config.clone(),
            .. Connector::new(handle)
        }
    }
    /// Default per-request deadline; 30 seconds out of the box
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }
    /// Route every request through an HTTP proxy
    pub fn set_proxy(&mut self, host: &str, port: u16) -> &mut Self {
        self.proxy = Some((host.to_string(), port));
        self
    }
    /// Authenticate to the proxy with a username and password
    pub fn set_proxy_basic_auth(&mut self, user: &str, password: &str)
        -> &mut Self
    {
        let raw = format!("{}:{}", user, password);
        self.proxy_auth = Some(format!("Basic {}", base64::encode(&raw)));
        self
    }
    /// Authenticate to the proxy with a bearer token
    pub fn set_proxy_bearer_token(&mut self, token: &str) -> &mut Self {
        self.proxy_auth = Some(format!("Bearer {}", token));
        self
    }

    fn parse_url(&self, url: &str) -> Result<Url, Error> {
        Url::parse(url)
            .or_else(|_| {
                // a raw path or query may just need escaping
                let encoded = utf8_percent_encode(url, DEFAULT_ENCODE_SET)
                    .to_string();
                Url::parse(&encoded)
            })
            .map_err(|_| Error::InvalidUrl)
    }

    fn resolve(&self, host: String, port: u16)
        -> Box<Future<Item=SocketAddr, Error=Error>>
    {
        Box::new(self.resolver.spawn_fn(move || {
            let mut addrs = (&host[..], port).to_socket_addrs()
                .map_err(Error::Io)?;
            addrs.next().ok_or(Error::NameNotFound)
        }))
    }

    /// Fetch a url
    pub fn get(&self, url: &str)
        -> Box<Future<Item=Response, Error=Error>>
    {
        self.request("GET", url, None, None, None)
    }

    /// Post a body to a url
    pub fn post(&self, url: &str, body: Vec<u8>, content_type: &str)
        -> Box<Future<Item=Response, Error=Error>>
    {
        self.request("POST", url, Some(body), Some(content_type), None)
    }

    /// An arbitrary buffered request
    ///
    /// Redirect responses (300, 301, 302, 304, 307 with a `Location`)
    /// are followed once, re-dispatched as GET.
    pub fn request(&self, method: &str, url: &str, body: Option<Vec<u8>>,
        content_type: Option<&str>, timeout: Option<Duration>)
        -> Box<Future<Item=Response, Error=Error>>
    {
        let url = match self.parse_url(url) {
            Ok(url) => url,
            Err(e) => return Box::new(future::err(e)),
        };
        let (codec, rx) = Buffered::request(method, url.clone(), body,
            content_type);
        self.dispatch(url, codec, rx, timeout, true)
    }

    /// Fetch a url, streaming the body into an `io::Write` sink
    pub fn download<W>(&self, url: &str, sink: W,
        timeout: Option<Duration>)
        -> Box<Future<Item=Response, Error=Error>>
        where W: io::Write + 'static
    {
        let url = match self.parse_url(url) {
            Ok(url) => url,
            Err(e) => return Box::new(future::err(e)),
        };
        let (codec, rx) = Buffered::download(url.clone(), sink);
        self.dispatch(url, codec, rx, timeout, false)
    }

    /// Post data as a `multipart/form-data` file field
    pub fn upload(&self, url: &str, field: &str, filename: &str,
        content_type: &str, data: &[u8], timeout: Option<Duration>)
        -> Box<Future<Item=Response, Error=Error>>
    {
        let mut form = FormBuilder::new();
        form.add_file(field, filename, content_type, data);
        let form_type = form.content_type();
        self.request("POST", url, Some(form.finish()),
            Some(&form_type), timeout)
    }

    /// Open a websocket connection (`ws://` url)
    pub fn websocket(&self, url: &str)
        -> Box<Future<Item=WebsocketPair, Error=websocket::Error>>
    {
        let url = match self.parse_url(url) {
            Ok(url) => url,
            Err(e) => return Box::new(future::err(websocket::Error::custom(e))),
        };
        if url.scheme() != "ws" {
            return Box::new(future::err(websocket::Error::custom(
                Error::UnsupportedScheme)));
        }
        let host = match url.host_str() {
            Some(host) => host.to_string(),
            None => return Box::new(future::err(websocket::Error::custom(
                Error::InvalidUrl))),
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let host_header = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };
        let path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        let handle = self.handle.clone();
        Box::new(self.resolve(host, port)
            .map_err(websocket::Error::custom)
            .and_then(move |addr| {
                TcpStream::connect(&addr, &handle)
                    .map_err(websocket::Error::from)
            })
            .and_then(move |sock| {
                HandshakeProto::new(sock,
                    SimpleAuthorizer::new(host_header, path))
            })
            .map(|(out, inp, ())| (out, inp)))
    }

    fn dispatch(&self, url: Url, mut codec: Buffered,
        rx: ::futures::sync::oneshot::Receiver<Result<Response, Error>>,
        timeout: Option<Duration>, follow_redirects: bool)
        -> Box<Future<Item=Response, Error=Error>>
    {
        match url.scheme() {
            "http" => {}
            // TLS is wired by the embedding program around the generic
            // protocol; this convenience surface is plain-tcp only
            _ => return Box::new(future::err(Error::UnsupportedScheme)),
        }
        let host = match url.host_str() {
            Some(host) => host.to_string(),
            None => return Box::new(future::err(Error::InvalidUrl)),
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let (connect_host, connect_port) = match self.proxy {
            Some((ref phost, pport)) => {
                codec.via_proxy();
                if let Some(ref auth) = self.proxy_auth {
                    codec.add_header("Proxy-Authorization", auth);
                }
                (phost.clone(), pport)
            }
            None => (host, port),
        };
        let config = self.config.clone();
        let handle = self.handle.clone();
        let this = self.clone();
        let fut = self.resolve(connect_host, connect_port)
            .and_then(move |addr| {
                Proto::connect_tcp(addr, &config, &handle)
            })
            .and_then(move |proto| {
                proto.send(codec).then(|res| match res {
                    // `Closed` after the exchange just means no reuse
                    Ok(_) | Err(Error::Closed) => Ok(()),
                    Err(e) => Err(e),
                })
            })
            .and_then(move |()| rx.then(|res| match res {
                Ok(inner) => inner,
                Err(_canceled) => Err(Error::Canceled),
            }))
            .and_then(move |response|
                -> Box<Future<Item=Response, Error=Error>>
            {
                if follow_redirects && response.is_redirect() {
                    if let Some(location) = response.location() {
                        if let Ok(next) = url.join(&location) {
                            let (codec, rx) = Buffered::get(next.clone());
                            return this.dispatch(next, codec, rx,
                                None, false);
                        }
                    }
                }
                Box::new(future::ok(response))
            });
        let deadline = Timeout::new(
            timeout.unwrap_or(self.timeout), &self.handle)
            .expect("can always set a timeout");
        Box::new(fut.select2(deadline.map_err(Error::Io))
            .then(|res| match res {
                Ok(Either::A((response, _))) => Ok(response),
                Ok(Either::B(((), _))) => Err(Error::TimedOut),
                Err(Either::A((e, _))) => Err(e),
                Err(Either::B((e, _))) => Err(e),
            }))
    }
}
