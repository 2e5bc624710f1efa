//! Reverse-proxy façade: a server dispatcher forwarding to a balancer
//!
//! Each inbound request is buffered, re-issued against a backend picked
//! by the balancer, and the upstream status, end-to-end headers and body
//! are relayed back. Upstream failures turn into 502 pages.

use std::mem;
use std::rc::Rc;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use futures::{Async, Future};
use url::Url;

use balancer::Balancer;
use client::Buffered;
use enums::Status;
use server::{self, Codec, Dispatcher, Encoder, EncoderDone, Head};
use server::{RecvMode, error_page};


/// Server-side dispatcher that proxies everything to a balancer
pub struct ProxyDispatcher {
    balancer: Rc<Balancer>,
    max_request_length: usize,
}

pub struct ProxyCodec {
    balancer: Rc<Balancer>,
    max_request_length: usize,
    method: String,
    path: String,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
}

impl ProxyDispatcher {
    pub fn new(balancer: Rc<Balancer>) -> ProxyDispatcher {
        ProxyDispatcher {
            balancer: balancer,
            max_request_length: 3 << 20,
        }
    }
    pub fn max_request_length(&mut self, value: usize) {
        self.max_request_length = value;
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    // not relayed in either direction: connection management, body
    // framing and the headers the codecs write themselves
    name.eq_ignore_ascii_case("Connection") ||
    name.eq_ignore_ascii_case("Keep-Alive") ||
    name.eq_ignore_ascii_case("Proxy-Authorization") ||
    name.eq_ignore_ascii_case("Proxy-Authenticate") ||
    name.eq_ignore_ascii_case("TE") ||
    name.eq_ignore_ascii_case("Trailer") ||
    name.eq_ignore_ascii_case("Transfer-Encoding") ||
    name.eq_ignore_ascii_case("Upgrade") ||
    name.eq_ignore_ascii_case("Content-Length") ||
    name.eq_ignore_ascii_case("Host")
}

impl<S> Dispatcher<S> for ProxyDispatcher
    where S: 'static,
{
    type Codec = ProxyCodec;
    fn headers_received(&mut self, headers: &Head)
        -> Result<ProxyCodec, server::Error>
    {
        Ok(ProxyCodec {
            balancer: self.balancer.clone(),
            max_request_length: self.max_request_length,
            method: headers.method().to_string(),
            path: headers.path().to_string(),
            headers: headers.headers().iter()
                .filter(|h| !is_hop_by_hop(h.name))
                .map(|&h| (h.name.to_string(), h.value.to_vec()))
                .collect(),
            body: Vec::new(),
        })
    }
}

impl<S> Codec<S> for ProxyCodec
    where S: 'static,
{
    type ResponseFuture = Box<Future<Item=EncoderDone<S>,
                                     Error=server::Error>>;
    fn recv_mode(&mut self) -> RecvMode {
        RecvMode::buffered_upfront(self.max_request_length)
    }
    fn data_received(&mut self, data: &[u8], end: bool)
        -> Result<Async<usize>, server::Error>
    {
        debug_assert!(end);
        self.body = data.to_vec();
        Ok(Async::Ready(data.len()))
    }
    fn start_response(&mut self, e: Encoder<S>) -> Self::ResponseFuture {
        let method = mem::replace(&mut self.method, String::new());
        let path = mem::replace(&mut self.path, String::new());
        let headers = mem::replace(&mut self.headers, Vec::new());
        let body = mem::replace(&mut self.body, Vec::new());
        let upstream = self.balancer.send_request(move |host| {
            let url = Url::parse(&format!("http://{}{}", host, path))
                .expect("a routable url for a pooled host");
            let body = if body.is_empty() && method == "GET" {
                None
            } else {
                Some(body)
            };
            let (mut codec, rx) = Buffered::request(&method, url,
                body, None);
            for &(ref name, ref value) in &headers {
                codec.add_header(name, value);
            }
            (codec, rx)
        });
        Box::new(upstream.then(move |result| match result {
            Ok(response) => {
                let mut e = e;
                let status = Status::from(response.code());
                match status {
                    Some(status) => e.status(status),
                    None => e.custom_status(response.code(),
                                            response.reason()),
                }
                // hop-by-hop headers stop at the proxy in both
                // directions; the body framing is regenerated below
                for &(ref name, ref value) in response.headers() {
                    if !is_hop_by_hop(name) {
                        e.add_header(name, value).ok();
                    }
                }
                let has_body = status
                    .map(|s| s.response_has_body())
                    .unwrap_or(true);
                if has_body {
                    e.add_length(response.body().len() as u64).unwrap();
                    e.done_headers().unwrap();
                    e.write_body(response.body());
                } else {
                    e.done_headers().unwrap();
                }
                Ok(e.done())
            }
            Err(err) => {
                info!("Upstream request failed: {}", err);
                Ok(error_page(Status::BadGateway,
                    &format!("{}", err), e))
            }
        }))
    }
}
