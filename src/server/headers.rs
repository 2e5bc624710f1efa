use std::str::from_utf8;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use httparse::{self, Header};
use tk_bufstream::Buf;
use url::percent_encoding::percent_decode;

use enums::Version;
use headers;
use server::codec::BodyKind;
use server::request_target::RequestTarget;
use server::websocket::{self, WebsocketHandshake};
use server::{Error, Dispatcher};


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers in a request
const MAX_HEADERS: usize = 32;

/// Body classification by `Content-Type` prefix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentKind<'a> {
    /// No `Content-Type` header at all
    Unknown,
    /// Any content type not recognized below
    Text,
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `multipart/form-data` with its boundary token
    Multipart { boundary: &'a str },
    /// `application/octet-stream`
    OctetStream,
}

/// A borrowed view of a parsed request head
///
/// Passed to `Dispatcher::headers_received`; copy out whatever the
/// request handling needs, the buffer behind it is reused.
#[derive(Debug)]
pub struct Head<'a> {
    method: &'a str,
    path: &'a str,
    version: Version,
    host: Option<&'a str>,
    headers: &'a [Header<'a>],
    body_kind: BodyKind,
    close: bool,
    content_kind: ContentKind<'a>,
    upgrade: bool,
}

impl<'a> Head<'a> {
    pub fn method(&self) -> &'a str {
        self.method
    }
    /// The whole request target, query string included
    pub fn path(&self) -> &'a str {
        self.path
    }
    /// The target without the query string
    pub fn path_only(&self) -> &'a str {
        match self.path.find('?') {
            Some(q) => &self.path[..q],
            None => self.path,
        }
    }
    /// The raw query string (bytes after `?`)
    pub fn query(&self) -> Option<&'a str> {
        self.path.find('?').map(|q| &self.path[q+1..])
    }
    pub fn version(&self) -> Version {
        self.version
    }
    /// Host from the `Host` header or an absolute request target
    pub fn host(&self) -> Option<&'a str> {
        self.host
    }
    /// All request headers, in wire order
    pub fn headers(&self) -> &'a [Header<'a>] {
        self.headers
    }
    pub fn body_kind(&self) -> BodyKind {
        self.body_kind
    }
    /// Whether the connection closes after this request
    pub fn connection_close(&self) -> bool {
        self.close
    }
    pub fn content_kind(&self) -> ContentKind<'a> {
        self.content_kind
    }
    /// True when the request declares a non-empty body
    pub fn has_body(&self) -> bool {
        match self.body_kind {
            BodyKind::Fixed(n) => n > 0,
            BodyKind::Chunked => true,
        }
    }
    /// `Connection: upgrade` plus `Upgrade: websocket`, both present
    pub fn is_websocket_upgrade(&self) -> bool {
        self.upgrade
    }
    /// The websocket handshake, if this is a well-formed upgrade request
    pub fn websocket_handshake(&self) -> Option<WebsocketHandshake> {
        websocket::get_handshake(self).unwrap_or(None)
    }
}

fn decode_component(piece: &str) -> String {
    let replaced = piece.replace('+', " ");
    let bytes = percent_decode(replaced.as_bytes()).collect::<Vec<u8>>();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Split a query (or urlencoded body) into decoded key-value pairs
///
/// Pieces without a `=` don't produce a pair; a repeated key keeps the
/// last value.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for piece in query.split('&') {
        if let Some(eq) = piece.find('=') {
            let key = decode_component(&piece[..eq]);
            let value = decode_component(&piece[eq+1..]);
            pairs.retain(|&(ref k, _)| k != &key);
            pairs.push((key, value));
        }
    }
    pairs
}

fn str_starts_ignore_case(s: &str, prefix: &str) -> bool {
    let s = s.as_bytes();
    let prefix = prefix.as_bytes();
    s.len() >= prefix.len() &&
        s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn content_kind(value: &[u8]) -> ContentKind {
    let s = match from_utf8(value) {
        Ok(s) => s.trim(),
        Err(_) => return ContentKind::Unknown,
    };
    if str_starts_ignore_case(s, "application/x-www-form-urlencoded") {
        ContentKind::UrlEncoded
    } else if str_starts_ignore_case(s, "multipart/form-data") {
        for param in s.split(';').skip(1) {
            let param = param.trim();
            if str_starts_ignore_case(param, "boundary=") {
                let boundary = param["boundary=".len()..].trim_matches('"');
                return ContentKind::Multipart { boundary: boundary };
            }
        }
        // a multipart body without a boundary can't be parsed
        ContentKind::Unknown
    } else if str_starts_ignore_case(s, "application/octet-stream") {
        ContentKind::OctetStream
    } else {
        ContentKind::Text
    }
}

struct Scan<'a> {
    body: BodyKind,
    close: bool,
    host: Option<&'a str>,
    content_kind: ContentKind<'a>,
    upgrade: bool,
}

fn scan_headers<'a>(minor_version: u8, headers: &'a [Header<'a>])
    -> Result<Scan<'a>, Error>
{
    // body length per RFC 7230 §3.3.3: chunked wins, then
    // Content-Length, then empty; both at once is refused outright
    let mut content_length = None;
    let mut chunked = false;
    let mut close_token = false;
    let mut keep_alive_token = false;
    let mut conn_upgrade = false;
    let mut upgrade_websocket = false;
    let mut host = None;
    let mut kind = ContentKind::Unknown;
    for h in headers.iter() {
        if h.name.eq_ignore_ascii_case("Transfer-Encoding") {
            if let Some(enc) = h.value.split(|&x| x == b',').last() {
                if headers::is_chunked(enc) {
                    chunked = true;
                }
            }
        } else if h.name.eq_ignore_ascii_case("Content-Length") {
            if content_length.is_some() {
                return Err(Error::DuplicateContentLength);
            }
            let s = from_utf8(h.value)
                .map_err(|_| Error::BadContentLength)?;
            let len = s.trim().parse::<u64>()
                .map_err(|_| Error::BadContentLength)?;
            content_length = Some(len);
        } else if h.name.eq_ignore_ascii_case("Connection") {
            if headers::has_token(h.value, "close") {
                close_token = true;
            }
            if headers::has_token(h.value, "keep-alive") {
                keep_alive_token = true;
            }
            if headers::has_token(h.value, "upgrade") {
                conn_upgrade = true;
            }
        } else if h.name.eq_ignore_ascii_case("Host") {
            if host.is_some() {
                return Err(Error::DuplicateHost);
            }
            host = from_utf8(h.value).ok().map(|x| x.trim());
        } else if h.name.eq_ignore_ascii_case("Content-Type") {
            kind = content_kind(h.value);
        } else if h.name.eq_ignore_ascii_case("Upgrade") {
            upgrade_websocket = headers::has_token(h.value, "websocket");
        }
    }
    if chunked && content_length.is_some() {
        return Err(Error::ConflictingBodyLength);
    }
    let body = if chunked {
        BodyKind::Chunked
    } else {
        BodyKind::Fixed(content_length.unwrap_or(0))
    };
    // keep-alive by default on 1.1, opt-in on 1.0
    let close = close_token ||
        (minor_version == 0 && !keep_alive_token);
    Ok(Scan {
        body: body,
        close: close,
        host: host,
        content_kind: kind,
        upgrade: conn_upgrade && upgrade_websocket,
    })
}

/// Facts the connection needs to carry past the borrowed head
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo {
    pub body_kind: BodyKind,
    pub close: bool,
    pub is_head: bool,
    pub version: Version,
}

/// Try to parse a complete request head off the front of the buffer
///
/// Returns `None` when more bytes are needed. On success the head is
/// consumed from the buffer and the dispatcher has been given its look
/// at it; returned are the request codec, the retained facts, and the
/// number of head bytes consumed.
pub fn parse_headers<S, D>(buffer: &mut Buf, dispatcher: &mut D)
    -> Result<Option<(D::Codec, RequestInfo, usize)>, Error>
    where D: Dispatcher<S>,
{
    let (codec, info, bytes) = {
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);
        let mut result = raw.parse(&buffer[..]);
        if matches!(result, Err(httparse::Error::TooManyHeaders)) {
            vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
            raw = httparse::Request::new(&mut vec);
            result = raw.parse(&buffer[..]);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                return Err(Error::TooManyHeaders);
            }
        }
        let bytes = match result? {
            httparse::Status::Complete(bytes) => bytes,
            httparse::Status::Partial => return Ok(None),
        };
        let method = raw.method.unwrap();
        let minor = raw.version.unwrap();
        let parsed_headers: &[httparse::Header] = raw.headers;
        let version = if minor == 1 {
            Version::Http11
        } else {
            Version::Http10
        };
        let scan = scan_headers(minor, parsed_headers)?;
        let (host, path) = match RequestTarget::parse(raw.path.unwrap()) {
            Some(RequestTarget::Origin(path)) => (scan.host, path),
            Some(RequestTarget::Absolute { authority, path, .. }) => {
                // the target's authority overrides the Host header
                (Some(authority), if path.len() == 0 { "/" } else { path })
            }
            Some(RequestTarget::Asterisk) if method == "OPTIONS" => {
                (scan.host, "*")
            }
            _ => return Err(Error::BadRequestTarget),
        };
        let head = Head {
            method: method,
            path: path,
            version: version,
            host: host,
            headers: parsed_headers,
            body_kind: scan.body,
            close: scan.close,
            content_kind: scan.content_kind,
            upgrade: scan.upgrade,
        };
        let codec = dispatcher.headers_received(&head)?;
        let info = RequestInfo {
            body_kind: scan.body,
            close: scan.close,
            is_head: method == "HEAD",
            version: version,
        };
        (codec, info, bytes)
    };
    buffer.consume(bytes);
    Ok(Some((codec, info, bytes)))
}

#[cfg(test)]
mod test {
    use tk_bufstream::Buf;
    use futures::Async;
    use futures::future::FutureResult;

    use enums::Version;
    use server::codec::BodyKind;
    use server::{Codec, Dispatcher, Encoder, EncoderDone, Error};
    use server::{Head, RecvMode};
    use super::{parse_headers, parse_query, RequestInfo};

    // a dispatcher that copies the interesting facts out of the head
    #[derive(Debug)]
    struct Peek {
        method: String,
        path: String,
        host: Option<String>,
        version: Version,
        content: String,
        upgrade: bool,
        close: bool,
    }

    struct Sink;

    impl<S> Codec<S> for Sink {
        type ResponseFuture = FutureResult<EncoderDone<S>, Error>;
        fn recv_mode(&mut self) -> RecvMode {
            RecvMode::buffered_upfront(1 << 20)
        }
        fn data_received(&mut self, data: &[u8], _end: bool)
            -> Result<Async<usize>, Error>
        {
            Ok(Async::Ready(data.len()))
        }
        fn start_response(&mut self, _e: Encoder<S>) -> Self::ResponseFuture
        {
            unimplemented!();
        }
    }

    impl<'x> Dispatcher<()> for &'x mut Option<Peek> {
        type Codec = Sink;
        fn headers_received(&mut self, head: &Head)
            -> Result<Sink, Error>
        {
            **self = Some(Peek {
                method: head.method().to_string(),
                path: head.path().to_string(),
                host: head.host().map(|x| x.to_string()),
                version: head.version(),
                content: format!("{:?}", head.content_kind()),
                upgrade: head.is_websocket_upgrade(),
                close: head.connection_close(),
            });
            Ok(Sink)
        }
    }

    fn parse(data: &[u8]) -> Result<Option<(Peek, RequestInfo)>, Error> {
        let mut buf = Buf::new();
        buf.extend(data);
        let mut peek = None;
        match parse_headers(&mut buf, &mut (&mut peek))? {
            Some((_, info, _)) => Ok(Some((peek.unwrap(), info))),
            None => Ok(None),
        }
    }

    #[test]
    fn simple_get() {
        let (peek, info) = parse(
            b"GET /hello?name=world HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.method, "GET");
        assert_eq!(peek.path, "/hello?name=world");
        assert_eq!(peek.host.as_ref().map(|x| &x[..]), Some("example.com"));
        assert_eq!(peek.version, Version::Http11);
        assert!(!peek.close);
        assert_eq!(info.body_kind, BodyKind::Fixed(0));
    }

    #[test]
    fn incremental() {
        // no chunking of the input changes the result
        let data = b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 3\
            \r\n\r\n";
        for cut in 1..data.len()-1 {
            let mut buf = Buf::new();
            buf.extend(&data[..cut]);
            let mut peek = None;
            assert!(parse_headers(&mut buf, &mut (&mut peek))
                .unwrap().is_none(), "cut at {}", cut);
            buf.extend(&data[cut..]);
            let (_, info, bytes) =
                parse_headers(&mut buf, &mut (&mut peek))
                .unwrap().unwrap();
            assert_eq!(info.body_kind, BodyKind::Fixed(3));
            assert_eq!(bytes, data.len());
            assert_eq!(buf.len(), 0);
        }
    }

    #[test]
    fn keep_alive_matrix() {
        let (_, info) = parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap().unwrap();
        assert!(!info.close);
        let (_, info) = parse(
            b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .unwrap().unwrap();
        assert!(info.close);
        let (_, info) = parse(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n")
            .unwrap().unwrap();
        assert!(info.close);
        let (_, info) = parse(
            b"GET / HTTP/1.0\r\nHost: x\r\nConnection: keep-alive\r\n\r\n")
            .unwrap().unwrap();
        assert!(!info.close);
    }

    #[test]
    fn content_length_and_chunked_conflict() {
        let err = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n")
            .unwrap_err();
        assert_matches!(err, Error::ConflictingBodyLength);
    }

    #[test]
    fn chunked_body_kind() {
        let (_, info) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Transfer-Encoding: chunked\r\n\r\n").unwrap().unwrap();
        assert_eq!(info.body_kind, BodyKind::Chunked);
    }

    #[test]
    fn duplicate_content_length() {
        let err = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Length: 5\r\nContent-Length: 5\r\n\r\n")
            .unwrap_err();
        assert_matches!(err, Error::DuplicateContentLength);
    }

    #[test]
    fn content_kinds() {
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Type: application/x-www-form-urlencoded\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.content, "UrlEncoded");
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Type: multipart/form-data; boundary=XYZ\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.content, "Multipart { boundary: \"XYZ\" }");
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Type: application/octet-stream\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.content, "OctetStream");
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.content, "Text");
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.content, "Unknown");
    }

    #[test]
    fn absolute_target_sets_host() {
        let (peek, _) = parse(
            b"GET http://other.example:8080/path?q=1 HTTP/1.1\r\n\
              Host: ignored\r\n\r\n")
            .unwrap().unwrap();
        assert_eq!(peek.host.as_ref().map(|x| &x[..]),
            Some("other.example:8080"));
        assert_eq!(peek.path, "/path?q=1");
    }

    #[test]
    fn upgrade_detection() {
        let (peek, _) = parse(b"GET /chat HTTP/1.1\r\nHost: x\r\n\
            Connection: keep-alive, Upgrade\r\nUpgrade: websocket\r\n\r\n")
            .unwrap().unwrap();
        assert!(peek.upgrade);
        let (peek, _) = parse(b"GET /chat HTTP/1.1\r\nHost: x\r\n\
            Upgrade: websocket\r\n\r\n").unwrap().unwrap();
        assert!(!peek.upgrade);
    }

    #[test]
    fn too_many_headers() {
        let mut req = b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec();
        for i in 0..40 {
            req.extend_from_slice(format!("X-H{}: v\r\n", i).as_bytes());
        }
        req.extend_from_slice(b"\r\n");
        let err = parse(&req).unwrap_err();
        assert_matches!(err, Error::TooManyHeaders);
    }

    #[test]
    fn query_parsing() {
        assert_eq!(parse_query("a=1&b=2"), vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        // keys with no '=' are absent
        assert_eq!(parse_query("a&b=2"), vec![
            ("b".to_string(), "2".to_string()),
        ]);
        // repeated keys: last wins
        assert_eq!(parse_query("a=1&a=2"), vec![
            ("a".to_string(), "2".to_string()),
        ]);
        // decoding
        assert_eq!(parse_query("a=hello+world&b=%2Fpath"), vec![
            ("a".to_string(), "hello world".to_string()),
            ("b".to_string(), "/path".to_string()),
        ]);
        assert_eq!(parse_query(""), vec![]);
    }

    #[test]
    fn content_kind_case_insensitive() {
        let (peek, _) = parse(b"POST / HTTP/1.1\r\nHost: x\r\n\
            Content-Type: Multipart/Form-Data; Boundary=\"q\"\r\n\r\n")
            .unwrap().unwrap();
        // the boundary= parameter itself is matched case-insensitively
        assert_eq!(peek.content, "Multipart { boundary: \"q\" }");
    }
}
