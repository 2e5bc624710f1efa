use std::borrow::Cow;
use std::str::from_utf8;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use futures::{Future, Async, Poll};
use httparse;
use tk_bufstream::{ReadBuf, Buf};
use tokio_io::AsyncRead;

use body_parser::BodyProgress;
use chunked;
use client::client::{BodyKind, RecvMode};
use client::{Codec, Error, Head};
use enums::Version;
use headers;


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers in a response
const MAX_HEADERS: usize = 64;


#[derive(Debug, Clone)]
enum State {
    Headers { is_head: bool },
    Body { mode: RecvMode, progress: BodyProgress },
}

/// Future reading one response off a connection
///
/// Yields the read half back for reuse, or `None` when the response
/// said `Connection: close`.
pub struct Parser<S, C: Codec<S>> {
    io: Option<ReadBuf<S>>,
    codec: C,
    close: bool,
    state: State,
}

fn scan_headers<'x>(is_head: bool, code: u16,
    headers: &'x [httparse::Header])
    -> Result<(BodyKind, Option<Cow<'x, str>>, bool), Error>
{
    // Body length per RFC 7230 §3.3.3, response side:
    // 1. HEAD, 1xx, 204, 304 have no body at all
    // 2. last transfer encoding chunked -> chunked
    // 3. Content-Length -> fixed
    // 4. otherwise read until the server closes
    use client::client::BodyKind::*;
    let mut connection = None::<Cow<str>>;
    let mut close = false;
    let mut scan_conn = |value: &'x [u8],
                         connection: &mut Option<Cow<'x, str>>,
                         close: &mut bool|
        -> Result<(), Error>
    {
        let strconn = from_utf8(value)
            .map_err(|_| Error::Header(httparse::Error::HeaderValue))?
            .trim();
        *connection = match connection.take() {
            Some(x) => Some(x + ", " + strconn),
            None => Some(strconn.into()),
        };
        if value.split(|&x| x == b',').any(headers::is_close) {
            *close = true;
        }
        Ok(())
    };
    if is_head || (code > 100 && code < 200) || code == 204 || code == 304
    {
        for header in headers.iter() {
            if header.name.eq_ignore_ascii_case("Connection") {
                scan_conn(header.value, &mut connection, &mut close)?;
            }
        }
        return Ok((Fixed(0), connection, close));
    }
    let mut has_content_length = false;
    let mut result = Eof;
    for header in headers.iter() {
        if header.name.eq_ignore_ascii_case("Transfer-Encoding") {
            if let Some(enc) = header.value.split(|&x| x == b',').last() {
                if headers::is_chunked(enc) {
                    if has_content_length {
                        // chunked wins, but don't trust keep-alive
                        close = true;
                    }
                    result = Chunked;
                }
            }
        } else if header.name.eq_ignore_ascii_case("Content-Length") {
            if has_content_length {
                return Err(Error::DuplicateContentLength);
            }
            has_content_length = true;
            if result != Chunked {
                let s = from_utf8(header.value)
                    .map_err(|_| Error::BadContentLength)?;
                let len = s.trim().parse()
                    .map_err(|_| Error::BadContentLength)?;
                result = Fixed(len);
            } else {
                close = true;
            }
        } else if header.name.eq_ignore_ascii_case("Connection") {
            scan_conn(header.value, &mut connection, &mut close)?;
        }
    }
    Ok((result, connection, close))
}

fn new_body(kind: BodyKind, mode: RecvMode)
    -> Result<BodyProgress, Error>
{
    use client::client::BodyKind as B;
    use client::client::RecvMode as M;
    use body_parser::BodyProgress as P;
    match (kind, mode) {
        (B::Fixed(x), M::Buffered(b)) if x > b as u64 => {
            Err(Error::ResponseBodyTooLong)
        }
        (B::Fixed(x), _) => Ok(P::Fixed(x as usize)),
        (B::Chunked, _) => Ok(P::Chunked(chunked::State::new())),
        (B::Eof, _) => Ok(P::Eof),
    }
}

fn parse_headers<S, C: Codec<S>>(
    buffer: &mut Buf, codec: &mut C, is_head: bool)
    -> Result<Option<(State, bool)>, Error>
{
    let (mode, body, close, bytes) = {
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let (ver, code, reason, headers, bytes) = {
            let mut raw = httparse::Response::new(&mut headers);
            let mut result = raw.parse(&buffer[..]);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                raw = httparse::Response::new(&mut vec);
                result = raw.parse(&buffer[..]);
            }
            match result? {
                httparse::Status::Complete(bytes) => {
                    let parsed: &[httparse::Header] = raw.headers;
                    (raw.version.unwrap(), raw.code.unwrap(),
                     raw.reason.unwrap(), parsed, bytes)
                }
                _ => return Ok(None),
            }
        };
        let (body, conn, close) = scan_headers(is_head, code, headers)?;
        let head = Head {
            version: if ver == 1 { Version::Http11 }
                     else { Version::Http10 },
            code: code,
            reason: reason,
            headers: headers,
            body_kind: body,
            connection_header: conn,
            // 1.0 servers that want keep-alive say it explicitly; we
            // don't look for it and just don't reuse the connection
            connection_close: close || ver == 0,
        };
        let mode = codec.headers_received(&head)?;
        (mode, body, close || ver == 0, bytes)
    };
    buffer.consume(bytes);
    Ok(Some((
        State::Body {
            mode: mode,
            progress: new_body(body, mode)?,
        },
        close,
    )))
}

impl<S, C: Codec<S>> Parser<S, C> {
    pub fn new(io: ReadBuf<S>, codec: C, is_head: bool) -> Parser<S, C> {
        Parser {
            io: Some(io),
            codec: codec,
            close: false,
            state: State::Headers { is_head: is_head },
        }
    }

    fn read_and_parse(&mut self) -> Poll<(), Error>
        where S: AsyncRead
    {
        use self::State::*;
        use client::client::RecvMode::*;
        let io = self.io.as_mut().expect("buffer still here");
        if let Headers { is_head } = self.state {
            loop {
                match parse_headers(&mut io.in_buf, &mut self.codec,
                                    is_head)?
                {
                    Some((body, close)) => {
                        if close {
                            self.close = true;
                        }
                        self.state = body;
                        break;
                    }
                    None => {
                        if io.read()? == 0 {
                            if io.done() {
                                return Err(Error::ResetOnResponseHeaders);
                            }
                            return Ok(Async::NotReady);
                        }
                    }
                }
            }
        }
        loop {
            match self.state {
                Headers {..} => unreachable!(),
                Body { ref mode, ref mut progress } => {
                    progress.parse(io)?;
                    let (bytes, done) = progress.check_buf(io);
                    let operation = if done {
                        Some(self.codec.data_received(
                            &io.in_buf[..bytes], true)?)
                    } else if io.done() {
                        // Eof bodies land in the `done` branch above, so
                        // this is always premature
                        return Err(Error::ResetOnResponseBody);
                    } else if matches!(*mode, Progressive(x) if x <= bytes)
                    {
                        Some(self.codec.data_received(
                            &io.in_buf[..bytes], false)?)
                    } else {
                        None
                    };
                    match operation {
                        Some(Async::Ready(consumed)) => {
                            progress.consume(io, consumed);
                            if done && consumed == bytes {
                                return Ok(Async::Ready(()));
                            }
                        }
                        Some(Async::NotReady) => {
                            if matches!(*mode, Progressive(x) if x > bytes)
                            {
                                return Ok(Async::NotReady);
                            }
                        }
                        None => {}
                    }
                }
            }
            if io.read()? == 0 {
                if io.done() {
                    continue;
                }
                return Ok(Async::NotReady);
            }
        }
    }
}

impl<S: AsyncRead, C: Codec<S>> Future for Parser<S, C> {
    type Item = Option<ReadBuf<S>>;
    type Error = Error;
    /// Yields `None` when the response asked to close the connection
    fn poll(&mut self) -> Poll<Option<ReadBuf<S>>, Error> {
        match self.read_and_parse()? {
            Async::Ready(()) => {
                let io = self.io.take().expect("buffer still here");
                if self.close {
                    Ok(Async::Ready(None))
                } else {
                    Ok(Async::Ready(Some(io)))
                }
            }
            Async::NotReady => Ok(Async::NotReady),
        }
    }
}
