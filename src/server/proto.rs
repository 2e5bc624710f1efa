use std::cmp::min;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use futures::{Future, Async, Poll};
use tk_bufstream::{IoBuf, ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};
use tokio_core::reactor::{Handle, Timeout};

use enums::Version;
use server::codec::BodyKind;
use server::encoder::{self, ResponseConfig};
use server::error_page::error_page;
use server::headers::{parse_headers, RequestInfo};
use server::recv_mode::{Mode, get_mode};
use server::{Codec, Config, Dispatcher, Error};


enum State<S, C: Codec<S>> {
    /// Waiting for (more of) a request head
    Headers { got_data: bool },
    /// Reading a fixed-size request body
    Body { codec: C, info: RequestInfo, mode: Mode, left: usize },
    /// The response future owns the write half
    Responding {
        codec: C,
        fut: <C as Codec<S>>::ResponseFuture,
        close: bool,
        upgrade: bool,
    },
    /// Last bytes are queued; flush and shut down
    Closing,
    Void,
}

/// A low-level HTTP/1.x server protocol handler
///
/// One instance drives one accepted connection, strictly one request at
/// a time: read head, read body, write response, repeat or close. Bytes
/// of a pipelined next request simply wait in the input buffer, which
/// keeps responses in arrival order and the connection at one
/// outstanding read plus one outstanding write.
pub struct Proto<S, D: Dispatcher<S>> {
    dispatcher: D,
    io_read: Option<ReadBuf<S>>,
    io_write: Option<WriteBuf<S>>,
    state: State<S, D::Codec>,
    config: Arc<Config>,
    handle: Handle,
    timeout: Timeout,
}

impl<S, D: Dispatcher<S>> Proto<S, D> {
    /// Create a protocol instance over a connected transport
    pub fn new(conn: S, cfg: &Arc<Config>, dispatcher: D, handle: &Handle)
        -> Proto<S, D>
        where S: AsyncRead + AsyncWrite
    {
        let (cout, cin) = IoBuf::new(conn).split();
        Proto {
            dispatcher: dispatcher,
            io_read: Some(cin),
            io_write: Some(cout),
            state: State::Headers { got_data: false },
            config: cfg.clone(),
            handle: handle.clone(),
            timeout: Timeout::new(cfg.keep_alive_timeout, handle)
                .expect("can always set a timeout"),
        }
    }

    fn set_timeout(&mut self, dur: Duration) {
        self.timeout = Timeout::new(dur, &self.handle)
            .expect("can always set a timeout");
    }

    /// Poll the armed deadline; called on every not-ready exit
    fn check_timeout(&mut self) -> Poll<(), Error> {
        match self.timeout.poll().expect("timeout never errors") {
            Async::Ready(()) => {
                match self.state {
                    // an idle keep-alive connection just goes away
                    State::Headers { got_data: false } => {
                        Ok(Async::Ready(()))
                    }
                    _ => Err(Error::Timeout),
                }
            }
            Async::NotReady => Ok(Async::NotReady),
        }
    }

    fn flush_output(&mut self) -> Result<(), Error>
        where S: AsyncRead + AsyncWrite
    {
        if let Some(ref mut io) = self.io_write {
            io.flush().map_err(Error::Io)?;
        }
        Ok(())
    }

    fn response_state(&mut self, mut codec: D::Codec, info: RequestInfo,
        upgrade: bool)
        -> State<S, D::Codec>
    {
        let cfg = ResponseConfig {
            is_head: info.is_head,
            do_close: info.close,
            version: info.version,
        };
        let io = self.io_write.take().expect("write half is present");
        let fut = codec.start_response(encoder::new(io, cfg));
        self.set_timeout(self.config.output_body_timeout);
        State::Responding {
            codec: codec,
            fut: fut,
            close: info.close,
            upgrade: upgrade,
        }
    }

    fn internal_poll(&mut self) -> Poll<(), Error>
        where S: AsyncRead + AsyncWrite
    {
        loop {
            self.flush_output()?;
            match mem::replace(&mut self.state, State::Void) {
                State::Headers { mut got_data } => {
                    let parsed = parse_headers::<S, D>(
                        &mut self.io_read.as_mut()
                            .expect("read half is present").in_buf,
                        &mut self.dispatcher)?;
                    match parsed {
                        Some((mut codec, info, head_bytes)) => {
                            if info.body_kind == BodyKind::Chunked {
                                // only chunked *writing* is implemented
                                return Err(Error::ChunkedRequest);
                            }
                            let mode = get_mode(&codec.recv_mode());
                            let len = match info.body_kind {
                                BodyKind::Fixed(len) => len,
                                BodyKind::Chunked => unreachable!(),
                            };
                            if head_bytes as u64 + len >
                                self.config.max_request_length as u64
                            {
                                return Err(Error::RequestTooLong);
                            }
                            match mode {
                                Mode::Hijack => {
                                    if len != 0 {
                                        return Err(Error::custom(
                                            "upgrade request with a body"));
                                    }
                                    self.state = self.response_state(
                                        codec, info, true);
                                }
                                Mode::BufferedUpfront(limit) => {
                                    if len > limit as u64 {
                                        return Err(Error::RequestTooLong);
                                    }
                                    self.set_timeout(
                                        self.config.input_body_timeout);
                                    self.state = State::Body {
                                        codec: codec,
                                        info: info,
                                        mode: mode,
                                        left: len as usize,
                                    };
                                }
                                Mode::Progressive(..) => {
                                    self.set_timeout(
                                        self.config.input_body_timeout);
                                    self.state = State::Body {
                                        codec: codec,
                                        info: info,
                                        mode: mode,
                                        left: len as usize,
                                    };
                                }
                            }
                            continue;
                        }
                        None => {
                            let read = {
                                let io = self.io_read.as_mut()
                                    .expect("read half is present");
                                if io.in_buf.len() >
                                    self.config.max_request_length
                                {
                                    return Err(Error::RequestTooLong);
                                }
                                if !got_data && io.in_buf.len() > 0 {
                                    got_data = true;
                                    // pipelined bytes count as a start
                                }
                                io.read().map_err(Error::Io)?
                            };
                            if read == 0 {
                                let eof = {
                                    let io = self.io_read.as_mut()
                                        .expect("read half is present");
                                    io.done()
                                };
                                if eof {
                                    if !got_data {
                                        // clean close between requests
                                        return Ok(Async::Ready(()));
                                    }
                                    return Err(Error::ConnectionReset);
                                }
                                self.state =
                                    State::Headers { got_data: got_data };
                                return self.check_timeout();
                            }
                            if !got_data {
                                self.set_timeout(
                                    self.config.headers_timeout);
                            }
                            self.state = State::Headers { got_data: true };
                            continue;
                        }
                    }
                }
                State::Body { mut codec, info, mode, mut left } => {
                    let complete = loop {
                        let action = {
                            let io = self.io_read.as_mut()
                                .expect("read half is present");
                            let available = min(io.in_buf.len(), left);
                            let end = io.in_buf.len() >= left;
                            let call = match mode {
                                Mode::BufferedUpfront(..) => end,
                                Mode::Progressive(hint) =>
                                    end || available >= hint,
                                Mode::Hijack => unreachable!(),
                            };
                            if call {
                                let res = codec.data_received(
                                    &io.in_buf[..available], end)?;
                                match res {
                                    Async::Ready(consumed) => {
                                        assert!(consumed <= available,
                                            "codec consumed more bytes \
                                             than it was given");
                                        io.in_buf.consume(consumed);
                                        left -= consumed;
                                        Some(consumed)
                                    }
                                    Async::NotReady => None,
                                }
                            } else {
                                Some(0)
                            }
                        };
                        match action {
                            None => {
                                // the codec arranged its own wakeup
                                self.state = State::Body {
                                    codec: codec, info: info,
                                    mode: mode, left: left,
                                };
                                return self.check_timeout();
                            }
                            Some(_) if left == 0 => break true,
                            Some(consumed) if consumed > 0 => continue,
                            Some(_) => {}
                        }
                        // need more input
                        let read = {
                            let io = self.io_read.as_mut()
                                .expect("read half is present");
                            io.read().map_err(Error::Io)?
                        };
                        if read == 0 {
                            let eof = self.io_read.as_mut()
                                .expect("read half is present").done();
                            if eof {
                                return Err(Error::ConnectionReset);
                            }
                            self.state = State::Body {
                                codec: codec, info: info,
                                mode: mode, left: left,
                            };
                            return self.check_timeout();
                        }
                    };
                    debug_assert!(complete);
                    self.state = self.response_state(codec, info, false);
                    continue;
                }
                State::Responding { mut codec, mut fut, close, upgrade }
                => {
                    match fut.poll()? {
                        Async::Ready(done) => {
                            self.io_write = Some(encoder::get_inner(done));
                            if upgrade {
                                self.flush_output()?;
                                let w = self.io_write.take().unwrap();
                                let r = self.io_read.take().unwrap();
                                codec.hijack(w, r);
                                return Ok(Async::Ready(()));
                            }
                            if close {
                                self.set_timeout(
                                    self.config.output_body_timeout);
                                self.state = State::Closing;
                            } else {
                                self.set_timeout(
                                    self.config.keep_alive_timeout);
                                self.state =
                                    State::Headers { got_data: false };
                            }
                            continue;
                        }
                        Async::NotReady => {
                            self.state = State::Responding {
                                codec: codec, fut: fut,
                                close: close, upgrade: upgrade,
                            };
                            return self.check_timeout();
                        }
                    }
                }
                State::Closing => {
                    let flushed = {
                        let io = self.io_write.as_mut()
                            .expect("write half is present");
                        io.out_buf.len() == 0
                    };
                    if flushed {
                        return Ok(Async::Ready(()));
                    }
                    self.state = State::Closing;
                    return self.check_timeout();
                }
                State::Void => unreachable!(),
            }
        }
    }
}

impl<S, D> Future for Proto<S, D>
    where S: AsyncRead + AsyncWrite,
          D: Dispatcher<S>,
{
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<(), Error> {
        match self.internal_poll() {
            Ok(x) => Ok(x),
            Err(e) => {
                let status = match e.status() {
                    Some(status) => status,
                    // transport errors tear the connection down silently
                    None => return Err(e),
                };
                if self.io_write.is_none() {
                    // a response is already underway, too late for a page
                    return Err(e);
                }
                debug!("Request error: {}", e);
                let io = self.io_write.take().unwrap();
                let cfg = ResponseConfig {
                    is_head: false,
                    do_close: true,
                    version: Version::Http11,
                };
                let done = error_page(status, &format!("{}", e),
                    encoder::new(io, cfg));
                self.io_write = Some(encoder::get_inner(done));
                self.state = State::Closing;
                let timeout = self.config.output_body_timeout;
                self.set_timeout(timeout);
                self.internal_poll()
            }
        }
    }
}
