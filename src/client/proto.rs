use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures::{Future, AsyncSink, Async, Sink, StartSend, Poll};
use tk_bufstream::{IoBuf, ReadBuf, WriteBuf};
use tokio_core::net::TcpStream;
use tokio_core::reactor::{Handle, Timeout};
use tokio_io::{AsyncRead, AsyncWrite};

use client::encoder::{self, get_inner};
use client::parser::Parser;
use client::{Codec, Config, Error};


enum State<S, C: Codec<S>> {
    /// Connection is free for the next request
    Idle { out: WriteBuf<S>, inp: ReadBuf<S>, since: Instant },
    /// The codec is writing the request
    Sending {
        fut: <C as Codec<S>>::Future,
        codec: C,
        inp: ReadBuf<S>,
    },
    /// Request flushed, reading the response
    Receiving { parser: Parser<S, C>, out: WriteBuf<S> },
    Void,
}

/// A low-level HTTP/1.x client protocol handler
///
/// The protocol is a `Sink` of request codecs, one in flight at a time:
/// `start_send` accepts a codec when the connection is idle, and
/// `poll_complete` returns ready once its response has been fully
/// consumed. Connection reuse and reconnects belong to `pool` on top of
/// this.
pub struct Proto<S, C: Codec<S>> {
    state: State<S, C>,
    config: Arc<Config>,
    handle: Handle,
    deadline: Option<Timeout>,
}

impl<S, C: Codec<S>> Proto<S, C> {
    /// Wrap a connected transport
    pub fn new(conn: S, handle: &Handle, cfg: &Arc<Config>) -> Proto<S, C>
        where S: AsyncRead + AsyncWrite
    {
        let (cout, cin) = IoBuf::new(conn).split();
        Proto {
            state: State::Idle {
                out: cout,
                inp: cin,
                since: Instant::now(),
            },
            config: cfg.clone(),
            handle: handle.clone(),
            deadline: None,
        }
    }

    /// True when no request is in flight
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle { .. })
    }

    /// How long the connection has been sitting idle
    pub fn idle_for(&self) -> Option<::std::time::Duration> {
        match self.state {
            State::Idle { since, .. } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn check_deadline(&mut self) -> Result<(), Error> {
        if let Some(ref mut timeout) = self.deadline {
            match timeout.poll().expect("timeout never errors") {
                Async::Ready(()) => return Err(Error::TimedOut),
                Async::NotReady => {}
            }
        }
        Ok(())
    }
}

impl<C: Codec<TcpStream>> Proto<TcpStream, C> {
    /// Establish a connection and wrap it, in one future
    pub fn connect_tcp(addr: SocketAddr, cfg: &Arc<Config>,
        handle: &Handle)
        -> Box<Future<Item=Self, Error=Error>>
    {
        let cfg = cfg.clone();
        let handle = handle.clone();
        Box::new(
            TcpStream::connect(&addr, &handle)
            .map(move |c| Proto::new(c, &handle, &cfg))
            .map_err(Error::Io))
            as Box<Future<Item=_, Error=_>>
    }
}

impl<S: AsyncRead + AsyncWrite, C: Codec<S>> Sink for Proto<S, C> {
    type SinkItem = C;
    type SinkError = Error;

    fn start_send(&mut self, item: C) -> StartSend<C, Error> {
        match mem::replace(&mut self.state, State::Void) {
            State::Idle { out, inp, since } => {
                if since.elapsed() > self.config.keep_alive_timeout {
                    // too risky: the server may be closing it right now
                    self.state = State::Idle {
                        out: out, inp: inp, since: since,
                    };
                    return Err(Error::Closed);
                }
                let mut codec = item;
                let fut = codec.start_write(encoder::new(out));
                self.state = State::Sending {
                    fut: fut,
                    codec: codec,
                    inp: inp,
                };
                self.deadline = Some(
                    Timeout::new(self.config.max_request_timeout,
                                 &self.handle)
                    .expect("can always set a timeout"));
                Ok(AsyncSink::Ready)
            }
            other => {
                self.state = other;
                Ok(AsyncSink::NotReady(item))
            }
        }
    }

    fn poll_complete(&mut self) -> Poll<(), Error> {
        loop {
            match mem::replace(&mut self.state, State::Void) {
                State::Idle { mut out, mut inp, since } => {
                    out.flush()?;
                    // reading here serves two purposes: notice a closed
                    // connection, and catch bytes nobody asked for
                    let bytes = inp.read()?;
                    let eof = inp.done();
                    self.state = State::Idle {
                        out: out, inp: inp, since: since,
                    };
                    if bytes != 0 {
                        return Err(Error::PrematureResponseHeaders);
                    }
                    if eof {
                        return Err(Error::Closed);
                    }
                    return Ok(Async::Ready(()));
                }
                State::Sending { mut fut, codec, inp } => {
                    match fut.poll()? {
                        Async::Ready(done) => {
                            let is_head = done.is_head();
                            let mut out = get_inner(done);
                            out.flush()?;
                            self.state = State::Receiving {
                                parser: Parser::new(inp, codec, is_head),
                                out: out,
                            };
                            continue;
                        }
                        Async::NotReady => {
                            self.state = State::Sending {
                                fut: fut, codec: codec, inp: inp,
                            };
                            self.check_deadline()?;
                            return Ok(Async::NotReady);
                        }
                    }
                }
                State::Receiving { mut parser, mut out } => {
                    // keep pushing buffered request bytes out while the
                    // response trickles in
                    out.flush()?;
                    match parser.poll()? {
                        Async::Ready(Some(inp)) => {
                            self.deadline = None;
                            self.state = State::Idle {
                                out: out,
                                inp: inp,
                                since: Instant::now(),
                            };
                            continue;
                        }
                        Async::Ready(None) => {
                            // response delivered, connection not
                            // reusable; the pool retires us on this
                            return Err(Error::Closed);
                        }
                        Async::NotReady => {
                            self.state = State::Receiving {
                                parser: parser, out: out,
                            };
                            self.check_deadline()?;
                            return Ok(Async::NotReady);
                        }
                    }
                }
                State::Void => unreachable!(),
            }
        }
    }
}
