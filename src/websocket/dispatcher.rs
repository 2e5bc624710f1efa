use std::cmp::min;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::{Future, Async, Stream};
use tk_bufstream::{ReadFramed, WriteFramed, ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};
use tokio_core::reactor::{Handle, Timeout};

use websocket::{Frame, Config, Packet, Error, ServerCodec, ClientCodec};
use websocket::codec::encode_packet;
use websocket::error::ErrorEnum;
use websocket::utf8;
use websocket::zero_copy::{self, parse_frame, write_packet, write_close};


/// Handler of incoming websocket messages
pub trait Dispatcher {
    /// Future returned from `frame()`
    type Future: Future<Item=(), Error=Error>;
    /// A complete message was received
    ///
    /// Fragmented messages are reassembled before this is called. To
    /// apply backpressure return a future that isn't immediately ready;
    /// no further input is processed until it resolves.
    fn frame(&mut self, frame: &Frame) -> Self::Future;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Open,
    CloseSent,
    Done,
}

/// The driver of an established websocket connection
///
/// This future polls both the socket (dispatching every received message)
/// and a stream of outgoing packets. It also answers pings, mirrors the
/// closing handshake, pings idle peers and enforces the inactivity
/// timeouts of the config.
pub struct Loop<S, T, D: Dispatcher> {
    config: Arc<Config>,
    input: ReadBuf<S>,
    output: WriteBuf<S>,
    stream: Option<T>,
    dispatcher: D,
    backpressure: Option<D::Future>,
    partial: Option<(bool, Vec<u8>)>,
    state: LoopState,
    server: bool,
    handle: Handle,
    last_message_received: Instant,
    last_ping: Instant,
    last_byte: Instant,
    timeout: Timeout,
}

fn truncated(reason: &str) -> &str {
    // close payload allows 123 bytes of reason, cut at a char boundary
    let mut n = min(reason.len(), 123);
    while !reason.is_char_boundary(n) {
        n -= 1;
    }
    &reason[..n]
}

impl<S, T, D, E> Loop<S, T, D>
    where T: Stream<Item=Packet, Error=E>,
          D: Dispatcher,
{
    fn new(output: WriteBuf<S>, input: ReadBuf<S>,
        stream: T, dispatcher: D, config: &Arc<Config>,
        handle: &Handle, server: bool)
        -> Loop<S, T, D>
    {
        Loop {
            config: config.clone(),
            input: input,
            output: output,
            stream: Some(stream),
            dispatcher: dispatcher,
            backpressure: None,
            partial: None,
            state: LoopState::Open,
            server: server,
            handle: handle.clone(),
            last_message_received: Instant::now(),
            last_ping: Instant::now(),
            last_byte: Instant::now(),
            // the loop is polled right after creation, so is the timeout
            timeout: Timeout::new(
                min(config.byte_timeout,
                    min(config.ping_interval, config.message_timeout)),
                handle)
                .expect("can always set a timeout"),
        }
    }
    /// Server side of a connection, call from `Codec::hijack`
    pub fn server(
        output: WriteFramed<S, ServerCodec>,
        input: ReadFramed<S, ServerCodec>,
        stream: T, dispatcher: D, config: &Arc<Config>, handle: &Handle)
        -> Loop<S, T, D>
    {
        Loop::new(output.into_inner(), input.into_inner(),
            stream, dispatcher, config, handle, true)
    }
    /// Client side of a connection, call after `HandshakeProto` resolves
    pub fn client(
        output: WriteFramed<S, ClientCodec>,
        input: ReadFramed<S, ClientCodec>,
        stream: T, dispatcher: D, config: &Arc<Config>, handle: &Handle)
        -> Loop<S, T, D>
    {
        Loop::new(output.into_inner(), input.into_inner(),
            stream, dispatcher, config, handle, false)
    }
}

impl<S, T, D, E> Loop<S, T, D>
    where T: Stream<Item=Packet, Error=E>,
          D: Dispatcher,
          E: fmt::Display,
          S: AsyncRead + AsyncWrite,
{
    fn read_stream(&mut self) {
        if self.state != LoopState::Open {
            return;
        }
        // output packets are buffered unconditionally, the only
        // backpressure on the stream is the flush in poll()
        let mut done = false;
        if let Some(ref mut stream) = self.stream {
            loop {
                match stream.poll() {
                    Ok(Async::Ready(Some(pkt))) => {
                        let close = matches!(pkt, Packet::Close(..));
                        encode_packet(pkt, &mut self.output.out_buf,
                            !self.server);
                        if close {
                            self.state = LoopState::CloseSent;
                            done = true;
                            break;
                        }
                    }
                    Ok(Async::Ready(None)) => {
                        // closing our side starts the close handshake
                        write_close(&mut self.output.out_buf,
                            1000, "", !self.server);
                        self.state = LoopState::CloseSent;
                        done = true;
                        break;
                    }
                    Ok(Async::NotReady) => return,
                    Err(e) => {
                        error!("websocket output stream error: {}", e);
                        done = true;
                        break;
                    }
                }
            }
        }
        if done {
            self.stream = None;
        }
    }

    /// Returns the number of complete messages read
    fn read_messages(&mut self) -> Result<usize, Error> {
        if let Some(mut back) = self.backpressure.take() {
            match back.poll()? {
                Async::Ready(()) => {}
                Async::NotReady => {
                    self.backpressure = Some(back);
                    return Ok(0);
                }
            }
        }

        let mut nmessages = 0;
        loop {
            while self.input.in_buf.len() > 0 {
                let parsed = parse_frame(&mut self.input.in_buf,
                    self.config.max_packet_size, self.server)
                    .map_err(Error::from)?;
                let (fut, nbytes) = match parsed {
                    Some((frame, nbytes)) => {
                        nmessages += 1;
                        let fut = match frame {
                            Frame::Ping(data) => {
                                trace!("Received ping {:?}", data);
                                write_packet(&mut self.output.out_buf,
                                    zero_copy::PONG, data, !self.server);
                                None
                            }
                            Frame::Pong(data) => {
                                trace!("Received pong {:?}", data);
                                None
                            }
                            Frame::Close(code, reason) => {
                                debug!("Websocket closed by peer [{:?}] \
                                    {:?}", code, reason);
                                if self.state == LoopState::Open {
                                    write_close(&mut self.output.out_buf,
                                        code.unwrap_or(1000),
                                        truncated(reason),
                                        !self.server);
                                }
                                self.state = LoopState::Done;
                                Some(self.dispatcher.frame(
                                    &Frame::Close(code, reason)))
                            }
                            Frame::FragmentStart { binary, data } => {
                                if self.partial.is_some() {
                                    return Err(
                                        ErrorEnum::BadContinuation.into());
                                }
                                self.partial =
                                    Some((binary, data.to_vec()));
                                None
                            }
                            Frame::Fragment { fin, data } => {
                                let (binary, mut message) =
                                    self.partial.take()
                                    .ok_or(ErrorEnum::BadContinuation)?;
                                if message.len() + data.len() >
                                    self.config.max_packet_size
                                {
                                    return Err(ErrorEnum::TooLong.into());
                                }
                                message.extend_from_slice(data);
                                if !fin {
                                    self.partial = Some((binary, message));
                                    None
                                } else {
                                    let frame = if binary {
                                        Frame::Binary(&message)
                                    } else {
                                        Frame::Text(
                                            utf8::as_str(&message)
                                            .ok_or(ErrorEnum::InvalidUtf8)?)
                                    };
                                    Some(self.dispatcher.frame(&frame))
                                }
                            }
                            ref frame @ Frame::Text(_) |
                            ref frame @ Frame::Binary(_) => {
                                if self.partial.is_some() {
                                    return Err(
                                        ErrorEnum::BadContinuation.into());
                                }
                                Some(self.dispatcher.frame(frame))
                            }
                        };
                        (fut, nbytes)
                    }
                    None => break,
                };
                self.input.in_buf.consume(nbytes);
                if self.state == LoopState::Done {
                    return Ok(nmessages);
                }
                if let Some(mut fut) = fut {
                    match fut.poll()? {
                        Async::Ready(()) => {}
                        Async::NotReady => {
                            self.backpressure = Some(fut);
                            return Ok(nmessages);
                        }
                    }
                }
            }
            match self.input.read().map_err(ErrorEnum::Io)? {
                0 => {
                    if self.input.done() {
                        self.state = LoopState::Done;
                    }
                    return Ok(nmessages);
                }
                _ => {
                    self.last_byte = Instant::now();
                    continue;
                }
            }
        }
    }

    fn next_deadline(&self) -> Instant {
        min(self.last_message_received + self.config.message_timeout,
        min(self.last_ping + self.config.ping_interval,
            self.last_byte + self.config.byte_timeout))
    }
}

impl<S, T, D, E> Future for Loop<S, T, D>
    where T: Stream<Item=Packet, Error=E>,
          D: Dispatcher,
          E: fmt::Display,
          S: AsyncRead + AsyncWrite,
{
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Result<Async<()>, Error> {
        self.read_stream();
        let old_len = self.output.out_buf.len();
        self.output.flush().map_err(ErrorEnum::Io)?;
        if self.output.out_buf.len() < old_len {
            self.last_byte = Instant::now();
        }
        if self.state == LoopState::Done {
            return Ok(Async::Ready(()));
        }
        if self.read_messages()? > 0 {
            self.last_message_received = Instant::now();
            self.timeout = Timeout::new_at(self.next_deadline(),
                &self.handle).expect("can always set a timeout");
        }
        if self.state == LoopState::Done {
            // the mirrored close is still in the buffer
            self.output.flush().map_err(ErrorEnum::Io)?;
            return Ok(Async::Ready(()));
        }
        loop {
            match self.timeout.poll().map_err(|_| ErrorEnum::Timeout)? {
                Async::Ready(()) => {
                    let deadline = min(
                        self.last_message_received +
                            self.config.message_timeout,
                        self.last_byte + self.config.byte_timeout);
                    if Instant::now() > deadline {
                        self.state = LoopState::Done;
                        return Ok(Async::Ready(()));
                    } else if Instant::now() >
                        self.last_ping + self.config.ping_interval
                    {
                        debug!("Sending ping");
                        let old_len = self.output.out_buf.len();
                        write_packet(&mut self.output.out_buf,
                            zero_copy::PING, b"tk-relay-ping", !self.server);
                        self.output.flush().map_err(ErrorEnum::Io)?;
                        // only bump the clock if more than the ping left
                        if old_len > 0 && self.output.out_buf.len() < old_len
                        {
                            self.last_byte = Instant::now();
                        }
                        self.last_ping = Instant::now();
                    }

                    self.timeout = Timeout::new_at(self.next_deadline(),
                        &self.handle).expect("can always set a timeout");
                    match self.timeout.poll()
                        .map_err(|_| ErrorEnum::Timeout)?
                    {
                        Async::NotReady => break,
                        Async::Ready(()) => continue,
                    }
                }
                Async::NotReady => break,
            }
        }
        if self.state == LoopState::Done {
            return Ok(Async::Ready(()));
        }
        Ok(Async::NotReady)
    }
}
