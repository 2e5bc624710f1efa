//! Per-host connection pools with idle collection and alive detection
//!
//! A pool is keyed by one `host:port` and lives on one reactor, like the
//! connections it holds. Idle clients sit in a bounded free queue (the
//! overflow goes to a short-lived spillover queue); a lazily spawned
//! collector sweeps each queue in two generations, so the observed idle
//! time of an evicted client stays within [ttl, 2·ttl]. When connecting
//! fails repeatedly the pool marks itself dead and a background probe
//! keeps trying until the host answers again.

mod config;
mod queue;

use std::cell::RefCell;
use std::io;
use std::mem;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::sink::Send as SinkSend;
use futures::{Future, Async, Poll, Sink};
use rand::{thread_rng, Rng};
use tokio_core::net::TcpStream;
use tokio_core::reactor::{Handle, Timeout};

use client::{self, Buffered, Error, Proto};
use self::queue::Generations;


type Client = Proto<TcpStream, Buffered>;

/// Fine-grained configuration of a host pool
#[derive(Debug, Clone)]
pub struct Config {
    max_connection: usize,
    connect_retry_count: u32,
    reconnect_wait_time: Duration,
    idle_timeout: Duration,
    short_connect_idle_timeout: Duration,
    alive_detect_interval: Duration,
    client_config: Arc<client::Config>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Which {
    Free,
    Spill,
}

struct Inner {
    host: String,
    addr: SocketAddr,
    free: Generations<Client>,
    spill: Generations<Client>,
    alive: bool,
    collector_running: [bool; 2],
    detector_running: bool,
    config: Arc<Config>,
    handle: Handle,
}

/// A pool of keep-alive clients for one host
///
/// Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct Pool {
    inner: Rc<RefCell<Inner>>,
}

/// Multiply a duration by a random factor in [1.0, 1.2]
///
/// Spreads the retries of many pools so they don't hammer a recovering
/// host in lockstep.
fn jittered(dur: Duration) -> Duration {
    let ms = dur.as_secs() * 1000 +
        (dur.subsec_nanos() / 1_000_000) as u64;
    let ms = (ms as f64 * thread_rng().gen_range(1.0, 1.2)) as u64;
    Duration::from_millis(ms)
}

fn connect(addr: SocketAddr, cfg: &Arc<Config>, handle: &Handle)
    -> Box<Future<Item=Client, Error=Error>>
{
    Proto::connect_tcp(addr, &cfg.client_config, handle)
}

impl Inner {
    fn queue(&mut self, which: Which) -> &mut Generations<Client> {
        match which {
            Which::Free => &mut self.free,
            Which::Spill => &mut self.spill,
        }
    }
    fn ttl(&self, which: Which) -> Duration {
        match which {
            Which::Free => self.config.idle_timeout,
            Which::Spill => self.config.short_connect_idle_timeout,
        }
    }
}

impl Pool {
    /// Create a pool for a `host:port`
    ///
    /// The address is resolved once, right here; the pool then connects
    /// to it for its whole lifetime.
    pub fn create(host: &str, config: &Arc<Config>, handle: &Handle)
        -> Result<Pool, io::Error>
    {
        let addr = host.to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound,
                "host resolved to no addresses"))?;
        Ok(Pool {
            inner: Rc::new(RefCell::new(Inner {
                host: host.to_string(),
                addr: addr,
                free: Generations::new(),
                spill: Generations::new(),
                alive: true,
                collector_running: [false, false],
                detector_running: false,
                config: config.clone(),
                handle: handle.clone(),
            })),
        })
    }

    /// The `host:port` this pool connects to
    pub fn host(&self) -> String {
        self.inner.borrow().host.clone()
    }

    /// False while the host refuses connections and the background
    /// probe hasn't gotten through yet
    pub fn is_alive(&self) -> bool {
        self.inner.borrow().alive
    }

    /// Number of idle clients currently pooled (both queues)
    pub fn free_clients(&self) -> usize {
        let inner = self.inner.borrow();
        inner.free.len() + inner.spill.len()
    }

    /// Run one request-response exchange over a pooled client
    ///
    /// The response itself arrives through the codec's channel; the
    /// returned future resolves when the exchange is over and the
    /// client is back in a queue (or discarded on failure).
    pub fn request(&self, codec: Buffered) -> SendRequest {
        SendRequest {
            pool: self.inner.clone(),
            state: SendState::Checkout { codec: Some(codec) },
        }
    }
}

fn checkout(inner: &Rc<RefCell<Inner>>) -> Option<Client> {
    let mut guard = inner.borrow_mut();
    let stale_after = guard.config.idle_timeout;
    for &which in &[Which::Free, Which::Spill] {
        while let Some(client) = guard.queue(which).pop() {
            match client.idle_for() {
                // a client idle too long is about to be closed by the
                // server, don't race it
                Some(idle) if idle < stale_after => return Some(client),
                _ => {
                    trace!("Dropping stale pooled client for {}",
                        guard.host);
                }
            }
        }
    }
    None
}

/// Put a client back; overflow beyond `max_connection` goes to the
/// short-lived queue
fn collect(inner: &Rc<RefCell<Inner>>, client: Client) {
    let which = {
        let mut guard = inner.borrow_mut();
        let which = if guard.free.len() < guard.config.max_connection {
            Which::Free
        } else {
            Which::Spill
        };
        guard.queue(which).push(client);
        guard.alive = true;
        which
    };
    ensure_collector(inner, which);
}

fn ensure_collector(inner: &Rc<RefCell<Inner>>, which: Which) {
    let spawn = {
        let mut guard = inner.borrow_mut();
        let idx = which as usize;
        if guard.collector_running[idx] || guard.queue(which).is_empty() {
            None
        } else {
            guard.collector_running[idx] = true;
            guard.queue(which).reselect();
            let ttl = guard.ttl(which);
            let timeout = Timeout::new(ttl, &guard.handle)
                .expect("can always set a timeout");
            Some((guard.handle.clone(), timeout))
        }
    };
    if let Some((handle, timeout)) = spawn {
        trace!("Starting idle collector");
        handle.spawn(Collector {
            pool: Rc::downgrade(inner),
            which: which,
            timeout: timeout,
        });
    }
}

struct Collector {
    pool: Weak<RefCell<Inner>>,
    which: Which,
    timeout: Timeout,
}

impl Future for Collector {
    type Item = ();
    type Error = ();
    fn poll(&mut self) -> Poll<(), ()> {
        loop {
            match self.timeout.poll().expect("timeout never errors") {
                Async::NotReady => return Ok(Async::NotReady),
                Async::Ready(()) => {}
            }
            let inner = match self.pool.upgrade() {
                Some(inner) => inner,
                None => return Ok(Async::Ready(())),
            };
            let mut guard = inner.borrow_mut();
            let evicted = guard.queue(self.which).clear_old();
            if evicted > 0 {
                trace!("Evicted {} idle clients of pool {}",
                    evicted, guard.host);
            }
            if guard.queue(self.which).is_empty() {
                guard.collector_running[self.which as usize] = false;
                return Ok(Async::Ready(()));
            }
            guard.queue(self.which).reselect();
            let ttl = guard.ttl(self.which);
            self.timeout = Timeout::new(ttl, &guard.handle)
                .expect("can always set a timeout");
        }
    }
}

fn start_alive_detector(inner: &Rc<RefCell<Inner>>) {
    let spawn = {
        let mut guard = inner.borrow_mut();
        if guard.detector_running {
            None
        } else {
            guard.detector_running = true;
            let fut = connect(guard.addr, &guard.config, &guard.handle);
            Some((guard.handle.clone(), fut))
        }
    };
    if let Some((handle, fut)) = spawn {
        debug!("Host is down, starting alive detector");
        handle.spawn(AliveDetector {
            pool: Rc::downgrade(inner),
            state: DetectorState::Connecting(fut),
        });
    }
}

enum DetectorState {
    Connecting(Box<Future<Item=Client, Error=Error>>),
    Waiting(Timeout),
}

struct AliveDetector {
    pool: Weak<RefCell<Inner>>,
    state: DetectorState,
}

impl Future for AliveDetector {
    type Item = ();
    type Error = ();
    fn poll(&mut self) -> Poll<(), ()> {
        loop {
            let inner = match self.pool.upgrade() {
                Some(inner) => inner,
                None => return Ok(Async::Ready(())),
            };
            match self.state {
                DetectorState::Connecting(ref mut fut) => {
                    match fut.poll() {
                        Ok(Async::NotReady) => return Ok(Async::NotReady),
                        Ok(Async::Ready(client)) => {
                            // the survivor seeds the free queue
                            inner.borrow_mut().detector_running = false;
                            collect(&inner, client);
                            debug!("Host is back up");
                            return Ok(Async::Ready(()));
                        }
                        Err(_) => {
                            let (interval, handle) = {
                                let guard = inner.borrow();
                                (guard.config.alive_detect_interval,
                                 guard.handle.clone())
                            };
                            let timeout = Timeout::new(
                                jittered(interval), &handle)
                                .expect("can always set a timeout");
                            self.state = DetectorState::Waiting(timeout);
                        }
                    }
                }
                DetectorState::Waiting(ref mut timeout) => {
                    match timeout.poll().expect("timeout never errors") {
                        Async::NotReady => return Ok(Async::NotReady),
                        Async::Ready(()) => {
                            let guard = inner.borrow();
                            let fut = connect(guard.addr, &guard.config,
                                &guard.handle);
                            drop(guard);
                            self.state =
                                DetectorState::Connecting(fut);
                        }
                    }
                }
            }
        }
    }
}

enum SendState {
    Checkout { codec: Option<Buffered> },
    Connecting {
        fut: Box<Future<Item=Client, Error=Error>>,
        codec: Option<Buffered>,
        attempt: u32,
        attempt_start: Instant,
    },
    Backoff {
        timeout: Timeout,
        codec: Option<Buffered>,
        attempt: u32,
    },
    Dispatching(SinkSend<Client>),
    Done,
}

/// Future returned from `Pool::request`
pub struct SendRequest {
    pool: Rc<RefCell<Inner>>,
    state: SendState,
}

impl Future for SendRequest {
    type Item = ();
    type Error = Error;
    fn poll(&mut self) -> Poll<(), Error> {
        loop {
            match mem::replace(&mut self.state, SendState::Done) {
                SendState::Checkout { mut codec } => {
                    if let Some(client) = checkout(&self.pool) {
                        let codec = codec.take()
                            .expect("codec not sent yet");
                        self.state =
                            SendState::Dispatching(client.send(codec));
                        continue;
                    }
                    let fut = {
                        let guard = self.pool.borrow();
                        connect(guard.addr, &guard.config, &guard.handle)
                    };
                    self.state = SendState::Connecting {
                        fut: fut,
                        codec: codec,
                        attempt: 0,
                        attempt_start: Instant::now(),
                    };
                    continue;
                }
                SendState::Connecting {
                    mut fut, mut codec, attempt, attempt_start }
                => {
                    match fut.poll() {
                        Ok(Async::NotReady) => {
                            self.state = SendState::Connecting {
                                fut: fut, codec: codec,
                                attempt: attempt,
                                attempt_start: attempt_start,
                            };
                            return Ok(Async::NotReady);
                        }
                        Ok(Async::Ready(client)) => {
                            self.pool.borrow_mut().alive = true;
                            let codec = codec.take()
                                .expect("codec not sent yet");
                            self.state = SendState::Dispatching(
                                client.send(codec));
                            continue;
                        }
                        Err(e) => {
                            let (retries, wait) = {
                                let guard = self.pool.borrow();
                                (guard.config.connect_retry_count,
                                 guard.config.reconnect_wait_time)
                            };
                            // the first try isn't a retry, so the cap
                            // allows retries on top of it
                            if attempt >= retries {
                                debug!("Connect to {} failed after {} \
                                    attempts: {}",
                                    self.pool.borrow().host,
                                    attempt + 1, e);
                                self.pool.borrow_mut().alive = false;
                                start_alive_detector(&self.pool);
                                return Err(Error::ConnectionRefused);
                            }
                            // keep the cadence steady: the observed
                            // connect latency comes out of the wait
                            let wait = jittered(wait)
                                .checked_sub(attempt_start.elapsed())
                                .unwrap_or(Duration::new(0, 0));
                            let timeout = {
                                let guard = self.pool.borrow();
                                Timeout::new(wait, &guard.handle)
                                    .expect("can always set a timeout")
                            };
                            self.state = SendState::Backoff {
                                timeout: timeout,
                                codec: codec,
                                attempt: attempt + 1,
                            };
                            continue;
                        }
                    }
                }
                SendState::Backoff { mut timeout, codec, attempt } => {
                    match timeout.poll().expect("timeout never errors") {
                        Async::NotReady => {
                            self.state = SendState::Backoff {
                                timeout: timeout, codec: codec,
                                attempt: attempt,
                            };
                            return Ok(Async::NotReady);
                        }
                        Async::Ready(()) => {
                            let fut = {
                                let guard = self.pool.borrow();
                                connect(guard.addr, &guard.config,
                                        &guard.handle)
                            };
                            self.state = SendState::Connecting {
                                fut: fut,
                                codec: codec,
                                attempt: attempt,
                                attempt_start: Instant::now(),
                            };
                            continue;
                        }
                    }
                }
                SendState::Dispatching(mut send) => {
                    match send.poll() {
                        Ok(Async::NotReady) => {
                            self.state = SendState::Dispatching(send);
                            return Ok(Async::NotReady);
                        }
                        Ok(Async::Ready(client)) => {
                            collect(&self.pool, client);
                            return Ok(Async::Ready(()));
                        }
                        // response arrived but the connection is done
                        // for; it is dropped, not requeued
                        Err(Error::Closed) => {
                            return Ok(Async::Ready(()));
                        }
                        // a failed client never goes back in a queue
                        Err(e) => return Err(e),
                    }
                }
                SendState::Done => {
                    panic!("SendRequest polled after completion");
                }
            }
        }
    }
}
