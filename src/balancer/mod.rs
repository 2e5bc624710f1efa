//! Request fan-out over per-host pools
//!
//! A balancer owns one pool per backend and picks one per request with
//! round-robin, smooth weighted round-robin or uniform random
//! selection, skipping hosts whose pools report themselves dead.

use std::cell::RefCell;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::Future;
use futures::future;
use futures::sync::oneshot::Receiver;
use rand::{thread_rng, Rng};
use tokio_core::reactor::Handle;

use client::{Buffered, Error, Response};
use pool::{self, Pool};


/// Selection algorithm over the backends
#[derive(Debug, Clone, PartialEq)]
pub enum Algorithm {
    RoundRobin,
    /// Nginx-style smooth weighted round-robin; one weight per host, in
    /// the order the hosts are given
    WeightedRoundRobin(Vec<u32>),
    Random,
}

struct WrrState {
    weights: Vec<u32>,
    current: usize,
    weight: i64,
    gcd: u32,
    max: u32,
}

enum Selector {
    RoundRobin(AtomicUsize),
    Weighted(RefCell<WrrState>),
    Random,
}

/// A set of pools with a selection policy
pub struct Balancer {
    pools: Vec<Pool>,
    selector: Selector,
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl WrrState {
    fn new(weights: Vec<u32>) -> WrrState {
        let g = weights.iter().fold(0, |acc, &w| gcd(acc, w));
        let max = weights.iter().cloned().max().unwrap_or(0);
        WrrState {
            current: weights.len().saturating_sub(1),
            weight: 0,
            gcd: g,
            max: max,
            weights: weights,
        }
    }
    /*
      Supposing a server set S = {S0, S1, ..., Sn-1} with weights W(Si),
      i the index selected last time (initially -1) and cw the current
      weight in scheduling (initially 0):

      while (true) {
          i = (i + 1) mod n;
          if (i == 0) {
              cw = cw - gcd(S);
              if (cw <= 0) {
                  cw = max(S);
                  if (cw == 0) return NULL;
              }
          }
          if (W(Si) >= cw) return Si;
      }
    */
    fn pick(&mut self) -> usize {
        let n = self.weights.len();
        loop {
            self.current = (self.current + 1) % n;
            if self.current == 0 {
                self.weight -= self.gcd as i64;
                if self.weight <= 0 {
                    self.weight = self.max as i64;
                    if self.max == 0 {
                        return 0;
                    }
                }
            }
            if self.weights[self.current] as i64 >= self.weight {
                return self.current;
            }
        }
    }
}

impl Selector {
    fn new(algorithm: Algorithm) -> Selector {
        match algorithm {
            Algorithm::RoundRobin => {
                Selector::RoundRobin(AtomicUsize::new(0))
            }
            Algorithm::WeightedRoundRobin(weights) => {
                Selector::Weighted(RefCell::new(WrrState::new(weights)))
            }
            Algorithm::Random => Selector::Random,
        }
    }
    fn pick(&self, n: usize) -> usize {
        match *self {
            Selector::RoundRobin(ref counter) => {
                counter.fetch_add(1, Ordering::Relaxed) % n
            }
            Selector::Weighted(ref state) => {
                state.borrow_mut().pick() % n
            }
            Selector::Random => thread_rng().gen_range(0, n),
        }
    }
}

impl Balancer {
    /// Build a balancer with one pool per host
    ///
    /// Hosts are `host:port` strings. For weighted round-robin the
    /// weights line up with the hosts by position (missing weights
    /// count as 1).
    pub fn create(hosts: &[&str], algorithm: Algorithm,
        config: &Arc<pool::Config>, handle: &Handle)
        -> Result<Balancer, io::Error>
    {
        let algorithm = match algorithm {
            Algorithm::WeightedRoundRobin(mut weights) => {
                weights.resize(hosts.len(), 1);
                Algorithm::WeightedRoundRobin(weights)
            }
            other => other,
        };
        let pools = hosts.iter()
            .map(|host| Pool::create(host, config, handle))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Balancer {
            pools: pools,
            selector: Selector::new(algorithm),
        })
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// Pick a live backend, or `None` when every host is down
    ///
    /// Dead pools are skipped; after `2·N` attempts the balancer stops
    /// trying.
    pub fn select(&self) -> Option<&Pool> {
        let n = self.pools.len();
        if n == 0 {
            return None;
        }
        for _ in 0..2*n {
            let i = self.selector.pick(n);
            if self.pools[i].is_alive() {
                return Some(&self.pools[i]);
            }
        }
        None
    }

    /// Send a request built for the selected backend
    ///
    /// The closure receives the chosen `host:port` (for the `Host`
    /// header or an absolute url) and returns a prepared codec plus its
    /// response channel. With every backend down the future fails with
    /// `ConnectionRefused`.
    pub fn send_request<F>(&self, make: F)
        -> Box<Future<Item=Response, Error=Error>>
        where F: FnOnce(&str) -> (Buffered,
                                  Receiver<Result<Response, Error>>),
    {
        let pool = match self.select() {
            Some(pool) => pool.clone(),
            None => return Box::new(future::err(Error::ConnectionRefused)),
        };
        let (codec, rx) = make(&pool.host());
        Box::new(pool.request(codec)
            .and_then(move |()| rx.then(|res| match res {
                Ok(inner) => inner,
                Err(_canceled) => Err(Error::Canceled),
            })))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use super::{Algorithm, Selector, WrrState};

    #[test]
    fn round_robin_window() {
        // each backend is visited in every window of n selections
        let sel = Selector::new(Algorithm::RoundRobin);
        let n = 5;
        let picks: Vec<usize> = (0..50).map(|_| sel.pick(n)).collect();
        for window in picks.windows(n) {
            let distinct: HashSet<_> = window.iter().collect();
            assert_eq!(distinct.len(), n);
        }
    }

    #[test]
    fn wrr_distribution() {
        // weights (5, 1, 1): out of 700 requests A gets 500
        let mut state = WrrState::new(vec![5, 1, 1]);
        let mut counts = [0usize; 3];
        for _ in 0..700 {
            counts[state.pick()] += 1;
        }
        assert_eq!(counts, [500, 100, 100]);
    }

    #[test]
    fn wrr_window() {
        // over one period of sum/gcd selections host i is picked
        // exactly weight_i/gcd times
        let mut state = WrrState::new(vec![4, 2, 2]);
        let mut counts = [0usize; 3];
        for _ in 0..4 {
            counts[state.pick()] += 1;
        }
        assert_eq!(counts, [2, 1, 1]);
    }

    #[test]
    fn wrr_equal_weights_behaves_like_rr() {
        let mut state = WrrState::new(vec![1, 1, 1]);
        let picks: Vec<usize> = (0..6).map(|_| state.pick()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn random_stays_in_range() {
        let sel = Selector::new(Algorithm::Random);
        for _ in 0..1000 {
            assert!(sel.pick(3) < 3);
        }
    }

    #[test]
    fn gcd_fold() {
        assert_eq!(super::gcd(4, 6), 2);
        assert_eq!(super::gcd(5, 1), 1);
        let state = WrrState::new(vec![4, 2, 2]);
        assert_eq!(state.gcd, 2);
        assert_eq!(state.max, 4);
    }
}
