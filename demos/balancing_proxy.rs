//! Reverse proxy: listens on one port, spreads requests over backends
//!
//! Run a couple of backend servers (for example two copies of the
//! hello_world demo), then:
//!
//! ```sh
//! cargo run --example balancing_proxy -- \
//!     --listen 0.0.0.0:8000 127.0.0.1:8080 127.0.0.1:8081
//! ```
extern crate argparse;
extern crate env_logger;
extern crate futures;
extern crate tk_listen;
extern crate tk_relay;
extern crate tokio_core;

use std::env;
use std::rc::Rc;
use std::time::Duration;

use argparse::{ArgumentParser, Store, Collect};
use futures::{Stream, Future};
use tk_listen::ListenExt;
use tokio_core::net::TcpListener;
use tokio_core::reactor::Core;

use tk_relay::balancer::{Algorithm, Balancer};
use tk_relay::proxy::ProxyDispatcher;
use tk_relay::server::{Config, Proto};
use tk_relay::pool;

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init().expect("init logging");

    let mut listen = "0.0.0.0:8000".to_string();
    let mut backends = Vec::<String>::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Reverse proxy balancing over backends");
        ap.refer(&mut listen)
            .add_option(&["--listen"], Store, "Address to listen on");
        ap.refer(&mut backends)
            .add_argument("backend", Collect, "Backend host:port");
        ap.parse_args_or_exit();
    }
    if backends.is_empty() {
        backends.push("127.0.0.1:8080".to_string());
    }

    let mut lp = Core::new().unwrap();
    let h1 = lp.handle();
    let h2 = lp.handle();

    let addr = listen.parse().unwrap();
    let listener = TcpListener::bind(&addr, &lp.handle()).unwrap();
    let cfg = Config::new().done();
    let pool_cfg = pool::Config::new().done();

    let hosts: Vec<&str> = backends.iter().map(|x| &x[..]).collect();
    let balancer = Rc::new(
        Balancer::create(&hosts, Algorithm::RoundRobin,
                         &pool_cfg, &lp.handle())
        .expect("backends must be resolvable"));

    let done = listener.incoming()
        .sleep_on_error(Duration::from_millis(100), &h1)
        .map(move |(socket, _addr)| {
            Proto::new(socket, &cfg,
                    ProxyDispatcher::new(balancer.clone()), &h2)
                .map_err(|e| { println!("Connection error: {}", e); })
        })
        .listen(1000);

    lp.run(done).unwrap();
}
