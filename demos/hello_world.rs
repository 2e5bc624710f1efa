extern crate env_logger;
extern crate futures;
extern crate time;
extern crate tk_listen;
extern crate tk_relay;
extern crate tokio_core;

use std::env;
use std::time::Duration;

use futures::{Stream, Future};
use tk_listen::ListenExt;
use tokio_core::net::TcpListener;
use tokio_core::reactor::Core;

use tk_relay::{Status, OptFuture};
use tk_relay::server::buffered::{Request, BufferedDispatcher};
use tk_relay::server::{Encoder, EncoderDone, Config, Proto, Error};

const BODY: &'static str = "Hello World!";

fn service<S>(_req: Request, mut e: Encoder<S>)
    -> OptFuture<EncoderDone<S>, Error>
{
    e.status(Status::Ok);
    e.add_length(BODY.as_bytes().len() as u64).unwrap();
    e.format_header("Date", time::now_utc().rfc822()).unwrap();
    e.add_header("Server", concat!("tk-relay/",
                             env!("CARGO_PKG_VERSION"))).unwrap();
    if e.done_headers().unwrap() {
        e.write_body(BODY.as_bytes());
    }
    OptFuture::Value(Ok(e.done()))
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init().expect("init logging");

    let mut lp = Core::new().unwrap();
    let h1 = lp.handle();
    let h2 = lp.handle();

    let addr = "0.0.0.0:8080".parse().unwrap();
    let listener = TcpListener::bind(&addr, &lp.handle()).unwrap();
    let cfg = Config::new().done();

    let done = listener.incoming()
        .sleep_on_error(Duration::from_millis(100), &h1)
        .map(move |(socket, addr)| {
            Proto::new(socket, &cfg,
                    BufferedDispatcher::new(addr, &h2, || service),
                    &h2)
                .map_err(|e| { println!("Connection error: {}", e); })
        })
        .listen(1000);

    lp.run(done).unwrap();
}
