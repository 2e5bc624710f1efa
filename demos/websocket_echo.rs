extern crate env_logger;
extern crate futures;
extern crate time;
extern crate tk_listen;
extern crate tk_relay;
extern crate tokio_core;
#[macro_use] extern crate log;

use std::env;
use std::time::Duration;

use futures::future::{FutureResult, ok};
use futures::sync::mpsc::{unbounded, UnboundedSender};
use futures::{Stream, Future};
use tk_listen::ListenExt;
use tokio_core::net::TcpListener;
use tokio_core::reactor::Core;

use tk_relay::Status;
use tk_relay::server::buffered::{Request, BufferedDispatcher};
use tk_relay::server::{Encoder, EncoderDone, Config, Proto, Error};
use tk_relay::websocket::{self, Frame, Packet, Loop, Dispatcher};

const INDEX: &'static str = "<!DOCTYPE html><title>echo</title>\
    <p>Connect a websocket client to this port.</p>";

struct Echo(UnboundedSender<Packet>);

impl Dispatcher for Echo {
    type Future = FutureResult<(), websocket::Error>;
    fn frame(&mut self, frame: &Frame) -> Self::Future {
        match *frame {
            Frame::Text(text) => {
                self.0.unbounded_send(Packet::Text(text.to_string())).ok();
            }
            Frame::Binary(data) => {
                self.0.unbounded_send(Packet::Binary(data.to_vec())).ok();
            }
            _ => {}
        }
        ok(())
    }
}

fn service<S>(req: Request, mut e: Encoder<S>)
    -> FutureResult<EncoderDone<S>, Error>
{
    if let Some(ws) = req.websocket_handshake() {
        e.status(Status::SwitchingProtocol);
        e.format_header("Date", time::now_utc().rfc822()).unwrap();
        e.add_header("Connection", "upgrade").unwrap();
        e.add_header("Upgrade", "websocket").unwrap();
        e.format_header("Sec-WebSocket-Accept", &ws.accept).unwrap();
        e.done_headers().unwrap();
        ok(e.done())
    } else {
        e.status(Status::Ok);
        e.add_length(INDEX.as_bytes().len() as u64).unwrap();
        e.add_header("Content-Type", "text/html; charset=utf-8").unwrap();
        if e.done_headers().unwrap() {
            e.write_body(INDEX.as_bytes());
        }
        ok(e.done())
    }
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
    let wcfg = websocket::Config::new().done();

    let done = listener.incoming()
        .sleep_on_error(Duration::from_millis(100), &h1)
        .map(move |(socket, addr)| {
            let wcfg = wcfg.clone();
            let handle = h2.clone();
            Proto::new(socket, &cfg,
                BufferedDispatcher::new_with_websockets(addr, &h2,
                    || service,
                    move || {
                        let wcfg = wcfg.clone();
                        let handle = handle.clone();
                        move |out, inp| {
                            let (tx, rx) = unbounded();
                            let rx = rx.map_err(|_| "channel closed");
                            Loop::server(out, inp, rx, Echo(tx),
                                    &wcfg, &handle)
                                .map_err(|e| {
                                    info!("Websocket closed: {}", e)
                                })
                        }
                    }),
                &h2)
            .map_err(|e| { println!("Connection error: {}", e); })
        })
        .listen(1000);

    lp.run(done).unwrap();
}
