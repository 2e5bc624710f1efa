/// How the codec wants the request body delivered
///
/// Returned from `Codec::recv_mode`, called once right after
/// `headers_received`.
#[derive(Debug, Clone)]
pub struct RecvMode {
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    BufferedUpfront(usize),
    Progressive(usize),
    Hijack,
}

impl RecvMode {
    /// Buffer the whole body before the single `data_received` call
    ///
    /// The argument is an upper bound on the body size, not a buffer
    /// size. A declared `Content-Length` above it fails the request
    /// immediately with a 400.
    pub fn buffered_upfront(max_body_size: usize) -> RecvMode {
        RecvMode {
            mode: Mode::BufferedUpfront(max_body_size),
        }
    }
    /// Deliver the body in chunks as they arrive
    ///
    /// The parameter is the minimum number of bytes worth waking the
    /// codec up for; the final chunk (with `end == true`) may be
    /// smaller. `progressive(1)` is perfectly fine.
    pub fn progressive(min_chunk_size_hint: usize) -> RecvMode {
        RecvMode {
            mode: Mode::Progressive(min_chunk_size_hint),
        }
    }
    /// Don't read a body; take the raw connection after the response
    ///
    /// This is the websocket (and CONNECT) path: once the response is
    /// written, `Codec::hijack` receives both buffered halves of the
    /// socket and the protocol future resolves.
    pub fn hijack() -> RecvMode {
        RecvMode { mode: Mode::Hijack }
    }
}

pub fn get_mode(mode: &RecvMode) -> Mode {
    mode.mode
}
