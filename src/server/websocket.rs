use std::str::from_utf8;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use server::Head;

pub use websocket::keys::Accept as WebsocketAccept;


/// Everything needed to answer an upgrade request with a 101
#[derive(Debug)]
pub struct WebsocketHandshake {
    /// The value for the `Sec-WebSocket-Accept` header
    pub accept: WebsocketAccept,
    /// `Sec-WebSocket-Protocol` tokens offered by the client
    pub protocols: Vec<String>,
    /// `Sec-WebSocket-Extensions` tokens offered by the client
    pub extensions: Vec<String>,
}

fn bytes_trim(mut x: &[u8]) -> &[u8] {
    while x.len() > 0 && matches!(x[0], b'\r' | b'\n' | b' ' | b'\t') {
        x = &x[1..];
    }
    while x.len() > 0 && matches!(x[x.len()-1], b'\r' | b'\n' | b' ' | b'\t')
    {
        x = &x[..x.len()-1];
    }
    x
}

/// Extract the handshake out of an upgrade request head
///
/// `Ok(None)` means this isn't a websocket request at all; `Err` means
/// it tried to be one and got it wrong.
pub fn get_handshake(req: &Head) -> Result<Option<WebsocketHandshake>, ()> {
    if !req.is_websocket_upgrade() {
        return Ok(None);
    }
    let mut version = false;
    let mut accept = None;
    let mut protocols = Vec::new();
    let mut extensions = Vec::new();
    for h in req.headers() {
        if h.name.eq_ignore_ascii_case("Sec-WebSocket-Key") {
            if accept.is_some() {
                debug!("Duplicate Sec-WebSocket-Key");
                return Err(());
            }
            accept = Some(
                WebsocketAccept::from_key_bytes(bytes_trim(h.value)));
        } else if h.name.eq_ignore_ascii_case("Sec-WebSocket-Version") {
            // only version 13 exists in the wild
            if bytes_trim(h.value) != b"13" {
                debug!("Bad websocket version {:?}",
                    String::from_utf8_lossy(h.value));
                return Err(());
            }
            version = true;
        } else if h.name.eq_ignore_ascii_case("Sec-WebSocket-Protocol") {
            let tokens = from_utf8(h.value)
                .map_err(|_| debug!("Bad utf-8 in Sec-WebSocket-Protocol"))?;
            protocols.extend(tokens.split(',')
                .map(|x| x.trim())
                .filter(|x| x.len() > 0)
                .map(|x| x.to_string()));
        } else if h.name.eq_ignore_ascii_case("Sec-WebSocket-Extensions") {
            let tokens = from_utf8(h.value)
                .map_err(|_| {
                    debug!("Bad utf-8 in Sec-WebSocket-Extensions")
                })?;
            extensions.extend(tokens.split(',')
                .map(|x| x.trim())
                .filter(|x| x.len() > 0)
                .map(|x| x.to_string()));
        }
    }
    if req.has_body() {
        debug!("Websocket handshake has a payload");
        return Err(());
    }
    if !version || accept.is_none() {
        debug!("Missing required websocket handshake headers");
        return Err(());
    }
    Ok(Some(WebsocketHandshake {
        accept: accept.take().unwrap(),
        protocols: protocols,
        extensions: extensions,
    }))
}
