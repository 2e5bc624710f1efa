use std::io;

use tk_bufstream::{Buf, Encode, Decode};

use websocket::error::ErrorEnum;
use websocket::utf8;
use websocket::zero_copy::{self, parse_frame, write_packet, write_close};
use websocket::{Packet, Frame};


const MAX_PACKET_SIZE: usize = 10 << 20;

/// Assembles full messages out of (possibly fragmented) frames
struct Assembler {
    masked_input: bool,
    partial: Option<(bool, Vec<u8>)>,
}

/// Framed codec for the server side of a connection
///
/// Output is unmasked, input must be masked. Fragmented messages are
/// reassembled, so the stream yields whole packets.
pub struct ServerCodec(Assembler);

/// Framed codec for the client side of a connection
pub struct ClientCodec(Assembler);

impl ServerCodec {
    pub fn new() -> ServerCodec {
        ServerCodec(Assembler { masked_input: true, partial: None })
    }
}

impl ClientCodec {
    pub fn new() -> ClientCodec {
        ClientCodec(Assembler { masked_input: false, partial: None })
    }
}

pub fn encode_packet(data: Packet, buf: &mut Buf, mask: bool) {
    use websocket::Packet::*;
    match data {
        Ping(data) => write_packet(buf, zero_copy::PING, &data, mask),
        Pong(data) => write_packet(buf, zero_copy::PONG, &data, mask),
        Text(data) => {
            write_packet(buf, zero_copy::TEXT, data.as_bytes(), mask)
        }
        Binary(data) => write_packet(buf, zero_copy::BINARY, &data, mask),
        Close(code, reason) => write_close(buf, code, &reason, mask),
    }
}

impl Assembler {
    fn decode(&mut self, buf: &mut Buf) -> Result<Option<Packet>, ErrorEnum> {
        loop {
            let (packet, bytes) = {
                let parsed = parse_frame(buf, MAX_PACKET_SIZE,
                    self.masked_input)?;
                let (frame, bytes) = match parsed {
                    Some(x) => x,
                    None => return Ok(None),
                };
                let packet = match frame {
                    Frame::Ping(data) => Some(Packet::Ping(data.to_vec())),
                    Frame::Pong(data) => Some(Packet::Pong(data.to_vec())),
                    Frame::Close(code, reason) => {
                        Some(Packet::Close(code.unwrap_or(1000),
                                           reason.to_string()))
                    }
                    Frame::Text(data) => {
                        if self.partial.is_some() {
                            return Err(ErrorEnum::BadContinuation);
                        }
                        Some(Packet::Text(data.to_string()))
                    }
                    Frame::Binary(data) => {
                        if self.partial.is_some() {
                            return Err(ErrorEnum::BadContinuation);
                        }
                        Some(Packet::Binary(data.to_vec()))
                    }
                    Frame::FragmentStart { binary, data } => {
                        if self.partial.is_some() {
                            return Err(ErrorEnum::BadContinuation);
                        }
                        self.partial = Some((binary, data.to_vec()));
                        None
                    }
                    Frame::Fragment { fin, data } => {
                        let (binary, mut message) = self.partial.take()
                            .ok_or(ErrorEnum::BadContinuation)?;
                        if message.len() + data.len() > MAX_PACKET_SIZE {
                            return Err(ErrorEnum::TooLong);
                        }
                        message.extend_from_slice(data);
                        if !fin {
                            self.partial = Some((binary, message));
                            None
                        } else if binary {
                            Some(Packet::Binary(message))
                        } else {
                            // text is validated on the whole message,
                            // fragment borders may split a code point
                            if !utf8::validate(&message) {
                                return Err(ErrorEnum::InvalidUtf8);
                            }
                            let text = String::from_utf8(message)
                                .map_err(|_| ErrorEnum::InvalidUtf8)?;
                            Some(Packet::Text(text))
                        }
                    }
                };
                (packet, bytes)
            };
            buf.consume(bytes);
            if let Some(packet) = packet {
                return Ok(Some(packet));
            }
            // consumed a fragment, try the next frame
        }
    }
}

impl Encode for ServerCodec {
    type Item = Packet;
    fn encode(&mut self, data: Packet, buf: &mut Buf) {
        encode_packet(data, buf, false);
    }
}

impl Decode for ServerCodec {
    type Item = Packet;
    fn decode(&mut self, buf: &mut Buf) -> Result<Option<Packet>, io::Error> {
        self.0.decode(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other,
                ::websocket::Error::from(e)))
    }
}

impl Encode for ClientCodec {
    type Item = Packet;
    fn encode(&mut self, data: Packet, buf: &mut Buf) {
        encode_packet(data, buf, true);
    }
}

impl Decode for ClientCodec {
    type Item = Packet;
    fn decode(&mut self, buf: &mut Buf) -> Result<Option<Packet>, io::Error> {
        self.0.decode(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other,
                ::websocket::Error::from(e)))
    }
}

#[cfg(test)]
mod test {
    use tk_bufstream::{Buf, Encode, Decode};
    use websocket::Packet;
    use websocket::zero_copy::{write_fragmented, TEXT};
    use super::{ServerCodec, ClientCodec};

    #[test]
    fn round_trip_through_codecs() {
        // client encodes masked, server decodes
        let mut buf = Buf::new();
        let mut client = ClientCodec::new();
        let mut server = ServerCodec::new();
        client.encode(Packet::Text("hi".to_string()), &mut buf);
        client.encode(Packet::Binary(vec![1, 2, 3]), &mut buf);
        assert_eq!(server.decode(&mut buf).unwrap(),
            Some(Packet::Text("hi".to_string())));
        assert_eq!(server.decode(&mut buf).unwrap(),
            Some(Packet::Binary(vec![1, 2, 3])));
        assert_eq!(server.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn reassembles_fragments() {
        let mut buf = Buf::new();
        let mut server = ServerCodec::new();
        write_fragmented(&mut buf, TEXT, "hello world".as_bytes(), true, 4);
        assert_eq!(server.decode(&mut buf).unwrap(),
            Some(Packet::Text("hello world".to_string())));
    }

    #[test]
    fn data_frame_inside_fragmented_message() {
        let mut buf = Buf::new();
        let mut server = ServerCodec::new();
        buf.extend(b"\x01\x82\x00\x00\x00\x00ab");  // text, fin clear
        buf.extend(b"\x82\x81\x00\x00\x00\x00c");   // binary, fin set
        assert!(server.decode(&mut buf).is_err());
    }

    #[test]
    fn stray_continuation() {
        let mut buf = Buf::new();
        let mut server = ServerCodec::new();
        buf.extend(b"\x80\x81\x00\x00\x00\x00x");
        assert!(server.decode(&mut buf).is_err());
    }
}
