extern crate netbuf;
extern crate tk_relay;

use netbuf::Buf;

use tk_relay::websocket::{parse_frame, write_packet, write_fragmented};
use tk_relay::websocket::{write_close, Frame};


const TEXT: u8 = 0x1;
const BINARY: u8 = 0x2;

#[test]
fn masked_text_round_trip() {
    let mut buf = Buf::new();
    write_packet(&mut buf, TEXT, b"hi", true);
    // client frames carry a fresh mask, 2 + 4 + 2 bytes total
    assert_eq!(buf.len(), 8);
    let (frame, bytes) = parse_frame(&mut buf, 1 << 20, true)
        .unwrap().unwrap();
    assert_eq!(frame, Frame::Text("hi"));
    assert_eq!(bytes, 8);
}

#[test]
fn server_frames_are_unmasked() {
    let mut buf = Buf::new();
    write_packet(&mut buf, TEXT, b"hi", false);
    assert_eq!(&buf[..], b"\x81\x02hi");
}

#[test]
fn any_fragmentation_reassembles() {
    // a message split into K frames decodes to the original bytes
    let message: Vec<u8> = (0..2000u32).map(|x| (x % 251) as u8).collect();
    for &frame_size in &[1usize, 3, 125, 126, 1000, 1999, 2000] {
        let mut buf = Buf::new();
        write_fragmented(&mut buf, BINARY, &message, true, frame_size);
        let mut assembled = Vec::new();
        loop {
            let (frame, bytes) = parse_frame(&mut buf, 1 << 20, true)
                .unwrap().unwrap();
            let fin = match frame {
                Frame::Binary(data) => {
                    assembled.extend_from_slice(data);
                    true
                }
                Frame::FragmentStart { binary: true, data } => {
                    assembled.extend_from_slice(data);
                    false
                }
                Frame::Fragment { fin, data } => {
                    assembled.extend_from_slice(data);
                    fin
                }
                other => panic!("unexpected frame {:?}", other),
            };
            buf.consume(bytes);
            if fin {
                break;
            }
        }
        assert_eq!(assembled, message, "frame size {}", frame_size);
        assert_eq!(buf.len(), 0);
    }
}

#[test]
fn frames_survive_arbitrary_tcp_chunking() {
    // the parser gives the same answer no matter how the bytes arrive
    let mut wire = Buf::new();
    write_packet(&mut wire, TEXT, b"hello world", true);
    write_packet(&mut wire, BINARY, &[0u8; 300], true);
    write_close(&mut wire, 1000, "bye", true);
    let total = wire.len();
    for cut in 1..total {
        let mut buf = Buf::new();
        buf.extend(&wire[..cut]);
        let mut frames = 0;
        let mut offset = cut;
        loop {
            match parse_frame(&mut buf, 1 << 20, true).unwrap() {
                Some((_, bytes)) => {
                    buf.consume(bytes);
                    frames += 1;
                }
                None => {
                    if offset >= total {
                        break;
                    }
                    // feed one more byte
                    buf.extend(&wire[offset..offset+1]);
                    offset += 1;
                }
            }
            if frames == 3 {
                break;
            }
        }
        assert_eq!(frames, 3, "cut at {}", cut);
    }
}

#[test]
fn close_codes() {
    let mut buf = Buf::new();
    write_close(&mut buf, 1000, "bye", false);
    assert_eq!(parse_frame(&mut buf, 100, false).unwrap(),
        Some((Frame::Close(Some(1000), "bye"), 7)));

    let mut buf = Buf::new();
    write_close(&mut buf, 4123, "", false);
    assert_eq!(parse_frame(&mut buf, 100, false).unwrap(),
        Some((Frame::Close(Some(4123), ""), 4)));

    // 1005 may not appear on the wire
    let mut buf = Buf::new();
    write_close(&mut buf, 1005, "", false);
    assert_eq!(parse_frame(&mut buf, 100, false).unwrap(),
        Some((Frame::Close(None, ""), 4)));
}
