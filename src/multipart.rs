//! Restartable parser for `multipart/form-data` bodies
//!
//! The parser is a byte-at-a-time state machine driven by the boundary
//! fixed at construction. It holds no part data itself: `feed()` reports
//! everything through an [`Events`] sink and may be called with input
//! fragmented at arbitrary points. A candidate boundary match that spans
//! two feeds is kept in a lookbehind buffer and re-emitted as part data
//! if it turns out not to be a boundary.

use std::io::Write;

use rand::{thread_rng, Rng};


const CR: u8 = b'\r';
const LF: u8 = b'\n';
const HYPHEN: u8 = b'-';
const COLON: u8 = b':';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    StartBoundary,
    HeaderFieldStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueAlmostDone,
    HeadersAlmostDone,
    PartDataStart,
    PartData,
    End,
    Error,
}

/// Sink for parser events
///
/// Data-carrying callbacks may fire several times per logical item when
/// the item crosses a feed or an internal mark; concatenate the slices.
pub trait Events {
    fn part_begin(&mut self) {}
    fn header_field(&mut self, _data: &[u8]) {}
    fn header_value(&mut self, _data: &[u8]) {}
    fn header_end(&mut self) {}
    fn headers_end(&mut self) {}
    fn part_data(&mut self, _data: &[u8]) {}
    fn part_end(&mut self) {}
    fn end(&mut self) {}
}

pub struct Parser {
    // delimiter as it appears between parts: CRLF "--" token
    boundary: Vec<u8>,
    // byte-membership table of the delimiter for the skip loop
    boundary_chars: [bool; 256],
    lookbehind: Vec<u8>,
    state: State,
    index: usize,
    part_boundary: bool,
    last_boundary: bool,
    header_field_mark: Option<usize>,
    header_value_mark: Option<usize>,
    part_data_mark: Option<usize>,
    error: Option<&'static str>,
}

impl Parser {
    /// Create a parser for the boundary token of the `Content-Type` header
    pub fn new(boundary: &str) -> Parser {
        let mut delim = Vec::with_capacity(boundary.len() + 4);
        delim.extend_from_slice(b"\r\n--");
        delim.extend_from_slice(boundary.as_bytes());
        let mut chars = [false; 256];
        for &b in delim.iter() {
            chars[b as usize] = true;
        }
        let lookbehind = vec![0; delim.len() + 8];
        Parser {
            boundary: delim,
            boundary_chars: chars,
            lookbehind: lookbehind,
            state: State::Start,
            index: 0,
            part_boundary: false,
            last_boundary: false,
            header_field_mark: None,
            header_value_mark: None,
            part_data_mark: None,
            error: None,
        }
    }

    /// True once the closing boundary has been seen
    pub fn is_done(&self) -> bool {
        self.state == State::End
    }

    /// The diagnostic of the first error, if parsing failed
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    fn fail(&mut self, reason: &'static str) {
        self.state = State::Error;
        self.error = Some(reason);
    }

    /// Drive the parser with the next piece of the body
    ///
    /// Returns the number of bytes consumed, which is `data.len()` unless
    /// the parser entered the error state.
    pub fn feed<E: Events>(&mut self, data: &[u8], ev: &mut E) -> usize {
        use self::State::*;

        if self.state == Error || data.len() == 0 {
            return 0;
        }
        let len = data.len();
        let bs = self.boundary.len();
        let mut i = 0;
        while i < len {
            let mut c = data[i];
            match self.state {
                // trailing epilogue bytes are ignored
                Error | End => break,
                Start => {
                    // the stream itself starts with "--" token, without
                    // the leading CRLF the in-stream delimiter carries
                    self.index = 2;
                    self.state = StartBoundary;
                    continue;
                }
                StartBoundary => {
                    if self.index == bs {
                        if c != CR {
                            self.fail("expected CR after first boundary");
                            return i;
                        }
                    } else if self.index == bs + 1 {
                        if c != LF {
                            self.fail("expected LF after first boundary");
                            return i;
                        }
                        self.index = 0;
                        ev.part_begin();
                        self.state = HeaderFieldStart;
                        i += 1;
                        continue;
                    } else if c != self.boundary[self.index] {
                        self.fail("body does not start with the boundary");
                        return i;
                    }
                    self.index += 1;
                }
                HeaderFieldStart => {
                    self.state = HeaderField;
                    self.header_field_mark = Some(i);
                    self.index = 0;
                    continue;
                }
                HeaderField => {
                    if c == CR {
                        // empty line: end of part headers
                        self.header_field_mark = None;
                        self.state = HeadersAlmostDone;
                        i += 1;
                        continue;
                    }
                    self.index += 1;
                    if c == COLON {
                        if self.index == 1 {
                            self.fail("empty part header name");
                            return i;
                        }
                        if let Some(mark) = self.header_field_mark.take() {
                            if i > mark {
                                ev.header_field(&data[mark..i]);
                            }
                        }
                        self.state = HeaderValueStart;
                    } else if c != HYPHEN {
                        let cl = c | 0x20;
                        if cl < b'a' || cl > b'z' {
                            self.fail("invalid character in part header \
                                name");
                            return i;
                        }
                    }
                }
                HeaderValueStart => {
                    if c != b' ' {
                        self.header_value_mark = Some(i);
                        self.state = HeaderValue;
                        continue;
                    }
                }
                HeaderValue => {
                    if c == CR {
                        if let Some(mark) = self.header_value_mark.take() {
                            if i > mark {
                                ev.header_value(&data[mark..i]);
                            }
                        }
                        ev.header_end();
                        self.state = HeaderValueAlmostDone;
                    }
                }
                HeaderValueAlmostDone => {
                    if c != LF {
                        self.fail("expected LF after part header");
                        return i;
                    }
                    self.state = HeaderFieldStart;
                }
                HeadersAlmostDone => {
                    if c != LF {
                        self.fail("expected LF after part headers");
                        return i;
                    }
                    ev.headers_end();
                    self.state = PartDataStart;
                }
                PartDataStart => {
                    self.state = PartData;
                    self.part_data_mark = Some(i);
                    continue;
                }
                PartData => {
                    let prev_index = self.index;
                    if self.index == 0 {
                        // any delimiter occurrence must place one of its
                        // bytes at offset bs-1, so stride through runs
                        // that can't contain one
                        while i + bs <= len &&
                            !self.boundary_chars[data[i + bs - 1] as usize]
                        {
                            i += bs;
                        }
                        if i == len {
                            break;
                        }
                        c = data[i];
                    }
                    if self.index < bs {
                        if self.boundary[self.index] == c {
                            if self.index == 0 {
                                if let Some(mark) =
                                    self.part_data_mark.take()
                                {
                                    if i > mark {
                                        ev.part_data(&data[mark..i]);
                                    }
                                }
                            }
                            self.index += 1;
                        } else {
                            self.index = 0;
                        }
                    } else if self.index == bs {
                        self.index += 1;
                        if c == CR {
                            self.part_boundary = true;
                            self.last_boundary = false;
                        } else if c == HYPHEN {
                            self.last_boundary = true;
                            self.part_boundary = false;
                        } else {
                            self.index = 0;
                        }
                    } else if self.index == bs + 1 {
                        if self.part_boundary {
                            self.index = 0;
                            if c == LF {
                                self.part_boundary = false;
                                ev.part_end();
                                ev.part_begin();
                                self.state = HeaderFieldStart;
                                i += 1;
                                continue;
                            }
                        } else if self.last_boundary {
                            if c == HYPHEN {
                                ev.part_end();
                                ev.end();
                                self.state = End;
                                i += 1;
                                continue;
                            }
                            self.fail("expected second hyphen of the \
                                closing boundary");
                            return i;
                        } else {
                            self.index = 0;
                        }
                    }
                    if self.index > 0 {
                        // provisional match bytes; kept in case the
                        // candidate fails in a later feed
                        self.lookbehind[self.index - 1] = c;
                    } else if prev_index > 0 {
                        // the candidate was data after all
                        ev.part_data(&self.lookbehind[..prev_index]);
                        self.part_data_mark = Some(i);
                        // current byte may start a new candidate
                        continue;
                    }
                }
            }
            i += 1;
        }
        // flush the open marks; Some(0) continues them in the next feed
        if let Some(mark) = self.header_field_mark {
            if len > mark {
                ev.header_field(&data[mark..len]);
            }
            self.header_field_mark = Some(0);
        }
        if let Some(mark) = self.header_value_mark {
            if len > mark {
                ev.header_value(&data[mark..len]);
            }
            self.header_value_mark = Some(0);
        }
        if let Some(mark) = self.part_data_mark {
            if len > mark {
                ev.part_data(&data[mark..len]);
            }
            self.part_data_mark = Some(0);
        }
        len
    }
}

/// A fully buffered body part
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub data: Vec<u8>,
}

impl Part {
    fn header(&self, name: &str) -> Option<&str> {
        #[allow(unused_imports)]
        use std::ascii::AsciiExt;
        self.headers.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }
    /// The `name` parameter of the Content-Disposition header
    pub fn name(&self) -> Option<&str> {
        self.header("Content-Disposition")
            .and_then(|v| disposition_param(v, "name"))
    }
    /// The `filename` parameter of the Content-Disposition header
    pub fn filename(&self) -> Option<&str> {
        self.header("Content-Disposition")
            .and_then(|v| disposition_param(v, "filename"))
    }
}

fn disposition_param<'x>(value: &'x str, param: &str) -> Option<&'x str> {
    for piece in value.split(';').skip(1) {
        let piece = piece.trim();
        if let Some(eq) = piece.find('=') {
            if piece[..eq].trim() == param {
                let val = piece[eq+1..].trim();
                return Some(val.trim_matches('"'));
            }
        }
    }
    None
}

struct Collector {
    parts: Vec<Part>,
    field: Vec<u8>,
    value: Vec<u8>,
    current: Option<Part>,
}

impl Events for Collector {
    fn part_begin(&mut self) {
        self.current = Some(Part { headers: Vec::new(), data: Vec::new() });
    }
    fn header_field(&mut self, data: &[u8]) {
        self.field.extend_from_slice(data);
    }
    fn header_value(&mut self, data: &[u8]) {
        self.value.extend_from_slice(data);
    }
    fn header_end(&mut self) {
        if let Some(ref mut part) = self.current {
            part.headers.push((
                String::from_utf8_lossy(&self.field).into_owned(),
                String::from_utf8_lossy(&self.value).into_owned(),
            ));
        }
        self.field.clear();
        self.value.clear();
    }
    fn part_data(&mut self, data: &[u8]) {
        if let Some(ref mut part) = self.current {
            part.data.extend_from_slice(data);
        }
    }
    fn part_end(&mut self) {
        if let Some(part) = self.current.take() {
            self.parts.push(part);
        }
    }
}

/// Parse a complete body into its parts
///
/// This is the buffered convenience over [`Parser`]; streaming consumers
/// should drive the parser with their own [`Events`] sink instead.
pub fn collect_parts(boundary: &str, body: &[u8])
    -> Result<Vec<Part>, &'static str>
{
    let mut parser = Parser::new(boundary);
    let mut collector = Collector {
        parts: Vec::new(),
        field: Vec::new(),
        value: Vec::new(),
        current: None,
    };
    parser.feed(body, &mut collector);
    if let Some(reason) = parser.error() {
        return Err(reason);
    }
    if !parser.is_done() {
        return Err("truncated multipart body");
    }
    Ok(collector.parts)
}

/// Builder for `multipart/form-data` request bodies
///
/// Used by the client upload path; the boundary is random per message.
pub struct FormBuilder {
    boundary: String,
    buf: Vec<u8>,
}

impl FormBuilder {
    pub fn new() -> FormBuilder {
        let mut tail = [0u8; 8];
        thread_rng().fill_bytes(&mut tail);
        let mut boundary = String::from("----relay");
        for b in tail.iter() {
            boundary.push_str(&format!("{:02x}", b));
        }
        FormBuilder {
            boundary: boundary,
            buf: Vec::new(),
        }
    }
    /// The value for the `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
    pub fn add_field(&mut self, name: &str, value: &[u8]) -> &mut Self {
        write!(&mut self.buf,
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            self.boundary, name).unwrap();
        self.buf.extend_from_slice(value);
        self.buf.extend_from_slice(b"\r\n");
        self
    }
    pub fn add_file(&mut self, name: &str, filename: &str,
        content_type: &str, data: &[u8])
        -> &mut Self
    {
        write!(&mut self.buf,
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; \
             filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary, name, filename, content_type).unwrap();
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }
    /// Close the form and return the body bytes
    pub fn finish(&mut self) -> Vec<u8> {
        let mut body = ::std::mem::replace(&mut self.buf, Vec::new());
        write!(&mut body, "--{}--", self.boundary).unwrap();
        body
    }
}

#[cfg(test)]
mod test {
    use super::{Parser, Events, collect_parts, FormBuilder};

    const TWO_PARTS: &'static [u8] = b"--XYZ\r\n\
        Content-Disposition: form-data; name=\"a\"\r\n\
        \r\n\
        1\r\n\
        --XYZ\r\n\
        Content-Disposition: form-data; name=\"file\"; \
        filename=\"foo.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        file body\r\nwith a line break\r\n\
        --XYZ--";

    #[derive(Default)]
    struct Log {
        begins: usize,
        ends: usize,
        finished: bool,
        data: Vec<u8>,
    }

    impl Events for Log {
        fn part_begin(&mut self) { self.begins += 1 }
        fn part_data(&mut self, data: &[u8]) {
            self.data.extend_from_slice(data)
        }
        fn part_end(&mut self) { self.ends += 1 }
        fn end(&mut self) { self.finished = true }
    }

    #[test]
    fn two_parts() {
        let parts = collect_parts("XYZ", TWO_PARTS).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name(), Some("a"));
        assert_eq!(parts[0].filename(), None);
        assert_eq!(&parts[0].data[..], b"1");
        assert_eq!(parts[1].name(), Some("file"));
        assert_eq!(parts[1].filename(), Some("foo.txt"));
        assert_eq!(parts[1].headers.iter()
            .find(|&&(ref n, _)| n == "Content-Type")
            .map(|&(_, ref v)| &v[..]), Some("text/plain"));
        assert_eq!(&parts[1].data[..], b"file body\r\nwith a line break");
    }

    #[test]
    fn any_split_point() {
        // feeding the body in two pieces cut anywhere gives the same parts
        for cut in 1..TWO_PARTS.len() {
            let mut parser = Parser::new("XYZ");
            let mut log = Log::default();
            assert_eq!(parser.feed(&TWO_PARTS[..cut], &mut log), cut);
            assert_eq!(parser.feed(&TWO_PARTS[cut..], &mut log),
                TWO_PARTS.len() - cut);
            assert!(parser.is_done(), "cut at {}", cut);
            assert_eq!(log.begins, 2, "cut at {}", cut);
            assert_eq!(log.ends, 2, "cut at {}", cut);
            assert!(log.finished, "cut at {}", cut);
            assert_eq!(String::from_utf8_lossy(&log.data),
                "1file body\r\nwith a line break", "cut at {}", cut);
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut parser = Parser::new("XYZ");
        let mut log = Log::default();
        for i in 0..TWO_PARTS.len() {
            assert_eq!(parser.feed(&TWO_PARTS[i..i+1], &mut log), 1);
        }
        assert!(parser.is_done());
        assert_eq!(log.begins, 2);
        assert_eq!(String::from_utf8_lossy(&log.data),
            "1file body\r\nwith a line break");
    }

    #[test]
    fn false_boundary_is_data() {
        // "\r\n--XY" looks like the delimiter right until the 'Q'
        let body = b"--XYZ\r\nX-H: v\r\n\r\nabc\r\n--XYQdef\r\n--XYZ--";
        let parts = collect_parts("XYZ", body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0].data[..], b"abc\r\n--XYQdef");
    }

    #[test]
    fn false_boundary_across_feeds() {
        let body: &[u8] =
            b"--XYZ\r\nX-H: v\r\n\r\nabc\r\n--XYQdef\r\n--XYZ--";
        for cut in 1..body.len() {
            let parts = {
                let mut parser = Parser::new("XYZ");
                let mut collector = super::Collector {
                    parts: Vec::new(),
                    field: Vec::new(),
                    value: Vec::new(),
                    current: None,
                };
                parser.feed(&body[..cut], &mut collector);
                parser.feed(&body[cut..], &mut collector);
                assert!(parser.is_done(), "cut at {}", cut);
                collector.parts
            };
            assert_eq!(&parts[0].data[..], b"abc\r\n--XYQdef",
                "cut at {}", cut);
        }
    }

    #[test]
    fn bad_header_name() {
        let body = b"--XYZ\r\nBad Header: v\r\n\r\nx\r\n--XYZ--";
        let mut parser = Parser::new("XYZ");
        let mut log = Log::default();
        let consumed = parser.feed(body, &mut log);
        assert!(consumed < body.len());
        assert!(parser.error().is_some());
    }

    #[test]
    fn wrong_start_boundary() {
        let mut parser = Parser::new("XYZ");
        let mut log = Log::default();
        parser.feed(b"--ABC\r\n", &mut log);
        assert!(parser.error().is_some());
    }

    #[test]
    fn missing_terminal_hyphen() {
        let body = b"--XYZ\r\nX-H: v\r\n\r\nx\r\n--XYZ-oops";
        let mut parser = Parser::new("XYZ");
        let mut log = Log::default();
        parser.feed(body, &mut log);
        assert!(parser.error().is_some());
    }

    #[test]
    fn empty_part_value() {
        let body = b"--B\r\nContent-Disposition: form-data; \
            name=\"empty\"\r\n\r\n\r\n--B--";
        let parts = collect_parts("B", body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name(), Some("empty"));
        assert_eq!(&parts[0].data[..], b"");
    }

    #[test]
    fn trailing_epilogue_ignored() {
        let body = b"--B\r\nX-H: v\r\n\r\ndata\r\n--B--\r\nepilogue";
        let parts = collect_parts("B", body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0].data[..], b"data");
    }

    #[test]
    fn form_builder_round_trip() {
        let mut form = FormBuilder::new();
        form.add_field("name", b"value");
        form.add_file("file", "foo.txt", "text/plain", b"contents");
        let ctype = form.content_type();
        let body = form.finish();
        let boundary = ctype.split("boundary=").nth(1).unwrap().to_string();
        let parts = collect_parts(&boundary, &body).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name(), Some("name"));
        assert_eq!(&parts[0].data[..], b"value");
        assert_eq!(parts[1].filename(), Some("foo.txt"));
        assert_eq!(&parts[1].data[..], b"contents");
    }
}
