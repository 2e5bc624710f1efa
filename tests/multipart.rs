extern crate tk_relay;

use tk_relay::multipart::{Parser, Events, FormBuilder, collect_parts};


#[derive(Default)]
struct Log {
    parts: usize,
    data: Vec<u8>,
    done: bool,
}

impl Events for Log {
    fn part_begin(&mut self) { self.parts += 1 }
    fn part_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data)
    }
    fn end(&mut self) { self.done = true }
}

fn form_and_file() -> (String, Vec<u8>) {
    let mut form = FormBuilder::new();
    form.add_field("name", b"a");
    form.add_file("file", "foo.txt", "text/plain",
        "line one\r\nline two".as_bytes());
    let boundary = form.content_type()
        .split("boundary=").nth(1).unwrap().to_string();
    (boundary, form.finish())
}

#[test]
fn collects_fields_and_files() {
    let (boundary, body) = form_and_file();
    let parts = collect_parts(&boundary, &body).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name(), Some("name"));
    assert_eq!(&parts[0].data[..], b"a");
    assert_eq!(parts[1].name(), Some("file"));
    assert_eq!(parts[1].filename(), Some("foo.txt"));
    assert_eq!(&parts[1].data[..], b"line one\r\nline two");
}

#[test]
fn restartable_at_any_point() {
    // feeding the body byte by byte produces the same events as one
    // call with everything
    let (boundary, body) = form_and_file();
    let mut log = Log::default();
    let mut parser = Parser::new(&boundary);
    for i in 0..body.len() {
        assert_eq!(parser.feed(&body[i..i+1], &mut log), 1);
    }
    assert!(parser.is_done());
    assert!(log.done);
    assert_eq!(log.parts, 2);

    let mut whole = Log::default();
    let mut parser = Parser::new(&boundary);
    parser.feed(&body, &mut whole);
    assert_eq!(log.data, whole.data);
}

#[test]
fn consumed_count_stops_at_errors() {
    let body = b"--B\r\nnot a header\r\n\r\nx\r\n--B--";
    let mut parser = Parser::new("B");
    let mut log = Log::default();
    let consumed = parser.feed(body, &mut log);
    assert!(consumed < body.len());
    assert!(parser.error().is_some());
    // feeding more after an error consumes nothing
    assert_eq!(parser.feed(b"more", &mut log), 0);
}

#[test]
fn boundary_lookalike_in_payload() {
    let (boundary, _) = form_and_file();
    // craft a payload containing a prefix of the real delimiter
    let tease = format!("data\r\n--{}nope", &boundary[..boundary.len()-1]);
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n\
         {tease}\r\n--{b}--", b=boundary, tease=tease);
    let parts = collect_parts(&boundary, body.as_bytes()).unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(String::from_utf8_lossy(&parts[0].data), tease);
}
