use std::io::Write;

use enums::Status;
use server::{Encoder, EncoderDone};


const PART1: &'static str = "\
    <!DOCTYPE html>\
    <html>\
        <head>\
            <title>";
const PART2: &'static str = "\
            </title>\
        </head>\
        <body>\
            <h1>";
const PART3: &'static str = "\
            </h1>\
            <p>";
const PART4: &'static str = concat!("\
            </p>\
            <hr>\
            <p>tk-relay/", env!("CARGO_PKG_VERSION"), "</p>\
        </body>\
    </html>");

/// Write a minimal HTML error page as the whole response
///
/// `detail` lands in a paragraph under the heading; pass an empty string
/// when there is nothing useful to say.
pub fn error_page<S>(status: Status, detail: &str, mut e: Encoder<S>)
    -> EncoderDone<S>
{
    let code = status.code();
    let reason = status.reason();
    e.status(status);
    if status.response_has_body() {
        let content_length = PART1.len() + PART2.len() + PART3.len() +
            PART4.len() + 2 * (4 + reason.len()) + detail.len();
        e.add_length(content_length as u64).unwrap();
        e.add_header("Content-Type", "text/html").unwrap();
        if e.done_headers().unwrap() {
            write!(&mut e, "{p1}{code:03} {reason}{p2}{code:03} {reason}\
                            {p3}{detail}{p4}",
                code=code, reason=reason, detail=detail,
                p1=PART1, p2=PART2, p3=PART3, p4=PART4)
                .expect("writing to a buffer always succeeds");
        }
    } else {
        e.done_headers().unwrap();
    }
    e.done()
}
