#[allow(unused_imports)]
use std::ascii::AsciiExt;
use std::slice::Iter as SliceIter;

use httparse::Header;

use enums::{Status, Version};
use client::{BodyKind, Head};


/// Iterator over the end-to-end headers of a response
///
/// Created by `Head::headers`; skips hop-by-hop headers and the body
/// framing ones. Duplicates are neither glued together nor sorted.
pub struct HeaderIter<'a> {
    head: &'a Head<'a>,
    iter: SliceIter<'a, Header<'a>>,
}

impl<'a> Head<'a> {
    /// The status, when the code is one we have an enum variant for
    pub fn status(&self) -> Option<Status> {
        Status::from(self.code)
    }
    /// Raw status code and reason, whatever they were
    pub fn raw_status(&self) -> (u16, &'a str) {
        (self.code, self.reason)
    }
    pub fn version(&self) -> Version {
        self.version
    }
    /// How the response body is framed on the wire
    pub fn body_kind(&self) -> BodyKind {
        self.body_kind
    }
    /// Whether the server will close the connection after this response
    pub fn connection_close(&self) -> bool {
        self.connection_close
    }
    /// End-to-end headers of the response
    ///
    /// Hop-by-hop headers (`Connection` and whatever it names,
    /// `Transfer-Encoding`, `Content-Length`) are skipped; body length
    /// is part of the protocol, not of the payload metadata.
    pub fn headers(&self) -> HeaderIter {
        HeaderIter {
            head: self,
            iter: self.headers.iter(),
        }
    }
    /// Absolutely all headers, framing and hop-by-hop included
    pub fn all_headers(&self) -> &'a [Header<'a>] {
        self.headers
    }
}

impl<'a> Iterator for HeaderIter<'a> {
    type Item = (&'a str, &'a [u8]);
    fn next(&mut self) -> Option<(&'a str, &'a [u8])> {
        while let Some(header) = self.iter.next() {
            if header.name.eq_ignore_ascii_case("Connection") ||
                header.name.eq_ignore_ascii_case("Transfer-Encoding") ||
                header.name.eq_ignore_ascii_case("Content-Length")
            {
                continue;
            }
            if let Some(ref conn) = self.head.connection_header {
                let mut named = conn.split(',').map(|x| x.trim());
                if named.any(|x| x.eq_ignore_ascii_case(header.name)) {
                    continue;
                }
            }
            return Some((header.name, header.value));
        }
        None
    }
}
