/// The request target, RFC 7230 §5.3
#[derive(Debug, PartialEq)]
pub enum RequestTarget<'a> {
    /// Usual form: `/hello?name=world`
    Origin(&'a str),
    /// Full url: `http://example.com:8080/hello`
    ///
    /// Unlike in `Origin` the path may be empty here.
    Absolute { scheme: &'a str, authority: &'a str, path: &'a str },
    /// Bare authority `example.com:8080`, only valid for CONNECT
    Authority(&'a str),
    /// `*`, only valid for server-wide OPTIONS
    Asterisk,
}

// An authority can't contain '/', '?' or '#'; HTTP doesn't do userinfo
// either, so '@' ends it too.
fn authority_end_char(&x: &u8) -> bool {
    x == b'/' || x == b'?' || x == b'#' || x == b'@'
}

impl<'a> RequestTarget<'a> {
    pub fn parse(s: &'a str) -> Option<RequestTarget<'a>> {
        use self::RequestTarget::*;

        if s.len() == 0 {
            return None;
        }
        if s.starts_with("/") {
            return Some(Origin(s));
        }
        for &(scheme, prefix) in
            &[("http", "http://"), ("https", "https://")]
        {
            if s.starts_with(prefix) {
                let rest = &s[prefix.len()..];
                let auth_end = rest.as_bytes().iter()
                    .position(authority_end_char)
                    .unwrap_or(rest.len());
                return Some(Absolute {
                    scheme: scheme,
                    authority: &rest[..auth_end],
                    path: &rest[auth_end..],
                });
            }
        }
        if s == "*" {
            return Some(Asterisk);
        }
        if s.as_bytes().iter().position(authority_end_char).is_none() {
            return Some(Authority(s));
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::RequestTarget;
    use super::RequestTarget::*;

    #[test]
    fn empty() {
        assert_matches!(RequestTarget::parse(""), None);
    }

    #[test]
    fn path() {
        assert_matches!(RequestTarget::parse("/hello"),
                        Some(Origin("/hello")));
        assert_matches!(RequestTarget::parse("/hello?xxx"),
                        Some(Origin("/hello?xxx")));
        assert_matches!(RequestTarget::parse("/http://x"),
                        Some(Origin("/http://x")));
    }

    #[test]
    fn star() {
        assert_matches!(RequestTarget::parse("*"), Some(Asterisk));
    }

    #[test]
    fn absolute() {
        assert_matches!(RequestTarget::parse("http://x"),
                        Some(Absolute { scheme: "http", authority: "x",
                                        path: "" }));
        assert_matches!(RequestTarget::parse("http://x/"),
                        Some(Absolute { scheme: "http", authority: "x",
                                        path: "/" }));
        assert_matches!(RequestTarget::parse("http://x:932/hello?world"),
                        Some(Absolute { scheme: "http", authority: "x:932",
                                        path: "/hello?world" }));
        assert_matches!(RequestTarget::parse("https://x/y"),
                        Some(Absolute { scheme: "https", authority: "x",
                                        path: "/y" }));
    }

    #[test]
    fn authority() {
        assert_matches!(RequestTarget::parse("example.com:80"),
                        Some(Authority("example.com:80")));
    }
}
