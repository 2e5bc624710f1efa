use std::io;

use httparse;

use enums::Status;


quick_error! {
    /// Everything that can go wrong on a server connection
    #[derive(Debug)]
    pub enum Error {
        /// Transport failure; the connection is torn down silently
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// Peer closed the connection in the middle of a request
        ConnectionReset {
            description("connection reset by peer")
        }
        /// Malformed request head
        ParseError(err: httparse::Error) {
            description("parse error")
            display("parse error: {:?}", err)
            from()
        }
        /// Request target that we can't interpret
        BadRequestTarget {
            description("error parsing request target")
        }
        /// More than one `Host` header
        DuplicateHost {
            description("duplicate host header")
        }
        /// Unparseable `Content-Length` header
        BadContentLength {
            description("invalid content-length header")
        }
        /// More than one `Content-Length` header
        DuplicateContentLength {
            description("duplicate content-length header")
        }
        /// Both `Content-Length` and `Transfer-Encoding: chunked`
        ConflictingBodyLength {
            description("both content-length and chunked transfer \
                encoding are present")
        }
        /// More headers than we are prepared to hold
        TooManyHeaders {
            description("too many headers in the request")
        }
        /// Head and body together exceed the configured limit
        RequestTooLong {
            description("request is too long")
        }
        /// Chunked request bodies are not supported on the read path
        ChunkedRequest {
            description("chunked request body is not supported")
        }
        /// A body that doesn't match its declared content type
        BadRequestBody(reason: &'static str) {
            description("malformed request body")
            display("malformed request body: {}", reason)
        }
        /// An idle, headers or body deadline fired
        Timeout {
            description("connection timed out")
        }
        /// Error produced by the application codec
        Custom(err: Box<::std::error::Error + Send + Sync>) {
            description("custom error")
            display("custom error: {}", err)
            cause(&**err)
        }
    }
}

impl Error {
    /// Wrap an application error
    pub fn custom<E>(err: E) -> Error
        where E: Into<Box<::std::error::Error + Send + Sync>>
    {
        Error::Custom(err.into())
    }

    /// The status of the error page this error is answered with
    ///
    /// `None` means the connection is dropped without a response.
    pub fn status(&self) -> Option<Status> {
        use self::Error::*;
        match *self {
            Io(..) | ConnectionReset | Timeout => None,
            ChunkedRequest => Some(Status::InternalServerError),
            Custom(..) => Some(Status::InternalServerError),
            ParseError(..) | BadRequestTarget | DuplicateHost |
            BadContentLength | DuplicateContentLength |
            ConflictingBodyLength | TooManyHeaders | RequestTooLong |
            BadRequestBody(..)
                => Some(Status::BadRequest),
        }
    }
}
