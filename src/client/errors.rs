use std::io;

use httparse::Error as HttpError;
use httparse::InvalidChunkSize;


quick_error! {
    /// Client request error
    #[derive(Debug)]
    pub enum Error {
        /// Only `http` and `ws` URLs connect directly; `https`/`wss`
        /// need a TLS transport wired in by the embedding program
        UnsupportedScheme {
            description("scheme of this url is not supported")
        }
        /// The URL didn't parse, even after percent-encoding it
        InvalidUrl {
            description("invalid url")
        }
        /// The host resolved to no address at all
        NameNotFound {
            description("name resolved to no addresses")
        }
        /// I/O (networking, resolving) failure during the request
        Io(err: io::Error) {
            description("IO error")
            display("IO error: {}", err)
            from()
        }
        /// Malformed response headers
        Header(err: HttpError) {
            description("bad headers")
            display("bad headers: {}", err)
            from()
        }
        /// Malformed chunk in a chunked response
        ChunkSize(err: InvalidChunkSize) {
            description("invalid chunk size")
            display("invalid chunk size: {}", err)
            from()
        }
        /// Unparseable `Content-Length` in the response
        BadContentLength {
            description("bad content length")
        }
        /// Duplicate `Content-Length` in the response
        DuplicateContentLength {
            description("duplicate content length")
        }
        /// Response body larger than the buffering limit
        ResponseBodyTooLong {
            description("response body too long")
        }
        /// Connection reset while reading response headers
        ResetOnResponseHeaders {
            description("connection closed prematurely while reading \
                headers")
        }
        /// Connection reset while reading the response body
        ResetOnResponseBody {
            description("connection closed prematurely while reading body")
        }
        /// Bytes arrived on a connection with no request in flight
        PrematureResponseHeaders {
            description("response headers received before the request \
                was sent")
        }
        /// A request was pushed while another one is still in flight
        Busy {
            description("connection is busy with another request")
        }
        /// The per-request deadline fired
        TimedOut {
            description("request timed out")
        }
        /// The response channel was dropped before a response arrived
        Canceled {
            description("request canceled")
        }
        /// Connection closed normally (idle too long, or the response
        /// carried `Connection: close`)
        ///
        /// Connection pools catch this one and retire the client; it is
        /// not an error of the request itself.
        Closed {
            description("connection closed normally")
        }
        /// Every connect attempt (and retry) to the host failed
        ConnectionRefused {
            description("connection refused")
        }
    }
}
