use std::io;
use std::fmt;
use std::error::Error as StdError;

use httparse;

/// Websocket error, for both client and server sessions
pub struct Error(ErrorEnum);


quick_error! {
    #[derive(Debug)]
    pub enum ErrorEnum {
        /// Socket IO error
        Io(err: io::Error) {
            description("IO error")
            display("IO error: {}", err)
            from()
        }
        /// Error when polling timeout future (unreachable)
        Timeout {
            description("timeout error (unreachable)")
        }
        /// Text message is not well-formed UTF-8
        InvalidUtf8 {
            description("text frame is not valid utf-8")
        }
        /// Frame with an opcode we don't recognize
        InvalidOpcode(code: u8) {
            description("invalid frame opcode")
            display("invalid frame opcode: {}", code)
        }
        /// Reserved bits are set but no extension was negotiated
        ReservedBits {
            description("reserved frame bits are set")
        }
        /// The mask bit contradicts the direction of the frame
        BadMask {
            description("frame masked in the wrong direction")
        }
        /// Control frame that is fragmented or longer than 125 bytes
        BadControlFrame {
            description("malformed control frame")
        }
        /// Continuation frame without a message in progress, or a new
        /// data frame in the middle of a fragmented message
        BadContinuation {
            description("unexpected continuation frame")
        }
        /// Frame (or assembled message) longer than the configured limit
        TooLong {
            description("frame is too long")
        }
        /// Connection closed while a frame or handshake was expected
        Closed {
            description("connection closed prematurely")
        }
        /// Error parsing handshake response headers
        HeaderError(err: httparse::Error) {
            description("parse error")
            display("parse error: {:?}", err)
            from()
        }
        /// Server did not accept the websocket handshake
        HandshakeFailed(code: u16) {
            description("handshake rejected")
            display("handshake rejected with status {}", code)
        }
        Custom(err: Box<::std::error::Error + Send + Sync>) {
            description("custom error")
            display("custom error: {}", err)
            cause(&**err)
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl From<ErrorEnum> for Error {
    fn from(err: ErrorEnum) -> Self {
        Error(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error(ErrorEnum::Io(err))
    }
}

impl ::std::error::Error for Error {
    fn description(&self) -> &str {
        self.0.description()
    }
    fn cause(&self) -> Option<&::std::error::Error> {
        self.0.cause()
    }
}

impl Error {
    /// Wrap an application error
    pub fn custom<E>(err: E) -> Error
        where E: Into<Box<::std::error::Error + Send + Sync>>
    {
        Error(ErrorEnum::Custom(err.into()))
    }
}

#[test]
fn send_sync() {
    fn send_sync<T: Send+Sync>(_: T) {}
    send_sync(Error::from(ErrorEnum::TooLong));
}
