//! Writing a finished [`Response`] to a transport.
//!
//! Emission sits outside the chain: a failure here is a transport failure,
//! reported as [`Error::Io`], never a dispatch failure.

use std::io::{self, Stdout, Write};

use http::header::{HeaderName, HeaderValue};
use http::{StatusCode, Version};

use crate::error::Error;
use crate::response::Response;

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Sends a response somewhere.
pub trait Emitter {
    fn emit(&mut self, response: Response) -> Result<(), Error>;
}

/// Writes a response as raw HTTP/1.x to any [`Write`].
///
/// - status line with the numeric status and reason phrase
/// - headers in their original order and case, repeated names on separate lines
/// - `content-length` when the response does not carry one and its status
///   allows a body
/// - header pairs that are not valid on the wire (CR/LF in a value, spaces in
///   a name) fail with an [`io::ErrorKind::InvalidData`] error before anything
///   is written
/// - the body in chunks of at most [`chunk_size`](Self::with_chunk_size) bytes
///
/// ```rust
/// use tether::{Emitter, Response, StreamEmitter};
///
/// let mut emitter = StreamEmitter::new(Vec::new());
/// emitter.emit(Response::text("hi")).unwrap();
///
/// let wire = String::from_utf8(emitter.into_inner()).unwrap();
/// assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(wire.ends_with("\r\n\r\nhi"));
/// ```
pub struct StreamEmitter<W> {
    writer: W,
    chunk_size: usize,
}

impl StreamEmitter<Stdout> {
    /// Emitter used by [`Server`](crate::Server) unless told otherwise.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> StreamEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, chunk_size: DEFAULT_CHUNK_SIZE }
    }

    /// Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_head(&mut self, response: &Response) -> io::Result<()> {
        for (name, value) in response.headers() {
            check_header(name, value)?;
        }

        let version = if response.version() == Version::HTTP_10 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        };
        let status = response.status_code().as_u16();
        match response.reason() {
            "" => write!(self.writer, "{version} {status}\r\n")?,
            reason => write!(self.writer, "{version} {status} {reason}\r\n")?,
        }

        if allows_body(response.status_code()) && response.header("content-length").is_none() {
            write!(self.writer, "content-length: {}\r\n", response.body().len())?;
        }
        for (name, value) in response.headers() {
            write!(self.writer, "{name}: {value}\r\n")?;
        }
        self.writer.write_all(b"\r\n")
    }
}

fn check_header(name: &str, value: &str) -> io::Result<()> {
    let invalid = |what: &str| {
        io::Error::new(io::ErrorKind::InvalidData, format!("invalid header {what}: {name:?}"))
    };
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid("name"))?;
    HeaderValue::from_str(value).map_err(|_| invalid("value"))?;
    Ok(())
}

/// 1xx, 204 and 304 responses never carry a body or a `content-length`.
fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

impl<W: Write> Emitter for StreamEmitter<W> {
    fn emit(&mut self, response: Response) -> Result<(), Error> {
        self.write_head(&response)?;
        for chunk in response.body().chunks(self.chunk_size) {
            self.writer.write_all(chunk)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    /// Records every `write` call so chunking is observable.
    #[derive(Default)]
    struct Recorder {
        writes: Vec<Vec<u8>>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn emit(response: Response) -> String {
        let mut emitter = StreamEmitter::new(Vec::new());
        emitter.emit(response).unwrap();
        String::from_utf8(emitter.into_inner()).unwrap()
    }

    #[test]
    fn preserves_header_case_and_repeats() {
        let wire = emit(
            Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("WWW-Authenticate", "Bearer")
                .header("Set-Cookie", "a=1")
                .header("Set-Cookie", "b=2")
                .no_body(),
        );

        assert_eq!(
            wire,
            "HTTP/1.1 401 Unauthorized\r\n\
             content-length: 0\r\n\
             WWW-Authenticate: Bearer\r\n\
             Set-Cookie: a=1\r\n\
             Set-Cookie: b=2\r\n\
             \r\n",
        );
    }

    #[test]
    fn custom_reason_and_explicit_length() {
        let wire = emit(
            Response::builder()
                .reason("Fine")
                .header("Content-Length", "2")
                .bytes(crate::ContentType::OctetStream, &b"hi"[..]),
        );

        assert!(wire.starts_with("HTTP/1.1 200 Fine\r\n"));
        assert_eq!(wire.to_ascii_lowercase().matches("content-length").count(), 1);
    }

    #[test]
    fn rejects_header_values_that_split_the_response() {
        let mut res = Response::text("ok");
        res.append_header("X-Echo", "a\r\nSet-Cookie: evil=1");

        let mut emitter = StreamEmitter::new(Vec::new());
        let err = emitter.emit(res).err().unwrap();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::InvalidData));
        assert!(emitter.into_inner().is_empty());
    }

    #[test]
    fn rejects_invalid_header_names() {
        let res = Response::builder().header("Bad Name", "x").no_body();
        let err = StreamEmitter::new(Vec::new()).emit(res).err().unwrap();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[test]
    fn bodiless_statuses_get_no_content_length() {
        for status in [StatusCode::CONTINUE, StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED] {
            let wire = emit(Response::status(status));
            assert!(!wire.to_ascii_lowercase().contains("content-length"), "{status}: {wire}");
        }
        assert!(emit(Response::status(StatusCode::NOT_FOUND)).contains("content-length: 0\r\n"));
    }

    #[test]
    fn body_is_written_in_chunks() {
        let mut emitter = StreamEmitter::new(Recorder::default()).with_chunk_size(4);
        emitter.emit(Response::text("0123456789")).unwrap();

        let writes = emitter.into_inner().writes;
        let body: Vec<_> = writes.iter().rev().take(3).rev().cloned().collect();
        assert_eq!(body, [b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
    }
}
