//! Line framing for the IRC byte stream.
//!
//! Lines end at CR, LF or CRLF; servers disagree on which they send, so
//! every form is accepted and the empty lines a split CRLF would produce
//! are skipped. Bytes are decoded as UTF-8, replacing invalid sequences.
//!
//! Two front ends share the same scanning rules:
//! - [`LineFramer`] is sans-IO: feed it whatever the socket returned and
//!   iterate the complete lines.
//! - [`LineCodec`] is a `tokio_util` codec for `FramedRead`/`FramedWrite`.

use bytes::{Buf, BytesMut};

use crate::error::{self, ProtocolError};

/// Default maximum line length in bytes, including CRLF (RFC 2812).
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

/// Length of the CRLF terminator counted against the limit.
const TERMINATOR_LEN: usize = 2;

#[inline]
fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Pull the next non-empty line out of `buf`.
///
/// `scanned` remembers how far a previous call already searched so partial
/// lines are not rescanned on every read.
fn next_line(
    buf: &mut BytesMut,
    scanned: &mut usize,
    max_len: usize,
) -> error::Result<Option<String>> {
    let limit = max_len.saturating_sub(TERMINATOR_LEN);
    loop {
        match buf[*scanned..].iter().position(|b| is_terminator(*b)) {
            Some(offset) => {
                let line = buf.split_to(*scanned + offset);
                buf.advance(1);
                *scanned = 0;

                if line.len() > limit {
                    return Err(ProtocolError::MessageTooLong {
                        actual: line.len() + TERMINATOR_LEN,
                        limit: max_len,
                    });
                }
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            None => {
                *scanned = buf.len();
                // A partial line already past the limit can never become valid.
                if buf.len() > limit {
                    return Err(ProtocolError::MessageTooLong {
                        actual: buf.len() + TERMINATOR_LEN,
                        limit: max_len,
                    });
                }
                return Ok(None);
            }
        }
    }
}

/// Sans-IO line framer.
///
/// Buffers incomplete trailing bytes between [`feed`](LineFramer::feed)
/// calls, so the lines produced do not depend on how the stream was chunked.
///
/// # Example
///
/// ```
/// use slirc_proto::LineFramer;
///
/// let mut framer = LineFramer::new();
/// let first: Vec<_> = framer.feed(b"PING :a\r\nPRIV").collect::<Result<_, _>>().unwrap();
/// assert_eq!(first, vec!["PING :a"]);
/// let second: Vec<_> = framer.feed(b"MSG #x :hi\n").collect::<Result<_, _>>().unwrap();
/// assert_eq!(second, vec!["PRIVMSG #x :hi"]);
/// ```
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    scanned: usize,
    max_len: usize,
    failed: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a framer with the default 512-byte limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a framer with a custom maximum line length (including CRLF).
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_len,
            failed: false,
        }
    }

    /// Current maximum line length.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Change the maximum line length, e.g. after ISUPPORT `LINELEN`.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append `bytes` and iterate over every line they complete.
    ///
    /// Lines not pulled from the iterator stay buffered for the next call.
    /// After an oversized line the framer is poisoned: the stream cannot be
    /// resynchronized, so every later call yields no further lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Lines<'_> {
        if !self.failed {
            self.buf.extend_from_slice(bytes);
        }
        Lines { framer: self }
    }
}

/// Iterator over the complete lines buffered in a [`LineFramer`].
#[derive(Debug)]
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = error::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let framer = &mut *self.framer;
        if framer.failed {
            return None;
        }
        match next_line(&mut framer.buf, &mut framer.scanned, framer.max_len) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                framer.failed = true;
                framer.buf.clear();
                framer.scanned = 0;
                Some(Err(e))
            }
        }
    }
}

#[cfg(feature = "tokio")]
pub use self::codec::LineCodec;

#[cfg(feature = "tokio")]
mod codec {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{next_line, DEFAULT_MAX_LINE_LEN};
    use crate::error::{self, ProtocolError};
    use crate::message::Message;

    /// Line codec for tokio `Framed*` types.
    ///
    /// Decodes with the same rules as [`LineFramer`](super::LineFramer).
    /// Encoding appends CRLF and refuses lines with embedded terminators.
    #[derive(Debug)]
    pub struct LineCodec {
        /// Index of next byte to check for a terminator
        next_index: usize,
        /// Maximum line length, including CRLF
        max_len: usize,
    }

    impl Default for LineCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LineCodec {
        /// Create a codec with the default 512-byte limit.
        pub fn new() -> Self {
            Self::with_max_len(DEFAULT_MAX_LINE_LEN)
        }

        /// Create a codec with a custom maximum line length.
        pub fn with_max_len(max_len: usize) -> Self {
            Self {
                next_index: 0,
                max_len,
            }
        }

        /// Current maximum line length.
        pub fn max_len(&self) -> usize {
            self.max_len
        }

        /// Change the maximum line length.
        pub fn set_max_len(&mut self, max_len: usize) {
            self.max_len = max_len;
        }
    }

    impl Decoder for LineCodec {
        type Item = String;
        type Error = ProtocolError;

        fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
            next_line(src, &mut self.next_index, self.max_len)
        }

        fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
            match self.decode(src)? {
                Some(line) => Ok(Some(line)),
                None => {
                    // Peer closed mid-line; the fragment is unusable.
                    src.clear();
                    self.next_index = 0;
                    Ok(None)
                }
            }
        }
    }

    impl Encoder<String> for LineCodec {
        type Error = ProtocolError;

        fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
            <Self as Encoder<&str>>::encode(self, line.as_str(), dst)
        }
    }

    impl Encoder<&str> for LineCodec {
        type Error = ProtocolError;

        fn encode(&mut self, line: &str, dst: &mut BytesMut) -> error::Result<()> {
            if line.contains(['\r', '\n']) {
                return Err(ProtocolError::EmbeddedTerminator);
            }
            dst.reserve(line.len() + 2);
            dst.extend_from_slice(line.as_bytes());
            dst.extend_from_slice(b"\r\n");
            Ok(())
        }
    }

    impl Encoder<&Message> for LineCodec {
        type Error = ProtocolError;

        fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> error::Result<()> {
            <Self as Encoder<&str>>::encode(self, msg.to_string().as_str(), dst)
        }
    }

}
