//! RESP (REdis Serialization Protocol) encoding and decoding.
//!
//! Decoding is a recursive descent over a byte cursor that produces a typed
//! [`RespValue`] tree. Two entry points exist:
//!
//! - [`RespValue::parse`] decodes a whole buffer and treats a truncated unit
//!   as a protocol error.
//! - [`RespValue::parse_frame`] works on a growing [`BytesMut`] read buffer and
//!   reports a truncated unit as "not yet complete" instead.
//!
//! The snapshot block sent after `FULLRESYNC` is not a regular bulk string (it
//! has no trailing line terminator), so it gets its own pair of functions.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Deepest array nesting a decoded unit may have.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Largest snapshot block a replica accepts from its primary.
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum RespError {
    #[error("unknown RESP type byte 0x{0:02x}")]
    UnknownRespType(u8),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("arrays nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("snapshot of {0} bytes exceeds the size limit")]
    SnapshotTooLarge(usize),
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR Protocol error: {}", self)).encode()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds a command array out of plain arguments, e.g. `["PING"]`.
    pub fn command<I, S>(arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            arguments
                .into_iter()
                .map(|argument| RespValue::BulkString(argument.into()))
                .collect(),
        )
    }

    /// Decodes every unit contained in `input`, left to right.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<RespValue>)` - One value per top-level unit
    /// * `Err(RespError)` - If any unit is malformed or cut short
    ///
    /// # Examples
    ///
    /// ```
    /// use mirrorkv::resp::RespValue;
    ///
    /// let values = RespValue::parse(b"*1\r\n$4\r\nPING\r\n").unwrap();
    /// assert_eq!(values, vec![RespValue::command(["PING"])]);
    /// ```
    pub fn parse(input: &[u8]) -> Result<Vec<RespValue>, RespError> {
        let mut parser = Parser::new(input);
        let mut values = Vec::new();

        while !parser.is_at_end() {
            values.push(parser.read_value(0)?);
        }

        Ok(values)
    }

    /// Decodes one unit from the front of `buffer`.
    ///
    /// Returns `Ok(None)` without touching the buffer when it holds only part
    /// of a unit. On success exactly the bytes of the decoded unit are consumed.
    pub fn parse_frame(buffer: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        if buffer.is_empty() {
            return Ok(None);
        }

        let mut parser = Parser::new(&buffer[..]);

        match parser.read_value(0) {
            Ok(value) => {
                let consumed = parser.position;
                buffer.advance(consumed);
                Ok(Some(value))
            }
            Err(RespError::UnexpectedEnd) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes a `$<len>\r\n<raw bytes>` snapshot block from the front of `buffer`.
    ///
    /// Returns `Ok(None)` while the block is incomplete. A header declaring more
    /// than [`MAX_SNAPSHOT_SIZE`] bytes is rejected before any payload is buffered.
    pub fn parse_snapshot(buffer: &mut BytesMut) -> Result<Option<Bytes>, RespError> {
        if buffer.is_empty() {
            return Ok(None);
        }

        let mut parser = Parser::new(&buffer[..]);

        let length = match parser.read_snapshot_header() {
            Ok(length) => length,
            Err(RespError::UnexpectedEnd) => return Ok(None),
            Err(e) => return Err(e),
        };
        let header_length = parser.position;

        if buffer.len() < header_length + length {
            return Ok(None);
        }

        buffer.advance(header_length);
        Ok(Some(buffer.split_to(length).freeze()))
    }

    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(s) => format!("-{}\r\n", s),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::Null => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());

                for element in elements {
                    encoded.push_str(&element.encode());
                }

                encoded
            }
        }
    }

    /// Encodes a raw payload as a length-prefixed block without a trailing `\r\n`.
    pub fn encode_snapshot(payload: &[u8]) -> Vec<u8> {
        let mut encoded = format!("${}\r\n", payload.len()).into_bytes();
        encoded.extend_from_slice(payload);
        encoded
    }
}

struct Parser<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// `depth` counts the arrays enclosing the value being read.
    fn read_value(&mut self, depth: usize) -> Result<RespValue, RespError> {
        let marker = self.read_marker()?;

        match marker {
            b'+' => Ok(RespValue::SimpleString(self.read_text()?)),
            b'-' => Ok(RespValue::Error(self.read_text()?)),
            b':' => Ok(RespValue::Integer(self.read_integer()?)),
            b'$' => self.read_bulk_string(),
            b'*' => self.read_array(depth),
            other => Err(RespError::UnknownRespType(other)),
        }
    }

    fn read_marker(&mut self) -> Result<u8, RespError> {
        let Some(&marker) = self.input.get(self.position) else {
            return Err(RespError::UnexpectedEnd);
        };

        self.position += 1;
        Ok(marker)
    }

    fn read_line(&mut self) -> Result<&'a [u8], RespError> {
        let rest = &self.input[self.position..];
        let end = rest
            .windows(2)
            .position(|window| window == CRLF)
            .ok_or(RespError::UnexpectedEnd)?;

        self.position += end + CRLF.len();
        Ok(&rest[..end])
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], RespError> {
        let end = self
            .position
            .checked_add(count)
            .ok_or(RespError::UnexpectedEnd)?;

        if end > self.input.len() {
            return Err(RespError::UnexpectedEnd);
        }

        let bytes = &self.input[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_text(&mut self) -> Result<String, RespError> {
        let line = self.read_line()?;
        String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
    }

    fn read_integer(&mut self) -> Result<i64, RespError> {
        let line = self.read_line()?;

        std::str::from_utf8(line)
            .ok()
            .and_then(|digits| digits.parse::<i64>().ok())
            .ok_or(RespError::FailedToParseInteger)
    }

    /// `None` stands for the `-1` null length.
    fn read_length(&mut self) -> Result<Option<usize>, RespError> {
        match self.read_integer()? {
            -1 => Ok(None),
            length if length < 0 => Err(RespError::InvalidLength(length)),
            length => usize::try_from(length)
                .map(Some)
                .map_err(|_| RespError::InvalidLength(length)),
        }
    }

    fn read_bulk_string(&mut self) -> Result<RespValue, RespError> {
        let Some(length) = self.read_length()? else {
            return Ok(RespValue::Null);
        };

        let payload = self.take(length)?;

        if self.take(CRLF.len())? != CRLF {
            return Err(RespError::InvalidBulkString);
        }

        String::from_utf8(payload.to_vec())
            .map(RespValue::BulkString)
            .map_err(|_| RespError::InvalidUtf8)
    }

    fn read_array(&mut self, depth: usize) -> Result<RespValue, RespError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(RespError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        let Some(length) = self.read_length()? else {
            return Ok(RespValue::Null);
        };

        // Capacity is capped so a bogus header cannot force a huge allocation.
        let mut elements = Vec::with_capacity(length.min(64));

        for _ in 0..length {
            elements.push(self.read_value(depth + 1)?);
        }

        Ok(RespValue::Array(elements))
    }

    fn read_snapshot_header(&mut self) -> Result<usize, RespError> {
        let length = match self.read_marker()? {
            b'$' => self.read_length()?.ok_or(RespError::InvalidLength(-1))?,
            other => return Err(RespError::UnknownRespType(other)),
        };

        if length > MAX_SNAPSHOT_SIZE {
            return Err(RespError::SnapshotTooLarge(length));
        }

        Ok(length)
    }
}
