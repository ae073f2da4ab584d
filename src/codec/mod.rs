//! Wire Codecs
//!
//! Tag-framed streaming codecs in two wire formats plus batch encoders
//! that wrap a whole result in one document.
//!
//! ```text
//!   format   stream frame              end       batch variants
//!   text     "rec" <json>              "end"     simple {results,errors,stats}
//!                                                array  [records]
//!   binary   0x01 <msgpack>            0x00      simple records.. errors.. stat
//!                                                records-only
//! ```
//!
//! Encoders are synchronous and write into any `std::io::Write`; decoders
//! read from any `std::io::Read`.

mod batch;
mod binary;
mod error;
mod text;

pub use batch::{ArrayEncoder, BinaryBatchEncoder, SimpleEncoder};
pub use binary::{BinaryStreamDecoder, BinaryStreamEncoder};
pub use error::{CodecError, CodecResult};
pub use text::{TextStreamDecoder, TextStreamEncoder};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

/// MIME type of the text format
pub const MIME_JSON: &str = "application/json";

/// MIME type of the binary format
pub const MIME_MSGPACK: &str = "application/msgpack";

/// Legacy MIME type of the binary format
pub const MIME_X_MSGPACK: &str = "application/x-msgpack";

/// Frame discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Eof,
    Rec,
    Err,
    Stat,
}

impl Tag {
    /// Discriminator in the binary format
    pub fn as_byte(self) -> u8 {
        match self {
            Tag::Eof => 0,
            Tag::Rec => 1,
            Tag::Err => 2,
            Tag::Stat => 3,
        }
    }

    pub fn from_byte(b: u8) -> Option<Tag> {
        match b {
            0 => Some(Tag::Eof),
            1 => Some(Tag::Rec),
            2 => Some(Tag::Err),
            3 => Some(Tag::Stat),
            _ => None,
        }
    }

    /// Discriminator in the text format
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Eof => "end",
            Tag::Rec => "rec",
            Tag::Err => "err",
            Tag::Stat => "stat",
        }
    }

    pub fn from_name(s: &str) -> Option<Tag> {
        match s {
            "end" => Some(Tag::Eof),
            "rec" => Some(Tag::Rec),
            "err" => Some(Tag::Err),
            "stat" => Some(Tag::Stat),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes records, errors and statistics. Absent values are skipped.
pub trait Encoder {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()>;
    fn encode_error<E: fmt::Display>(&mut self, err: Option<E>) -> CodecResult<()>;
    fn encode_stat<S: Serialize>(&mut self, stat: Option<S>) -> CodecResult<()>;

    /// Terminate the output. A second call writes nothing.
    fn close(&mut self) -> CodecResult<()>;
}

/// Reads `(tag, payload)` frames in strict alternation
pub trait StreamDecoder {
    /// Read the next tag. No payload follows `Tag::Eof`.
    fn next_tag(&mut self) -> CodecResult<Tag>;

    /// Decode the payload of the tag just read
    fn next<T: DeserializeOwned>(&mut self) -> CodecResult<T>;
}

// ============================================================================
// Format selection
// ============================================================================

/// Wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Msgpack,
}

impl Format {
    /// Pick a format from an `Accept` or `Content-Type` header value.
    /// Anything that does not name the binary format is text.
    pub fn from_mime(mime: &str) -> Format {
        let binary = mime.split(',').any(|part| {
            let media = part.split(';').next().unwrap_or("").trim();
            media.eq_ignore_ascii_case(MIME_MSGPACK) || media.eq_ignore_ascii_case(MIME_X_MSGPACK)
        });
        if binary {
            Format::Msgpack
        } else {
            Format::Json
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Format::Json => MIME_JSON,
            Format::Msgpack => MIME_MSGPACK,
        }
    }
}

/// Document shape produced by an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Tag-framed stream
    Stream,
    /// One document holding records, errors and statistics
    Simple,
    /// Records only
    Array,
}

/// Encoder chosen at runtime
pub enum AnyEncoder<W: Write> {
    TextStream(TextStreamEncoder<W>),
    BinaryStream(BinaryStreamEncoder<W>),
    Simple(SimpleEncoder<W>),
    Array(ArrayEncoder<W>),
    BinaryBatch(BinaryBatchEncoder<W>),
}

impl<W: Write> AnyEncoder<W> {
    pub fn new(format: Format, layout: Layout, writer: W) -> Self {
        match (format, layout) {
            (Format::Json, Layout::Stream) => AnyEncoder::TextStream(TextStreamEncoder::new(writer)),
            (Format::Json, Layout::Simple) => AnyEncoder::Simple(SimpleEncoder::new(writer)),
            (Format::Json, Layout::Array) => AnyEncoder::Array(ArrayEncoder::new(writer)),
            (Format::Msgpack, Layout::Stream) => {
                AnyEncoder::BinaryStream(BinaryStreamEncoder::new(writer))
            }
            (Format::Msgpack, Layout::Simple) => {
                AnyEncoder::BinaryBatch(BinaryBatchEncoder::new(writer))
            }
            (Format::Msgpack, Layout::Array) => {
                AnyEncoder::BinaryBatch(BinaryBatchEncoder::records_only(writer))
            }
        }
    }

    /// Underlying writer
    pub fn get_mut(&mut self) -> &mut W {
        match self {
            AnyEncoder::TextStream(e) => e.get_mut(),
            AnyEncoder::BinaryStream(e) => e.get_mut(),
            AnyEncoder::Simple(e) => e.get_mut(),
            AnyEncoder::Array(e) => e.get_mut(),
            AnyEncoder::BinaryBatch(e) => e.get_mut(),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $e:ident => $call:expr) => {
        match $self {
            AnyEncoder::TextStream($e) => $call,
            AnyEncoder::BinaryStream($e) => $call,
            AnyEncoder::Simple($e) => $call,
            AnyEncoder::Array($e) => $call,
            AnyEncoder::BinaryBatch($e) => $call,
        }
    };
}

impl<W: Write> Encoder for AnyEncoder<W> {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()> {
        dispatch!(self, e => e.encode_record(rec))
    }

    fn encode_error<E: fmt::Display>(&mut self, err: Option<E>) -> CodecResult<()> {
        dispatch!(self, e => e.encode_error(err))
    }

    fn encode_stat<S: Serialize>(&mut self, stat: Option<S>) -> CodecResult<()> {
        dispatch!(self, e => e.encode_stat(stat))
    }

    fn close(&mut self) -> CodecResult<()> {
        dispatch!(self, e => e.close())
    }
}

/// Decoder chosen at runtime
pub enum AnyDecoder<R: Read> {
    Text(TextStreamDecoder<R>),
    Binary(BinaryStreamDecoder<R>),
}

impl<R: Read> AnyDecoder<R> {
    pub fn new(format: Format, reader: R) -> Self {
        match format {
            Format::Json => AnyDecoder::Text(TextStreamDecoder::new(reader)),
            Format::Msgpack => AnyDecoder::Binary(BinaryStreamDecoder::new(reader)),
        }
    }
}

impl<R: Read> StreamDecoder for AnyDecoder<R> {
    fn next_tag(&mut self) -> CodecResult<Tag> {
        match self {
            AnyDecoder::Text(d) => d.next_tag(),
            AnyDecoder::Binary(d) => d.next_tag(),
        }
    }

    fn next<T: DeserializeOwned>(&mut self) -> CodecResult<T> {
        match self {
            AnyDecoder::Text(d) => d.next(),
            AnyDecoder::Binary(d) => d.next(),
        }
    }
}
