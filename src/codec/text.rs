//! Text Stream Codec
//!
//! Frames are a quoted tag followed by a JSON value:
//!
//! ```text
//! "rec" {"_index":{...},"raw":"..."}
//! "err" "message"
//! "stat" {"matches":10,...}
//! "end"
//! ```
//!
//! Any JSON whitespace may separate frames.

use serde::de::{Deserialize, DeserializeOwned};
use serde::Serialize;
use serde_json::de::IoRead;
use serde_json::Value;
use std::fmt;
use std::io::{BufReader, Read, Write};

use super::{CodecError, CodecResult, Encoder, StreamDecoder, Tag};

/// Streaming encoder of the text format
pub struct TextStreamEncoder<W: Write> {
    writer: W,
    closed: bool,
}

impl<W: Write> TextStreamEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            closed: false,
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn frame<T: Serialize + ?Sized>(&mut self, tag: Tag, value: &T) -> CodecResult<()> {
        if self.closed {
            return Err(CodecError::Closed);
        }
        write!(self.writer, "\"{}\" ", tag.as_str())?;
        serde_json::to_writer(&mut self.writer, value)
            .map_err(|e| CodecError::WriteFailed(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> Encoder for TextStreamEncoder<W> {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()> {
        match rec {
            Some(rec) => self.frame(Tag::Rec, &rec),
            None => Ok(()),
        }
    }

    fn encode_error<E: fmt::Display>(&mut self, err: Option<E>) -> CodecResult<()> {
        match err {
            Some(err) => self.frame(Tag::Err, &err.to_string()),
            None => Ok(()),
        }
    }

    fn encode_stat<S: Serialize>(&mut self, stat: Option<S>) -> CodecResult<()> {
        match stat {
            Some(stat) => self.frame(Tag::Stat, &stat),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        write!(self.writer, "\"{}\"", Tag::Eof.as_str())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Streaming decoder of the text format
pub struct TextStreamDecoder<R: Read> {
    de: serde_json::Deserializer<IoRead<BufReader<R>>>,
    pending: Option<Tag>,
}

impl<R: Read> TextStreamDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            de: serde_json::Deserializer::from_reader(BufReader::new(reader)),
            pending: None,
        }
    }
}

fn read_error(e: &serde_json::Error) -> Option<CodecError> {
    if e.is_eof() {
        Some(CodecError::UnexpectedEof)
    } else if e.is_io() {
        Some(CodecError::ReadFailed(e.to_string()))
    } else {
        None
    }
}

impl<R: Read> StreamDecoder for TextStreamDecoder<R> {
    fn next_tag(&mut self) -> CodecResult<Tag> {
        if self.pending.is_some() {
            return Err(CodecError::OutOfOrder("payload of the previous tag was not read"));
        }

        let value = Value::deserialize(&mut self.de)
            .map_err(|e| read_error(&e).unwrap_or_else(|| CodecError::BadTag(format!("malformed tag ({})", e))))?;

        let tag = match &value {
            Value::String(s) => Tag::from_name(s),
            _ => None,
        }
        .ok_or_else(|| CodecError::BadTag(value.to_string()))?;

        if tag != Tag::Eof {
            self.pending = Some(tag);
        }
        Ok(tag)
    }

    fn next<T: DeserializeOwned>(&mut self) -> CodecResult<T> {
        if self.pending.take().is_none() {
            return Err(CodecError::OutOfOrder("no tag was read before the payload"));
        }

        T::deserialize(&mut self.de)
            .map_err(|e| read_error(&e).unwrap_or_else(|| CodecError::PayloadDecodeFailed(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(f: impl FnOnce(&mut TextStreamEncoder<Vec<u8>>)) -> String {
        let mut enc = TextStreamEncoder::new(Vec::new());
        f(&mut enc);
        String::from_utf8(enc.into_inner()).unwrap()
    }

    #[test]
    fn test_encode_empty() {
        let out = encode(|enc| enc.close().unwrap());
        assert_eq!(out, r#""end""#);
    }

    #[test]
    fn test_encode_frames() {
        let out = encode(|enc| {
            enc.encode_record(None::<&str>).unwrap();
            enc.encode_error(Some("err1")).unwrap();
            enc.encode_record(Some("rec1")).unwrap();
            enc.encode_stat(Some(555)).unwrap();
            enc.close().unwrap();
        });
        assert_eq!(out, "\"err\" \"err1\"\n\"rec\" \"rec1\"\n\"stat\" 555\n\"end\"");
    }

    #[test]
    fn test_close_twice_writes_nothing() {
        let mut enc = TextStreamEncoder::new(Vec::new());
        enc.close().unwrap();
        let len = enc.get_mut().len();
        enc.close().unwrap();
        assert_eq!(enc.get_mut().len(), len);

        let err = enc.encode_record(Some(1)).unwrap_err();
        assert_eq!(err, CodecError::Closed);
    }

    #[test]
    fn test_decode_mixed() {
        let input = r#""err" "err1" "rec" "rec1" "rec" "rec2" "stat" 555 "end""#;
        let mut dec = TextStreamDecoder::new(input.as_bytes());

        assert_eq!(dec.next_tag().unwrap(), Tag::Err);
        assert_eq!(dec.next::<String>().unwrap(), "err1");
        assert_eq!(dec.next_tag().unwrap(), Tag::Rec);
        assert_eq!(dec.next::<String>().unwrap(), "rec1");
        assert_eq!(dec.next_tag().unwrap(), Tag::Rec);
        assert_eq!(dec.next::<String>().unwrap(), "rec2");
        assert_eq!(dec.next_tag().unwrap(), Tag::Stat);
        assert_eq!(dec.next::<u32>().unwrap(), 555);
        assert_eq!(dec.next_tag().unwrap(), Tag::Eof);
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        let input = "\n\t \"rec\"\n\n  1  \r\n\"end\"\n";
        let mut dec = TextStreamDecoder::new(input.as_bytes());

        assert_eq!(dec.next_tag().unwrap(), Tag::Rec);
        assert_eq!(dec.next::<u8>().unwrap(), 1);
        assert_eq!(dec.next_tag().unwrap(), Tag::Eof);
    }

    #[test]
    fn test_decode_bad_tag() {
        let mut dec = TextStreamDecoder::new(r#""bad" 1 "end""#.as_bytes());
        assert_eq!(dec.next_tag().unwrap_err(), CodecError::BadTag(r#""bad""#.to_string()));

        let mut dec = TextStreamDecoder::new(r#"42 "end""#.as_bytes());
        assert_eq!(dec.next_tag().unwrap_err(), CodecError::BadTag("42".to_string()));
    }

    #[test]
    fn test_decode_truncated() {
        let mut dec = TextStreamDecoder::new(r#""rec" "rec1" "#.as_bytes());
        assert_eq!(dec.next_tag().unwrap(), Tag::Rec);
        dec.next::<String>().unwrap();
        assert_eq!(dec.next_tag().unwrap_err(), CodecError::UnexpectedEof);

        let mut dec = TextStreamDecoder::new(r#""rec" {"a":"#.as_bytes());
        dec.next_tag().unwrap();
        assert_eq!(dec.next::<Value>().unwrap_err(), CodecError::UnexpectedEof);
    }

    #[test]
    fn test_decode_wrong_payload_type() {
        let mut dec = TextStreamDecoder::new(r#""stat" "not a number" "end""#.as_bytes());
        dec.next_tag().unwrap();
        assert!(matches!(dec.next::<u64>(), Err(CodecError::PayloadDecodeFailed(_))));
    }

    #[test]
    fn test_strict_alternation() {
        let mut dec = TextStreamDecoder::new(r#""rec" 1 "rec" 2 "end""#.as_bytes());
        assert!(matches!(dec.next::<u8>(), Err(CodecError::OutOfOrder(_))));

        dec.next_tag().unwrap();
        assert!(matches!(dec.next_tag(), Err(CodecError::OutOfOrder(_))));
    }
}
