//! Binary Stream Codec
//!
//! Each frame is one tag byte (`0`=EOF, `1`=REC, `2`=ERR, `3`=STAT)
//! followed, except for EOF, by a MessagePack value. Structs are written
//! as maps keyed by field name so peers can decode them by name.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{self, BufReader, Read, Write};

use super::{CodecError, CodecResult, Encoder, StreamDecoder, Tag};

/// Streaming encoder of the binary format
pub struct BinaryStreamEncoder<W: Write> {
    writer: W,
    closed: bool,
}

impl<W: Write> BinaryStreamEncoder<W> {
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
        self.writer.write_all(&[tag.as_byte()])?;
        write_value(&mut self.writer, value)
    }
}

/// Write one MessagePack value, structs as named maps
pub(super) fn write_value<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> CodecResult<()> {
    rmp_serde::encode::write_named(writer, value).map_err(|e| CodecError::WriteFailed(e.to_string()))
}

impl<W: Write> Encoder for BinaryStreamEncoder<W> {
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
        self.writer.write_all(&[Tag::Eof.as_byte()])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Streaming decoder of the binary format
pub struct BinaryStreamDecoder<R: Read> {
    reader: BufReader<R>,
    pending: Option<Tag>,
}

impl<R: Read> BinaryStreamDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: None,
        }
    }
}

fn io_error(e: io::Error) -> CodecError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::UnexpectedEof
    } else {
        CodecError::ReadFailed(e.to_string())
    }
}

impl<R: Read> StreamDecoder for BinaryStreamDecoder<R> {
    fn next_tag(&mut self) -> CodecResult<Tag> {
        if self.pending.is_some() {
            return Err(CodecError::OutOfOrder("payload of the previous tag was not read"));
        }

        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte).map_err(io_error)?;

        let tag = Tag::from_byte(byte[0]).ok_or_else(|| CodecError::BadTag(format!("{:#04x}", byte[0])))?;
        if tag != Tag::Eof {
            self.pending = Some(tag);
        }
        Ok(tag)
    }

    fn next<T: DeserializeOwned>(&mut self) -> CodecResult<T> {
        if self.pending.take().is_none() {
            return Err(CodecError::OutOfOrder("no tag was read before the payload"));
        }

        rmp_serde::from_read(&mut self.reader).map_err(|e| match e {
            rmp_serde::decode::Error::InvalidMarkerRead(e) | rmp_serde::decode::Error::InvalidDataRead(e) => {
                io_error(e)
            }
            other => CodecError::PayloadDecodeFailed(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts a fixed number of bytes, then fails
    struct LimitedWriter {
        left: usize,
    }

    impl Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.left == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(self.left);
            self.left -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn encode(f: impl FnOnce(&mut BinaryStreamEncoder<Vec<u8>>)) -> Vec<u8> {
        let mut enc = BinaryStreamEncoder::new(Vec::new());
        f(&mut enc);
        enc.into_inner()
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(|enc| enc.close().unwrap()), b"\x00");
    }

    #[test]
    fn test_encode_error() {
        let out = encode(|enc| {
            enc.encode_error(None::<&str>).unwrap();
            enc.encode_error(Some("err1")).unwrap();
            enc.close().unwrap();
        });
        assert_eq!(out, b"\x02\xa4err1\x00");
    }

    #[test]
    fn test_encode_stat() {
        let out = encode(|enc| {
            enc.encode_stat(None::<u32>).unwrap();
            enc.encode_stat(Some(555)).unwrap();
            enc.close().unwrap();
        });
        assert_eq!(out, vec![0x03, 0xcd, 0x02, 0x2b, 0x00]);
    }

    #[test]
    fn test_close_twice_writes_nothing() {
        let out = encode(|enc| {
            enc.close().unwrap();
            enc.close().unwrap();
            assert_eq!(enc.encode_stat(Some(1)).unwrap_err(), CodecError::Closed);
        });
        assert_eq!(out, b"\x00");
    }

    #[test]
    fn test_bad_writer() {
        let mut enc = BinaryStreamEncoder::new(LimitedWriter { left: 3 });
        let err = enc.encode_record(Some("a long record payload")).unwrap_err();
        assert!(matches!(err, CodecError::WriteFailed(_)));
    }

    #[test]
    fn test_decode_frames() {
        let mut dec = BinaryStreamDecoder::new(&b"\x02\xa4err1\x01\xa4rec1\x03\xcd\x02\x2b\x00"[..]);

        assert_eq!(dec.next_tag().unwrap(), Tag::Err);
        assert_eq!(dec.next::<String>().unwrap(), "err1");
        assert_eq!(dec.next_tag().unwrap(), Tag::Rec);
        assert_eq!(dec.next::<String>().unwrap(), "rec1");
        assert_eq!(dec.next_tag().unwrap(), Tag::Stat);
        assert_eq!(dec.next::<u32>().unwrap(), 555);
        assert_eq!(dec.next_tag().unwrap(), Tag::Eof);
    }

    #[test]
    fn test_decode_bad_tag() {
        let mut dec = BinaryStreamDecoder::new(&b"\x07\x01"[..]);
        assert_eq!(dec.next_tag().unwrap_err(), CodecError::BadTag("0x07".to_string()));
    }

    #[test]
    fn test_decode_truncated() {
        let mut dec = BinaryStreamDecoder::new(&b""[..]);
        assert_eq!(dec.next_tag().unwrap_err(), CodecError::UnexpectedEof);

        let mut dec = BinaryStreamDecoder::new(&b"\x01\xa4re"[..]);
        dec.next_tag().unwrap();
        assert!(dec.next::<String>().is_err());

        let mut dec = BinaryStreamDecoder::new(&b"\x01"[..]);
        dec.next_tag().unwrap();
        assert_eq!(dec.next::<String>().unwrap_err(), CodecError::UnexpectedEof);
    }

    #[test]
    fn test_decode_wrong_payload_type() {
        let mut dec = BinaryStreamDecoder::new(&b"\x03\xa3abc\x00"[..]);
        dec.next_tag().unwrap();
        assert!(matches!(dec.next::<u64>(), Err(CodecError::PayloadDecodeFailed(_))));
    }
}
