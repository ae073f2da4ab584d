//! Batch Encoders
//!
//! Non-streaming encoders for callers that want a whole result as one
//! document instead of tagged frames.

use serde::Serialize;
use std::fmt;
use std::io::Write;

use super::binary::write_value;
use super::{CodecError, CodecResult, Encoder};

/// Text encoder producing `{"results":[...],"errors":[...],"stats":...}`.
///
/// Records are written as they arrive; errors and statistics are held
/// back until `close` and elided when absent.
pub struct SimpleEncoder<W: Write> {
    writer: W,
    header_written: bool,
    records: u64,
    errors: Vec<String>,
    stat: Option<serde_json::Value>,
    closed: bool,
}

impl<W: Write> SimpleEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
            records: 0,
            errors: Vec::new(),
            stat: None,
            closed: false,
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn check_open(&self) -> CodecResult<()> {
        if self.closed {
            Err(CodecError::Closed)
        } else {
            Ok(())
        }
    }

    fn write_header(&mut self) -> CodecResult<()> {
        if !self.header_written {
            self.header_written = true;
            self.writer.write_all(br#"{"results":["#)?;
        }
        Ok(())
    }
}

impl<W: Write> Encoder for SimpleEncoder<W> {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()> {
        self.check_open()?;
        let Some(rec) = rec else { return Ok(()) };

        self.write_header()?;
        if self.records > 0 {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, &rec).map_err(|e| CodecError::WriteFailed(e.to_string()))?;
        self.records += 1;
        Ok(())
    }

    fn encode_error<E: fmt::Display>(&mut self, err: Option<E>) -> CodecResult<()> {
        self.check_open()?;
        if let Some(err) = err {
            self.errors.push(err.to_string());
        }
        Ok(())
    }

    fn encode_stat<S: Serialize>(&mut self, stat: Option<S>) -> CodecResult<()> {
        self.check_open()?;
        if let Some(stat) = stat {
            let value = serde_json::to_value(&stat).map_err(|e| CodecError::WriteFailed(e.to_string()))?;
            self.stat = Some(value);
        }
        Ok(())
    }

    fn close(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.write_header()?;
        self.writer.write_all(b"]")?;

        if !self.errors.is_empty() {
            self.writer.write_all(br#","errors":"#)?;
            serde_json::to_writer(&mut self.writer, &self.errors)
                .map_err(|e| CodecError::WriteFailed(e.to_string()))?;
        }
        if let Some(stat) = &self.stat {
            self.writer.write_all(br#","stats":"#)?;
            serde_json::to_writer(&mut self.writer, stat).map_err(|e| CodecError::WriteFailed(e.to_string()))?;
        }

        self.writer.write_all(b"}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Text encoder producing a bare array of records.
/// Errors and statistics are discarded.
pub struct ArrayEncoder<W: Write> {
    writer: W,
    opened: bool,
    records: u64,
    closed: bool,
}

impl<W: Write> ArrayEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            opened: false,
            records: 0,
            closed: false,
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn open(&mut self) -> CodecResult<()> {
        if !self.opened {
            self.opened = true;
            self.writer.write_all(b"[")?;
        }
        Ok(())
    }
}

impl<W: Write> Encoder for ArrayEncoder<W> {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()> {
        if self.closed {
            return Err(CodecError::Closed);
        }
        let Some(rec) = rec else { return Ok(()) };

        self.open()?;
        if self.records > 0 {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, &rec).map_err(|e| CodecError::WriteFailed(e.to_string()))?;
        self.records += 1;
        Ok(())
    }

    fn encode_error<E: fmt::Display>(&mut self, _err: Option<E>) -> CodecResult<()> {
        if self.closed {
            return Err(CodecError::Closed);
        }
        Ok(())
    }

    fn encode_stat<S: Serialize>(&mut self, _stat: Option<S>) -> CodecResult<()> {
        if self.closed {
            return Err(CodecError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.open()?;
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Binary batch encoder: records as bare values as they arrive, then the
/// held-back errors and statistics on `close`. In records-only mode errors
/// and statistics are discarded.
pub struct BinaryBatchEncoder<W: Write> {
    writer: W,
    records_only: bool,
    errors: Vec<String>,
    stat: Option<Vec<u8>>,
    closed: bool,
}

impl<W: Write> BinaryBatchEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_only: false,
            errors: Vec::new(),
            stat: None,
            closed: false,
        }
    }

    pub fn records_only(writer: W) -> Self {
        Self {
            records_only: true,
            ..Self::new(writer)
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn check_open(&self) -> CodecResult<()> {
        if self.closed {
            Err(CodecError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Encoder for BinaryBatchEncoder<W> {
    fn encode_record<T: Serialize>(&mut self, rec: Option<T>) -> CodecResult<()> {
        self.check_open()?;
        match rec {
            Some(rec) => write_value(&mut self.writer, &rec),
            None => Ok(()),
        }
    }

    fn encode_error<E: fmt::Display>(&mut self, err: Option<E>) -> CodecResult<()> {
        self.check_open()?;
        if let (Some(err), false) = (err, self.records_only) {
            self.errors.push(err.to_string());
        }
        Ok(())
    }

    fn encode_stat<S: Serialize>(&mut self, stat: Option<S>) -> CodecResult<()> {
        self.check_open()?;
        if let (Some(stat), false) = (stat, self.records_only) {
            let mut buf = Vec::new();
            write_value(&mut buf, &stat)?;
            self.stat = Some(buf);
        }
        Ok(())
    }

    fn close(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        for msg in &self.errors {
            write_value(&mut self.writer, msg)?;
        }
        if let Some(stat) = &self.stat {
            self.writer.write_all(stat)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
