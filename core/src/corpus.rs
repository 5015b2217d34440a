//! Stream corpus records and the forward-only reader over their binary framing.
//!
//! Each record is a self-delimited struct (StreamItem v0.3 layout). Only the
//! fields needed for indexing are materialized; everything else is skipped
//! structurally:
//!
//! ```text
//! StreamItem
//!   2  doc_id        binary   (fallback identifier)
//!   7  body          struct   ContentItem { 5: clean_visible binary }
//!   9  stream_id     binary   (record identifier)
//!   10 stream_time   struct   StreamTime { 1: epoch_ticks double }
//! ```

use crate::compress::{detect_and_wrap, Compression};
use crate::error::{Error, Result};
use crate::thrift::{BinaryReader, BinaryWriter, FrameError, FrameResult, TType};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

const FIELD_VERSION: i16 = 1;
const FIELD_DOC_ID: i16 = 2;
const FIELD_BODY: i16 = 7;
const FIELD_STREAM_ID: i16 = 9;
const FIELD_STREAM_TIME: i16 = 10;
const BODY_CLEAN_VISIBLE: i16 = 5;
const TIME_EPOCH_TICKS: i16 = 1;
const VERSION_V0_3_0: i32 = 2;

/// One decoded corpus unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusRecord {
    pub id: String,
    /// Epoch ticks truncated to whole seconds.
    pub timestamp: Option<i64>,
    /// Cleaned visible text. `None` means the record cannot be indexed.
    pub body: Option<String>,
}

/// Result of one read attempt on a record stream.
#[derive(Debug)]
pub enum ReadOutcome {
    Record(CorpusRecord),
    /// Input ended cleanly between records.
    EndOfStream,
    /// Truncated or corrupt record; the stream cannot continue.
    DecodeError(Error),
}

/// Lazily decodes records one at a time from a byte stream.
///
/// Not restartable: after `EndOfStream` or a decode error every further call
/// returns `EndOfStream`.
pub struct RecordReader<R> {
    reader: BinaryReader<R>,
    records: u64,
    finished: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(stream: R) -> Self {
        Self { reader: BinaryReader::new(stream), records: 0, finished: false }
    }

    /// Records successfully decoded so far.
    pub fn records_read(&self) -> u64 { self.records }

    pub fn next_record(&mut self) -> ReadOutcome {
        if self.finished {
            return ReadOutcome::EndOfStream;
        }
        match self.reader.at_eof() {
            Ok(true) => {
                self.finished = true;
                return ReadOutcome::EndOfStream;
            }
            Ok(false) => {}
            Err(e) => {
                self.finished = true;
                return ReadOutcome::DecodeError(Error::Io(e));
            }
        }
        let start = self.reader.offset();
        match read_stream_item(&mut self.reader) {
            Ok(record) => {
                self.records += 1;
                ReadOutcome::Record(record)
            }
            Err(err) => {
                self.finished = true;
                let record = self.records;
                ReadOutcome::DecodeError(match err {
                    FrameError::Eof => Error::TruncatedRecord { record, offset: start },
                    FrameError::Corrupt(detail) => Error::CorruptRecord { record, offset: start, detail },
                    FrameError::Io(e) => Error::Io(e),
                })
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<CorpusRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            ReadOutcome::Record(record) => Some(Ok(record)),
            ReadOutcome::EndOfStream => None,
            ReadOutcome::DecodeError(err) => Some(Err(err)),
        }
    }
}

/// Open a corpus file, unwrapping any recognized compression.
pub fn open_corpus(path: &Path) -> Result<(Compression, RecordReader<Box<dyn BufRead + Send>>)> {
    let file = File::open(path)?;
    let (compression, stream) = detect_and_wrap(file)?;
    Ok((compression, RecordReader::new(stream)))
}

fn read_stream_item<R: BufRead>(r: &mut BinaryReader<R>) -> FrameResult<CorpusRecord> {
    let mut stream_id = None;
    let mut doc_id = None;
    let mut timestamp = None;
    let mut body = None;
    while let Some((ttype, id)) = r.read_field_header()? {
        match (id, ttype) {
            (FIELD_STREAM_ID, TType::Binary) => stream_id = Some(r.read_string()?),
            (FIELD_DOC_ID, TType::Binary) => doc_id = Some(r.read_string()?),
            (FIELD_BODY, TType::Struct) => body = read_clean_visible(r)?,
            (FIELD_STREAM_TIME, TType::Struct) => timestamp = read_epoch_ticks(r)?,
            _ => r.skip(ttype, 1)?,
        }
    }
    let id = stream_id
        .or(doc_id)
        .ok_or_else(|| FrameError::Corrupt("record carries neither stream_id nor doc_id".into()))?;
    Ok(CorpusRecord { id, timestamp, body })
}

fn read_clean_visible<R: BufRead>(r: &mut BinaryReader<R>) -> FrameResult<Option<String>> {
    let mut text = None;
    while let Some((ttype, id)) = r.read_field_header()? {
        match (id, ttype) {
            (BODY_CLEAN_VISIBLE, TType::Binary) => text = Some(r.read_string()?),
            _ => r.skip(ttype, 2)?,
        }
    }
    Ok(text)
}

fn read_epoch_ticks<R: BufRead>(r: &mut BinaryReader<R>) -> FrameResult<Option<i64>> {
    let mut ticks = None;
    while let Some((ttype, id)) = r.read_field_header()? {
        match (id, ttype) {
            (TIME_EPOCH_TICKS, TType::Double) => ticks = Some(r.read_double()? as i64),
            _ => r.skip(ttype, 2)?,
        }
    }
    Ok(ticks)
}

/// Append one record in the same framing the reader consumes.
pub fn write_record<W: Write>(out: W, record: &CorpusRecord) -> io::Result<()> {
    let mut w = BinaryWriter::new(out);
    w.field_header(TType::I32, FIELD_VERSION)?;
    w.i32(VERSION_V0_3_0)?;
    w.field_header(TType::Binary, FIELD_DOC_ID)?;
    w.binary(record.id.as_bytes())?;
    if let Some(body) = &record.body {
        w.field_header(TType::Struct, FIELD_BODY)?;
        w.field_header(TType::Binary, BODY_CLEAN_VISIBLE)?;
        w.binary(body.as_bytes())?;
        w.stop()?;
    }
    w.field_header(TType::Binary, FIELD_STREAM_ID)?;
    w.binary(record.id.as_bytes())?;
    if let Some(ts) = record.timestamp {
        w.field_header(TType::Struct, FIELD_STREAM_TIME)?;
        w.field_header(TType::Double, TIME_EPOCH_TICKS)?;
        w.double(ts as f64)?;
        w.stop()?;
    }
    w.stop()
}

/// Encode a sequence of records into one uncompressed stream.
pub fn encode_records(records: &[CorpusRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        // Writing into a Vec cannot fail.
        let _ = write_record(&mut out, record);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rec(id: &str, ts: Option<i64>, body: Option<&str>) -> CorpusRecord {
        CorpusRecord { id: id.into(), timestamp: ts, body: body.map(String::from) }
    }

    #[test]
    fn decodes_records_then_ends_cleanly() {
        let records = vec![rec("a", Some(1_330_000_000), Some("alpha")), rec("b", None, None)];
        let mut reader = RecordReader::new(Cursor::new(encode_records(&records)));
        assert!(matches!(reader.next_record(), ReadOutcome::Record(r) if r == records[0]));
        assert!(matches!(reader.next_record(), ReadOutcome::Record(r) if r == records[1]));
        assert!(matches!(reader.next_record(), ReadOutcome::EndOfStream));
        assert!(matches!(reader.next_record(), ReadOutcome::EndOfStream));
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn empty_stream_is_end_of_stream() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()));
        assert!(matches!(reader.next_record(), ReadOutcome::EndOfStream));
    }

    #[test]
    fn truncated_second_record_is_an_error() {
        let first = encode_records(&[rec("a", None, Some("alpha"))]);
        let second = encode_records(&[rec("b", None, Some("beta"))]);
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(matches!(reader.next_record(), ReadOutcome::Record(_)));
        match reader.next_record() {
            ReadOutcome::DecodeError(Error::TruncatedRecord { record, offset }) => {
                assert_eq!(record, 1);
                assert_eq!(offset, first.len() as u64);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(matches!(reader.next_record(), ReadOutcome::EndOfStream));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut w = BinaryWriter::new(Vec::new());
        w.field_header(TType::Map, 8).unwrap();
        w.map_header(TType::Binary, TType::Binary, 1).unwrap();
        w.binary(b"lang").unwrap();
        w.binary(b"en").unwrap();
        w.field_header(TType::Binary, FIELD_STREAM_ID).unwrap();
        w.binary(b"1330000000-abc").unwrap();
        w.stop().unwrap();

        let records: Vec<_> = RecordReader::new(Cursor::new(w.into_inner())).collect();
        assert_eq!(records.len(), 1);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.id, "1330000000-abc");
        assert_eq!(record.body, None);
    }

    #[test]
    fn record_without_identifier_is_corrupt() {
        let bytes = vec![TType::Stop.code()];
        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert!(matches!(reader.next_record(), ReadOutcome::DecodeError(Error::CorruptRecord { .. })));
    }

    #[test]
    fn fractional_ticks_truncate() {
        let mut w = BinaryWriter::new(Vec::new());
        w.field_header(TType::Binary, FIELD_STREAM_ID).unwrap();
        w.binary(b"x").unwrap();
        w.field_header(TType::Struct, FIELD_STREAM_TIME).unwrap();
        w.field_header(TType::Double, TIME_EPOCH_TICKS).unwrap();
        w.double(1_330_000_123.75).unwrap();
        w.stop().unwrap();
        w.stop().unwrap();

        let mut reader = RecordReader::new(Cursor::new(w.into_inner()));
        match reader.next_record() {
            ReadOutcome::Record(r) => assert_eq!(r.timestamp, Some(1_330_000_123)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
