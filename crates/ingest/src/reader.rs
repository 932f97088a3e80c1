//! Record reader for delimited text input.
//!
//! Separates the two kinds of read failure: a malformed row (bad UTF-8,
//! unterminated quote, over-long record) is returned as a [`ReadError`] and
//! the reader moves on; an I/O error from the underlying stream is returned
//! as `io::Error` and ends the run.
//!
//! A quoted field may span lines; the record continues until its quotes
//! balance. Embedded line breaks are kept as `\n`.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::ReadError;

/// Default cap on the bytes buffered for one record.
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024 * 1024;

/// A successfully split data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based data row number (the header is not counted).
    pub number: u64,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordRead {
    Complete,
    TooLong,
}

pub struct RowReader<R> {
    inner: R,
    delimiter: char,
    max_record_len: usize,
    header_read: bool,
    rows_read: u64,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> RowReader<R> {
    pub fn new(inner: R, delimiter: char) -> Self {
        Self {
            inner,
            delimiter,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            header_read: false,
            rows_read: 0,
            buf: Vec::with_capacity(128),
        }
    }

    /// Cap the bytes held for one record; longer records are skipped.
    /// Clamped to a minimum of 1.
    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len.max(1);
        self
    }

    /// Data rows read so far, including malformed ones.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Append one physical line to `buf`, without its line ending.
    ///
    /// Never buffers more than `max_record_len` bytes; the rest of an
    /// over-long line is consumed and dropped. Returns `None` at end of
    /// input, otherwise whether the cap was hit.
    async fn read_line(&mut self) -> io::Result<Option<bool>> {
        let start = self.buf.len();
        let mut read_any = false;
        let mut overflow = false;
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            read_any = true;
            let (chunk, line_done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..=i], true),
                None => (available, false),
            };
            let room = self.max_record_len.saturating_sub(self.buf.len());
            if chunk.len() > room {
                self.buf.extend_from_slice(&chunk[..room]);
                overflow = true;
            } else {
                self.buf.extend_from_slice(chunk);
            }
            let used = chunk.len();
            self.inner.consume(used);
            if line_done {
                break;
            }
        }
        if !read_any {
            return Ok(None);
        }
        if self.buf.len() > start && self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.len() > start && self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(overflow))
    }

    /// Read the next non-blank record into `buf`, following quoted fields
    /// across line breaks. Returns `None` at end of input.
    async fn next_record(&mut self) -> io::Result<Option<RecordRead>> {
        loop {
            self.buf.clear();
            match self.read_line().await? {
                None => return Ok(None),
                Some(true) => return Ok(Some(RecordRead::TooLong)),
                Some(false) => {}
            }
            if !self.buf.iter().all(u8::is_ascii_whitespace) {
                break;
            }
        }
        while quote_open(&self.buf, self.delimiter) {
            self.buf.push(b'\n');
            match self.read_line().await? {
                // Unterminated at end of input; splitting reports it.
                None => break,
                Some(true) => return Ok(Some(RecordRead::TooLong)),
                Some(false) => {}
            }
        }
        Ok(Some(RecordRead::Complete))
    }

    /// Consume and discard the header record, whatever it contains.
    ///
    /// Returns the header's fields, or `None` when the input is empty.
    /// Later calls return `None` without reading.
    pub async fn read_header(&mut self) -> io::Result<Option<Vec<String>>> {
        if self.header_read {
            return Ok(None);
        }
        self.header_read = true;
        if self.next_record().await?.is_none() {
            return Ok(None);
        }
        let header = std::str::from_utf8(&self.buf)
            .ok()
            .and_then(|line| split_fields(line, self.delimiter).ok())
            .unwrap_or_default();
        Ok(Some(header))
    }

    /// Read the next data row.
    ///
    /// The header is consumed first if [`read_header`](Self::read_header)
    /// was not called. `Ok(None)` means end of input.
    pub async fn next_row(&mut self) -> io::Result<Option<Result<RawRow, ReadError>>> {
        if !self.header_read && self.read_header().await?.is_none() {
            return Ok(None);
        }
        let Some(record) = self.next_record().await? else {
            return Ok(None);
        };
        self.rows_read += 1;
        let row = self.rows_read;

        if record == RecordRead::TooLong {
            return Ok(Some(Err(ReadError::RecordTooLong {
                row,
                limit: self.max_record_len,
            })));
        }
        let Ok(line) = std::str::from_utf8(&self.buf) else {
            return Ok(Some(Err(ReadError::InvalidUtf8 { row })));
        };
        let Ok(fields) = split_fields(line, self.delimiter) else {
            return Ok(Some(Err(ReadError::UnterminatedQuote { row })));
        };
        Ok(Some(Ok(RawRow { number: row, fields })))
    }
}

/// Whether `record` ends inside a quoted field.
fn quote_open(record: &[u8], delimiter: char) -> bool {
    split_fields(&String::from_utf8_lossy(record), delimiter).is_err()
}

/// Split one line into trimmed fields.
///
/// A field may be wrapped in double quotes, in which case it may contain the
/// delimiter and `""` stands for a literal quote. Errors on an unterminated
/// quote.
fn split_fields(line: &str, delimiter: char) -> Result<Vec<String>, ()> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            in_quotes = true;
        } else if c == delimiter {
            fields.push(field.trim().to_string());
            field.clear();
        } else {
            field.push(c);
        }
    }

    if in_quotes {
        return Err(());
    }
    fields.push(field.trim().to_string());
    Ok(fields)
}
