use std::io::{self, Read};

use super::error::IngestError;
use crate::database::models::NewFeedback;

/// Header that names the column each record's text is taken from.
pub const CONTENT_COLUMN: &str = "content";

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Pull-based producer of feedback rows from CSV text.
///
/// The header is read up front; each `next` call decodes exactly one more
/// record. Finite and not restartable: the first error ends the sequence.
pub struct FeedbackRows<R: Read> {
    reader: csv::Reader<RawWindow<R>>,
    record: csv::StringRecord,
    content_index: usize,
    finished: bool,
}

impl<R: Read> FeedbackRows<R> {
    pub fn new(reader: R) -> Result<Self, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(DELIMITER)
            .from_reader(RawWindow::new(reader));

        let content_index = reader
            .headers()
            .map_err(decode_failure)?
            .iter()
            .position(|name| name.trim_start_matches(BYTE_ORDER_MARK) == CONTENT_COLUMN);

        let header_end = reader.position().byte();
        reader
            .get_mut()
            .check_span(0, header_end)
            .map_err(|message| broken_quoting(1, message))?;

        let content_index = content_index.ok_or_else(|| {
            IngestError::validation(format!("CSV header must include a '{}' column", CONTENT_COLUMN))
        })?;

        Ok(Self {
            reader,
            record: csv::StringRecord::new(),
            content_index,
            finished: false,
        })
    }

    fn read_row(&mut self) -> Option<Result<NewFeedback, IngestError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(decode_failure(e))),
        }

        let (start, line) = self
            .record
            .position()
            .map(|p| (p.byte(), p.line()))
            .unwrap_or((0, 0));
        let end = self.reader.position().byte();

        if let Err(message) = self.reader.get_mut().check_span(start, end) {
            return Some(Err(broken_quoting(line, message)));
        }

        // Field counts are enforced by the reader, so the column is present
        Some(
            self.record
                .get(self.content_index)
                .map(|content| NewFeedback::new(content, line))
                .ok_or(IngestError::Decode {
                    line,
                    message: format!("record has no '{}' field", CONTENT_COLUMN),
                }),
        )
    }
}

impl<R: Read> Iterator for FeedbackRows<R> {
    type Item = Result<NewFeedback, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = self.read_row();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// Drain a CSV source into rows, stopping at the first malformed record.
pub fn decode_rows<R: Read>(reader: R) -> Result<Vec<NewFeedback>, IngestError> {
    let mut rows = Vec::new();

    for row in FeedbackRows::new(reader)? {
        rows.push(row?);
    }

    Ok(rows)
}

/// Keeps the raw bytes the CSV reader has pulled but not yet had checked.
///
/// The `csv` reader recovers silently from bad quoting, so each record's
/// source bytes are re-checked here. Bytes are dropped as soon as the record
/// covering them has been checked; the window never grows past one record
/// plus the reader's read-ahead.
struct RawWindow<R> {
    inner: R,
    bytes: Vec<u8>,
    offset: u64,
}

impl<R> RawWindow<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: Vec::new(),
            offset: 0,
        }
    }

    /// Check quoting for the bytes in `[start, end)` and forget everything before `end`.
    fn check_span(&mut self, start: u64, end: u64) -> Result<(), &'static str> {
        let to = self.local(end);
        let from = self.local(start).min(to);

        let outcome = check_quoting(&self.bytes[from..to]);

        self.bytes.drain(..to);
        self.offset += to as u64;
        outcome
    }

    fn local(&self, absolute: u64) -> usize {
        usize::try_from(absolute.saturating_sub(self.offset))
            .unwrap_or(usize::MAX)
            .min(self.bytes.len())
    }
}

impl<R: Read> Read for RawWindow<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Strict RFC 4180 quoting for one raw record. A field that opens with a quote
/// must close it, and a closing quote must be followed by a delimiter or the
/// end of the record. A quote inside an unquoted field is literal.
fn check_quoting(raw: &[u8]) -> Result<(), &'static str> {
    let mut bytes = trim_terminators(raw).iter().copied().peekable();
    let mut at_field_start = true;
    let mut quoted = false;

    while let Some(byte) = bytes.next() {
        if quoted {
            if byte == QUOTE {
                match bytes.peek() {
                    Some(&QUOTE) => {
                        bytes.next();
                    }
                    Some(&DELIMITER) | None => quoted = false,
                    Some(_) => return Err("unexpected character after closing quote"),
                }
            }
            continue;
        }

        if at_field_start && byte == QUOTE {
            quoted = true;
            at_field_start = false;
        } else {
            at_field_start = byte == DELIMITER;
        }
    }

    if quoted {
        Err("unterminated quoted field")
    } else {
        Ok(())
    }
}

// Blank lines and CR/LF pairs can fall on either side of a record's span
fn trim_terminators(raw: &[u8]) -> &[u8] {
    let is_terminator = |b: &u8| *b == b'\r' || *b == b'\n';
    let start = raw.iter().position(|b| !is_terminator(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !is_terminator(b)).map_or(start, |i| i + 1);
    &raw[start..end]
}

fn broken_quoting(line: u64, message: &str) -> IngestError {
    IngestError::Decode {
        line,
        message: message.to_string(),
    }
}

fn decode_failure(err: csv::Error) -> IngestError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    IngestError::Decode {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(input: &str) -> Vec<String> {
        decode_rows(input.as_bytes())
            .unwrap()
            .into_iter()
            .map(|row| row.content)
            .collect()
    }

    fn decode_error_line(input: &str) -> u64 {
        match decode_rows(input.as_bytes()).unwrap_err() {
            IngestError::Decode { line, .. } => line,
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn decodes_quoted_rows() {
        assert_eq!(contents("content\n\"hello\"\n\"world\"\n"), vec!["hello", "world"]);
    }

    #[test]
    fn keeps_content_verbatim() {
        let rows = contents("content\n\"  padded  \"\n\"\"\n\"a, b\"\n\"line\nbreak\"\n");
        assert_eq!(rows, vec!["  padded  ", "", "a, b", "line\nbreak"]);
    }

    #[test]
    fn ignores_other_columns() {
        let rows = contents("id,content,rating\n1,great,5\n2,meh,3\n");
        assert_eq!(rows, vec!["great", "meh"]);
    }

    #[test]
    fn records_source_lines() {
        let rows = decode_rows("content\nfirst\n\"multi\nline\"\nthird\n".as_bytes()).unwrap();
        let lines: Vec<u64> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
    }

    #[test]
    fn strips_byte_order_mark_from_header() {
        assert_eq!(contents("\u{feff}content\nhi\n"), vec!["hi"]);
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(contents("content\n").is_empty());
    }

    #[test]
    fn missing_content_header_fails_fast() {
        let err = decode_rows("message\nhello\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));

        let err = decode_rows("".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn uneven_row_fails_whole_decode() {
        assert_eq!(decode_error_line("content,rating\ngood,5\nbad\n"), 3);
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let mut input = b"content\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = decode_rows(input.as_slice()).unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));
    }

    #[test]
    fn unterminated_quote_is_a_decode_error() {
        assert_eq!(decode_error_line("content\n\"hello\nworld\n"), 2);
        assert_eq!(decode_error_line("content\nok\n\"never closed"), 3);
    }

    #[test]
    fn text_after_closing_quote_is_a_decode_error() {
        assert_eq!(decode_error_line("content\n\"a\"b\"c\n"), 2);
        assert_eq!(decode_error_line("content,rating\nfine,4\n\"good\" ,5\n"), 3);
    }

    #[test]
    fn broken_header_quoting_is_a_decode_error() {
        assert_eq!(decode_error_line("\"content\"x\nhello\n"), 1);
    }

    #[test]
    fn escaped_and_literal_quotes_are_accepted() {
        let rows = contents("content,note\n\"say \"\"hi\"\"\",x\n5\" screen,\"\"\"\"\n");
        assert_eq!(rows, vec!["say \"hi\"", "5\" screen"]);
    }

    #[test]
    fn crlf_terminators_are_accepted() {
        assert_eq!(contents("content\r\n\"a\"\r\n\"b\"\r\n\r\nc\r\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn producer_is_lazy_and_stops_at_first_error() {
        let mut rows = FeedbackRows::new("content\nok\n\"unterminated,x\nmore\n".as_bytes()).unwrap();
        assert_eq!(rows.next().unwrap().unwrap().content, "ok");
        assert!(matches!(rows.next(), Some(Err(IngestError::Decode { line: 3, .. }))));
        assert!(rows.next().is_none());
    }

    #[test]
    fn quoting_rules() {
        assert!(check_quoting(b"plain,\"quoted, with comma\",\"\"").is_ok());
        assert!(check_quoting(b"\"\"\"\"").is_ok());
        assert!(check_quoting(b"a\"b,c").is_ok());
        assert_eq!(check_quoting(b"\"open"), Err("unterminated quoted field"));
        assert_eq!(
            check_quoting(b"\"closed\"tail"),
            Err("unexpected character after closing quote")
        );
    }

    #[test]
    fn window_drops_checked_bytes() {
        let mut window = RawWindow::new("content\nhello\n".as_bytes());
        let mut buf = [0u8; 64];
        let n = window.read(&mut buf).unwrap();
        assert_eq!(n, 14);

        assert!(window.check_span(0, 8).is_ok());
        assert_eq!(window.bytes, b"hello\n");
        assert!(window.check_span(8, 14).is_ok());
        assert!(window.bytes.is_empty());
    }
}
