use csv::{ReaderBuilder, StringRecord};

use crate::error::Result;

use super::filter::RowWindow;
use super::model::{to_sample, Channel, Detect};

/// How much of the content is inspected to sniff the dialect and header.
pub const SNIFF_LENGTH: usize = 1024;

/// Delimiters tried by the sniffer, in order of preference on ties.
const CANDIDATE_DELIMITERS: [u8; 5] = [b',', b';', b'\t', b'|', b' '];

// ---------------------------------------------------------------------------
// Dialect sniffing
// ---------------------------------------------------------------------------

/// Delimiter/quoting convention of a delimited text source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl Dialect {
    fn reader<'a>(&self, text: &'a str) -> csv::Reader<&'a [u8]> {
        ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(text.as_bytes())
    }
}

/// The leading `SNIFF_LENGTH` bytes of `text`, cut back to whole lines when
/// the text is longer than that.
fn sniff_sample(text: &str) -> &str {
    if text.len() <= SNIFF_LENGTH {
        return text;
    }
    let mut end = SNIFF_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let sample = &text[..end];
    match sample.rfind(['\n', '\r']) {
        Some(pos) if pos > 0 => &sample[..pos],
        _ => sample,
    }
}

/// Count `delimiter` occurrences outside double-quoted sections.
fn count_unquoted(line: &str, delimiter: u8, quote: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == quote {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Infer the delimiter from the leading sample of `text`.
///
/// A candidate scores one point per line whose delimiter count equals the
/// most common non-zero count for that candidate.  The best scorer wins; a
/// text with no candidate at all is treated as a single comma column.
pub fn sniff_dialect(text: &str) -> Dialect {
    let quote = Dialect::default().quote;
    let lines: Vec<&str> = sniff_sample(text)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut best: Option<(usize, u8)> = None;
    for &delimiter in &CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| count_unquoted(l.trim_end(), delimiter, quote))
            .collect();

        let mut modal = (0usize, 0usize); // (count, frequency)
        for &c in counts.iter().filter(|&&c| c > 0) {
            let freq = counts.iter().filter(|&&x| x == c).count();
            if freq > modal.1 || (freq == modal.1 && c > modal.0) {
                modal = (c, freq);
            }
        }
        if modal.1 == 0 {
            continue;
        }
        if best.map_or(true, |(score, _)| modal.1 > score) {
            best = Some((modal.1, delimiter));
        }
    }

    Dialect {
        delimiter: best.map_or(b',', |(_, d)| d),
        quote,
    }
}

// ---------------------------------------------------------------------------
// Header detection
// ---------------------------------------------------------------------------

fn is_numeric(cell: &str) -> bool {
    cell.trim().parse::<f64>().is_ok()
}

/// Decide whether the first row of `text` is a header.
///
/// Each column whose following cells are all numeric casts a vote: for a
/// header when the first-row cell is not numeric, against it otherwise.
/// Columns holding text data do not vote.
pub fn sniff_header(text: &str, dialect: Dialect) -> bool {
    let rows: Vec<StringRecord> = dialect
        .reader(sniff_sample(text))
        .records()
        .filter_map(|r| r.ok())
        .collect();

    let Some((first, rest)) = rows.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }

    let mut votes: i64 = 0;
    for (col, head) in first.iter().enumerate() {
        let mut cells = rest.iter().filter_map(|r| r.get(col)).peekable();
        if cells.peek().is_none() {
            continue;
        }
        if !cells.all(is_numeric) {
            continue;
        }
        if is_numeric(head) {
            votes -= 1;
        } else {
            votes += 1;
        }
    }
    votes > 0
}

// ---------------------------------------------------------------------------
// Channel extraction
// ---------------------------------------------------------------------------

/// Result of reading a delimited text source.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularChannels {
    /// One channel per column, `max_columns` of them.
    pub channels: Vec<Channel>,
    /// Whether the first row was treated as a header.
    pub has_header: bool,
    pub dialect: Dialect,
}

/// Field-parsing state, mirroring the `csv` reader closely enough to find
/// the same record boundaries.
#[derive(Clone, Copy)]
enum Field {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Splits text into rows at line terminators outside quoted fields.
///
/// Unlike the `csv` reader this yields blank lines, as empty rows.
struct RowSplitter<'a> {
    text: &'a str,
    pos: usize,
    dialect: Dialect,
}

impl<'a> Iterator for RowSplitter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }
        let start = self.pos;
        let mut field = Field::Start;
        for (i, &b) in bytes.iter().enumerate().skip(start) {
            field = match field {
                Field::Quoted if b == self.dialect.quote => Field::QuoteInQuoted,
                Field::Quoted => Field::Quoted,
                Field::QuoteInQuoted if b == self.dialect.quote => Field::Quoted,
                Field::Start if b == self.dialect.quote => Field::Quoted,
                _ if b == b'\n' || b == b'\r' => {
                    self.pos = if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                        i + 2
                    } else {
                        i + 1
                    };
                    return Some(&self.text[start..i]);
                }
                _ if b == self.dialect.delimiter => Field::Start,
                _ => Field::Unquoted,
            };
        }
        self.pos = bytes.len();
        Some(&self.text[start..])
    }
}

/// Rows of a delimited source, blank lines included as zero-width records.
///
/// The splitter only finds row boundaries; each non-blank row is parsed by a
/// single `csv` reader running over the same text.
struct Rows<'a> {
    lines: RowSplitter<'a>,
    reader: csv::Reader<&'a [u8]>,
    record: StringRecord,
}

impl<'a> Rows<'a> {
    fn new(text: &'a str, dialect: Dialect) -> Self {
        Rows {
            lines: RowSplitter {
                text,
                pos: 0,
                dialect,
            },
            reader: dialect.reader(text),
            record: StringRecord::new(),
        }
    }

    fn next_row(&mut self) -> Result<Option<&StringRecord>> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        if line.is_empty() || !self.reader.read_record(&mut self.record)? {
            self.record.clear();
        }
        Ok(Some(&self.record))
    }
}

/// Read every column of `text` as a channel.
///
/// The channel count is the widest data row in the whole source (header
/// excluded).  Within the window, rows shorter than that contribute 0.0 for
/// their missing trailing columns and malformed cells read as 0.0.  A blank
/// line is a row of width zero: it counts toward the window and reads as 0.0
/// in every column.
pub fn extract_channels(
    text: &str,
    header: Detect<bool>,
    window: RowWindow,
) -> Result<TabularChannels> {
    let dialect = sniff_dialect(text);
    let has_header = header.or_else(|| sniff_header(text, dialect));

    // Pass 1: widest data row.
    let mut rows = Rows::new(text, dialect);
    let mut max_columns = 0;
    let mut skip_header = has_header;
    while let Some(record) = rows.next_row()? {
        if skip_header {
            skip_header = false;
            continue;
        }
        max_columns = max_columns.max(record.len());
    }

    // Pass 2: transpose the windowed rows into channels.
    let mut channels: Vec<Channel> = vec![Vec::new(); max_columns];
    let mut rows = Rows::new(text, dialect);
    let mut skip_header = has_header;
    let mut row = 0;
    while let Some(record) = rows.next_row()? {
        if skip_header {
            skip_header = false;
            continue;
        }
        if window.is_exhausted(row) {
            break;
        }
        if window.is_before(row) {
            row += 1;
            continue;
        }
        row += 1;
        for (col, channel) in channels.iter_mut().enumerate() {
            channel.push(record.get(col).map_or(0.0, to_sample));
        }
    }

    Ok(TabularChannels {
        channels,
        has_header,
        dialect,
    })
}
