// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use csv::ReaderBuilder;
use csv::StringRecord;
use csv::WriterBuilder;
use serde::Deserialize;
use serde::Serialize;

use crate::encoding::UTF8_BOM;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::types::question::Question;

/// The header written by [`export`] and used to seed new files.
pub const HEADER: &str = "text,question,reading,isReading";

/// A problem with one row of the input, or with the whole document when
/// `line` is 0.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ParseError {
    /// 1-based, counting the header as line 1.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The result of parsing a document: every row that validated, in source
/// order, and every row that did not.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ParseOutcome {
    pub questions: Vec<Question>,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    /// The outcome of a document that could not be read at all.
    pub fn failed(error: ParseError) -> Self {
        Self {
            questions: Vec::new(),
            errors: vec![error],
        }
    }
}

/// Positions of the recognised columns in the header row.
#[derive(Debug, Default)]
struct Columns {
    text: Option<usize>,
    target: Option<usize>,
    reading: Option<usize>,
    is_reading: Option<usize>,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Self {
        let mut columns = Columns::default();
        for (idx, name) in header.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').trim();
            let slot = match name {
                "text" => &mut columns.text,
                "kanji" | "question" => &mut columns.target,
                "reading" => &mut columns.reading,
                "isReading" => &mut columns.is_reading,
                _ => continue,
            };
            // The first column with a given name wins.
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        columns
    }

    fn is_complete(&self) -> bool {
        self.text.is_some() && self.target.is_some() && self.reading.is_some()
    }
}

/// One data row with the recognised columns pulled out.
struct RawRow<'a> {
    text: &'a str,
    target: &'a str,
    reading: &'a str,
    is_reading: &'a str,
}

impl<'a> RawRow<'a> {
    fn read(record: &'a StringRecord, columns: &Columns) -> Self {
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        RawRow {
            text: field(columns.text),
            target: field(columns.target),
            reading: field(columns.reading),
            is_reading: field(columns.is_reading),
        }
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
            && self.target.is_empty()
            && self.reading.is_empty()
            && self.is_reading != "1"
    }

    fn validate(&self) -> Result<Question, String> {
        if self.text.is_empty() || self.target.is_empty() || self.reading.is_empty() {
            return Err(format!(
                "required fields missing (text: {}, question: {}, reading: {})",
                self.text, self.target, self.reading
            ));
        }
        if !self.text.contains(self.target) {
            return Err(format!(
                "question \"{}\" does not occur in text \"{}\"",
                self.target, self.text
            ));
        }
        Ok(Question::new(
            self.text,
            self.target,
            self.reading,
            self.is_reading == "1",
        ))
    }
}

/// Parse decoded CSV text into questions.
///
/// Bad rows are reported and skipped; they never stop the rows after them
/// from being read. Only a document the CSV reader cannot tokenize at all
/// produces a single error at line 0 and no questions.
pub fn parse(text: &str) -> ParseOutcome {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = match reader.headers() {
        Ok(header) => Columns::from_header(header),
        Err(e) => {
            return ParseOutcome::failed(ParseError::new(0, format!("failed to parse CSV: {e}")));
        }
    };
    if !columns.is_complete() {
        log::warn!("CSV header lacks one of the text, question/kanji, or reading columns");
    }

    let mut records: Vec<StringRecord> = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => {
                // A line holding nothing at all.
                if record.len() == 1 && record[0].is_empty() {
                    continue;
                }
                records.push(record);
            }
            Err(e) => {
                return ParseOutcome::failed(ParseError::new(
                    0,
                    format!("failed to parse CSV: {e}"),
                ));
            }
        }
    }

    // Rows of empty fields at the end come from trailing delimiters.
    while records
        .last()
        .is_some_and(|record| RawRow::read(record, &columns).is_blank())
    {
        records.pop();
    }

    let mut outcome = ParseOutcome::default();
    for (idx, record) in records.iter().enumerate() {
        let row = RawRow::read(record, &columns);
        match row.validate() {
            Ok(question) => outcome.questions.push(question),
            Err(message) => outcome.errors.push(ParseError::new(idx + 2, message)),
        }
    }
    outcome
}

/// Serialize questions as UTF-8 CSV with a leading byte order mark, so that
/// spreadsheet applications pick the right encoding.
pub fn export(questions: &[Question]) -> Fallible<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(UTF8_BOM.to_vec());
    writer.write_record(HEADER.split(','))?;
    for q in questions {
        let flag = if q.is_reading_mode { "1" } else { "0" };
        writer.write_record([
            q.text.as_str(),
            q.target.as_str(),
            q.reading.as_str(),
            flag,
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| ErrorReport::new(format!("CSV error: {}", e.error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode;

    #[test]
    fn test_single_row() {
        let outcome = parse("text,question,reading\n今日は晴れた日です。,晴,は\n");
        assert_eq!(
            outcome.questions,
            vec![Question::new("今日は晴れた日です。", "晴", "は", false)]
        );
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_missing_text() {
        let outcome = parse("text,question,reading\n,晴,は\n");
        assert!(outcome.questions.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, 2);
        assert!(outcome.errors[0].message.starts_with("required fields missing"));
        assert!(outcome.errors[0].message.contains("question: 晴"));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(parse(""), ParseOutcome::default());
        assert_eq!(parse("text,question,reading\n"), ParseOutcome::default());
    }

    #[test]
    fn test_kanji_column_and_reordering() {
        let outcome = parse("reading,kanji,text\nは,晴,晴れ\n");
        assert_eq!(outcome.questions, vec![Question::new("晴れ", "晴", "は", false)]);
    }

    #[test]
    fn test_is_reading_only_for_one() {
        let input = "text,question,reading,isReading\n\
                     晴れ,晴,は,1\n\
                     雨だ,雨,あめ,0\n\
                     雪だ,雪,ゆき,true\n\
                     風だ,風,かぜ\n";
        let outcome = parse(input);
        let flags: Vec<bool> = outcome.questions.iter().map(|q| q.is_reading_mode).collect();
        assert_eq!(flags, vec![true, false, false, false]);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_partial_failure_keeps_going() {
        let input = "text,question,reading\n\
                     晴れ,晴,は\n\
                     雨だ,,あめ\n\
                     雪だ,雪,ゆき\n\
                     ,,\n\
                     風だ,風,かぜ\n";
        let outcome = parse(input);
        assert_eq!(outcome.questions.len(), 3);
        let lines: Vec<usize> = outcome.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 5]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let input = "\ntext,question,reading\n\n晴れ,晴,は\n\n\n雨だ,,あめ\n";
        let outcome = parse(input);
        assert_eq!(outcome.questions.len(), 1);
        let lines: Vec<usize> = outcome.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3]);
    }

    #[test]
    fn test_trailing_empty_rows_are_dropped() {
        let outcome = parse("text,question,reading,isReading\n晴れ,晴,は,0\n,,,\n,,,0\n");
        assert_eq!(outcome.questions.len(), 1);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_target_must_occur_in_text() {
        let outcome = parse("text,question,reading\n晴れ,雨,あめ\n");
        assert!(outcome.questions.is_empty());
        assert_eq!(outcome.errors[0].line, 2);
        assert!(outcome.errors[0].message.contains("does not occur"));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let outcome = parse("id,text,question,reading,note\n7,晴れ,晴,は,sunny\n");
        assert_eq!(outcome.questions, vec![Question::new("晴れ", "晴", "は", false)]);
    }

    #[test]
    fn test_quoted_fields() {
        let outcome = parse("text,question,reading\n\"晴れ, 雨\",雨,あめ\n");
        assert_eq!(outcome.questions, vec![Question::new("晴れ, 雨", "雨", "あめ", false)]);
    }

    #[test]
    fn test_crlf() {
        let outcome = parse("text,question,reading\r\n晴れ,晴,は\r\n");
        assert_eq!(outcome.questions, vec![Question::new("晴れ", "晴", "は", false)]);
    }

    #[test]
    fn test_missing_column_reports_every_row() {
        let outcome = parse("text,reading\n晴れ,は\n雨だ,あめ\n");
        assert!(outcome.questions.is_empty());
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn test_export_roundtrip() -> Fallible<()> {
        let questions = vec![
            Question::new("今日は晴れた日です。", "晴", "は", false),
            Question::new("\"雨\", と言った", "雨", "あめ", true),
        ];
        let bytes = export(&questions)?;
        assert!(bytes.starts_with(&UTF8_BOM));
        let (_, text) = decode(&bytes);
        assert!(text.starts_with(HEADER));
        let outcome = parse(&text);
        assert_eq!(outcome.questions, questions);
        assert!(outcome.errors.is_empty());
        Ok(())
    }
}
