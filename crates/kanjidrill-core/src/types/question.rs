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

use serde::Deserialize;
use serde::Serialize;

/// A single drill item: a sentence, the substring the learner must write or
/// read, and the reading of that substring.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    /// The substring of `text` being drilled.
    #[serde(rename = "question", alias = "kanji")]
    pub target: String,
    pub reading: String,
    /// When true the learner is shown the target and asked for the reading,
    /// rather than the other way round.
    #[serde(rename = "isReading", default)]
    pub is_reading_mode: bool,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        target: impl Into<String>,
        reading: impl Into<String>,
        is_reading_mode: bool,
    ) -> Self {
        Self {
            text: text.into(),
            target: target.into(),
            reading: reading.into(),
            is_reading_mode,
        }
    }

    /// The content-derived identity of this question.
    pub fn id(&self) -> QuestionId {
        QuestionId::of(self)
    }

    /// The target hidden behind placeholder characters: one box per
    /// character for a pure-kanji target, otherwise a bracketed blank one
    /// full-width space wider than the target.
    pub fn masked_target(&self) -> String {
        let len = self.target.chars().count();
        if !self.target.is_empty() && self.target.chars().all(is_kanji) {
            "□".repeat(len)
        } else {
            format!("［{}］", "\u{3000}".repeat(len + 1))
        }
    }

    /// The sentence with the first occurrence of the target masked out.
    pub fn prompt(&self) -> String {
        if self.target.is_empty() {
            return self.text.clone();
        }
        self.text.replacen(&self.target, &self.masked_target(), 1)
    }
}

/// CJK unified ideographs.
fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// The identity of a question: its four fields joined with `-`, in order.
///
/// Two questions with the same four fields are the same question everywhere:
/// in the difficult slots, in the reveal flags, and in de-duplication.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn of(question: &Question) -> Self {
        let flag = if question.is_reading_mode { 1 } else { 0 };
        Self(format!(
            "{}-{}-{}-{}",
            question.text, question.target, question.reading, flag
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A fixed-width hex digest of the identity, for addressing questions
    /// from the command line.
    pub fn digest(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex().to_string()
    }

    /// True if `prefix` is a (non-empty) prefix of this identity's digest.
    pub fn matches_digest(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.digest().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_format() {
        let q = Question::new("今日は晴れた日です。", "晴", "は", false);
        assert_eq!(q.id().as_str(), "今日は晴れた日です。-晴-は-0");
        let q = Question::new("今日は晴れた日です。", "晴", "は", true);
        assert_eq!(q.id().as_str(), "今日は晴れた日です。-晴-は-1");
    }

    #[test]
    fn test_identity_is_case_sensitive() {
        let a = Question::new("Abc", "b", "bee", false);
        let b = Question::new("abc", "b", "bee", false);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_digest() {
        let id = Question::new("晴れ", "晴", "は", false).id();
        let digest = id.digest();
        assert_eq!(digest.len(), 64);
        assert!(id.matches_digest(&digest[..8]));
        assert!(id.matches_digest(&digest[..8].to_ascii_uppercase()));
        assert!(!id.matches_digest(""));
    }

    #[test]
    fn test_masked_target_kanji() {
        let q = Question::new("今日は晴天です。", "晴天", "せいてん", false);
        assert_eq!(q.masked_target(), "□□");
        assert_eq!(q.prompt(), "今日は□□です。");
    }

    #[test]
    fn test_masked_target_mixed() {
        let q = Question::new("晴れた日", "晴れ", "はれ", false);
        assert_eq!(q.masked_target(), "［\u{3000}\u{3000}\u{3000}］");
    }

    #[test]
    fn test_serialize_field_names() {
        let q = Question::new("晴れ", "晴", "は", true);
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(
            json,
            r#"{"text":"晴れ","question":"晴","reading":"は","isReading":true}"#
        );
    }

    #[test]
    fn test_deserialize_kanji_alias() {
        let q: Question =
            serde_json::from_str(r#"{"text":"晴れ","kanji":"晴","reading":"は"}"#).unwrap();
        assert_eq!(q, Question::new("晴れ", "晴", "は", false));
    }
}
