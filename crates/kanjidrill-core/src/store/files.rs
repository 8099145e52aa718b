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

//! Stored source files, most recently used first.

use serde::Deserialize;
use serde::Serialize;

use crate::encoding::decode;
use crate::error::Fallible;
use crate::error::fail;
use crate::parser::ParseError;
use crate::parser::ParseOutcome;
use crate::parser::parse;
use crate::storage::SharedStorage;
use crate::storage::read_json;
use crate::storage::write_json;
use crate::types::file_id::FileId;
use crate::types::question::Question;
use crate::types::timestamp::Timestamp;

pub const FILES_KEY: &str = "kanjidrill_files";

/// How many files are kept. The least recently used file beyond this is
/// dropped.
pub const MAX_FILES: usize = 10;

const MAX_NAME_LEN: usize = 255;

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    #[serde(rename = "content")]
    pub raw_content: String,
    #[serde(rename = "lastUsed")]
    pub last_used: Timestamp,
}

/// The questions and errors of the most recent parse. Rebuilt on every save
/// and load, and cleared when there is nothing to show.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct QuestionStore {
    questions: Vec<Question>,
    errors: Vec<ParseError>,
}

impl QuestionStore {
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn replace(&mut self, outcome: ParseOutcome) {
        self.questions = outcome.questions;
        self.errors = outcome.errors;
    }

    fn clear(&mut self) {
        self.questions.clear();
        self.errors.clear();
    }
}

/// Check that `name` can be used as a file name on any common platform.
pub fn validate_file_name(name: &str) -> Fallible<()> {
    if name.trim().is_empty() {
        return fail("file name is empty");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return fail(format!("file name is longer than {MAX_NAME_LEN} characters"));
    }
    if name
        .chars()
        .any(|c| RESERVED_CHARS.contains(&c) || c.is_ascii_control())
    {
        return fail(format!("file name contains a reserved character: {name}"));
    }
    Ok(())
}

pub struct FileRepository {
    storage: SharedStorage,
    files: Vec<StoredFile>,
    questions: QuestionStore,
}

impl FileRepository {
    pub fn open(storage: SharedStorage) -> Fallible<Self> {
        let files: Vec<StoredFile> = read_json(storage.as_ref(), FILES_KEY)?.unwrap_or_default();
        let mut repo = Self {
            storage,
            files,
            questions: QuestionStore::default(),
        };
        repo.sort_by_recency();
        Ok(repo)
    }

    /// All files, most recently used first.
    pub fn list(&self) -> &[StoredFile] {
        &self.files
    }

    pub fn get(&self, id: FileId) -> Option<&StoredFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Look a file up by its id or, failing that, by its name.
    pub fn find(&self, id_or_name: &str) -> Option<&StoredFile> {
        if let Ok(id) = id_or_name.parse::<FileId>() {
            if let Some(file) = self.get(id) {
                return Some(file);
            }
        }
        self.files.iter().find(|f| f.name == id_or_name)
    }

    pub fn questions(&self) -> &QuestionStore {
        &self.questions
    }

    /// Store `content` under `name`. A file with the same name is overwritten
    /// in place and keeps its id; otherwise a new file is added.
    pub fn save(&mut self, name: &str, content: &str, now: Timestamp) -> Fallible<FileId> {
        validate_file_name(name)?;
        let id = match self.files.iter_mut().find(|f| f.name == name) {
            Some(file) => {
                file.raw_content = content.to_string();
                file.last_used = now;
                file.id
            }
            None => {
                let file = StoredFile {
                    id: FileId::generate(),
                    name: name.to_string(),
                    raw_content: content.to_string(),
                    last_used: now,
                };
                let id = file.id;
                self.files.insert(0, file);
                id
            }
        };
        self.sort_by_recency();
        self.evict(id);
        self.flush()?;
        self.questions.replace(parse(content));
        Ok(id)
    }

    /// Replace the name and content of an existing file, keeping its id.
    ///
    /// If another file already has `name`, that file is removed, and its id
    /// is returned.
    pub fn update(
        &mut self,
        id: FileId,
        name: &str,
        content: &str,
        now: Timestamp,
    ) -> Fallible<Option<FileId>> {
        validate_file_name(name)?;
        if self.get(id).is_none() {
            return fail(format!("no such file: {id}"));
        }
        let replaced = self
            .files
            .iter()
            .find(|f| f.id != id && f.name == name)
            .map(|f| f.id);
        if let Some(other) = replaced {
            log::debug!("Rename of {id} overwrites {other}");
            self.files.retain(|f| f.id != other);
        }
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            file.name = name.to_string();
            file.raw_content = content.to_string();
            file.last_used = now;
        }
        self.sort_by_recency();
        self.flush()?;
        self.questions.replace(parse(content));
        Ok(replaced)
    }

    /// Make `id` the most recently used file and parse its content.
    pub fn load(&mut self, id: FileId, now: Timestamp) -> Fallible<&str> {
        let file = match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => file,
            None => return fail(format!("no such file: {id}")),
        };
        file.last_used = now;
        let outcome = parse(&file.raw_content);
        self.questions.replace(outcome);
        self.sort_by_recency();
        self.flush()?;
        match self.get(id) {
            Some(file) => Ok(&file.raw_content),
            None => fail(format!("no such file: {id}")),
        }
    }

    /// Delete a file. Deleting an unknown id is not an error.
    pub fn remove(&mut self, id: FileId) -> Fallible<()> {
        self.files.retain(|f| f.id != id);
        self.questions.clear();
        self.flush()
    }

    /// Decode raw bytes and save them as `name`.
    pub fn ingest(&mut self, name: &str, bytes: &[u8], now: Timestamp) -> Fallible<FileId> {
        let (tag, text) = decode(bytes);
        log::info!("Ingesting {name} as {tag}");
        self.save(name, &text, now)
    }

    pub fn flush(&self) -> Fallible<()> {
        write_json(self.storage.as_ref(), FILES_KEY, &self.files)
    }

    pub fn close(self) -> Fallible<()> {
        self.flush()
    }

    fn sort_by_recency(&mut self) {
        self.files.sort_by(|a, b| b.last_used.cmp(&a.last_used));
    }

    /// Drop the least recently used files beyond capacity, never `keep`.
    fn evict(&mut self, keep: FileId) {
        while self.files.len() > MAX_FILES {
            match self.files.iter().rposition(|f| f.id != keep) {
                Some(idx) => {
                    let file = self.files.remove(idx);
                    log::debug!("Evicting least recently used file '{}'", file.name);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn open_repo() -> Fallible<(std::rc::Rc<MemoryStorage>, FileRepository)> {
        let storage = MemoryStorage::shared();
        let repo = FileRepository::open(storage.clone())?;
        Ok((storage, repo))
    }

    const SAMPLE: &str = "text,question,reading\n今日は晴れた日です。,晴,は\n";

    #[test]
    fn test_save_parses_content() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        repo.save("a.csv", SAMPLE, ts(1))?;
        assert_eq!(repo.questions().questions().len(), 1);
        assert!(repo.questions().errors().is_empty());
        Ok(())
    }

    #[test]
    fn test_save_same_name_overwrites() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let first = repo.save("a.csv", "text,question,reading\n", ts(1))?;
        let second = repo.save("a.csv", SAMPLE, ts(2))?;
        assert_eq!(first, second);
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.list()[0].raw_content, SAMPLE);
        assert_eq!(repo.list()[0].last_used, ts(2));
        Ok(())
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let mut ids = Vec::new();
        for i in 0..11 {
            ids.push(repo.save(&format!("{i}.csv"), SAMPLE, ts(i))?);
        }
        assert_eq!(repo.list().len(), MAX_FILES);
        assert!(repo.get(ids[0]).is_none());
        assert!(repo.get(ids[10]).is_some());
        assert_eq!(repo.list()[0].id, ids[10]);
        Ok(())
    }

    #[test]
    fn test_capacity_with_equal_timestamps() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let mut ids = Vec::new();
        for i in 0..11 {
            ids.push(repo.save(&format!("{i}.csv"), SAMPLE, ts(5))?);
        }
        assert_eq!(repo.list().len(), MAX_FILES);
        assert!(repo.get(ids[0]).is_none());
        Ok(())
    }

    #[test]
    fn test_new_file_survives_clock_skew() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        for i in 0..10 {
            repo.save(&format!("{i}.csv"), SAMPLE, ts(100 + i))?;
        }
        let id = repo.save("late.csv", SAMPLE, ts(1))?;
        assert_eq!(repo.list().len(), MAX_FILES);
        assert!(repo.get(id).is_some());
        Ok(())
    }

    #[test]
    fn test_load_refreshes_recency() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let a = repo.save("a.csv", SAMPLE, ts(1))?;
        let b = repo.save("b.csv", "text,question,reading\n", ts(2))?;
        assert_eq!(repo.list()[0].id, b);
        let content = repo.load(a, ts(3))?.to_string();
        assert_eq!(content, SAMPLE);
        assert_eq!(repo.list()[0].id, a);
        assert_eq!(repo.questions().questions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_load_unknown() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        assert!(repo.load(FileId::generate(), ts(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_remove_clears_questions() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let id = repo.save("a.csv", SAMPLE, ts(1))?;
        repo.remove(id)?;
        assert!(repo.list().is_empty());
        assert!(repo.questions().questions().is_empty());
        // Removing again is fine.
        repo.remove(id)?;
        Ok(())
    }

    #[test]
    fn test_persists_across_reopen() -> Fallible<()> {
        let (storage, mut repo) = open_repo()?;
        let id = repo.save("a.csv", SAMPLE, ts(1))?;
        repo.close()?;
        let repo = FileRepository::open(storage)?;
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.list()[0].id, id);
        assert_eq!(repo.find("a.csv").map(|f| f.id), Some(id));
        assert_eq!(repo.find(&id.to_string()).map(|f| f.id), Some(id));
        Ok(())
    }

    #[test]
    fn test_update_keeps_id_and_overwrites_name_clash() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let a = repo.save("a.csv", SAMPLE, ts(1))?;
        let b = repo.save("b.csv", SAMPLE, ts(2))?;
        let replaced = repo.update(a, "b.csv", "text,question,reading\n", ts(3))?;
        assert_eq!(replaced, Some(b));
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.list()[0].id, a);
        assert_eq!(repo.list()[0].name, "b.csv");
        assert!(repo.questions().questions().is_empty());
        Ok(())
    }

    #[test]
    fn test_ingest_misdetected_utf8_keeps_rows() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let content = "text,question,reading\n今日は晴れた日です😀,晴,は\n雨が降る,雨,あめ\n";
        let id = repo.ingest("emoji.csv", content.as_bytes(), ts(1))?;
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.list()[0].id, id);
        let store = repo.questions();
        assert_eq!(store.questions().len() + store.errors().len(), 2);
        assert!(store.errors().iter().all(|e| e.line > 0));
        Ok(())
    }

    #[test]
    fn test_ingest_shift_jis() -> Fallible<()> {
        let (_, mut repo) = open_repo()?;
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(SAMPLE);
        let id = repo.ingest("sjis.csv", &bytes, ts(1))?;
        assert_eq!(repo.list()[0].id, id);
        assert_eq!(
            repo.questions().questions(),
            &[Question::new("今日は晴れた日です。", "晴", "は", false)]
        );
        Ok(())
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("kanji.csv").is_ok());
        assert!(validate_file_name("  ").is_err());
        assert!(validate_file_name("a/b.csv").is_err());
        assert!(validate_file_name("a?.csv").is_err());
        assert!(validate_file_name(&"x".repeat(256)).is_err());
    }
}
