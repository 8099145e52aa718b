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

use std::env::current_dir;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use kanjidrill_core::DifficultItemSlots;
use kanjidrill_core::DisplayOrderState;
use kanjidrill_core::FileId;
use kanjidrill_core::FileRepository;
use kanjidrill_core::OrderKey;
use kanjidrill_core::Question;
use kanjidrill_core::SessionState;
use kanjidrill_core::SlotId;
use kanjidrill_core::Timestamp;
use kanjidrill_core::rng::TinyRng;
use kanjidrill_core::storage::SharedStorage;

use crate::config::Config;
use crate::db::Database;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

/// The data directory and the four stores persisted in it.
pub struct Collection {
    pub directory: PathBuf,
    pub files: FileRepository,
    pub slots: DifficultItemSlots,
    pub order: DisplayOrderState,
    pub session: SessionState,
}

/// Resolve the data directory: the given path, or the current directory.
pub fn resolve_directory(directory: Option<String>) -> Fallible<PathBuf> {
    let directory: PathBuf = match directory {
        Some(dir) => PathBuf::from(dir),
        None => current_dir()?,
    };
    if !directory.exists() {
        return fail("directory does not exist.");
    }
    Ok(directory.canonicalize()?)
}

impl Collection {
    pub fn new(directory: PathBuf, config: &Config) -> Fallible<Self> {
        let db = Database::new(&directory.join(&config.database))?;
        Self::with_storage(directory, Rc::new(db))
    }

    pub fn with_storage(directory: PathBuf, storage: SharedStorage) -> Fallible<Self> {
        Ok(Self {
            directory,
            files: FileRepository::open(storage.clone())?,
            slots: DifficultItemSlots::open(storage.clone())?,
            order: DisplayOrderState::open(storage.clone())?,
            session: SessionState::open(storage)?,
        })
    }

    /// Find a stored file by id or name.
    pub fn resolve(&self, id_or_name: &str) -> Fallible<FileId> {
        match self.files.find(id_or_name) {
            Some(file) => Ok(file.id),
            None => fail(format!("no such file: {id_or_name}")),
        }
    }

    /// Read a file from disk and store it under its file name.
    pub async fn import(&mut self, path: &Path, now: Timestamp) -> Fallible<FileId> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ErrorReport::new(format!("{}: {e}", path.display())))?;
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => return fail(format!("not a file: {}", path.display())),
        };
        let id = self.files.ingest(&name, &bytes, now)?;
        self.session.select_file(id, now)?;
        self.prune_orders()?;
        Ok(id)
    }

    /// Create a file holding only the header row.
    pub fn create(&mut self, name: &str, now: Timestamp) -> Fallible<FileId> {
        if self.files.find(name).is_some() {
            return fail(format!("a file named {name} already exists"));
        }
        let id = self
            .files
            .save(name, &format!("{}\n", kanjidrill_core::parser::HEADER), now)?;
        self.prune_orders()?;
        Ok(id)
    }

    pub fn remove_file(&mut self, id: FileId, now: Timestamp) -> Fallible<()> {
        self.files.remove(id)?;
        self.order.reset(OrderKey::File(id))?;
        self.session.deselect_file(id, now)
    }

    /// Rename and/or replace the content of a file.
    pub fn edit(
        &mut self,
        id: FileId,
        name: &str,
        content: &str,
        now: Timestamp,
    ) -> Fallible<()> {
        if let Some(replaced) = self.files.update(id, name, content, now)? {
            self.order.reset(OrderKey::File(replaced))?;
            self.session.deselect_file(replaced, now)?;
        }
        Ok(())
    }

    /// Load a file, make it the session's current list, and return its
    /// questions in display order.
    pub fn open_file(&mut self, id: FileId, now: Timestamp) -> Fallible<Vec<Question>> {
        self.files.load(id, now)?;
        if self.session.selected_file() != Some(id) || self.session.is_difficult_mode() {
            self.session.select_file(id, now)?;
        }
        let questions = self.files.questions().questions();
        Ok(self.order.arrange(OrderKey::File(id), questions))
    }

    /// Switch to the difficult view of a slot and return its questions in
    /// display order.
    pub fn open_difficult(&mut self, slot: SlotId, now: Timestamp) -> Fallible<Vec<Question>> {
        if !self.session.is_difficult_mode() || self.session.active_slot() != slot {
            self.session.select_difficult_mode(slot, now)?;
        }
        let questions = self.slots.slot(slot).questions();
        Ok(self.order.arrange(OrderKey::Difficult, &questions))
    }

    /// Shuffle the given list under `key` and return it in the new order.
    pub fn shuffle(&mut self, key: OrderKey, source: &[Question]) -> Fallible<Vec<Question>> {
        let mut rng = TinyRng::from_clock();
        self.order.shuffle(key, source, &mut rng)
    }

    /// Flag a question as difficult, in `slot` or else the active slot.
    pub fn mark(
        &mut self,
        question: &Question,
        slot: Option<SlotId>,
        now: Timestamp,
    ) -> Fallible<SlotId> {
        let slot = slot.unwrap_or_else(|| self.session.active_slot());
        self.slots.add(question, slot, now)?;
        Ok(slot)
    }

    /// Unflag a question, in `slot` or else the active slot.
    pub fn unmark(&mut self, question: &Question, slot: Option<SlotId>) -> Fallible<bool> {
        let slot = slot.unwrap_or_else(|| self.session.active_slot());
        self.slots.remove(question, slot)
    }

    pub fn close(self, now: Timestamp) -> Fallible<()> {
        self.files.close()?;
        self.slots.close()?;
        self.order.close()?;
        self.session.close(now)
    }

    fn prune_orders(&mut self) -> Fallible<()> {
        let live: Vec<FileId> = self.files.list().iter().map(|f| f.id).collect();
        self.order.retain_files(&live)
    }
}
