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

//! The study session: which list is open and which answers are showing.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::storage::SharedStorage;
use crate::storage::read_json;
use crate::storage::write_json;
use crate::store::slots::SlotId;
use crate::types::file_id::FileId;
use crate::types::question::Question;
use crate::types::timestamp::Timestamp;

pub const SESSION_KEY: &str = "kanjidrill_app_state";

/// The menu value of the difficult-questions view.
pub const DIFFICULT_MENU: &str = "difficult-only";

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    pub selected_file_id: Option<FileId>,
    /// The file id as a string, [`DIFFICULT_MENU`], or empty.
    #[serde(rename = "selectedMenu")]
    pub selected_menu_value: String,
    #[serde(rename = "showDifficultOnly")]
    pub is_difficult_only_mode: bool,
    #[serde(rename = "difficultSlotId")]
    pub active_slot_id: SlotId,
    /// Keyed by question identity.
    #[serde(rename = "shownAnswers")]
    pub revealed_answers: BTreeMap<String, bool>,
    #[serde(rename = "lastUpdated")]
    pub saved_at: Timestamp,
}

pub struct SessionState {
    storage: SharedStorage,
    snapshot: SessionSnapshot,
}

impl SessionState {
    pub fn open(storage: SharedStorage) -> Fallible<Self> {
        let snapshot = read_json(storage.as_ref(), SESSION_KEY)?.unwrap_or_default();
        Ok(Self { storage, snapshot })
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn selected_file(&self) -> Option<FileId> {
        self.snapshot.selected_file_id
    }

    pub fn is_difficult_mode(&self) -> bool {
        self.snapshot.is_difficult_only_mode
    }

    pub fn active_slot(&self) -> SlotId {
        self.snapshot.active_slot_id
    }

    pub fn set_answer_revealed(
        &mut self,
        question: &Question,
        shown: bool,
        now: Timestamp,
    ) -> Fallible<()> {
        self.snapshot
            .revealed_answers
            .insert(question.id().as_str().to_string(), shown);
        self.flush(now)
    }

    pub fn is_answer_revealed(&self, question: &Question) -> bool {
        self.snapshot
            .revealed_answers
            .get(question.id().as_str())
            .copied()
            .unwrap_or(false)
    }

    /// Open a file. Starts a fresh session: every answer is hidden again.
    pub fn select_file(&mut self, id: FileId, now: Timestamp) -> Fallible<()> {
        self.snapshot.selected_file_id = Some(id);
        self.snapshot.selected_menu_value = id.to_string();
        self.snapshot.is_difficult_only_mode = false;
        self.snapshot.revealed_answers.clear();
        self.flush(now)
    }

    /// Switch to the difficult view of `slot`. Starts a fresh session.
    pub fn select_difficult_mode(&mut self, slot: SlotId, now: Timestamp) -> Fallible<()> {
        self.snapshot.selected_file_id = None;
        self.snapshot.selected_menu_value = DIFFICULT_MENU.to_string();
        self.snapshot.is_difficult_only_mode = true;
        self.snapshot.active_slot_id = slot;
        self.snapshot.revealed_answers.clear();
        self.flush(now)
    }

    /// Change the active slot without touching anything else.
    pub fn select_slot(&mut self, slot: SlotId, now: Timestamp) -> Fallible<()> {
        self.snapshot.active_slot_id = slot;
        self.flush(now)
    }

    /// Forget the selected file if it is `id`.
    pub fn deselect_file(&mut self, id: FileId, now: Timestamp) -> Fallible<()> {
        if self.snapshot.selected_file_id != Some(id) {
            return Ok(());
        }
        self.snapshot.selected_file_id = None;
        self.snapshot.selected_menu_value.clear();
        self.snapshot.revealed_answers.clear();
        self.flush(now)
    }

    pub fn reset(&mut self, now: Timestamp) -> Fallible<()> {
        self.snapshot = SessionSnapshot::default();
        self.flush(now)
    }

    pub fn flush(&mut self, now: Timestamp) -> Fallible<()> {
        self.snapshot.saved_at = now;
        write_json(self.storage.as_ref(), SESSION_KEY, &self.snapshot)
    }

    /// Flush on the way out.
    pub fn close(mut self, now: Timestamp) -> Fallible<()> {
        self.flush(now)
    }
}
