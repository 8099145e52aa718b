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

//! Five fixed buckets of questions the learner flagged as difficult.

use std::collections::HashSet;
use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::storage::SharedStorage;
use crate::storage::read_json;
use crate::storage::write_json;
use crate::types::question::Question;
use crate::types::question::QuestionId;
use crate::types::timestamp::Timestamp;

pub const SLOTS_KEY: &str = "kanjidrill_difficult_slots";

/// The single list used before slots existed. Read once, then deleted.
pub const LEGACY_KEY: &str = "difficult_questions";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum SlotId {
    #[default]
    #[serde(rename = "slot-1")]
    Slot1,
    #[serde(rename = "slot-2")]
    Slot2,
    #[serde(rename = "slot-3")]
    Slot3,
    #[serde(rename = "slot-4")]
    Slot4,
    #[serde(rename = "slot-5")]
    Slot5,
}

impl SlotId {
    pub const ALL: [SlotId; 5] = [
        SlotId::Slot1,
        SlotId::Slot2,
        SlotId::Slot3,
        SlotId::Slot4,
        SlotId::Slot5,
    ];

    /// 1 through 5.
    pub fn number(self) -> usize {
        match self {
            SlotId::Slot1 => 1,
            SlotId::Slot2 => 2,
            SlotId::Slot3 => 3,
            SlotId::Slot4 => 4,
            SlotId::Slot5 => 5,
        }
    }

    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    fn index(self) -> usize {
        self.number() - 1
    }

    fn default_name(self) -> String {
        format!("Slot {}", self.number())
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot-{}", self.number())
    }
}

impl FromStr for SlotId {
    type Err = ErrorReport;

    /// Accepts `slot-3` or just `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("slot-").unwrap_or(s);
        digits
            .parse::<usize>()
            .ok()
            .and_then(SlotId::from_number)
            .ok_or_else(|| ErrorReport::new(format!("invalid slot: {s} (expected 1 to 5)")))
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DifficultItem {
    #[serde(flatten)]
    pub question: Question,
    pub id: QuestionId,
    #[serde(rename = "timestamp")]
    pub added_at: Timestamp,
}

impl DifficultItem {
    fn new(question: Question, added_at: Timestamp) -> Self {
        Self {
            id: question.id(),
            question,
            added_at,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DifficultSlot {
    pub id: SlotId,
    pub name: String,
    /// In the order they were added.
    #[serde(rename = "questions")]
    pub items: Vec<DifficultItem>,
}

impl DifficultSlot {
    fn empty(id: SlotId) -> Self {
        Self {
            id,
            name: id.default_name(),
            items: Vec::new(),
        }
    }

    pub fn contains(&self, id: &QuestionId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    pub fn questions(&self) -> Vec<Question> {
        self.items.iter().map(|item| item.question.clone()).collect()
    }
}

/// An entry of the legacy list. Its stored id predates the reading-mode flag,
/// so only the question fields are kept.
#[derive(Deserialize)]
struct LegacyItem {
    #[serde(flatten)]
    question: Question,
    #[serde(default)]
    timestamp: Timestamp,
}

pub struct DifficultItemSlots {
    storage: SharedStorage,
    /// Always exactly one slot per [`SlotId`], in [`SlotId::ALL`] order.
    slots: Vec<DifficultSlot>,
}

impl DifficultItemSlots {
    /// Load the slots, migrating the legacy single list into slot 1 if the
    /// slot store does not exist yet.
    pub fn open(storage: SharedStorage) -> Fallible<Self> {
        let stored: Option<Vec<DifficultSlot>> = read_json(storage.as_ref(), SLOTS_KEY)?;
        let migrate = stored.is_none();
        let mut repo = Self {
            slots: normalize(stored.unwrap_or_default()),
            storage,
        };
        if migrate {
            repo.migrate_legacy()?;
        }
        Ok(repo)
    }

    fn migrate_legacy(&mut self) -> Fallible<()> {
        let legacy: Option<Vec<LegacyItem>> = read_json(self.storage.as_ref(), LEGACY_KEY)?;
        if let Some(legacy) = legacy {
            log::debug!("Migrating {} legacy difficult questions to slot 1", legacy.len());
            let items: Vec<DifficultItem> = legacy
                .into_iter()
                .map(|item| DifficultItem::new(item.question, item.timestamp))
                .collect();
            self.slots[SlotId::Slot1.index()].items = dedup(items);
        }
        // Writing the slot store first means a crash in between leaves the
        // legacy key behind, but it is never read again.
        self.flush()?;
        self.storage.remove(LEGACY_KEY)
    }

    pub fn slots(&self) -> &[DifficultSlot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> &DifficultSlot {
        &self.slots[id.index()]
    }

    /// Add `question` to a slot. Returns false, and changes nothing, if the
    /// slot already holds it.
    pub fn add(&mut self, question: &Question, slot: SlotId, now: Timestamp) -> Fallible<bool> {
        let id = question.id();
        let target = &mut self.slots[slot.index()];
        if target.contains(&id) {
            return Ok(false);
        }
        target.items.push(DifficultItem::new(question.clone(), now));
        self.flush()?;
        Ok(true)
    }

    /// Remove `question` from one slot. Returns false if it was not there.
    pub fn remove(&mut self, question: &Question, slot: SlotId) -> Fallible<bool> {
        self.remove_id(&question.id(), slot)
    }

    /// Remove the item of `slot` whose identity digest starts with `prefix`.
    pub fn remove_by_digest(&mut self, slot: SlotId, prefix: &str) -> Fallible<DifficultItem> {
        let matches: Vec<&DifficultItem> = self
            .slot(slot)
            .items
            .iter()
            .filter(|item| item.id.matches_digest(prefix))
            .collect();
        let item = match matches.as_slice() {
            [item] => (*item).clone(),
            [] => return fail(format!("no question in {slot} matches '{prefix}'")),
            _ => return fail(format!("'{prefix}' matches several questions in {slot}")),
        };
        self.remove_id(&item.id, slot)?;
        Ok(item)
    }

    fn remove_id(&mut self, id: &QuestionId, slot: SlotId) -> Fallible<bool> {
        let target = &mut self.slots[slot.index()];
        let before = target.items.len();
        target.items.retain(|item| &item.id != id);
        if target.items.len() == before {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// True if any slot holds `question`.
    pub fn is_marked(&self, question: &Question) -> bool {
        let id = question.id();
        self.slots.iter().any(|slot| slot.contains(&id))
    }

    /// Empty one slot.
    pub fn clear(&mut self, slot: SlotId) -> Fallible<()> {
        self.slots[slot.index()].items.clear();
        self.flush()
    }

    pub fn flush(&self) -> Fallible<()> {
        write_json(self.storage.as_ref(), SLOTS_KEY, &self.slots)
    }

    pub fn close(self) -> Fallible<()> {
        self.flush()
    }
}

/// Bring a stored slot list into the fixed five-slot shape.
fn normalize(stored: Vec<DifficultSlot>) -> Vec<DifficultSlot> {
    let mut slots: Vec<DifficultSlot> = SlotId::ALL.into_iter().map(DifficultSlot::empty).collect();
    for mut slot in stored {
        for item in slot.items.iter_mut() {
            item.id = item.question.id();
        }
        slot.items = dedup(slot.items);
        let index = slot.id.index();
        slots[index] = slot;
    }
    slots
}

/// Keep the first item of each identity.
fn dedup(items: Vec<DifficultItem>) -> Vec<DifficultItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::storage::Storage;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn sunny() -> Question {
        Question::new("今日は晴れた日です。", "晴", "は", false)
    }

    fn rainy() -> Question {
        Question::new("雨が降る", "雨", "あめ", true)
    }

    #[test]
    fn test_five_slots() -> Fallible<()> {
        let slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        let ids: Vec<SlotId> = slots.slots().iter().map(|s| s.id).collect();
        assert_eq!(ids, SlotId::ALL.to_vec());
        assert_eq!(slots.slot(SlotId::Slot3).name, "Slot 3");
        Ok(())
    }

    #[test]
    fn test_add_is_idempotent() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        assert!(slots.add(&sunny(), SlotId::Slot2, ts(1))?);
        assert!(!slots.add(&sunny(), SlotId::Slot2, ts(2))?);
        let slot = slots.slot(SlotId::Slot2);
        assert_eq!(slot.items.len(), 1);
        assert_eq!(slot.items[0].added_at, ts(1));
        Ok(())
    }

    #[test]
    fn test_is_marked_checks_every_slot() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        assert!(!slots.is_marked(&sunny()));
        slots.add(&sunny(), SlotId::Slot4, ts(1))?;
        assert!(slots.is_marked(&sunny()));
        slots.add(&sunny(), SlotId::Slot1, ts(1))?;
        slots.remove(&sunny(), SlotId::Slot4)?;
        assert!(slots.is_marked(&sunny()));
        slots.remove(&sunny(), SlotId::Slot1)?;
        assert!(!slots.is_marked(&sunny()));
        Ok(())
    }

    #[test]
    fn test_remove_absent_is_fine() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        assert!(!slots.remove(&sunny(), SlotId::Slot1)?);
        Ok(())
    }

    #[test]
    fn test_reading_mode_is_part_of_identity() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        let mut reading = sunny();
        reading.is_reading_mode = true;
        slots.add(&sunny(), SlotId::Slot1, ts(1))?;
        slots.add(&reading, SlotId::Slot1, ts(1))?;
        assert_eq!(slots.slot(SlotId::Slot1).items.len(), 2);
        Ok(())
    }

    #[test]
    fn test_clear_only_touches_one_slot() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        slots.add(&sunny(), SlotId::Slot1, ts(1))?;
        slots.add(&rainy(), SlotId::Slot2, ts(1))?;
        slots.clear(SlotId::Slot1)?;
        assert!(slots.slot(SlotId::Slot1).items.is_empty());
        assert_eq!(slots.slot(SlotId::Slot2).questions(), vec![rainy()]);
        Ok(())
    }

    #[test]
    fn test_insertion_order_and_persistence() -> Fallible<()> {
        let storage = MemoryStorage::shared();
        let mut slots = DifficultItemSlots::open(storage.clone())?;
        slots.add(&rainy(), SlotId::Slot5, ts(2))?;
        slots.add(&sunny(), SlotId::Slot5, ts(1))?;
        let slots = DifficultItemSlots::open(storage)?;
        assert_eq!(slots.slot(SlotId::Slot5).questions(), vec![rainy(), sunny()]);
        Ok(())
    }

    #[test]
    fn test_legacy_migration_runs_once() -> Fallible<()> {
        let storage = MemoryStorage::shared();
        let legacy = r#"[
            {"text":"今日は晴れた日です。","kanji":"晴","reading":"は","id":"x","timestamp":5},
            {"text":"雨が降る","question":"雨","reading":"あめ","isReading":true,"id":"y","timestamp":6}
        ]"#;
        storage.set(LEGACY_KEY, legacy)?;

        let mut slots = DifficultItemSlots::open(storage.clone())?;
        assert_eq!(slots.slot(SlotId::Slot1).questions(), vec![sunny(), rainy()]);
        assert_eq!(slots.slot(SlotId::Slot1).items[0].added_at, ts(5));
        assert_eq!(storage.get(LEGACY_KEY)?, None);

        // A legacy key written after migration is ignored.
        slots.clear(SlotId::Slot1)?;
        storage.set(LEGACY_KEY, legacy)?;
        let slots = DifficultItemSlots::open(storage.clone())?;
        assert!(slots.slot(SlotId::Slot1).items.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_legacy_list_is_consumed() -> Fallible<()> {
        let storage = MemoryStorage::shared();
        storage.set(LEGACY_KEY, "[]")?;
        let slots = DifficultItemSlots::open(storage.clone())?;
        assert!(slots.slots().iter().all(|s| s.items.is_empty()));
        assert_eq!(storage.get(LEGACY_KEY)?, None);
        assert!(storage.get(SLOTS_KEY)?.is_some());
        Ok(())
    }

    #[test]
    fn test_partial_store_is_normalized() -> Fallible<()> {
        let storage = MemoryStorage::shared();
        storage.set(
            SLOTS_KEY,
            r#"[{"id":"slot-3","name":"Verbs","questions":[]}]"#,
        )?;
        let slots = DifficultItemSlots::open(storage)?;
        assert_eq!(slots.slots().len(), 5);
        assert_eq!(slots.slot(SlotId::Slot3).name, "Verbs");
        assert_eq!(slots.slot(SlotId::Slot1).name, "Slot 1");
        Ok(())
    }

    #[test]
    fn test_stored_items_land_in_their_slot() -> Fallible<()> {
        let storage = MemoryStorage::shared();
        let item = r#"{"text":"今日は晴れた日です。","question":"晴","reading":"は","isReading":false,"id":"stale","timestamp":5}"#;
        storage.set(
            SLOTS_KEY,
            &format!(r#"[{{"id":"slot-2","name":"Slot 2","questions":[{item},{item}]}}]"#),
        )?;
        let slots = DifficultItemSlots::open(storage)?;
        assert!(slots.slot(SlotId::Slot1).items.is_empty());
        let items = &slots.slot(SlotId::Slot2).items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, sunny().id());
        assert_eq!(items[0].added_at, ts(5));
        Ok(())
    }

    #[test]
    fn test_remove_by_digest() -> Fallible<()> {
        let mut slots = DifficultItemSlots::open(MemoryStorage::shared())?;
        slots.add(&sunny(), SlotId::Slot1, ts(1))?;
        let digest = sunny().id().digest();
        assert!(slots.remove_by_digest(SlotId::Slot2, &digest[..10]).is_err());
        let removed = slots.remove_by_digest(SlotId::Slot1, &digest[..10])?;
        assert_eq!(removed.question, sunny());
        assert!(!slots.is_marked(&sunny()));
        Ok(())
    }

    #[test]
    fn test_slot_id_parsing() {
        assert_eq!("3".parse::<SlotId>().ok(), Some(SlotId::Slot3));
        assert_eq!("slot-5".parse::<SlotId>().ok(), Some(SlotId::Slot5));
        assert!("0".parse::<SlotId>().is_err());
        assert!("6".parse::<SlotId>().is_err());
        assert_eq!(SlotId::Slot2.to_string(), "slot-2");
    }
}
