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

use kanjidrill_core::SlotId;
use kanjidrill_core::Timestamp;

use crate::collection::Collection;
use crate::error::Fallible;

/// How many hex digits of an identity digest to print.
const DIGEST_WIDTH: usize = 10;

pub fn list_slots(coll: &Collection) -> Fallible<()> {
    let active = coll.session.active_slot();
    for slot in coll.slots.slots() {
        let marker = if slot.id == active { "*" } else { " " };
        println!("{marker} {} {} ({})", slot.id.number(), slot.name, slot.items.len());
    }
    Ok(())
}

pub fn show_slot(coll: &Collection, slot: SlotId) -> Fallible<()> {
    let slot = coll.slots.slot(slot);
    if slot.items.is_empty() {
        println!("{} is empty.", slot.name);
        return Ok(());
    }
    for item in &slot.items {
        let digest = item.id.digest();
        let q = &item.question;
        println!(
            "{}  {}  {} ({})  added {}",
            &digest[..DIGEST_WIDTH],
            q.text,
            q.target,
            q.reading,
            item.added_at
        );
    }
    Ok(())
}

pub fn clear_slot(coll: &mut Collection, slot: SlotId) -> Fallible<()> {
    coll.slots.clear(slot)?;
    println!("Cleared {}.", coll.slots.slot(slot).name);
    Ok(())
}

pub fn select_slot(coll: &mut Collection, slot: SlotId) -> Fallible<()> {
    coll.session.select_slot(slot, Timestamp::now())?;
    println!("Active slot: {}.", coll.slots.slot(slot).name);
    Ok(())
}

pub fn unmark(coll: &mut Collection, slot: SlotId, digest: &str) -> Fallible<()> {
    let item = coll.slots.remove_by_digest(slot, digest)?;
    println!("Removed {} from {}.", item.question.text, coll.slots.slot(slot).name);
    Ok(())
}
