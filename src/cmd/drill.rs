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

use kanjidrill_core::OrderKey;
use kanjidrill_core::Question;
use kanjidrill_core::SlotId;
use kanjidrill_core::Timestamp;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::stdin;
use tokio::select;
use tokio::signal;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::error::fail;

const HELP: &str = "Enter: reveal / next, m: mark as difficult, u: unmark, q: quit";

pub struct DrillConfig {
    /// File id or name. Defaults to the session's selected file.
    pub file: Option<String>,
    pub difficult: bool,
    /// Slot of the difficult view. Defaults to the session's active slot.
    pub slot: Option<SlotId>,
    pub shuffle: bool,
    pub reset_order: bool,
}

/// What the learner sees before revealing the answer.
fn prompt(q: &Question) -> String {
    if q.is_reading_mode {
        let marked = q.text.replacen(&q.target, &format!("［{}］", q.target), 1);
        format!("{marked}  (read the bracketed part)")
    } else {
        format!("{}  ({})", q.prompt(), q.reading)
    }
}

fn answer(q: &Question) -> &str {
    if q.is_reading_mode {
        &q.reading
    } else {
        &q.target
    }
}

enum Input {
    Line(String),
    Eof,
    Interrupt,
}

/// Pick the list to drill, record the choice in the session, and apply the
/// requested ordering.
fn prepare(coll: &mut Collection, config: &DrillConfig) -> Fallible<Vec<Question>> {
    let now = Timestamp::now();
    let (key, questions) = if config.difficult {
        let slot = config.slot.unwrap_or_else(|| coll.session.active_slot());
        (OrderKey::Difficult, coll.open_difficult(slot, now)?)
    } else {
        let id = match &config.file {
            Some(file) => coll.resolve(file)?,
            None => match coll.session.selected_file() {
                Some(id) => id,
                None => return fail("no file selected; pass a file name or id"),
            },
        };
        let questions = coll.open_file(id, now)?;
        for error in coll.files.questions().errors() {
            eprintln!("{error}");
        }
        (OrderKey::File(id), questions)
    };
    if config.reset_order {
        coll.order.reset(key)?;
    }
    if config.shuffle {
        coll.shuffle(key, &source_order(coll, key))
    } else if config.reset_order {
        Ok(source_order(coll, key))
    } else {
        Ok(questions)
    }
}

/// The unshuffled list behind `key`.
fn source_order(coll: &Collection, key: OrderKey) -> Vec<Question> {
    match key {
        OrderKey::File(_) => coll.files.questions().questions().to_vec(),
        OrderKey::Difficult => coll.slots.slot(coll.session.active_slot()).questions(),
    }
}

pub async fn drill(mut coll: Collection, config: DrillConfig) -> Fallible<()> {
    let questions = prepare(&mut coll, &config)?;
    if questions.is_empty() {
        println!("No questions.");
        return coll.close(Timestamp::now());
    }
    println!("{HELP}");
    let mut lines = BufReader::new(stdin()).lines();
    let total = questions.len();
    for (idx, q) in questions.iter().enumerate() {
        let star = if coll.slots.is_marked(q) { " ★" } else { "" };
        println!("\n[{}/{total}]{star} {}", idx + 1, prompt(q));
        if coll.session.is_answer_revealed(q) {
            println!("  → {}", answer(q));
        }
        loop {
            let input = select! {
                line = lines.next_line() => match line? {
                    Some(line) => Input::Line(line),
                    None => Input::Eof,
                },
                _ = signal::ctrl_c() => Input::Interrupt,
            };
            let line = match input {
                Input::Line(line) => line,
                Input::Eof => return coll.close(Timestamp::now()),
                Input::Interrupt => {
                    log::debug!("Received Ctrl+C, saving session");
                    return coll.close(Timestamp::now());
                }
            };
            match line.trim() {
                "" => {
                    if coll.session.is_answer_revealed(q) {
                        break;
                    }
                    coll.session
                        .set_answer_revealed(q, true, Timestamp::now())?;
                    println!("  → {}", answer(q));
                }
                "m" => {
                    let slot = coll.mark(q, config.slot, Timestamp::now())?;
                    println!("  marked in {}", coll.slots.slot(slot).name);
                }
                "u" => {
                    if coll.unmark(q, config.slot)? {
                        println!("  unmarked");
                    } else {
                        println!("  not marked in this slot");
                    }
                }
                "q" => return coll.close(Timestamp::now()),
                other => println!("Unknown command '{other}'. {HELP}"),
            }
        }
    }
    println!("\nSession completed.");
    coll.close(Timestamp::now())
}

#[cfg(test)]
mod tests {
    use kanjidrill_core::MemoryStorage;

    use super::*;
    use crate::helper::create_tmp_directory;

    const SAMPLE: &str = "text,question,reading,isReading\n今日は晴天です。,晴天,せいてん,0\n雨が降る,雨,あめ,1\n";

    fn config(file: Option<&str>) -> DrillConfig {
        DrillConfig {
            file: file.map(str::to_string),
            difficult: false,
            slot: None,
            shuffle: false,
            reset_order: false,
        }
    }

    #[test]
    fn test_prompt_and_answer() {
        let write = Question::new("今日は晴天です。", "晴天", "せいてん", false);
        assert_eq!(prompt(&write), "今日は□□です。  (せいてん)");
        assert_eq!(answer(&write), "晴天");
        let read = Question::new("雨が降る", "雨", "あめ", true);
        assert_eq!(prompt(&read), "［雨］が降る  (read the bracketed part)");
        assert_eq!(answer(&read), "あめ");
    }

    #[test]
    fn test_prepare_without_selection_fails() -> Fallible<()> {
        let mut coll = Collection::with_storage(create_tmp_directory()?, MemoryStorage::shared())?;
        assert!(prepare(&mut coll, &config(None)).is_err());
        Ok(())
    }

    #[test]
    fn test_prepare_uses_selected_file() -> Fallible<()> {
        let mut coll = Collection::with_storage(create_tmp_directory()?, MemoryStorage::shared())?;
        let id = coll.files.save("a.csv", SAMPLE, Timestamp::now())?;
        coll.session.select_file(id, Timestamp::now())?;
        let questions = prepare(&mut coll, &config(None))?;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].target, "晴天");
        Ok(())
    }

    #[test]
    fn test_prepare_shuffle_then_reset() -> Fallible<()> {
        let mut coll = Collection::with_storage(create_tmp_directory()?, MemoryStorage::shared())?;
        let id = coll.files.save("a.csv", SAMPLE, Timestamp::now())?;
        let mut cfg = config(Some("a.csv"));
        cfg.shuffle = true;
        let shuffled = prepare(&mut coll, &cfg)?;
        assert_eq!(shuffled.len(), 2);
        assert!(coll.order.is_shuffled(OrderKey::File(id), 2));
        cfg.shuffle = false;
        cfg.reset_order = true;
        let reset = prepare(&mut coll, &cfg)?;
        assert_eq!(reset[0].target, "晴天");
        assert!(!coll.order.is_shuffled(OrderKey::File(id), 2));
        Ok(())
    }

    #[test]
    fn test_prepare_difficult_view() -> Fallible<()> {
        let mut coll = Collection::with_storage(create_tmp_directory()?, MemoryStorage::shared())?;
        let q = Question::new("雨が降る", "雨", "あめ", true);
        coll.mark(&q, Some(SlotId::Slot2), Timestamp::now())?;
        let mut cfg = config(None);
        cfg.difficult = true;
        cfg.slot = Some(SlotId::Slot2);
        assert_eq!(prepare(&mut coll, &cfg)?, vec![q]);
        assert!(coll.session.is_difficult_mode());
        assert_eq!(coll.session.active_slot(), SlotId::Slot2);
        Ok(())
    }
}
