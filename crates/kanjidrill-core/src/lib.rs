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

//! kanjidrill-core: Core library for the kanjidrill drill.
//!
//! This library provides:
//! - Encoding detection for uploaded CSV files (UTF-8 or Shift_JIS)
//! - Parsing and validating question rows, and exporting them back to CSV
//! - Persistent stores for files, difficult-question slots, shuffle orders,
//!   and the study session, over a pluggable key/value [`Storage`]

pub mod encoding;
pub mod error;
pub mod parser;
pub mod rng;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use encoding::{EncodingTag, decode, detect};
pub use error::{ErrorReport, Fallible, fail};
pub use parser::{ParseError, ParseOutcome, export, parse};
pub use storage::{MemoryStorage, SharedStorage, Storage};
pub use store::files::{FileRepository, QuestionStore, StoredFile};
pub use store::order::{DisplayOrderState, OrderKey};
pub use store::session::{SessionSnapshot, SessionState};
pub use store::slots::{DifficultItem, DifficultItemSlots, DifficultSlot, SlotId};
pub use types::file_id::FileId;
pub use types::question::{Question, QuestionId};
pub use types::timestamp::Timestamp;
