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

//! Key/value persistence. Every collection is stored whole, as one JSON
//! document under its own key.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ErrorReport;
use crate::error::Fallible;

pub trait Storage {
    fn get(&self, key: &str) -> Fallible<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Fallible<()>;

    fn remove(&self, key: &str) -> Fallible<()>;
}

/// A storage handle shared by the repositories of one process.
pub type SharedStorage = Rc<dyn Storage>;

/// Read and deserialize the document under `key`.
pub fn read_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Fallible<Option<T>> {
    match storage.get(key)? {
        Some(data) => {
            let value = serde_json::from_str(&data)
                .map_err(|e| ErrorReport::new(format!("corrupt data under '{key}': {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize `value` and replace the document under `key`.
pub fn write_json<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> Fallible<()> {
    let data = serde_json::to_string(value)?;
    log::debug!("Writing {} bytes to '{key}'", data.len());
    storage.set(key, &data)
}

/// Storage that lives and dies with the process.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<MemoryStorage> {
        Rc::new(Self::new())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Fallible<Option<String>> {
        Ok(self.inner.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Fallible<()> {
        self.inner
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Fallible<()> {
        self.inner.borrow_mut().remove(key);
        Ok(())
    }
}
