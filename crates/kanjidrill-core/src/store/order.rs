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

//! Persisted shuffle orders, one per file and one for the difficult view.

use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::error::Fallible;
use crate::rng::TinyRng;
use crate::rng::permutation;
use crate::storage::SharedStorage;
use crate::storage::read_json;
use crate::storage::write_json;
use crate::types::file_id::FileId;

pub const ORDERS_KEY: &str = "kanjidrill_shuffle_orders";

const DIFFICULT_KEY: &str = "difficult";

/// Which question list an order belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OrderKey {
    File(FileId),
    Difficult,
}

impl Display for OrderKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKey::File(id) => write!(f, "{id}"),
            OrderKey::Difficult => write!(f, "{DIFFICULT_KEY}"),
        }
    }
}

pub struct DisplayOrderState {
    storage: SharedStorage,
    /// Indices into the unshuffled question list, keyed by [`OrderKey`].
    orders: HashMap<String, Vec<usize>>,
}

impl DisplayOrderState {
    pub fn open(storage: SharedStorage) -> Fallible<Self> {
        let orders = read_json(storage.as_ref(), ORDERS_KEY)?.unwrap_or_default();
        Ok(Self { storage, orders })
    }

    /// Draw a fresh random order for `source`, store it under `key`, and
    /// return the shuffled list.
    pub fn shuffle<T: Clone>(
        &mut self,
        key: OrderKey,
        source: &[T],
        rng: &mut TinyRng,
    ) -> Fallible<Vec<T>> {
        let order = permutation(source.len(), rng);
        let shuffled = order.iter().map(|&i| source[i].clone()).collect();
        self.orders.insert(key.to_string(), order);
        self.flush()?;
        Ok(shuffled)
    }

    /// Forget the order under `key`, so the list reads in source order again.
    pub fn reset(&mut self, key: OrderKey) -> Fallible<()> {
        if self.orders.remove(&key.to_string()).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// The order stored under `key`, if it still fits a list of `len`
    /// questions.
    pub fn order(&self, key: OrderKey, len: usize) -> Option<&[usize]> {
        let order = self.orders.get(&key.to_string())?;
        if order.len() != len {
            log::warn!(
                "Ignoring stale shuffle order for {key}: {} indices for {len} questions",
                order.len()
            );
            return None;
        }
        if order.iter().any(|&i| i >= len) {
            return None;
        }
        Some(order)
    }

    /// `source` in display order: shuffled if a fitting order is stored,
    /// unchanged otherwise.
    pub fn arrange<T: Clone>(&self, key: OrderKey, source: &[T]) -> Vec<T> {
        match self.order(key, source.len()) {
            Some(order) => order.iter().map(|&i| source[i].clone()).collect(),
            None => source.to_vec(),
        }
    }

    pub fn is_shuffled(&self, key: OrderKey, len: usize) -> bool {
        self.order(key, len).is_some()
    }

    /// Drop the orders of files not in `files`.
    pub fn retain_files(&mut self, files: &[FileId]) -> Fallible<()> {
        let live: Vec<String> = files.iter().map(|id| id.to_string()).collect();
        let before = self.orders.len();
        self.orders
            .retain(|key, _| key == DIFFICULT_KEY || live.contains(key));
        if self.orders.len() != before {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Fallible<()> {
        write_json(self.storage.as_ref(), ORDERS_KEY, &self.orders)
    }

    pub fn close(self) -> Fallible<()> {
        self.flush()
    }
}
