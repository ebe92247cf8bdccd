// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Commit-ordered audit feed over all ledger entries.
//!
//! Combines an id-indexed map for O(1) lookup with a FIFO queue that
//! preserves global commit order. The ledger writes here once per committed
//! entry; readers may look entries up by id, collect a sale's entries by
//! order reference, or drain the feed for export.

use crate::base::{EntryId, OrderId};
use crate::movement::LedgerEntry;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use std::sync::Arc;

/// A thread-safe feed of committed ledger entries.
///
/// All operations are safe for concurrent access. Draining consumes the
/// FIFO order queue but leaves entries addressable by id.
#[derive(Debug, Default)]
pub struct AuditLog {
    /// Entries indexed by id for O(1) lookup.
    entries: DashMap<EntryId, Arc<LedgerEntry>>,

    /// Entry IDs in global commit order.
    order: SegQueue<EntryId>,
}

impl AuditLog {
    /// Creates a new empty feed.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: SegQueue::new(),
        }
    }

    /// Records a committed entry. Called by the ledger at commit time only;
    /// entry IDs are allocated from a single sequence and cannot repeat.
    pub(crate) fn record(&self, entry: Arc<LedgerEntry>) {
        let id = entry.id;
        debug_assert!(
            !self.entries.contains_key(&id),
            "audit feed saw entry {} twice",
            id
        );
        self.entries.insert(id, entry);
        self.order.push(id);
    }

    /// Looks up a committed entry by id.
    pub fn entry(&self, id: EntryId) -> Option<Arc<LedgerEntry>> {
        self.entries.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Collects the entries written on behalf of one order.
    pub fn for_order(&self, order_id: OrderId) -> Vec<Arc<LedgerEntry>> {
        let mut found: Vec<Arc<LedgerEntry>> = self
            .entries
            .iter()
            .filter(|e| e.value().reference == Some(order_id))
            .map(|e| Arc::clone(e.value()))
            .collect();
        found.sort_by_key(|e| e.id.0);
        found
    }

    /// Drains the feed in commit order.
    ///
    /// Concurrent commits that race with the drain stay queued for the next
    /// call. Drained entries remain addressable via [`AuditLog::entry`].
    pub fn drain(&self) -> Vec<Arc<LedgerEntry>> {
        let mut drained = Vec::new();
        while let Some(id) = self.order.pop() {
            if let Some(entry) = self.entry(id) {
                drained.push(entry);
            }
        }
        drained
    }

    /// Number of entries recorded since creation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
