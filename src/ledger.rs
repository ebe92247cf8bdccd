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

//! Stock ledger.
//!
//! The authoritative record of quantity on hand per product and the
//! append-only history of changes. Invariant: at every committed state,
//! `on_hand == sum of all entry deltas` for the product. The counter and
//! the history live behind one mutex per product, so the two writes of an
//! applied entry are never observed independently.
//!
//! # Example
//!
//! ```
//! use stock_ledger_rs::{MovementKind, ProductId, StockLedger};
//!
//! let ledger = StockLedger::new();
//! ledger.register(ProductId(1)).unwrap();
//! ledger
//!     .apply(ProductId(1), 25, MovementKind::Purchase, None, "initial stock")
//!     .unwrap();
//! assert_eq!(ledger.current_stock(ProductId(1)).unwrap(), 25);
//! ```

use crate::audit::AuditLog;
use crate::base::{EntryId, OrderId, ProductId};
use crate::error::StockError;
use crate::movement::{LedgerEntry, MovementKind};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct StockData {
    product_id: ProductId,
    on_hand: i64,
    entries: Vec<LedgerEntry>,
}

impl StockData {
    fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            on_hand: 0,
            entries: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.on_hand,
            self.entries.iter().map(|e| e.delta).sum::<i64>(),
            "Invariant violated: on-hand for product {} diverged from its ledger",
            self.product_id
        );
    }

    /// Applies one entry: moves the counter and appends the history together.
    fn apply(&mut self, entry: LedgerEntry) {
        self.on_hand += entry.delta;
        self.entries.push(entry);
    }
}

/// Per-product stock record: the mutable counter plus its entry history,
/// guarded by a single mutex.
#[derive(Debug)]
struct StockRecord {
    inner: Mutex<StockData>,
}

impl StockRecord {
    fn new(product_id: ProductId) -> Self {
        Self {
            inner: Mutex::new(StockData::new(product_id)),
        }
    }

    fn on_hand(&self) -> i64 {
        self.inner.lock().on_hand
    }

    fn history(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.clone()
    }
}

/// An open unit of work over a locked set of products.
///
/// Created by [`StockLedger::unit_of_work`]. Entries staged here become
/// durable only when the closure returns `Ok`; on error or unwind the locks
/// are released with nothing applied.
pub struct StockTxn<'a> {
    locked: Vec<(ProductId, MutexGuard<'a, StockData>)>,
    staged: Vec<LedgerEntry>,
    entry_ids: &'a AtomicU64,
}

impl StockTxn<'_> {
    /// Available quantity for a product in the locked set: the committed
    /// on-hand plus every delta staged so far in this unit of work.
    pub fn available(&self, product_id: ProductId) -> Result<i64, StockError> {
        let guard = self
            .locked
            .iter()
            .find(|(id, _)| *id == product_id)
            .map(|(_, guard)| guard)
            .ok_or(StockError::ProductNotFound(product_id))?;

        let staged: i64 = self
            .staged
            .iter()
            .filter(|e| e.product_id == product_id)
            .map(|e| e.delta)
            .sum();

        Ok(guard.on_hand + staged)
    }

    /// Stages an entry against a product in the locked set.
    ///
    /// # Errors
    ///
    /// - [`StockError::ZeroDelta`] - `delta` is zero.
    /// - [`StockError::ProductNotFound`] - the product is not part of this
    ///   unit of work.
    pub fn stage(
        &mut self,
        product_id: ProductId,
        delta: i64,
        kind: MovementKind,
        reference: Option<OrderId>,
        note: &str,
    ) -> Result<LedgerEntry, StockError> {
        if delta == 0 {
            return Err(StockError::ZeroDelta);
        }
        if !self.locked.iter().any(|(id, _)| *id == product_id) {
            return Err(StockError::ProductNotFound(product_id));
        }

        let entry = LedgerEntry {
            id: EntryId(self.entry_ids.fetch_add(1, Ordering::Relaxed)),
            product_id,
            delta,
            kind,
            reference,
            note: note.to_string(),
            created_at: Utc::now(),
        };
        self.staged.push(entry.clone());
        Ok(entry)
    }

    /// Number of entries staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

/// The stock ledger: one record per registered product, plus the audit feed
/// of everything committed.
///
/// Records are held in a concurrent map of `Arc`ed mutexes. Lookups clone
/// the `Arc` out, so no map shard lock is ever held while waiting on a
/// record mutex.
#[derive(Debug)]
pub struct StockLedger {
    records: DashMap<ProductId, Arc<StockRecord>>,
    entry_ids: AtomicU64,
    audit: AuditLog,
}

impl StockLedger {
    /// Bounded wait for a contended product record before the operation
    /// fails with [`StockError::Conflict`].
    pub const LOCK_TIMEOUT: Duration = Duration::from_millis(200);

    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            entry_ids: AtomicU64::new(1),
            audit: AuditLog::new(),
        }
    }

    /// Creates an empty record for a product.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::DuplicateProduct`] if the product already has
    /// a record.
    pub fn register(&self, product_id: ProductId) -> Result<(), StockError> {
        // Entry API for atomic check-and-insert.
        match self.records.entry(product_id) {
            Entry::Occupied(_) => Err(StockError::DuplicateProduct(product_id)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(StockRecord::new(product_id)));
                Ok(())
            }
        }
    }

    /// Whether a product has a record.
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.records.contains_key(&product_id)
    }

    /// Appends one entry and moves the product's on-hand counter by its
    /// delta, as a single unit of work.
    ///
    /// The resulting stock may be any sign; availability policy belongs to
    /// the caller.
    ///
    /// # Errors
    ///
    /// - [`StockError::ProductNotFound`] - no record for the product.
    /// - [`StockError::ZeroDelta`] - `delta` is zero.
    /// - [`StockError::Conflict`] - the record stayed contended past
    ///   [`StockLedger::LOCK_TIMEOUT`].
    pub fn apply(
        &self,
        product_id: ProductId,
        delta: i64,
        kind: MovementKind,
        reference: Option<OrderId>,
        note: &str,
    ) -> Result<LedgerEntry, StockError> {
        self.unit_of_work(&[product_id], |txn| {
            txn.stage(product_id, delta, kind, reference, note)
        })
    }

    /// Point-in-time quantity on hand, consistent with the latest committed
    /// entry.
    pub fn current_stock(&self, product_id: ProductId) -> Result<i64, StockError> {
        Ok(self.record(product_id)?.on_hand())
    }

    /// Committed entries for a product, in append order.
    pub fn history(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>, StockError> {
        Ok(self.record(product_id)?.history())
    }

    /// The feed of all committed entries.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Runs `f` as an atomic unit of work over the given products.
    ///
    /// The product set is deduplicated and locked in ascending id order, so
    /// overlapping units of work on any thread interleave without lock-order
    /// deadlocks. Each acquisition waits at most
    /// [`StockLedger::LOCK_TIMEOUT`].
    ///
    /// If `f` returns `Ok`, every staged entry is committed: counters moved,
    /// histories appended, the audit feed notified. If `f` returns `Err` or
    /// unwinds, the locks are released with nothing applied. Other readers
    /// never observe a partial state in either case.
    pub fn unit_of_work<T>(
        &self,
        product_ids: &[ProductId],
        f: impl FnOnce(&mut StockTxn<'_>) -> Result<T, StockError>,
    ) -> Result<T, StockError> {
        let mut ids = product_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Resolve every record up front so an unknown product fails before
        // any lock is taken.
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = self
                .records
                .get(id)
                .map(|r| Arc::clone(r.value()))
                .ok_or(StockError::ProductNotFound(*id))?;
            records.push((*id, record));
        }

        let mut locked = Vec::with_capacity(records.len());
        for (id, record) in &records {
            let guard = record
                .inner
                .try_lock_for(Self::LOCK_TIMEOUT)
                .ok_or(StockError::Conflict)?;
            locked.push((*id, guard));
        }

        let mut txn = StockTxn {
            locked,
            staged: Vec::new(),
            entry_ids: &self.entry_ids,
        };
        let value = f(&mut txn)?;
        self.commit(txn);
        Ok(value)
    }

    fn commit(&self, mut txn: StockTxn<'_>) {
        for (product_id, guard) in txn.locked.iter_mut() {
            for entry in txn.staged.iter().filter(|e| e.product_id == *product_id) {
                guard.apply(entry.clone());
            }
            guard.assert_invariants();
        }
        for entry in txn.staged {
            self.audit.record(Arc::new(entry));
        }
    }

    fn record(&self, product_id: ProductId) -> Result<Arc<StockRecord>, StockError> {
        self.records
            .get(&product_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or(StockError::ProductNotFound(product_id))
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}
