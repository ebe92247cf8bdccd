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

//! Stock movement records.
//!
//! A [`LedgerEntry`] is the immutable record of a single quantity change and
//! its cause. Entries are only ever appended; corrections are expressed as
//! new `adjustment` entries, never as edits.

use crate::base::{EntryId, OrderId, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cause of a stock movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Negative delta written by sale fulfillment.
    Sale,
    /// Positive delta from received stock.
    Purchase,
    /// Manual correction, either sign.
    Adjustment,
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementKind::Sale => "sale",
            MovementKind::Purchase => "purchase",
            MovementKind::Adjustment => "adjustment",
        };
        write!(f, "{}", s)
    }
}

/// Immutable record of one stock quantity change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub product_id: ProductId,
    /// Signed quantity change. Never zero.
    pub delta: i64,
    pub kind: MovementKind,
    /// Originating order, for `sale` entries.
    pub reference: Option<OrderId>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}
