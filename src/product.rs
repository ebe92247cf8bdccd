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

//! Product catalog records.
//!
//! A [`Product`] carries the descriptive and pricing data the fulfillment
//! engine consults. The quantity on hand is deliberately not a field here:
//! it lives in the stock ledger's per-product record so it can only move
//! together with an appended ledger entry.

use crate::base::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog record for a sellable product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Selling price per unit. Non-negative.
    pub price: Decimal,
    /// Acquisition cost per unit. Non-negative.
    pub cost_price: Decimal,
    /// On-hand threshold below which the product should be restocked.
    pub reorder_level: i64,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            cost_price: Decimal::ZERO,
            reorder_level: 0,
        }
    }

    pub fn with_cost_price(mut self, cost_price: Decimal) -> Self {
        self.cost_price = cost_price;
        self
    }

    pub fn with_reorder_level(mut self, reorder_level: i64) -> Self {
        self.reorder_level = reorder_level;
        self
    }

    /// Whether the given on-hand quantity has fallen to the reorder threshold.
    pub fn needs_reorder(&self, on_hand: i64) -> bool {
        on_hand <= self.reorder_level
    }
}
