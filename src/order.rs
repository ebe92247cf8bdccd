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

//! Sales order records.
//!
//! A [`SalesOrder`] and its [`SalesOrderLine`]s are created together by the
//! fulfillment engine, in the same unit of work that decrements stock, and
//! are never modified afterward. Corrections happen via new orders or
//! adjustment ledger entries, not mutation.

use crate::base::{OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

/// One requested line of a sale: product, quantity, and the unit price
/// quoted to the customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl SaleItem {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }
}

/// Committed line of a sales order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesOrderLine {
    /// 1-based position within the order, in the order the caller supplied.
    pub line_no: u32,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A committed multi-line sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_name: String,
    /// Sum over lines of `quantity * unit_price`.
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub status: FulfillmentStatus,
    pub lines: Vec<SalesOrderLine>,
    pub created_at: DateTime<Utc>,
}

impl SalesOrder {
    /// Recomputes the total from the lines. Always equals `total_amount`
    /// for an order the engine committed.
    pub fn line_total(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| Decimal::from(line.quantity) * line.unit_price)
            .sum()
    }
}
