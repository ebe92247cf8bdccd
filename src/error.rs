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

//! Error types for stock and fulfillment operations.

use crate::base::{OrderId, ProductId};
use thiserror::Error;

/// Stock ledger and sale fulfillment errors.
///
/// Every variant aborts the whole unit of work it occurred in; durable state
/// is left unchanged. Only [`StockError::Conflict`] is safe to retry without
/// caller intervention.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Referenced product is not registered
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Referenced order does not exist
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// A product with this ID is already registered
    #[error("product {0} already registered")]
    DuplicateProduct(ProductId),

    /// Requested sale quantity exceeds the available stock
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Bounded wait for a contended product lock expired
    #[error("concurrent stock update conflict")]
    Conflict,

    /// Sale has no line items
    #[error("sale has no items")]
    EmptyOrder,

    /// Line quantity is zero
    #[error("quantity must be positive")]
    InvalidQuantity,

    /// Price is negative
    #[error("price must not be negative")]
    InvalidPrice,

    /// Ledger entry with a zero delta
    #[error("stock delta must be nonzero")]
    ZeroDelta,
}

impl StockError {
    /// Whether retrying the whole operation may succeed without any change
    /// by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StockError::Conflict)
    }
}
