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

//! # Stock Ledger
//!
//! This library tracks merchandise stock levels, records every quantity
//! change as an immutable append-only ledger, and fulfills multi-line
//! customer sales atomically against that stock.
//!
//! ## Core Components
//!
//! - [`Engine`]: fulfills sales and owns the catalog and order book
//! - [`StockLedger`]: per-product quantity on hand plus its entry history
//! - [`AuditLog`]: commit-ordered feed of every ledger entry
//! - [`StockError`]: error types for stock and fulfillment failures
//!
//! ## Example
//!
//! ```
//! use stock_ledger_rs::{Engine, Product, ProductId, SaleItem, UserId};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//!
//! // Register a product and receive initial stock
//! engine
//!     .add_product(Product::new(ProductId(1), "Widget", dec!(9.99)))
//!     .unwrap();
//! engine.receive_stock(ProductId(1), 5, "initial stock").unwrap();
//!
//! // Fulfill a sale
//! let order = engine
//!     .create_sale(
//!         UserId(1),
//!         "Alice",
//!         &[SaleItem::new(ProductId(1), 3, dec!(9.99))],
//!     )
//!     .unwrap();
//!
//! assert_eq!(order.total_amount, dec!(29.97));
//! assert_eq!(engine.current_stock(ProductId(1)).unwrap(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! Sales run concurrently; each one is an atomic unit of work over the
//! products it touches. Two sales of the same product serialize on that
//! product's record and can never jointly oversell it.

pub mod audit;
mod base;
mod engine;
pub mod error;
pub mod ledger;
mod movement;
mod order;
mod product;

pub use audit::AuditLog;
pub use base::{EntryId, OrderId, ProductId, UserId};
pub use engine::Engine;
pub use error::StockError;
pub use ledger::{StockLedger, StockTxn};
pub use movement::{LedgerEntry, MovementKind};
pub use order::{FulfillmentStatus, PaymentStatus, SaleItem, SalesOrder, SalesOrderLine};
pub use product::Product;
