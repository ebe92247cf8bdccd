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

//! Sale fulfillment engine.
//!
//! The [`Engine`] is the central component that fulfills multi-line sales
//! against the stock ledger and owns the product catalog and committed
//! orders.
//!
//! # Fulfillment
//!
//! A sale is one atomic unit of work: availability is checked per line
//! *inside* the same locked scope that decrements stock, so two concurrent
//! sales of the same product can never both pass the check and jointly
//! oversell. Either the whole order commits (one [`SalesOrder`], one line
//! and one negative ledger entry per item) or nothing is observable.
//!
//! # Thread Safety
//!
//! Sales over disjoint products run fully in parallel. Sales sharing a
//! product serialize pairwise on that product's record; multi-product sales
//! take their locks in ascending product-id order, so overlapping sets
//! cannot deadlock.

use crate::base::{OrderId, ProductId, UserId};
use crate::error::StockError;
use crate::ledger::StockLedger;
use crate::movement::{LedgerEntry, MovementKind};
use crate::order::{FulfillmentStatus, PaymentStatus, SaleItem, SalesOrder, SalesOrderLine};
use crate::product::Product;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

const SALE_NOTE: &str = "Sale order item";

/// Sale fulfillment engine over a product catalog and a stock ledger.
///
/// # Invariants
///
/// - Every committed order's `total_amount` equals the sum of its lines'
///   `quantity * unit_price`.
/// - Every committed order line has a matching `sale` ledger entry
///   referencing the order.
/// - Stock never goes negative through `create_sale`; purchases and
///   adjustments carry no such policy.
pub struct Engine {
    /// Product catalog indexed by product ID.
    products: DashMap<ProductId, Product>,
    /// Authoritative stock state and movement history.
    ledger: StockLedger,
    /// Committed orders indexed by order ID.
    orders: DashMap<OrderId, SalesOrder>,
    order_ids: AtomicU64,
}

impl Engine {
    /// How many times a sale is transparently re-attempted after a
    /// [`StockError::Conflict`] before the conflict is surfaced.
    pub const MAX_CONFLICT_RETRIES: u32 = 3;

    /// Creates a new engine with an empty catalog, ledger, and order book.
    pub fn new() -> Self {
        Engine {
            products: DashMap::new(),
            ledger: StockLedger::new(),
            orders: DashMap::new(),
            order_ids: AtomicU64::new(1),
        }
    }

    // === Catalog ===

    /// Registers a product and its (empty) stock record.
    ///
    /// # Errors
    ///
    /// - [`StockError::InvalidPrice`] - negative price or cost price.
    /// - [`StockError::DuplicateProduct`] - the ID is already registered.
    pub fn add_product(&self, product: Product) -> Result<(), StockError> {
        if product.price < Decimal::ZERO || product.cost_price < Decimal::ZERO {
            return Err(StockError::InvalidPrice);
        }

        match self.products.entry(product.id) {
            Entry::Occupied(_) => Err(StockError::DuplicateProduct(product.id)),
            Entry::Vacant(entry) => {
                self.ledger.register(product.id)?;
                entry.insert(product);
                Ok(())
            }
        }
    }

    /// Retrieves a catalog record by product ID.
    pub fn get_product(&self, product_id: ProductId) -> Option<Product> {
        self.products.get(&product_id).map(|p| p.value().clone())
    }

    /// Returns an iterator over all catalog records.
    pub fn products(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, ProductId, Product>> {
        self.products.iter()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    // === Stock movements ===

    /// Records received stock: a positive `purchase` entry.
    ///
    /// No availability policy applies on this side; only sales are checked.
    pub fn receive_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
        note: &str,
    ) -> Result<LedgerEntry, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity);
        }
        self.ledger.apply(
            product_id,
            i64::from(quantity),
            MovementKind::Purchase,
            None,
            note,
        )
    }

    /// Records a manual correction: a signed `adjustment` entry.
    ///
    /// May drive stock negative; corrections reflect counted reality.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        note: &str,
    ) -> Result<LedgerEntry, StockError> {
        self.ledger
            .apply(product_id, delta, MovementKind::Adjustment, None, note)
    }

    /// Point-in-time quantity on hand.
    pub fn current_stock(&self, product_id: ProductId) -> Result<i64, StockError> {
        self.ledger.current_stock(product_id)
    }

    /// Committed ledger entries for a product, in append order.
    pub fn history(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>, StockError> {
        self.ledger.history(product_id)
    }

    /// The commit-ordered feed of all ledger entries.
    pub fn audit(&self) -> &crate::audit::AuditLog {
        self.ledger.audit()
    }

    // === Sales ===

    /// Fulfills a multi-line sale atomically.
    ///
    /// Items are checked in the order supplied; the first line whose
    /// quantity exceeds the available stock is the one reported. On any
    /// failure nothing is durable: no order, no lines, no ledger entries,
    /// no stock change.
    ///
    /// A [`StockError::Conflict`] (bounded lock wait expired) is retried
    /// transparently up to [`Engine::MAX_CONFLICT_RETRIES`] times.
    ///
    /// # Errors
    ///
    /// - [`StockError::EmptyOrder`] - `items` is empty.
    /// - [`StockError::InvalidQuantity`] - a line quantity is zero.
    /// - [`StockError::InvalidPrice`] - a line unit price is negative.
    /// - [`StockError::ProductNotFound`] - a line references an unknown
    ///   product.
    /// - [`StockError::InsufficientStock`] - a line exceeds availability;
    ///   carries the product, the requested and the available quantity.
    /// - [`StockError::Conflict`] - contention persisted through every
    ///   retry.
    pub fn create_sale(
        &self,
        user_id: UserId,
        customer_name: &str,
        items: &[SaleItem],
    ) -> Result<SalesOrder, StockError> {
        self.validate_sale(items)?;

        let mut attempts = 0;
        loop {
            match self.try_create_sale(user_id, customer_name, items) {
                Err(StockError::Conflict) if attempts < Self::MAX_CONFLICT_RETRIES => {
                    attempts += 1;
                }
                result => return result,
            }
        }
    }

    /// Retrieves a committed order by ID.
    pub fn get_order(&self, order_id: OrderId) -> Result<SalesOrder, StockError> {
        self.orders
            .get(&order_id)
            .map(|o| o.value().clone())
            .ok_or(StockError::OrderNotFound(order_id))
    }

    /// Returns an iterator over all committed orders.
    pub fn orders(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, OrderId, SalesOrder>> {
        self.orders.iter()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // === Internals ===

    /// Input validation. Runs before any state is touched.
    fn validate_sale(&self, items: &[SaleItem]) -> Result<(), StockError> {
        if items.is_empty() {
            return Err(StockError::EmptyOrder);
        }
        for item in items {
            if item.quantity == 0 {
                return Err(StockError::InvalidQuantity);
            }
            if item.unit_price < Decimal::ZERO {
                return Err(StockError::InvalidPrice);
            }
            if !self.products.contains_key(&item.product_id) {
                return Err(StockError::ProductNotFound(item.product_id));
            }
        }
        Ok(())
    }

    /// One fulfillment attempt: a single ledger unit of work spanning every
    /// product in the batch.
    fn try_create_sale(
        &self,
        user_id: UserId,
        customer_name: &str,
        items: &[SaleItem],
    ) -> Result<SalesOrder, StockError> {
        let order_id = OrderId(self.order_ids.fetch_add(1, Ordering::Relaxed));
        let product_ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();

        let order = self.ledger.unit_of_work(&product_ids, |txn| {
            let created_at = Utc::now();
            let mut lines = Vec::with_capacity(items.len());
            let mut total_amount = Decimal::ZERO;

            for (index, item) in items.iter().enumerate() {
                let requested = i64::from(item.quantity);
                let available = txn.available(item.product_id)?;
                if available < requested {
                    return Err(StockError::InsufficientStock {
                        product_id: item.product_id,
                        requested,
                        available,
                    });
                }

                lines.push(SalesOrderLine {
                    line_no: index as u32 + 1,
                    order_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    created_at,
                });
                txn.stage(
                    item.product_id,
                    -requested,
                    MovementKind::Sale,
                    Some(order_id),
                    SALE_NOTE,
                )?;
                total_amount += Decimal::from(item.quantity) * item.unit_price;
            }

            Ok(SalesOrder {
                id: order_id,
                user_id,
                customer_name: customer_name.to_string(),
                total_amount,
                payment_status: PaymentStatus::Pending,
                status: FulfillmentStatus::Completed,
                lines,
                created_at,
            })
        })?;

        self.orders.insert(order_id, order.clone());
        Ok(order)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
