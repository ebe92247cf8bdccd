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

//! Integration tests for a REST API facade with concurrent requests.
//!
//! These tests verify that a thin HTTP layer over the engine keeps data
//! consistent while many clients submit sales for the same products.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::future::join_all;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stock_ledger_rs::{Engine, Product, ProductId, SaleItem, SalesOrder, StockError, UserId};
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub id: u32,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub reorder_level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveStockRequest {
    pub quantity: u32,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemRequest {
    pub product_id: u32,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub user_id: u32,
    pub customer_name: String,
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockResponse {
    pub product: u32,
    pub on_hand: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Server Setup ===

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub struct AppError(StockError);

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            StockError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            StockError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            StockError::DuplicateProduct(_) => (StatusCode::CONFLICT, "DUPLICATE_PRODUCT"),
            StockError::InsufficientStock { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK")
            }
            StockError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            StockError::EmptyOrder => (StatusCode::BAD_REQUEST, "EMPTY_ORDER"),
            StockError::InvalidQuantity => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            StockError::InvalidPrice => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
            StockError::ZeroDelta => (StatusCode::BAD_REQUEST, "ZERO_DELTA"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<StatusCode, AppError> {
    let product = Product::new(ProductId(request.id), request.name, request.price)
        .with_reorder_level(request.reorder_level);
    state.engine.add_product(product)?;
    Ok(StatusCode::CREATED)
}

async fn receive_stock(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<ReceiveStockRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .receive_stock(ProductId(id), request.quantity, &request.note)?;
    Ok(StatusCode::CREATED)
}

async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SalesOrder>), AppError> {
    let items: Vec<SaleItem> = request
        .items
        .iter()
        .map(|item| SaleItem::new(ProductId(item.product_id), item.quantity, item.unit_price))
        .collect();
    let order = state.engine.create_sale(
        UserId(request.user_id),
        &request.customer_name,
        &items,
    )?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<StockResponse>, AppError> {
    let on_hand = state.engine.current_stock(ProductId(id))?;
    Ok(Json(StockResponse { product: id, on_hand }))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<SalesOrder>, AppError> {
    let order = state.engine.get_order(stock_ledger_rs::OrderId(id))?;
    Ok(Json(order))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}/receipts", post(receive_stock))
        .route("/products/{id}/stock", get(get_stock))
        .route("/orders", post(create_sale))
        .route("/orders/{id}", get(get_order))
        .with_state(state)
}

/// Test server that binds to an ephemeral port.
struct TestServer {
    base_url: String,
    engine: Arc<Engine>,
}

impl TestServer {
    async fn new() -> Self {
        let engine = Arc::new(Engine::new());
        let state = AppState {
            engine: engine.clone(),
        };

        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready by polling with retries
        let client = Client::new();
        let health_url = format!("{}/products/1/stock", base_url);
        for _ in 0..50 {
            match client.get(&health_url).send().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
            }
        }

        TestServer { base_url, engine }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_product(&self, client: &Client, id: u32, price: &str, stock: u32) {
        let response = client
            .post(self.url("/products"))
            .json(&serde_json::json!({"id": id, "name": format!("product-{}", id), "price": price}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        if stock > 0 {
            let response = client
                .post(self.url(&format!("/products/{}/receipts", id)))
                .json(&serde_json::json!({"quantity": stock, "note": "seed"}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 201);
        }
    }
}

fn sale_body(user_id: u32, customer: &str, product: u32, qty: u32, price: &str) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id,
        "customer_name": customer,
        "items": [{"product_id": product, "quantity": qty, "unit_price": price}],
    })
}

// === Tests ===
// These tests are ignored in CI due to connection issues on some platforms.
// Run manually with: cargo test --test server_test -- --ignored

/// Full flow: register, restock, sell, read back stock and the order.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn sale_flow_over_http() {
    let server = TestServer::new().await;
    let client = Client::new();

    server.seed_product(&client, 1, "9.99", 5).await;

    let response = client
        .post(server.url("/orders"))
        .json(&sale_body(1, "Alice", 1, 3, "9.99"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let order: serde_json::Value = response.json().await.unwrap();
    assert_eq!(order["total_amount"], "29.97");
    assert_eq!(order["customer_name"], "Alice");

    let stock: StockResponse = client
        .get(server.url("/products/1/stock"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stock.on_hand, 2);

    let order_id = order["id"].as_u64().unwrap();
    let fetched = client
        .get(server.url(&format!("/orders/{}", order_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 200);
}

/// An oversized sale is rejected with 422 and leaves stock unchanged.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn oversized_sale_is_rejected() {
    let server = TestServer::new().await;
    let client = Client::new();

    server.seed_product(&client, 1, "9.99", 2).await;

    let response = client
        .post(server.url("/orders"))
        .json(&sale_body(1, "Bob", 1, 5, "9.99"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.code, "INSUFFICIENT_STOCK");

    assert_eq!(server.engine.current_stock(ProductId(1)).unwrap(), 2);
    assert_eq!(server.engine.order_count(), 0);
}

/// Validation failures are 400s and touch nothing.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn invalid_sales_are_bad_requests() {
    let server = TestServer::new().await;
    let client = Client::new();

    server.seed_product(&client, 1, "1.00", 5).await;

    let empty = serde_json::json!({"user_id": 1, "customer_name": "Bob", "items": []});
    let response = client
        .post(server.url("/orders"))
        .json(&empty)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(server.url("/orders"))
        .json(&sale_body(1, "Bob", 1, 0, "1.00"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    assert_eq!(server.engine.current_stock(ProductId(1)).unwrap(), 5);
}

/// Many concurrent single-line sales against one product: the server never
/// oversells, and accepted plus remaining equals the initial stock.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_sales_never_oversell() {
    let server = TestServer::new().await;
    let client = Client::new();

    const INITIAL_STOCK: u32 = 100;
    const NUM_REQUESTS: usize = 300;
    const BATCH_SIZE: usize = 50; // Limit concurrent connections

    server.seed_product(&client, 1, "1.00", INITIAL_STOCK).await;

    let mut accepted = 0usize;
    let mut rejected = 0usize;

    // Process in batches to avoid exhausting ephemeral ports
    for batch_start in (0..NUM_REQUESTS).step_by(BATCH_SIZE) {
        let batch_end = (batch_start + BATCH_SIZE).min(NUM_REQUESTS);
        let futures: Vec<_> = (batch_start..batch_end)
            .map(|i| {
                let client = client.clone();
                let url = server.url("/orders");
                let body = sale_body(1, &format!("customer-{}", i), 1, 1, "1.00");
                async move { client.post(url).json(&body).send().await.unwrap().status() }
            })
            .collect();

        for status in join_all(futures).await {
            match status.as_u16() {
                201 => accepted += 1,
                422 => rejected += 1,
                other => panic!("unexpected status: {}", other),
            }
        }
    }

    assert_eq!(accepted, INITIAL_STOCK as usize);
    assert_eq!(rejected, NUM_REQUESTS - INITIAL_STOCK as usize);
    assert_eq!(server.engine.current_stock(ProductId(1)).unwrap(), 0);
    assert_eq!(server.engine.order_count(), INITIAL_STOCK as usize);

    // The ledger still balances after the storm.
    let history = server.engine.history(ProductId(1)).unwrap();
    let sum: i64 = history.iter().map(|e| e.delta).sum();
    assert_eq!(sum, 0);
}

/// Concurrent multi-line sales over overlapping products stay consistent.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_multi_line_sales_stay_consistent() {
    let server = TestServer::new().await;
    let client = Client::new();

    server.seed_product(&client, 1, "1.00", 50).await;
    server.seed_product(&client, 2, "2.00", 50).await;

    const NUM_REQUESTS: usize = 80;

    let futures: Vec<_> = (0..NUM_REQUESTS)
        .map(|i| {
            let client = client.clone();
            let url = server.url("/orders");
            // Every order wants one of each; only 50 can be satisfied.
            let body = serde_json::json!({
                "user_id": 1,
                "customer_name": format!("customer-{}", i),
                "items": [
                    {"product_id": 1, "quantity": 1, "unit_price": "1.00"},
                    {"product_id": 2, "quantity": 1, "unit_price": "2.00"},
                ],
            });
            async move { client.post(url).json(&body).send().await.unwrap().status() }
        })
        .collect();

    let accepted = join_all(futures)
        .await
        .into_iter()
        .filter(|status| status.as_u16() == 201)
        .count();

    assert_eq!(accepted, 50);
    assert_eq!(server.engine.current_stock(ProductId(1)).unwrap(), 0);
    assert_eq!(server.engine.current_stock(ProductId(2)).unwrap(), 0);

    // Both lines committed or neither: equal totals sold on both products.
    let sold =
        |id: u32| -> i64 {
            server
                .engine
                .history(ProductId(id))
                .unwrap()
                .iter()
                .filter(|e| e.delta < 0)
                .map(|e| -e.delta)
                .sum()
        };
    assert_eq!(sold(1), 50);
    assert_eq!(sold(2), 50);
}
