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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use stock_ledger_rs::{Engine, Product, ProductId, SaleItem, StockError, UserId};

/// Stock Ledger - Process inventory operation CSV files
///
/// Reads stock operations from a CSV file and outputs final stock levels
/// to stdout. Supports product registration, purchases, adjustments, and
/// single-line sales.
#[derive(Parser, Debug)]
#[command(name = "stock-ledger-rs")]
#[command(about = "An inventory engine that processes stock operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,product,qty,price,name
    /// Example: cargo run -- operations.csv > stock.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Write the drained audit feed (every committed ledger entry, in
    /// commit order) to this file as CSV
    #[arg(long, value_name = "FILE")]
    audit: Option<PathBuf>,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Process operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write stock levels to stdout
    if let Err(e) = write_stock_levels(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    // Optionally export the audit feed
    if let Some(path) = &args.audit {
        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error creating audit file '{}': {}", path.display(), e);
                process::exit(1);
            }
        };
        if let Err(e) = write_audit(&engine, file) {
            eprintln!("Error writing audit file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, product, qty, price, name`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    product: u32,
    #[serde(deserialize_with = "csv::invalid_option")]
    qty: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    price: Option<Decimal>,
    name: Option<String>,
}

/// One parsed stock operation.
#[derive(Debug)]
enum Operation {
    AddProduct {
        id: ProductId,
        name: String,
        price: Decimal,
        initial_stock: Option<u32>,
    },
    Purchase {
        id: ProductId,
        quantity: u32,
    },
    Adjust {
        id: ProductId,
        delta: i64,
    },
    Sale {
        id: ProductId,
        quantity: u32,
        unit_price: Option<Decimal>,
        customer: String,
    },
}

impl CsvRecord {
    /// Converts the CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let id = ProductId(self.product);

        match self.op.to_lowercase().as_str() {
            "product" => {
                // A negative initial quantity makes the whole row invalid.
                let initial_stock = match self.qty {
                    Some(qty) => Some(u32::try_from(qty).ok()?),
                    None => None,
                };
                Some(Operation::AddProduct {
                    id,
                    name: self.name.unwrap_or_else(|| format!("product-{}", id)),
                    price: self.price.unwrap_or(Decimal::ZERO),
                    initial_stock,
                })
            }
            "purchase" => {
                let quantity = u32::try_from(self.qty?).ok()?;
                Some(Operation::Purchase { id, quantity })
            }
            "adjust" => Some(Operation::Adjust {
                id,
                delta: self.qty?,
            }),
            "sale" => {
                let quantity = u32::try_from(self.qty?).ok()?;
                Some(Operation::Sale {
                    id,
                    quantity,
                    unit_price: self.price,
                    customer: self.name.unwrap_or_else(|| "walk-in".to_string()),
                })
            }
            _ => None,
        }
    }
}

/// The operator identity stamped onto CLI-originated sales.
const CLI_USER: UserId = UserId(0);

/// Process operations from a CSV reader.
///
/// This function uses streaming parsing to handle arbitrarily large CSV
/// files without loading the entire file into memory. Malformed rows and
/// failed operations are silently skipped.
///
/// # CSV Format
///
/// Expected columns: `op, product, qty, price, name`
/// - `op`: Operation (product, purchase, adjust, sale)
/// - `product`: Product ID (u32)
/// - `qty`: Quantity - initial stock for `product` (optional), positive for
///   `purchase`/`sale`, signed for `adjust`
/// - `price`: Decimal price - catalog price for `product`, unit price for
///   `sale` (optional, defaults to the catalog price)
/// - `name`: Product name for `product`, customer name for `sale`
///
/// # Example
///
/// ```csv
/// op,product,qty,price,name
/// product,1,50,9.99,Widget
/// sale,1,3,,Alice
/// adjust,1,-2,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Individual operation errors are logged in debug mode but don't stop
/// processing.
pub fn process_operations<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " sale "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                // Convert CSV record to a stock operation
                let Some(op) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                // Apply operation, ignoring errors (silent failure)
                if let Err(_e) = apply_operation(&engine, op) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping failed operation: {}", _e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

fn apply_operation(engine: &Engine, op: Operation) -> Result<(), StockError> {
    match op {
        Operation::AddProduct {
            id,
            name,
            price,
            initial_stock,
        } => {
            engine.add_product(Product::new(id, name, price))?;
            if let Some(quantity) = initial_stock.filter(|q| *q > 0) {
                engine.receive_stock(id, quantity, "initial stock")?;
            }
            Ok(())
        }
        Operation::Purchase { id, quantity } => {
            engine.receive_stock(id, quantity, "stock received")?;
            Ok(())
        }
        Operation::Adjust { id, delta } => {
            engine.adjust_stock(id, delta, "manual adjustment")?;
            Ok(())
        }
        Operation::Sale {
            id,
            quantity,
            unit_price,
            customer,
        } => {
            // Fall back to the catalog price when the row carries none.
            let unit_price = match unit_price {
                Some(price) => price,
                None => {
                    engine
                        .get_product(id)
                        .ok_or(StockError::ProductNotFound(id))?
                        .price
                }
            };
            engine.create_sale(CLI_USER, &customer, &[SaleItem::new(id, quantity, unit_price)])?;
            Ok(())
        }
    }
}

/// Output row for final stock levels.
///
/// Columns: `product, name, on_hand, reorder_level, price`
#[derive(Debug, Serialize)]
struct StockRow {
    product: u32,
    name: String,
    on_hand: i64,
    reorder_level: i64,
    price: Decimal,
}

/// Write final stock levels to a CSV writer, sorted by product ID.
///
/// # Example
///
/// ```csv
/// product,name,on_hand,reorder_level,price
/// 1,Widget,47,5,9.99
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_stock_levels<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut rows: Vec<StockRow> = engine
        .products()
        .map(|entry| {
            let product = entry.value();
            StockRow {
                product: product.id.0,
                name: product.name.clone(),
                on_hand: engine.current_stock(product.id).unwrap_or(0),
                reorder_level: product.reorder_level,
                price: product.price,
            }
        })
        .collect();
    rows.sort_by_key(|row| row.product);

    for row in rows {
        wtr.serialize(row)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}

/// Output row for the audit export.
#[derive(Debug, Serialize)]
struct AuditRow {
    entry: u64,
    product: u32,
    delta: i64,
    kind: String,
    reference: Option<u64>,
    note: String,
}

/// Drain the audit feed and write it as CSV in commit order.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_audit<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for entry in engine.audit().drain() {
        wtr.serialize(AuditRow {
            entry: entry.id.0,
            product: entry.product_id.0,
            delta: entry.delta,
            kind: entry.kind.to_string(),
            reference: entry.reference.map(|r| r.0),
            note: entry.note.clone(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
