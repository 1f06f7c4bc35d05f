use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cart::Cart;

/// Reserved product id marking the trailing order-total row of each order.
pub const ORDER_TOTAL_SENTINEL: &str = "ORDER_TOTAL";

const HEADER: [&str; 7] = [
    "Date/Time",
    "Product ID",
    "Product Name",
    "Quantity",
    "Price",
    "Subtotal",
    "Order Total",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("'Order Total' column not found in sales file.")]
    MissingTotalColumn,
    #[error("failed to access sales file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read or write sales file: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct SaleRow<'a> {
    timestamp: &'a str,
    product_id: &'a str,
    product_name: &'a str,
    quantity: Option<u32>,
    price: Option<f64>,
    subtotal: Option<f64>,
    order_total: Option<f64>,
}

/// Append-only sales history. Each committed order contributes one row per
/// cart line plus a sentinel row carrying the order total; nothing is ever
/// rewritten or deleted.
#[derive(Debug)]
pub struct SalesLedger {
    path: PathBuf,
}

impl SalesLedger {
    pub fn new(path: impl Into<PathBuf>) -> SalesLedger {
        SalesLedger { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one order: N line rows with an empty Order Total column, then
    /// the sentinel row. The fixed header is written first when the file does
    /// not exist yet or is empty.
    pub fn append_order(
        &self,
        cart: &Cart,
        total: f64,
        timestamp: NaiveDateTime,
    ) -> Result<(), LedgerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        let timestamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        for (id, line) in cart.lines() {
            writer.serialize(SaleRow {
                timestamp: &timestamp,
                product_id: id,
                product_name: &line.name,
                quantity: Some(line.qty),
                price: Some(line.price),
                subtotal: Some(line.price * line.qty as f64),
                order_total: None,
            })?;
        }
        writer.serialize(SaleRow {
            timestamp: &timestamp,
            product_id: ORDER_TOTAL_SENTINEL,
            product_name: "",
            quantity: None,
            price: None,
            subtotal: None,
            order_total: Some(total),
        })?;
        writer.flush().map_err(LedgerError::Io)
    }

    /// Sums the Order Total values of every sentinel row whose timestamp
    /// falls on `date`. Malformed rows are skipped individually; a ledger
    /// without the Order Total column aborts the whole report.
    pub fn daily_total(&self, date: NaiveDate) -> Result<f64, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0.0),
            Err(e) => return Err(e.into()),
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let total_index = reader
            .headers()?
            .iter()
            .position(|name| name == "Order Total")
            .ok_or(LedgerError::MissingTotalColumn)?;

        let mut total = 0.0;
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable sales row: {}", e);
                    continue;
                }
            };
            let (Some(timestamp), Some(product_id)) = (record.get(0), record.get(1)) else {
                warn!("Skipping short sales row: {:?}", record);
                continue;
            };
            if product_id != ORDER_TOTAL_SENTINEL {
                continue;
            }
            let Some(day) = timestamp
                .split_whitespace()
                .next()
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            else {
                warn!("Skipping sales row with unparsable date: {:?}", record);
                continue;
            };
            if day != date {
                continue;
            }
            match record.get(total_index).map(str::parse::<f64>) {
                Some(Ok(value)) => total += value,
                _ => warn!("Skipping sales row with unparsable total: {:?}", record),
            }
        }
        Ok(total)
    }
}
