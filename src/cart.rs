use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::ledger::{LedgerError, SalesLedger};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Product not found.")]
    NotFound(String),
    #[error("Insufficient stock. Available: {available}, requested: {requested}")]
    InsufficientStock { available: u32, requested: u32 },
}

/// One product's worth of an order. Price is a snapshot taken when the line is
/// first added; later adds to the same line only grow the quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub name: String,
    pub price: f64,
    pub qty: u32,
}

/// Per-order accumulation of selected products, keyed by product id.
/// Built interactively and discarded after checkout.
#[derive(Debug, Default)]
pub struct Cart {
    lines: BTreeMap<String, CartLine>,
}

impl Cart {
    /// Adds `qty` of a product, accumulating into an existing line for the
    /// same id. The quantity is validated against the live catalog stock
    /// only, not against what the cart already holds for that product.
    pub fn add(&mut self, catalog: &Catalog, id: &str, qty: u32) -> Result<&CartLine, OrderError> {
        let product = catalog
            .get(id)
            .ok_or_else(|| OrderError::NotFound(id.to_string()))?;
        if qty > product.stock {
            return Err(OrderError::InsufficientStock {
                available: product.stock,
                requested: qty,
            });
        }
        let line = self
            .lines
            .entry(id.to_string())
            .and_modify(|line| line.qty += qty)
            .or_insert_with(|| CartLine {
                name: product.name.clone(),
                price: product.price,
                qty,
            });
        Ok(line)
    }

    pub fn subtotal(&self) -> f64 {
        self.lines
            .values()
            .map(|line| line.price * line.qty as f64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = (&str, &CartLine)> {
        self.lines.iter().map(|(id, line)| (id.as_str(), line))
    }

    /// Finalizes the order: decrements catalog stock for every line, then
    /// appends the sale to the ledger under one shared timestamp. Stock is
    /// clamped at zero since repeated adds of one product are each checked
    /// against live stock and can overcommit in aggregate.
    pub fn commit(
        &self,
        catalog: &mut Catalog,
        ledger: &SalesLedger,
        total: f64,
        timestamp: NaiveDateTime,
    ) -> Result<(), LedgerError> {
        for (id, line) in &self.lines {
            if let Some(product) = catalog.get_mut(id) {
                product.stock = product.stock.saturating_sub(line.qty);
            }
        }
        ledger.append_order(self, total, timestamp)
    }
}

/// Output shape for an exported bill, chosen explicitly by the caller rather
/// than inferred inside the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillFormat {
    Text,
    Csv,
}

impl BillFormat {
    /// Maps a `.txt` or `.csv` file suffix to a format. Any other suffix is
    /// unsupported and the caller reports it.
    pub fn from_path(path: &Path) -> Option<BillFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => Some(BillFormat::Text),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Some(BillFormat::Csv),
            _ => None,
        }
    }
}

/// Ephemeral bill over a cart: subtotal, flat discount, and the resulting
/// total, which may go negative when the discount exceeds the subtotal.
#[derive(Debug)]
pub struct Bill<'a> {
    cart: &'a Cart,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub timestamp: NaiveDateTime,
}

impl<'a> Bill<'a> {
    pub fn new(cart: &'a Cart, discount: f64, timestamp: NaiveDateTime) -> Bill<'a> {
        let subtotal = cart.subtotal();
        Bill {
            cart,
            subtotal,
            discount,
            total: subtotal - discount,
            timestamp,
        }
    }

    /// Renders the on-screen bill into `out`.
    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "\n--- BILL ---")?;
        writeln!(out, "Date/Time: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        for (_, line) in self.cart.lines() {
            writeln!(
                out,
                "{}: {} x {:.2} = {:.2}",
                line.name,
                line.qty,
                line.price,
                line.price * line.qty as f64
            )?;
        }
        writeln!(out, "Subtotal: {:.2}", self.subtotal)?;
        writeln!(out, "Discount: {:.2}", self.discount)?;
        writeln!(out, "Total: {:.2}", self.total)
    }

    /// Writes the bill to `path` in the requested format.
    pub fn export(&self, path: &Path, format: BillFormat) -> Result<(), LedgerError> {
        match format {
            BillFormat::Text => {
                let mut file = File::create(path)?;
                writeln!(file, "--- BILL ---")?;
                writeln!(file, "Date/Time: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
                for (_, line) in self.cart.lines() {
                    writeln!(
                        file,
                        "{}: {} x {:.2} = {:.2}",
                        line.name,
                        line.qty,
                        line.price,
                        line.price * line.qty as f64
                    )?;
                }
                writeln!(file, "Total: {:.2}", self.total)?;
            }
            BillFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                writer.write_record([
                    "Date/Time",
                    &self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "",
                    "",
                ])?;
                writer.write_record(["Product", "Qty", "Price", "Subtotal"])?;
                for (_, line) in self.cart.lines() {
                    writer.write_record([
                        line.name.as_str(),
                        &line.qty.to_string(),
                        &format!("{:.2}", line.price),
                        &format!("{:.2}", line.price * line.qty as f64),
                    ])?;
                }
                writer.write_record(["Total", "", "", &format!("{:.2}", self.total)])?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}
