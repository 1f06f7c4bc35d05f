use chrono::{Local, NaiveDate};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::cart::{Bill, BillFormat, Cart};
use crate::catalog::{Catalog, CatalogError, Product, ProductUpdate};
use crate::ledger::SalesLedger;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

enum Flow {
    Continue,
    Quit,
}

/// Interactive menu loop. Owns the catalog for the whole session and writes
/// it back on exit; reaching end of input counts as Save & Quit. Generic over
/// the input/output streams so whole sessions can be scripted in tests.
pub struct Session<R, W> {
    input: R,
    out: W,
    catalog: Catalog,
    catalog_path: PathBuf,
    ledger: SalesLedger,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(
        input: R,
        out: W,
        catalog: Catalog,
        catalog_path: PathBuf,
        ledger: SalesLedger,
    ) -> Session<R, W> {
        Session {
            input,
            out,
            catalog,
            catalog_path,
            ledger,
        }
    }

    pub fn run(mut self) -> Result<(), SessionError> {
        loop {
            self.print_menu()?;
            let Some(choice) = self.prompt_line("Select option: ")? else {
                break;
            };
            let flow = match choice.as_str() {
                "1" => self.add_product()?,
                "2" => self.update_product()?,
                "3" => self.delete_product()?,
                "4" => self.search_product()?,
                "5" => self.process_order()?,
                "6" => self.daily_sales_report()?,
                "7" => self.report_low_stock()?,
                "8" => Flow::Quit,
                _ => {
                    writeln!(self.out, "Invalid choice.")?;
                    Flow::Continue
                }
            };
            if let Flow::Quit = flow {
                break;
            }
        }
        self.catalog.save(&self.catalog_path)?;
        writeln!(self.out, "Changes saved. Goodbye!")?;
        Ok(())
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Inventory & Billing Menu")?;
        writeln!(self.out, "1. Add Product")?;
        writeln!(self.out, "2. Update Product")?;
        writeln!(self.out, "3. Delete Product")?;
        writeln!(self.out, "4. Search Product")?;
        writeln!(self.out, "5. Process Order")?;
        writeln!(self.out, "6. Daily Sales Report")?;
        writeln!(self.out, "7. Low Stock Report")?;
        writeln!(self.out, "8. Save & Quit")
    }

    fn add_product(&mut self) -> io::Result<Flow> {
        let Some(id) = self.prompt_line("Product ID: ")? else {
            return Ok(Flow::Quit);
        };
        if self.catalog.get(&id).is_some() {
            writeln!(self.out, "Product ID already exists.")?;
            return Ok(Flow::Continue);
        }
        let Some(name) = self.prompt_line("Name: ")? else {
            return Ok(Flow::Quit);
        };
        let Some(price) = self.prompt_price("Price: ")? else {
            return Ok(Flow::Quit);
        };
        let Some(stock) = self.prompt_parsed("Stock Quantity: ")? else {
            return Ok(Flow::Quit);
        };
        match self.catalog.insert(Product { id, name, price, stock }) {
            Ok(()) => writeln!(self.out, "Product added.")?,
            Err(e) => writeln!(self.out, "{}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn update_product(&mut self) -> io::Result<Flow> {
        let Some(id) = self.prompt_line("Product ID to update: ")? else {
            return Ok(Flow::Quit);
        };
        let Some(current) = self.catalog.get(&id).cloned() else {
            writeln!(self.out, "Product not found.")?;
            return Ok(Flow::Continue);
        };
        writeln!(self.out, "Leave field empty to keep current value.")?;
        let name = match self.prompt_line(&format!("New Name ({}): ", current.name))? {
            None => return Ok(Flow::Quit),
            Some(line) if line.is_empty() => None,
            Some(line) => Some(line),
        };
        let Some(price) = self.prompt_optional(&format!("New Price ({}): ", current.price))? else {
            return Ok(Flow::Quit);
        };
        let Some(stock) = self.prompt_optional(&format!("New Stock ({}): ", current.stock))? else {
            return Ok(Flow::Quit);
        };
        match self.catalog.update(&id, ProductUpdate { name, price, stock }) {
            Ok(()) => writeln!(self.out, "Product updated.")?,
            Err(e) => writeln!(self.out, "{}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn delete_product(&mut self) -> io::Result<Flow> {
        let Some(id) = self.prompt_line("Product ID to delete: ")? else {
            return Ok(Flow::Quit);
        };
        match self.catalog.delete(&id) {
            Ok(()) => writeln!(self.out, "Product deleted.")?,
            Err(e) => writeln!(self.out, "{}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn search_product(&mut self) -> io::Result<Flow> {
        let Some(query) = self.prompt_line("Enter product name or ID: ")? else {
            return Ok(Flow::Quit);
        };
        match self.catalog.find(&query) {
            Some(p) => writeln!(
                self.out,
                "ID: {}, Name: {}, Price: {:.2}, Stock: {}",
                p.id, p.name, p.price, p.stock
            )?,
            None => writeln!(self.out, "Product not found.")?,
        }
        Ok(Flow::Continue)
    }

    fn process_order(&mut self) -> io::Result<Flow> {
        let mut cart = Cart::default();
        loop {
            if self.add_to_cart(&mut cart)?.is_none() {
                return Ok(Flow::Quit);
            }
            let Some(more) = self.prompt_yes_no("Add more items? (y/n): ")? else {
                return Ok(Flow::Quit);
            };
            if !more {
                break;
            }
        }
        if cart.is_empty() {
            writeln!(self.out, "Cart is empty, order cancelled.")?;
            return Ok(Flow::Continue);
        }
        let Some(apply) = self.prompt_yes_no("Apply discount? (y/n): ")? else {
            return Ok(Flow::Quit);
        };
        let discount = if apply {
            let Some(discount) = self.prompt_parsed("Discount amount: ")? else {
                return Ok(Flow::Quit);
            };
            discount
        } else {
            0.0
        };

        let timestamp = Local::now().naive_local();
        let bill = Bill::new(&cart, discount, timestamp);
        bill.render(&mut self.out)?;

        let Some(save) = self.prompt_yes_no("Save bill? (y/n): ")? else {
            return Ok(Flow::Quit);
        };
        if save && self.save_bill(&bill)?.is_none() {
            return Ok(Flow::Quit);
        }

        let total = bill.total;
        match cart.commit(&mut self.catalog, &self.ledger, total, timestamp) {
            Ok(()) => writeln!(self.out, "Order processed.")?,
            Err(e) => writeln!(self.out, "Failed to record sale: {}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn add_to_cart(&mut self, cart: &mut Cart) -> io::Result<Option<()>> {
        let Some(id) = self.prompt_line("Product ID to add: ")? else {
            return Ok(None);
        };
        if self.catalog.get(&id).is_none() {
            writeln!(self.out, "Product not found.")?;
            return Ok(Some(()));
        }
        let Some(qty) = self.prompt_qty("Quantity: ")? else {
            return Ok(None);
        };
        match cart.add(&self.catalog, &id, qty) {
            Ok(line) => {
                let added = format!("Added {} of {} to cart.", qty, line.name);
                writeln!(self.out, "{}", added)?;
            }
            Err(e) => writeln!(self.out, "{}", e)?,
        }
        Ok(Some(()))
    }

    fn save_bill(&mut self, bill: &Bill) -> io::Result<Option<()>> {
        let Some(fname) = self.prompt_line("Save as filename (bill.txt/csv): ")? else {
            return Ok(None);
        };
        let path = Path::new(&fname);
        match BillFormat::from_path(path) {
            Some(format) => match bill.export(path, format) {
                Ok(()) => writeln!(self.out, "Bill saved.")?,
                Err(e) => writeln!(self.out, "Failed to save bill: {}", e)?,
            },
            None => writeln!(
                self.out,
                "Unsupported bill format, use a .txt or .csv filename."
            )?,
        }
        Ok(Some(()))
    }

    fn daily_sales_report(&mut self) -> io::Result<Flow> {
        let Some(date) = self.prompt_parsed::<NaiveDate>("Enter date (YYYY-MM-DD): ")? else {
            return Ok(Flow::Quit);
        };
        match self.ledger.daily_total(date) {
            Ok(total) => writeln!(self.out, "Total sales for {}: {:.2}", date, total)?,
            Err(e) => writeln!(self.out, "{}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn report_low_stock(&mut self) -> io::Result<Flow> {
        writeln!(self.out, "Low Stock Products:")?;
        for p in self.catalog.low_stock() {
            writeln!(self.out, "ID: {}, {} - Stock: {}", p.id, p.name, p.stock)?;
        }
        Ok(Flow::Continue)
    }

    /// Prompts once and returns the trimmed line; `None` means end of input.
    fn prompt_line(&mut self, msg: &str) -> io::Result<Option<String>> {
        write!(self.out, "{}", msg)?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompts until the input parses; malformed values re-prompt instead of
    /// ending the session.
    fn prompt_parsed<T: FromStr>(&mut self, msg: &str) -> io::Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        loop {
            let Some(line) = self.prompt_line(msg)? else {
                return Ok(None);
            };
            match line.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(e) => writeln!(self.out, "Invalid value: {}", e)?,
            }
        }
    }

    /// Like `prompt_parsed`, but an empty line means "keep the current value"
    /// and yields `Some(None)`.
    fn prompt_optional<T: FromStr>(&mut self, msg: &str) -> io::Result<Option<Option<T>>>
    where
        T::Err: std::fmt::Display,
    {
        loop {
            let Some(line) = self.prompt_line(msg)? else {
                return Ok(None);
            };
            if line.is_empty() {
                return Ok(Some(None));
            }
            match line.parse() {
                Ok(value) => return Ok(Some(Some(value))),
                Err(e) => writeln!(self.out, "Invalid value: {}", e)?,
            }
        }
    }

    /// Anything other than `y`/`Y` counts as no.
    fn prompt_yes_no(&mut self, msg: &str) -> io::Result<Option<bool>> {
        let Some(line) = self.prompt_line(msg)? else {
            return Ok(None);
        };
        Ok(Some(line.eq_ignore_ascii_case("y")))
    }

    fn prompt_price(&mut self, msg: &str) -> io::Result<Option<f64>> {
        loop {
            let Some(price) = self.prompt_parsed::<f64>(msg)? else {
                return Ok(None);
            };
            if price >= 0.0 {
                return Ok(Some(price));
            }
            writeln!(self.out, "Price must be non-negative.")?;
        }
    }

    fn prompt_qty(&mut self, msg: &str) -> io::Result<Option<u32>> {
        loop {
            let Some(qty) = self.prompt_parsed::<u32>(msg)? else {
                return Ok(None);
            };
            if qty > 0 {
                return Ok(Some(qty));
            }
            writeln!(self.out, "Quantity must be positive.")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn seeded_catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog
            .insert(Product {
                id: "p1".to_string(),
                name: "Tea".to_string(),
                price: 10.0,
                stock: 5,
            })
            .unwrap();
        catalog
    }

    /// Runs a scripted session against a temp dir; returns the transcript.
    fn run_script(dir: &Path, catalog: Catalog, script: &str) -> String {
        let mut out = Vec::new();
        let session = Session::new(
            Cursor::new(script.to_string()),
            &mut out,
            catalog,
            dir.join("products.csv"),
            SalesLedger::new(dir.join("sales.csv")),
        );
        session.run().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_add_product_and_quit_persists_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(
            dir.path(),
            Catalog::default(),
            "1\np1\nTea\n2.5\n10\n8\n",
        );

        assert!(output.contains("Product added."));
        assert!(output.contains("Changes saved. Goodbye!"));

        let saved = Catalog::load(&dir.path().join("products.csv")).unwrap();
        let product = saved.get("p1").unwrap();
        assert_eq!(product.name, "Tea");
        assert_eq!(product.stock, 10);
    }

    #[test]
    fn test_malformed_numeric_input_reprompts() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(
            dir.path(),
            Catalog::default(),
            "1\np1\nTea\nabc\n2.5\nten\n10\n8\n",
        );

        assert!(output.contains("Invalid value:"));
        assert!(output.contains("Product added."));
    }

    #[test]
    fn test_invalid_menu_choice() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), Catalog::default(), "9\n8\n");
        assert!(output.contains("Invalid choice."));
    }

    #[test]
    fn test_eof_saves_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), seeded_catalog(), "");

        assert!(output.contains("Changes saved. Goodbye!"));
        let saved = Catalog::load(&dir.path().join("products.csv")).unwrap();
        assert!(saved.get("p1").is_some());
    }

    #[test]
    fn test_order_decrements_stock_and_records_sale() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(
            dir.path(),
            seeded_catalog(),
            "5\np1\n2\nn\ny\n5\nn\n8\n",
        );

        assert!(output.contains("Added 2 of Tea to cart."));
        assert!(output.contains("Subtotal: 20.00"));
        assert!(output.contains("Discount: 5.00"));
        assert!(output.contains("Total: 15.00"));
        assert!(output.contains("Order processed."));

        let saved = Catalog::load(&dir.path().join("products.csv")).unwrap();
        assert_eq!(saved.get("p1").unwrap().stock, 3);

        let ledger = std::fs::read_to_string(dir.path().join("sales.csv")).unwrap();
        assert!(ledger.starts_with(
            "Date/Time,Product ID,Product Name,Quantity,Price,Subtotal,Order Total"
        ));
        assert!(ledger.contains("ORDER_TOTAL"));
        assert!(ledger.trim_end().ends_with("15.0"));
    }

    #[test]
    fn test_order_reports_todays_sales() {
        let dir = tempfile::tempdir().unwrap();
        let today = Local::now().format("%Y-%m-%d").to_string();
        let script = format!("5\np1\n2\nn\nn\nn\n6\n{}\n8\n", today);
        let output = run_script(dir.path(), seeded_catalog(), &script);

        assert!(output.contains(&format!("Total sales for {}: 20.00", today)));
    }

    #[test]
    fn test_empty_cart_cancels_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), seeded_catalog(), "5\nghost\nn\n8\n");

        assert!(output.contains("Product not found."));
        assert!(output.contains("Cart is empty, order cancelled."));

        let ledger_path = dir.path().join("sales.csv");
        assert!(!ledger_path.exists());
    }

    #[test]
    fn test_insufficient_stock_line_not_added() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), seeded_catalog(), "5\np1\n9\nn\n8\n");

        assert!(output.contains("Insufficient stock. Available: 5, requested: 9"));
        assert!(output.contains("Cart is empty, order cancelled."));
    }

    #[test]
    fn test_unsupported_bill_suffix_reported() {
        let dir = tempfile::tempdir().unwrap();
        let bill_path = dir.path().join("bill.pdf");
        let script = format!("5\np1\n1\nn\nn\ny\n{}\n8\n", bill_path.display());
        let output = run_script(dir.path(), seeded_catalog(), &script);

        assert!(output.contains("Unsupported bill format"));
        assert!(!bill_path.exists());
        // The order still commits after the failed export.
        assert!(output.contains("Order processed."));
    }

    #[test]
    fn test_bill_exported_to_txt() {
        let dir = tempfile::tempdir().unwrap();
        let bill_path = dir.path().join("bill.txt");
        let script = format!("5\np1\n1\nn\nn\ny\n{}\n8\n", bill_path.display());
        let output = run_script(dir.path(), seeded_catalog(), &script);

        assert!(output.contains("Bill saved."));
        let bill = std::fs::read_to_string(&bill_path).unwrap();
        assert!(bill.contains("Tea: 1 x 10.00 = 10.00"));
        assert!(bill.contains("Total: 10.00"));
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), seeded_catalog(), "2\np1\n\n\n7\n8\n");

        assert!(output.contains("Product updated."));
        let saved = Catalog::load(&dir.path().join("products.csv")).unwrap();
        let product = saved.get("p1").unwrap();
        assert_eq!(product.stock, 7);
        assert_eq!(product.name, "Tea");
        assert_eq!(product.price, 10.0);
    }

    #[test]
    fn test_duplicate_add_reported() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_script(dir.path(), seeded_catalog(), "1\np1\n8\n");
        assert!(output.contains("Product ID already exists."));
    }

    #[test]
    fn test_low_stock_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = seeded_catalog();
        catalog
            .insert(Product {
                id: "p2".to_string(),
                name: "Coffee".to_string(),
                price: 4.0,
                stock: 3,
            })
            .unwrap();

        let output = run_script(dir.path(), catalog, "7\n8\n");
        assert!(output.contains("Low Stock Products:"));
        assert!(output.contains("ID: p2, Coffee - Stock: 3"));
        assert!(!output.contains("ID: p1"));
    }
}
