use std::io;
use std::path::PathBuf;

use crate::catalog::Catalog;
use crate::ledger::SalesLedger;
use crate::session::Session;

mod cart;
mod catalog;
mod ledger;
mod session;

fn main() {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let catalog_path = PathBuf::from(args.next().unwrap_or_else(|| "products.csv".to_string()));
    let ledger_path = PathBuf::from(args.next().unwrap_or_else(|| "sales.csv".to_string()));

    let catalog = match Catalog::load(&catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Failed to load catalog from {}: {}", catalog_path.display(), e);
            std::process::exit(1);
        }
    };

    let session = Session::new(
        io::stdin().lock(),
        io::stdout().lock(),
        catalog,
        catalog_path,
        SalesLedger::new(ledger_path),
    );
    if let Err(e) = session.run() {
        eprintln!("Session failed: {}", e);
        std::process::exit(1);
    }
}
