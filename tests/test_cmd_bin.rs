use std::io::Write;
use std::process::{Command, Stdio};

const CATALOG: &str = "\
id,name,price,stock
p1,Tea,10.0,5
p2,Coffee,4.0,3
";

/// Drives one full session over stdin: search a product, sell two units of
/// Tea with a discount, list low stock, query today's sales, then quit.
fn session_script(today: &str) -> String {
    format!(
        "4\ntea\n5\np1\n2\nn\ny\n5.0\nn\n7\n6\n{}\n8\n",
        today
    )
}

fn run_session(dir: &std::path::Path, input: &str) -> std::process::Output {
    let bin_path = env!("CARGO_BIN_EXE_inventory_engine");
    let mut child = Command::new(bin_path)
        .arg(dir.join("products.csv"))
        .arg(dir.join("sales.csv"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn binary");

    child
        .stdin
        .as_mut()
        .expect("Failed to open child stdin")
        .write_all(input.as_bytes())
        .expect("Failed to write to child stdin");

    child
        .wait_with_output()
        .expect("Failed to wait for binary")
}

#[test]
fn test_interactive_session_end_to_end() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("products.csv"), CATALOG)
        .expect("Failed to seed catalog file");

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let output = run_session(dir.path(), &session_script(&today));

    assert!(
        output.status.success(),
        "Binary failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("ID: p1, Name: Tea, Price: 10.00, Stock: 5"));
    assert!(stdout.contains("Added 2 of Tea to cart."));
    assert!(stdout.contains("Subtotal: 20.00"));
    assert!(stdout.contains("Total: 15.00"));
    assert!(stdout.contains("Order processed."));
    assert!(stdout.contains("ID: p2, Coffee - Stock: 3"));
    assert!(stdout.contains(&format!("Total sales for {}: 15.00", today)));
    assert!(stdout.contains("Changes saved. Goodbye!"));

    // Stock for p1 went from 5 to 3 and was persisted on quit.
    let catalog = std::fs::read_to_string(dir.path().join("products.csv"))
        .expect("Failed to read catalog file");
    assert!(catalog.contains("p1,Tea,10.0,3"));
    assert!(catalog.contains("p2,Coffee,4.0,3"));

    let ledger = std::fs::read_to_string(dir.path().join("sales.csv"))
        .expect("Failed to read sales file");
    let lines: Vec<&str> = ledger.lines().collect();
    assert_eq!(
        lines[0],
        "Date/Time,Product ID,Product Name,Quantity,Price,Subtotal,Order Total"
    );
    assert!(lines[1].contains(",p1,Tea,2,10.0,20.0,"));
    assert!(lines[2].contains(",ORDER_TOTAL,,,,,15.0"));
}

#[test]
fn test_session_with_missing_catalog_starts_empty() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = run_session(dir.path(), "4\nghost\n8\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Product not found."));

    // Quit writes the (empty) catalog back.
    let catalog = std::fs::read_to_string(dir.path().join("products.csv"))
        .expect("Failed to read catalog file");
    assert_eq!(catalog.trim(), "id,name,price,stock");
}
