use std::path::Path;

pub const ALICE: &str = "+254712345678";
pub const BOB: &str = "+254723456789";

/// Writes a small accounts seed file: Alice 15000.00, Bob 25000.00.
pub fn write_seed_csv(path: &Path) {
    let mut wtr = csv::Writer::from_path(path).unwrap();
    wtr.write_record(["phone", "full_name", "balance"]).unwrap();
    wtr.write_record([ALICE, "James Kamau", "15000.00"]).unwrap();
    wtr.write_record([BOB, "Mary Wanjiku", "25000.00"]).unwrap();
    wtr.flush().unwrap();
}
