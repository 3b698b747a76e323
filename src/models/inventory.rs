// file: src/models/inventory.rs
// description: parts inventory row and its spreadsheet column names
// reference: internal data structures

use serde::{Deserialize, Serialize};

pub const PART_NAME: &str = "Part Name";
pub const PART_NUMBER: &str = "Part Number";
pub const AVAILABLE_QUANTITY: &str = "Available Quantity";
pub const REQUIRED_QUANTITY: &str = "Required Quantity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub part_name: String,
    pub part_number: String,
    pub available_quantity: i64,
    pub required_quantity: i64,
}

impl InventoryItem {
    /// Parts still needed to reach the required count.
    pub fn shortfall(&self) -> i64 {
        (self.required_quantity - self.available_quantity).max(0)
    }
}
