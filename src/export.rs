//! Downloadable JSON export of the local collection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::review_model::ReviewRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub file_name: String,
    pub contents: String,
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("customer-reviews-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_collection(records: &[ReviewRecord], date: NaiveDate) -> Result<ExportDocument, serde_json::Error> {
    Ok(ExportDocument {
        file_name: export_file_name(date),
        contents: serde_json::to_string_pretty(records)?,
    })
}
