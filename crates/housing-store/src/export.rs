//! JSON and CSV snapshots of the vault, in stored order.
//!
//! The JSON export is the same array the vault persists, so it can be fed
//! back through [`Vault::import_json`].

use chrono::SecondsFormat;
use housing_shared::Application;

use crate::backend::StorageBackend;
use crate::error::Result;
use crate::vault::Vault;

pub const CSV_HEADER: [&str; 12] = [
    "Reference Number",
    "Full Name",
    "National ID",
    "Gender",
    "Province",
    "Specialization",
    "GPA",
    "Phone",
    "Email",
    "Room Type",
    "Fees",
    "Registration Date",
];

impl<B: StorageBackend> Vault<B> {
    /// Pretty-printed JSON array of every application.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.list())?)
    }

    /// Header row plus one row per application, RFC 4180 quoting.
    pub fn export_csv(&self) -> String {
        let mut out = csv_row(CSV_HEADER.iter().map(|s| s.to_string()));
        for app in self.list() {
            out.push_str(&csv_row(csv_fields(app)));
        }
        out
    }
}

fn csv_fields(app: &Application) -> impl Iterator<Item = String> {
    [
        app.reference_number.clone(),
        app.form.full_name.clone(),
        app.form.national_id.clone(),
        app.form.gender.to_string(),
        app.form.province.to_string(),
        app.form.specialization.to_string(),
        format!("{:.2}", app.form.gpa),
        app.form.phone.clone(),
        app.form.email.clone(),
        app.form.room_type.to_string(),
        app.fees.to_string(),
        app.registration_date
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
    .into_iter()
}

fn csv_row(fields: impl Iterator<Item = String>) -> String {
    let mut row = fields
        .map(|field| escape_csv(&field))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Quote a field when it contains a delimiter, quote or line break; embedded
/// quotes are doubled.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
