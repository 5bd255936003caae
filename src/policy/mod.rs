//! Carrier policy export mapping.
//!
//! Turns the row grid of a carrier's policy workbook into deduplicated
//! [`Policy`] records.
//!
//! # Example
//!
//! ```no_run
//! use policybook::policy::{import_policies, ImportOptions, PolicySummary};
//!
//! let rows = policybook::read_rows("fng_book.xlsx")?;
//! let policies = import_policies(&rows, &ImportOptions::default())?;
//! let summary = PolicySummary::from_policies(&policies);
//! println!("policies={}", summary.total);
//! # Ok::<(), policybook::Error>(())
//! ```

mod normalize;
mod options;

pub use normalize::{normalize_state, parse_amount, parse_date, state_code};
pub use options::{ImportOptions, REQUIRED_COLUMNS};

use crate::error::{Error, Result};
use crate::xlsx::Row;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A normalized policy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_number: String,
    pub writing_agent_name: String,
    pub writing_agent_number: String,
    pub writing_agent_email: String,
    pub policy_status: String,
    pub policy_status_norm: String,
    pub product_type: String,
    pub product_name: String,
    pub policy_issued_date: String,
    pub policy_effective_date: String,
    pub first_premium_payment_date: String,
    pub issued_state: String,
    pub issued_state_code: String,
    pub payment_mode: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub owner_email: String,
    pub modal_premium: Option<f64>,
    pub current_account_value: Option<f64>,
    pub total_premium_paid: Option<f64>,
    pub report_date: String,
    pub source_carrier: String,
}

/// Location of the header row and the report date found above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Index of the header row in the grid
    pub index: usize,
    /// Normalized report date, empty if none was found
    pub report_date: String,
}

/// Find the header row.
///
/// Rows are scanned top to bottom; a row starting with the report date label
/// sets the report date, and the first row matching the header predicate ends
/// the scan.
pub fn find_header(rows: &[Row], options: &ImportOptions) -> Result<HeaderInfo> {
    let mut report_date = String::new();

    for (index, row) in rows.iter().enumerate() {
        if row.first() == Some(&options.report_date_label) {
            report_date = parse_date(row.get(1).map(String::as_str).unwrap_or_default());
        }
        if options.is_header(row) {
            return Ok(HeaderInfo { index, report_date });
        }
    }

    Err(Error::HeaderNotFound)
}

/// Column name to index lookup for a header row.
#[derive(Debug, Clone)]
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(header: &[String], required: &[String]) -> Result<Self> {
        let index: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        if let Some(missing) = required.iter().find(|name| !index.contains_key(*name)) {
            return Err(Error::MissingColumn(missing.clone()));
        }
        Ok(Self { index })
    }

    /// Trimmed value of a column, empty when the column is absent.
    fn text(&self, row: &[String], name: &str) -> String {
        self.raw(row, name).trim().to_string()
    }

    fn raw<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.index
            .get(name)
            .and_then(|&i| row.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn date(&self, row: &[String], name: &str) -> String {
        parse_date(self.raw(row, name))
    }

    fn amount(&self, row: &[String], name: &str) -> Option<f64> {
        self.index.get(name)?;
        parse_amount(self.raw(row, name))
    }
}

fn map_row(row: &[String], cols: &Columns, report_date: &str, options: &ImportOptions) -> Policy {
    let status = cols.text(row, "Policy Status");
    let issued_state = cols.text(row, "Issued State");

    Policy {
        policy_number: cols.text(row, "Policy Number"),
        writing_agent_name: cols.text(row, "Writing Agent Name"),
        writing_agent_number: cols.text(row, "Writing Agent Number"),
        writing_agent_email: cols.text(row, "Writing Agent Email"),
        policy_status_norm: status.to_lowercase(),
        policy_status: status,
        product_type: cols.text(row, "Product Type"),
        product_name: cols.text(row, "Product Name"),
        policy_issued_date: cols.date(row, "Policy Issued Date"),
        policy_effective_date: cols.date(row, "Policy Effective Date"),
        first_premium_payment_date: cols.date(row, "First Premium Payment Date"),
        issued_state_code: normalize_state(&issued_state),
        issued_state,
        payment_mode: cols.text(row, "Payment Mode"),
        owner_name: cols.text(row, "Owner Name"),
        owner_phone: cols.text(row, "Owner Phone"),
        owner_email: cols.text(row, "Owner Email"),
        modal_premium: cols.amount(row, "Modal Premium"),
        current_account_value: cols.amount(row, "Current Account Value"),
        total_premium_paid: cols.amount(row, "Total Premium Paid"),
        report_date: report_date.to_string(),
        source_carrier: options.carrier.clone(),
    }
}

/// Map a worksheet row grid to policy records.
///
/// Rows below the header are padded to the header width, rows without a
/// policy number are skipped, duplicates keep the record with the latest
/// issued date, and the result is sorted newest first.
pub fn import_policies(rows: &[Row], options: &ImportOptions) -> Result<Vec<Policy>> {
    let header = find_header(rows, options)?;
    let header_row = &rows[header.index];
    let cols = Columns::new(header_row, &options.required_columns)?;

    let mut order: Vec<String> = Vec::new();
    let mut by_number: HashMap<String, Policy> = HashMap::new();

    for row in &rows[header.index + 1..] {
        let mut row = row.clone();
        if row.len() < header_row.len() {
            row.resize(header_row.len(), String::new());
        }

        let policy = map_row(&row, &cols, &header.report_date, options);
        if policy.policy_number.is_empty() {
            continue;
        }

        match by_number.get_mut(&policy.policy_number) {
            None => {
                order.push(policy.policy_number.clone());
                by_number.insert(policy.policy_number.clone(), policy);
            }
            Some(kept) => {
                tracing::debug!(policy_number = %policy.policy_number, "duplicate policy row");
                if policy.policy_issued_date > kept.policy_issued_date {
                    *kept = policy;
                }
            }
        }
    }

    let mut policies: Vec<Policy> = order
        .iter()
        .filter_map(|number| by_number.remove(number))
        .collect();
    policies.sort_by(|a, b| {
        (&b.policy_issued_date, &b.policy_number).cmp(&(&a.policy_issued_date, &a.policy_number))
    });

    tracing::info!(policies = policies.len(), carrier = %options.carrier, "imported policies");
    Ok(policies)
}

/// Policy counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub total: usize,
    pub statuses: BTreeMap<String, usize>,
}

impl PolicySummary {
    pub fn from_policies(policies: &[Policy]) -> Self {
        let mut statuses = BTreeMap::new();
        for policy in policies {
            *statuses.entry(policy.policy_status.clone()).or_insert(0) += 1;
        }
        Self {
            total: policies.len(),
            statuses,
        }
    }
}
