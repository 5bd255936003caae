//! Policy import options.

/// Columns that every policy export must provide.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Writing Agent Name",
    "Writing Agent Number",
    "Policy Number",
    "Policy Status",
    "Policy Effective Date",
    "Policy Issued Date",
    "Modal Premium",
    "Issued State",
    "Payment Mode",
    "Owner Name",
];

/// Options for mapping worksheet rows to policy records.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Value written to `source_carrier` on every record
    pub carrier: String,

    /// Labels that must all appear in a row for it to be the header
    pub header_labels: Vec<String>,

    /// First-cell label of the row carrying the report date
    pub report_date_label: String,

    /// Columns the header must contain
    pub required_columns: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            carrier: "F&G".to_string(),
            header_labels: vec!["Policy Number".to_string(), "Writing Agent Name".to_string()],
            report_date_label: "Date of Report:".to_string(),
            required_columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ImportOptions {
    /// Create new import options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the carrier label.
    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    /// Replace the header labels.
    pub fn with_header_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the report date label.
    pub fn with_report_date_label(mut self, label: impl Into<String>) -> Self {
        self.report_date_label = label.into();
        self
    }

    /// Check whether a row is the header row.
    pub fn is_header(&self, row: &[String]) -> bool {
        self.header_labels
            .iter()
            .all(|label| row.iter().any(|cell| cell == label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_default_options() {
        let opts = ImportOptions::default();
        assert_eq!(opts.carrier, "F&G");
        assert_eq!(opts.required_columns.len(), 10);
        assert_eq!(opts.report_date_label, "Date of Report:");
    }

    #[test]
    fn test_builder_pattern() {
        let opts = ImportOptions::new()
            .with_carrier("Acme Life")
            .with_header_labels(["Contract"])
            .with_report_date_label("As Of");
        assert_eq!(opts.carrier, "Acme Life");
        assert_eq!(opts.header_labels, vec!["Contract"]);
        assert_eq!(opts.report_date_label, "As Of");
    }

    #[test]
    fn test_header_predicate() {
        let opts = ImportOptions::default();
        assert!(opts.is_header(&row(&["Owner Name", "Writing Agent Name", "Policy Number"])));
        assert!(!opts.is_header(&row(&["Policy Number", "Owner Name"])));
        assert!(!opts.is_header(&row(&[])));
    }
}
