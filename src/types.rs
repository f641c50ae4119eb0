use serde::Serialize;
use std::collections::HashMap;
use tabled::Tabled;

use crate::util::collapse_whitespace;

/// One respondent's answers for one question group (one CSV line).
#[derive(Debug, Clone, Default)]
pub struct SurveyRow {
    pub entity_id: String,
    /// `None` when the source table has no `Department/Region` column.
    pub organizational_unit: Option<String>,
    /// Already passed through `normalize_period`.
    pub period: String,
    /// Keyed by whitespace-normalized column header.
    pub responses: HashMap<String, String>,
}

impl SurveyRow {
    /// Raw value of a response column. Header names are matched after
    /// whitespace normalization, so `"Focus \n(Options: ...)"` and
    /// `"Focus (Options: ...)"` refer to the same column.
    pub fn response(&self, column: &str) -> Option<&str> {
        let key = collapse_whitespace(column);
        self.responses.get(&key).map(String::as_str)
    }

    /// Unit label for display; rows without a unit column show as empty.
    pub fn unit_label(&self) -> &str {
        self.organizational_unit.as_deref().map(str::trim).unwrap_or("")
    }
}

/// A loaded CSV export.
#[derive(Debug, Clone, Default)]
pub struct SurveyTable {
    pub name: String,
    /// Whitespace-normalized headers in file order.
    pub headers: Vec<String>,
    pub rows: Vec<SurveyRow>,
}

impl SurveyTable {
    pub fn has_column(&self, column: &str) -> bool {
        let key = collapse_whitespace(column);
        self.headers.iter().any(|h| *h == key)
    }
}

/// One line of a distribution preview / export.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DistributionRow {
    #[serde(rename = "Option")]
    #[tabled(rename = "Option")]
    pub label: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Percentage")]
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}

/// One output (work item) listed under a theme.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DetailRow {
    #[serde(rename = "Question")]
    #[tabled(rename = "Question")]
    pub question: String,
    #[serde(rename = "UserId")]
    #[tabled(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "Department/Region")]
    #[tabled(rename = "Department/Region")]
    pub unit: String,
    #[serde(rename = "Project Name")]
    #[tabled(rename = "Project Name")]
    pub project_name: String,
}

/// Output counts for one theme question.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct OutputStats {
    #[serde(rename = "Question")]
    #[tabled(rename = "Question")]
    pub question: String,
    #[serde(rename = "TotalWorks")]
    #[tabled(rename = "TotalWorks")]
    pub total_works: usize,
    #[serde(rename = "ValidWorks")]
    #[tabled(rename = "ValidWorks")]
    pub valid_works: usize,
    #[serde(rename = "UniqueUsers")]
    #[tabled(rename = "UniqueUsers")]
    pub unique_users: usize,
    #[serde(rename = "AvgWorksPerUser")]
    #[tabled(rename = "AvgWorksPerUser")]
    pub avg_works_per_user: f64,
    #[serde(rename = "CompletionRate")]
    #[tabled(rename = "CompletionRate")]
    pub completion_rate: f64,
}
