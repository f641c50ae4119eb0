//! Period / organizational-unit selection shared by every report section.

use crate::types::{SurveyRow, SurveyTable};
use crate::util::normalize_period;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Text of the "no restriction" choice in both selectors.
pub const ALL: &str = "All";

/// Value of one selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// `"All"` (any case) or a blank value selects everything.
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case(ALL) {
            Selection::All
        } else {
            Selection::Only(t.to_string())
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Only(v) => f.write_str(v),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterContext {
    pub period: Selection,
    pub organizational_unit: Selection,
}

impl FilterContext {
    pub fn new(period: Selection, organizational_unit: Selection) -> Self {
        Self { period, organizational_unit }
    }

    /// Row predicate. Periods are compared after normalization (`2026.0`
    /// equals `2026`), units after trimming. Rows that come from a table
    /// without a unit column are never excluded by the unit selector.
    pub fn matches(&self, row: &SurveyRow) -> bool {
        let period_ok = match &self.period {
            Selection::All => true,
            Selection::Only(p) => normalize_period(&row.period) == normalize_period(p),
        };
        let unit_ok = match (&self.organizational_unit, &row.organizational_unit) {
            (Selection::All, _) | (_, None) => true,
            (Selection::Only(u), Some(row_unit)) => row_unit.trim() == u.trim(),
        };
        period_ok && unit_ok
    }

    /// Rows of `table` that pass the filter.
    pub fn apply<'a>(&'a self, table: &'a SurveyTable) -> impl Iterator<Item = &'a SurveyRow> + 'a {
        table.rows.iter().filter(move |r| self.matches(r))
    }

    /// Same filter with the unit selector cleared.
    pub fn period_only(&self) -> Self {
        Self { period: self.period.clone(), organizational_unit: Selection::All }
    }
}

/// `"All"` followed by every distinct non-blank period, most recent first.
pub fn period_options<'a>(tables: impl IntoIterator<Item = &'a SurveyTable>) -> Vec<String> {
    let mut periods: BTreeSet<String> = BTreeSet::new();
    for table in tables {
        for row in &table.rows {
            let p = normalize_period(&row.period);
            if !p.is_empty() {
                periods.insert(p);
            }
        }
    }
    std::iter::once(ALL.to_string())
        .chain(periods.into_iter().rev())
        .collect()
}

/// `"All"` followed by every distinct non-blank unit, alphabetically.
pub fn unit_options<'a>(tables: impl IntoIterator<Item = &'a SurveyTable>) -> Vec<String> {
    let mut units: BTreeSet<String> = BTreeSet::new();
    for table in tables {
        for row in &table.rows {
            if let Some(u) = row.organizational_unit.as_deref().map(str::trim) {
                if !u.is_empty() {
                    units.insert(u.to_string());
                }
            }
        }
    }
    std::iter::once(ALL.to_string()).chain(units).collect()
}

/// Initial period choice: `preferred` when it is available, else the most
/// recent period, else `All`.
pub fn default_period(options: &[String], preferred: Option<&str>) -> Selection {
    if let Some(p) = preferred.map(normalize_period) {
        if options.iter().any(|o| *o == p) {
            return Selection::Only(p);
        }
    }
    options
        .iter()
        .find(|o| o.as_str() != ALL)
        .map(|o| Selection::Only(o.clone()))
        .unwrap_or(Selection::All)
}
