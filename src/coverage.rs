//! Entity × option coverage cross-tabulation.
//!
//! Each source group (one yes/no question, one CSV) contributes one column per
//! option. A cell is covered when any of the entity's rows answered `YES` for
//! that option. The trailing rate of a column is computed over the entities
//! that appear in that column's group.

use crate::loader::{ENTITY_COLUMNS, UNIT_COLUMN};
use crate::types::SurveyRow;
use crate::util::{collapse_whitespace, percent};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Which row attribute identifies an entity in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityField {
    /// Department / region (the overview table).
    #[default]
    Unit,
    Respondent,
}

impl EntityField {
    pub fn label(&self) -> &'static str {
        match self {
            EntityField::Unit => UNIT_COLUMN,
            EntityField::Respondent => ENTITY_COLUMNS[0],
        }
    }

    fn key<'r>(&self, row: &'r SurveyRow) -> Option<&'r str> {
        let v = match self {
            EntityField::Unit => row.organizational_unit.as_deref()?,
            EntityField::Respondent => row.entity_id.as_str(),
        };
        let v = v.trim();
        (!v.is_empty()).then_some(v)
    }
}

/// One question group feeding the matrix.
#[derive(Debug, Clone)]
pub struct CoverageSource<'a> {
    pub group: String,
    pub rows: Vec<&'a SurveyRow>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageColumn {
    pub group: String,
    pub option: String,
}

/// Dense coverage table: `cells[entity][column]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageMatrix {
    pub entities: Vec<String>,
    pub columns: Vec<CoverageColumn>,
    pub cells: Vec<Vec<bool>>,
    /// Coverage rate per column, percent with one decimal.
    pub rates: Vec<f64>,
}

/// Option-as-row view of a [`CoverageMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransposedRow {
    pub group: String,
    pub option: String,
    /// One cell per entity, in matrix entity order.
    pub cells: Vec<bool>,
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransposedCoverage {
    pub entities: Vec<String>,
    pub rows: Vec<TransposedRow>,
}

/// Option columns of a table: every header except the excluded identity and
/// free-text ones (compared case-insensitively).
pub fn option_columns(headers: &[String], excluded: &[String]) -> Vec<String> {
    let excluded: HashSet<String> = excluded
        .iter()
        .map(|e| collapse_whitespace(e).to_lowercase())
        .collect();
    headers
        .iter()
        .map(|h| collapse_whitespace(h))
        .filter(|h| !h.is_empty() && !excluded.contains(&h.to_lowercase()))
        .collect()
}

fn is_yes(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("YES"))
}

pub fn build(sources: &[CoverageSource<'_>], field: EntityField) -> CoverageMatrix {
    let mut entities: Vec<String> = Vec::new();
    let mut entity_index: HashMap<String, usize> = HashMap::new();
    // Per column: set of covered entity indices; per group: entities seen.
    let mut columns = Vec::new();
    let mut covered: Vec<HashSet<usize>> = Vec::new();
    let mut column_group_size: Vec<usize> = Vec::new();

    for source in sources {
        let mut seen: HashSet<usize> = HashSet::new();
        let first_col = columns.len();
        for option in &source.options {
            columns.push(CoverageColumn {
                group: source.group.clone(),
                option: collapse_whitespace(option),
            });
            covered.push(HashSet::new());
        }

        for row in &source.rows {
            let Some(key) = field.key(row) else {
                continue;
            };
            let idx = match entity_index.get(key) {
                Some(&i) => i,
                None => {
                    entity_index.insert(key.to_string(), entities.len());
                    entities.push(key.to_string());
                    entities.len() - 1
                }
            };
            seen.insert(idx);
            for (offset, option) in source.options.iter().enumerate() {
                // A missing option column reads as `None`, which is never a YES.
                if is_yes(row.response(option)) {
                    covered[first_col + offset].insert(idx);
                }
            }
        }
        if seen.is_empty() && !source.rows.is_empty() {
            warn!(
                "coverage group {}: {} rows but none has a {} key",
                source.group,
                source.rows.len(),
                field.label()
            );
        }
        column_group_size.extend(std::iter::repeat(seen.len()).take(source.options.len()));
    }

    let cells = (0..entities.len())
        .map(|e| covered.iter().map(|c| c.contains(&e)).collect())
        .collect();
    let rates = covered
        .iter()
        .zip(&column_group_size)
        .map(|(c, &n)| percent(c.len(), n))
        .collect();

    CoverageMatrix { entities, columns, cells, rates }
}

impl CoverageMatrix {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, entity: &str, group: &str, option: &str) -> Option<bool> {
        let e = self.entities.iter().position(|x| x == entity)?;
        let c = self
            .columns
            .iter()
            .position(|col| col.group == group && col.option == option)?;
        Some(self.cells[e][c])
    }

    /// `(group, column count)` in display order, for merged header cells.
    pub fn group_spans(&self) -> Vec<(&str, usize)> {
        let mut spans: Vec<(&str, usize)> = Vec::new();
        for col in &self.columns {
            if let Some((g, n)) = spans.last_mut() {
                if *g == col.group {
                    *n += 1;
                    continue;
                }
            }
            spans.push((col.group.as_str(), 1));
        }
        spans
    }

    pub fn transposed(&self) -> TransposedCoverage {
        let rows = self
            .columns
            .iter()
            .enumerate()
            .map(|(c, col)| TransposedRow {
                group: col.group.clone(),
                option: col.option.clone(),
                cells: self.cells.iter().map(|row| row[c]).collect(),
                rate: self.rates[c],
            })
            .collect();
        TransposedCoverage { entities: self.entities.clone(), rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(unit: &str, answers: &[(&str, &str)]) -> SurveyRow {
        SurveyRow {
            entity_id: format!("user-{}", unit),
            organizational_unit: Some(unit.to_string()),
            period: "2024".to_string(),
            responses: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn source<'a>(group: &str, rows: &'a [SurveyRow], options: &[&str]) -> CoverageSource<'a> {
        CoverageSource {
            group: group.to_string(),
            rows: rows.iter().collect(),
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn any_yes_row_covers_the_entity() {
        let rows = vec![
            row("A", &[("opt1", "YES")]),
            row("A", &[("opt1", "")]),
            row("B", &[("opt1", "No")]),
        ];
        let m = build(&[source("Q3", &rows, &["opt1"])], EntityField::Unit);
        assert_eq!(m.entities, vec!["A", "B"]);
        assert_eq!(m.get("A", "Q3", "opt1"), Some(true));
        assert_eq!(m.get("B", "Q3", "opt1"), Some(false));
        assert_eq!(m.rates, vec![50.0]);
    }

    #[test]
    fn yes_is_trimmed_and_case_insensitive() {
        let rows = vec![row("A", &[("o", " yes ")]), row("B", &[("o", "Yes, partly")])];
        let m = build(&[source("Q3", &rows, &["o"])], EntityField::Unit);
        assert_eq!(m.cells, vec![vec![true], vec![false]]);
    }

    #[test]
    fn groups_keep_order_and_rates_use_group_entities() {
        let q3 = vec![row("A", &[("x", "YES")]), row("B", &[("x", "YES")])];
        let q4 = vec![row("C", &[("x", "YES"), ("y", "no")])];
        let m = build(
            &[source("Q3", &q3, &["x"]), source("Q4", &q4, &["x", "y"])],
            EntityField::Unit,
        );
        assert_eq!(m.entities, vec!["A", "B", "C"]);
        let cols: Vec<(&str, &str)> = m
            .columns
            .iter()
            .map(|c| (c.group.as_str(), c.option.as_str()))
            .collect();
        // Same option name in two groups stays two columns.
        assert_eq!(cols, vec![("Q3", "x"), ("Q4", "x"), ("Q4", "y")]);
        assert_eq!(m.rates, vec![100.0, 100.0, 0.0]);
        // C never answered Q3, A never answered Q4.
        assert_eq!(m.get("C", "Q3", "x"), Some(false));
        assert_eq!(m.get("A", "Q4", "x"), Some(false));
        assert_eq!(m.group_spans(), vec![("Q3", 1), ("Q4", 2)]);
    }

    #[test]
    fn missing_option_column_is_all_false() {
        let rows = vec![row("A", &[("present", "YES")])];
        let m = build(&[source("Q5", &rows, &["present", "absent"])], EntityField::Unit);
        assert_eq!(m.cells, vec![vec![true, false]]);
        assert_eq!(m.rates, vec![100.0, 0.0]);
    }

    #[test]
    fn empty_group_rates_are_zero_and_matrix_is_empty() {
        let rows: Vec<SurveyRow> = Vec::new();
        let m = build(&[source("Q3", &rows, &["a", "b"])], EntityField::Unit);
        assert!(m.is_empty());
        assert_eq!(m.rates, vec![0.0, 0.0]);
        assert!(build(&[], EntityField::Unit).columns.is_empty());
    }

    #[test]
    fn blank_entities_are_skipped() {
        let rows = vec![row("", &[("o", "YES")]), row("  ", &[("o", "YES")])];
        let m = build(&[source("Q3", &rows, &["o"])], EntityField::Unit);
        assert!(m.entities.is_empty());
    }

    #[test]
    fn rows_without_unit_column_give_no_entities() {
        let mut rows = vec![row("A", &[("o", "YES")]), row("B", &[("o", "YES")])];
        for r in &mut rows {
            r.organizational_unit = None;
        }
        let m = build(&[source("Q3", &rows, &["o"])], EntityField::Unit);
        assert!(m.is_empty());
        assert_eq!(m.rates, vec![0.0]);
        assert_eq!(EntityField::Unit.label(), "Department/Region");
        let m = build(&[source("Q3", &rows, &["o"])], EntityField::Respondent);
        assert_eq!(m.entities, vec!["user-A", "user-B"]);
    }

    #[test]
    fn respondent_entities() {
        let rows = vec![row("A", &[("o", "YES")]), row("B", &[("o", "no")])];
        let m = build(&[source("Q3", &rows, &["o"])], EntityField::Respondent);
        assert_eq!(m.entities, vec!["user-A", "user-B"]);
    }

    #[test]
    fn transposed_view_shares_cells_and_rates() {
        let rows = vec![
            row("A", &[("x", "YES"), ("y", "YES")]),
            row("B", &[("x", "NO"), ("y", "YES")]),
            row("C", &[("x", ""), ("y", "YES")]),
        ];
        let m = build(&[source("Q3", &rows, &["x", "y"])], EntityField::Unit);
        let t = m.transposed();
        assert_eq!(t.entities, m.entities);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].cells, vec![true, false, false]);
        assert_eq!(t.rows[0].rate, 33.3);
        assert_eq!(t.rows[1].rate, 100.0);
        for (c, r) in t.rows.iter().enumerate() {
            assert_eq!(r.rate, m.rates[c]);
        }
    }

    #[test]
    fn option_columns_skip_identity_and_free_text() {
        let headers: Vec<String> = ["UserId", "Department/Region", "YEAR", "Policy", "Other", "Other  (elaborated answ)", "Skills"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let excluded: Vec<String> = ["UserId", "Department/Region", "year", "Other", "Other (elaborated answ)"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(option_columns(&headers, &excluded), vec!["Policy", "Skills"]);
    }
}
