use crate::coverage::{CoverageMatrix, TransposedCoverage};
use crate::distribution::Distribution;
use crate::loader::UNIT_COLUMN;
use crate::reports::GroupTitle;
use crate::types::DistributionRow;
use crate::util::format_rate;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Cell marker for a covered entity/option pair; uncovered cells stay blank.
pub const COVERED_MARK: &str = "○";
pub const RATE_LABEL: &str = "Coverage Rate";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn distribution_rows(data: &Distribution) -> Vec<DistributionRow> {
    data.iter()
        .zip(data.percentages())
        .map(|((label, count), (_, pct))| DistributionRow {
            label: label.to_string(),
            count,
            percentage: format_rate(pct),
        })
        .collect()
}

fn mark(covered: bool) -> String {
    let m = if covered { COVERED_MARK } else { "" };
    m.to_string()
}

fn column_header(group: &str, option: &str) -> String {
    format!("{}: {}", group, option)
}

/// Header, one row per entity and the trailing rate row, as plain strings.
fn coverage_records(matrix: &CoverageMatrix) -> Vec<Vec<String>> {
    let mut records = Vec::with_capacity(matrix.entities.len() + 2);
    records.push(
        std::iter::once(UNIT_COLUMN.to_string())
            .chain(matrix.columns.iter().map(|c| column_header(&c.group, &c.option)))
            .collect(),
    );
    for (entity, cells) in matrix.entities.iter().zip(&matrix.cells) {
        records.push(
            std::iter::once(entity.clone())
                .chain(cells.iter().map(|&c| mark(c)))
                .collect(),
        );
    }
    records.push(
        std::iter::once(RATE_LABEL.to_string())
            .chain(matrix.rates.iter().map(|&r| format_rate(r)))
            .collect(),
    );
    records
}

/// Markdown rendering of the coverage matrix. Columns are only known at
/// runtime, so the table is assembled with the dynamic builder.
pub fn coverage_markdown(matrix: &CoverageMatrix) -> String {
    if matrix.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    for record in coverage_records(matrix) {
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn write_coverage_csv(path: &Path, matrix: &CoverageMatrix) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in coverage_records(matrix) {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Option-per-row export: group, option, one column per entity, rate.
pub fn write_coverage_by_option_csv(path: &Path, coverage: &TransposedCoverage) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let header: Vec<&str> = ["Group", "Option"]
        .into_iter()
        .chain(coverage.entities.iter().map(String::as_str))
        .chain(std::iter::once(RATE_LABEL))
        .collect();
    wtr.write_record(&header)?;
    for row in &coverage.rows {
        let record: Vec<String> = [row.group.clone(), row.option.clone()]
            .into_iter()
            .chain(row.cells.iter().map(|&c| mark(c)))
            .chain(std::iter::once(format_rate(row.rate)))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn title_of<'a>(titles: &'a [GroupTitle], group: &'a str) -> &'a str {
    titles
        .iter()
        .find(|t| t.group == group)
        .map(|t| t.title.as_str())
        .unwrap_or(group)
}

/// Two-level header table: one merged title cell per group, then the option
/// names, entity rows and the rate row.
pub fn coverage_html(matrix: &CoverageMatrix, titles: &[GroupTitle]) -> String {
    // `write!` into a String cannot fail.
    let mut html = String::from("<table class=\"coverage-table\">\n<tr>");
    let _ = write!(html, "<th class=\"unit-header\" rowspan=\"2\">{}</th>", escape_html(UNIT_COLUMN));
    for (group, span) in matrix.group_spans() {
        let _ = write!(
            html,
            "<th class=\"title-header\" colspan=\"{}\">{}</th>",
            span,
            escape_html(title_of(titles, group))
        );
    }
    html.push_str("</tr>\n<tr>");
    for col in &matrix.columns {
        let _ = write!(html, "<th class=\"option-header\">{}</th>", escape_html(&col.option));
    }
    html.push_str("</tr>\n");

    for (entity, cells) in matrix.entities.iter().zip(&matrix.cells) {
        let _ = write!(html, "<tr><td class=\"unit-col\">{}</td>", escape_html(entity));
        for &c in cells {
            let _ = write!(html, "<td class=\"data-cell\">{}</td>", mark(c));
        }
        html.push_str("</tr>\n");
    }

    let _ = write!(html, "<tr class=\"rate-row\"><td class=\"unit-col\">{}</td>", RATE_LABEL);
    for &r in &matrix.rates {
        let _ = write!(html, "<td class=\"rate-cell\">{}</td>", format_rate(r));
    }
    html.push_str("</tr>\n</table>\n");
    html
}

pub fn write_coverage_html(path: &Path, matrix: &CoverageMatrix, titles: &[GroupTitle]) -> Result<()> {
    std::fs::write(path, coverage_html(matrix, titles))
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageColumn;
    use crate::distribution::{aggregate, AggregateOptions};

    fn matrix() -> CoverageMatrix {
        CoverageMatrix {
            entities: vec!["Africa".to_string(), "R&D <HQ>".to_string()],
            columns: vec![
                CoverageColumn { group: "Q3".to_string(), option: "Policy".to_string() },
                CoverageColumn { group: "Q3".to_string(), option: "Skills".to_string() },
                CoverageColumn { group: "Q4".to_string(), option: "Rights".to_string() },
            ],
            cells: vec![vec![true, false, true], vec![false, false, true]],
            rates: vec![50.0, 0.0, 100.0],
        }
    }

    fn titles() -> Vec<GroupTitle> {
        vec![GroupTitle { group: "Q3".to_string(), title: "Clusters & Pillars".to_string() }]
    }

    #[test]
    fn html_merges_group_titles_and_escapes() {
        let html = coverage_html(&matrix(), &titles());
        assert!(html.contains("<th class=\"title-header\" colspan=\"2\">Clusters &amp; Pillars</th>"));
        // Groups without a configured title fall back to their name.
        assert!(html.contains("<th class=\"title-header\" colspan=\"1\">Q4</th>"));
        assert!(html.contains("R&amp;D &lt;HQ&gt;"));
        assert_eq!(html.matches(COVERED_MARK).count(), 3);
        assert!(html.contains("<td class=\"rate-cell\">50.0%</td>"));
        assert!(html.contains("<td class=\"rate-cell\">100.0%</td>"));
    }

    #[test]
    fn markdown_has_rate_row() {
        let md = coverage_markdown(&matrix());
        assert!(md.contains("Q3: Policy"));
        assert!(md.contains(RATE_LABEL));
        assert!(md.contains("0.0%"));
        assert_eq!(coverage_markdown(&CoverageMatrix::default()), "(no rows)");
    }

    #[test]
    fn coverage_csv_files_match_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview_coverage.csv");
        write_coverage_csv(&path, &matrix()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Department/Region,Q3: Policy,Q3: Skills,Q4: Rights");
        assert_eq!(lines[1], "Africa,○,,○");
        assert_eq!(lines[3], "Coverage Rate,50.0%,0.0%,100.0%");

        let path = dir.path().join("overview_coverage_by_option.csv");
        write_coverage_by_option_csv(&path, &matrix().transposed()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Group,Option,Africa,R&D <HQ>,Coverage Rate");
        assert_eq!(lines[3], "Q4,Rights,○,○,100.0%");
    }

    #[test]
    fn distribution_rows_carry_percentages() {
        let d = aggregate(["Yes", "Yes", "No"], &AggregateOptions::default());
        let rows = distribution_rows(&d);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Yes");
        assert_eq!(rows[0].percentage, "66.7%");
        assert_eq!(rows[1].percentage, "33.3%");
    }

    #[test]
    fn json_and_csv_writers_create_files() {
        let dir = tempfile::tempdir().unwrap();
        let d = aggregate(["a"], &AggregateOptions::default());
        write_csv(&dir.path().join("d.csv"), &distribution_rows(&d)).unwrap();
        let csv_text = std::fs::read_to_string(dir.path().join("d.csv")).unwrap();
        assert!(csv_text.starts_with("Option,Count,Percentage"));
        write_json(&dir.path().join("d.json"), &d).unwrap();
        let json = std::fs::read_to_string(dir.path().join("d.json")).unwrap();
        assert!(json.contains("\"A\": 1"));
        assert!(write_csv(&dir.path().join("missing/d.csv"), &distribution_rows(&d)).is_err());
    }
}
