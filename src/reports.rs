use crate::chart::{ChartKind, ChartPanel};
use crate::config::{ChartConfig, Config, ThemeConfig};
use crate::coverage::{self, CoverageMatrix, CoverageSource};
use crate::distribution::{aggregate, aggregate_weighted};
use crate::filter::{default_period, period_options, FilterContext, Selection};
use crate::loader::{load_table, LoadReport};
use crate::types::{DetailRow, OutputStats, SurveyRow, SurveyTable};
use crate::util::{clean_cell, parse_count, percent, round_to};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Columns of the long-format overview file.
pub const QUESTION_COLUMN: &str = "question";
pub const OPTION_COLUMN: &str = "option";
pub const COUNT_COLUMN: &str = "count";

/// Every table the reports read, keyed by the configured group or question.
#[derive(Debug, Clone, Default)]
pub struct SurveyData {
    pub overview: Option<SurveyTable>,
    pub coverage: Vec<(String, SurveyTable)>,
    pub themes: Vec<(String, SurveyTable)>,
}

impl SurveyData {
    /// Load every configured file. Files that cannot be read are counted in
    /// the returned report and simply absent from the data.
    pub fn load(config: &Config) -> (Self, LoadReport) {
        let encodings = &config.data.encodings;
        let mut report = LoadReport::default();
        let mut data = SurveyData {
            overview: load_table(&config.data_path(&config.overview.file), encodings, &mut report),
            ..Default::default()
        };
        for group in &config.coverage.groups {
            if let Some(t) = load_table(&config.data_path(&group.file), encodings, &mut report) {
                data.coverage.push((group.name.clone(), t));
            }
        }
        for theme in &config.themes {
            if let Some(t) = load_table(&config.data_path(&theme.file), encodings, &mut report) {
                data.themes.push((theme.question.clone(), t));
            }
        }
        info!(
            "loaded {} files ({} rows), {} missing, {} unreadable",
            report.files_loaded, report.total_rows, report.files_missing, report.files_unreadable
        );
        (data, report)
    }

    pub fn is_empty(&self) -> bool {
        self.overview.is_none() && self.coverage.is_empty() && self.themes.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &SurveyTable> {
        self.overview
            .iter()
            .chain(self.coverage.iter().map(|(_, t)| t))
            .chain(self.themes.iter().map(|(_, t)| t))
    }

    pub fn coverage_table(&self, group: &str) -> Option<&SurveyTable> {
        self.coverage.iter().find(|(g, _)| g == group).map(|(_, t)| t)
    }

    pub fn theme_table(&self, question: &str) -> Option<&SurveyTable> {
        self.themes.iter().find(|(q, _)| q == question).map(|(_, t)| t)
    }
}

/// Start-up selection: an explicit period or unit from the command line or
/// config wins; otherwise the preferred period if the data has it, else the
/// most recent one.
pub fn initial_filter(config: &Config, data: &SurveyData) -> FilterContext {
    let period = match &config.filters.period {
        Some(p) => Selection::parse(p),
        None => default_period(
            &period_options(data.tables()),
            config.filters.preferred_period.as_deref(),
        ),
    };
    let unit = config
        .filters
        .unit
        .as_deref()
        .map(Selection::parse)
        .unwrap_or_default();
    FilterContext::new(period, unit)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTitle {
    pub group: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewReport {
    pub responses: ChartPanel,
    pub coverage_groups: Vec<GroupTitle>,
    pub coverage: CoverageMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeReport {
    pub question: String,
    pub title: String,
    pub stats: OutputStats,
    pub charts: Vec<ChartPanel>,
    /// Exported to its own CSV, kept out of the JSON summary.
    #[serde(skip)]
    pub details: Vec<DetailRow>,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub filters: FilterContext,
    pub load: LoadReport,
    pub overview: OverviewReport,
    pub themes: Vec<ThemeReport>,
}

/// Yes/no overview question plus the department × option coverage table.
pub fn generate_overview(data: &SurveyData, config: &Config, ctx: &FilterContext) -> OverviewReport {
    let responses = overview_responses(data.overview.as_ref(), config, ctx);

    let excluded = &config.coverage.excluded_columns;
    let mut sources: Vec<CoverageSource<'_>> = Vec::new();
    let mut coverage_groups = Vec::new();
    for group in &config.coverage.groups {
        let Some(table) = data.coverage_table(&group.name) else {
            debug!("no data for coverage group {}", group.name);
            continue;
        };
        debug!("coverage group {} from {}", group.name, table.name);
        let options = match &group.options {
            Some(o) => o.clone(),
            None => coverage::option_columns(&table.headers, excluded),
        };
        sources.push(CoverageSource {
            group: group.name.clone(),
            rows: ctx.apply(table).collect(),
            options,
        });
        coverage_groups.push(GroupTitle { group: group.name.clone(), title: group.title.clone() });
    }
    let coverage = coverage::build(&sources, config.coverage.entity);

    OverviewReport { responses, coverage_groups, coverage }
}

fn overview_responses(table: Option<&SurveyTable>, config: &Config, ctx: &FilterContext) -> ChartPanel {
    let marker = &config.overview.question_marker;
    // The long-format file carries no unit column; only the period applies.
    let period_ctx = ctx.period_only();
    let pairs: Vec<(&str, usize)> = table
        .map(|t| {
            period_ctx
                .apply(t)
                .filter(|r| r.response(QUESTION_COLUMN).is_some_and(|q| q.contains(marker.as_str())))
                .filter_map(|r| {
                    let option = r.response(OPTION_COLUMN)?;
                    Some((option, parse_count(r.response(COUNT_COLUMN)).unwrap_or(0)))
                })
                .collect()
        })
        .unwrap_or_default();
    let opts = config.base_aggregate_options().binary(true);
    ChartPanel::new(ChartKind::Pie, config.overview.title.clone(), aggregate_weighted(pairs, &opts))
}

/// Statistics, chart panels and detail list of one output theme. A missing
/// table yields an all-zero report.
pub fn generate_theme(
    table: Option<&SurveyTable>,
    theme: &ThemeConfig,
    config: &Config,
    ctx: &FilterContext,
) -> ThemeReport {
    let rows: Vec<&SurveyRow> = table.map(|t| ctx.apply(t).collect()).unwrap_or_default();
    let project_column = theme
        .project_column
        .as_deref()
        .filter(|c| table.is_some_and(|t| t.has_column(c)));
    let valid: Vec<&SurveyRow> = match project_column {
        Some(col) => rows
            .iter()
            .copied()
            .filter(|r| r.response(col).and_then(clean_cell).is_some())
            .collect(),
        None => rows.clone(),
    };

    let stats = output_stats(&theme.question, rows.len(), &valid);
    let charts = theme
        .charts
        .iter()
        .map(|c| chart_panel(&rows, c, config))
        .collect();
    let details = valid
        .iter()
        .map(|r| DetailRow {
            question: theme.question.clone(),
            user_id: r.entity_id.clone(),
            unit: r.unit_label().to_string(),
            project_name: project_column
                .and_then(|c| r.response(c))
                .and_then(clean_cell)
                .unwrap_or_default(),
        })
        .collect();

    ThemeReport {
        question: theme.question.clone(),
        title: theme.title.clone(),
        stats,
        charts,
        details,
    }
}

pub fn generate_themes(data: &SurveyData, config: &Config, ctx: &FilterContext) -> Vec<ThemeReport> {
    config
        .themes
        .iter()
        .map(|theme| generate_theme(data.theme_table(&theme.question), theme, config, ctx))
        .collect()
}

fn chart_panel(rows: &[&SurveyRow], chart: &ChartConfig, config: &Config) -> ChartPanel {
    let mut opts = config
        .base_aggregate_options()
        .with_top_n(chart.top_n)
        .with_preserve_order(chart.preserve_order)
        .binary(chart.binary);
    if let Some(order) = &chart.custom_order {
        opts = opts.with_custom_order(order.clone());
    }
    let values = rows.iter().filter_map(|r| r.response(&chart.field));
    ChartPanel::new(chart.kind, chart.title.clone(), aggregate(values, &opts))
}

pub fn output_stats(question: &str, total_works: usize, valid: &[&SurveyRow]) -> OutputStats {
    let users: HashSet<&str> = valid
        .iter()
        .map(|r| r.entity_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();
    let avg = if users.is_empty() {
        0.0
    } else {
        round_to(valid.len() as f64 / users.len() as f64, 2)
    };
    OutputStats {
        question: question.to_string(),
        total_works,
        valid_works: valid.len(),
        unique_users: users.len(),
        avg_works_per_user: avg,
        completion_rate: percent(valid.len(), total_works),
    }
}

pub fn generate_summary(
    generated_at: DateTime<Utc>,
    ctx: &FilterContext,
    load: &LoadReport,
    overview: &OverviewReport,
    themes: &[ThemeReport],
) -> DashboardSummary {
    DashboardSummary {
        generated_at,
        filters: ctx.clone(),
        load: load.clone(),
        overview: overview.clone(),
        themes: themes.to_vec(),
    }
}
