//! Configuration file handling.
//!
//! The survey layout (file names, chart fields, synonym spellings, custom
//! orders) lives here so the aggregation code only sees data. Loaded from
//! `.survey_report.toml`; every section is optional and falls back to the
//! built-in layout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chart::ChartKind;
use crate::coverage::EntityField;
use crate::distribution::{AggregateOptions, SynonymTable};
use crate::loader::{Encoding, ENTITY_COLUMNS, PERIOD_COLUMNS, UNIT_COLUMN};
use crate::paging::DEFAULT_PAGE_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = ".survey_report.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default)]
    pub distribution: DistributionConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub overview: OverviewConfig,

    #[serde(default)]
    pub coverage: CoverageConfig,

    #[serde(default = "default_themes")]
    pub themes: Vec<ThemeConfig>,

    /// Canonical label -> accepted spellings. Matching is case-insensitive,
    /// so only genuinely different spellings need listing.
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            filters: FilterConfig::default(),
            distribution: DistributionConfig::default(),
            output: OutputConfig::default(),
            overview: OverviewConfig::default(),
            coverage: CoverageConfig::default(),
            themes: default_themes(),
            synonyms: default_synonyms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,

    /// Tried in order for every file.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<Encoding>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { dir: default_data_dir(), encodings: default_encodings() }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("orignaldata")
}

fn default_encodings() -> Vec<Encoding> {
    Encoding::DEFAULT_ORDER.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Period selected at start-up when present in the data.
    #[serde(default = "default_preferred_period")]
    pub preferred_period: Option<String>,

    /// Fixed start-up period, used even when the data lacks it.
    #[serde(default)]
    pub period: Option<String>,

    /// Unit selected at start-up; `All` when unset.
    #[serde(default)]
    pub unit: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { preferred_period: default_preferred_period(), period: None, unit: None }
    }
}

fn default_preferred_period() -> Option<String> {
    Some("2024".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Separator of multi-select answers; empty disables splitting.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Labels whose share is at or below this fraction are hidden (0 = off).
    #[serde(default)]
    pub min_fraction: f64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self { delimiter: default_delimiter(), min_fraction: 0.0 }
    }
}

fn default_delimiter() -> String {
    ";".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Rows shown per table in console previews.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            page_size: default_page_size(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_preview_rows() -> usize {
    10
}

/// The long-format yes/no question on the overview page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewConfig {
    #[serde(default = "default_overview_file")]
    pub file: String,

    /// Rows whose `question` cell contains this text are counted.
    #[serde(default = "default_question_marker")]
    pub question_marker: String,

    #[serde(default = "default_overview_title")]
    pub title: String,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            file: default_overview_file(),
            question_marker: default_question_marker(),
            title: default_overview_title(),
        }
    }
}

fn default_overview_file() -> String {
    "PART1_base_dataQ2-5.csv".to_string()
}

fn default_question_marker() -> String {
    "Q2:".to_string()
}

fn default_overview_title() -> String {
    "Distribution of Responses on Whether Entities Conducted Youth Employment Work in the Reference Period"
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Headers that are never option columns.
    #[serde(default = "default_excluded_columns")]
    pub excluded_columns: Vec<String>,

    /// Row key of the matrix: `unit` (Department/Region) or `respondent`.
    #[serde(default)]
    pub entity: EntityField,

    #[serde(default = "default_coverage_groups")]
    pub groups: Vec<CoverageGroupConfig>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            excluded_columns: default_excluded_columns(),
            entity: EntityField::default(),
            groups: default_coverage_groups(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageGroupConfig {
    pub name: String,
    pub file: String,
    pub title: String,
    /// Explicit option columns; derived from the header when unset.
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Identity columns the loader recognizes plus the free-text answers.
fn default_excluded_columns() -> Vec<String> {
    ENTITY_COLUMNS
        .into_iter()
        .chain([UNIT_COLUMN])
        .chain(PERIOD_COLUMNS)
        .chain(["Other", "Other (elaborated answ)"])
        .map(String::from)
        .collect()
}

fn default_coverage_groups() -> Vec<CoverageGroupConfig> {
    let group = |name: &str, title: &str| CoverageGroupConfig {
        name: name.to_string(),
        file: format!("PART2_base_data{}.csv", name),
        title: title.to_string(),
        options: None,
    };
    vec![
        group("Q3", "Entities' Work Across The Clusters Of The Implementation Framework"),
        group("Q4", "Entities' Work Across The Pillars Of The Call For Action On Youth Employment"),
        group("Q5", "Entities' Work Across Target Youth Groups, When Applicable"),
    ]
}

/// One output theme (Q6, Q7, Q10, Q11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub question: String,
    pub file: String,
    pub title: String,
    /// Column naming the delivered output; rows without it are not counted
    /// as valid works.
    #[serde(default)]
    pub project_column: Option<String>,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub field: String,
    #[serde(default)]
    pub kind: ChartKind,
    pub title: String,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub custom_order: Option<Vec<String>>,
    /// Keep first-seen order instead of sorting by count.
    #[serde(default)]
    pub preserve_order: bool,
    /// Yes/no fields skip the `min_fraction` filter.
    #[serde(default)]
    pub binary: bool,
}

impl ChartConfig {
    fn new(field: &str, kind: ChartKind, title: &str) -> Self {
        Self {
            field: field.to_string(),
            kind,
            title: title.to_string(),
            top_n: None,
            custom_order: None,
            preserve_order: false,
            binary: false,
        }
    }

    fn top(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    fn yes_no(mut self) -> Self {
        self.binary = true;
        self
    }

    fn ordered(mut self, order: &[&str]) -> Self {
        self.custom_order = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }
}

const FUNDING_FIELD: &str = "Funding source (Options: regular budget or extrabudgetary)";
const FOCUS_FIELD: &str = "Focus (Options: Youth only or Youth is one of the target groups)";

fn default_themes() -> Vec<ThemeConfig> {
    use ChartKind::{Bar, Pie};
    let theme = |q: &str, title: &str, project: &str, charts: Vec<ChartConfig>| ThemeConfig {
        question: q.to_string(),
        file: format!("PART3_base_data{}.csv", q),
        title: title.to_string(),
        project_column: Some(project.to_string()),
        charts,
    };
    vec![
        theme(
            "Q6",
            "Knowledge Development & Dissemination",
            "Initiative/output's name??",
            vec![
                ChartConfig::new(FUNDING_FIELD, Pie, "Funding Source Of Knowledge Development And Dissemination Outputs"),
                ChartConfig::new(FOCUS_FIELD, Pie, "Target Group Of Knowledge Development And Dissemination Outputs"),
                ChartConfig::new(
                    "Type of publication (Options: Evaluation, or Guidance/tools, or Technical Report, or Working paper, or Data/Database)",
                    Bar,
                    "Types Of Knowledge Development And Dissemination Outputs Delivered",
                ),
            ],
        ),
        theme(
            "Q7",
            "Technical Assistance",
            "Initiative/programme/project's name??",
            vec![
                ChartConfig::new(FUNDING_FIELD, Pie, "Funding Source Of Technical Assistance Outputs"),
                ChartConfig::new(FOCUS_FIELD, Pie, "Target Group Of Technical Assistance Outputs"),
                ChartConfig::new("Country or Region", Bar, "Technical Assistance Outputs Across Regions").top(10),
            ],
        ),
        theme(
            "Q10",
            "Capacity Development",
            "Course/programme/project's name??",
            vec![
                ChartConfig::new("In person or online or both", Pie, "Delivery Mode Of Capacity Development Outputs"),
                ChartConfig::new(FUNDING_FIELD, Pie, "Funding Source For Capacity Development Outputs"),
                ChartConfig::new("With certification (Yes or No)", Pie, "Capacity Development Outputs & Certification")
                    .yes_no(),
                ChartConfig::new(FOCUS_FIELD, Pie, "Target Group Of Capacity Development Outputs"),
            ],
        ),
        theme(
            "Q11",
            "Advocacy & Partnerships",
            "Output/initiative/programme/project's name??",
            vec![
                ChartConfig::new(
                    "Type of partnership (Options: UN interagency initiative; or multistakeholder initiative; or bilateral partnership; or event; or campaign; or challenge)",
                    Bar,
                    "Types Of Advocacy Or Partnership Outputs",
                )
                .ordered(&[
                    "multistakeholder initiative",
                    "bilateral partnership",
                    "UN interagency initiative",
                    "campaign",
                    "event",
                    "challenge",
                ]),
                ChartConfig::new(FOCUS_FIELD, Pie, "Target Group For Advocacy & Partnerships Outputs"),
                ChartConfig::new("Specify name of the Region/country", Bar, "Advocacy & Partnership Outputs Across Regions")
                    .top(10),
                ChartConfig::new(FUNDING_FIELD, Pie, "Funding Source For Advocacy & Partnerships Related Outputs"),
                ChartConfig::new(
                    "Geographical focus (Global, Regional or National/local)",
                    Pie,
                    "Geographical Focus Of Advocacy And Partnerships Outputs",
                ),
            ],
        ),
    ]
}

fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 19] = [
        ("Extrabudgetary", &["extra budgetary", "extra-budgetary"]),
        ("Regular Budget", &["regularbudget", "regular-budget"]),
        ("Technical Report", &[]),
        ("Working Paper", &[]),
        ("Guidance/Tools", &["guidance / tools"]),
        ("Evaluation", &[]),
        ("Data/Database", &["data / database"]),
        ("Best Practices/Lessons Learned", &[]),
        ("Youth Only", &[]),
        ("Youth Is One Of The Target Groups", &[]),
        ("Global", &[]),
        ("Regional", &[]),
        ("National/Local", &["national / local"]),
        ("Yes", &[]),
        ("No", &[]),
        ("In Person", &["in-person"]),
        ("Online", &["on-line"]),
        ("Both", &[]),
        ("Multistakeholder Initiative", &["multi-stakeholder initiative"]),
    ];
    entries
        .into_iter()
        .map(|(canonical, variants)| {
            (canonical.to_string(), variants.iter().map(|v| v.to_string()).collect())
        })
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `Ok(None)` when `.survey_report.toml` does not exist.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// CLI arguments take precedence over file settings when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.data_dir {
            self.data.dir = dir.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.clone();
        }
        if let Some(size) = args.page_size {
            self.output.page_size = size;
        }
        if let Some(ref period) = args.period {
            self.filters.period = Some(period.clone());
        }
        if let Some(ref unit) = args.unit {
            self.filters.unit = Some(unit.clone());
        }
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data.dir.join(file)
    }

    pub fn synonym_table(&self) -> SynonymTable {
        SynonymTable::from_groups(&self.synonyms)
    }

    /// Aggregation settings shared by every chart, before per-chart tweaks.
    pub fn base_aggregate_options(&self) -> AggregateOptions {
        let min_fraction = Some(self.distribution.min_fraction).filter(|f| *f > 0.0);
        AggregateOptions::default()
            .with_synonyms(self.synonym_table())
            .with_delimiter(Some(self.distribution.delimiter.as_str()))
            .with_min_fraction(min_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = Config::default_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.themes.len(), 4);
        assert_eq!(parsed.coverage.groups.len(), 3);
        assert_eq!(parsed.data.encodings, Encoding::DEFAULT_ORDER.to_vec());
        assert_eq!(parsed.synonyms, default_synonyms());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [data]
            dir = "exports"
            encodings = ["utf-8", "cp1252"]

            [distribution]
            min_fraction = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(parsed.data.dir, PathBuf::from("exports"));
        assert_eq!(parsed.data.encodings, vec![Encoding::Utf8, Encoding::Cp1252]);
        assert_eq!(parsed.distribution.delimiter, ";");
        assert_eq!(parsed.output.page_size, 50);
        assert_eq!(parsed.themes[3].question, "Q11");
        assert_eq!(parsed.filters.preferred_period.as_deref(), Some("2024"));
    }

    #[test]
    fn cli_overrides_paths_and_page_size() {
        let mut config = Config::default();
        let args = crate::cli::Args {
            data_dir: Some(PathBuf::from("in")),
            page_size: Some(100),
            unit: Some("Asia".to_string()),
            ..Default::default()
        };
        config.merge_with_args(&args);
        assert_eq!(config.data_path("a.csv"), PathBuf::from("in").join("a.csv"));
        assert_eq!(config.output.page_size, 100);
        assert_eq!(config.output.dir, PathBuf::from("reports"));
        assert_eq!(config.filters.unit.as_deref(), Some("Asia"));
        assert_eq!(config.filters.period, None);
        assert_eq!(config.filters.preferred_period.as_deref(), Some("2024"));
    }

    #[test]
    fn synonym_table_covers_canonical_and_variants() {
        let table = Config::default().synonym_table();
        assert_eq!(table.canonicalize("EXTRA-BUDGETARY"), "Extrabudgetary");
        assert_eq!(table.canonicalize("regular budget"), "Regular Budget");
        assert_eq!(table.canonicalize("YOUTH IS ONE OF THE TARGET GROUPS"), "Youth Is One Of The Target Groups");
        assert_eq!(table.canonicalize("data/database"), "Data/Database");
    }

    #[test]
    fn excluded_columns_cover_every_identity_header() {
        let config = Config::default();
        let headers: Vec<String> = ["User_ID", "User ID", "UserId", "Department/Region", "YEAR", "Policy", "Other"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let options = crate::coverage::option_columns(&headers, &config.coverage.excluded_columns);
        assert_eq!(options, vec!["Policy"]);
    }

    #[test]
    fn zero_min_fraction_disables_filtering() {
        let opts = Config::default().base_aggregate_options();
        assert_eq!(opts.min_fraction, None);
        assert_eq!(opts.delimiter.as_deref(), Some(";"));
    }
}
