//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use crate::paging::PAGE_SIZES;

/// Survey report generator
///
/// Loads the survey CSV exports, filters them by period and organizational
/// unit, and writes coverage tables, chart data and detail lists.
///
/// Examples:
///   survey_report
///   survey_report --batch --period 2024 --unit "Regional Office for Africa"
///   survey_report --data-dir ./orignaldata --output-dir ./out --batch
///   survey_report --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the survey CSV files
    #[arg(short, long, value_name = "DIR", env = "SURVEY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory the report files are written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .survey_report.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Period to report on ("All" for every period)
    #[arg(short, long, value_name = "YEAR")]
    pub period: Option<String>,

    /// Organizational unit to report on ("All" for every unit)
    #[arg(short, long, value_name = "UNIT")]
    pub unit: Option<String>,

    /// Detail list page size (10, 25, 50, 100 or 200)
    #[arg(long, value_name = "ROWS")]
    pub page_size: Option<usize>,

    /// Load, generate every report once and exit (no menu)
    #[arg(long)]
    pub batch: bool,

    /// Enable verbose logging output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .survey_report.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(size) = self.page_size {
            if !PAGE_SIZES.contains(&size) {
                return Err(format!(
                    "--page-size must be one of {:?}, got {}",
                    PAGE_SIZES, size
                ));
            }
        }
        Ok(())
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
