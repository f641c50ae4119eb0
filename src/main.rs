// Entry point and high-level CLI flow.
//
// - Option [1] loads every configured CSV and prints load diagnostics.
// - Options [2] and [3] pick the period and organizational unit.
// - Option [4] generates the overview and theme reports plus a JSON summary.
// - Option [5] pages through the output detail lists.
// With `--batch` the same load/generate steps run once without the menu.
mod chart;
mod cli;
mod config;
mod coverage;
mod distribution;
mod error;
mod filter;
mod loader;
mod output;
mod paging;
mod reports;
mod types;
mod util;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use filter::{FilterContext, Selection};
use loader::LoadReport;
use once_cell::sync::Lazy;
use paging::PageState;
use reports::{OverviewReport, SurveyData, ThemeReport};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

// Session state: data is loaded once, filters and paging change between
// report runs.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    config: Config,
    data: Option<SurveyData>,
    load_report: LoadReport,
    filter: FilterContext,
    page: PageState,
}

/// A panic while holding the lock leaves the state usable; keep going with it.
fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// `None` once the input is closed or unreadable.
fn read_trimmed<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    read_trimmed(&mut io::stdin().lock())
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> Option<String> {
    read_line("Enter choice: ")
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N` or closed the input.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = read_line("Back to menu (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }
    let content = Config::default_toml()?;
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Handle option [1]: load every configured file into `APP_STATE` and pick
/// the start-up filter.
fn handle_load() {
    let config = state().config.clone();
    println!("Loading survey files from {}...", config.data.dir.display());
    let (data, load_report) = SurveyData::load(&config);

    println!(
        "Processing dataset... ({} rows loaded from {} files)",
        util::format_int(load_report.total_rows),
        util::format_int(load_report.files_loaded)
    );
    if load_report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            util::format_int(load_report.parse_errors)
        );
    }
    if load_report.files_missing + load_report.files_unreadable > 0 {
        println!(
            "Note: {} files missing, {} unreadable; their sections will be empty.",
            load_report.files_missing, load_report.files_unreadable
        );
    }

    let filter = reports::initial_filter(&config, &data);
    println!("Period: {} | Unit: {}\n", filter.period, filter.organizational_unit);

    let mut s = state();
    s.data = Some(data);
    s.load_report = load_report;
    s.filter = filter;
    s.page.jump_to(1, 0);
}

/// Print `options` numbered from 1 and return the picked one.
fn pick_option(title: &str, options: &[String], current: &Selection) -> Option<String> {
    println!("{} (current: {})", title, current);
    for (i, o) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, o);
    }
    let choice = read_choice()?;
    match choice.parse::<usize>().ok().and_then(|n| options.get(n.checked_sub(1)?)) {
        Some(o) => Some(o.clone()),
        None => {
            println!("Invalid choice, selection unchanged.\n");
            None
        }
    }
}

/// Handle options [2] and [3].
fn handle_select(period: bool) {
    let (options, current) = {
        let s = state();
        let Some(data) = s.data.as_ref() else {
            println!("Error: No data loaded. Please load the files first (option 1).\n");
            return;
        };
        if period {
            (filter::period_options(data.tables()), s.filter.period.clone())
        } else {
            (filter::unit_options(data.tables()), s.filter.organizational_unit.clone())
        }
    };
    let title = if period { "Select period" } else { "Select organizational unit" };
    let Some(picked) = pick_option(title, &options, &current) else {
        return;
    };

    let mut s = state();
    let selection = Selection::parse(&picked);
    if period {
        s.filter.period = selection;
    } else {
        s.filter.organizational_unit = selection;
    }
    // A new filter changes the detail lists; start browsing from the top.
    s.page.jump_to(1, 0);
    println!("Period: {} | Unit: {}\n", s.filter.period, s.filter.organizational_unit);
}

fn print_overview(overview: &OverviewReport, preview_rows: usize) {
    println!("Overview: {}", overview.responses.title);
    output::preview_table_rows(&output::distribution_rows(&overview.responses.data), preview_rows);
    for group in &overview.coverage_groups {
        println!("{}: {}", group.group, group.title);
    }
    println!("{}\n", output::coverage_markdown(&overview.coverage));
}

fn print_theme(theme: &ThemeReport, preview_rows: usize) {
    println!("{} {}\n", theme.question, theme.title);
    output::preview_table_rows(std::slice::from_ref(&theme.stats), 1);
    for panel in &theme.charts {
        println!("{} ({:?})", panel.title, panel.kind);
        if !panel.has_data() {
            println!("(no rows)\n");
            continue;
        }
        if let Some(top) = panel.data.summary() {
            println!(
                "{} responses, {} options, most common: {} ({}, {})",
                util::format_int(top.total_responses),
                top.total_options,
                top.most_common_option,
                top.most_common_count,
                util::format_rate(top.most_common_share)
            );
        }
        output::preview_table_rows(&output::distribution_rows(&panel.data), preview_rows);
    }
}

/// Build every report for the current filter and write the output files.
fn generate_reports(
    config: &Config,
    data: &SurveyData,
    filter: &FilterContext,
    load_report: &LoadReport,
) -> Result<(OverviewReport, Vec<ThemeReport>)> {
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let overview = reports::generate_overview(data, config, filter);
    output::write_coverage_csv(&dir.join("overview_coverage.csv"), &overview.coverage)?;
    output::write_coverage_html(
        &dir.join("overview_coverage.html"),
        &overview.coverage,
        &overview.coverage_groups,
    )?;
    output::write_coverage_by_option_csv(
        &dir.join("overview_coverage_by_option.csv"),
        &overview.coverage.transposed(),
    )?;

    let themes = reports::generate_themes(data, config, filter);
    for theme in &themes {
        let file = dir.join(format!("{}_details.csv", theme.question));
        output::write_csv(&file, &theme.details)?;
        debug!("{}: {} detail rows", file.display(), theme.details.len());
    }

    let summary = reports::generate_summary(Utc::now(), filter, load_report, &overview, &themes);
    output::write_json(&dir.join("summary.json"), &summary)?;
    info!("reports written to {}", dir.display());
    Ok((overview, themes))
}

/// Handle option [4]: generate all reports and print previews.
fn handle_generate_reports() {
    let (config, data, filter, load_report) = {
        let s = state();
        (s.config.clone(), s.data.clone(), s.filter.clone(), s.load_report.clone())
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };

    println!("Generating reports for period {} and unit {}...", filter.period, filter.organizational_unit);
    match generate_reports(&config, &data, &filter, &load_report) {
        Ok((overview, themes)) => {
            let preview_rows = config.output.preview_rows;
            print_overview(&overview, preview_rows);
            for theme in &themes {
                print_theme(theme, preview_rows);
            }
            println!("(Full tables exported to {})\n", config.output.dir.display());
        }
        Err(e) => {
            error!("Report generation failed: {:#}", e);
            eprintln!("Write error: {:#}\n", e);
        }
    }
}

/// Handle option [5]: page through one theme's detail list.
fn handle_browse_details() {
    let (config, data, filter) = {
        let s = state();
        (s.config.clone(), s.data.clone(), s.filter.clone())
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };
    let questions: Vec<String> = config.themes.iter().map(|t| t.question.clone()).collect();
    let Some(question) = pick_option("Select question", &questions, &Selection::All) else {
        return;
    };
    let Some(theme) = config.themes.iter().find(|t| t.question == question) else {
        return;
    };
    let report = reports::generate_theme(data.theme_table(&question), theme, &config, &filter);
    let rows = &report.details;

    loop {
        let page = state().page;
        println!("\n{} {}", report.question, report.title);
        output::preview_table_rows(page.slice(rows), page.page_size);
        println!("{}", page.describe(rows.len()));
        println!("[n] Next  [p] Previous  [g N] Go to page  [s N] Page size {:?}  [b] Back", paging::PAGE_SIZES);

        let Some(input) = read_choice() else {
            break;
        };
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next().and_then(|a| a.parse::<usize>().ok());
        let mut s = state();
        match (cmd.as_str(), arg) {
            ("n", _) => s.page.next(rows.len()),
            ("p", _) => s.page.prev(rows.len()),
            ("g", Some(n)) => s.page.jump_to(n, rows.len()),
            ("s", Some(n)) => s.page.set_page_size(n),
            ("b", _) => break,
            _ => println!("Invalid choice."),
        }
    }
    println!();
}

fn run_batch() -> Result<()> {
    handle_load();
    let (config, data, filter, load_report) = {
        let s = state();
        (s.config.clone(), s.data.clone(), s.filter.clone(), s.load_report.clone())
    };
    let data = data.unwrap_or_default();
    if data.is_empty() {
        warn!("no survey files could be loaded from {}", config.data.dir.display());
    }
    let (overview, themes) = generate_reports(&config, &data, &filter, &load_report)?;
    print_overview(&overview, config.output.preview_rows);
    for theme in &themes {
        output::preview_table_rows(std::slice::from_ref(&theme.stats), 1);
    }
    println!("Outputs saved to {}", config.output.dir.display());
    Ok(())
}

fn run_menu() {
    loop {
        println!("Survey Report:");
        println!("[1] Load the data files");
        println!("[2] Select period");
        println!("[3] Select organizational unit");
        println!("[4] Generate reports");
        println!("[5] Browse output details");
        println!("[0] Exit\n");
        let Some(choice) = read_choice() else {
            println!("Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => handle_load(),
            "2" => handle_select(true),
            "3" => handle_select(false),
            "4" => {
                println!();
                handle_generate_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "5" => handle_browse_details(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-5.\n"),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse_args();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    if args.init_config {
        return handle_init_config();
    }
    init_logging(&args);
    debug!("Arguments: {:?}", args);

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    let synonyms = config.synonym_table();
    if synonyms.is_empty() {
        warn!("no synonyms configured; answers are only title-cased");
    } else {
        debug!("{} synonym spellings configured", synonyms.len());
    }
    {
        let mut s = state();
        s.page = PageState::with_page_size(config.output.page_size);
        s.config = config;
    }

    if args.batch {
        run_batch()
    } else {
        run_menu();
        Ok(())
    }
}
