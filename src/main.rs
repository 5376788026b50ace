mod catalog;
mod config;
mod error;
mod models;
mod rates;
mod recommend;
mod scenarios;
mod service;
mod usage;
mod validation;

use catalog::CatalogSnapshot;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use crate::config::{ensure_initialized, load_config, AppConfig};
use error::AppError;
use models::{CurrentPlanData, UserPreferences};
use service::{AdviceReport, AdviceRequest, Advisor, PlanCostReport, UsageAnalysis, UsageSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "energy-advisor")]
#[command(about = "Compare residential energy plans against your interval usage history")]
struct Cli {
    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    /// Summarize a usage feed by month
    Usage {
        feed: PathBuf,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Price a single catalog plan against a usage feed
    Cost {
        feed: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        plan: String,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Shortlist plans and project switching scenarios
    Recommend {
        feed: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        suppliers: Option<PathBuf>,
        /// Current rate in cents/kWh
        #[arg(long)]
        current_rate: f64,
        #[arg(long, default_value = "Current supplier")]
        current_supplier: String,
        /// MM/YYYY
        #[arg(long)]
        contract_end: Option<String>,
        #[arg(long)]
        early_termination_fee: Option<f64>,
        #[arg(long)]
        cost_priority: Option<f64>,
        #[arg(long)]
        renewable_priority: Option<f64>,
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

fn parse_format(input: &str, allow_csv: bool) -> Result<OutputFormat, AppError> {
    match input.to_ascii_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        "csv" if allow_csv => Ok(OutputFormat::Csv),
        _ if allow_csv => Err(AppError::Config(
            "Unsupported format. Use text, json, or csv".into(),
        )),
        _ => Err(AppError::Config(
            "Unsupported format. Use text or json".into(),
        )),
    }
}

/// A lone priority implies its complement; neither falls back to config.
fn resolve_preferences(
    cost: Option<f64>,
    renewable: Option<f64>,
    fallback: UserPreferences,
) -> UserPreferences {
    match (cost, renewable) {
        (Some(cost_priority), Some(renewable_priority)) => UserPreferences {
            cost_priority,
            renewable_priority,
        },
        (Some(cost_priority), None) => UserPreferences {
            cost_priority,
            renewable_priority: 100.0 - cost_priority,
        },
        (None, Some(renewable_priority)) => UserPreferences {
            cost_priority: 100.0 - renewable_priority,
            renewable_priority,
        },
        (None, None) => fallback,
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze_feed(advisor: &Advisor, feed: &Path) -> Result<UsageAnalysis, AppError> {
    let xml = fs::read_to_string(feed)?;
    advisor.analyze_usage(&xml)
}

fn load_catalog(
    cfg: &AppConfig,
    catalog: Option<PathBuf>,
    suppliers: Option<PathBuf>,
) -> Result<CatalogSnapshot, AppError> {
    let plans_path = catalog.or_else(|| cfg.catalog_path.clone()).ok_or_else(|| {
        AppError::Config(
            "No plan catalog given. Pass --catalog or set catalog_path in config.toml".into(),
        )
    })?;
    let suppliers_path = suppliers.or_else(|| cfg.suppliers_path.clone());
    CatalogSnapshot::load(&plans_path, suppliers_path.as_deref())
}

fn print_usage_text(summary: &UsageSummary) {
    println!("Month      kWh        Days  Avg/day");
    for month in &summary.usage.monthly_totals {
        println!(
            "{:<10} {:>10.1} {:>5} {:>8.2}",
            month.month_key, month.total_kwh, month.days_with_data, month.average_daily
        );
    }
    println!(
        "Total {:.1} kWh from {} to {}",
        summary.total_kwh,
        summary.usage.date_range.start.format("%Y-%m-%d"),
        summary.usage.date_range.end.format("%Y-%m-%d"),
    );
    println!(
        "Data quality: {} (score {}/100, {} confidence)",
        summary.usage.data_quality.as_label(),
        summary.quality_score,
        summary.confidence.as_label()
    );
    for warning in &summary.warnings {
        println!("! {}", warning.message);
        println!("  -> {}", warning.action);
    }
}

fn print_cost_text(report: &PlanCostReport) {
    println!("{} ({}, {})", report.plan_name, report.plan_id, report.rate_type);
    println!("Month      kWh        Energy     Fees       Total");
    for month in &report.months {
        println!(
            "{:<10} {:>10.1} {:>10.2} {:>10.2} {:>10.2}",
            month.month_key,
            month.kwh,
            month.energy_cost,
            month.fees,
            month.total()
        );
    }
    println!("Annual cost over this history: ${:.2}", report.annual_cost);
}

fn print_advice_text(report: &AdviceReport) {
    if report.catalog_stale {
        println!(
            "Note: plan catalog was fetched {} and may be out of date.",
            report.catalog_fetched_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    println!(
        "Usage data quality score {}/100 ({} confidence)",
        report.quality_score,
        report.confidence.as_label()
    );
    for warning in &report.warnings {
        println!("! {}", warning.message);
    }

    for (rank, (rec, view)) in report
        .recommendations
        .iter()
        .zip(&report.scenarios)
        .enumerate()
    {
        let plan = &rec.plan;
        println!();
        println!(
            "{}. {} from {} ({:.2}c/kWh, {:.0}% renewable)",
            rank + 1,
            plan.plan.name,
            plan.plan.supplier_name,
            plan.plan.rate,
            plan.plan.renewable_percentage
        );
        println!(
            "   Annual cost ${:.2}, savings ${:.2}, score {:.3}",
            plan.annual_cost, plan.savings, plan.score
        );
        println!("   {}", rec.explanation);
        for scenario in &view.scenarios {
            let marker = if scenario.kind == view.recommended_scenario {
                "*"
            } else {
                " "
            };
            println!(
                "   {marker} {:<16} ${:>9.2}  net {:>9.2}  {}",
                scenario.kind.as_label(),
                scenario.annual_cost,
                scenario.net_savings,
                scenario.description
            );
        }
    }
}

fn print_advice_csv(report: &AdviceReport) {
    println!(
        "rank,plan_id,plan_name,supplier,rate,renewable_percentage,annual_cost,savings,score,confidence,recommended_scenario"
    );
    for (rank, (rec, view)) in report
        .recommendations
        .iter()
        .zip(&report.scenarios)
        .enumerate()
    {
        let plan = &rec.plan;
        println!(
            "{},{},{},{},{:.4},{:.1},{:.2},{:.2},{:.4},{},{}",
            rank + 1,
            csv_field(&plan.plan.id),
            csv_field(&plan.plan.name),
            csv_field(&plan.plan.supplier_name),
            plan.plan.rate,
            plan.plan.renewable_percentage,
            plan.annual_cost,
            plan.savings,
            plan.score,
            rec.confidence.as_label(),
            view.recommended_scenario.as_label(),
        );
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized energy-advisor config and data directories.");
        }
        Commands::Usage { feed, format } => {
            let format = parse_format(&format, false)?;
            ensure_initialized()?;
            let cfg = load_config()?;
            let advisor = Advisor::new(Duration::hours(cfg.catalog_max_age_hours));
            let summary = analyze_feed(&advisor, &feed)?.summary();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => print_usage_text(&summary),
            }
        }
        Commands::Cost {
            feed,
            catalog,
            plan,
            format,
        } => {
            let format = parse_format(&format, false)?;
            ensure_initialized()?;
            let cfg = load_config()?;
            let advisor = Advisor::new(Duration::hours(cfg.catalog_max_age_hours));
            let analysis = analyze_feed(&advisor, &feed)?;
            let snapshot = load_catalog(&cfg, catalog, None)?;
            let report = advisor.plan_cost(&analysis, &snapshot, &plan)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => print_cost_text(&report),
            }
        }
        Commands::Recommend {
            feed,
            catalog,
            suppliers,
            current_rate,
            current_supplier,
            contract_end,
            early_termination_fee,
            cost_priority,
            renewable_priority,
            format,
        } => {
            let format = parse_format(&format, true)?;
            ensure_initialized()?;
            let cfg = load_config()?;
            let advisor = Advisor::new(Duration::hours(cfg.catalog_max_age_hours));
            let analysis = analyze_feed(&advisor, &feed)?;
            let snapshot = load_catalog(&cfg, catalog, suppliers)?;

            let request = AdviceRequest {
                current: CurrentPlanData {
                    supplier: current_supplier,
                    rate: current_rate,
                    contract_end_date: contract_end,
                    contract_length: None,
                    early_termination_fee: Some(
                        early_termination_fee.unwrap_or(cfg.early_termination_fee),
                    ),
                },
                preferences: resolve_preferences(
                    cost_priority,
                    renewable_priority,
                    cfg.preferences.into(),
                ),
                now: Utc::now(),
            };
            let report = advisor.advise(&analysis, &snapshot, &request)?;
            match format {
                OutputFormat::Text => print_advice_text(&report),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Csv => print_advice_csv(&report),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
