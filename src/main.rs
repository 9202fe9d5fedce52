use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

mod charts;
mod clean;
mod config;
mod email;
mod ingest;
mod kpi;
mod models;

use crate::charts::{ChartRenderer, ChartSet};
use crate::config::AppConfig;
use crate::email::ReportMailer;
use crate::ingest::SheetSource;
use crate::models::{
    ConversionRates, KpiTotals, SummaryStats, TeamComparison, TeamMemberTotals,
};

#[derive(Parser)]
#[command(name = "sales-analytics")]
#[command(
    about = "Sales activity reporting - KPI charts and emails for lead generators",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate charts and a console summary for one lead generator
    Report {
        /// Name as it appears in the form submissions
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "config.yaml")]
        config: PathBuf,
        /// Days to include, overriding the config file (0 = all data)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Generate reports and email one to every roster member
    SendReports {
        #[arg(long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long, default_value = "team_roster.yaml")]
        roster: PathBuf,
        /// Days to include, overriding the config file (0 = all data)
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report { name, config, days } => run_report(&name, &config, days).await,
        Commands::SendReports {
            config,
            roster,
            days,
        } => run_send_reports(&config, &roster, days).await,
    }
}

async fn run_report(
    name: &str,
    config_path: &Path,
    days_override: Option<i64>,
) -> anyhow::Result<()> {
    println!("Sales Activity Report");
    println!();

    let config = config::load(config_path)?;
    let days = days_override.unwrap_or(config.data.days_to_include);

    let data = prepare_data(&config, days).await?;
    let renderer = ChartRenderer::new(&config.charts);

    println!("Generating report for '{name}'...");
    let report = build_person_report(name, &data, &renderer)?;
    print_summary(&report);

    Ok(())
}

async fn run_send_reports(
    config_path: &Path,
    roster_path: &Path,
    days_override: Option<i64>,
) -> anyhow::Result<()> {
    println!("Sales Activity Reports - roster email run");
    println!();

    let config = config::load(config_path)?;
    if !config.email.enabled {
        bail!(
            "email sending is disabled; set email.enabled: true in {}",
            config_path.display()
        );
    }

    let members = config::load_roster(roster_path)?;
    println!("Loaded {} roster members", members.len());

    let mailer = ReportMailer::new(config.email.clone())?;
    match mailer.test_connection().await {
        Ok(true) => println!("SMTP connection verified"),
        Ok(false) => bail!("SMTP connection test failed; check the email section of your config"),
        Err(err) => bail!("SMTP connection test failed: {err}"),
    }

    let days = days_override.unwrap_or(config.data.days_to_include);
    let data = prepare_data(&config, days).await?;
    let renderer = ChartRenderer::new(&config.charts);

    let mut sent = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    for member in &members {
        println!("Processing {} <{}>", member.name, member.email);

        let report = match build_person_report(&member.name, &data, &renderer) {
            Ok(report) => report,
            Err(err) => {
                println!("  skipping {}: {err}", member.name);
                skipped += 1;
                continue;
            }
        };

        let date_range = report.stats.date_range();
        match mailer
            .send_report(
                &member.email,
                &member.name,
                &report.charts,
                &report.totals,
                &report.rates,
                &date_range,
            )
            .await
        {
            Ok(()) => {
                println!("  sent to {}", member.email);
                sent += 1;
            }
            Err(err) => {
                println!("  failed to send to {}: {err}", member.email);
                failed += 1;
            }
        }
    }

    println!();
    println!("Sent: {sent}");
    if failed > 0 {
        println!("Failed: {failed}");
    }
    if skipped > 0 {
        println!("Skipped (no data): {skipped}");
    }

    Ok(())
}

struct PreparedData {
    rows: Vec<models::SubmissionRow>,
    team: Vec<TeamMemberTotals>,
}

/// Shared front half of both commands: fetch, clean, window, quality-check,
/// and aggregate the team once.
async fn prepare_data(config: &AppConfig, days: i64) -> anyhow::Result<PreparedData> {
    let source = SheetSource::from_config(&config.sheet)?;
    println!("Fetching submissions from {}...", source.describe());
    let sheet = ingest::fetch_sheet(&source).await?;
    println!("Fetched {} rows", sheet.rows.len());

    let outcome = clean::clean_rows(&sheet, &config.data.columns)?;
    if outcome.dropped > 0 {
        println!(
            "Dropped {} rows with unreadable timestamps",
            outcome.dropped
        );
    }

    let rows = clean::filter_by_window(&outcome.rows, days);
    if days > 0 {
        println!("Window: last {days} days ({} rows)", rows.len());
    } else {
        println!("Window: all data ({} rows)", rows.len());
    }

    let quality = clean::quality_report(&rows);
    if !quality.warnings.is_empty() {
        println!("Data quality warnings ({} rows checked):", quality.total_rows);
        for warning in &quality.warnings {
            println!("  - {warning}");
        }
    }

    let team = clean::team_totals(&rows);
    Ok(PreparedData { rows, team })
}

struct PersonReport {
    totals: KpiTotals,
    rates: ConversionRates,
    comparison: TeamComparison,
    stats: SummaryStats,
    charts: ChartSet,
}

fn build_person_report(
    name: &str,
    data: &PreparedData,
    renderer: &ChartRenderer,
) -> anyhow::Result<PersonReport> {
    let person_rows = clean::filter_by_person(&data.rows, name)?;

    let totals = kpi::totals(&person_rows);
    let rates = kpi::conversion_rates(&totals);
    let daily = kpi::daily_trends(&person_rows);
    let comparison = kpi::team_comparison(&totals, &data.team);
    let stats =
        kpi::summary_stats(&person_rows).context("no submissions in the selected window")?;

    let date_range = stats.date_range();
    let charts = renderer.render_all(name, &totals, &rates, &daily, &comparison, &date_range)?;

    Ok(PersonReport {
        totals,
        rates,
        comparison,
        stats,
        charts,
    })
}

fn print_summary(report: &PersonReport) {
    println!();
    println!("Summary:");
    println!("  Entries: {}", report.stats.total_entries);
    println!("  Date range: {}", report.stats.date_range());
    println!("  Days active: {}", report.stats.days_active);
    println!();
    println!("Totals:");
    println!("  Doors Knocked: {}", report.totals.doors_knocked);
    println!("  Homeowners Talked: {}", report.totals.homeowners_talked);
    println!("  Qualified Leads: {}", report.totals.qualified_leads);
    println!("  Appointments Set: {}", report.totals.appointments_set);
    println!();
    println!("Conversion Rates:");
    println!("  Talk Rate: {:.1}%", report.rates.talk_rate);
    println!("  Qualification Rate: {:.1}%", report.rates.qualification_rate);
    println!("  Appointment Rate: {:.1}%", report.rates.appointment_rate);
    println!("  Overall Conversion: {:.1}%", report.rates.overall_conversion);
    println!();
    println!("vs Team Average:");
    for (label, metric) in report.comparison.metrics() {
        println!("  {label}: {:+.1}%", metric.percent_difference);
    }
    println!();
    println!("Charts saved to:");
    for (chart_name, chart_path) in report.charts.iter() {
        println!("  - {chart_name}: {}", chart_path.display());
    }
}
