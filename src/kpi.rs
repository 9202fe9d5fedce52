//! KPI computation: totals, conversion rates, daily trends, team comparison,
//! and summary statistics over a person's cleaned submissions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{
    ConversionRates, DailyTotals, KpiTotals, MetricComparison, SubmissionRow, SummaryStats,
    TeamComparison, TeamMemberTotals,
};

pub fn totals(rows: &[SubmissionRow]) -> KpiTotals {
    let mut totals = KpiTotals::default();
    for row in rows {
        totals.doors_knocked += row.doors_knocked;
        totals.homeowners_talked += row.homeowners_talked;
        totals.qualified_leads += row.qualified_leads;
        totals.appointments_set += row.appointments_set;
    }
    totals
}

/// Funnel-stage conversion rates plus the overall door-to-appointment rate.
/// Every rate is 0.0 when its denominator is 0.
pub fn conversion_rates(totals: &KpiTotals) -> ConversionRates {
    ConversionRates {
        talk_rate: percentage(totals.homeowners_talked, totals.doors_knocked),
        qualification_rate: percentage(totals.qualified_leads, totals.homeowners_talked),
        appointment_rate: percentage(totals.appointments_set, totals.qualified_leads),
        overall_conversion: percentage(totals.appointments_set, totals.doors_knocked),
    }
}

fn percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64 * 100.0
    } else {
        0.0
    }
}

/// Per-date sums, ascending by date.
pub fn daily_trends(rows: &[SubmissionRow]) -> Vec<DailyTotals> {
    let mut by_date: BTreeMap<NaiveDate, KpiTotals> = BTreeMap::new();
    for row in rows {
        let entry = by_date.entry(row.submitted_at.date()).or_default();
        entry.doors_knocked += row.doors_knocked;
        entry.homeowners_talked += row.homeowners_talked;
        entry.qualified_leads += row.qualified_leads;
        entry.appointments_set += row.appointments_set;
    }

    by_date
        .into_iter()
        .map(|(date, totals)| DailyTotals { date, totals })
        .collect()
}

/// Individual totals against the mean of per-person totals across the team.
/// Percent difference is 0.0 against a zero team average.
pub fn team_comparison(individual: &KpiTotals, team: &[TeamMemberTotals]) -> TeamComparison {
    let average = |pick: fn(&KpiTotals) -> i64| -> f64 {
        if team.is_empty() {
            return 0.0;
        }
        team.iter().map(|member| pick(&member.totals)).sum::<i64>() as f64 / team.len() as f64
    };

    let compare = |value: i64, team_average: f64| -> MetricComparison {
        let individual = value as f64;
        MetricComparison {
            individual,
            team_average,
            percent_difference: if team_average > 0.0 {
                (individual - team_average) / team_average * 100.0
            } else {
                0.0
            },
        }
    };

    TeamComparison {
        doors_knocked: compare(
            individual.doors_knocked,
            average(|t| t.doors_knocked),
        ),
        homeowners_talked: compare(
            individual.homeowners_talked,
            average(|t| t.homeowners_talked),
        ),
        qualified_leads: compare(
            individual.qualified_leads,
            average(|t| t.qualified_leads),
        ),
        appointments_set: compare(
            individual.appointments_set,
            average(|t| t.appointments_set),
        ),
    }
}

/// `None` when there are no rows to summarize.
pub fn summary_stats(rows: &[SubmissionRow]) -> Option<SummaryStats> {
    let first_date = rows.iter().map(|row| row.submitted_at.date()).min()?;
    let last_date = rows.iter().map(|row| row.submitted_at.date()).max()?;
    let days_active = rows
        .iter()
        .map(|row| row.submitted_at.date())
        .collect::<BTreeSet<NaiveDate>>()
        .len();

    Some(SummaryStats {
        total_entries: rows.len(),
        first_date,
        last_date,
        days_active,
    })
}
