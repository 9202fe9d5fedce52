use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

pub const METRIC_LABELS: [&str; 4] = [
    "Doors Knocked",
    "Homeowners Talked",
    "Qualified Leads",
    "Appointments Set",
];

/// One cleaned form submission. Counts are already coerced and non-negative.
#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub submitted_at: NaiveDateTime,
    pub name: String,
    pub doors_knocked: i64,
    pub homeowners_talked: i64,
    pub qualified_leads: i64,
    pub appointments_set: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KpiTotals {
    pub doors_knocked: i64,
    pub homeowners_talked: i64,
    pub qualified_leads: i64,
    pub appointments_set: i64,
}

impl KpiTotals {
    /// Funnel-stage order, matching [`METRIC_LABELS`].
    pub fn values(&self) -> [i64; 4] {
        [
            self.doors_knocked,
            self.homeowners_talked,
            self.qualified_leads,
            self.appointments_set,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TeamMemberTotals {
    pub name: String,
    pub totals: KpiTotals,
}

/// Conversion rates in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRates {
    pub talk_rate: f64,
    pub qualification_rate: f64,
    pub appointment_rate: f64,
    pub overall_conversion: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: KpiTotals,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricComparison {
    pub individual: f64,
    pub team_average: f64,
    pub percent_difference: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TeamComparison {
    pub doors_knocked: MetricComparison,
    pub homeowners_talked: MetricComparison,
    pub qualified_leads: MetricComparison,
    pub appointments_set: MetricComparison,
}

impl TeamComparison {
    pub fn metrics(&self) -> [(&'static str, MetricComparison); 4] {
        [
            (METRIC_LABELS[0], self.doors_knocked),
            (METRIC_LABELS[1], self.homeowners_talked),
            (METRIC_LABELS[2], self.qualified_leads),
            (METRIC_LABELS[3], self.appointments_set),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub total_entries: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub days_active: usize,
}

impl SummaryStats {
    pub fn date_range(&self) -> String {
        format!("{} to {}", self.first_date, self.last_date)
    }
}

/// Funnel-consistency warnings. Warnings never fail a run.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub warnings: Vec<String>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub email: String,
}
