//! Data cleaning and filtering: column resolution, type coercion, name
//! normalization, windowing, and per-person selection. Malformed rows are
//! dropped and counted rather than failing the run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::config::ColumnMap;
use crate::ingest::RawSheet;
use crate::models::{KpiTotals, QualityReport, SubmissionRow, TeamMemberTotals};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(
        "missing required columns: {missing}; available columns: {available}. \
         Update the data.columns section of your config file."
    )]
    MissingColumns { missing: String, available: String },

    #[error("no data found for '{name}'; available names: {available}")]
    UnknownPerson { name: String, available: String },
}

struct ColumnIndices {
    timestamp: usize,
    name: usize,
    doors_knocked: usize,
    homeowners_talked: usize,
    qualified_leads: usize,
    appointments_set: usize,
}

fn resolve_columns(headers: &[String], columns: &ColumnMap) -> Result<ColumnIndices, DataError> {
    let wanted = [
        &columns.timestamp,
        &columns.name,
        &columns.doors_knocked,
        &columns.homeowners_talked,
        &columns.qualified_leads,
        &columns.appointments_set,
    ];

    let mut found = [0usize; 6];
    let mut missing = Vec::new();
    for (slot, column_name) in wanted.iter().enumerate() {
        match headers.iter().position(|header| header == *column_name) {
            Some(index) => found[slot] = index,
            None => missing.push(column_name.as_str()),
        }
    }

    if !missing.is_empty() {
        return Err(DataError::MissingColumns {
            missing: missing.join(", "),
            available: headers.join(", "),
        });
    }

    Ok(ColumnIndices {
        timestamp: found[0],
        name: found[1],
        doors_knocked: found[2],
        homeowners_talked: found[3],
        qualified_leads: found[4],
        appointments_set: found[5],
    })
}

#[derive(Debug)]
pub struct CleanOutcome {
    pub rows: Vec<SubmissionRow>,
    /// Rows dropped for an unreadable timestamp.
    pub dropped: usize,
}

pub fn clean_rows(sheet: &RawSheet, columns: &ColumnMap) -> Result<CleanOutcome, DataError> {
    let indices = resolve_columns(&sheet.headers, columns)?;

    let mut rows = Vec::with_capacity(sheet.rows.len());
    let mut dropped = 0usize;
    for record in &sheet.rows {
        let field = |index: usize| record.get(index).map(String::as_str).unwrap_or("");

        let Some(submitted_at) = parse_timestamp(field(indices.timestamp)) else {
            dropped += 1;
            continue;
        };

        rows.push(SubmissionRow {
            submitted_at,
            name: title_case(field(indices.name)),
            doors_knocked: parse_count(field(indices.doors_knocked)),
            homeowners_talked: parse_count(field(indices.homeowners_talked)),
            qualified_leads: parse_count(field(indices.qualified_leads)),
            appointments_set: parse_count(field(indices.appointments_set)),
        });
    }

    Ok(CleanOutcome { rows, dropped })
}

/// The formats sheet exports actually produce: ISO-ish and US-style, with and
/// without a time component.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp);
        }
    }

    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Lenient count coercion: unparseable or missing becomes 0, negatives clamp
/// to 0, decimal text truncates.
fn parse_count(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(count) = raw.parse::<i64>() {
        return count.max(0);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => (value as i64).max(0),
        _ => 0,
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Keep rows from the last `days` days. Zero or negative keeps everything.
pub fn filter_by_window(rows: &[SubmissionRow], days: i64) -> Vec<SubmissionRow> {
    if days <= 0 {
        return rows.to_vec();
    }
    let cutoff = Local::now().naive_local() - Duration::days(days);
    rows.iter()
        .filter(|row| row.submitted_at >= cutoff)
        .cloned()
        .collect()
}

/// Case-insensitive exact match first, then substring match, so `--name ryan`
/// finds "Ryan Alvarez".
pub fn filter_by_person(
    rows: &[SubmissionRow],
    person: &str,
) -> Result<Vec<SubmissionRow>, DataError> {
    let wanted = person.trim().to_lowercase();

    let mut matched: Vec<SubmissionRow> = rows
        .iter()
        .filter(|row| row.name.to_lowercase() == wanted)
        .cloned()
        .collect();

    if matched.is_empty() {
        matched = rows
            .iter()
            .filter(|row| row.name.to_lowercase().contains(&wanted))
            .cloned()
            .collect();
    }

    if matched.is_empty() {
        let names: Vec<String> = rows
            .iter()
            .map(|row| row.name.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        return Err(DataError::UnknownPerson {
            name: person.to_string(),
            available: names.join(", "),
        });
    }

    Ok(matched)
}

pub fn team_totals(rows: &[SubmissionRow]) -> Vec<TeamMemberTotals> {
    let mut by_name: BTreeMap<String, KpiTotals> = BTreeMap::new();
    for row in rows {
        let entry = by_name.entry(row.name.clone()).or_default();
        entry.doors_knocked += row.doors_knocked;
        entry.homeowners_talked += row.homeowners_talked;
        entry.qualified_leads += row.qualified_leads;
        entry.appointments_set += row.appointments_set;
    }

    by_name
        .into_iter()
        .map(|(name, totals)| TeamMemberTotals { name, totals })
        .collect()
}

pub fn quality_report(rows: &[SubmissionRow]) -> QualityReport {
    let mut warnings = Vec::new();

    if rows.iter().any(|r| r.homeowners_talked > r.doors_knocked) {
        warnings.push("some records have more homeowners talked than doors knocked".to_string());
    }
    if rows.iter().any(|r| r.qualified_leads > r.homeowners_talked) {
        warnings.push("some records have more qualified leads than homeowners talked".to_string());
    }
    if rows.iter().any(|r| r.appointments_set > r.qualified_leads) {
        warnings.push("some records have more appointments than qualified leads".to_string());
    }

    QualityReport {
        warnings,
        total_rows: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawSheet;

    fn column_map() -> ColumnMap {
        ColumnMap {
            timestamp: "Timestamp".to_string(),
            name: "Name".to_string(),
            doors_knocked: "Doors".to_string(),
            homeowners_talked: "Talked".to_string(),
            qualified_leads: "Qualified".to_string(),
            appointments_set: "Appointments".to_string(),
        }
    }

    fn sheet(rows: Vec<Vec<&str>>) -> RawSheet {
        RawSheet {
            headers: vec!["Timestamp", "Name", "Doors", "Talked", "Qualified", "Appointments"]
                .into_iter()
                .map(String::from)
                .collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    fn row(name: &str, days_ago: i64, counts: [i64; 4]) -> SubmissionRow {
        SubmissionRow {
            submitted_at: Local::now().naive_local() - Duration::days(days_ago),
            name: name.to_string(),
            doors_knocked: counts[0],
            homeowners_talked: counts[1],
            qualified_leads: counts[2],
            appointments_set: counts[3],
        }
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let sheet = RawSheet {
            headers: vec!["Timestamp".to_string(), "Name".to_string()],
            rows: vec![],
        };
        let err = clean_rows(&sheet, &column_map()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Doors"));
        assert!(message.contains("Talked"));
        assert!(message.contains("Qualified"));
        assert!(message.contains("Appointments"));
        assert!(message.contains("available columns: Timestamp, Name"));
    }

    #[test]
    fn cleans_rows_and_drops_bad_timestamps() {
        let raw = sheet(vec![
            vec!["2026-01-05 09:30:00", "  jane smith ", "12", "5", "2", "1"],
            vec!["not a date", "Jane Smith", "10", "4", "1", "0"],
            vec!["1/6/2026 10:15:00", "RYAN ALVAREZ", "8", "3", "1", "1"],
        ]);

        let outcome = clean_rows(&raw, &column_map()).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.rows[0].name, "Jane Smith");
        assert_eq!(outcome.rows[1].name, "Ryan Alvarez");
        assert_eq!(outcome.rows[0].doors_knocked, 12);
    }

    #[test]
    fn count_coercion_is_lenient() {
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count(" 7 "), 7);
        assert_eq!(parse_count("7.9"), 7);
        assert_eq!(parse_count("-3"), 0);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("lots"), 0);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2026-01-05 09:30:00").is_some());
        assert!(parse_timestamp("1/5/2026 09:30:00").is_some());
        assert!(parse_timestamp("2026-01-05T09:30:00").is_some());
        assert!(parse_timestamp("2026-01-05").is_some());
        assert!(parse_timestamp("1/5/2026").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn title_cases_names() {
        assert_eq!(title_case("  jane   smith "), "Jane Smith");
        assert_eq!(title_case("RYAN ALVAREZ"), "Ryan Alvarez");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn window_filter_honors_days() {
        let rows = vec![row("Jane Smith", 2, [1, 1, 1, 1]), row("Jane Smith", 40, [1, 1, 1, 1])];
        assert_eq!(filter_by_window(&rows, 30).len(), 1);
        assert_eq!(filter_by_window(&rows, 0).len(), 2);
        assert_eq!(filter_by_window(&rows, -1).len(), 2);
    }

    #[test]
    fn person_match_is_case_insensitive() {
        let rows = vec![row("Jane Smith", 1, [1, 0, 0, 0])];
        assert_eq!(filter_by_person(&rows, "jane smith").unwrap().len(), 1);
        assert_eq!(filter_by_person(&rows, "JANE SMITH").unwrap().len(), 1);
    }

    #[test]
    fn person_match_falls_back_to_substring() {
        let rows = vec![
            row("Jane Smith", 1, [1, 0, 0, 0]),
            row("Ryan Alvarez", 1, [1, 0, 0, 0]),
        ];
        let matched = filter_by_person(&rows, "ryan").unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Ryan Alvarez");
    }

    #[test]
    fn unknown_person_lists_names_sorted() {
        let rows = vec![
            row("Ryan Alvarez", 1, [1, 0, 0, 0]),
            row("Jane Smith", 1, [1, 0, 0, 0]),
        ];
        let err = filter_by_person(&rows, "Casey").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no data found for 'Casey'; available names: Jane Smith, Ryan Alvarez"
        );
    }

    #[test]
    fn team_totals_group_by_person() {
        let rows = vec![
            row("Jane Smith", 1, [10, 5, 2, 1]),
            row("Ryan Alvarez", 1, [8, 4, 2, 1]),
            row("Jane Smith", 2, [6, 3, 1, 0]),
        ];
        let team = team_totals(&rows);
        assert_eq!(team.len(), 2);
        assert_eq!(team[0].name, "Jane Smith");
        assert_eq!(team[0].totals.doors_knocked, 16);
        assert_eq!(team[1].name, "Ryan Alvarez");
        assert_eq!(team[1].totals.appointments_set, 1);
    }

    #[test]
    fn quality_report_flags_funnel_inversions() {
        let clean = vec![row("Jane Smith", 1, [10, 5, 2, 1])];
        assert!(quality_report(&clean).warnings.is_empty());

        let talked_over_doors = vec![row("Jane Smith", 1, [3, 5, 1, 0])];
        let report = quality_report(&talked_over_doors);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("homeowners talked"));

        let all_inverted = vec![row("Jane Smith", 1, [1, 2, 3, 4])];
        assert_eq!(quality_report(&all_inverted).warnings.len(), 3);
    }
}
