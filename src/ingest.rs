//! Sheet ingestion: reads the response sheet as CSV, either from a local
//! export or a published-CSV URL. HTTP fetches retry with backoff before
//! giving up.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::SheetConfig;

/// Retry delays between HTTP fetch attempts (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// Timeout for a single fetch attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to fetch sheet: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to read sheet file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sheet as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no data found in the sheet")]
    EmptySheet,

    #[error("no sheet source configured; set sheet.csv_url or sheet.csv_path")]
    NoSource,
}

#[derive(Debug, Clone)]
pub enum SheetSource {
    Url(String),
    Path(PathBuf),
}

impl SheetSource {
    /// A URL wins over a local path when both are configured.
    pub fn from_config(config: &SheetConfig) -> Result<Self, IngestError> {
        if let Some(url) = &config.csv_url {
            Ok(SheetSource::Url(url.clone()))
        } else if let Some(path) = &config.csv_path {
            Ok(SheetSource::Path(path.clone()))
        } else {
            Err(IngestError::NoSource)
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SheetSource::Url(url) => url.clone(),
            SheetSource::Path(path) => path.display().to_string(),
        }
    }
}

/// Header row plus raw string records, before any cleaning.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub async fn fetch_sheet(source: &SheetSource) -> Result<RawSheet, IngestError> {
    let text = match source {
        SheetSource::Url(url) => fetch_with_retry(url).await?,
        SheetSource::Path(path) => std::fs::read_to_string(path)?,
    };
    parse_csv(&text)
}

async fn fetch_with_retry(url: &str) -> Result<String, IngestError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
        match fetch_once(&client, url).await {
            Ok(text) => return Ok(text),
            Err(err) => {
                println!(
                    "  fetch attempt {} failed: {err}; retrying in {delay_secs}s",
                    attempt + 1
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }
        }
    }

    fetch_once(&client, url).await
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String, IngestError> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

fn parse_csv(text: &str) -> Result<RawSheet, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(IngestError::EmptySheet);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    if rows.is_empty() {
        return Err(IngestError::EmptySheet);
    }

    Ok(RawSheet { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_rows() {
        let sheet = parse_csv("Timestamp,Name,Doors\n2026-01-05 09:00:00,Jane,12\n").unwrap();
        assert_eq!(sheet.headers, vec!["Timestamp", "Name", "Doors"]);
        assert_eq!(sheet.rows, vec![vec!["2026-01-05 09:00:00", "Jane", "12"]]);
    }

    #[test]
    fn trims_header_whitespace() {
        let sheet = parse_csv(" Timestamp , Name \na,b\n").unwrap();
        assert_eq!(sheet.headers, vec!["Timestamp", "Name"]);
    }

    #[test]
    fn tolerates_short_rows() {
        let sheet = parse_csv("Timestamp,Name,Doors\n2026-01-05,Jane\n").unwrap();
        assert_eq!(sheet.rows[0].len(), 2);
    }

    #[test]
    fn empty_sheet_is_an_error() {
        assert!(matches!(parse_csv(""), Err(IngestError::EmptySheet)));
        assert!(matches!(
            parse_csv("Timestamp,Name\n"),
            Err(IngestError::EmptySheet)
        ));
    }

    #[test]
    fn source_requires_url_or_path() {
        let empty = SheetConfig::default();
        assert!(matches!(
            SheetSource::from_config(&empty),
            Err(IngestError::NoSource)
        ));

        let with_url = SheetConfig {
            csv_url: Some("https://example.com/sheet.csv".to_string()),
            csv_path: Some(PathBuf::from("responses.csv")),
        };
        assert!(matches!(
            SheetSource::from_config(&with_url),
            Ok(SheetSource::Url(_))
        ));
    }
}
