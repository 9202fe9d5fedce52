//! SMTP report delivery. Builds an HTML summary with the five charts
//! attached and sends it through the `lettre` async transport.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::charts::ChartSet;
use crate::config::EmailConfig;
use crate::models::{ConversionRates, KpiTotals};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("failed to read chart attachment: {0}")]
    Attachment(#[from] std::io::Error),

    #[error("no sender configured; set email.from_address or email.username")]
    NoSender,
}

pub struct ReportMailer {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl ReportMailer {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
        };
        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    pub async fn test_connection(&self) -> Result<bool, EmailError> {
        Ok(self.transport.test_connection().await?)
    }

    pub async fn send_report(
        &self,
        to_email: &str,
        person_name: &str,
        charts: &ChartSet,
        totals: &KpiTotals,
        rates: &ConversionRates,
        date_range: &str,
    ) -> Result<(), EmailError> {
        let from = self.config.sender().ok_or(EmailError::NoSender)?;

        let html = render_html_body(person_name, totals, rates, date_range);
        let html_part = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(html);
        let mut body = MultiPart::related().singlepart(html_part);
        for (chart_name, chart_path) in charts.iter() {
            body = body.singlepart(png_attachment(chart_name, chart_path)?);
        }

        let message = Message::builder()
            .from(from.parse()?)
            .to(to_email.parse()?)
            .subject(format!("Your Monthly Sales Performance - {date_range}"))
            .multipart(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn png_attachment(chart_name: &str, chart_path: &Path) -> Result<SinglePart, EmailError> {
    let bytes = std::fs::read(chart_path)?;
    let content_type =
        ContentType::parse("image/png").map_err(|e| EmailError::Build(e.to_string()))?;
    Ok(Attachment::new(format!("{chart_name}.png")).body(bytes, content_type))
}

fn render_html_body(
    person_name: &str,
    totals: &KpiTotals,
    rates: &ConversionRates,
    date_range: &str,
) -> String {
    let mut html = String::new();

    let _ = writeln!(
        html,
        "<html><head><style>\
         body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}\
         .header {{ background-color: #2E86AB; color: white; padding: 20px; text-align: center; border-radius: 5px; }}\
         .metrics {{ background-color: #f4f4f4; padding: 15px; border-radius: 5px; margin: 20px 0; }}\
         .conversion {{ background-color: #e8f4f8; padding: 15px; border-radius: 5px; margin: 20px 0; }}\
         .row {{ display: flex; justify-content: space-between; padding: 8px 0; border-bottom: 1px solid #ddd; }}\
         .label {{ font-weight: bold; color: #555; }}\
         .value {{ color: #2E86AB; font-weight: bold; }}\
         .footer {{ text-align: center; padding: 20px; color: #888; font-size: 12px; }}\
         </style></head><body>"
    );

    let _ = writeln!(
        html,
        "<div class=\"header\"><h1>Your Monthly Sales Performance</h1><p>{date_range}</p></div>"
    );
    let _ = writeln!(html, "<p>Hi {person_name},</p>");
    let _ = writeln!(
        html,
        "<p>Here's your performance summary. Great work out there!</p>"
    );

    let _ = writeln!(html, "<div class=\"metrics\"><h2>Your Activity Metrics</h2>");
    for (label, value) in [
        ("Doors Knocked", totals.doors_knocked),
        ("Homeowners Talked", totals.homeowners_talked),
        ("Qualified Leads", totals.qualified_leads),
        ("Appointments Set", totals.appointments_set),
    ] {
        let _ = writeln!(
            html,
            "<div class=\"row\"><span class=\"label\">{label}:</span>\
             <span class=\"value\">{value}</span></div>"
        );
    }
    let _ = writeln!(html, "</div>");

    let _ = writeln!(
        html,
        "<div class=\"conversion\"><h2>Your Conversion Rates</h2>"
    );
    for (label, value) in [
        ("Talk Rate", rates.talk_rate),
        ("Qualification Rate", rates.qualification_rate),
        ("Appointment Rate", rates.appointment_rate),
        ("Overall Conversion", rates.overall_conversion),
    ] {
        let _ = writeln!(
            html,
            "<div class=\"row\"><span class=\"label\">{label}:</span>\
             <span class=\"value\">{value:.1}%</span></div>"
        );
    }
    let _ = writeln!(html, "</div>");

    let _ = writeln!(
        html,
        "<p><strong>Attached charts:</strong> performance metrics, sales funnel, \
         daily trends, team comparison, conversion rates.</p>\
         <p>Keep up the excellent work! If you have questions about your metrics, \
         reach out to your manager.</p>"
    );

    let _ = writeln!(
        html,
        "<div class=\"footer\"><p>Automated report generated on {}</p></div></body></html>",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_totals() -> KpiTotals {
        KpiTotals {
            doors_knocked: 120,
            homeowners_talked: 45,
            qualified_leads: 12,
            appointments_set: 5,
        }
    }

    #[test]
    fn html_body_contains_metrics_and_rates() {
        let rates = crate::kpi::conversion_rates(&sample_totals());
        let html = render_html_body("Jane Smith", &sample_totals(), &rates, "2026-01-01 to 2026-01-31");

        assert!(html.contains("Hi Jane Smith,"));
        assert!(html.contains("2026-01-01 to 2026-01-31"));
        assert!(html.contains("<span class=\"value\">120</span>"));
        assert!(html.contains("<span class=\"value\">37.5%</span>"));
    }

    #[test]
    fn mailer_requires_a_sender() {
        let config = EmailConfig {
            use_tls: false,
            ..EmailConfig::default()
        };
        let mailer = ReportMailer::new(config).unwrap();
        let charts = ChartSet {
            kpi_metrics: "kpi.png".into(),
            conversion_funnel: "funnel.png".into(),
            daily_trends: "daily.png".into(),
            team_comparison: "team.png".into(),
            conversion_rates: "rates.png".into(),
        };
        let rates = ConversionRates::default();

        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(mailer.send_report(
                "jane@example.com",
                "Jane Smith",
                &charts,
                &sample_totals(),
                &rates,
                "2026-01-01 to 2026-01-31",
            ));
        assert!(matches!(result, Err(EmailError::NoSender)));
    }

    #[test]
    fn error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "email build error: missing body");
    }

    #[test]
    fn error_display_address() {
        let parsed: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(parsed.unwrap_err());
        assert!(err.to_string().contains("email address parse error"));
    }
}
