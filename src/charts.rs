//! Chart rendering. Five PNG charts per person, written into a per-person,
//! date-stamped directory under the configured output root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::config::{ChartConfig, ColorScheme};
use crate::models::{
    ConversionRates, DailyTotals, KpiTotals, TeamComparison, METRIC_LABELS,
};

const RATE_LABELS: [&str; 4] = [
    "Talk Rate",
    "Qualification Rate",
    "Appointment Rate",
    "Overall Conversion",
];

/// Paths of the five rendered charts for one person.
pub struct ChartSet {
    pub kpi_metrics: PathBuf,
    pub conversion_funnel: PathBuf,
    pub daily_trends: PathBuf,
    pub team_comparison: PathBuf,
    pub conversion_rates: PathBuf,
}

impl ChartSet {
    pub fn iter(&self) -> [(&'static str, &Path); 5] {
        [
            ("kpi_metrics", self.kpi_metrics.as_path()),
            ("conversion_funnel", self.conversion_funnel.as_path()),
            ("daily_trends", self.daily_trends.as_path()),
            ("team_comparison", self.team_comparison.as_path()),
            ("conversion_rates", self.conversion_rates.as_path()),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    primary: RGBColor,
    secondary: RGBColor,
    success: RGBColor,
    warning: RGBColor,
}

impl Palette {
    fn from_scheme(scheme: &ColorScheme) -> Self {
        Self {
            primary: parse_hex(&scheme.primary).unwrap_or(RGBColor(0x2e, 0x86, 0xab)),
            secondary: parse_hex(&scheme.secondary).unwrap_or(RGBColor(0xa2, 0x3b, 0x72)),
            success: parse_hex(&scheme.success).unwrap_or(RGBColor(0x06, 0xa7, 0x7d)),
            warning: parse_hex(&scheme.warning).unwrap_or(RGBColor(0xf1, 0x8f, 0x01)),
        }
    }

    /// Series colors in funnel-stage order.
    fn series(&self) -> [RGBColor; 4] {
        [self.primary, self.warning, self.success, self.secondary]
    }
}

fn parse_hex(raw: &str) -> Option<RGBColor> {
    let digits = raw.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some(RGBColor(r, g, b))
}

/// Filesystem-safe directory stem for a person's name.
pub fn safe_dir_name(person_name: &str) -> String {
    person_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .replace(' ', "_")
        .to_lowercase()
}

pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    palette: Palette,
}

impl ChartRenderer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            width: config.width,
            height: config.height,
            palette: Palette::from_scheme(&config.colors),
        }
    }

    fn person_dir(&self, person_name: &str) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y-%m-%d");
        let dir = self
            .output_dir
            .join(format!("{}_{stamp}", safe_dir_name(person_name)));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create chart directory {}", dir.display()))?;
        Ok(dir)
    }

    pub fn render_all(
        &self,
        person_name: &str,
        totals: &KpiTotals,
        rates: &ConversionRates,
        daily: &[DailyTotals],
        comparison: &TeamComparison,
        date_range: &str,
    ) -> Result<ChartSet> {
        let dir = self.person_dir(person_name)?;
        Ok(ChartSet {
            kpi_metrics: self.kpi_bars(&dir, person_name, totals, date_range)?,
            conversion_funnel: self.funnel(&dir, person_name, totals, rates, date_range)?,
            daily_trends: self.daily_lines(&dir, person_name, daily, date_range)?,
            team_comparison: self.comparison_bars(&dir, person_name, comparison, date_range)?,
            conversion_rates: self.rate_bars(&dir, person_name, rates, date_range)?,
        })
    }

    fn kpi_bars(
        &self,
        dir: &Path,
        person_name: &str,
        totals: &KpiTotals,
        date_range: &str,
    ) -> Result<PathBuf> {
        let path = dir.join("kpi_metrics.png");
        let values = totals.values();
        let y_max = values.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.15;
        let colors = self.palette.series();
        {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("Performance Metrics - {person_name} ({date_range})"),
                    ("sans-serif", 36),
                )
                .margin(24)
                .x_label_area_size(48)
                .y_label_area_size(72)
                .build_cartesian_2d((0usize..4usize).into_segmented(), 0f64..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .y_desc("Count")
                .x_label_formatter(&|seg| segment_label(&METRIC_LABELS, seg))
                .draw()?;

            chart.draw_series(values.iter().enumerate().map(|(i, value)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(i), 0.0),
                        (SegmentValue::Exact(i + 1), *value as f64),
                    ],
                    colors[i].filled(),
                )
            }))?;

            chart.draw_series(values.iter().enumerate().map(|(i, value)| {
                Text::new(
                    format!("{value}"),
                    (SegmentValue::CenterOf(i), *value as f64),
                    ("sans-serif", 22),
                )
            }))?;

            root.present()?;
        }
        Ok(path)
    }

    fn funnel(
        &self,
        dir: &Path,
        person_name: &str,
        totals: &KpiTotals,
        rates: &ConversionRates,
        date_range: &str,
    ) -> Result<PathBuf> {
        let path = dir.join("conversion_funnel.png");
        let values = totals.values();
        let base = values[0] as f64;
        let fractions: Vec<f64> = values
            .iter()
            .map(|v| if base > 0.0 { *v as f64 / base } else { 0.0 })
            .collect();
        // Stage rates sit inside every bar past the first.
        let stage_rates = [
            None,
            Some(rates.talk_rate),
            Some(rates.qualification_rate),
            Some(rates.appointment_rate),
        ];
        let colors = self.palette.series();
        {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("Sales Funnel - {person_name} ({date_range})"),
                    ("sans-serif", 36),
                )
                .margin(24)
                .x_label_area_size(24)
                .y_label_area_size(176)
                .build_cartesian_2d(0f64..1.25f64, (0usize..4usize).into_segmented())?;

            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(0)
                .y_label_formatter(&|seg| segment_label(&METRIC_LABELS, seg))
                .draw()?;

            chart.draw_series(fractions.iter().enumerate().map(|(i, fraction)| {
                Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(i)),
                        (*fraction, SegmentValue::Exact(i + 1)),
                    ],
                    colors[i].filled(),
                )
            }))?;

            chart.draw_series(values.iter().enumerate().map(|(i, value)| {
                Text::new(
                    format!("{value}"),
                    (fractions[i] + 0.02, SegmentValue::CenterOf(i)),
                    ("sans-serif", 22),
                )
            }))?;

            chart.draw_series(stage_rates.iter().enumerate().filter_map(|(i, rate)| {
                rate.map(|rate| {
                    Text::new(
                        format!("{rate:.1}%"),
                        (fractions[i] / 2.0, SegmentValue::CenterOf(i)),
                        ("sans-serif", 20).into_font().color(&WHITE),
                    )
                })
            }))?;

            root.present()?;
        }
        Ok(path)
    }

    fn daily_lines(
        &self,
        dir: &Path,
        person_name: &str,
        daily: &[DailyTotals],
        date_range: &str,
    ) -> Result<PathBuf> {
        let path = dir.join("daily_trends.png");
        let first = daily
            .first()
            .map(|d| d.date)
            .unwrap_or_else(|| Local::now().date_naive());
        let mut last = daily.last().map(|d| d.date).unwrap_or(first);
        if last <= first {
            last = first + Duration::days(1);
        }
        let y_max = daily
            .iter()
            .flat_map(|d| d.totals.values())
            .max()
            .unwrap_or(0)
            .max(1) as f64
            * 1.1;
        let colors = self.palette.series();
        {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("Daily Performance Trends - {person_name} ({date_range})"),
                    ("sans-serif", 36),
                )
                .margin(24)
                .x_label_area_size(56)
                .y_label_area_size(72)
                .build_cartesian_2d(first..last, 0f64..y_max)?;

            chart
                .configure_mesh()
                .x_desc("Date")
                .y_desc("Count")
                .x_label_formatter(&|date| date.format("%b %d").to_string())
                .draw()?;

            let series: [(&str, fn(&KpiTotals) -> i64); 4] = [
                (METRIC_LABELS[0], |t| t.doors_knocked),
                (METRIC_LABELS[1], |t| t.homeowners_talked),
                (METRIC_LABELS[2], |t| t.qualified_leads),
                (METRIC_LABELS[3], |t| t.appointments_set),
            ];

            for (slot, (label, pick)) in series.into_iter().enumerate() {
                let color = colors[slot];
                let points: Vec<(chrono::NaiveDate, f64)> = daily
                    .iter()
                    .map(|d| (d.date, pick(&d.totals) as f64))
                    .collect();
                chart
                    .draw_series(LineSeries::new(points, color.stroke_width(3)).point_size(4))?
                    .label(label)
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(3))
                    });
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.85))
                .border_style(BLACK)
                .draw()?;

            root.present()?;
        }
        Ok(path)
    }

    fn comparison_bars(
        &self,
        dir: &Path,
        person_name: &str,
        comparison: &TeamComparison,
        date_range: &str,
    ) -> Result<PathBuf> {
        let path = dir.join("team_comparison.png");
        let metrics = comparison.metrics();
        let y_max = metrics
            .iter()
            .map(|(_, m)| m.individual.max(m.team_average))
            .fold(0.0f64, f64::max)
            .max(1.0)
            * 1.15;
        let individual_color = self.palette.primary;
        let team_color = self.palette.secondary;
        {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("Performance vs Team Average - {person_name} ({date_range})"),
                    ("sans-serif", 36),
                )
                .margin(24)
                .x_label_area_size(48)
                .y_label_area_size(72)
                .build_cartesian_2d(-0.5f64..3.5f64, 0f64..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(4)
                .x_label_formatter(&|x| {
                    let nearest = x.round();
                    if (x - nearest).abs() < 0.05 && (0.0..=3.0).contains(&nearest) {
                        METRIC_LABELS[nearest as usize].to_string()
                    } else {
                        String::new()
                    }
                })
                .y_desc("Count")
                .draw()?;

            chart
                .draw_series(metrics.iter().enumerate().map(|(i, (_, m))| {
                    let center = i as f64 - 0.18;
                    Rectangle::new(
                        [(center - 0.15, 0.0), (center + 0.15, m.individual)],
                        individual_color.filled(),
                    )
                }))?
                .label("You")
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 6), (x + 14, y + 6)], individual_color.filled())
                });

            chart
                .draw_series(metrics.iter().enumerate().map(|(i, (_, m))| {
                    let center = i as f64 + 0.18;
                    Rectangle::new(
                        [(center - 0.15, 0.0), (center + 0.15, m.team_average)],
                        team_color.filled(),
                    )
                }))?
                .label("Team Average")
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 6), (x + 14, y + 6)], team_color.filled())
                });

            chart.draw_series(metrics.iter().enumerate().flat_map(|(i, (_, m))| {
                let x = i as f64;
                [
                    Text::new(
                        format!("{:.0}", m.individual),
                        (x - 0.18, m.individual),
                        ("sans-serif", 18),
                    ),
                    Text::new(
                        format!("{:.0}", m.team_average),
                        (x + 0.18, m.team_average),
                        ("sans-serif", 18),
                    ),
                ]
            }))?;

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.85))
                .border_style(BLACK)
                .draw()?;

            root.present()?;
        }
        Ok(path)
    }

    fn rate_bars(
        &self,
        dir: &Path,
        person_name: &str,
        rates: &ConversionRates,
        date_range: &str,
    ) -> Result<PathBuf> {
        let path = dir.join("conversion_rates.png");
        let values = [
            rates.talk_rate,
            rates.qualification_rate,
            rates.appointment_rate,
            rates.overall_conversion,
        ];
        let y_max = values.iter().fold(0.0f64, |a, b| a.max(*b)).max(1.0) * 1.2;
        let colors = self.palette.series();
        {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("Conversion Rates - {person_name} ({date_range})"),
                    ("sans-serif", 36),
                )
                .margin(24)
                .x_label_area_size(48)
                .y_label_area_size(72)
                .build_cartesian_2d((0usize..4usize).into_segmented(), 0f64..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .y_desc("Percentage (%)")
                .x_label_formatter(&|seg| segment_label(&RATE_LABELS, seg))
                .draw()?;

            chart.draw_series(values.iter().enumerate().map(|(i, value)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(i), 0.0),
                        (SegmentValue::Exact(i + 1), *value),
                    ],
                    colors[i].filled(),
                )
            }))?;

            chart.draw_series(values.iter().enumerate().map(|(i, value)| {
                Text::new(
                    format!("{value:.1}%"),
                    (SegmentValue::CenterOf(i), *value),
                    ("sans-serif", 22),
                )
            }))?;

            // 100% reference line; clipped away when the axis tops out lower.
            chart.draw_series(DashedLineSeries::new(
                vec![
                    (SegmentValue::Exact(0), 100.0),
                    (SegmentValue::Exact(4), 100.0),
                ],
                8,
                6,
                BLACK.mix(0.4).stroke_width(1),
            ))?;

            root.present()?;
        }
        Ok(path)
    }
}

fn segment_label(labels: &[&'static str; 4], seg: &SegmentValue<usize>) -> String {
    match seg {
        SegmentValue::CenterOf(i) if *i < labels.len() => labels[*i].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_dir_names() {
        assert_eq!(safe_dir_name("Jane Smith"), "jane_smith");
        assert_eq!(safe_dir_name("  Ryan  Alvarez "), "ryan__alvarez");
        assert_eq!(safe_dir_name("O'Brien, Pat"), "o_brien__pat");
    }

    #[test]
    fn hex_parsing_with_fallback() {
        assert_eq!(parse_hex("#2E86AB"), Some(RGBColor(0x2e, 0x86, 0xab)));
        assert_eq!(parse_hex("2e86ab"), Some(RGBColor(0x2e, 0x86, 0xab)));
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("not a color"), None);

        let mut scheme = ColorScheme::default();
        scheme.primary = "garbage".to_string();
        let palette = Palette::from_scheme(&scheme);
        assert_eq!(palette.primary, RGBColor(0x2e, 0x86, 0xab));
    }

    #[test]
    fn series_colors_follow_funnel_order() {
        let palette = Palette::from_scheme(&ColorScheme::default());
        let series = palette.series();
        assert_eq!(series[0], palette.primary);
        assert_eq!(series[1], palette.warning);
        assert_eq!(series[2], palette.success);
        assert_eq!(series[3], palette.secondary);
    }
}
