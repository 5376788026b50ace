//! Structural checks, heuristic warnings and the 0-100 quality score for a
//! parsed usage history.

use crate::error::UsageError;
use crate::models::{Confidence, DataQuality, ParsedUsageData, MIN_HISTORY_MONTHS};
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub const MIN_SPAN_DAYS: i64 = 180;

mod thresholds {
    pub const UNUSUALLY_HIGH_KWH: f64 = 10_000.0;
    pub const VERY_LOW_KWH: f64 = 50.0;
    pub const INCOMPLETE_DAYS: u32 = 20;
    pub const WELL_COVERED_DAYS: u32 = 25;
    pub const HIGH_VARIATION_FACTOR: f64 = 3.0;
    pub const LOW_VARIATION_FACTOR: f64 = 0.1;
    pub const FULL_YEAR_MONTHS: usize = 12;
}

#[derive(Debug, Clone, PartialEq)]
pub enum UsageWarning {
    UnusuallyHigh { month: String, total_kwh: f64 },
    ZeroUsage { month: String },
    VeryLow { month: String, total_kwh: f64 },
    Incomplete { month: String, days_with_data: u32 },
    HighVariation { max_kwh: f64, mean_kwh: f64 },
    LowVariation { min_kwh: f64, mean_kwh: f64 },
}

impl fmt::Display for UsageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageWarning::UnusuallyHigh { month, total_kwh } => {
                write!(f, "Unusually high usage in {month}: {total_kwh:.0} kWh")
            }
            UsageWarning::ZeroUsage { month } => write!(f, "Zero usage recorded in {month}"),
            UsageWarning::VeryLow { month, total_kwh } => {
                write!(f, "Very low usage in {month}: {total_kwh:.1} kWh")
            }
            UsageWarning::Incomplete {
                month,
                days_with_data,
            } => write!(
                f,
                "Incomplete data for {month}: only {days_with_data} days recorded"
            ),
            UsageWarning::HighVariation { max_kwh, mean_kwh } => write!(
                f,
                "Extreme high variation: peak month of {max_kwh:.0} kWh is more than 3x the average of {mean_kwh:.0} kWh"
            ),
            UsageWarning::LowVariation { min_kwh, mean_kwh } => write!(
                f,
                "Extreme low variation: lowest month of {min_kwh:.0} kWh is under 10% of the average of {mean_kwh:.0} kWh"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Important,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remediation {
    pub action: &'static str,
    pub severity: Severity,
}

/// Map a warning message onto a suggested action by its wording. Unrecognised
/// text gets a generic suggestion so callers can pass through warnings from
/// other sources.
pub fn remediation_for(text: &str) -> Remediation {
    let lower = text.to_ascii_lowercase();
    if lower.contains("unusually high") {
        Remediation {
            action: "Confirm the reading against your bill; a one-off event such as a heat wave or meter fault can skew the estimate.",
            severity: Severity::Warning,
        }
    } else if lower.contains("zero usage") {
        Remediation {
            action: "Check whether the home was vacant or the meter stopped reporting for that month.",
            severity: Severity::Important,
        }
    } else if lower.contains("very low") {
        Remediation {
            action: "Low months are fine if the home was partly unoccupied; otherwise re-export the data.",
            severity: Severity::Info,
        }
    } else if lower.contains("incomplete") {
        Remediation {
            action: "Export a longer or more recent history from your utility to fill the gaps.",
            severity: Severity::Warning,
        }
    } else if lower.contains("variation") {
        Remediation {
            action: "Seasonal swings are normal; recommendations assume future usage follows the same pattern.",
            severity: Severity::Info,
        }
    } else {
        Remediation {
            action: "Review your usage data for anything unexpected before relying on the estimate.",
            severity: Severity::Info,
        }
    }
}

/// A warning as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningNotice {
    pub message: String,
    pub action: &'static str,
    pub severity: Severity,
}

impl UsageWarning {
    pub fn notice(&self) -> WarningNotice {
        let message = self.to_string();
        let Remediation { action, severity } = remediation_for(&message);
        WarningNotice {
            message,
            action,
            severity,
        }
    }
}

/// Blocking problems. An empty list means the history is usable.
pub fn check_structure(usage: &ParsedUsageData) -> Vec<UsageError> {
    let mut errors = Vec::new();

    if usage.monthly_totals.len() < MIN_HISTORY_MONTHS {
        errors.push(UsageError::InsufficientHistory {
            found: usage.monthly_totals.len(),
            required: MIN_HISTORY_MONTHS,
        });
    }

    for month in &usage.monthly_totals {
        if month.total_kwh < 0.0 {
            errors.push(UsageError::NegativeUsage {
                month: month.month_key.clone(),
                total_kwh: month.total_kwh,
            });
        }
    }

    let span = usage.date_range.span_days();
    if span < MIN_SPAN_DAYS {
        errors.push(UsageError::ShortDateSpan {
            found: span,
            required: MIN_SPAN_DAYS,
        });
    }

    errors
}

pub fn check_heuristics(usage: &ParsedUsageData) -> Vec<UsageWarning> {
    let mut warnings = Vec::new();

    for month in &usage.monthly_totals {
        let total = month.total_kwh;
        if total > thresholds::UNUSUALLY_HIGH_KWH {
            warnings.push(UsageWarning::UnusuallyHigh {
                month: month.month_key.clone(),
                total_kwh: total,
            });
        }
        if total == 0.0 {
            warnings.push(UsageWarning::ZeroUsage {
                month: month.month_key.clone(),
            });
        } else if total > 0.0 && total < thresholds::VERY_LOW_KWH {
            warnings.push(UsageWarning::VeryLow {
                month: month.month_key.clone(),
                total_kwh: total,
            });
        }
        if month.days_with_data < thresholds::INCOMPLETE_DAYS {
            warnings.push(UsageWarning::Incomplete {
                month: month.month_key.clone(),
                days_with_data: month.days_with_data,
            });
        }
    }

    if usage.monthly_totals.is_empty() {
        return warnings;
    }

    let totals: Vec<f64> = usage.monthly_totals.iter().map(|m| m.total_kwh).collect();
    let mean = totals.iter().sum::<f64>() / totals.len() as f64;
    let max = totals.iter().copied().fold(f64::MIN, f64::max);
    let min = totals.iter().copied().fold(f64::MAX, f64::min);

    if max > thresholds::HIGH_VARIATION_FACTOR * mean {
        warnings.push(UsageWarning::HighVariation {
            max_kwh: max,
            mean_kwh: mean,
        });
    }
    if min > 0.0 && min < thresholds::LOW_VARIATION_FACTOR * mean {
        warnings.push(UsageWarning::LowVariation {
            min_kwh: min,
            mean_kwh: mean,
        });
    }

    warnings
}

pub fn quality_score(usage: &ParsedUsageData) -> u8 {
    let mut score: i64 = 100;

    score -= match usage.data_quality {
        DataQuality::Good => 0,
        DataQuality::Fair => 15,
        DataQuality::Poor => 30,
    };

    let thin_months = usage
        .monthly_totals
        .iter()
        .filter(|m| m.days_with_data < thresholds::WELL_COVERED_DAYS)
        .count() as i64;
    score -= 5 * thin_months;

    let missing_months = thresholds::FULL_YEAR_MONTHS.saturating_sub(usage.monthly_totals.len());
    score -= 3 * missing_months as i64;

    score.clamp(0, 100) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<UsageError>,
    pub warnings: Vec<UsageWarning>,
    pub quality_score: u8,
    pub confidence: Confidence,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn notices(&self) -> Vec<WarningNotice> {
        self.warnings.iter().map(UsageWarning::notice).collect()
    }

    /// First blocking error, if any.
    pub fn into_result(mut self) -> Result<Self, UsageError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(self.errors.swap_remove(0))
        }
    }
}

pub fn validate(usage: &ParsedUsageData) -> ValidationReport {
    let errors = check_structure(usage);
    let warnings = check_heuristics(usage);
    let quality_score = quality_score(usage);
    let confidence = Confidence::from_score(quality_score);

    debug!(
        errors = errors.len(),
        warnings = warnings.len(),
        quality_score,
        confidence = confidence.as_label(),
        "validated usage history"
    );

    ValidationReport {
        errors,
        warnings,
        quality_score,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, MonthlyUsage};
    use chrono::{Duration, TimeZone, Utc};

    fn usage_with(
        totals: &[f64],
        days: u32,
        quality: DataQuality,
        span_days: i64,
    ) -> ParsedUsageData {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid start");
        ParsedUsageData {
            monthly_totals: totals
                .iter()
                .enumerate()
                .map(|(i, total)| MonthlyUsage {
                    month_key: format!("2024-{:02}", i + 1),
                    total_kwh: *total,
                    days_with_data: days,
                    average_daily: total / f64::from(days),
                })
                .collect(),
            data_quality: quality,
            date_range: DateRange {
                start,
                end: start + Duration::days(span_days),
            },
        }
    }

    #[test]
    fn well_formed_history_has_no_errors() {
        let usage = usage_with(
            &[850.0, 780.0, 720.0, 680.0, 620.0, 580.0],
            30,
            DataQuality::Good,
            181,
        );
        let report = validate(&usage);
        assert!(report.is_valid());
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn structural_failures_carry_context() {
        let usage = usage_with(&[500.0, -10.0, 400.0], 30, DataQuality::Good, 90);
        let errors = check_structure(&usage);
        assert_eq!(
            errors,
            vec![
                UsageError::InsufficientHistory {
                    found: 3,
                    required: 6
                },
                UsageError::NegativeUsage {
                    month: "2024-02".into(),
                    total_kwh: -10.0
                },
                UsageError::ShortDateSpan {
                    found: 90,
                    required: 180
                },
            ]
        );
        let report = validate(&usage);
        assert!(!report.is_valid());
        assert_eq!(
            report.into_result().expect_err("blocking"),
            UsageError::InsufficientHistory {
                found: 3,
                required: 6
            }
        );
    }

    #[test]
    fn per_month_heuristics_fire() {
        let usage = usage_with(
            &[12_000.0, 0.0, 30.0, 600.0, 600.0, 600.0],
            15,
            DataQuality::Good,
            181,
        );
        let warnings = check_heuristics(&usage);

        assert!(warnings.contains(&UsageWarning::UnusuallyHigh {
            month: "2024-01".into(),
            total_kwh: 12_000.0
        }));
        assert!(warnings.contains(&UsageWarning::ZeroUsage {
            month: "2024-02".into()
        }));
        assert!(warnings.contains(&UsageWarning::VeryLow {
            month: "2024-03".into(),
            total_kwh: 30.0
        }));
        let incomplete = warnings
            .iter()
            .filter(|w| matches!(w, UsageWarning::Incomplete { .. }))
            .count();
        assert_eq!(incomplete, 6);
        assert!(warnings
            .iter()
            .any(|w| matches!(w, UsageWarning::HighVariation { .. })));
        // A zero month is not "low variation"; only positive minimums count.
        assert!(!warnings
            .iter()
            .any(|w| matches!(w, UsageWarning::LowVariation { .. })));
    }

    #[test]
    fn low_variation_needs_positive_minimum() {
        let usage = usage_with(
            &[700.0, 700.0, 700.0, 700.0, 700.0, 20.0],
            30,
            DataQuality::Good,
            181,
        );
        let warnings = check_heuristics(&usage);
        assert!(warnings
            .iter()
            .any(|w| matches!(w, UsageWarning::LowVariation { .. })));
        assert!(!warnings
            .iter()
            .any(|w| matches!(w, UsageWarning::HighVariation { .. })));
    }

    #[test]
    fn quality_score_deductions() {
        let full_year = usage_with(&[700.0; 12], 30, DataQuality::Good, 364);
        assert_eq!(quality_score(&full_year), 100);

        let fair_half_year = usage_with(&[700.0; 6], 30, DataQuality::Fair, 181);
        assert_eq!(quality_score(&fair_half_year), 67);
        assert_eq!(validate(&fair_half_year).confidence, Confidence::Medium);

        let poor_thin = usage_with(&[700.0; 6], 10, DataQuality::Poor, 181);
        assert_eq!(quality_score(&poor_thin), 22);
        assert_eq!(validate(&poor_thin).confidence, Confidence::Low);

        let floor = usage_with(&[700.0; 15], 5, DataQuality::Poor, 450);
        assert_eq!(quality_score(&floor), 0);
    }

    #[test]
    fn remediation_matches_by_category() {
        let zero = UsageWarning::ZeroUsage {
            month: "2024-02".into(),
        }
        .notice();
        assert_eq!(zero.severity, Severity::Important);
        assert!(zero.message.contains("2024-02"));

        let incomplete = remediation_for("Incomplete data for 2024-03: only 4 days recorded");
        assert_eq!(incomplete.severity, Severity::Warning);

        let fallback = remediation_for("something nobody anticipated");
        assert_eq!(fallback.severity, Severity::Info);
        assert!(fallback.action.starts_with("Review"));
    }
}
