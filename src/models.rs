use crate::error::{AppError, UsageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_HISTORY_MONTHS: usize = 6;

/// Round a dollar or kWh figure to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One metered interval, already converted to kWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalReading {
    pub timestamp: DateTime<Utc>,
    pub kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUsage {
    /// `YYYY-MM`
    pub month_key: String,
    pub total_kwh: f64,
    pub days_with_data: u32,
    pub average_daily: f64,
}

impl MonthlyUsage {
    /// Calendar month (1-12) of this bucket, if the key is well formed.
    pub fn calendar_month(&self) -> Option<u32> {
        self.month_key
            .get(5..7)?
            .parse()
            .ok()
            .filter(|m| (1..=12).contains(m))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Good,
    Fair,
    Poor,
}

impl DataQuality {
    pub fn from_completeness(ratio: f64) -> Self {
        if ratio >= 0.8 {
            DataQuality::Good
        } else if ratio >= 0.5 {
            DataQuality::Fair
        } else {
            DataQuality::Poor
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            DataQuality::Good => "good",
            DataQuality::Fair => "fair",
            DataQuality::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedUsageData {
    pub monthly_totals: Vec<MonthlyUsage>,
    pub data_quality: DataQuality,
    pub date_range: DateRange,
}

impl ParsedUsageData {
    pub fn new(
        monthly_totals: Vec<MonthlyUsage>,
        data_quality: DataQuality,
        date_range: DateRange,
    ) -> Result<Self, UsageError> {
        if monthly_totals.len() < MIN_HISTORY_MONTHS {
            return Err(UsageError::InsufficientHistory {
                found: monthly_totals.len(),
                required: MIN_HISTORY_MONTHS,
            });
        }
        Ok(Self {
            monthly_totals,
            data_quality,
            date_range,
        })
    }

    pub fn total_kwh(&self) -> f64 {
        self.monthly_totals.iter().map(|m| m.total_kwh).sum()
    }
}

/// Set of calendar months stored as a 12-bit mask (bit 0 = January).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct MonthSet(u16);

impl MonthSet {
    pub fn from_months(months: impl IntoIterator<Item = u32>) -> Self {
        let mask = months
            .into_iter()
            .filter(|m| (1..=12).contains(m))
            .fold(0u16, |mask, m| mask | (1 << (m - 1)));
        Self(mask)
    }

    pub fn contains(self, month: u32) -> bool {
        (1..=12).contains(&month) && self.0 & (1 << (month - 1)) != 0
    }

    pub fn months(self) -> Vec<u32> {
        (1..=12).filter(|m| self.contains(*m)).collect()
    }
}

impl From<Vec<u32>> for MonthSet {
    fn from(months: Vec<u32>) -> Self {
        Self::from_months(months)
    }
}

impl From<MonthSet> for Vec<u32> {
    fn from(set: MonthSet) -> Self {
        set.months()
    }
}

fn default_summer_months() -> MonthSet {
    MonthSet::from_months([6, 7, 8, 9])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub min_kwh: f64,
    /// `None` marks the open-ended top band.
    #[serde(default)]
    pub max_kwh: Option<f64>,
    /// cents/kWh
    pub rate_per_kwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Pricing rule of a plan. All rates are cents/kWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RateStructure {
    Fixed,
    Tiered {
        tiers: Vec<Tier>,
    },
    #[serde(rename = "tou")]
    TimeOfUse {
        peak_window: PeakWindow,
        #[serde(default)]
        peak_rate: Option<f64>,
        off_peak_rate: f64,
        #[serde(default)]
        super_off_peak_rate: Option<f64>,
    },
    Variable {
        base_rate: f64,
        cap_min: f64,
        cap_max: f64,
        /// Indexed by calendar month, January first. Missing months use 1.0.
        #[serde(default)]
        seasonal_multipliers: Vec<f64>,
    },
    Seasonal {
        summer_rate: f64,
        winter_rate: f64,
        #[serde(default = "default_summer_months")]
        summer_months: MonthSet,
    },
}

impl RateStructure {
    pub fn as_label(&self) -> &'static str {
        match self {
            RateStructure::Fixed => "fixed",
            RateStructure::Tiered { .. } => "tiered",
            RateStructure::TimeOfUse { .. } => "tou",
            RateStructure::Variable { .. } => "variable",
            RateStructure::Seasonal { .. } => "seasonal",
        }
    }
}

/// Monthly fees in dollars.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Fees {
    pub delivery: f64,
    pub admin: f64,
}

impl Fees {
    pub fn monthly_total(self) -> f64 {
        self.delivery + self.admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub name: String,
    /// Flat fallback rate, cents/kWh.
    pub rate: f64,
    pub renewable_percentage: f64,
    pub fees: Fees,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_structure: Option<RateStructure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWithCosts {
    #[serde(flatten)]
    pub plan: Plan,
    pub annual_cost: f64,
    pub savings: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    StayCurrent,
    SwitchNow,
    WaitAndSwitch,
}

impl ScenarioKind {
    pub fn as_label(self) -> &'static str {
        match self {
            ScenarioKind::StayCurrent => "stay-current",
            ScenarioKind::SwitchNow => "switch-now",
            ScenarioKind::WaitAndSwitch => "wait-and-switch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostScenario {
    #[serde(rename = "type")]
    pub kind: ScenarioKind,
    pub description: String,
    pub annual_cost: f64,
    pub net_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWithScenarios {
    #[serde(flatten)]
    pub plan: PlanWithCosts,
    pub scenarios: Vec<CostScenario>,
    pub recommended_scenario: ScenarioKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlanData {
    pub supplier: String,
    /// cents/kWh
    pub rate: f64,
    /// `MM/YYYY`
    #[serde(default)]
    pub contract_end_date: Option<String>,
    #[serde(default)]
    pub contract_length: Option<u32>,
    #[serde(default)]
    pub early_termination_fee: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub cost_priority: f64,
    pub renewable_priority: f64,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            cost_priority: 50.0,
            renewable_priority: 50.0,
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> Result<(), AppError> {
        let in_range = (0.0..=100.0).contains(&self.cost_priority)
            && (0.0..=100.0).contains(&self.renewable_priority);
        if !in_range || (self.cost_priority + self.renewable_priority - 100.0).abs() > 0.01 {
            return Err(AppError::InvalidPreferences {
                cost: self.cost_priority,
                renewable: self.renewable_priority,
            });
        }
        Ok(())
    }

    pub fn cost_weight(&self) -> f64 {
        self.cost_priority / 100.0
    }

    pub fn renewable_weight(&self) -> f64 {
        self.renewable_priority / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Confidence::High
        } else if score >= 50 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub plan: PlanWithCosts,
    pub explanation: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRating {
    pub id: String,
    pub rating: f64,
}
