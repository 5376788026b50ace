use crate::catalog::CatalogSnapshot;
use crate::error::AppError;
use crate::models::{
    Confidence, CurrentPlanData, ParsedUsageData, PlanWithScenarios, Recommendation,
    UserPreferences,
};
use crate::rates::{annual_cost, monthly_breakdown, MonthlyCost};
use crate::recommend::{baseline_cost, recommend};
use crate::scenarios::build_scenarios;
use crate::usage::parse_feed;
use crate::validation::{validate, ValidationReport, WarningNotice};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// A usage history that passed every blocking check.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAnalysis {
    pub usage: ParsedUsageData,
    pub validation: ValidationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    #[serde(flatten)]
    pub usage: ParsedUsageData,
    pub total_kwh: f64,
    pub quality_score: u8,
    pub confidence: Confidence,
    pub warnings: Vec<WarningNotice>,
}

impl UsageAnalysis {
    pub fn summary(&self) -> UsageSummary {
        UsageSummary {
            usage: self.usage.clone(),
            total_kwh: self.usage.total_kwh(),
            quality_score: self.validation.quality_score,
            confidence: self.validation.confidence,
            warnings: self.validation.notices(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdviceRequest {
    pub current: CurrentPlanData,
    pub preferences: UserPreferences,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceReport {
    pub quality_score: u8,
    pub confidence: Confidence,
    pub warnings: Vec<WarningNotice>,
    pub recommendations: Vec<Recommendation>,
    pub scenarios: Vec<PlanWithScenarios>,
    pub catalog_fetched_at: DateTime<Utc>,
    pub catalog_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCostReport {
    pub plan_id: String,
    pub plan_name: String,
    pub rate_type: &'static str,
    pub months: Vec<MonthlyCost>,
    pub annual_cost: f64,
}

pub struct Advisor {
    max_catalog_age: Duration,
}

impl Advisor {
    pub fn new(max_catalog_age: Duration) -> Self {
        Self { max_catalog_age }
    }

    pub fn analyze_usage(&self, feed_xml: &str) -> Result<UsageAnalysis, AppError> {
        let usage = parse_feed(feed_xml)?;
        let validation = validate(&usage).into_result()?;
        info!(
            months = usage.monthly_totals.len(),
            quality = usage.data_quality.as_label(),
            score = validation.quality_score,
            warnings = validation.warnings.len(),
            "usage history accepted"
        );
        Ok(UsageAnalysis { usage, validation })
    }

    fn check_freshness(&self, catalog: &CatalogSnapshot, now: DateTime<Utc>) -> bool {
        let stale = catalog.is_stale(self.max_catalog_age, now);
        if stale {
            warn!(
                fetched_at = %catalog.fetched_at,
                age_hours = catalog.age(now).num_hours(),
                "plan catalog is stale; using it anyway"
            );
        }
        stale
    }

    pub fn advise(
        &self,
        analysis: &UsageAnalysis,
        catalog: &CatalogSnapshot,
        request: &AdviceRequest,
    ) -> Result<AdviceReport, AppError> {
        let catalog_stale = self.check_freshness(catalog, request.now);
        let months = &analysis.usage.monthly_totals;

        let recommendations = recommend(
            catalog,
            months,
            request.current.rate,
            &request.preferences,
            analysis.validation.confidence,
        )?;

        let today = request.now.date_naive();
        let scenarios = recommendations
            .iter()
            .map(|rec| {
                let baseline = baseline_cost(request.current.rate, &rec.plan.plan, months);
                build_scenarios(&rec.plan, baseline, &request.current, today)
            })
            .collect();

        Ok(AdviceReport {
            quality_score: analysis.validation.quality_score,
            confidence: analysis.validation.confidence,
            warnings: analysis.validation.notices(),
            recommendations,
            scenarios,
            catalog_fetched_at: catalog.fetched_at,
            catalog_stale,
        })
    }

    pub fn plan_cost(
        &self,
        analysis: &UsageAnalysis,
        catalog: &CatalogSnapshot,
        plan_id: &str,
    ) -> Result<PlanCostReport, AppError> {
        let plan = catalog.find_plan(plan_id)?;
        let months = &analysis.usage.monthly_totals;
        Ok(PlanCostReport {
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            rate_type: plan
                .rate_structure
                .as_ref()
                .map_or("fixed", |s| s.as_label()),
            months: monthly_breakdown(plan, months),
            annual_cost: annual_cost(plan, months),
        })
    }
}
