//! Stay / switch-now / wait-and-switch projections for a candidate plan.

use crate::models::{
    round2, CostScenario, CurrentPlanData, PlanWithCosts, PlanWithScenarios, ScenarioKind,
};
use chrono::{Datelike, NaiveDate};

pub const PROJECTION_MONTHS: u32 = 12;
const MIN_CONTRACT_YEAR: i32 = 1900;
const MAX_CONTRACT_YEAR: i32 = 2100;

/// Strict `MM/YYYY` parse into the first day of that month. The month must be
/// zero-padded and no surrounding whitespace is accepted.
pub fn parse_contract_date(raw: &str) -> Option<NaiveDate> {
    let (month, year) = raw.split_once('/')?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if month.len() != 2 || !digits(month) || year.len() != 4 || !digits(year) {
        return None;
    }

    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    if !(MIN_CONTRACT_YEAR..=MAX_CONTRACT_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Whole calendar months from `today` until the contract's end month, never negative.
pub fn months_remaining(end: NaiveDate, today: NaiveDate) -> u32 {
    let months = (end.year() - today.year()) * 12 + end.month() as i32 - today.month() as i32;
    months.max(0) as u32
}

fn scenario(
    kind: ScenarioKind,
    description: String,
    annual_cost: f64,
    baseline: f64,
) -> CostScenario {
    CostScenario {
        kind,
        description,
        annual_cost,
        net_savings: round2(baseline - annual_cost),
    }
}

/// `baseline` is what the current rate costs over the same usage history.
pub fn build_scenarios(
    candidate: &PlanWithCosts,
    baseline: f64,
    current: &CurrentPlanData,
    today: NaiveDate,
) -> PlanWithScenarios {
    let name = &candidate.plan.name;
    let mut scenarios = vec![CostScenario {
        kind: ScenarioKind::StayCurrent,
        description: format!("Stay with {} at {:.2}c/kWh", current.supplier, current.rate),
        annual_cost: baseline,
        net_savings: 0.0,
    }];

    let termination_fee = current.early_termination_fee.unwrap_or(0.0).max(0.0);
    let switch_description = if termination_fee > 0.0 {
        format!("Switch to {name} now, paying a ${termination_fee:.2} early termination fee")
    } else {
        format!("Switch to {name} now")
    };
    scenarios.push(scenario(
        ScenarioKind::SwitchNow,
        switch_description,
        round2(candidate.annual_cost + termination_fee),
        baseline,
    ));

    if let Some(end) = current
        .contract_end_date
        .as_deref()
        .and_then(parse_contract_date)
    {
        let waiting = months_remaining(end, today).min(PROJECTION_MONTHS);
        let after = PROJECTION_MONTHS - waiting;
        let monthly_baseline = baseline / f64::from(PROJECTION_MONTHS);
        let monthly_candidate = candidate.annual_cost / f64::from(PROJECTION_MONTHS);
        let annual = round2(
            monthly_baseline * f64::from(waiting) + monthly_candidate * f64::from(after),
        );
        scenarios.push(scenario(
            ScenarioKind::WaitAndSwitch,
            format!(
                "Wait {waiting} months for your contract to end in {}, then switch to {name}",
                end.format("%m/%Y")
            ),
            annual,
            baseline,
        ));
    }

    let recommended_scenario = scenarios
        .iter()
        .min_by(|a, b| a.annual_cost.total_cmp(&b.annual_cost))
        .map_or(ScenarioKind::StayCurrent, |s| s.kind);

    PlanWithScenarios {
        plan: candidate.clone(),
        scenarios,
        recommended_scenario,
    }
}
