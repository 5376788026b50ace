//! Plan scoring and shortlist selection.

use crate::catalog::CatalogSnapshot;
use crate::error::AppError;
use crate::models::{
    round2, Confidence, MonthlyUsage, Plan, PlanWithCosts, Recommendation, UserPreferences,
};
use crate::rates::annual_cost;
use tracing::{debug, info};

pub const MAX_RECOMMENDATIONS: usize = 3;

mod weights {
    /// Savings at or above this many dollars a year earn the full cost score.
    pub const FULL_SCORE_SAVINGS: f64 = 500.0;
    pub const SUPPLIER_RATING: f64 = 0.1;
    pub const MAX_SUPPLIER_RATING: f64 = 5.0;
}

mod diversity {
    /// cents/kWh
    pub const RATE_GAP: f64 = 1.0;
    /// percentage points
    pub const RENEWABLE_GAP: f64 = 20.0;
}

/// Annual cost of the user's current flat rate, priced with the candidate's
/// fee schedule since the user's real fees are usually unknown.
pub fn baseline_cost(current_rate: f64, candidate: &Plan, months: &[MonthlyUsage]) -> f64 {
    let current = Plan {
        rate: current_rate,
        rate_structure: None,
        ..candidate.clone()
    };
    annual_cost(&current, months)
}

pub fn calculate_savings(current_rate: f64, candidate: &Plan, months: &[MonthlyUsage]) -> f64 {
    round2(baseline_cost(current_rate, candidate, months) - annual_cost(candidate, months))
}

pub fn score_plan(
    savings: f64,
    renewable_percentage: f64,
    supplier_rating: f64,
    preferences: &UserPreferences,
) -> f64 {
    let cost_component = (savings / weights::FULL_SCORE_SAVINGS).clamp(0.0, 1.0);
    let renewable_component = renewable_percentage / 100.0;
    let supplier_component = supplier_rating / weights::MAX_SUPPLIER_RATING;

    preferences.cost_weight() * cost_component
        + preferences.renewable_weight() * renewable_component
        + weights::SUPPLIER_RATING * supplier_component
}

/// Cost and score every catalog plan, best first. Ties fall back to plan id so
/// the order never depends on catalog order.
pub fn rank_plans(
    catalog: &CatalogSnapshot,
    months: &[MonthlyUsage],
    current_rate: f64,
    preferences: &UserPreferences,
) -> Result<Vec<PlanWithCosts>, AppError> {
    catalog.ensure_non_empty()?;
    preferences.validate()?;

    let mut ranked: Vec<PlanWithCosts> = catalog
        .plans
        .iter()
        .map(|plan| {
            let annual = annual_cost(plan, months);
            let savings = calculate_savings(current_rate, plan, months);
            let score = score_plan(
                savings,
                plan.renewable_percentage,
                catalog.supplier_rating(&plan.supplier_id),
                preferences,
            );
            debug!(plan = %plan.id, annual, savings, score, "scored plan");
            PlanWithCosts {
                plan: plan.clone(),
                annual_cost: annual,
                savings,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.plan.id.cmp(&b.plan.id))
    });
    Ok(ranked)
}

fn is_diverse(candidate: &Plan, selected: &[PlanWithCosts]) -> bool {
    let new_supplier = selected
        .iter()
        .all(|s| s.plan.supplier_id != candidate.supplier_id);
    let distinct_rate = selected
        .iter()
        .all(|s| (s.plan.rate - candidate.rate).abs() > diversity::RATE_GAP);
    let distinct_renewable = selected.iter().all(|s| {
        (s.plan.renewable_percentage - candidate.renewable_percentage).abs()
            > diversity::RENEWABLE_GAP
    });
    new_supplier || distinct_rate || distinct_renewable
}

/// Take the best plan, then the next plans that differ from everything already
/// picked by supplier, rate or renewable share. Remaining slots are backfilled
/// by score.
pub fn select_diverse(ranked: &[PlanWithCosts], limit: usize) -> Vec<PlanWithCosts> {
    if limit == 0 || ranked.is_empty() {
        return Vec::new();
    }

    let mut picked = vec![false; ranked.len()];
    let mut selected = vec![ranked[0].clone()];
    picked[0] = true;

    for (index, candidate) in ranked.iter().enumerate().skip(1) {
        if selected.len() >= limit {
            break;
        }
        if is_diverse(&candidate.plan, &selected) {
            selected.push(candidate.clone());
            picked[index] = true;
        }
    }

    let diverse = selected.len();
    for (index, candidate) in ranked.iter().enumerate() {
        if selected.len() >= limit {
            break;
        }
        if !picked[index] {
            selected.push(candidate.clone());
            picked[index] = true;
        }
    }

    debug!(
        diverse,
        backfilled = selected.len() - diverse,
        "selected shortlist"
    );
    selected
}

pub fn explain(plan: &PlanWithCosts, preferences: &UserPreferences) -> String {
    let savings_clause = if plan.savings >= 0.005 {
        format!(
            "{} could save you about ${:.2} a year compared to your current rate.",
            plan.plan.name, plan.savings
        )
    } else if plan.savings <= -0.005 {
        format!(
            "{} would cost about ${:.2} more a year than your current rate.",
            plan.plan.name,
            plan.savings.abs()
        )
    } else {
        format!(
            "{} costs about the same as your current rate.",
            plan.plan.name
        )
    };

    let renewable = plan.plan.renewable_percentage;
    let renewable_clause = if renewable >= 100.0 {
        " It is powered by 100% renewable energy.".to_string()
    } else if renewable >= 50.0 {
        format!(" It includes {renewable:.0}% renewable energy.")
    } else {
        String::new()
    };

    let preference_clause = if preferences.cost_priority > preferences.renewable_priority {
        " It is a strong fit for a cost-conscious household."
    } else if preferences.renewable_priority > preferences.cost_priority {
        " It is a strong fit for an eco-conscious household."
    } else {
        " It balances cost and clean energy, matching your even priorities."
    };

    format!("{savings_clause}{renewable_clause}{preference_clause}")
}

pub fn recommend(
    catalog: &CatalogSnapshot,
    months: &[MonthlyUsage],
    current_rate: f64,
    preferences: &UserPreferences,
    confidence: Confidence,
) -> Result<Vec<Recommendation>, AppError> {
    let ranked = rank_plans(catalog, months, current_rate, preferences)?;
    let shortlist = select_diverse(&ranked, MAX_RECOMMENDATIONS);

    info!(
        candidates = ranked.len(),
        selected = shortlist.len(),
        "built recommendations"
    );

    Ok(shortlist
        .into_iter()
        .map(|plan| Recommendation {
            explanation: explain(&plan, preferences),
            plan,
            confidence,
        })
        .collect())
}
