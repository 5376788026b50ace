use crate::models::{round2, MonthlyUsage, Plan, RateStructure, Tier};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCost {
    pub month_key: String,
    pub kwh: f64,
    pub energy_cost: f64,
    pub fees: f64,
}

impl MonthlyCost {
    pub fn total(&self) -> f64 {
        self.energy_cost + self.fees
    }
}

fn flat_energy_cost(rate_cents: f64, kwh: f64) -> f64 {
    rate_cents / 100.0 * kwh
}

/// Bands are bounded by their upper limits; the last band takes everything
/// above the previous limit regardless of its own `max_kwh`.
fn tiered_energy_cost(tiers: &[Tier], fallback_rate: f64, kwh: f64) -> f64 {
    if tiers.is_empty() {
        return flat_energy_cost(fallback_rate, kwh);
    }

    let mut ordered: Vec<&Tier> = tiers.iter().collect();
    ordered.sort_by(|a, b| a.min_kwh.total_cmp(&b.min_kwh));

    let last = ordered.len() - 1;
    let mut floor = 0.0;
    let mut cost = 0.0;
    for (index, tier) in ordered.into_iter().enumerate() {
        if kwh <= floor {
            break;
        }
        let ceiling = match tier.max_kwh {
            Some(max) if index < last => max,
            _ => f64::INFINITY,
        };
        let band = kwh.min(ceiling) - floor;
        if band > 0.0 {
            cost += flat_energy_cost(tier.rate_per_kwh, band);
        }
        floor = floor.max(ceiling);
    }
    cost
}

fn variable_rate(
    base_rate: f64,
    cap_min: f64,
    cap_max: f64,
    multipliers: &[f64],
    month: Option<u32>,
) -> f64 {
    let multiplier = month
        .and_then(|m| multipliers.get(m as usize - 1))
        .copied()
        .unwrap_or(1.0);
    let (low, high) = if cap_min <= cap_max {
        (cap_min, cap_max)
    } else {
        (cap_max, cap_min)
    };
    (base_rate * multiplier).max(low).min(high)
}

pub fn monthly_energy_cost(plan: &Plan, usage: &MonthlyUsage) -> f64 {
    let kwh = usage.total_kwh;
    match &plan.rate_structure {
        None | Some(RateStructure::Fixed) => flat_energy_cost(plan.rate, kwh),
        Some(RateStructure::Tiered { tiers }) => tiered_energy_cost(tiers, plan.rate, kwh),
        // Monthly totals have no hour-of-day shape, so peak windows cannot be
        // priced. Always bill the flat rate.
        Some(RateStructure::TimeOfUse { .. }) => flat_energy_cost(plan.rate, kwh),
        Some(RateStructure::Variable {
            base_rate,
            cap_min,
            cap_max,
            seasonal_multipliers,
        }) => {
            let rate = variable_rate(
                *base_rate,
                *cap_min,
                *cap_max,
                seasonal_multipliers,
                usage.calendar_month(),
            );
            flat_energy_cost(rate, kwh)
        }
        Some(RateStructure::Seasonal {
            summer_rate,
            winter_rate,
            summer_months,
        }) => {
            let in_summer = usage
                .calendar_month()
                .is_some_and(|m| summer_months.contains(m));
            let rate = if in_summer { *summer_rate } else { *winter_rate };
            flat_energy_cost(rate, kwh)
        }
    }
}

pub fn monthly_breakdown(plan: &Plan, months: &[MonthlyUsage]) -> Vec<MonthlyCost> {
    months
        .iter()
        .map(|usage| MonthlyCost {
            month_key: usage.month_key.clone(),
            kwh: usage.total_kwh,
            energy_cost: monthly_energy_cost(plan, usage),
            fees: plan.fees.monthly_total(),
        })
        .collect()
}

/// Energy plus fees over every available month, rounded once at the end.
pub fn annual_cost(plan: &Plan, months: &[MonthlyUsage]) -> f64 {
    let total: f64 = months
        .iter()
        .map(|usage| monthly_energy_cost(plan, usage) + plan.fees.monthly_total())
        .sum();
    round2(total)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Fees, MonthlyUsage, Plan, RateStructure};

    pub fn months(year: i32, totals: &[f64]) -> Vec<MonthlyUsage> {
        totals
            .iter()
            .enumerate()
            .map(|(i, total)| MonthlyUsage {
                month_key: format!("{year}-{:02}", i + 1),
                total_kwh: *total,
                days_with_data: 30,
                average_daily: total / 30.0,
            })
            .collect()
    }

    pub fn plan(id: &str, supplier: &str, rate: f64, renewable: f64) -> Plan {
        Plan {
            id: id.to_string(),
            supplier_id: supplier.to_string(),
            supplier_name: supplier.to_uppercase(),
            name: format!("{} {}", supplier.to_uppercase(), id),
            rate,
            renewable_percentage: renewable,
            fees: Fees {
                delivery: 3.5,
                admin: 5.0,
            },
            rate_structure: None,
        }
    }

    pub fn with_structure(mut plan: Plan, structure: RateStructure) -> Plan {
        plan.rate_structure = Some(structure);
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{months, plan, with_structure};
    use super::*;
    use crate::models::{MonthSet, PeakWindow};
    use approx::assert_abs_diff_eq;

    fn three_tiers() -> Vec<Tier> {
        vec![
            Tier {
                min_kwh: 0.0,
                max_kwh: Some(500.0),
                rate_per_kwh: 8.0,
            },
            Tier {
                min_kwh: 501.0,
                max_kwh: Some(1000.0),
                rate_per_kwh: 12.0,
            },
            Tier {
                min_kwh: 1001.0,
                max_kwh: None,
                rate_per_kwh: 15.0,
            },
        ]
    }

    #[test]
    fn fixed_rate_annual_cost() {
        let usage = months(2024, &[850.0, 780.0, 720.0, 680.0, 620.0, 580.0]);
        let fixed = plan("p1", "acme", 12.5, 0.0);
        assert_eq!(annual_cost(&fixed, &usage), 579.75);
    }

    #[test]
    fn tiered_month_splits_across_bands() {
        let tiered = with_structure(
            plan("p1", "acme", 10.0, 0.0),
            RateStructure::Tiered {
                tiers: three_tiers(),
            },
        );
        let usage = &months(2024, &[750.0])[0];
        assert_abs_diff_eq!(monthly_energy_cost(&tiered, usage), 70.0, epsilon = 1e-9);

        let heavy = &months(2024, &[1200.0])[0];
        // 500 @ 8 + 500 @ 12 + 200 @ 15
        assert_abs_diff_eq!(monthly_energy_cost(&tiered, heavy), 130.0, epsilon = 1e-9);
    }

    #[test]
    fn last_tier_absorbs_excess_even_when_capped() {
        let mut tiers = three_tiers();
        tiers[2].max_kwh = Some(1500.0);
        let tiered = with_structure(plan("p1", "acme", 10.0, 0.0), RateStructure::Tiered { tiers });
        let usage = &months(2024, &[2000.0])[0];
        // 500 @ 8 + 500 @ 12 + 1000 @ 15
        assert_abs_diff_eq!(monthly_energy_cost(&tiered, usage), 250.0, epsilon = 1e-9);
    }

    #[test]
    fn out_of_order_tier_bounds_never_bill_twice() {
        let tiers = vec![
            Tier {
                min_kwh: 0.0,
                max_kwh: Some(500.0),
                rate_per_kwh: 10.0,
            },
            Tier {
                min_kwh: 100.0,
                max_kwh: Some(200.0),
                rate_per_kwh: 20.0,
            },
            Tier {
                min_kwh: 600.0,
                max_kwh: None,
                rate_per_kwh: 30.0,
            },
        ];
        let tiered = with_structure(plan("p1", "acme", 10.0, 0.0), RateStructure::Tiered { tiers });
        let usage = &months(2024, &[600.0])[0];
        // 500 @ 10, the middle band is behind the floor, 100 @ 30
        assert_abs_diff_eq!(monthly_energy_cost(&tiered, usage), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn tiered_cost_is_monotonic_in_usage() {
        let tiered = with_structure(
            plan("p1", "acme", 10.0, 0.0),
            RateStructure::Tiered {
                tiers: three_tiers(),
            },
        );
        let mut previous = 0.0;
        for kwh in (0..3000).step_by(25) {
            let usage = &months(2024, &[f64::from(kwh)])[0];
            let cost = monthly_energy_cost(&tiered, usage);
            assert!(cost >= previous, "cost dropped at {kwh} kWh");
            previous = cost;
        }
    }

    #[test]
    fn empty_tiers_fall_back_to_flat_rate() {
        let tiered = with_structure(
            plan("p1", "acme", 10.0, 0.0),
            RateStructure::Tiered { tiers: vec![] },
        );
        let usage = &months(2024, &[400.0])[0];
        assert_abs_diff_eq!(monthly_energy_cost(&tiered, usage), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn time_of_use_bills_the_flat_rate() {
        let tou = with_structure(
            plan("p1", "acme", 11.0, 0.0),
            RateStructure::TimeOfUse {
                peak_window: PeakWindow {
                    start_hour: 16,
                    end_hour: 21,
                },
                peak_rate: Some(30.0),
                off_peak_rate: 6.0,
                super_off_peak_rate: Some(3.0),
            },
        );
        let flat = plan("p2", "acme", 11.0, 0.0);
        let usage = months(2024, &[900.0, 800.0, 700.0, 600.0, 500.0, 400.0]);
        assert_eq!(annual_cost(&tou, &usage), annual_cost(&flat, &usage));
    }

    #[test]
    fn variable_rate_uses_month_multiplier_within_caps() {
        let mut multipliers = vec![1.0; 12];
        multipliers[0] = 2.0; // January spikes past the cap
        multipliers[6] = 0.5; // July dips under the floor
        multipliers[2] = 1.1;
        let variable = with_structure(
            plan("p1", "acme", 99.0, 0.0),
            RateStructure::Variable {
                base_rate: 10.0,
                cap_min: 8.0,
                cap_max: 15.0,
                seasonal_multipliers: multipliers,
            },
        );
        let usage = months(2024, &[100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0]);
        assert_abs_diff_eq!(monthly_energy_cost(&variable, &usage[0]), 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(monthly_energy_cost(&variable, &usage[1]), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(monthly_energy_cost(&variable, &usage[2]), 11.0, epsilon = 1e-9);
        assert_abs_diff_eq!(monthly_energy_cost(&variable, &usage[6]), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn seasonal_rate_follows_month_set() {
        let seasonal = with_structure(
            plan("p1", "acme", 99.0, 0.0),
            RateStructure::Seasonal {
                summer_rate: 20.0,
                winter_rate: 10.0,
                summer_months: MonthSet::from_months([6, 7, 8]),
            },
        );
        let usage = months(2024, &[100.0; 8]);
        assert_abs_diff_eq!(monthly_energy_cost(&seasonal, &usage[4]), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(monthly_energy_cost(&seasonal, &usage[5]), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(monthly_energy_cost(&seasonal, &usage[7]), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn fees_are_charged_even_for_zero_usage() {
        let fixed = plan("p1", "acme", 12.0, 0.0);
        let usage = months(2024, &[0.0, 0.0]);
        assert_eq!(annual_cost(&fixed, &usage), 17.0);
    }

    #[test]
    fn calculation_is_idempotent() {
        let tiered = with_structure(
            plan("p1", "acme", 10.0, 0.0),
            RateStructure::Tiered {
                tiers: three_tiers(),
            },
        );
        let usage = months(2024, &[1234.5, 987.6, 543.2, 1500.1, 20.0, 800.0]);
        let first = annual_cost(&tiered, &usage);
        let second = annual_cost(&tiered, &usage);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn breakdown_sums_to_annual_cost() {
        let fixed = plan("p1", "acme", 13.0, 0.0);
        let usage = months(2024, &[850.0, 780.0, 720.0, 680.0, 620.0, 580.0]);
        let breakdown = monthly_breakdown(&fixed, &usage);
        assert_eq!(breakdown.len(), 6);
        let sum: f64 = breakdown.iter().map(MonthlyCost::total).sum();
        assert_abs_diff_eq!(round2(sum), annual_cost(&fixed, &usage));
    }
}
