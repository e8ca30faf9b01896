use std::collections::HashSet;

use chrono::{Months, NaiveDate};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::model::{Lease, RentIncrease};
use crate::repository::{payments, rent_increases};

/// One billing period the generator intends to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPlan {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount: i64,
}

/// `anchor + months`, with the day-of-month clamped to short months.
/// Always computed from the anchor, never iteratively, so a lease
/// anchored on the 31st bills on the 31st again after February.
pub fn period_start_at(anchor: NaiveDate, months: u32) -> NaiveDate {
    anchor
        .checked_add_months(Months::new(months))
        .unwrap_or(anchor)
}

/// The rent applicable on `on`: the newest step whose effective date is
/// not after `on`, else the rent before any step.
pub fn rent_in_effect(initial_rent: i64, steps: &[(NaiveDate, i64)], on: NaiveDate) -> i64 {
    steps
        .iter()
        .take_while(|(effective_on, _)| *effective_on <= on)
        .last()
        .map(|(_, rent)| *rent)
        .unwrap_or(initial_rent)
}

/// Derive the periods that are due but not yet materialized.
///
/// Periods run monthly from `first_payment_on` while the period start is
/// within both the lease (`< ends_on`) and the generation horizon.
/// Already-present starts are skipped, so re-running over the same
/// window is a no-op. Output is ascending with no gaps among the
/// missing periods.
pub fn plan_periods(
    first_payment_on: NaiveDate,
    ends_on: NaiveDate,
    initial_rent: i64,
    steps: &[(NaiveDate, i64)],
    existing_starts: &HashSet<NaiveDate>,
    horizon: NaiveDate,
) -> Vec<PeriodPlan> {
    let mut plans = Vec::new();
    let mut last_start: Option<NaiveDate> = None;
    for index in 0u32.. {
        let period_start = period_start_at(first_payment_on, index);
        if period_start > horizon || period_start >= ends_on {
            break;
        }
        // Past the calendar's end the addition saturates to the anchor;
        // stop once starts no longer advance.
        if last_start.is_some_and(|prev| period_start <= prev) {
            break;
        }
        last_start = Some(period_start);
        let next_start = period_start_at(first_payment_on, index + 1);
        let period_end = if next_start > period_start {
            std::cmp::min(next_start.pred_opt().unwrap_or(next_start), ends_on)
        } else {
            ends_on
        };
        if existing_starts.contains(&period_start) {
            continue;
        }
        plans.push(PeriodPlan {
            period_start,
            period_end,
            amount: rent_in_effect(initial_rent, steps, period_start),
        });
    }
    plans
}

/// Rent before any recorded increase. With history present the earliest
/// step's old rent is authoritative; `lease.monthly_rent` already
/// reflects the newest step.
pub fn initial_rent(lease_rent: i64, increases: &[RentIncrease]) -> i64 {
    increases.first().map(|step| step.old_rent).unwrap_or(lease_rent)
}

/// Materialize every due-but-unbilled period for an active lease, inside
/// the caller's transaction. Returns the number of payments created.
///
/// Callers hold the lease lock; the partial unique index on pending
/// (lease_id, period_start) backs this up against lost races.
pub async fn ensure_schedule_tx(
    tx: &mut PgConnection,
    lease: &Lease,
    today: NaiveDate,
    lookahead_months: u32,
) -> Result<u32, AppError> {
    let increases =
        rent_increases::list_for_lease(&mut *tx, lease.organization_id, lease.id).await?;
    let existing = payments::existing_period_starts(&mut *tx, lease.organization_id, lease.id)
        .await?
        .into_iter()
        .collect::<HashSet<_>>();

    let steps = increases
        .iter()
        .map(|step| (step.effective_on, step.new_rent))
        .collect::<Vec<_>>();
    let horizon = today
        .checked_add_months(Months::new(lookahead_months))
        .unwrap_or(today);

    let plans = plan_periods(
        lease.effective_first_payment_on(),
        lease.ends_on,
        initial_rent(lease.monthly_rent, &increases),
        &steps,
        &existing,
        horizon,
    );

    let mut created = 0u32;
    for plan in &plans {
        payments::insert_pending(
            &mut *tx,
            lease.organization_id,
            lease.id,
            plan.amount,
            plan.period_start,
            plan.period_end,
        )
        .await?;
        created += 1;
    }

    if created > 0 {
        tracing::info!(
            lease_id = %lease.id,
            org_id = %lease.organization_id,
            created,
            "Generated pending payment periods"
        );
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;

    use super::{period_start_at, plan_periods, rent_in_effect, PeriodPlan};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn anchors_clamp_and_recover() {
        let anchor = date(2024, 1, 31);
        assert_eq!(period_start_at(anchor, 1), date(2024, 2, 29));
        // March recovers the original anchor day.
        assert_eq!(period_start_at(anchor, 2), date(2024, 3, 31));
        assert_eq!(period_start_at(anchor, 3), date(2024, 4, 30));
    }

    #[test]
    fn plans_every_period_up_to_horizon_in_order() {
        let plans = plan_periods(
            date(2024, 1, 1),
            date(2025, 1, 1),
            1_000_000,
            &[],
            &HashSet::new(),
            date(2024, 4, 15),
        );
        assert_eq!(
            plans,
            vec![
                PeriodPlan {
                    period_start: date(2024, 1, 1),
                    period_end: date(2024, 1, 31),
                    amount: 1_000_000,
                },
                PeriodPlan {
                    period_start: date(2024, 2, 1),
                    period_end: date(2024, 2, 29),
                    amount: 1_000_000,
                },
                PeriodPlan {
                    period_start: date(2024, 3, 1),
                    period_end: date(2024, 3, 31),
                    amount: 1_000_000,
                },
                PeriodPlan {
                    period_start: date(2024, 4, 1),
                    period_end: date(2024, 4, 30),
                    amount: 1_000_000,
                },
            ]
        );
    }

    #[test]
    fn replanning_with_existing_periods_is_a_noop() {
        let first = plan_periods(
            date(2024, 1, 1),
            date(2025, 1, 1),
            1_000_000,
            &[],
            &HashSet::new(),
            date(2024, 3, 15),
        );
        let existing = first.iter().map(|p| p.period_start).collect::<HashSet<_>>();
        let second = plan_periods(
            date(2024, 1, 1),
            date(2025, 1, 1),
            1_000_000,
            &[],
            &existing,
            date(2024, 3, 15),
        );
        assert!(second.is_empty());
    }

    #[test]
    fn fills_only_missing_periods_without_duplicates() {
        let existing = [date(2024, 1, 1), date(2024, 3, 1)]
            .into_iter()
            .collect::<HashSet<_>>();
        let plans = plan_periods(
            date(2024, 1, 1),
            date(2025, 1, 1),
            1_000_000,
            &[],
            &existing,
            date(2024, 3, 15),
        );
        assert_eq!(
            plans.iter().map(|p| p.period_start).collect::<Vec<_>>(),
            vec![date(2024, 2, 1)]
        );
    }

    #[test]
    fn never_plans_beyond_lease_end() {
        let plans = plan_periods(
            date(2024, 1, 1),
            date(2024, 3, 1),
            1_000_000,
            &[],
            &HashSet::new(),
            date(2024, 12, 31),
        );
        // No period begins on or after the end date; the last period is
        // clamped to it.
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].period_start, date(2024, 2, 1));
        assert_eq!(plans[1].period_end, date(2024, 2, 29));
    }

    #[test]
    fn never_plans_before_first_payment_date() {
        // Migrated contract: obligations begin mid-life, nothing
        // retroactive.
        let plans = plan_periods(
            date(2024, 6, 15),
            date(2025, 6, 15),
            1_000_000,
            &[],
            &HashSet::new(),
            date(2024, 8, 1),
        );
        assert_eq!(plans[0].period_start, date(2024, 6, 15));
        assert_eq!(plans[0].period_end, date(2024, 7, 14));
        assert!(plans.iter().all(|p| p.period_start >= date(2024, 6, 15)));
    }

    #[test]
    fn stops_at_the_end_of_the_calendar() {
        // A start date one month short of the representable maximum:
        // the next month exists but the one after does not, so the
        // planner must terminate rather than repeat the last start.
        let first = NaiveDate::MAX
            .checked_sub_months(chrono::Months::new(1))
            .expect("valid date");
        let plans = plan_periods(
            first,
            NaiveDate::MAX,
            1_000_000,
            &[],
            &HashSet::new(),
            NaiveDate::MAX,
        );
        assert_eq!(plans.len(), 2);
        assert!(plans.windows(2).all(|w| w[0].period_start < w[1].period_start));
        assert!(plans.iter().all(|p| p.period_end >= p.period_start));
    }

    #[test]
    fn prices_periods_with_the_rent_in_effect() {
        let steps = vec![(date(2024, 3, 1), 1_100_000), (date(2024, 6, 1), 1_250_000)];
        assert_eq!(rent_in_effect(1_000_000, &steps, date(2024, 1, 1)), 1_000_000);
        assert_eq!(rent_in_effect(1_000_000, &steps, date(2024, 3, 1)), 1_100_000);
        assert_eq!(rent_in_effect(1_000_000, &steps, date(2024, 5, 31)), 1_100_000);
        assert_eq!(rent_in_effect(1_000_000, &steps, date(2024, 7, 1)), 1_250_000);

        let plans = plan_periods(
            date(2024, 1, 1),
            date(2025, 1, 1),
            1_000_000,
            &steps,
            &HashSet::new(),
            date(2024, 3, 15),
        );
        assert_eq!(plans[0].amount, 1_000_000);
        assert_eq!(plans[1].amount, 1_000_000);
        assert_eq!(plans[2].amount, 1_100_000);
    }
}
