//! Priority-ordered payment distribution
//!
//! The pure part of the allocation engine. Given a payment amount and a
//! student's active balances, walk the balances in `(priority, vote head id)`
//! order and clear each one before moving to the next.
//!
//! - Balances at or below zero are skipped, the walk continues past them.
//! - The walk stops as soon as the payment is used up.
//! - Whatever is left after the walk is debited from the last balance in
//!   iteration order, leaving it negative (credit carried forward).
//! - With no balances at all the remainder has nowhere to go and is dropped.
//!
//! Only the walk produces allocation rows; the credit debit does not.

use chrono::{DateTime, Utc};

use core_kernel::{Money, PaymentId};

use crate::balance::{sort_for_allocation, PrioritizedBalance};
use crate::payment::PaymentAllocation;

/// Result of distributing one payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// Allocation rows, in the order the vote heads were cleared
    pub allocations: Vec<PaymentAllocation>,
    /// Indices of balances whose amount changed, ascending
    pub touched: Vec<usize>,
    /// Overpayment debited from the last balance as credit
    pub credit: Money,
    /// Overpayment that had no balance to land on
    pub dropped: Money,
}

impl AllocationPlan {
    /// Sum of the allocation row amounts
    pub fn allocated(&self) -> Money {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Distributes `amount` across `balances`, mutating them in place
///
/// The slice is sorted into allocation order first, so indices in the
/// returned plan refer to the sorted slice. A non-positive amount produces an
/// empty plan and leaves every balance untouched; callers reject such amounts
/// before reaching here.
pub fn distribute(
    payment_id: PaymentId,
    amount: Money,
    balances: &mut [PrioritizedBalance],
    now: DateTime<Utc>,
) -> AllocationPlan {
    sort_for_allocation(balances);

    let mut remaining = amount;
    let mut allocations = Vec::new();
    let mut touched = Vec::new();

    for (index, entry) in balances.iter_mut().enumerate() {
        if !remaining.is_positive() {
            break;
        }
        let owed = entry.balance.amount;
        if !owed.is_positive() {
            continue;
        }

        let applied = owed.min(remaining);
        allocations.push(PaymentAllocation::new(
            payment_id,
            entry.balance.category_id,
            applied,
            owed,
            now,
        ));
        entry.balance.debit(applied, now);
        remaining -= applied;
        touched.push(index);
    }

    let mut credit = Money::zero();
    let mut dropped = Money::zero();
    if remaining.is_positive() {
        match balances.len().checked_sub(1) {
            Some(last) => {
                balances[last].balance.debit(remaining, now);
                if !touched.contains(&last) {
                    touched.push(last);
                }
                credit = remaining;
            }
            None => dropped = remaining,
        }
    }

    AllocationPlan {
        allocations,
        touched,
        credit,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::Balance;
    use core_kernel::{FeeCategoryId, SchoolId, StudentId};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn balance(name: &str, priority: i32, category: u128, amount: Money) -> PrioritizedBalance {
        PrioritizedBalance {
            balance: Balance::new(
                StudentId::new(),
                FeeCategoryId::from_uuid(Uuid::from_u128(category)),
                SchoolId::new(),
                amount,
                Utc::now(),
            ),
            category_name: name.to_string(),
            priority,
        }
    }

    fn kes(value: rust_decimal::Decimal) -> Money {
        Money::new(value)
    }

    fn three_vote_heads() -> Vec<PrioritizedBalance> {
        vec![
            balance("Activity", 3, 3, kes(dec!(2000))),
            balance("Tuition", 1, 1, kes(dec!(5000))),
            balance("R&MI", 2, 2, kes(dec!(3000))),
        ]
    }

    #[test]
    fn test_partial_payment_clears_in_priority_order() {
        let mut balances = three_vote_heads();
        let plan = distribute(PaymentId::new(), kes(dec!(7000)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].amount, kes(dec!(5000)));
        assert_eq!(plan.allocations[0].bal_before, kes(dec!(5000)));
        assert_eq!(plan.allocations[0].bal_after, Money::zero());
        assert_eq!(plan.allocations[1].amount, kes(dec!(2000)));
        assert_eq!(plan.allocations[1].bal_before, kes(dec!(3000)));
        assert_eq!(plan.allocations[1].bal_after, kes(dec!(1000)));

        assert_eq!(balances[0].category_name, "Tuition");
        assert_eq!(balances[2].category_name, "Activity");
        assert_eq!(balances[2].balance.amount, kes(dec!(2000)));
        assert_eq!(plan.touched, vec![0, 1]);
        assert!(plan.credit.is_zero());
    }

    #[test]
    fn test_overpayment_becomes_credit_on_last_balance() {
        let mut balances = vec![balance("Tuition", 1, 1, kes(dec!(5000)))];
        let plan = distribute(PaymentId::new(), kes(dec!(8000)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].amount, kes(dec!(5000)));
        assert_eq!(plan.allocations[0].bal_after, Money::zero());
        assert_eq!(balances[0].balance.amount, kes(dec!(-3000)));
        assert_eq!(plan.credit, kes(dec!(3000)));
        assert!(plan.dropped.is_zero());
    }

    #[test]
    fn test_credit_lands_on_last_even_if_untouched() {
        let mut balances = vec![
            balance("Tuition", 1, 1, kes(dec!(1000))),
            balance("Activity", 2, 2, kes(dec!(-200))),
        ];
        let plan = distribute(PaymentId::new(), kes(dec!(1500)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(balances[1].balance.amount, kes(dec!(-700)));
        assert_eq!(plan.touched, vec![0, 1]);
    }

    #[test]
    fn test_cleared_balances_are_skipped_not_terminal() {
        let mut balances = vec![
            balance("Tuition", 1, 1, Money::zero()),
            balance("R&MI", 2, 2, kes(dec!(-500))),
            balance("Activity", 3, 3, kes(dec!(2000))),
        ];
        let plan = distribute(PaymentId::new(), kes(dec!(1500)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].category_id, balances[2].balance.category_id);
        assert_eq!(balances[0].balance.amount, Money::zero());
        assert_eq!(balances[1].balance.amount, kes(dec!(-500)));
        assert_eq!(balances[2].balance.amount, kes(dec!(500)));
    }

    #[test]
    fn test_no_balances_drops_remainder() {
        let mut balances: Vec<PrioritizedBalance> = vec![];
        let plan = distribute(PaymentId::new(), kes(dec!(4000)), &mut balances, Utc::now());

        assert!(plan.allocations.is_empty());
        assert!(plan.touched.is_empty());
        assert_eq!(plan.dropped, kes(dec!(4000)));
    }

    #[test]
    fn test_non_positive_amount_changes_nothing() {
        for amount in [Money::zero(), kes(dec!(-100))] {
            let mut balances = three_vote_heads();
            let before = balances.clone();
            let plan = distribute(PaymentId::new(), amount, &mut balances, Utc::now());

            assert!(plan.allocations.is_empty());
            assert!(plan.touched.is_empty());
            sort_for_allocation(&mut balances);
            let mut expected = before;
            sort_for_allocation(&mut expected);
            assert_eq!(balances, expected);
        }
    }

    #[test]
    fn test_equal_priority_breaks_ties_by_category_id() {
        let mut balances = vec![
            balance("Lunch", 1, 20, kes(dec!(1000))),
            balance("Boarding", 1, 10, kes(dec!(1000))),
        ];
        let plan = distribute(PaymentId::new(), kes(dec!(1000)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(
            plan.allocations[0].category_id,
            FeeCategoryId::from_uuid(Uuid::from_u128(10))
        );
    }

    #[test]
    fn test_allocations_reference_payment() {
        let payment_id = PaymentId::new();
        let mut balances = three_vote_heads();
        let plan = distribute(payment_id, kes(dec!(10000)), &mut balances, Utc::now());

        assert_eq!(plan.allocations.len(), 3);
        assert!(plan.allocations.iter().all(|a| a.payment_id == payment_id));
        assert_eq!(plan.allocated(), kes(dec!(10000)));
        assert!(plan.credit.is_zero());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::balance::Balance;
    use core_kernel::{FeeCategoryId, SchoolId, StudentId};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn arb_balances() -> impl Strategy<Value = Vec<PrioritizedBalance>> {
        prop::collection::vec((1i32..5, 0i64..1_000_000), 0..8).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (priority, minor))| PrioritizedBalance {
                    balance: Balance::new(
                        StudentId::new(),
                        FeeCategoryId::from_uuid(Uuid::from_u128(i as u128 + 1)),
                        SchoolId::new(),
                        Money::from_minor(minor),
                        Utc::now(),
                    ),
                    category_name: format!("VH{}", i),
                    priority,
                })
                .collect()
        })
    }

    fn outstanding(balances: &[PrioritizedBalance]) -> Money {
        balances
            .iter()
            .map(|b| b.balance.amount)
            .filter(|a| a.is_positive())
            .sum()
    }

    proptest! {
        #[test]
        fn prop_allocations_sum_to_payment_when_covered(
            mut balances in arb_balances(),
            pct in 1u32..=100,
        ) {
            let owed = outstanding(&balances);
            prop_assume!(owed.is_positive());
            let payment = Money::new(owed.amount() * rust_decimal::Decimal::from(pct) / rust_decimal::Decimal::from(100));
            prop_assume!(payment.is_positive());

            let before = balances.clone();
            let plan = distribute(PaymentId::new(), payment, &mut balances, Utc::now());

            prop_assert_eq!(plan.allocated(), payment);
            prop_assert!(plan.credit.is_zero());

            let total_before: Money = before.iter().map(|b| b.balance.amount).sum();
            let total_after: Money = balances.iter().map(|b| b.balance.amount).sum();
            prop_assert_eq!(total_before - total_after, payment);
        }

        #[test]
        fn prop_each_balance_reduced_by_its_allocation(
            mut balances in arb_balances(),
            minor in 1i64..5_000_000,
        ) {
            let mut before = balances.clone();
            sort_for_allocation(&mut before);
            let plan = distribute(PaymentId::new(), Money::from_minor(minor), &mut balances, Utc::now());

            let last = balances.len().checked_sub(1);
            for (index, (old, new)) in before.iter().zip(balances.iter()).enumerate() {
                let applied: Money = plan
                    .allocations
                    .iter()
                    .filter(|a| a.category_id == old.balance.category_id)
                    .map(|a| a.amount)
                    .sum();
                let credit = if Some(index) == last { plan.credit } else { Money::zero() };
                prop_assert_eq!(new.balance.amount, old.balance.amount - applied - credit);
            }
        }

        #[test]
        fn prop_lower_priority_never_paid_while_higher_still_owes(
            mut balances in arb_balances(),
            minor in 1i64..5_000_000,
        ) {
            let mut before = balances.clone();
            sort_for_allocation(&mut before);
            let plan = distribute(PaymentId::new(), Money::from_minor(minor), &mut balances, Utc::now());

            // Once a touched balance is left owing, nothing after it received funds
            let paid: Vec<bool> = before
                .iter()
                .map(|b| plan.allocations.iter().any(|a| a.category_id == b.balance.category_id))
                .collect();
            for i in 0..balances.len() {
                if paid[i] && balances[i].balance.amount.is_positive() {
                    prop_assert!(paid[i + 1..].iter().all(|p| !p));
                }
            }
        }

        #[test]
        fn prop_overpayment_leaves_last_negative_by_excess(
            mut balances in arb_balances(),
            extra in 1i64..1_000_000,
        ) {
            prop_assume!(!balances.is_empty());
            let owed = outstanding(&balances);
            let excess = Money::from_minor(extra);
            let mut before = balances.clone();
            sort_for_allocation(&mut before);

            let plan = distribute(PaymentId::new(), owed + excess, &mut balances, Utc::now());

            prop_assert_eq!(plan.allocated(), owed);
            prop_assert_eq!(plan.credit, excess);

            let last = balances.len() - 1;
            let previous = before[last].balance.amount;
            let expected = if previous.is_positive() { -excess } else { previous - excess };
            prop_assert_eq!(balances[last].balance.amount, expected);
        }
    }
}
