//! Property-Based Test Generators
//!
//! Proptest strategies for fee domain values.

use core_kernel::{FeeCategoryId, Money, SchoolId, StudentId};
use domain_fees::{Balance, PaymentMethod, PrioritizedBalance};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::TemporalFixtures;

/// Strategy for generating positive amounts in cents
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// Strategy for generating signed balance amounts in cents
///
/// Mostly owing, sometimes settled or in credit.
pub fn balance_amount_minor_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        8 => 1i64..5_000_000i64,
        1 => Just(0i64),
        1 => -500_000i64..0i64,
    ]
}

/// Strategy for generating positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for generating Money values that may be zero or negative
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (-10_000_000i64..10_000_000i64).prop_map(Money::from_minor)
}

/// Strategy for generating positive Decimal values with up to two places
pub fn positive_decimal_strategy() -> impl Strategy<Value = Decimal> {
    positive_amount_minor_strategy().prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for generating vote head priorities
pub fn priority_strategy() -> impl Strategy<Value = i32> {
    1i32..20i32
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Bank),
        Just(PaymentMethod::Mpesa),
    ]
}

pub fn school_id_strategy() -> impl Strategy<Value = SchoolId> {
    any::<[u8; 16]>().prop_map(|bytes| SchoolId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

pub fn category_id_strategy() -> impl Strategy<Value = FeeCategoryId> {
    any::<[u8; 16]>().prop_map(|bytes| FeeCategoryId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating admission numbers such as `ADM-0042`
pub fn admission_number_strategy() -> impl Strategy<Value = String> {
    (1u32..10_000u32).prop_map(|n| format!("ADM-{:04}", n))
}

/// Strategy for generating network transaction ids (ten upper-case
/// alphanumerics)
pub fn trans_id_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{10}"
}

/// Strategy for one student's balances across `1..=max` vote heads
///
/// Priorities may repeat so tie-breaking on vote head id is exercised.
pub fn prioritized_balances_strategy(max: usize) -> impl Strategy<Value = Vec<PrioritizedBalance>> {
    proptest::collection::vec(
        (category_id_strategy(), priority_strategy(), balance_amount_minor_strategy()),
        1..=max,
    )
    .prop_map(|entries| {
        let student_id = StudentId::new();
        let school_id = SchoolId::new();
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (category_id, priority, cents))| PrioritizedBalance {
                balance: Balance::new(
                    student_id,
                    category_id,
                    school_id,
                    Money::from_minor(cents),
                    TemporalFixtures::term_start(),
                ),
                category_name: format!("Vote head {}", index + 1),
                priority,
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_positive_money_is_positive(money in positive_money_strategy()) {
            prop_assert!(money.is_positive());
        }

        #[test]
        fn test_admission_numbers_are_prefixed(number in admission_number_strategy()) {
            prop_assert!(number.starts_with("ADM-"));
        }

        #[test]
        fn test_trans_ids_have_network_shape(trans_id in trans_id_strategy()) {
            prop_assert_eq!(trans_id.len(), 10);
            prop_assert!(trans_id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }

        #[test]
        fn test_balances_share_one_student(balances in prioritized_balances_strategy(6)) {
            let student = balances[0].balance.student_id;
            prop_assert!(balances.iter().all(|b| b.balance.student_id == student));
        }
    }
}
