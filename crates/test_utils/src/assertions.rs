//! Custom Test Assertions
//!
//! Assertion helpers for allocations and receipts that give more useful
//! failure messages than a bare `assert_eq!`.

use core_kernel::Money;
use domain_fees::{Ack, CategoryBalance, PaymentAllocation, Receipt};
use rust_decimal::Decimal;

/// Asserts that money values sum to a total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum: Money = parts.iter().sum();
    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum,
        total
    );
}

pub fn assert_money_positive(money: &Money) {
    assert!(money.is_positive(), "Expected positive money, got {}", money);
}

pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

pub fn assert_money_negative(money: &Money) {
    assert!(money.is_negative(), "Expected negative money, got {}", money);
}

/// Asserts that every allocation row is arithmetically consistent:
/// positive, and `bal_after == bal_before - amount`
pub fn assert_allocations_consistent(allocations: &[PaymentAllocation]) {
    for allocation in allocations {
        assert!(
            allocation.amount.is_positive(),
            "Allocation {} has non-positive amount {}",
            allocation.id,
            allocation.amount
        );
        assert_eq!(
            allocation.bal_after,
            allocation.bal_before - allocation.amount,
            "Allocation {} does not reconcile: {} - {} != {}",
            allocation.id,
            allocation.bal_before,
            allocation.amount,
            allocation.bal_after
        );
    }
}

/// Asserts that a receipt's allocations account for the whole payment
pub fn assert_fully_allocated(receipt: &Receipt) {
    assert_allocations_consistent(&receipt.allocations);
    let parts: Vec<Money> = receipt.allocations.iter().map(|a| a.amount).collect();
    assert_money_sum_equals(&parts, &receipt.payment.amount);
}

/// Asserts that a breakdown lists vote heads in allocation order
pub fn assert_priority_order(breakdown: &[CategoryBalance]) {
    for pair in breakdown.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.priority, a.category_id) <= (b.priority, b.category_id),
            "{} (priority {}) listed before {} (priority {})",
            a.category_name,
            a.priority,
            b.category_name,
            b.priority
        );
    }
}

/// Asserts the acknowledgment carries the expected description
pub fn assert_ack(ack: &Ack, accepted: bool, desc: &str) {
    assert_eq!(
        ack.is_accepted(),
        accepted,
        "Expected ResultCode {} for '{}', got {}",
        if accepted { 0 } else { 1 },
        desc,
        ack.result_code
    );
    assert_eq!(ack.result_desc, desc);
}

/// Asserts that a Decimal is within `tolerance` of the expected value
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}",
        actual,
        expected,
        diff
    );
}
