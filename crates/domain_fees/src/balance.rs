//! Per-student vote head balances
//!
//! One balance row exists per (student, vote head, school). The amount is a
//! signed running figure: positive means the student owes, negative is credit
//! carried forward from an overpayment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BalanceId, FeeCategoryId, Money, SchoolId, StudentId};

/// Outstanding balance of one student on one vote head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: BalanceId,
    pub student_id: StudentId,
    #[serde(rename = "vote_head_id")]
    pub category_id: FeeCategoryId,
    pub school_id: SchoolId,
    #[serde(rename = "balance")]
    pub amount: Money,
    pub last_updated: DateTime<Utc>,
}

impl Balance {
    /// Creates a balance row owing `amount`
    pub fn new(
        student_id: StudentId,
        category_id: FeeCategoryId,
        school_id: SchoolId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BalanceId::new_v7(),
            student_id,
            category_id,
            school_id,
            amount,
            last_updated: now,
        }
    }

    /// True when nothing is owed on this vote head (cleared or in credit)
    pub fn is_settled(&self) -> bool {
        !self.amount.is_positive()
    }

    /// Debits the balance, which may push it negative
    pub fn debit(&mut self, amount: Money, now: DateTime<Utc>) {
        self.amount -= amount;
        self.last_updated = now;
    }
}

/// A balance joined to the vote head attributes that order it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritizedBalance {
    pub balance: Balance,
    pub category_name: String,
    pub priority: i32,
}

impl PrioritizedBalance {
    /// Allocation order: priority first, then vote head id
    pub fn sort_key(&self) -> (i32, FeeCategoryId) {
        (self.priority, self.balance.category_id)
    }
}

/// Sorts balances into deterministic allocation order
pub fn sort_for_allocation(balances: &mut [PrioritizedBalance]) {
    balances.sort_by_key(PrioritizedBalance::sort_key);
}

/// One line of a student's balance breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBalance {
    #[serde(rename = "vote_head_id")]
    pub category_id: FeeCategoryId,
    #[serde(rename = "vote_head_name")]
    pub category_name: String,
    pub priority: i32,
    pub balance: Money,
}

impl From<&PrioritizedBalance> for CategoryBalance {
    fn from(entry: &PrioritizedBalance) -> Self {
        Self {
            category_id: entry.balance.category_id,
            category_name: entry.category_name.clone(),
            priority: entry.priority,
            balance: entry.balance.amount,
        }
    }
}

/// A student's balances across every vote head, active or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub student_id: StudentId,
    pub breakdown: Vec<CategoryBalance>,
    pub total_balance: Money,
}

impl Breakdown {
    /// Builds a breakdown from balances, ordering them by priority
    pub fn from_balances(student_id: StudentId, mut balances: Vec<PrioritizedBalance>) -> Self {
        sort_for_allocation(&mut balances);
        let breakdown: Vec<CategoryBalance> = balances.iter().map(CategoryBalance::from).collect();
        let total_balance = breakdown.iter().map(|line| line.balance).sum();

        Self {
            student_id,
            breakdown,
            total_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn entry(priority: i32, category: u128, amount: Money) -> PrioritizedBalance {
        PrioritizedBalance {
            balance: Balance::new(
                StudentId::new(),
                FeeCategoryId::from_uuid(Uuid::from_u128(category)),
                SchoolId::new(),
                amount,
                Utc::now(),
            ),
            category_name: format!("VH{}", category),
            priority,
        }
    }

    #[test]
    fn test_equal_priorities_order_by_category_id() {
        let mut balances = vec![
            entry(2, 9, Money::new(dec!(100))),
            entry(1, 7, Money::new(dec!(100))),
            entry(2, 3, Money::new(dec!(100))),
        ];
        sort_for_allocation(&mut balances);

        let order: Vec<u128> = balances
            .iter()
            .map(|b| b.balance.category_id.as_uuid().as_u128())
            .collect();
        assert_eq!(order, vec![7, 3, 9]);
    }

    #[test]
    fn test_breakdown_total_includes_credit() {
        let student = StudentId::new();
        let breakdown = Breakdown::from_balances(
            student,
            vec![
                entry(1, 1, Money::new(dec!(5000))),
                entry(2, 2, Money::new(dec!(-1500))),
            ],
        );

        assert_eq!(breakdown.breakdown.len(), 2);
        assert_eq!(breakdown.total_balance, Money::new(dec!(3500)));
    }

    #[test]
    fn test_empty_breakdown_is_zero() {
        let breakdown = Breakdown::from_balances(StudentId::new(), vec![]);
        assert!(breakdown.breakdown.is_empty());
        assert!(breakdown.total_balance.is_zero());
    }

    #[test]
    fn test_category_balance_json_field_names() {
        let line = CategoryBalance::from(&entry(1, 1, Money::new(dec!(10))));
        let json = serde_json::to_value(&line).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(keys.contains(&"vote_head_id"));
        assert!(keys.contains(&"vote_head_name"));
        assert!(keys.contains(&"priority"));
        assert!(keys.contains(&"balance"));
    }
}
