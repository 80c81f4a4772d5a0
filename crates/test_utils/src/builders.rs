//! Test Data Builders
//!
//! Builders for fee domain values with sensible defaults, so a test names
//! only the fields it cares about.

use chrono::Utc;
use core_kernel::{ClassId, FeeCategoryId, Money, SchoolId, StudentId};
use domain_fees::{
    Balance, C2bNotification, FeeCategory, FeeSchedule, FeeScheduleItem, NewPayment,
    PaymentMethod, PrioritizedBalance, Student,
};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rust_decimal::Decimal;

use crate::fixtures::{IdFixtures, MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for students
pub struct TestStudentBuilder {
    school_id: SchoolId,
    enrollment_number: String,
    class_id: Option<ClassId>,
}

impl Default for TestStudentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStudentBuilder {
    pub fn new() -> Self {
        Self {
            school_id: IdFixtures::school_id(),
            enrollment_number: StringFixtures::admission_number().to_string(),
            class_id: Some(IdFixtures::class_id()),
        }
    }

    pub fn with_school(mut self, school_id: SchoolId) -> Self {
        self.school_id = school_id;
        self
    }

    pub fn with_enrollment_number(mut self, number: impl Into<String>) -> Self {
        self.enrollment_number = number.into();
        self
    }

    pub fn with_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Student not yet placed in a class
    pub fn unassigned(mut self) -> Self {
        self.class_id = None;
        self
    }

    pub fn build(self) -> Student {
        Student::new(self.school_id, self.enrollment_number, self.class_id)
    }
}

/// Builder for vote heads
pub struct TestCategoryBuilder {
    school_id: SchoolId,
    name: String,
    priority: i32,
    is_active: bool,
}

impl Default for TestCategoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCategoryBuilder {
    pub fn new() -> Self {
        Self {
            school_id: IdFixtures::school_id(),
            name: "Tuition".to_string(),
            priority: 1,
            is_active: true,
        }
    }

    pub fn with_school(mut self, school_id: SchoolId) -> Self {
        self.school_id = school_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn build(self) -> FeeCategory {
        let mut category = FeeCategory::new(self.school_id, self.name, self.priority);
        if !self.is_active {
            category.deactivate();
        }
        category
    }
}

/// Builder for a fee schedule and its items
pub struct TestScheduleBuilder {
    school_id: SchoolId,
    class_id: ClassId,
    academic_period: String,
    items: Vec<(FeeCategoryId, Money)>,
}

impl Default for TestScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestScheduleBuilder {
    pub fn new() -> Self {
        Self {
            school_id: IdFixtures::school_id(),
            class_id: IdFixtures::class_id(),
            academic_period: StringFixtures::academic_period().to_string(),
            items: Vec::new(),
        }
    }

    pub fn with_school(mut self, school_id: SchoolId) -> Self {
        self.school_id = school_id;
        self
    }

    pub fn for_class(mut self, class_id: ClassId) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_item(mut self, category_id: FeeCategoryId, amount: Money) -> Self {
        self.items.push((category_id, amount));
        self
    }

    /// Builds the schedule; the total is the sum of the items
    pub fn build(self) -> (FeeSchedule, Vec<FeeScheduleItem>) {
        let total: Money = self.items.iter().map(|(_, amount)| *amount).sum();
        let total = if total.is_positive() {
            total
        } else {
            MoneyFixtures::term_total()
        };
        let schedule = FeeSchedule::new(self.school_id, self.class_id, total, self.academic_period);
        let items = self
            .items
            .into_iter()
            .map(|(category_id, amount)| FeeScheduleItem::new(schedule.id, category_id, amount))
            .collect();
        (schedule, items)
    }
}

/// Builder for balances already joined to their vote head
pub struct TestBalanceBuilder {
    student_id: StudentId,
    school_id: SchoolId,
    category_id: FeeCategoryId,
    category_name: String,
    priority: i32,
    amount: Money,
}

impl Default for TestBalanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBalanceBuilder {
    pub fn new() -> Self {
        Self {
            student_id: IdFixtures::student_id(),
            school_id: IdFixtures::school_id(),
            category_id: FeeCategoryId::new_v7(),
            category_name: "Tuition".to_string(),
            priority: 1,
            amount: MoneyFixtures::tuition(),
        }
    }

    pub fn for_category(mut self, category: &FeeCategory) -> Self {
        self.category_id = category.id;
        self.category_name = category.name.clone();
        self.priority = category.priority;
        self.school_id = category.school_id;
        self
    }

    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn owing(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn build(self) -> PrioritizedBalance {
        PrioritizedBalance {
            balance: Balance::new(
                self.student_id,
                self.category_id,
                self.school_id,
                self.amount,
                TemporalFixtures::term_start(),
            ),
            category_name: self.category_name,
            priority: self.priority,
        }
    }
}

/// Builder for direct payment requests
pub struct TestPaymentBuilder {
    student_id: StudentId,
    school_id: SchoolId,
    amount: Money,
    method: PaymentMethod,
    reference: Option<String>,
}

impl TestPaymentBuilder {
    /// A cash payment by `student`
    pub fn for_student(student: &Student) -> Self {
        Self {
            student_id: student.id,
            school_id: student.school_id,
            amount: MoneyFixtures::partial_payment(),
            method: PaymentMethod::Cash,
            reference: None,
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn by_bank(mut self, slip: impl Into<String>) -> Self {
        self.method = PaymentMethod::Bank;
        self.reference = Some(slip.into());
        self
    }

    pub fn build(self) -> NewPayment {
        NewPayment {
            student_id: self.student_id,
            school_id: self.school_id,
            amount: self.amount,
            method: self.method,
            reference: self.reference,
        }
    }
}

/// Builder for C2B notifications with a randomly named payer
pub struct TestNotificationBuilder {
    notification: C2bNotification,
}

impl Default for TestNotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNotificationBuilder {
    pub fn new() -> Self {
        Self {
            notification: C2bNotification {
                transaction_type: "Pay Bill".to_string(),
                trans_id: StringFixtures::trans_id().to_string(),
                trans_time: Utc::now().format("%Y%m%d%H%M%S").to_string(),
                trans_amount: MoneyFixtures::partial_payment().amount(),
                business_short_code: StringFixtures::short_code().to_string(),
                bill_ref_number: StringFixtures::admission_number().to_string(),
                invoice_number: String::new(),
                msisdn: StringFixtures::msisdn().to_string(),
                first_name: FirstName().fake(),
                middle_name: String::new(),
                last_name: LastName().fake(),
            },
        }
    }

    pub fn with_trans_id(mut self, trans_id: impl Into<String>) -> Self {
        self.notification.trans_id = trans_id.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.notification.bill_ref_number = reference.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.notification.trans_amount = amount;
        self
    }

    pub fn build(self) -> C2bNotification {
        self.notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_schedule_total_is_item_sum() {
        let tuition = TestCategoryBuilder::new().build();
        let activity = TestCategoryBuilder::new().with_name("Activity").with_priority(2).build();
        let (schedule, items) = TestScheduleBuilder::new()
            .with_item(tuition.id, MoneyFixtures::tuition())
            .with_item(activity.id, MoneyFixtures::activity())
            .build();

        assert_eq!(schedule.total, Money::new(dec!(7000)));
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.schedule_id == schedule.id));
    }

    #[test]
    fn test_inactive_category() {
        let category = TestCategoryBuilder::new().inactive().build();
        assert!(!category.is_active);
    }

    #[test]
    fn test_notification_builder_has_payer_name() {
        let notification = TestNotificationBuilder::new().with_trans_id("X1").build();
        assert_eq!(notification.trans_id, "X1");
        assert!(!notification.first_name.is_empty());
    }
}
