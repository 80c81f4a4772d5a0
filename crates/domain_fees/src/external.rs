//! M-PESA C2B transactions
//!
//! Every confirmation the network sends is stored once, keyed by its
//! transaction id. The stored row tracks whether it was matched to a student
//! and which payment it produced.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ExternalTransactionId, Money, PaymentId, SchoolId, StudentId};

/// Reconciliation state of an external transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Received, not yet resolved
    Pending,
    /// Linked to a student and a payment; terminal
    Matched,
    /// No student matched the account reference
    Unmatched,
    /// Matched, but the payment record could not be created
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Matched => "MATCHED",
            TransactionStatus::Unmatched => "UNMATCHED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(TransactionStatus::Pending),
            "MATCHED" => Some(TransactionStatus::Matched),
            "UNMATCHED" => Some(TransactionStatus::Unmatched),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Whether an operator may still match this transaction by hand
    pub fn is_matchable(&self) -> bool {
        !matches!(self, TransactionStatus::Matched)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C2B notification body, as posted to both the validation and the
/// confirmation callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct C2bNotification {
    #[serde(default)]
    pub transaction_type: String,
    #[serde(rename = "TransID")]
    pub trans_id: String,
    #[serde(default)]
    pub trans_time: String,
    pub trans_amount: Decimal,
    #[serde(default)]
    pub business_short_code: String,
    /// Account reference typed by the payer: the admission number
    pub bill_ref_number: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(rename = "MSISDN", default)]
    pub msisdn: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Stored external transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransaction {
    pub id: ExternalTransactionId,
    /// Tenant the payer reference resolved to; empty while unmatched
    pub school_id: Option<SchoolId>,
    pub transaction_type: String,
    /// Network transaction id, unique across all rows
    pub trans_id: String,
    pub trans_time: String,
    pub trans_amount: Money,
    pub business_short_code: String,
    pub bill_ref_number: String,
    pub invoice_number: String,
    pub msisdn: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub status: TransactionStatus,
    pub payment_id: Option<PaymentId>,
    pub matched_student_id: Option<StudentId>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalTransaction {
    /// Records a notification in `PENDING` state
    pub fn from_notification(notification: &C2bNotification) -> Self {
        let now = Utc::now();
        Self {
            id: ExternalTransactionId::new_v7(),
            school_id: None,
            transaction_type: notification.transaction_type.clone(),
            trans_id: notification.trans_id.clone(),
            trans_time: notification.trans_time.clone(),
            trans_amount: Money::new(notification.trans_amount),
            business_short_code: notification.business_short_code.clone(),
            bill_ref_number: notification.bill_ref_number.clone(),
            invoice_number: notification.invoice_number.clone(),
            msisdn: notification.msisdn.clone(),
            first_name: notification.first_name.clone(),
            middle_name: notification.middle_name.clone(),
            last_name: notification.last_name.clone(),
            status: TransactionStatus::Pending,
            payment_id: None,
            matched_student_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Links the transaction to a payment and student
    pub fn mark_matched(&mut self, school_id: SchoolId, student_id: StudentId, payment_id: PaymentId) {
        self.school_id = Some(school_id);
        self.matched_student_id = Some(student_id);
        self.payment_id = Some(payment_id);
        self.status = TransactionStatus::Matched;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Parks the transaction for an operator
    pub fn mark_unmatched(&mut self, reason: impl Into<String>) {
        self.status = TransactionStatus::Unmatched;
        self.error_message = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Records that the payment could not be created
    pub fn mark_failed(&mut self, school_id: Option<SchoolId>, reason: impl Into<String>) {
        self.school_id = school_id;
        self.status = TransactionStatus::Failed;
        self.error_message = Some(reason.into());
        self.updated_at = Utc::now();
    }
}

/// Acknowledgment returned to the mobile-money network
///
/// The network only understands this exact shape, so every outcome of a
/// callback, including internal failures, is expressed as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(rename = "ResultCode")]
    pub result_code: u8,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl Ack {
    fn ok(desc: impl Into<String>) -> Self {
        Self {
            result_code: 0,
            result_desc: desc.into(),
        }
    }

    fn rejected(desc: impl Into<String>) -> Self {
        Self {
            result_code: 1,
            result_desc: desc.into(),
        }
    }

    /// Validation passed; the network may capture the funds
    pub fn accepted() -> Self {
        Self::ok("Accepted")
    }

    /// Validation failed; the network must not capture the funds
    pub fn rejected_unknown_reference(reference: &str) -> Self {
        Self::rejected(format!("Student with admission number {} not found", reference))
    }

    /// Validation could not be performed; the network must not capture
    pub fn validation_unavailable() -> Self {
        Self::rejected("Validation temporarily unavailable")
    }

    pub fn success() -> Self {
        Self::ok("Success")
    }

    pub fn already_processed() -> Self {
        Self::ok("Already processed")
    }

    pub fn logged_for_manual_matching() -> Self {
        Self::ok("Logged for manual matching")
    }

    pub fn error_logged() -> Self {
        Self::ok("Error logged")
    }

    pub fn invalid_request() -> Self {
        Self::rejected("Invalid request format")
    }

    pub fn is_accepted(&self) -> bool {
        self.result_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn notification_json() -> &'static str {
        r#"{
            "TransactionType": "Pay Bill",
            "TransID": "RKTQDM7W6S",
            "TransTime": "20240115143012",
            "TransAmount": 5000.00,
            "BusinessShortCode": "600638",
            "BillRefNumber": "ADM-001",
            "InvoiceNumber": "",
            "MSISDN": "254708374149",
            "FirstName": "Jane",
            "MiddleName": "",
            "LastName": "Wanjiru"
        }"#
    }

    #[test]
    fn test_parse_notification() {
        let notification: C2bNotification = serde_json::from_str(notification_json()).unwrap();
        assert_eq!(notification.trans_id, "RKTQDM7W6S");
        assert_eq!(notification.trans_amount, dec!(5000.00));
        assert_eq!(notification.bill_ref_number, "ADM-001");
        assert_eq!(notification.msisdn, "254708374149");
    }

    #[test]
    fn test_parse_minimal_notification() {
        let notification: C2bNotification = serde_json::from_str(
            r#"{"TransID":"X1","TransAmount":"250.50","BillRefNumber":"ADM-9"}"#,
        )
        .unwrap();
        assert_eq!(notification.trans_amount, dec!(250.50));
        assert!(notification.msisdn.is_empty());
    }

    #[test]
    fn test_missing_trans_id_is_rejected() {
        let result: Result<C2bNotification, _> =
            serde_json::from_str(r#"{"TransAmount":100,"BillRefNumber":"ADM-1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ack_wire_shape() {
        let json = serde_json::to_value(Ack::already_processed()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ResultCode": 0, "ResultDesc": "Already processed"})
        );

        let json = serde_json::to_value(Ack::invalid_request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ResultCode": 1, "ResultDesc": "Invalid request format"})
        );
    }

    #[test]
    fn test_status_transitions() {
        let notification: C2bNotification = serde_json::from_str(notification_json()).unwrap();
        let mut tx = ExternalTransaction::from_notification(&notification);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.status.is_matchable());

        tx.mark_unmatched("Student not found by admission number");
        assert_eq!(tx.status, TransactionStatus::Unmatched);
        assert!(tx.school_id.is_none());

        let school = SchoolId::new();
        tx.mark_matched(school, StudentId::new(), PaymentId::new());
        assert_eq!(tx.status, TransactionStatus::Matched);
        assert_eq!(tx.school_id, Some(school));
        assert!(tx.error_message.is_none());
        assert!(!tx.status.is_matchable());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Unmatched).unwrap(),
            "\"UNMATCHED\""
        );
        assert_eq!(TransactionStatus::parse("FAILED"), Some(TransactionStatus::Failed));
    }
}
