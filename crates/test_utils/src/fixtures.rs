//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the fee domain. Values mirror a small Kenyan
//! day school: three vote heads, a KES 10,000 term schedule and a Pay Bill
//! short code.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{ClassId, Money, SchoolId, StudentId};
use domain_fees::C2bNotification;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Tuition owed for the term
    pub fn tuition() -> Money {
        Money::new(dec!(5000.00))
    }

    /// Repairs, maintenance and improvement owed for the term
    pub fn rmi() -> Money {
        Money::new(dec!(3000.00))
    }

    /// Activity fee owed for the term
    pub fn activity() -> Money {
        Money::new(dec!(2000.00))
    }

    /// Sum of the three vote heads
    pub fn term_total() -> Money {
        Money::new(dec!(10000.00))
    }

    /// A partial payment covering tuition and part of R&MI
    pub fn partial_payment() -> Money {
        Money::new(dec!(7000.00))
    }

    /// Credit left on the last vote head
    pub fn credit() -> Money {
        Money::new(dec!(-500.00))
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// First day of term one
    pub fn term_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
    }

    /// `TransTime` as the network formats it
    pub fn trans_time() -> &'static str {
        "20240115143012"
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic school ID for testing
    pub fn school_id() -> SchoolId {
        SchoolId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// A second tenant for isolation tests
    pub fn other_school_id() -> SchoolId {
        SchoolId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    /// Creates a deterministic student ID for testing
    pub fn student_id() -> StudentId {
        StudentId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }

    /// Creates a deterministic class ID for testing
    pub fn class_id() -> ClassId {
        ClassId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440004").unwrap())
    }
}

/// Fixture for decimal test data
pub struct DecimalFixtures;

impl DecimalFixtures {
    /// Smallest unit the ledger stores
    pub fn one_cent() -> Decimal {
        dec!(0.01)
    }

    pub fn zero() -> Decimal {
        Decimal::ZERO
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// Admission number the payer types as the account reference
    pub fn admission_number() -> &'static str {
        "ADM-001"
    }

    /// A reference no student carries
    pub fn unknown_admission_number() -> &'static str {
        "ADM-404"
    }

    /// Network transaction id
    pub fn trans_id() -> &'static str {
        "RKTQDM7W6S"
    }

    /// Pay Bill short code of the school
    pub fn short_code() -> &'static str {
        "600638"
    }

    /// Payer phone number
    pub fn msisdn() -> &'static str {
        "254708374149"
    }

    pub fn academic_period() -> &'static str {
        "2024-T1"
    }
}

/// Fixture for M-PESA callback payloads
pub struct MpesaFixtures;

impl MpesaFixtures {
    /// Confirmation for `amount` against an account reference
    pub fn confirmation(trans_id: &str, reference: &str, amount: Decimal) -> C2bNotification {
        C2bNotification {
            transaction_type: "Pay Bill".to_string(),
            trans_id: trans_id.to_string(),
            trans_time: TemporalFixtures::trans_time().to_string(),
            trans_amount: amount,
            business_short_code: StringFixtures::short_code().to_string(),
            bill_ref_number: reference.to_string(),
            invoice_number: String::new(),
            msisdn: StringFixtures::msisdn().to_string(),
            first_name: "Jane".to_string(),
            middle_name: String::new(),
            last_name: "Wanjiru".to_string(),
        }
    }

    /// The standard KES 5,000 confirmation for `ADM-001`
    pub fn standard_confirmation() -> C2bNotification {
        Self::confirmation(
            StringFixtures::trans_id(),
            StringFixtures::admission_number(),
            dec!(5000.00),
        )
    }

    /// The standard confirmation as the raw JSON body the network posts
    pub fn standard_confirmation_json() -> serde_json::Value {
        serde_json::json!({
            "TransactionType": "Pay Bill",
            "TransID": StringFixtures::trans_id(),
            "TransTime": TemporalFixtures::trans_time(),
            "TransAmount": "5000.00",
            "BusinessShortCode": StringFixtures::short_code(),
            "BillRefNumber": StringFixtures::admission_number(),
            "InvoiceNumber": "",
            "MSISDN": StringFixtures::msisdn(),
            "FirstName": "Jane",
            "MiddleName": "",
            "LastName": "Wanjiru"
        })
    }
}
