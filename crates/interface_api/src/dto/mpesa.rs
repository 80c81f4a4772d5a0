//! M-PESA transaction queue DTOs
//!
//! The C2B callback bodies themselves are `domain_fees::C2bNotification`
//! and `domain_fees::Ack`; their shape is fixed by the network.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_fees::{ExternalTransaction, TransactionStatus};

#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ManualMatchRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MpesaTransactionResponse {
    pub id: Uuid,
    pub trans_id: String,
    pub trans_time: String,
    pub trans_amount: Decimal,
    pub bill_ref_number: String,
    pub msisdn: String,
    pub payer_name: String,
    pub status: TransactionStatus,
    pub payment_id: Option<Uuid>,
    pub matched_student_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ExternalTransaction> for MpesaTransactionResponse {
    fn from(tx: ExternalTransaction) -> Self {
        let payer_name = [tx.first_name.as_str(), tx.middle_name.as_str(), tx.last_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: tx.id.into(),
            trans_id: tx.trans_id,
            trans_time: tx.trans_time,
            trans_amount: tx.trans_amount.amount(),
            bill_ref_number: tx.bill_ref_number,
            msisdn: tx.msisdn,
            payer_name,
            status: tx.status,
            payment_id: tx.payment_id.map(Into::into),
            matched_student_id: tx.matched_student_id.map(Into::into),
            error_message: tx.error_message,
            created_at: tx.created_at,
        }
    }
}
