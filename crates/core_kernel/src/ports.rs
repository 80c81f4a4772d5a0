//! Port plumbing shared by the fee domain and its adapters
//!
//! `domain_fees` declares the storage port; `infra_db` implements it on
//! PostgreSQL and `domain_fees` ships an in-memory implementation for tests.
//!
//! ```text
//!     PaymentService / PaymentReconciler / FeeAdministration
//!                              │
//!                    FeeStorePort::begin()
//!                              │
//!                              ▼
//!                        FeeUnitOfWork
//!                    ▲                    ▲
//!          PostgresFeeStore          MockFeeStore
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a storage adapter
///
/// Services see the same error whichever store is behind the port.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// The store rejected the data (check or foreign key constraint)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A uniqueness constraint fired, e.g. a repeated `TransID`
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The store was unreachable or the transaction was aborted; retryable
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the whole unit of work may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker for port traits; ports are shared across request tasks
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    /// Answering, but requests are likely to queue
    Degraded,
    Unhealthy,
}

/// Outcome of one adapter probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn new(adapter_id: impl Into<String>, status: AdapterHealth, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the adapter can take traffic (healthy or degraded)
    pub fn is_serving(&self) -> bool {
        self.status != AdapterHealth::Unhealthy
    }
}

#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Student", "ADM-001");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("Student"));
        assert!(error.to_string().contains("ADM-001"));
    }

    #[test]
    fn test_port_error_conflict() {
        let error = PortError::conflict("external transaction X1 already exists");
        assert!(error.is_conflict());
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_port_error_transient() {
        assert!(PortError::connection("pool closed").is_transient());
        assert!(!PortError::validation("bad amount").is_transient());
    }

    #[test]
    fn test_degraded_adapter_still_serving() {
        let degraded = HealthCheckResult::new("db", AdapterHealth::Degraded, 12)
            .with_message("pool saturated");
        assert!(degraded.is_serving());
        assert_eq!(degraded.message.as_deref(), Some("pool saturated"));
        assert!(!HealthCheckResult::new("db", AdapterHealth::Unhealthy, 0).is_serving());
    }
}
