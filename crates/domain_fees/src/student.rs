//! Read-only view of the student directory
//!
//! Students are owned by the school directory; this crate only needs enough
//! of them to resolve a cohort and match a payer reference.

use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, SchoolId, StudentId};

/// A student as seen by fee allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub school_id: SchoolId,
    /// Admission number; payers quote it as the M-PESA account reference
    pub enrollment_number: String,
    /// Cohort, used to resolve the fee schedule
    pub class_id: Option<ClassId>,
}

impl Student {
    pub fn new(
        school_id: SchoolId,
        enrollment_number: impl Into<String>,
        class_id: Option<ClassId>,
    ) -> Self {
        Self {
            id: StudentId::new_v7(),
            school_id,
            enrollment_number: enrollment_number.into(),
            class_id,
        }
    }
}

/// Normalizes a payer-supplied account reference for lookup
///
/// Payers type the admission number by hand; surrounding whitespace is
/// dropped, the rest must match exactly.
pub fn normalize_reference(reference: &str) -> &str {
    reference.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reference() {
        assert_eq!(normalize_reference("  ADM-001 "), "ADM-001");
        assert_eq!(normalize_reference("adm-001"), "adm-001");
    }
}
