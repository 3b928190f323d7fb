//! Shared primitive types used across the treasury core.

/// Academic year ("gestión"), e.g. 2024.
pub type Year = i32;

/// Primary key of an enrollment row.
pub type EnrollmentId = i64;

/// Primary key of a student row.
pub type StudentId = i64;

/// Primary key of a fee group.
pub type FeeGroupId = i64;

/// Primary key of a payment row.
pub type PaymentId = i64;
