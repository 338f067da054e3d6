use thiserror::Error;

/// Field-level validation failures, raised before any store call.
///
/// Callers surface these as form messages; no state is mutated when
/// validation fails.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("end time must be after start time")]
    EndNotAfterStart,
    #[error("start and end must fall on the same day")]
    SpansMultipleDays,
    #[error("events must end by 23:30")]
    EndsAfterLatestSlot,
}
