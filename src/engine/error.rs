use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::model::{EmployeeId, LocationId, ReservationId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("start time {start} is after end time {end}")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },
    #[error("date {0} lies in the past")]
    InvalidDate(NaiveDate),
    #[error("{wanted} workplaces requested but only {available} available")]
    CapacityExceeded { wanted: u32, available: u32 },
    #[error("room {0} is not available: a recurring reservation conflicts")]
    RoomUnavailable(RoomId),
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),
    #[error("employee not found: {0}")]
    EmployeeNotFound(EmployeeId),
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),
    #[error("reservation {reservation} does not belong to employee {employee}")]
    NotOwner {
        reservation: ReservationId,
        employee: EmployeeId,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("journal error: {0}")]
    JournalError(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::InvalidTimeRange { .. } => "invalid_time_range",
            EngineError::InvalidDate(_) => "invalid_date",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::RoomUnavailable(_) => "room_unavailable",
            EngineError::RoomNotFound(_)
            | EngineError::ReservationNotFound(_)
            | EngineError::EmployeeNotFound(_)
            | EngineError::LocationNotFound(_) => "not_found",
            EngineError::NotOwner { .. } => "not_owner",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::JournalError(_) => "journal_error",
        }
    }
}
