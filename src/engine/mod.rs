mod admission;
mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use admission::overlapping_in;
pub use availability::{room_availability, rooms_fully_available, rooms_with_capacity};
pub use conflict::{overlaps, reservations_overlap, today, validate_timeslot};
pub use error::EngineError;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::*;
use crate::repository::Repository;

/// A booking request as handed over by the outer (HTTP) layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub room_id: RoomId,
    pub employee_id: EmployeeId,
    pub slot: Timeslot,
    /// Clamped to at least 1; ignored for whole-room bookings.
    pub workplace_amount: u32,
    pub recurrence: Recurrence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub location_id: LocationId,
    pub slot: Timeslot,
    pub recurrence: Recurrence,
    /// `None` asks for whole rooms, `Some(n)` for rooms with `n` free workplaces.
    pub workplaces: Option<u32>,
}

/// Reservation engine over a repository collaborator.
///
/// Mutations on one room are serialized through a per-room mutex held across
/// load, admission and save. Queries run unlocked on the snapshots the
/// repository hands out.
pub struct Engine {
    pub(super) repo: Arc<dyn Repository>,
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            room_locks: DashMap::new(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Acquire the single-writer lock for a room.
    pub(super) async fn lock_room(&self, room_id: RoomId) -> OwnedMutexGuard<()> {
        let lock = self.room_locks.entry(room_id).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Lock several rooms in sorted id order to avoid deadlocks.
    pub(super) async fn lock_rooms(&self, mut room_ids: Vec<RoomId>) -> Vec<OwnedMutexGuard<()>> {
        room_ids.sort();
        room_ids.dedup();
        let mut guards = Vec::with_capacity(room_ids.len());
        for id in room_ids {
            guards.push(self.lock_room(id).await);
        }
        guards
    }
}

/// Count the outcome of an engine operation and log rejections.
pub(super) fn observe<T>(operation: &'static str, result: Result<T, EngineError>) -> Result<T, EngineError> {
    match &result {
        Ok(_) => {
            metrics::counter!(crate::observability::RESERVATIONS_TOTAL, "operation" => operation, "status" => "ok")
                .increment(1);
        }
        Err(e) => {
            metrics::counter!(crate::observability::RESERVATIONS_TOTAL, "operation" => operation, "status" => "error")
                .increment(1);
            metrics::counter!(crate::observability::ADMISSION_REJECTIONS_TOTAL, "reason" => e.reason())
                .increment(1);
            tracing::debug!("{operation} rejected: {e}");
        }
    }
    result
}
