use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;

use crate::limits::MAX_ROOM_CAPACITY;
use crate::model::*;

use super::availability::{rooms_fully_available, rooms_with_capacity};
use super::conflict::{today, validate_timeslot};
use super::{AvailabilityQuery, Engine, EngineError};

impl Engine {
    /// Whole rooms at a location that are free during `slot`.
    pub async fn rooms_fully_available(
        &self,
        location_id: LocationId,
        slot: Timeslot,
        recurrence: Recurrence,
    ) -> Result<Vec<RoomAvailability>, EngineError> {
        validate_timeslot(&slot, today(), false)?;
        let rooms = self.repo.load_rooms_by_location(location_id).await?;
        Ok(rooms_fully_available(&rooms, &slot, recurrence))
    }

    /// Rooms at a location with at least `amount` (default 1) free workplaces.
    pub async fn rooms_with_capacity(
        &self,
        location_id: LocationId,
        slot: Timeslot,
        amount: Option<u32>,
        recurrence: Recurrence,
    ) -> Result<Vec<RoomAvailability>, EngineError> {
        validate_timeslot(&slot, today(), false)?;
        let amount = amount.unwrap_or(1).max(1);
        if amount > MAX_ROOM_CAPACITY {
            return Err(EngineError::LimitExceeded("workplace amount too large"));
        }
        let rooms = self.repo.load_rooms_by_location(location_id).await?;
        Ok(rooms_with_capacity(&rooms, &slot, amount, recurrence))
    }

    pub async fn query_availability(&self, query: AvailabilityQuery) -> Result<Vec<RoomAvailability>, EngineError> {
        let started = Instant::now();
        let result = match query.workplaces {
            None => {
                self.rooms_fully_available(query.location_id, query.slot, query.recurrence)
                    .await
            }
            Some(n) => {
                self.rooms_with_capacity(query.location_id, query.slot, Some(n), query.recurrence)
                    .await
            }
        };
        metrics::histogram!(crate::observability::AVAILABILITY_QUERY_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.repo.find_reservation(id).await
    }

    /// Every reservation; past one-offs only when `include_old` is set.
    pub async fn all_reservations(&self, include_old: bool) -> Result<Vec<Reservation>, EngineError> {
        let today = today();
        let mut all = self.repo.all_reservations().await?;
        all.retain(|r| include_old || r.is_active(today));
        Ok(all)
    }

    /// Reservations made by an employee that are still upcoming from `from`
    /// (default today) or recurring, optionally limited to one location.
    pub async fn reservations_of_employee(
        &self,
        employee_id: EmployeeId,
        location_id: Option<LocationId>,
        from: Option<NaiveDate>,
    ) -> Result<Vec<Reservation>, EngineError> {
        let from = from.unwrap_or_else(today);
        let rooms_at_location: Option<HashSet<RoomId>> = match location_id {
            Some(loc) => Some(
                self.repo
                    .load_rooms_by_location(loc)
                    .await?
                    .into_iter()
                    .map(|room| room.id)
                    .collect(),
            ),
            None => None,
        };

        let mut mine = self.repo.reservations_by_employee(employee_id).await?;
        mine.retain(|r| {
            rooms_at_location
                .as_ref()
                .is_none_or(|rooms| rooms.contains(&r.room_id()))
                && r.is_active(from)
        });
        Ok(mine)
    }

    /// All reservations in the rooms of a location.
    pub async fn reservations_by_location(&self, location_id: LocationId) -> Result<Vec<Reservation>, EngineError> {
        let rooms = self.repo.load_rooms_by_location(location_id).await?;
        Ok(rooms
            .into_iter()
            .flat_map(|room| room.reservations)
            .collect())
    }

    pub async fn reservation_from_employee(
        &self,
        reservation_id: ReservationId,
        employee_id: EmployeeId,
    ) -> Result<bool, EngineError> {
        let reservation = self.repo.find_reservation(reservation_id).await?;
        Ok(reservation.employee_id() == employee_id)
    }
}
