use tracing::info;

use crate::model::*;

use super::conflict::{today, validate_timeslot};
use super::{observe, Engine, EngineError, ReservationRequest};

impl Engine {
    /// Book `workplace_amount` workplaces (at least one) in a room.
    pub async fn reserve_workplaces(&self, request: ReservationRequest) -> Result<Reservation, EngineError> {
        observe("reserve_workplaces", self.reserve(request, false).await)
    }

    /// Book every workplace of a room. The room must be entirely free for the
    /// requested timeslot.
    pub async fn reserve_whole_room(&self, request: ReservationRequest) -> Result<Reservation, EngineError> {
        observe("reserve_whole_room", self.reserve(request, true).await)
    }

    async fn reserve(&self, request: ReservationRequest, whole_room: bool) -> Result<Reservation, EngineError> {
        validate_timeslot(&request.slot, today(), false)?;
        let employee = self.repo.find_employee(request.employee_id).await?;

        let _guard = self.lock_room(request.room_id).await;
        let mut room = self.repo.load_room(request.room_id).await?;

        let amount = if whole_room {
            if room.capacity == 0 || !room.is_fully_available(&request.slot) {
                return Err(EngineError::RoomUnavailable(room.id));
            }
            room.capacity
        } else {
            request.workplace_amount.max(1)
        };
        let reservation = Reservation::new(room.id, employee.id, request.slot, amount, request.recurrence)?;

        room.add_reservation(reservation.clone())?;
        self.repo
            .save_room_reservations(room.id, room.reservations().to_vec())
            .await?;

        info!(
            "reserved {} workplaces in room {} on {} {}-{} for employee {} ({})",
            amount,
            room.id,
            request.slot.date,
            request.slot.start,
            request.slot.end,
            employee.id,
            reservation.id()
        );
        Ok(reservation)
    }

    /// Load a historical record built with [`Reservation::legacy`]. The date
    /// floor is skipped but the room still has to admit it.
    pub async fn import_reservation(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        observe("import_reservation", self.import(reservation).await)
    }

    async fn import(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        self.repo.find_employee(reservation.employee_id()).await?;
        let _guard = self.lock_room(reservation.room_id()).await;
        let mut room = self.repo.load_room(reservation.room_id()).await?;
        room.add_reservation(reservation.clone())?;
        self.repo
            .save_room_reservations(room.id, room.reservations().to_vec())
            .await?;
        info!("imported reservation {} into room {}", reservation.id(), room.id);
        Ok(reservation)
    }

    /// Replace reservation `id` with the requested fields, keeping its id.
    /// Moving to another room locks both rooms; the old room is only touched
    /// once the new room has admitted the reservation.
    pub async fn update_reservation(
        &self,
        id: ReservationId,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        observe("update_reservation", self.update(id, request).await)
    }

    async fn update(&self, id: ReservationId, request: ReservationRequest) -> Result<Reservation, EngineError> {
        validate_timeslot(&request.slot, today(), false)?;
        let current = self.repo.find_reservation(id).await?;
        let employee = self.repo.find_employee(request.employee_id).await?;
        let replacement = Reservation::new(
            request.room_id,
            employee.id,
            request.slot,
            request.workplace_amount.max(1),
            request.recurrence,
        )?
        .with_id(id);

        let _guards = self.lock_rooms(vec![current.room_id(), request.room_id]).await;

        if current.room_id() == request.room_id {
            let mut room = self.repo.load_room(request.room_id).await?;
            room.update_reservation(id, replacement.clone())?;
            self.repo
                .save_room_reservations(room.id, room.reservations().to_vec())
                .await?;
        } else {
            let mut old_room = self.repo.load_room(current.room_id()).await?;
            let mut new_room = self.repo.load_room(request.room_id).await?;
            if old_room.reservation(id).is_none() {
                return Err(EngineError::ReservationNotFound(id));
            }
            new_room.add_reservation(replacement.clone())?;
            old_room.remove_reservation(id);
            self.repo
                .save_room_reservations(new_room.id, new_room.reservations().to_vec())
                .await?;
            self.repo
                .save_room_reservations(old_room.id, old_room.reservations().to_vec())
                .await?;
        }

        info!(
            "updated reservation {id}: room {} on {} {}-{}, {} workplaces",
            request.room_id,
            request.slot.date,
            request.slot.start,
            request.slot.end,
            replacement.workplace_amount()
        );
        Ok(replacement)
    }

    /// Delete a reservation on behalf of the employee who made it.
    pub async fn delete_reservation(&self, id: ReservationId, requested_by: EmployeeId) -> Result<(), EngineError> {
        observe("delete_reservation", self.delete(id, requested_by).await)
    }

    async fn delete(&self, id: ReservationId, requested_by: EmployeeId) -> Result<(), EngineError> {
        let mut room_id = self.repo.find_reservation(id).await?.room_id();
        loop {
            let _guard = self.lock_room(room_id).await;
            // An update may have moved it while we waited for the lock.
            let reservation = self.repo.find_reservation(id).await?;
            if reservation.room_id() != room_id {
                room_id = reservation.room_id();
                continue;
            }
            if reservation.employee_id() != requested_by {
                return Err(EngineError::NotOwner {
                    reservation: id,
                    employee: requested_by,
                });
            }
            self.repo.delete_reservation(id).await?;
            info!("deleted reservation {id} in room {room_id}");
            return Ok(());
        }
    }
}
