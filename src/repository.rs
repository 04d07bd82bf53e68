use async_trait::async_trait;

use crate::engine::EngineError;
use crate::model::*;

/// Storage collaborator of the engine.
///
/// Rooms are handed out as owned snapshots; the engine mutates the snapshot
/// and writes the whole reservation set back with `save_room_reservations`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn load_room(&self, id: RoomId) -> Result<Room, EngineError>;

    async fn load_rooms_by_location(&self, location_id: LocationId) -> Result<Vec<Room>, EngineError>;

    /// Atomically replace the reservations of a room.
    async fn save_room_reservations(
        &self,
        room_id: RoomId,
        reservations: Vec<Reservation>,
    ) -> Result<(), EngineError>;

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), EngineError>;

    async fn find_employee(&self, id: EmployeeId) -> Result<Employee, EngineError>;

    async fn find_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError>;

    async fn reservations_by_employee(&self, employee_id: EmployeeId) -> Result<Vec<Reservation>, EngineError>;

    async fn all_reservations(&self) -> Result<Vec<Reservation>, EngineError>;
}
