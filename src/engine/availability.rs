use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Availability record of a room for `slot`; `available` never goes below 0.
pub fn room_availability(room: &Room, slot: &Timeslot) -> RoomAvailability {
    RoomAvailability {
        room_id: room.id,
        floor: room.floor,
        capacity: room.capacity,
        available: room
            .capacity
            .saturating_sub(room.count_reserved_workplaces(slot, None)),
    }
}

/// Rooms no active reservation touches during `slot`.
///
/// With an active recurrence, a synthetic full-capacity series must also be
/// admissible, so a room that is free today but taken on a later occurrence
/// is left out.
pub fn rooms_fully_available(rooms: &[Room], slot: &Timeslot, recurrence: Recurrence) -> Vec<RoomAvailability> {
    rooms
        .iter()
        .filter(|room| room.is_fully_available(slot))
        .filter(|room| {
            !recurrence.is_active()
                || room.is_capacity_available(&Reservation::hypothetical(room.id, *slot, room.capacity, recurrence), None)
        })
        .map(|room| room_availability(room, slot))
        .collect()
}

/// Rooms that could admit `amount` more workplaces during `slot`, repeating
/// by `recurrence`.
pub fn rooms_with_capacity(
    rooms: &[Room],
    slot: &Timeslot,
    amount: u32,
    recurrence: Recurrence,
) -> Vec<RoomAvailability> {
    rooms
        .iter()
        .filter(|room| room.count_reserved_workplaces(slot, None).saturating_add(amount) <= room.capacity)
        .filter(|room| room.is_capacity_available(&Reservation::hypothetical(room.id, *slot, amount, recurrence), None))
        .map(|room| room_availability(room, slot))
        .collect()
}
