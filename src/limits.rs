//! Hard upper bounds enforced by the engine. Violations surface as
//! `EngineError::LimitExceeded`.

/// Workplaces a single room may hold.
pub const MAX_ROOM_CAPACITY: u32 = 10_000;

/// Reservations stored per room, counting recurring series once.
pub const MAX_RESERVATIONS_PER_ROOM: usize = 10_000;

/// Bytes in a location or employee name.
pub const MAX_NAME_LEN: usize = 256;

/// Rooms registered per location.
pub const MAX_ROOMS_PER_LOCATION: usize = 1_000;

/// Days past the latest start date over which a recurring request is
/// checked date by date against other series. Four years cover a full
/// leap cycle.
pub const RECURRENCE_LOOKAHEAD_DAYS: i64 = 4 * 365 + 1;
