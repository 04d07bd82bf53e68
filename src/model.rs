use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::{today, validate_timeslot, EngineError};
use crate::limits::*;

pub type RoomId = Ulid;
pub type ReservationId = Ulid;
pub type EmployeeId = Ulid;
pub type LocationId = Ulid;

/// A date plus a closed `[start, end]` time window on that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeslot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Timeslot {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { date, start, end }
    }

    /// Inclusive time-of-day intersection; touching boundaries count.
    pub fn times_overlap(&self, other: &Timeslot) -> bool {
        other.start <= self.end && other.end >= self.start
    }

    pub fn contains_time(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    None,
}

impl RecurrencePattern {
    /// Whether a series anchored on `origin` lands on `date` (ignoring which
    /// of the two comes first).
    pub fn matches(self, origin: NaiveDate, date: NaiveDate) -> bool {
        match self {
            RecurrencePattern::Daily => true,
            RecurrencePattern::Weekly => origin.weekday() == date.weekday(),
            RecurrencePattern::Biweekly => {
                origin.weekday() == date.weekday()
                    && origin.iso_week().week() % 2 == date.iso_week().week() % 2
            }
            RecurrencePattern::Monthly => origin.day() == date.day(),
            RecurrencePattern::None => origin == date,
        }
    }
}

/// Repeat rule of a reservation. `active` and `pattern` never disagree:
/// an inactive recurrence always carries `RecurrencePattern::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recurrence {
    active: bool,
    pattern: RecurrencePattern,
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::none()
    }
}

impl Recurrence {
    /// Normalizes inconsistent input (inactive with a pattern, active without
    /// one) to the non-recurring state.
    pub fn new(active: bool, pattern: Option<RecurrencePattern>) -> Self {
        match pattern {
            Some(p) if active && p != RecurrencePattern::None => Self { active: true, pattern: p },
            _ => Self::none(),
        }
    }

    pub const NONE: Self = Self {
        active: false,
        pattern: RecurrencePattern::None,
    };

    pub fn none() -> Self {
        Self::NONE
    }

    pub fn from_pattern(pattern: RecurrencePattern) -> Self {
        Self::new(pattern != RecurrencePattern::None, Some(pattern))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pattern(&self) -> RecurrencePattern {
        self.pattern
    }
}

/// A booking of `workplace_amount` workplaces in one room.
///
/// Only obtainable through [`Reservation::new`] or [`Reservation::legacy`],
/// so every value has `start <= end` and a positive workplace amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    slot: Timeslot,
    employee_id: EmployeeId,
    room_id: RoomId,
    workplace_amount: u32,
    recurrence: Recurrence,
}

impl Reservation {
    pub fn new(
        room_id: RoomId,
        employee_id: EmployeeId,
        slot: Timeslot,
        workplace_amount: u32,
        recurrence: Recurrence,
    ) -> Result<Self, EngineError> {
        validate_timeslot(&slot, today(), false)?;
        Self::build(room_id, employee_id, slot, workplace_amount, recurrence)
    }

    /// Historical import: the date may lie in the past, the time range is
    /// still checked.
    pub fn legacy(
        room_id: RoomId,
        employee_id: EmployeeId,
        slot: Timeslot,
        workplace_amount: u32,
        recurrence: Recurrence,
    ) -> Result<Self, EngineError> {
        validate_timeslot(&slot, today(), true)?;
        Self::build(room_id, employee_id, slot, workplace_amount, recurrence)
    }

    fn build(
        room_id: RoomId,
        employee_id: EmployeeId,
        slot: Timeslot,
        workplace_amount: u32,
        recurrence: Recurrence,
    ) -> Result<Self, EngineError> {
        if workplace_amount == 0 {
            return Err(EngineError::LimitExceeded("workplace amount must be at least 1"));
        }
        if workplace_amount > MAX_ROOM_CAPACITY {
            return Err(EngineError::LimitExceeded("workplace amount too large"));
        }
        Ok(Self {
            id: Ulid::new(),
            slot,
            employee_id,
            room_id,
            workplace_amount,
            recurrence,
        })
    }

    /// Synthetic candidate used by availability queries to simulate an
    /// admission without a real employee behind it.
    pub(crate) fn hypothetical(room_id: RoomId, slot: Timeslot, workplace_amount: u32, recurrence: Recurrence) -> Self {
        Self {
            id: Ulid::new(),
            slot,
            employee_id: Ulid::nil(),
            room_id,
            workplace_amount,
            recurrence,
        }
    }

    /// Reuse an existing id, e.g. when an update replaces a reservation.
    pub(crate) fn with_id(mut self, id: ReservationId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn slot(&self) -> &Timeslot {
        &self.slot
    }

    pub fn date(&self) -> NaiveDate {
        self.slot.date
    }

    pub fn start(&self) -> NaiveTime {
        self.slot.start
    }

    pub fn end(&self) -> NaiveTime {
        self.slot.end
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn workplace_amount(&self) -> u32 {
        self.workplace_amount
    }

    pub fn recurrence(&self) -> Recurrence {
        self.recurrence
    }

    /// A recurring reservation never expires.
    pub fn is_active(&self, reference: NaiveDate) -> bool {
        self.slot.date >= reference || self.recurrence.is_active()
    }

    /// Whether an occurrence of this reservation falls on `date`.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        if date == self.slot.date {
            return true;
        }
        self.recurrence.is_active()
            && date > self.slot.date
            && self.recurrence.pattern().matches(self.slot.date, date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
}

/// Aggregate root: a room and the reservations it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub floor: i32,
    pub location_id: LocationId,
    /// Total number of workplaces.
    pub capacity: u32,
    /// Kept sorted by date, then start time.
    pub(crate) reservations: Vec<Reservation>,
}

impl Room {
    pub fn new(id: RoomId, floor: i32, location_id: LocationId, capacity: u32) -> Self {
        Self {
            id,
            floor,
            location_id,
            capacity,
            reservations: Vec::new(),
        }
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// Insert maintaining order by (date, start).
    pub(crate) fn insert_reservation(&mut self, reservation: Reservation) {
        let key = (reservation.date(), reservation.start());
        let pos = self
            .reservations
            .partition_point(|r| (r.date(), r.start()) <= key);
        self.reservations.insert(pos, reservation);
    }

    pub(crate) fn remove_reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub(crate) fn replace_reservations(&mut self, reservations: Vec<Reservation>) {
        self.reservations.clear();
        for r in reservations {
            self.insert_reservation(r);
        }
    }
}

/// Availability of one room for a queried timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: RoomId,
    pub floor: i32,
    pub capacity: u32,
    pub available: u32,
}

/// Journal record format. Each event is self-contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    LocationCreated {
        id: LocationId,
        name: String,
    },
    EmployeeCreated {
        id: EmployeeId,
        name: String,
    },
    RoomCreated {
        id: RoomId,
        location_id: LocationId,
        floor: i32,
        capacity: u32,
    },
    /// Atomic replacement of a room's whole reservation set.
    ReservationsReplaced {
        room_id: RoomId,
        reservations: Vec<Reservation>,
    },
    ReservationDeleted {
        id: ReservationId,
        room_id: RoomId,
    },
}
