use chrono::{Duration, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::conflict::{overlaps, reservations_overlap};
use super::EngineError;

/// Reservations from `scope` whose (possibly recurring) slot collides with `slot`.
pub fn overlapping_in<'a>(
    scope: impl IntoIterator<Item = &'a Reservation>,
    slot: &Timeslot,
) -> Vec<&'a Reservation> {
    scope
        .into_iter()
        .filter(|r| overlaps(r.slot(), r.recurrence(), slot))
        .collect()
}

/// Highest summed amount of `reservations` at a single instant of `window`.
/// Every reservation passed in must intersect `window`.
fn peak_load(reservations: &[&Reservation], window: &Timeslot) -> u32 {
    reservations
        .iter()
        .map(|r| r.start().max(window.start))
        .map(|t| {
            reservations
                .iter()
                .filter(|r| r.slot().contains_time(t))
                .fold(0u32, |acc, r| acc.saturating_add(r.workplace_amount()))
        })
        .max()
        .unwrap_or(0)
}

// ── Room aggregate: capacity accounting and admission ─────────────

impl Room {
    /// Workplaces already taken by reservations colliding with `slot`,
    /// optionally ignoring one reservation (an update's prior version).
    pub fn count_reserved_workplaces(&self, slot: &Timeslot, excluding: Option<ReservationId>) -> u32 {
        self.reservations
            .iter()
            .filter(|r| Some(r.id()) != excluding)
            .filter(|r| {
                r.is_active(slot.date)
                    && slot.date >= r.date()
                    && overlaps(r.slot(), r.recurrence(), slot)
            })
            .fold(0u32, |acc, r| acc.saturating_add(r.workplace_amount()))
    }

    /// No active reservation touches `slot` at all.
    pub fn is_fully_available(&self, slot: &Timeslot) -> bool {
        !self
            .reservations
            .iter()
            .any(|r| r.is_active(slot.date) && overlaps(r.slot(), r.recurrence(), slot))
    }

    pub fn overlapping_reservations(&self, slot: &Timeslot) -> Vec<&Reservation> {
        overlapping_in(&self.reservations, slot)
    }

    /// Recurrence-aware admission check for `candidate`.
    ///
    /// For every active reservation `e`, the reservations co-resident with
    /// `e`'s occurrence that also collide with the candidate are summed; one
    /// such group going over capacity rejects. Then every date the candidate
    /// occurs on is checked against what actually occurs on that date, which
    /// catches series of different families that only meet on later
    /// occurrences.
    pub fn is_capacity_available(&self, candidate: &Reservation, excluding: Option<ReservationId>) -> bool {
        let pool: Vec<&Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.id() != candidate.id() && Some(r.id()) != excluding)
            .collect();
        let wanted = candidate.workplace_amount();

        for existing in pool.iter().filter(|e| e.is_active(candidate.date())) {
            let load = overlapping_in(pool.iter().copied(), existing.slot())
                .into_iter()
                .filter(|r| reservations_overlap(candidate, r))
                .fold(0u32, |acc, r| acc.saturating_add(r.workplace_amount()));
            if load.saturating_add(wanted) > self.capacity {
                return false;
            }
        }

        self.fits_on_every_date(candidate, &pool)
    }

    /// Peak load on each candidate date, for every date up to the latest
    /// start involved (plus [`RECURRENCE_LOOKAHEAD_DAYS`] when two series
    /// meet), must leave room for the candidate.
    fn fits_on_every_date(&self, candidate: &Reservation, pool: &[&Reservation]) -> bool {
        let wanted = candidate.workplace_amount();
        let touching: Vec<&Reservation> = pool
            .iter()
            .copied()
            .filter(|r| r.slot().times_overlap(candidate.slot()))
            .collect();

        let mut last = candidate.date();
        if candidate.recurrence().is_active() {
            last = touching.iter().map(|r| r.date()).fold(last, NaiveDate::max);
            if touching.iter().any(|r| r.recurrence().is_active()) {
                last = last
                    .checked_add_signed(Duration::days(RECURRENCE_LOOKAHEAD_DAYS))
                    .unwrap_or(NaiveDate::MAX);
            }
        }

        candidate
            .date()
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| candidate.occurs_on(*d))
            .all(|d| {
                let on_date: Vec<&Reservation> = touching.iter().copied().filter(|r| r.occurs_on(d)).collect();
                peak_load(&on_date, candidate.slot()).saturating_add(wanted) <= self.capacity
            })
    }

    fn admit(&self, candidate: &Reservation, excluding: Option<ReservationId>) -> Result<(), EngineError> {
        let wanted = candidate.workplace_amount();
        let available = self
            .capacity
            .saturating_sub(self.count_reserved_workplaces(candidate.slot(), excluding));
        if wanted > available {
            return Err(EngineError::CapacityExceeded { wanted, available });
        }
        if !self.is_capacity_available(candidate, excluding) {
            return Err(EngineError::RoomUnavailable(self.id));
        }
        Ok(())
    }

    /// Admit and insert. The reservation set is untouched on error.
    pub fn add_reservation(&mut self, candidate: Reservation) -> Result<(), EngineError> {
        self.admit(&candidate, None)?;
        if self.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations in room"));
        }
        self.insert_reservation(candidate);
        Ok(())
    }

    /// Replace reservation `old` by `new`, admitting `new` as if `old` were
    /// already gone. Returns the replaced reservation. All-or-nothing.
    pub fn update_reservation(&mut self, old: ReservationId, new: Reservation) -> Result<Reservation, EngineError> {
        if self.reservation(old).is_none() {
            return Err(EngineError::ReservationNotFound(old));
        }
        self.admit(&new, Some(old))?;
        let replaced = self
            .remove_reservation(old)
            .ok_or(EngineError::ReservationNotFound(old))?;
        self.insert_reservation(new);
        Ok(replaced)
    }
}
