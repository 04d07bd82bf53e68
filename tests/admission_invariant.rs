use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use proptest::prelude::*;

use worqplace::engine::{today, Engine, EngineError, ReservationRequest};
use worqplace::limits::RECURRENCE_LOOKAHEAD_DAYS;
use worqplace::model::*;
use worqplace::repository::Repository;
use worqplace::store::InMemoryStore;

/// Days after the first bookable day that are checked for overbooking.
const WINDOW_DAYS: i64 = 70;

/// Latest first day a generated booking can have.
const LAST_START_DAY: i64 = 35;

#[derive(Debug, Clone)]
struct Booking {
    day: i64,
    start: u32,
    hours: u32,
    amount: u32,
    pattern: RecurrencePattern,
}

#[derive(Debug, Clone)]
enum Op {
    Reserve(Booking),
    Update(usize, Booking),
    Delete(usize),
}

fn pattern() -> impl Strategy<Value = RecurrencePattern> {
    prop_oneof![
        3 => Just(RecurrencePattern::None),
        1 => Just(RecurrencePattern::Daily),
        2 => Just(RecurrencePattern::Weekly),
        1 => Just(RecurrencePattern::Biweekly),
        1 => Just(RecurrencePattern::Monthly),
    ]
}

fn booking() -> impl Strategy<Value = Booking> {
    (0i64..LAST_START_DAY, 8u32..18, 0u32..4, 1u32..4, pattern()).prop_map(|(day, start, hours, amount, pattern)| Booking {
        day,
        start,
        hours,
        amount,
        pattern,
    })
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => booking().prop_map(Op::Reserve),
        2 => (any::<usize>(), booking()).prop_map(|(i, b)| Op::Update(i, b)),
        1 => any::<usize>().prop_map(Op::Delete),
    ]
}

fn to_request(room: &Room, employee: &Employee, base: NaiveDate, b: &Booking) -> ReservationRequest {
    let hour = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
    ReservationRequest {
        room_id: room.id,
        employee_id: employee.id,
        slot: Timeslot::new(base + Duration::days(b.day), hour(b.start), hour(b.start + b.hours)),
        workplace_amount: b.amount,
        recurrence: Recurrence::from_pattern(b.pattern),
    }
}

/// Peak load of a closed-interval set is reached at one of the start times,
/// so probing those on every date of the window is enough.
fn overbooked(room: &Room, base: NaiveDate) -> Option<String> {
    for offset in 0..WINDOW_DAYS {
        let date = base + Duration::days(offset);
        let on_date: Vec<&Reservation> = room.reservations().iter().filter(|r| r.occurs_on(date)).collect();
        for instant in on_date.iter().map(|r| r.start()) {
            let load: u32 = on_date
                .iter()
                .filter(|r| r.start() <= instant && instant <= r.end())
                .map(|r| r.workplace_amount())
                .sum();
            if load > room.capacity {
                return Some(format!(
                    "{load} workplaces reserved at {date} {instant}, capacity {}: {:?}",
                    room.capacity, on_date
                ));
            }
        }
    }
    None
}

/// Whether adding `candidate` to `room` would put more workplaces than the
/// room has on some date up to `last`, counting everything that occurs on
/// that date and overlaps the candidate's time window.
fn rejection_justified(room: &Room, candidate: &Reservation, last: NaiveDate) -> bool {
    candidate
        .date()
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| candidate.occurs_on(*d))
        .any(|d| {
            let load: u32 = room
                .reservations()
                .iter()
                .filter(|r| r.occurs_on(d) && r.slot().times_overlap(candidate.slot()))
                .map(|r| r.workplace_amount())
                .sum();
            load + candidate.workplace_amount() > room.capacity
        })
}

fn expected_rejection(e: &EngineError) -> bool {
    matches!(e, EngineError::CapacityExceeded { .. } | EngineError::RoomUnavailable(_))
}

#[derive(Debug, Default)]
struct Violations {
    overbooking: Option<String>,
    false_rejection: Option<String>,
}

async fn run(capacity: u32, ops: Vec<Op>) -> Violations {
    let store = Arc::new(InMemoryStore::new());
    let location = store.create_location("Utrecht").await.unwrap();
    let employee = store.create_employee("Ada").await.unwrap();
    let room = store.create_room(location.id, 0, capacity).await.unwrap();
    let engine = Engine::new(store.clone());
    let base = today() + Duration::days(1);
    let horizon = base + Duration::days(LAST_START_DAY + RECURRENCE_LOOKAHEAD_DAYS);
    let mut committed: Vec<ReservationId> = Vec::new();
    let mut found = Violations::default();

    for op in ops {
        let outcome = match &op {
            Op::Reserve(b) => engine
                .reserve_workplaces(to_request(&room, &employee, base, b))
                .await
                .map(|r| committed.push(r.id())),
            Op::Update(i, b) if !committed.is_empty() => {
                let id = committed[i % committed.len()];
                engine
                    .update_reservation(id, to_request(&room, &employee, base, b))
                    .await
                    .map(|_| ())
            }
            Op::Delete(i) if !committed.is_empty() => {
                let id = committed.remove(i % committed.len());
                engine.delete_reservation(id, employee.id).await
            }
            _ => Ok(()),
        };
        if let Err(e) = &outcome
            && !expected_rejection(e)
        {
            found.overbooking = Some(format!("{op:?} failed unexpectedly: {e}"));
            return found;
        }

        let snapshot = store.load_room(room.id).await.unwrap();

        // A series matches dates before its own start too, so a rejection
        // is only traced back to a full date when no series in the room
        // starts after the candidate.
        if let (Op::Reserve(b), Err(e)) = (&op, &outcome)
            && found.false_rejection.is_none()
        {
            let request = to_request(&room, &employee, base, b);
            let candidate =
                Reservation::new(room.id, employee.id, request.slot, b.amount, request.recurrence).unwrap();
            let traceable = snapshot
                .reservations()
                .iter()
                .all(|r| !r.recurrence().is_active() || r.date() <= candidate.date());
            if traceable && !rejection_justified(&snapshot, &candidate, horizon) {
                found.false_rejection = Some(format!(
                    "{op:?} rejected with {e} though no date is full: {:?}",
                    snapshot.reservations()
                ));
            }
        }

        if let Some(violation) = overbooked(&snapshot, base) {
            found.overbooking = Some(format!("after {op:?}: {violation}"));
            return found;
        }
    }
    found
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn committed_reservations_never_exceed_capacity(
        capacity in 1u32..6,
        ops in prop::collection::vec(op(), 1..30),
    ) {
        let found = tokio_test::block_on(run(capacity, ops));
        prop_assert!(found.overbooking.is_none(), "{}", found.overbooking.unwrap_or_default());
    }

    #[test]
    fn rejections_point_at_a_full_date(
        capacity in 1u32..8,
        bookings in prop::collection::vec(booking(), 1..20),
    ) {
        let ops = bookings.into_iter().map(Op::Reserve).collect();
        let found = tokio_test::block_on(run(capacity, ops));
        prop_assert!(found.overbooking.is_none(), "{}", found.overbooking.unwrap_or_default());
        prop_assert!(found.false_rejection.is_none(), "{}", found.false_rejection.unwrap_or_default());
    }
}

#[test]
fn daily_and_weekly_series_collide_on_later_dates() {
    tokio_test::block_on(async {
        let ops = vec![
            Op::Reserve(Booking {
                day: 1,
                start: 9,
                hours: 1,
                amount: 1,
                pattern: RecurrencePattern::Daily,
            }),
            Op::Reserve(Booking {
                day: 0,
                start: 9,
                hours: 1,
                amount: 1,
                pattern: RecurrencePattern::Weekly,
            }),
        ];
        assert!(run(1, ops).await.overbooking.is_none());
    });
}

#[test]
fn weekly_series_fits_around_one_offs_in_different_weeks() {
    tokio_test::block_on(async {
        let once = |day, amount| Booking {
            day,
            start: 9,
            hours: 1,
            amount,
            pattern: RecurrencePattern::None,
        };
        let ops = vec![
            Op::Reserve(once(7, 3)),
            Op::Reserve(once(14, 3)),
            Op::Reserve(Booking {
                pattern: RecurrencePattern::Weekly,
                ..once(0, 5)
            }),
            // Week one is now at 8 of 10.
            Op::Reserve(once(7, 3)),
        ];
        let found = run(10, ops).await;
        assert!(found.overbooking.is_none(), "{:?}", found.overbooking);
        assert!(found.false_rejection.is_none(), "{:?}", found.false_rejection);
    });
}
