use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, warn};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::*;
use crate::repository::Repository;
use crate::journal::Journal;

// ── Journal writer ────────────────────────────────────────────────

enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the journal file. Appends that queue up while a sync is running
/// are committed together as one batch.
async fn journal_writer(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                while let Ok(next) = rx.try_recv() {
                    match next {
                        JournalCommand::Append { event, response } => batch.push((event, response)),
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
                commit_batch(&mut journal, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut journal, other);
                }
            }
            other => handle_non_append(&mut journal, other),
        }
    }
}

fn commit_batch(journal: &mut Journal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    let outcomes = journal.commit(batch.iter().map(|(event, _)| event));
    let committed = outcomes.iter().filter(|o| o.is_ok()).count();
    metrics::counter!(crate::observability::JOURNAL_RECORDS_TOTAL).increment(committed as u64);
    if committed < batch.len() {
        warn!("journal: {} of {} events not written", batch.len() - committed, batch.len());
    }
    for ((_, response), outcome) in batch.into_iter().zip(outcomes) {
        let _ = response.send(outcome);
    }
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let _ = response.send(journal.compact(&events));
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { event, response } => commit_batch(journal, vec![(event, response)]),
    }
}

// ── Store ─────────────────────────────────────────────────────────

/// Repository kept in `DashMap`s, optionally journaled to disk.
///
/// Every change is an [`Event`]: it is written to the journal first and
/// applied to the maps once the write is durable. Opening a store replays
/// the journal through the same apply path.
pub struct InMemoryStore {
    locations: DashMap<LocationId, Location>,
    employees: DashMap<EmployeeId, Employee>,
    rooms: DashMap<RoomId, Room>,
    /// Location → its rooms, in creation order.
    location_rooms: DashMap<LocationId, Vec<RoomId>>,
    /// Reverse lookup: reservation → owning room.
    reservation_to_room: DashMap<ReservationId, RoomId>,
    journal_tx: Option<mpsc::Sender<JournalCommand>>,
    /// Writers share it; compaction takes it exclusively so no event slips
    /// between the snapshot and the rewrite.
    write_gate: RwLock<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// A store without a journal.
    pub fn new() -> Self {
        Self {
            locations: DashMap::new(),
            employees: DashMap::new(),
            rooms: DashMap::new(),
            location_rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
            journal_tx: None,
            write_gate: RwLock::new(()),
        }
    }

    /// Replay the journal at `path` and keep appending to it. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (journal, events) = Journal::open(path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer(journal, journal_rx));

        let mut store = Self::new();
        for event in &events {
            store.apply(event);
        }
        store.journal_tx = Some(journal_tx);
        info!("replayed {} journal events from {}", events.len(), path.display());
        Ok(store)
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::LocationCreated { id, name } => {
                self.locations.insert(*id, Location { id: *id, name: name.clone() });
                self.location_rooms.entry(*id).or_default();
            }
            Event::EmployeeCreated { id, name } => {
                self.employees.insert(*id, Employee { id: *id, name: name.clone() });
            }
            Event::RoomCreated {
                id,
                location_id,
                floor,
                capacity,
            } => {
                self.rooms.insert(*id, Room::new(*id, *floor, *location_id, *capacity));
                self.location_rooms.entry(*location_id).or_default().push(*id);
            }
            Event::ReservationsReplaced { room_id, reservations } => {
                let Some(mut room) = self.rooms.get_mut(room_id) else {
                    return;
                };
                for old in room.reservations() {
                    // A reservation that moved rooms is already indexed under its new room.
                    self.reservation_to_room.remove_if(&old.id(), |_, owner| owner == room_id);
                }
                room.replace_reservations(reservations.clone());
                for r in reservations {
                    self.reservation_to_room.insert(r.id(), *room_id);
                }
            }
            Event::ReservationDeleted { id, room_id } => {
                if let Some(mut room) = self.rooms.get_mut(room_id) {
                    room.remove_reservation(*id);
                }
                self.reservation_to_room.remove_if(id, |_, owner| owner == room_id);
            }
        }
    }

    async fn journal_append(&self, tx: &mpsc::Sender<JournalCommand>, event: &Event) -> Result<(), EngineError> {
        let (response, rx) = oneshot::channel();
        tx.send(JournalCommand::Append {
            event: event.clone(),
            response,
        })
        .await
        .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    async fn persist_and_apply(&self, event: Event) -> Result<(), EngineError> {
        let _gate = self.write_gate.read().await;
        if let Some(tx) = &self.journal_tx {
            self.journal_append(tx, &event).await?;
        }
        self.apply(&event);
        Ok(())
    }

    // ── Registration ──────────────────────────────────────────────

    pub async fn create_location(&self, name: &str) -> Result<Location, EngineError> {
        check_name(name)?;
        let id = Ulid::new();
        self.persist_and_apply(Event::LocationCreated {
            id,
            name: name.to_string(),
        })
        .await?;
        info!("created location {id} ({name})");
        Ok(Location {
            id,
            name: name.to_string(),
        })
    }

    pub async fn create_employee(&self, name: &str) -> Result<Employee, EngineError> {
        check_name(name)?;
        let id = Ulid::new();
        self.persist_and_apply(Event::EmployeeCreated {
            id,
            name: name.to_string(),
        })
        .await?;
        Ok(Employee {
            id,
            name: name.to_string(),
        })
    }

    pub async fn create_room(&self, location_id: LocationId, floor: i32, capacity: u32) -> Result<Room, EngineError> {
        if capacity > MAX_ROOM_CAPACITY {
            return Err(EngineError::LimitExceeded("room capacity too large"));
        }
        let room_count = self
            .location_rooms
            .get(&location_id)
            .filter(|_| self.locations.contains_key(&location_id))
            .map(|rooms| rooms.len())
            .ok_or(EngineError::LocationNotFound(location_id))?;
        if room_count >= MAX_ROOMS_PER_LOCATION {
            return Err(EngineError::LimitExceeded("too many rooms at location"));
        }

        let id = Ulid::new();
        self.persist_and_apply(Event::RoomCreated {
            id,
            location_id,
            floor,
            capacity,
        })
        .await?;
        info!("created room {id} at location {location_id}: floor {floor}, {capacity} workplaces");
        Ok(Room::new(id, floor, location_id, capacity))
    }

    // ── Introspection ─────────────────────────────────────────────

    pub fn locations(&self) -> Vec<Location> {
        let mut all: Vec<Location> = self.locations.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|l| l.id);
        all
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_to_room.len()
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let Some(tx) = &self.journal_tx else { return 0 };
        let (response, rx) = oneshot::channel();
        if tx.send(JournalCommand::AppendsSinceCompact { response }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Rewrite the journal as the minimal event sequence producing the
    /// current state. No-op without a journal.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let Some(tx) = &self.journal_tx else { return Ok(()) };
        let _gate = self.write_gate.write().await;

        let events = self.snapshot();
        let count = events.len();
        let (response, rx) = oneshot::channel();
        tx.send(JournalCommand::Compact { events, response })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))?;
        info!("compacted journal to {count} events");
        Ok(())
    }

    fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for location in self.locations() {
            events.push(Event::LocationCreated {
                id: location.id,
                name: location.name,
            });
        }
        let mut employees: Vec<Employee> = self.employees.iter().map(|e| e.value().clone()).collect();
        employees.sort_by_key(|e| e.id);
        events.extend(
            employees
                .into_iter()
                .map(|e| Event::EmployeeCreated { id: e.id, name: e.name }),
        );

        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.id);
        for room in rooms {
            events.push(Event::RoomCreated {
                id: room.id,
                location_id: room.location_id,
                floor: room.floor,
                capacity: room.capacity,
            });
            if !room.reservations().is_empty() {
                events.push(Event::ReservationsReplaced {
                    room_id: room.id,
                    reservations: room.reservations,
                });
            }
        }
        events
    }
}

fn check_name(name: &str) -> Result<(), EngineError> {
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

#[async_trait]
impl Repository for InMemoryStore {
    async fn load_room(&self, id: RoomId) -> Result<Room, EngineError> {
        self.rooms
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::RoomNotFound(id))
    }

    async fn load_rooms_by_location(&self, location_id: LocationId) -> Result<Vec<Room>, EngineError> {
        if !self.locations.contains_key(&location_id) {
            return Err(EngineError::LocationNotFound(location_id));
        }
        let ids = self
            .location_rooms
            .get(&location_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.rooms.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn save_room_reservations(
        &self,
        room_id: RoomId,
        reservations: Vec<Reservation>,
    ) -> Result<(), EngineError> {
        if !self.rooms.contains_key(&room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }
        if reservations.len() > MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations in room"));
        }
        self.persist_and_apply(Event::ReservationsReplaced { room_id, reservations })
            .await
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), EngineError> {
        let room_id = self
            .reservation_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::ReservationNotFound(id))?;
        self.persist_and_apply(Event::ReservationDeleted { id, room_id }).await
    }

    async fn find_employee(&self, id: EmployeeId) -> Result<Employee, EngineError> {
        self.employees
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::EmployeeNotFound(id))
    }

    async fn find_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        let room_id = self
            .reservation_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::ReservationNotFound(id))?;
        self.rooms
            .get(&room_id)
            .and_then(|room| room.reservation(id).cloned())
            .ok_or(EngineError::ReservationNotFound(id))
    }

    async fn reservations_by_employee(&self, employee_id: EmployeeId) -> Result<Vec<Reservation>, EngineError> {
        if !self.employees.contains_key(&employee_id) {
            return Err(EngineError::EmployeeNotFound(employee_id));
        }
        let mut mine: Vec<Reservation> = self
            .rooms
            .iter()
            .flat_map(|room| {
                room.reservations()
                    .iter()
                    .filter(|r| r.employee_id() == employee_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        sort_chronologically(&mut mine);
        Ok(mine)
    }

    async fn all_reservations(&self) -> Result<Vec<Reservation>, EngineError> {
        let mut all: Vec<Reservation> = self
            .rooms
            .iter()
            .flat_map(|room| room.reservations().to_vec())
            .collect();
        sort_chronologically(&mut all);
        Ok(all)
    }
}

fn sort_chronologically(reservations: &mut [Reservation]) {
    reservations.sort_by_key(|r| (r.date(), r.start(), r.id()));
}
