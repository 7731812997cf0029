//! At most one probe per address at a time.
//!
//! The first caller for a key becomes the leader and does the work; callers
//! arriving while it runs wait on the same flight and receive its status.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::Status;

#[derive(Debug, Default)]
pub(crate) struct FlightTable {
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

#[derive(Debug, Default)]
pub(crate) struct Flight {
    state: Mutex<FlightState>,
    done: Condvar,
}

#[derive(Debug, Default)]
struct FlightState {
    finished: bool,
    status: Option<Status>,
}

pub(crate) enum Ticket<'a> {
    Leader(LeaderGuard<'a>),
    Follower(Arc<Flight>),
}

impl FlightTable {
    pub(crate) fn join(&self, key: &str) -> Ticket<'_> {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(key) {
            return Ticket::Follower(Arc::clone(flight));
        }
        let flight = Arc::new(Flight::default());
        flights.insert(key.to_string(), Arc::clone(&flight));
        Ticket::Leader(LeaderGuard {
            table: self,
            key: key.to_string(),
            flight,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

impl Flight {
    /// Block until the leader finishes. `None` means the leader went away
    /// without publishing a status.
    pub(crate) fn wait(&self) -> Option<Status> {
        let mut state = self.state.lock();
        while !state.finished {
            self.done.wait(&mut state);
        }
        state.status.clone()
    }
}

/// Held by the leader; dropping it releases waiting followers.
pub(crate) struct LeaderGuard<'a> {
    table: &'a FlightTable,
    key: String,
    flight: Arc<Flight>,
}

impl LeaderGuard<'_> {
    pub(crate) fn complete(self, status: &Status) {
        self.flight.state.lock().status = Some(status.clone());
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.table.flights.lock().remove(&self.key);
        self.flight.state.lock().finished = true;
        self.flight.done.notify_all();
    }
}
