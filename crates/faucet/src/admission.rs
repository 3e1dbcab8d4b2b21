//! Per-client admission control.
//!
//! The filter remembers, for every client key, the most recent granted disbursement
//! and denies further grants until the cooldown window has elapsed. State lives in
//! process memory only: it is lost on restart and is not shared between instances,
//! so the faucet must run as a single instance for the limit to hold.
//!
//! `check` and `record_grant` are the plain read and write halves. The request path
//! uses `try_reserve` instead, which checks and provisionally occupies the client's
//! slot in one step so that two concurrent requests from one client cannot both pass
//! while the first is still waiting on the ledger. A reservation is either committed
//! (becoming the new grant record) or released (restoring the previous record).
//! Dropping an uncommitted reservation releases it, so a cancelled request leaves
//! the client's slot as it found it.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Outcome of the most recent granted request for a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub client_key: String,
    pub timestamp: DateTime<Utc>,
    pub destination: String,
}

/// Why a client was turned away
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    /// Time left until the cooldown expires
    pub retry_after: Duration,
    /// Destination of the grant that started the cooldown
    pub last_destination: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed,
    Denied(Denial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Clone)]
enum ClientSlot {
    Granted(GrantRecord),
    Reserved {
        id: u64,
        record: GrantRecord,
        previous: Option<GrantRecord>,
    },
}

impl ClientSlot {
    fn record(&self) -> &GrantRecord {
        match self {
            ClientSlot::Granted(record) => record,
            ClientSlot::Reserved { record, .. } => record,
        }
    }

    /// Last committed grant, ignoring any in-flight reservation.
    fn committed(&self) -> Option<&GrantRecord> {
        match self {
            ClientSlot::Granted(record) => Some(record),
            ClientSlot::Reserved { previous, .. } => previous.as_ref(),
        }
    }
}

/// Handle for an in-flight disbursement, returned by [`AdmissionFilter::try_reserve`].
///
/// Released on drop unless [`commit`](Reservation::commit) was called.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it"]
pub struct Reservation<'a> {
    filter: &'a AdmissionFilter,
    id: u64,
    client_key: String,
    timestamp: DateTime<Utc>,
    destination: String,
    committed: bool,
}

impl Reservation<'_> {
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// Turn the reservation into the client's grant record.
    pub fn commit(mut self) {
        self.committed = true;
        self.filter
            .record_grant(&self.client_key, self.timestamp, &self.destination);
    }

    /// Abandon the reservation, restoring whatever grant preceded it.
    pub fn release(self) {}
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.filter.release_slot(&self.client_key, self.id);
        }
    }
}

/// In-memory map from client key to its latest grant
#[derive(Debug, Default)]
pub struct AdmissionFilter {
    slots: DashMap<String, ClientSlot>,
    next_id: AtomicU64,
}

impl AdmissionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `client_key` may be granted at `now`. Never mutates state.
    pub fn check(&self, client_key: &str, now: DateTime<Utc>, cooldown: Duration) -> Admission {
        match self.slots.get(client_key) {
            Some(slot) => match evaluate(slot.record(), now, cooldown) {
                Some(denial) => Admission::Denied(denial),
                None => Admission::Allowed,
            },
            None => Admission::Allowed,
        }
    }

    /// Unconditionally overwrite the grant record for `client_key`.
    pub fn record_grant(&self, client_key: &str, now: DateTime<Utc>, destination: &str) {
        let record = GrantRecord {
            client_key: client_key.to_string(),
            timestamp: now,
            destination: destination.to_string(),
        };
        self.slots.insert(client_key.to_string(), ClientSlot::Granted(record));
        debug!(client = %client_key, destination = %destination, "Recorded grant");
    }

    /// Atomically check admission and, if allowed, occupy the client's slot.
    pub fn try_reserve(
        &self,
        client_key: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
        destination: &str,
    ) -> Result<Reservation<'_>, Denial> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = GrantRecord {
            client_key: client_key.to_string(),
            timestamp: now,
            destination: destination.to_string(),
        };

        match self.slots.entry(client_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if let Some(denial) = evaluate(occupied.get().record(), now, cooldown) {
                    return Err(denial);
                }
                let previous = occupied.get().committed().cloned();
                occupied.insert(ClientSlot::Reserved {
                    id,
                    record,
                    previous,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ClientSlot::Reserved {
                    id,
                    record,
                    previous: None,
                });
            }
        }

        Ok(Reservation {
            filter: self,
            id,
            client_key: client_key.to_string(),
            timestamp: now,
            destination: destination.to_string(),
            committed: false,
        })
    }

    fn release_slot(&self, client_key: &str, reservation_id: u64) {
        if let Entry::Occupied(mut occupied) = self.slots.entry(client_key.to_string()) {
            let restore = match occupied.get() {
                ClientSlot::Reserved { id, previous, .. } if *id == reservation_id => {
                    Some(previous.clone())
                }
                // Superseded by a later grant or reservation
                _ => None,
            };

            match restore {
                Some(Some(previous)) => {
                    occupied.insert(ClientSlot::Granted(previous));
                }
                Some(None) => {
                    occupied.remove();
                }
                None => {}
            }
        }
        debug!(client = %client_key, "Released reservation");
    }

    /// Most recent committed grant for `client_key`.
    pub fn grant_for(&self, client_key: &str) -> Option<GrantRecord> {
        self.slots
            .get(client_key)
            .and_then(|slot| slot.committed().cloned())
    }

    /// Drop records and reservations whose cooldown has fully elapsed.
    pub fn prune_expired(&self, now: DateTime<Utc>, cooldown: Duration) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| evaluate(slot.record(), now, cooldown).is_some());
        before.saturating_sub(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn evaluate(record: &GrantRecord, now: DateTime<Utc>, cooldown: Duration) -> Option<Denial> {
    // A clock step backwards counts as no time elapsed
    let elapsed = (now - record.timestamp).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= cooldown {
        return None;
    }
    Some(Denial {
        retry_after: cooldown - elapsed,
        last_destination: record.destination.clone(),
    })
}
