//! Concurrent channel → session store.
//!
//! Each channel owns a slot holding its session behind an async mutex, so
//! work on one channel is serialized while other channels run in parallel.
//! The slot mirrors the session's last activity and closed flag in atomics,
//! which lets the idle sweeper work without waiting on a busy channel.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use {
    chrono::{DateTime, TimeDelta, Utc},
    dashmap::{DashMap, mapref::entry::Entry},
    otis_common::types::ChannelId,
    tokio::sync::{Mutex, MutexGuard},
    tracing::debug,
};

use crate::{
    machine::Event,
    session::Session,
};

struct SessionSlot {
    session: Mutex<Session>,
    last_activity_ms: AtomicI64,
    closed: AtomicBool,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            last_activity_ms: AtomicI64::new(session.last_activity().timestamp_millis()),
            closed: AtomicBool::new(session.state().is_terminal()),
            session: Mutex::new(session),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn sync(&self, session: &Session) {
        self.last_activity_ms
            .fetch_max(session.last_activity().timestamp_millis(), Ordering::AcqRel);
        if session.state().is_terminal() {
            self.closed.store(true, Ordering::Release);
        }
    }
}

/// Shared reference to one channel's session.
#[derive(Clone)]
pub struct SessionHandle {
    channel_id: ChannelId,
    slot: Arc<SessionSlot>,
}

impl SessionHandle {
    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Wait for exclusive access to the session.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            slot: &self.slot,
            session: self.slot.session.lock().await,
        }
    }

    /// True once the session closed or was expired out of the table.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("channel_id", &self.channel_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusive access to a session. Activity and closure are published to the
/// table when the guard drops, or earlier via [`SessionGuard::commit`].
pub struct SessionGuard<'a> {
    slot: &'a SessionSlot,
    session: MutexGuard<'a, Session>,
}

impl SessionGuard<'_> {
    pub fn commit(&self) {
        self.slot.sync(&self.session);
    }

    /// True if the sweeper removed this session while it was held.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.slot.is_closed() && !self.session.state().is_terminal()
    }
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.slot.sync(&self.session);
    }
}

pub struct SessionTable {
    slots: DashMap<ChannelId, Arc<SessionSlot>>,
    history_cap: usize,
}

impl SessionTable {
    /// Empty table; new sessions keep at most `history_cap` turns.
    #[must_use]
    pub fn new(history_cap: usize) -> Self {
        Self {
            slots: DashMap::new(),
            history_cap,
        }
    }

    /// Return the channel's live session, creating a fresh `Idle` one if
    /// there is none or the stored one has closed.
    ///
    /// Concurrent callers for the same channel all receive the same session.
    pub fn get_or_create(&self, channel_id: ChannelId, now: DateTime<Utc>) -> SessionHandle {
        let slot = match self.slots.entry(channel_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    debug!(channel_id = %channel_id, "replacing closed session");
                    let fresh = self.fresh_slot(channel_id, now);
                    entry.insert(Arc::clone(&fresh));
                    fresh
                } else {
                    Arc::clone(entry.get())
                }
            },
            Entry::Vacant(entry) => {
                debug!(channel_id = %channel_id, "session created");
                let fresh = self.fresh_slot(channel_id, now);
                entry.insert(Arc::clone(&fresh));
                fresh
            },
        };
        SessionHandle { channel_id, slot }
    }

    /// The channel's live session, if any. Never creates one.
    #[must_use]
    pub fn get(&self, channel_id: ChannelId) -> Option<SessionHandle> {
        self.slots
            .get(&channel_id)
            .filter(|slot| !slot.is_closed())
            .map(|slot| SessionHandle {
                channel_id,
                slot: Arc::clone(slot.value()),
            })
    }

    /// Replace the stored session. The last writer wins.
    pub fn put(&self, channel_id: ChannelId, session: Session) {
        self.slots
            .insert(channel_id, Arc::new(SessionSlot::new(session)));
    }

    /// Remove sessions whose last activity is older than `max_idle` before
    /// `now`, plus any closed ones still stored. Returns how many live
    /// sessions expired.
    pub fn expire_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| now.checked_sub_signed(idle))
        else {
            return 0;
        };
        let cutoff_ms = cutoff.timestamp_millis();

        let mut expired = 0;
        self.slots.retain(|channel_id, slot| {
            if slot.is_closed() {
                return false;
            }
            if slot.last_activity_ms.load(Ordering::Acquire) >= cutoff_ms {
                return true;
            }
            slot.closed.store(true, Ordering::Release);
            // A busy session is closed by whoever holds it.
            if let Ok(mut session) = slot.session.try_lock() {
                let _ = session.apply(Event::Expired);
            }
            debug!(channel_id = %channel_id, "session expired");
            expired += 1;
            false
        });
        expired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.get(channel_id).is_some()
    }

    fn fresh_slot(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Arc<SessionSlot> {
        Arc::new(SessionSlot::new(Session::new(
            channel_id,
            self.history_cap,
            now,
        )))
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(40)
    }
}
