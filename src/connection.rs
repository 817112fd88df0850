use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::error::SyncError;
use crate::remote::{Connector, RemoteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the single live session and the reconnect-in-flight guard.
///
/// Sessions are never repaired in place: every reconnect drops the old store and `connect`
/// builds a brand new one. While a reconnect is pending, further `reconnect` calls are no-ops,
/// so a burst of failures produces exactly one delayed retry.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    session: Option<C::Store>,
    state: SessionState,
    reconnecting: bool,
    reconnect_delay: Duration,
    reconnect_timer: Option<Receiver<Instant>>,
    generation: u64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, reconnect_delay: Duration) -> Self {
        Self {
            connector,
            session: None,
            state: SessionState::Disconnected,
            reconnecting: false,
            reconnect_delay,
            reconnect_timer: None,
            generation: 0,
        }
    }

    /// Open a fresh session, replacing any previous one.
    pub fn connect(&mut self) -> Result<(), SyncError> {
        self.teardown();
        self.state = SessionState::Connecting;
        match self.connector.connect() {
            Ok(store) => {
                self.session = Some(store);
                self.state = SessionState::Connected;
                self.generation += 1;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Schedule a reconnect after the fixed delay. Returns false when one is already pending.
    pub fn reconnect(&mut self) -> bool {
        if self.reconnecting {
            tracing::debug!("reconnect already pending, ignoring");
            return false;
        }
        self.reconnecting = true;
        tracing::warn!(
            "Reconnecting to SFTP in {}s...",
            self.reconnect_delay.as_secs_f64()
        );
        self.teardown();
        self.reconnect_timer = Some(crossbeam_channel::after(self.reconnect_delay));
        true
    }

    /// Receiver that fires once the reconnect delay has elapsed; never fires when idle.
    pub fn reconnect_timer(&self) -> Receiver<Instant> {
        match &self.reconnect_timer {
            Some(rx) => rx.clone(),
            None => crossbeam_channel::never(),
        }
    }

    /// Called when the delay elapsed: clears the guard so `connect` may run again.
    pub fn finish_reconnect_wait(&mut self) {
        self.reconnect_timer = None;
        self.reconnecting = false;
    }

    pub fn session(&self) -> Option<&C::Store> {
        match self.state {
            SessionState::Connected => self.session.as_ref(),
            _ => None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Number of sessions successfully opened so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn teardown(&mut self) {
        if let Some(mut old) = self.session.take()
            && let Err(e) = old.close()
        {
            tracing::debug!("ignoring teardown error: {}", e);
        }
        self.state = SessionState::Disconnected;
    }
}
