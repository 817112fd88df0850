use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

/// Periodic reconciliation and keep-alive triggers bound to one session generation.
///
/// Arming always drops the previous tickers first, so at most one periodic trigger of each
/// kind exists. Both are armed and disarmed together.
pub struct Scheduler {
    interval: Duration,
    keepalive_interval: Duration,
    ticker: Option<Receiver<Instant>>,
    keepalive: Option<Receiver<Instant>>,
    generation: Option<u64>,
}

impl Scheduler {
    pub fn new(interval: Duration, keepalive_interval: Duration) -> Self {
        Self { interval, keepalive_interval, ticker: None, keepalive: None, generation: None }
    }

    pub fn arm(&mut self, generation: u64) {
        self.disarm();
        tracing::info!(
            "Checking remote files every {} minutes",
            self.interval.as_secs_f64() / 60.0
        );
        self.ticker = Some(crossbeam_channel::tick(self.interval));
        self.keepalive = Some(crossbeam_channel::tick(self.keepalive_interval));
        self.generation = Some(generation);
    }

    pub fn disarm(&mut self) {
        if let Some(g) = self.generation.take() {
            tracing::debug!("periodic check for session #{} stopped", g);
        }
        self.ticker = None;
        self.keepalive = None;
    }

    /// Receiver for the next tick; never fires while disarmed.
    pub fn receiver(&self) -> Receiver<Instant> {
        match &self.ticker {
            Some(rx) => rx.clone(),
            None => crossbeam_channel::never(),
        }
    }

    pub fn keepalive_receiver(&self) -> Receiver<Instant> {
        match &self.keepalive {
            Some(rx) => rx.clone(),
            None => crossbeam_channel::never(),
        }
    }

    pub fn armed_for(&self) -> Option<u64> {
        self.generation
    }
}
