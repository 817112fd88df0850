use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, select};

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::diff::{Reconciliation, reconcile};
use crate::error::{ErrorClass, SyncError};
use crate::ingest::Ingest;
use crate::pipeline::{BatchReport, dispatch};
use crate::remote::{Connector, RemoteStore};
use crate::scheduler::Scheduler;

/// Settings the engine needs from [`Config`], kept separate so tests can build them directly.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub extension: String,
    pub sync_interval: Duration,
    pub reconnect_delay: Duration,
    pub keepalive_interval: Duration,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            remote_dir: config.remote_dir.clone(),
            local_dir: config.local_dir.clone(),
            extension: config.extension.clone(),
            sync_interval: config.sync_interval,
            reconnect_delay: config.reconnect_delay,
            keepalive_interval: config.remote.keepalive,
        }
    }
}

/// Outcome of one reconciliation + dispatch pass.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub reconciliation: Reconciliation,
    pub batch: BatchReport,
}

/// Single-threaded sync loop: connection lifecycle, periodic reconciliation and dispatch.
///
/// Every remote call, local filesystem call and ingestion run happens on the thread calling
/// [`SyncEngine::run_until`]; timers are multiplexed with `select!`, so cycles never overlap.
pub struct SyncEngine<C: Connector, I: Ingest> {
    settings: EngineSettings,
    conn: ConnectionManager<C>,
    scheduler: Scheduler,
    ingest: I,
}

impl<C: Connector, I: Ingest> SyncEngine<C, I> {
    pub fn new(settings: EngineSettings, connector: C, ingest: I) -> Self {
        let conn = ConnectionManager::new(connector, settings.reconnect_delay);
        let scheduler = Scheduler::new(settings.sync_interval, settings.keepalive_interval);
        Self { settings, conn, scheduler, ingest }
    }

    /// Run until `shutdown` yields a message or disconnects. Never returns on its own.
    pub fn run_until(&mut self, shutdown: Receiver<()>) {
        self.connect_and_sync();
        loop {
            let tick = self.scheduler.receiver();
            let keepalive = self.scheduler.keepalive_receiver();
            let retry = self.conn.reconnect_timer();
            select! {
                recv(tick) -> _ => self.sync_cycle(),
                recv(keepalive) -> _ => self.keep_alive(),
                recv(retry) -> _ => {
                    self.conn.finish_reconnect_wait();
                    self.connect_and_sync();
                }
                recv(shutdown) -> _ => {
                    tracing::info!("Shutting down sync engine");
                    self.scheduler.disarm();
                    break;
                }
            }
        }
    }

    /// Connect, run one cycle and return. Errors are returned instead of entering the retry loop.
    pub fn run_once(&mut self) -> Result<CycleReport, SyncError> {
        self.conn.connect()?;
        tracing::info!("Connected to SFTP (session #{})", self.conn.generation());
        self.cycle()
    }

    /// Connect; on success run the immediate cycle and arm the periodic trigger.
    pub fn connect_and_sync(&mut self) {
        self.scheduler.disarm();
        match self.conn.connect() {
            Ok(()) => {
                let generation = self.conn.generation();
                tracing::info!("Connected to SFTP, session #{} kept alive", generation);
                self.sync_cycle();
                // the immediate cycle may already have scheduled a reconnect
                if self.conn.session().is_some() {
                    self.scheduler.arm(generation);
                }
            }
            Err(e) => {
                tracing::error!("Initial SFTP error: {}", e);
                self.conn.reconnect();
            }
        }
    }

    /// One reconciliation cycle with failure routing; never propagates.
    pub fn sync_cycle(&mut self) {
        let started = Instant::now();
        match self.cycle() {
            Ok(report) => {
                if !report.batch.downloaded.is_empty() {
                    tracing::info!(
                        "Cycle finished in {:.1}s: {} downloaded, {} failed processing",
                        started.elapsed().as_secs_f64(),
                        report.batch.downloaded.len(),
                        report.batch.failed()
                    );
                }
            }
            Err(e) => self.handle_failure(e),
        }
    }

    /// Ping the idle session between cycles; a failed ping is handled like a lost connection.
    pub fn keep_alive(&mut self) {
        let result = match self.conn.session() {
            Some(store) => store.keepalive(),
            None => return,
        };
        match result {
            Ok(next) => tracing::debug!("keep-alive ok, next due in {}s", next),
            Err(e) => {
                tracing::error!("SFTP keep-alive failed: {}", e);
                self.drop_session();
            }
        }
    }

    fn cycle(&self) -> Result<CycleReport, SyncError> {
        let store = self.conn.session().ok_or(SyncError::NotConnected)?;
        let s = &self.settings;
        let reconciliation = reconcile(store, &s.remote_dir, &s.local_dir, &s.extension)?;
        let batch = dispatch(
            store,
            reconciliation.pending.clone(),
            &s.remote_dir,
            &s.local_dir,
            &self.ingest,
        )?;
        Ok(CycleReport { reconciliation, batch })
    }

    fn handle_failure(&mut self, e: SyncError) {
        match e.class() {
            ErrorClass::Connection => {
                tracing::error!("Error syncing {} files: {}", self.settings.extension, e);
                self.drop_session();
            }
            ErrorClass::LocalFs => {
                tracing::error!("Local directory error, skipping this cycle: {}", e);
            }
            ErrorClass::Ingestion | ErrorClass::Config => {
                tracing::error!("{}", e);
            }
        }
    }

    fn drop_session(&mut self) {
        self.scheduler.disarm();
        self.conn.reconnect();
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.conn
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
