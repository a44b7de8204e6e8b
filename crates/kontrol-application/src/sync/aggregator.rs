//! The sync loop.
//!
//! One tick fans out the four domain fetches, waits for all of them, and then
//! publishes a new [`Snapshot`] in which only domains whose fingerprint moved get
//! a fresh `Arc`. Ticks are serialized by a single mutex, which also guards the
//! fingerprint cache and the publish step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use kontrol_core::error::Result;
use kontrol_core::fingerprint::{
    Fingerprint, config_fingerprint, jobs_fingerprint, sessions_fingerprint, status_fingerprint,
};
use kontrol_core::gateway::{InvocationError, InvokerFactory};
use kontrol_core::session::reconcile_sessions;
use kontrol_core::settings::{GatewaySettings, SettingsEvent, SettingsEventBus, SettingsSource};
use kontrol_core::snapshot::{Domain, LinkState, Snapshot};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::config::SyncConfig;
use super::failures::FailureStreaks;
use super::report::TickReport;
use crate::gateway_api::GatewayApi;

struct Connection {
    settings: GatewaySettings,
    api: GatewayApi,
}

/// Mutable tick state. Only touched while the tick mutex is held.
struct SyncState {
    fingerprints: HashMap<Domain, Fingerprint>,
    failures: FailureStreaks,
}

impl SyncState {
    /// Records a successful fetch; returns whether the domain must be republished.
    fn accept(&mut self, domain: Domain, fingerprint: Fingerprint, report: &mut TickReport) -> bool {
        self.failures.record_success(domain);
        report.succeeded.push(domain);

        if self.fingerprints.get(&domain) == Some(&fingerprint) {
            return false;
        }
        self.fingerprints.insert(domain, fingerprint);
        report.republished.push(domain);
        true
    }

    fn reject(&mut self, domain: Domain, error: &InvocationError, report: &mut TickReport) {
        self.failures.record_failure(domain, error);
        report.failed.push((domain, error.kind()));
    }
}

/// Holds the syncing flag up for the lifetime of a tick.
struct SyncingFlag<'a>(&'a AtomicBool);

impl<'a> SyncingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for SyncingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    source: Arc<dyn SettingsSource>,
    factory: Arc<dyn InvokerFactory>,
    config: SyncConfig,
    connection: RwLock<Connection>,
    state: Mutex<SyncState>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    syncing: AtomicBool,
}

impl Inner {
    async fn reload_settings(&self) -> Result<()> {
        let settings = self.source.load_settings().await?;
        let api = GatewayApi::new(self.factory.connect(&settings));

        tracing::info!(
            "[SyncAggregator] Loaded gateway settings (address: {}, token: {})",
            settings.gateway_url.as_deref().unwrap_or("default"),
            if settings.has_credential() { "present" } else { "none" }
        );

        *self.connection.write().await = Connection { settings, api };
        Ok(())
    }

    async fn tick(&self) -> TickReport {
        let mut state = self.state.lock().await;
        let _syncing = SyncingFlag::raise(&self.syncing);

        let (api, configured) = {
            let connection = self.connection.read().await;
            (connection.api.clone(), connection.settings.has_credential())
        };
        let previous = self.snapshot.borrow().clone();

        if !configured {
            if previous.link != LinkState::Unconfigured {
                tracing::info!("[SyncAggregator] No gateway token configured; skipping fetches");
                self.publish(Snapshot {
                    link: LinkState::Unconfigured,
                    ..(*previous).clone()
                });
            }
            return TickReport::unconfigured();
        }

        let (sessions, status, jobs, config) = tokio::join!(
            api.fetch_sessions(),
            api.fetch_status(),
            api.fetch_jobs(),
            api.fetch_config(),
        );

        let mut next = (*previous).clone();
        let mut report = TickReport::default();

        match sessions {
            Ok(fetched) => {
                let merged = reconcile_sessions(&previous.sessions, fetched);
                if !merged.regressed.is_empty() {
                    tracing::debug!(
                        "[SyncAggregator] Kept newer held sessions over stale fetch: {:?}",
                        merged.regressed
                    );
                }
                if merged.duplicates > 0 {
                    tracing::debug!(
                        "[SyncAggregator] Collapsed {} duplicate session key(s)",
                        merged.duplicates
                    );
                }
                let fingerprint =
                    sessions_fingerprint(&merged.sessions, &self.config.session_fingerprint);
                if state.accept(Domain::Sessions, fingerprint, &mut report) {
                    next.sessions = Arc::new(merged.sessions);
                }
            }
            Err(e) => state.reject(Domain::Sessions, &e, &mut report),
        }

        match status {
            Ok(text) => {
                if state.accept(Domain::Status, status_fingerprint(&text), &mut report) {
                    next.status = Some(Arc::from(text));
                }
            }
            Err(e) => state.reject(Domain::Status, &e, &mut report),
        }

        match jobs {
            Ok(jobs) => {
                if state.accept(Domain::Jobs, jobs_fingerprint(&jobs), &mut report) {
                    next.jobs = Arc::new(jobs);
                }
            }
            Err(e) => state.reject(Domain::Jobs, &e, &mut report),
        }

        match config {
            Ok(config) => {
                if state.accept(Domain::Config, config_fingerprint(&config), &mut report) {
                    next.config = Some(Arc::new(config));
                }
            }
            Err(e) => state.reject(Domain::Config, &e, &mut report),
        }

        if report.connected() {
            if previous.link != LinkState::Connected {
                tracing::info!("[SyncAggregator] Connected to gateway");
            }
            next.link = LinkState::Connected;
            next.last_updated = Some(Utc::now());
            self.publish(next);
        } else {
            let link = if report.misconfigured() {
                LinkState::Unconfigured
            } else {
                LinkState::Disconnected
            };
            if previous.link != link {
                tracing::warn!("[SyncAggregator] Every domain failed; link is now {}", link);
                // Domain values stay as they were; only the link state moves.
                self.publish(Snapshot {
                    link,
                    ..(*previous).clone()
                });
            }
        }

        tracing::debug!(
            "[SyncAggregator] Tick done: {} ok, {} failed, republished {:?}",
            report.succeeded.len(),
            report.failed.len(),
            report.republished
        );
        report
    }

    fn publish(&self, snapshot: Snapshot) {
        // Succeeds with no receivers left.
        self.snapshot.send_replace(Arc::new(snapshot));
    }
}

/// Keeps a [`Snapshot`] of the gateway up to date.
///
/// Settings are read once at construction and again only when a
/// [`SettingsEvent::Changed`] arrives (or [`reload_settings`](Self::reload_settings)
/// is called). Dropping the aggregator stops its background loop.
pub struct SyncAggregator {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl SyncAggregator {
    pub async fn new(
        source: Arc<dyn SettingsSource>,
        factory: Arc<dyn InvokerFactory>,
        config: SyncConfig,
    ) -> Result<Self> {
        let settings = source.load_settings().await?;
        let api = GatewayApi::new(factory.connect(&settings));
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));

        let inner = Inner {
            source,
            factory,
            state: Mutex::new(SyncState {
                fingerprints: HashMap::new(),
                failures: FailureStreaks::new(config.persistent_failure_threshold),
            }),
            config,
            connection: RwLock::new(Connection { settings, api }),
            snapshot,
            syncing: AtomicBool::new(false),
        };

        Ok(Self {
            inner: Arc::new(inner),
            cancel: CancellationToken::new(),
            task: StdMutex::new(None),
        })
    }

    /// Spawns the polling loop. The first tick runs immediately.
    ///
    /// With an event bus, every settings change reloads the settings and runs
    /// one extra tick without disturbing the regular schedule.
    pub fn start(&self, events: Option<&SettingsEventBus>) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            tracing::warn!("[SyncAggregator] start() called while already running");
            return;
        }

        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        let events = events.map(SettingsEventBus::subscribe);
        *task = Some(tokio::spawn(run_loop(inner, cancel, events)));
    }

    /// Runs one tick now and returns once it has settled.
    ///
    /// Waits for a tick already in flight to finish first.
    pub async fn refresh(&self) -> TickReport {
        self.inner.tick().await
    }

    /// Re-reads the settings source and rebuilds the invoker.
    pub async fn reload_settings(&self) -> Result<()> {
        self.inner.reload_settings().await
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Whether a tick is in flight.
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub async fn settings(&self) -> GatewaySettings {
        self.inner.connection.read().await.settings.clone()
    }

    /// The API bound to the current settings, for one-shot calls.
    pub async fn api(&self) -> GatewayApi {
        self.inner.connection.read().await.api.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Stops the loop and waits for a tick in flight to settle.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for SyncAggregator {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }
}

async fn run_loop(
    inner: Arc<Inner>,
    cancel: CancellationToken,
    mut events: Option<broadcast::Receiver<SettingsEvent>>,
) {
    let period = inner.config.effective_poll_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!("[SyncAggregator] Polling every {:?}", period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                inner.tick().await;
            }
            _ = next_settings_change(&mut events) => {
                if let Err(e) = inner.reload_settings().await {
                    tracing::warn!("[SyncAggregator] Failed to reload settings: {}", e);
                }
                inner.tick().await;
            }
        }
    }

    tracing::info!("[SyncAggregator] Polling stopped");
}

/// Resolves on the next settings change. Never resolves once the bus is gone.
async fn next_settings_change(events: &mut Option<broadcast::Receiver<SettingsEvent>>) {
    loop {
        let Some(receiver) = events.as_mut() else {
            return std::future::pending().await;
        };
        match receiver.recv().await {
            Ok(SettingsEvent::Changed) => return,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(
                    "[SyncAggregator] Missed {} settings event(s); treating as a change",
                    skipped
                );
                return;
            }
            Err(RecvError::Closed) => {
                tracing::debug!("[SyncAggregator] Settings bus closed");
                *events = None;
            }
        }
    }
}
