use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::calendar::Week;
use crate::config::PlanConfig;
use crate::limits::REFRESH_SIGNAL_CAPACITY;
use crate::notify::Collection;
use crate::observability::{CONFLICTS, REFRESH_DURATION_SECONDS, REFRESH_FAILURES_TOTAL, REFRESH_TOTAL};
use crate::plan::{WeekPlan, plan_week};
use crate::store::{RecordStore, StoreError, load_week};

#[derive(Default)]
struct PlannerState {
    installed_ticket: u64,
    last_error: Option<String>,
}

/// Owns the latest `WeekPlan`. Every refresh draws a ticket; a finished refresh
/// installs its plan only if no later ticket has installed first.
pub struct Planner<S: RecordStore + ?Sized> {
    store: Arc<S>,
    config: PlanConfig,
    tickets: AtomicU64,
    state: Mutex<PlannerState>,
    plans: watch::Sender<Option<Arc<WeekPlan>>>,
}

impl<S: RecordStore + ?Sized> Planner<S> {
    pub fn new(store: Arc<S>, config: PlanConfig) -> Self {
        let (plans, _) = watch::channel(None);
        Self {
            store,
            config,
            tickets: AtomicU64::new(0),
            state: Mutex::new(PlannerState::default()),
            plans,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Refetch and recompute `week`. `Ok(None)` means a newer refresh won.
    /// On a read error the previously installed plan stays in place.
    pub async fn refresh(&self, week: Week) -> Result<Option<Arc<WeekPlan>>, StoreError> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let data = match load_week(&*self.store, week.range()).await {
            Ok(data) => data,
            Err(e) => {
                metrics::counter!(REFRESH_FAILURES_TOTAL).increment(1);
                warn!("refresh #{ticket} of week {} failed, keeping previous plan: {e}", week.monday());
                let mut state = self.state.lock().await;
                if ticket > state.installed_ticket {
                    state.last_error = Some(e.to_string());
                }
                return Err(e);
            }
        };
        let plan = Arc::new(plan_week(&data, week, &self.config));

        if !self.install(ticket, plan.clone()).await {
            debug!("refresh #{ticket} superseded, result dropped");
            return Ok(None);
        }
        metrics::counter!(REFRESH_TOTAL).increment(1);
        metrics::histogram!(REFRESH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        metrics::gauge!(CONFLICTS).set(plan.conflicts.len() as f64);
        Ok(Some(plan))
    }

    async fn install(&self, ticket: u64, plan: Arc<WeekPlan>) -> bool {
        let mut state = self.state.lock().await;
        if ticket < state.installed_ticket {
            return false;
        }
        state.installed_ticket = ticket;
        state.last_error = None;
        self.plans.send_replace(Some(plan));
        true
    }

    pub fn current(&self) -> Option<Arc<WeekPlan>> {
        self.plans.borrow().clone()
    }

    /// Receiver that observes every installed plan.
    pub fn plans(&self) -> watch::Receiver<Option<Arc<WeekPlan>>> {
        self.plans.subscribe()
    }

    /// Last read failure since the most recent successful install.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }
}

/// Recompute on store changes and week navigation until `week_rx`'s sender is dropped.
///
/// Every collection subscription feeds one bounded signal channel; a full
/// channel already guarantees a pending refresh, so extra signals are dropped.
/// The consumer waits out the debounce window after the first signal, drains
/// whatever arrived meanwhile and refreshes once. Week changes skip the debounce,
/// also when one arrives inside a pending window.
pub fn spawn_refresh_loop<S>(planner: Arc<Planner<S>>, mut week_rx: watch::Receiver<Week>) -> JoinHandle<()>
where
    S: RecordStore + ?Sized + 'static,
{
    let (signal_tx, mut signal_rx) = mpsc::channel::<Collection>(REFRESH_SIGNAL_CAPACITY);
    let forwarders: Vec<JoinHandle<()>> = Collection::ALL
        .into_iter()
        .map(|collection| {
            let mut rx = planner.store.subscribe(collection);
            let tx = signal_tx.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            if tx.is_closed() {
                                break;
                            }
                            let _ = tx.try_send(collection);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        })
        .collect();
    drop(signal_tx);

    tokio::spawn(async move {
        let debounce = planner.config.debounce;
        let mut week = *week_rx.borrow_and_update();
        let _ = planner.refresh(week).await;

        loop {
            tokio::select! {
                changed = week_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    week = *week_rx.borrow_and_update();
                    info!("visible week changed to {} (KW {})", week.monday(), week.iso_week());
                    let _ = planner.refresh(week).await;
                }
                signal = signal_rx.recv() => {
                    let Some(first) = signal else { break };
                    let mut coalesced = 1usize;
                    let window = tokio::time::sleep(debounce);
                    tokio::pin!(window);
                    loop {
                        tokio::select! {
                            _ = &mut window => break,
                            changed = week_rx.changed() => {
                                if changed.is_ok() {
                                    week = *week_rx.borrow_and_update();
                                    info!("visible week changed to {} (KW {})", week.monday(), week.iso_week());
                                }
                                break;
                            }
                            more = signal_rx.recv() => match more {
                                Some(_) => coalesced += 1,
                                None => break,
                            },
                        }
                    }
                    debug!("{coalesced} change signals coalesced (first from {})", first.name());
                    let _ = planner.refresh(week).await;
                }
            }
        }

        for forwarder in forwarders {
            forwarder.abort();
        }
        debug!("refresh loop stopped");
    })
}
