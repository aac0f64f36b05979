// Scheduler module
// Periodic fetch-and-recommend loop with acknowledged cancellation


use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Work the scheduler repeats
pub trait UpdateJob: Send + Sync + 'static {
    /// Interval currently configured, re-read at the top of every cycle.
    /// `None` keeps whatever interval the loop is already using.
    fn interval_hours(&self) -> Option<f64>;

    fn run(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Waiting,
    Running,
    Stopped,
}

#[derive(Debug)]
struct ActiveLoop {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs an [`UpdateJob`] every `interval` hours on one background task.
///
/// The first run happens one full interval after `start`. Only one loop is
/// ever active: `start` and `stop` wait for the previous loop to exit before
/// returning, including any run already in progress.
#[derive(Debug)]
pub struct UpdateScheduler<J: UpdateJob> {
    job: Arc<J>,
    state: Arc<watch::Sender<SchedulerState>>,
    active: Mutex<Option<ActiveLoop>>,
}

impl<J: UpdateJob> UpdateScheduler<J> {
    #[inline]
    pub fn new(job: Arc<J>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            job,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// (Re)start the loop. A non-positive interval only stops the current one.
    /// Returns whether a loop is running afterwards.
    #[inline]
    pub async fn start(&self, interval_hours: f64) -> bool {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            shutdown(previous).await;
            info!("Previous update loop stopped, restarting");
        }

        if interval_hours.is_nan() || interval_hours <= 0.0 {
            self.state.send_replace(SchedulerState::Stopped);
            info!("Automatic updates disabled (interval {}h)", interval_hours);
            return false;
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.job),
            interval_hours,
            cancel_rx,
            Arc::clone(&self.state),
        ));
        *active = Some(ActiveLoop { cancel, handle });
        info!("Automatic updates started every {}h", interval_hours);
        true
    }

    /// Stop the loop and wait for it to exit. Returns false when none was running.
    #[inline]
    pub async fn stop(&self) -> bool {
        let previous = self.active.lock().await.take();
        let Some(previous) = previous else {
            return false;
        };
        shutdown(previous).await;
        self.state.send_replace(SchedulerState::Stopped);
        info!("Automatic updates stopped");
        true
    }
}

async fn shutdown(active: ActiveLoop) {
    // Receiver may already be gone if the loop ended on its own
    let _ = active.cancel.send(true);
    if let Err(e) = active.handle.await {
        warn!("Update loop ended abnormally: {}", e);
    }
}

async fn run_loop<J: UpdateJob>(
    job: Arc<J>,
    start_interval: f64,
    mut cancel: watch::Receiver<bool>,
    state: Arc<watch::Sender<SchedulerState>>,
) {
    let mut interval_hours = start_interval;
    let mut first_cycle = true;

    loop {
        if let Some(current) = job.interval_hours() {
            interval_hours = current;
        }
        if interval_hours.is_nan() || interval_hours <= 0.0 {
            info!("Update interval is now {}h, stopping", interval_hours);
            break;
        }

        if !first_cycle {
            state.send_replace(SchedulerState::Running);
            info!("Running scheduled update (every {}h)", interval_hours);
            match job.run().await {
                Ok(()) => info!("Scheduled update completed"),
                Err(e) => error!("Scheduled update failed: {:#}", e),
            }
        }
        first_cycle = false;

        state.send_replace(SchedulerState::Waiting);
        let wait = Duration::try_from_secs_f64(interval_hours * 3600.0).unwrap_or(Duration::MAX);
        debug!("Next automatic update in {:?}", wait);
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = cancel.changed() => {
                debug!("Update loop cancelled while waiting");
                break;
            }
        }
    }

    state.send_replace(SchedulerState::Stopped);
}
