use crate::domain::ports::Cycle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Drives a [`Cycle`] once per interval for as long as it is not stopped.
///
/// Cycles never overlap: the next tick is only awaited after the previous
/// cycle, all of its sends included, has returned. Errors and panics inside
/// a cycle are logged and the loop carries on.
pub struct Scheduler<C: Cycle> {
    cycle: Arc<C>,
    interval: Duration,
}

pub struct SchedulerHandle {
    state: watch::Receiver<SchedulerState>,
    cycles: watch::Receiver<u64>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<C: Cycle> Scheduler<C> {
    pub fn new(cycle: Arc<C>, interval: Duration) -> Self {
        // tokio 的 interval 不接受零
        let interval = interval.max(Duration::from_millis(1));
        Self { cycle, interval }
    }

    /// First cycle runs right away, then one per interval.
    pub fn start(self) -> SchedulerHandle {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (cycles_tx, cycles_rx) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run_loop(state_tx, cycles_tx, shutdown_rx));

        SchedulerHandle {
            state: state_rx,
            cycles: cycles_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run_loop(
        self,
        state: watch::Sender<SchedulerState>,
        cycles: watch::Sender<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("⏱️ Scheduler started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            state.send_replace(SchedulerState::Running);
            let cycle_no = *cycles.borrow() + 1;
            run_contained(self.cycle.clone(), cycle_no).await;
            state.send_replace(SchedulerState::Idle);
            cycles.send_replace(cycle_no);
        }

        tracing::info!("Scheduler stopped after {} cycles", *cycles.borrow());
    }
}

/// Runs one cycle in its own task so that a panic stays inside it.
async fn run_contained<C: Cycle>(cycle: Arc<C>, cycle_no: u64) {
    let joined = tokio::spawn(async move { cycle.run_cycle().await }).await;

    match joined {
        Ok(Ok(report)) => {
            tracing::info!(
                cycle = cycle_no,
                skipped = report.skipped,
                fetched = report.fetched,
                new = report.new_listings,
                delivered = report.delivery.delivered,
                failed = report.delivery.failed,
                seen_total = report.seen_total,
                "✅ Cycle completed"
            );
        }
        Ok(Err(e)) => {
            tracing::error!(
                cycle = cycle_no,
                category = ?e.category(),
                severity = ?e.severity(),
                error = %e,
                "❌ Cycle failed: {}",
                e.recovery_suggestion()
            );
        }
        Err(join_error) => {
            tracing::error!(cycle = cycle_no, error = %join_error, "❌ Cycle aborted");
        }
    }
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Number of cycles that have finished, successfully or not.
    pub fn cycles(&self) -> u64 {
        *self.cycles.borrow()
    }

    /// Resolves once at least `count` cycles have finished.
    pub async fn wait_for_cycles(&mut self, count: u64) {
        while *self.cycles.borrow_and_update() < count {
            if self.cycles.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stops after the in-flight cycle, if any, has finished.
    pub async fn stop(self) -> u64 {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
        *self.cycles.borrow()
    }
}
