//! Background loops for the free-games pipeline.
//!
//! One periodic feed check (first run immediately at startup) and one
//! one-shot verification sweep after a startup delay. Both listen on a
//! broadcast shutdown channel; `Scheduler::stop` signals them and waits
//! for every task to finish.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::free_games::FreeGameService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub check_interval: Duration,
    /// `None` skips the startup verification sweep.
    pub verify_delay: Option<Duration>,
}

/// Work driven by the scheduler.
#[async_trait]
pub trait SentinelJobs: Send + Sync + 'static {
    async fn run_feed_check(&self);
    async fn run_verification_sweep(&self);
}

#[async_trait]
impl SentinelJobs for FreeGameService {
    async fn run_feed_check(&self) {
        let summary = self.check_feed().await;
        if let Some(err) = summary.error {
            error!(error = %err, "scheduled free-games check failed");
        }
    }

    async fn run_verification_sweep(&self) {
        match self.verify_all().await {
            Ok(summary) => info!(
                verified = summary.verified,
                expired = summary.expired,
                errors = summary.errors,
                "startup verification sweep finished"
            ),
            Err(e) => error!(error = %e, "startup verification sweep failed"),
        }
    }
}

pub struct Scheduler {
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl Scheduler {
    pub fn start<J: SentinelJobs>(jobs: Arc<J>, cfg: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let mut tasks = JoinSet::new();

        // --- feed check loop ----------------------------------------------
        {
            let jobs = jobs.clone();
            let mut rx = shutdown_tx.subscribe();
            let period = cfg.check_interval.max(Duration::from_secs(1));
            tasks.spawn(async move {
                // first tick completes immediately
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                info!(interval_secs = period.as_secs(), "free-games check loop started");
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = rx.recv() => break,
                    }
                    tokio::select! {
                        _ = jobs.run_feed_check() => {}
                        _ = rx.recv() => break,
                    }
                }
                info!("free-games check loop: shutdown");
            });
        }

        // --- startup verification sweep -----------------------------------
        if let Some(delay) = cfg.verify_delay {
            let mut rx = shutdown_tx.subscribe();
            tasks.spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = rx.recv() => {
                        info!("verification sweep cancelled before start");
                        return;
                    }
                }
                tokio::select! {
                    _ = jobs.run_verification_sweep() => {}
                    _ = rx.recv() => info!("verification sweep: shutdown"),
                }
            });
        }

        Self { shutdown_tx, tasks }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task and wait for them to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        info!("scheduler: stopping {} task(s)", self.tasks.len());
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "scheduler task join error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJobs {
        checks: AtomicUsize,
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl SentinelJobs for CountingJobs {
        async fn run_feed_check(&self) {
            self.checks.fetch_add(1, Ordering::SeqCst);
        }

        async fn run_verification_sweep(&self) {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn runs_at_startup_then_hourly_with_delayed_sweep() {
        let jobs = Arc::new(CountingJobs::default());
        let sched = Scheduler::start(
            jobs.clone(),
            SchedulerConfig {
                check_interval: HOUR,
                verify_delay: Some(Duration::from_secs(30)),
            },
        );
        assert_eq!(sched.task_count(), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(jobs.checks.load(Ordering::SeqCst), 1);
        assert_eq!(jobs.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(jobs.sweeps.load(Ordering::SeqCst), 1);

        tokio::time::sleep(HOUR).await;
        assert_eq!(jobs.checks.load(Ordering::SeqCst), 2);
        assert_eq!(jobs.sweeps.load(Ordering::SeqCst), 1);

        sched.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_work() {
        let jobs = Arc::new(CountingJobs::default());
        let sched = Scheduler::start(
            jobs.clone(),
            SchedulerConfig {
                check_interval: HOUR,
                verify_delay: Some(Duration::from_secs(30)),
            },
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        sched.stop().await;

        tokio::time::sleep(HOUR * 3).await;
        assert_eq!(jobs.checks.load(Ordering::SeqCst), 1);
        assert_eq!(jobs.sweeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_can_be_disabled() {
        let jobs = Arc::new(CountingJobs::default());
        let sched = Scheduler::start(
            jobs.clone(),
            SchedulerConfig {
                check_interval: HOUR,
                verify_delay: None,
            },
        );
        assert_eq!(sched.task_count(), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(jobs.sweeps.load(Ordering::SeqCst), 0);
        sched.stop().await;
    }
}
