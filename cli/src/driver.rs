//! Background tick driver
//!
//! Runs the checker on a fixed period, the way a partition's scheduler
//! would. Each period moves the simulated clock forward by the real time
//! that passed, then ticks the engine.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::context::CliContext;

pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Signal the driver and wait for its current tick to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Tick driver task failed");
        }
    }
}

/// Start ticking `ctx`'s engine every `period`
pub fn spawn(ctx: CliContext, period: Duration) -> DriverHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        tracing::info!(period_ms = period.as_millis() as u64, "Tick driver started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let elapsed = last.elapsed();
                    last = Instant::now();
                    if let Ok(elapsed) = chrono::TimeDelta::from_std(elapsed) {
                        ctx.clock.advance(elapsed);
                    }

                    let mut engine = ctx.engine.lock().await;
                    match engine.tick() {
                        Ok(report) if !report.triggered.is_empty() => {
                            tracing::debug!(
                                triggered = report.triggered.len(),
                                yielded = report.yielded(),
                                "Driver tick"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Tick failed"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Tick driver stopped");
    });

    DriverHandle { shutdown, task }
}
