// THEORY:
// `DeploymentWorker` runs deployments off the caller's task. The `SensorArea` is
// moved onto a tokio blocking thread and owned there exclusively until shutdown,
// so no other code can observe a half-finished ledger. The caller talks to it
// through two channels:
//
// - Tasks go in through an unbounded mpsc queue, each carrying a list of jobs
//   and a oneshot sender for the reports. Tasks run one at a time, in order.
// - Progress comes out through the `ChannelNotifier` installed at spawn time,
//   one `DeploymentEvent` per placement or optimization step.
//
// Cancellation trips the area's `CancelToken`. The running job stops after the
// step in flight and the rest of that task's jobs are skipped.
//
// When the task queue closes the worker swaps the channel notifier for a
// `TracingNotifier` before handing the area back, so the event stream ends even
// while the caller keeps the area.

use crate::error::{DeployError, Result};
use crate::notify::{CancelToken, ChannelNotifier, DeploymentEvent, TracingNotifier};
use crate::sensor_area::{DeploymentReport, SensorArea};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One strategy or optimizer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentJob {
    Greedy,
    Random,
    Genetic,
    Annealing,
}

impl DeploymentJob {
    fn execute(self, area: &mut SensorArea) -> Result<DeploymentReport> {
        match self {
            DeploymentJob::Greedy => area.deploy_greedy(),
            DeploymentJob::Random => area.deploy_random(),
            DeploymentJob::Genetic => area.deploy_genetic(),
            DeploymentJob::Annealing => area.anneal(),
        }
    }
}

struct DeploymentTask {
    jobs: Vec<DeploymentJob>,
    result_sender: oneshot::Sender<Result<Vec<DeploymentReport>>>,
}

pub struct DeploymentWorker {
    task_sender: mpsc::UnboundedSender<DeploymentTask>,
    handle: JoinHandle<SensorArea>,
    cancel: CancelToken,
}

impl DeploymentWorker {
    /// Moves `area` onto a blocking thread. Must be called inside a tokio runtime.
    pub fn spawn(mut area: SensorArea) -> (Self, mpsc::UnboundedReceiver<DeploymentEvent>) {
        let (notifier, events) = ChannelNotifier::channel();
        area.set_notifier(notifier);
        let cancel = area.cancel_token();
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<DeploymentTask>();

        let handle = tokio::task::spawn_blocking(move || {
            while let Some(task) = task_receiver.blocking_recv() {
                let result = Self::run_jobs(&mut area, &task.jobs);
                let _ = task.result_sender.send(result);
            }
            area.set_notifier(TracingNotifier);
            tracing::debug!("deployment worker stopped");
            area
        });

        (
            Self {
                task_sender,
                handle,
                cancel,
            },
            events,
        )
    }

    fn run_jobs(area: &mut SensorArea, jobs: &[DeploymentJob]) -> Result<Vec<DeploymentReport>> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            tracing::debug!(?job, "running deployment job");
            let report = match job.execute(area) {
                Ok(report) => report,
                Err(error) if reports.is_empty() => return Err(error),
                Err(error) => {
                    return Err(DeployError::JobFailed {
                        completed: reports,
                        source: Box::new(error),
                    });
                }
            };
            let cancelled = report.cancelled;
            reports.push(report);
            if cancelled {
                break;
            }
        }
        Ok(reports)
    }

    /// Runs `jobs` in order and returns one report per job that ran.
    ///
    /// A failing job stops the task. If earlier jobs had already finished, the
    /// error is `JobFailed` carrying their reports; otherwise it is the job's own
    /// error.
    pub async fn run(&self, jobs: Vec<DeploymentJob>) -> Result<Vec<DeploymentReport>> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.cancel.reset();
        self.task_sender
            .send(DeploymentTask {
                jobs,
                result_sender,
            })
            .map_err(|_| DeployError::WorkerUnavailable)?;
        result_receiver
            .await
            .map_err(|_| DeployError::WorkerUnavailable)?
    }

    /// Asks the running job to stop after its current step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for queued work to finish and hands the area back.
    pub async fn shutdown(self) -> Result<SensorArea> {
        drop(self.task_sender);
        self.handle.await.map_err(|_| DeployError::WorkerUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Strategy;
    use crate::sensor_area::test_support::*;

    #[tokio::test]
    async fn jobs_run_in_order_and_the_area_comes_back() {
        let (worker, mut events) = DeploymentWorker::spawn(small_area(3, 6));
        let reports = worker
            .run(vec![DeploymentJob::Greedy, DeploymentJob::Annealing])
            .await
            .expect("worker alive");
        let strategies: Vec<Strategy> = reports.iter().map(|r| r.strategy).collect();
        assert_eq!(strategies, vec![Strategy::Greedy, Strategy::Annealing]);

        let area = worker.shutdown().await.expect("clean shutdown");
        assert_eq!(area.sensors().len(), 3);
        assert_ledger_consistent(&area);

        let mut placed = 0;
        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                DeploymentEvent::SensorPlaced { .. } => placed += 1,
                DeploymentEvent::Completed { .. } => completed += 1,
                _ => {}
            }
        }
        assert_eq!((placed, completed), (3, 2));
    }

    #[tokio::test]
    async fn errors_come_back_through_run() {
        let (worker, _events) = DeploymentWorker::spawn(small_area(3, 6));
        let result = worker.run(vec![DeploymentJob::Annealing]).await;
        assert!(matches!(result, Err(DeployError::NoSensors)));
        // The worker survives a failed task.
        let reports = worker.run(vec![DeploymentJob::Random]).await.expect("worker alive");
        assert_eq!(reports[0].placed, 3);
    }

    #[tokio::test]
    async fn event_stream_ends_at_shutdown() {
        let (worker, mut events) = DeploymentWorker::spawn(small_area(3, 6));
        worker.run(vec![DeploymentJob::Greedy]).await.expect("worker alive");
        let area = worker.shutdown().await.expect("clean shutdown");

        let mut received = 0;
        let drained = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while events.recv().await.is_some() {
                received += 1;
            }
        })
        .await;
        assert!(drained.is_ok(), "event stream still open");
        // Three placements and one completion.
        assert_eq!(received, 4);
        assert_eq!(area.sensors().len(), 3);
    }

    #[tokio::test]
    async fn failed_job_keeps_earlier_reports() {
        // 16 region centres cannot host 20 sensors without fallback draws.
        let mut config = small_config(20, 6);
        config.random_retry_limit = Some(0);
        let (worker, _events) = DeploymentWorker::spawn(small_area_from(config));

        let err = worker
            .run(vec![DeploymentJob::Greedy, DeploymentJob::Random, DeploymentJob::Annealing])
            .await
            .unwrap_err();
        let DeployError::JobFailed { completed, source } = err else {
            panic!("expected JobFailed, got {err:?}");
        };
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].strategy, Strategy::Greedy);
        assert_eq!(completed[0].placed, 20);
        assert!(matches!(
            *source,
            DeployError::RetryBudgetExhausted { requested: 20, attempts: 0, .. }
        ));
    }

    #[tokio::test]
    async fn cancellation_stops_after_the_current_step() {
        let mut config = small_config(3, 6);
        config.annealing.cooling_rate = 0.99999;
        let budget = config.annealing.step_budget();
        let area = small_area_from(config);

        let (worker, mut events) = DeploymentWorker::spawn(area);
        let token = worker.cancel_token();
        let watcher = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if matches!(event, DeploymentEvent::AnnealingStep { .. }) {
                    token.cancel();
                    break;
                }
            }
        });

        let reports = worker
            .run(vec![DeploymentJob::Greedy, DeploymentJob::Annealing, DeploymentJob::Random])
            .await
            .expect("worker alive");
        watcher.await.expect("watcher finished");

        assert_eq!(reports.len(), 2);
        assert!(reports[1].cancelled);
        assert!(reports[1].iterations < budget);
        let area = worker.shutdown().await.expect("clean shutdown");
        assert_ledger_consistent(&area);
    }
}
