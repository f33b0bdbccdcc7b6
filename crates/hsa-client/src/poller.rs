use crate::{ApiClient, ControllerEvent};
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{info, warn};

/// Fixed-interval poll of one scrape job.
///
/// The loop decides whether to continue from the status it just fetched, so
/// it stops on the first `SUCCEEDED`/`FAILED` it sees. Fetch errors are logged
/// and the next tick still runs.
pub struct JobPoller {
    job_id: String,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl JobPoller {
    pub fn spawn(
        api: ApiClient,
        search_id: String,
        session: u64,
        job_id: String,
        interval: Duration,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            api,
            search_id,
            session,
            job_id.clone(),
            interval,
            events,
            stop_rx,
        ));
        Self {
            job_id,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the timer. A fetch already in flight completes; its event is
    /// still delivered and left to the receiver to discard.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    api: ApiClient,
    search_id: String,
    session: u64,
    job_id: String,
    interval: Duration,
    events: mpsc::Sender<ControllerEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    info!(event = "job_poll_start", search_id = %search_id, job_id = %job_id);
    loop {
        match api.get_job_status(&job_id).await {
            Ok(status) => {
                let terminal = status.status.is_terminal();
                let state = status.status.as_str();
                let event = ControllerEvent::JobStatus {
                    search_id: search_id.clone(),
                    session,
                    job_id: job_id.clone(),
                    status,
                };
                if events.send(event).await.is_err() {
                    break;
                }
                if terminal {
                    info!(event = "job_poll_done", job_id = %job_id, status = state);
                    break;
                }
            }
            Err(err) => {
                warn!(event = "job_poll_error", job_id = %job_id, error = %err);
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut stop_rx => {
                info!(event = "job_poll_stopped", job_id = %job_id);
                break;
            }
        }
    }
}
