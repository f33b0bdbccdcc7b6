use crate::{ApiClient, ApiError, ControllerEvent, JobPoller, StreamSynchronizer};
use hsa_core::{ChannelState, HousingRequest, ViewStateStore};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: Url,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Ties one active search to its store, update stream, and job poller.
///
/// All asynchronous work reports back through [`ControllerEvent`]s which the
/// owner feeds into [`SearchController::handle_event`] from its event loop, so
/// every store mutation happens on that loop in arrival order.
pub struct SearchController {
    api: ApiClient,
    config: ClientConfig,
    events: mpsc::Sender<ControllerEvent>,
    sync: StreamSynchronizer,
    store: Option<ViewStateStore>,
    poller: Option<JobPoller>,
    session: u64,
    starting: bool,
    start_error: Option<String>,
}

impl SearchController {
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ControllerEvent>) {
        let api = ApiClient::new(config.api_url.clone());
        Self::with_api(api, config)
    }

    pub fn with_api(
        api: ApiClient,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ControllerEvent>) {
        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let sync = StreamSynchronizer::new(api.clone(), events.clone());
        let controller = Self {
            api,
            config,
            events,
            sync,
            store: None,
            poller: None,
            session: 0,
            starting: false,
            start_error: None,
        };
        (controller, rx)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> Option<&ViewStateStore> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut ViewStateStore> {
        self.store.as_mut()
    }

    pub fn search_id(&self) -> Option<&str> {
        self.store.as_ref().map(ViewStateStore::search_id)
    }

    pub fn is_starting(&self) -> bool {
        self.starting
    }

    pub fn start_error(&self) -> Option<&str> {
        self.start_error.as_deref()
    }

    pub fn polled_job(&self) -> Option<&str> {
        self.poller.as_ref().map(JobPoller::job_id)
    }

    /// Whether a poll loop is still ticking for the current job.
    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .map(|poller| !poller.is_finished())
            .unwrap_or(false)
    }

    pub fn stream_running(&self) -> bool {
        self.sync.is_running()
    }

    /// Starts a search and waits for the backend to return its id, then opens it.
    pub async fn start_search(&mut self, request: &HousingRequest) -> Result<String, ApiError> {
        let response = self.api.start_search(request).await?;
        info!(event = "search_started", search_id = %response.search_id);
        self.open_search(response.search_id.clone()).await;
        Ok(response.search_id)
    }

    /// Fire-and-forget variant for event loops: the outcome arrives as
    /// [`ControllerEvent::SearchStarted`].
    pub fn submit_search(&mut self, request: HousingRequest) {
        if self.starting {
            return;
        }
        if let Some(field) = request.missing_field() {
            self.start_error = Some(ApiError::MissingField(field).to_string());
            return;
        }
        self.starting = true;
        self.start_error = None;
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api
                .start_search(&request)
                .await
                .map(|response| response.search_id)
                .map_err(|err| err.to_string());
            if let Err(message) = &result {
                warn!(event = "search_start_error", error = %message);
            }
            let _ = events.send(ControllerEvent::SearchStarted { result }).await;
        });
    }

    /// Makes `search_id` the active search with a fresh store. The previous
    /// session's channel and poller are torn down first; reopening the same
    /// search starts a new session too.
    pub async fn open_search(&mut self, search_id: String) {
        self.close_current();
        self.session += 1;
        self.store = Some(ViewStateStore::new(search_id.clone()));
        if let Err(err) = self.sync.activate(search_id.clone(), self.session).await {
            warn!(event = "stream_url_error", search_id = %search_id, error = %err);
            if let Some(store) = self.store.as_mut() {
                store.set_channel_state(ChannelState::Error);
            }
        }
    }

    /// Tears down the active search: closes the channel, stops the poller, and
    /// disposes the store so late results are ignored.
    pub async fn dispose(&mut self) {
        self.close_current();
        self.sync.shutdown().await;
    }

    fn close_current(&mut self) {
        self.sync.request_close();
        self.stop_poller();
        if let Some(store) = self.store.as_mut() {
            store.dispose();
        }
    }

    /// Applies one event. Returns `true` when visible state changed.
    pub async fn handle_event(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::SearchStarted { result } => {
                self.starting = false;
                match result {
                    Ok(search_id) => {
                        self.start_error = None;
                        self.open_search(search_id).await;
                    }
                    Err(message) => self.start_error = Some(message),
                }
                true
            }
            ControllerEvent::Channel {
                search_id,
                session,
                state,
            } => {
                let Some(store) = self.live_store(&search_id, session) else {
                    return false;
                };
                store.set_channel_state(state)
            }
            ControllerEvent::Message {
                search_id,
                session,
                message,
            } => {
                let Some(store) = self.live_store(&search_id, session) else {
                    debug!(event = "stale_message_dropped", search_id = %search_id, session);
                    return false;
                };
                store.apply(message);
                self.sync_poller();
                self.maybe_fetch_results();
                true
            }
            ControllerEvent::JobStatus {
                search_id,
                session,
                job_id,
                status,
            } => {
                let Some(store) = self.live_store(&search_id, session) else {
                    return false;
                };
                store.set_job_status(&job_id, status)
            }
            ControllerEvent::Results {
                search_id,
                session,
                result,
            } => {
                let Some(store) = self.live_store(&search_id, session) else {
                    return false;
                };
                store.set_results(result);
                true
            }
            ControllerEvent::CriteriaSaved {
                search_id,
                session,
                criteria,
                result,
            } => {
                let Some(store) = self.live_store(&search_id, session) else {
                    return false;
                };
                match result {
                    Ok(()) => store.promote_criteria(criteria),
                    Err(message) => store.fail_criteria_save(message),
                }
                true
            }
        }
    }

    pub fn begin_edit(&mut self) -> bool {
        self.store
            .as_mut()
            .map(ViewStateStore::begin_criteria_edit)
            .unwrap_or(false)
    }

    pub fn cancel_edit(&mut self) {
        if let Some(store) = self.store.as_mut() {
            store.criteria_edit_mut().cancel();
        }
    }

    /// Submits the edit buffer. On success the buffer becomes the synchronized
    /// criteria; on failure it is kept and an inline error is recorded.
    pub fn save_criteria(&mut self) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        if store.is_disposed() {
            return false;
        }
        let Some(criteria) = store.criteria_edit_mut().start_save() else {
            return false;
        };
        let search_id = store.search_id().to_string();
        let session = self.session;
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api
                .update_search_criteria(&search_id, &criteria)
                .await
                .map_err(|err| err.to_string());
            match &result {
                Ok(()) => info!(event = "criteria_saved", search_id = %search_id),
                Err(message) => {
                    warn!(event = "criteria_save_error", search_id = %search_id, error = %message)
                }
            }
            let _ = events
                .send(ControllerEvent::CriteriaSaved {
                    search_id,
                    session,
                    criteria,
                    result,
                })
                .await;
        });
        true
    }

    fn live_store(&mut self, search_id: &str, session: u64) -> Option<&mut ViewStateStore> {
        if session != self.session {
            return None;
        }
        self.store
            .as_mut()
            .filter(|store| store.search_id() == search_id && !store.is_disposed())
    }

    fn stop_poller(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// Keeps the poller aimed at the store's current job id.
    fn sync_poller(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let wanted = store.apify_job_id().map(str::to_string);
        let search_id = store.search_id().to_string();
        if wanted.as_deref() == self.polled_job() {
            return;
        }
        self.stop_poller();
        if let Some(job_id) = wanted {
            self.poller = Some(JobPoller::spawn(
                self.api.clone(),
                search_id,
                self.session,
                job_id,
                self.config.poll_interval,
                self.events.clone(),
            ));
        }
    }

    fn maybe_fetch_results(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if !store.take_results_trigger() {
            return;
        }
        let search_id = store.search_id().to_string();
        let session = self.session;
        info!(event = "results_fetch", search_id = %search_id, session);
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api
                .get_search_results(&search_id)
                .await
                .map_err(|err| err.to_string());
            let _ = events
                .send(ControllerEvent::Results {
                    search_id,
                    session,
                    result,
                })
                .await;
        });
    }
}
