use crate::criteria::CriteriaEditor;
use crate::gate;
use crate::stream::{AgentUpdate, ApifyUpdate, StreamMessage};
use crate::{
    AgentId, AgentRecord, AgentStatus, ApifyJobStatus, LocationData, SearchCriteria,
    SearchResults,
};
use chrono::Utc;

/// Lifecycle of the streaming channel for one search.
///
/// `Error` can be reached from any state before `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
    Error,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
            ChannelState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Error)
    }

    fn accepts(&self, next: ChannelState) -> bool {
        match (self, next) {
            (ChannelState::Closed, _) => false,
            (ChannelState::Error, ChannelState::Closed) => true,
            (ChannelState::Error, _) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultsState {
    #[default]
    NotRequested,
    Loading,
    Loaded(SearchResults),
    Failed(String),
}

/// Per-search view state, mutated only by stream messages, poll results, and
/// explicit user edits.
#[derive(Debug, Clone)]
pub struct ViewStateStore {
    search_id: String,
    agents: [AgentRecord; 4],
    criteria: Option<SearchCriteria>,
    location: Option<LocationData>,
    apify_job_id: Option<String>,
    job_status: Option<ApifyJobStatus>,
    duplicates_found: u32,
    saved_to_supabase: bool,
    results: ResultsState,
    criteria_edit: CriteriaEditor,
    channel: ChannelState,
    disposed: bool,
}

impl ViewStateStore {
    pub fn new(search_id: impl Into<String>) -> Self {
        Self {
            search_id: search_id.into(),
            agents: AgentRecord::initial_set(),
            criteria: None,
            location: None,
            apify_job_id: None,
            job_status: None,
            duplicates_found: 0,
            saved_to_supabase: false,
            results: ResultsState::NotRequested,
            criteria_edit: CriteriaEditor::default(),
            channel: ChannelState::Disconnected,
            disposed: false,
        }
    }

    pub fn search_id(&self) -> &str {
        &self.search_id
    }

    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> &AgentRecord {
        // initial_set() keeps AgentId::ALL order and apply() never reorders.
        &self.agents[id as usize]
    }

    pub fn criteria(&self) -> Option<&SearchCriteria> {
        self.criteria.as_ref()
    }

    pub fn location(&self) -> Option<&LocationData> {
        self.location.as_ref()
    }

    pub fn apify_job_id(&self) -> Option<&str> {
        self.apify_job_id.as_deref()
    }

    pub fn job_status(&self) -> Option<&ApifyJobStatus> {
        self.job_status.as_ref()
    }

    pub fn duplicates_found(&self) -> u32 {
        self.duplicates_found
    }

    pub fn saved_to_supabase(&self) -> bool {
        self.saved_to_supabase
    }

    pub fn results(&self) -> &ResultsState {
        &self.results
    }

    pub fn criteria_edit(&self) -> &CriteriaEditor {
        &self.criteria_edit
    }

    pub fn criteria_edit_mut(&mut self) -> &mut CriteriaEditor {
        &mut self.criteria_edit
    }

    pub fn channel(&self) -> ChannelState {
        self.channel
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn completed_agents(&self) -> usize {
        gate::completed_count(&self.agents)
    }

    pub fn progress_percent(&self) -> u16 {
        let total = self.agents.len();
        if total == 0 {
            return 0;
        }
        ((self.completed_agents() * 100) / total) as u16
    }

    pub fn results_ready(&self) -> bool {
        gate::results_ready(&self.agents)
    }

    /// Applies one stream message. Returns `false` when the store is disposed
    /// and the message was dropped.
    pub fn apply(&mut self, message: StreamMessage) -> bool {
        self.apply_at(message, Utc::now().timestamp_millis())
    }

    pub fn apply_at(&mut self, message: StreamMessage, now_ms: i64) -> bool {
        if self.disposed {
            return false;
        }
        match message {
            StreamMessage::AgentUpdate(update) => self.apply_agent_update(update, now_ms),
            StreamMessage::CriteriaUpdate(criteria) => {
                self.criteria = Some(criteria);
            }
            StreamMessage::MapboxUpdate(location) => {
                self.location = Some(location);
            }
            StreamMessage::ApifyUpdate(update) => self.apply_apify_update(update),
            StreamMessage::ResultsUpdate(update) => {
                if update.saved_to_supabase.unwrap_or(false) {
                    self.saved_to_supabase = true;
                }
            }
        }
        true
    }

    fn apply_agent_update(&mut self, update: AgentUpdate, now_ms: i64) {
        let Some(agent) = self.agents.iter_mut().find(|agent| agent.id == update.id) else {
            return;
        };
        if update.status == AgentStatus::Working && agent.start_time.is_none() {
            agent.start_time = Some(now_ms);
        }
        agent.status = update.status;
        agent.current_task = update.current_task;
        agent.output = update.output;
        agent.end_time = update.end_time;
    }

    fn apply_apify_update(&mut self, update: ApifyUpdate) {
        if self.apify_job_id != update.job_id {
            self.job_status = None;
        }
        self.apify_job_id = update.job_id;
        if let Some(duplicates) = update.duplicates_found {
            self.duplicates_found = duplicates;
        }
    }

    /// Returns `true` exactly once: the first time the results gate is open
    /// while results have not been requested. Results move to `Loading`.
    pub fn take_results_trigger(&mut self) -> bool {
        if self.disposed || !self.results_ready() {
            return false;
        }
        if self.results != ResultsState::NotRequested {
            return false;
        }
        self.results = ResultsState::Loading;
        true
    }

    pub fn set_results(&mut self, result: Result<SearchResults, String>) {
        if self.disposed {
            return;
        }
        self.results = match result {
            Ok(results) => ResultsState::Loaded(results),
            Err(message) => ResultsState::Failed(message),
        };
    }

    /// Records a fetched job status if it belongs to the current job.
    pub fn set_job_status(&mut self, job_id: &str, status: ApifyJobStatus) -> bool {
        if self.disposed || self.apify_job_id.as_deref() != Some(job_id) {
            return false;
        }
        self.job_status = Some(status);
        true
    }

    /// A criteria save landed: the submitted snapshot becomes the synchronized value.
    pub fn promote_criteria(&mut self, criteria: SearchCriteria) {
        if self.disposed {
            return;
        }
        self.criteria = Some(criteria);
        self.criteria_edit.finish_save();
    }

    pub fn fail_criteria_save(&mut self, message: impl Into<String>) {
        if self.disposed {
            return;
        }
        self.criteria_edit.fail_save(message);
    }

    pub fn begin_criteria_edit(&mut self) -> bool {
        match self.criteria.as_ref() {
            Some(criteria) if !self.disposed => {
                self.criteria_edit.begin(criteria);
                true
            }
            _ => false,
        }
    }

    pub fn set_channel_state(&mut self, next: ChannelState) -> bool {
        if self.disposed || !self.channel.accepts(next) {
            return false;
        }
        self.channel = next;
        true
    }

    /// Further messages, poll results, and fetch results are dropped.
    pub fn dispose(&mut self) {
        self.disposed = true;
        if !self.channel.is_terminal() {
            self.channel = ChannelState::Closed;
        }
    }
}
