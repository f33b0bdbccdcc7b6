pub mod api;
pub mod controller;
pub mod poller;
pub mod sync;

pub use api::{ApiClient, ApiError, DEFAULT_API_URL};
pub use controller::{ClientConfig, SearchController, DEFAULT_POLL_INTERVAL};
pub use poller::JobPoller;
pub use sync::StreamSynchronizer;

use hsa_core::{ApifyJobStatus, ChannelState, SearchCriteria, SearchResults, StreamMessage};

/// Everything that resumes the controller after an await point.
///
/// Each event carries the search (and job) it belongs to plus the session
/// epoch of the `open_search` that produced it. Late arrivals from a
/// torn-down session are dropped even when the same search was reopened.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SearchStarted {
        result: Result<String, String>,
    },
    Channel {
        search_id: String,
        session: u64,
        state: ChannelState,
    },
    Message {
        search_id: String,
        session: u64,
        message: StreamMessage,
    },
    JobStatus {
        search_id: String,
        session: u64,
        job_id: String,
        status: ApifyJobStatus,
    },
    Results {
        search_id: String,
        session: u64,
        result: Result<SearchResults, String>,
    },
    CriteriaSaved {
        search_id: String,
        session: u64,
        criteria: SearchCriteria,
        result: Result<(), String>,
    },
}
