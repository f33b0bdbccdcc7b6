use crate::{AgentId, AgentRecord, AgentStatus};

/// Ranked listings become visible only once every stage reports `completed`.
///
/// An empty slice, or one that is missing any stage, is never ready.
pub fn results_ready(agents: &[AgentRecord]) -> bool {
    if agents.is_empty() {
        return false;
    }
    let all_present = AgentId::ALL
        .iter()
        .all(|id| agents.iter().any(|agent| agent.id == *id));
    all_present
        && agents
            .iter()
            .all(|agent| agent.status == AgentStatus::Completed)
}

pub fn completed_count(agents: &[AgentRecord]) -> usize {
    agents
        .iter()
        .filter(|agent| agent.status == AgentStatus::Completed)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_statuses(statuses: [AgentStatus; 4]) -> Vec<AgentRecord> {
        AgentRecord::initial_set()
            .into_iter()
            .zip(statuses)
            .map(|(mut agent, status)| {
                agent.status = status;
                agent
            })
            .collect()
    }

    #[test]
    fn empty_set_is_not_ready() {
        assert!(!results_ready(&[]));
    }

    #[test]
    fn initial_set_is_not_ready() {
        assert!(!results_ready(&AgentRecord::initial_set()));
    }

    #[test]
    fn ready_only_when_all_four_completed() {
        use AgentStatus::*;
        assert!(results_ready(&with_statuses([Completed; 4])));
        for idx in 0..4 {
            for other in [Idle, Working, Error] {
                let mut statuses = [Completed; 4];
                statuses[idx] = other;
                assert!(
                    !results_ready(&with_statuses(statuses)),
                    "stage {idx} at {other:?} must block the gate"
                );
            }
        }
    }

    #[test]
    fn missing_stage_blocks_gate() {
        let mut agents = with_statuses([AgentStatus::Completed; 4]);
        agents.pop();
        assert!(!results_ready(&agents));
    }

    #[test]
    fn completed_count_tracks_progress() {
        use AgentStatus::*;
        assert_eq!(completed_count(&with_statuses([Completed, Working, Idle, Completed])), 2);
    }
}
