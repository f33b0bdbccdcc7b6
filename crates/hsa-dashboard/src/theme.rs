use hsa_core::{display::ScoreBand, AgentStatus, ChannelState, HistoryStatus, JobState};
use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Copy)]
pub struct Theme {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub info: Color,
}

pub fn theme() -> Theme {
    Theme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
        info: Color::Rgb(59, 130, 246),
    }
}

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(56, 189, 248))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);

pub mod icons {
    pub const DONE: &str = "x";
    pub const WORKING: &str = ">";
    pub const IDLE: &str = ".";
    pub const FAILED: &str = "!";
    pub const PRO: &str = "+";
    pub const CON: &str = "-";
}

pub fn agent_icon(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Completed => icons::DONE,
        AgentStatus::Working => icons::WORKING,
        AgentStatus::Error => icons::FAILED,
        AgentStatus::Idle => icons::IDLE,
    }
}

pub fn agent_color(status: AgentStatus, theme: Theme) -> Color {
    match status {
        AgentStatus::Completed => theme.ok,
        AgentStatus::Working => theme.info,
        AgentStatus::Error => theme.critical,
        AgentStatus::Idle => theme.muted,
    }
}

pub fn channel_color(state: ChannelState, theme: Theme) -> Color {
    match state {
        ChannelState::Open => theme.ok,
        ChannelState::Connecting => theme.warn,
        ChannelState::Error => theme.critical,
        ChannelState::Disconnected | ChannelState::Closed => theme.muted,
    }
}

pub fn job_color(state: Option<JobState>, theme: Theme) -> Color {
    match state {
        Some(JobState::Succeeded) => theme.ok,
        Some(JobState::Running) => theme.info,
        Some(JobState::Failed) => theme.critical,
        Some(JobState::Ready) | None => theme.muted,
    }
}

pub fn history_color(status: HistoryStatus, theme: Theme) -> Color {
    match status {
        HistoryStatus::Completed => theme.ok,
        HistoryStatus::InProgress => theme.info,
        HistoryStatus::Failed => theme.critical,
    }
}

pub fn score_label(band: ScoreBand) -> &'static str {
    match band {
        ScoreBand::Excellent => "Excellent",
        ScoreBand::Good => "Good",
        ScoreBand::Fair => "Fair",
        ScoreBand::Weak => "Weak",
    }
}

pub fn score_color(band: ScoreBand, theme: Theme) -> Color {
    match band {
        ScoreBand::Excellent => theme.ok,
        ScoreBand::Good => theme.info,
        ScoreBand::Fair => theme.warn,
        ScoreBand::Weak => theme.critical,
    }
}
