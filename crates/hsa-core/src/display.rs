//! Presentation helpers shared by front ends. Pure string formatting only.

use crate::{AgentStatus, ApifyJobStatus, JobState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Weak,
}

pub fn score_band(score: f64) -> ScoreBand {
    if score >= 90.0 {
        ScoreBand::Excellent
    } else if score >= 75.0 {
        ScoreBand::Good
    } else if score >= 60.0 {
        ScoreBand::Fair
    } else {
        ScoreBand::Weak
    }
}

/// Whole numbers with thousands separators, e.g. `1234567.4` -> `1,234,567`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}

pub fn format_price(value: f64) -> String {
    format!("${}", format_thousands(value))
}

/// Drops a trailing `.0` so `2.0` bedrooms reads as `2` but `1.5` baths stay.
pub fn format_count(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

pub fn plural(value: f64, unit: &str) -> String {
    if value == 1.0 {
        format!("{} {unit}", format_count(value))
    } else {
        format!("{} {unit}s", format_count(value))
    }
}

pub fn format_degrees(value: f64) -> String {
    format!("{value:.4}°")
}

pub fn stage_label(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Completed => "Complete",
        AgentStatus::Working => "In Progress",
        AgentStatus::Error => "Failed",
        AgentStatus::Idle => "Pending",
    }
}

/// Text for the scrape-job card.
pub fn job_status_text(job_id: Option<&str>, status: Option<&ApifyJobStatus>) -> String {
    if job_id.is_none() {
        return "Waiting to start...".to_string();
    }
    let Some(status) = status else {
        return "Loading...".to_string();
    };
    match status.status {
        JobState::Succeeded => format!("Scraped {} listings", status.items_scraped),
        JobState::Failed => "Scraping failed".to_string(),
        JobState::Running => format!("Scraping... {} found", status.items_scraped),
        JobState::Ready => "Ready to start".to_string(),
    }
}

/// Moves a carousel index by `delta`, wrapping modulo `len`. Empty galleries stay at 0.
pub fn wrap_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as isize;
    (((current as isize + delta) % len + len) % len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(1_000.0), "1,000");
        assert_eq!(format_thousands(1_234_567.4), "1,234,567");
        assert_eq!(format_price(450_000.0), "$450,000");
    }

    #[test]
    fn plural_units() {
        assert_eq!(plural(1.0, "bed"), "1 bed");
        assert_eq!(plural(3.0, "bed"), "3 beds");
        assert_eq!(plural(2.5, "bath"), "2.5 baths");
    }

    #[test]
    fn score_bands_follow_thresholds() {
        assert_eq!(score_band(95.0), ScoreBand::Excellent);
        assert_eq!(score_band(90.0), ScoreBand::Excellent);
        assert_eq!(score_band(80.0), ScoreBand::Good);
        assert_eq!(score_band(60.0), ScoreBand::Fair);
        assert_eq!(score_band(12.0), ScoreBand::Weak);
    }

    #[test]
    fn job_text_covers_each_phase() {
        assert_eq!(job_status_text(None, None), "Waiting to start...");
        assert_eq!(job_status_text(Some("run"), None), "Loading...");
        let mut status = ApifyJobStatus {
            status: JobState::Running,
            items_scraped: 7,
            ..ApifyJobStatus::default()
        };
        assert_eq!(job_status_text(Some("run"), Some(&status)), "Scraping... 7 found");
        status.status = JobState::Succeeded;
        assert_eq!(job_status_text(Some("run"), Some(&status)), "Scraped 7 listings");
        status.status = JobState::Failed;
        assert_eq!(job_status_text(Some("run"), Some(&status)), "Scraping failed");
    }

    #[test]
    fn carousel_wraps_both_ways() {
        assert_eq!(wrap_index(0, -1, 3), 2);
        assert_eq!(wrap_index(2, 1, 3), 0);
        assert_eq!(wrap_index(1, 1, 3), 2);
        assert_eq!(wrap_index(0, 1, 0), 0);
    }

    #[test]
    fn coordinates_use_four_decimals() {
        assert_eq!(format_degrees(30.267153), "30.2672°");
    }
}
