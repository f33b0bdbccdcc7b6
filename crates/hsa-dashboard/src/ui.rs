use crate::state::{App, FormField, HistoryState, Tab, View};
use crate::theme::{self, icons, Theme};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use hsa_client::SearchController;
use hsa_core::{
    display::{
        format_count, format_degrees, format_price, format_thousands, job_status_text, plural,
        score_band, stage_label,
    },
    AgentId, AgentRecord, CriteriaField, Home, ResultsState, SearchCriteria, ViewStateStore,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap},
    Frame,
};

pub fn render(frame: &mut Frame, app: &App, controller: &SearchController) {
    let size = frame.size();
    let theme = theme::theme();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(size);
    frame.render_widget(render_header(app, controller, theme), layout[0]);
    match (app.view, controller.store()) {
        (View::ActiveSearch, Some(store)) => render_dashboard(frame, app, store, theme, layout[1]),
        (View::History, _) => render_history(frame, app, theme, layout[1]),
        _ => render_form(frame, app, controller, theme, layout[1]),
    }
}

fn panel<'a>(title: &'a str, theme: Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.surface))
        .title(Span::styled(
            title,
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_header(app: &App, controller: &SearchController, theme: Theme) -> Paragraph<'static> {
    let status = match controller.store() {
        Some(store) => {
            let channel = store.channel();
            Line::from(vec![
                Span::styled(
                    format!("Search: {}", store.search_id()),
                    Style::default().fg(theme.text),
                ),
                Span::raw("  "),
                Span::styled(
                    format!(
                        "{}/{} Agents Complete",
                        store.completed_agents(),
                        store.agents().len()
                    ),
                    Style::default().fg(theme.accent),
                ),
                Span::raw("  "),
                Span::styled(
                    format!("Stream: {}", channel.as_str()),
                    Style::default().fg(theme::channel_color(channel, theme)),
                ),
            ])
        }
        None => Line::from(Span::styled(
            "No active search",
            Style::default().fg(theme.muted),
        )),
    };
    let hint = match app.view {
        View::NewSearch => "Tab next field  Enter start  Esc back  Ctrl-C quit",
        View::ActiveSearch => "1-5/Tab panels  n new  h history  q quit",
        View::History => "/ filter  Enter open  r reload  n new  q quit",
    };
    let note = match app.status_note.as_deref() {
        Some(note) => Line::from(vec![
            Span::styled(note.to_string(), Style::default().fg(theme.muted)),
            Span::raw("  "),
            Span::styled(hint, Style::default().fg(theme.border)),
        ]),
        None => Line::from(Span::styled(hint, Style::default().fg(theme.muted))),
    };
    Paragraph::new(Text::from(vec![status, note]))
        .style(Style::default().fg(theme.text).bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .style(Style::default().bg(theme.bg))
                .title(Span::styled(
                    "Housing Search",
                    Style::default()
                        .fg(theme.title)
                        .add_modifier(Modifier::BOLD),
                )),
        )
}

fn render_dashboard(
    frame: &mut Frame,
    app: &App,
    store: &ViewStateStore,
    theme: Theme,
    area: Rect,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let percent = store.progress_percent();
    let gauge = Gauge::default()
        .block(panel("Progress", theme))
        .gauge_style(Style::default().fg(theme.accent).bg(theme.surface))
        .percent(percent)
        .label(format!("{percent}%"));
    frame.render_widget(gauge, layout[0]);

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(idx, tab)| Line::from(format!("{} {}", idx + 1, tab.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .block(panel("Panels", theme))
        .select(app.tab.index())
        .style(Style::default().fg(theme.muted))
        .highlight_style(theme::SELECTED_STYLE);
    frame.render_widget(tabs, layout[1]);

    let lines = match app.tab {
        Tab::Agents => agents_lines(store, theme),
        Tab::Workflow => workflow_lines(store, theme),
        Tab::Criteria => criteria_lines(store, theme),
        Tab::Location => location_lines(store, theme),
        Tab::Results => results_lines(app, store, theme),
    };
    let body = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel(app.tab.title(), theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, layout[2]);
}

fn agent_line(agent: &AgentRecord, theme: Theme) -> Line<'static> {
    let color = theme::agent_color(agent.status, theme);
    Line::from(vec![
        Span::styled(
            format!("[{}] ", theme::agent_icon(agent.status)),
            Style::default().fg(color),
        ),
        Span::styled(
            format!("{:<20}", agent.name),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ),
        Span::styled(agent.status.as_str().to_string(), Style::default().fg(color)),
    ])
}

fn elapsed_secs(agent: &AgentRecord) -> Option<i64> {
    let (start, end) = (agent.start_time?, agent.end_time?);
    Some(end.saturating_sub(start).max(0) / 1000)
}

pub fn agents_lines(store: &ViewStateStore, theme: Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for agent in store.agents() {
        lines.push(agent_line(agent, theme));
        lines.push(Line::from(Span::styled(
            format!("    {}", agent.current_task),
            Style::default().fg(theme.muted),
        )));
        if let Some(output) = agent.output.as_deref() {
            lines.push(Line::from(Span::styled(
                format!("    output: {output}"),
                Style::default().fg(theme.text),
            )));
        }
        if let Some(secs) = elapsed_secs(agent) {
            lines.push(Line::from(Span::styled(
                format!("    took {secs}s"),
                Style::default().fg(theme.muted),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Duplicates removed: ", Style::default().fg(theme.muted)),
        Span::styled(
            store.duplicates_found().to_string(),
            Style::default().fg(theme.text),
        ),
    ]));
    let (saved, saved_color) = if store.saved_to_supabase() {
        ("yes", theme.ok)
    } else {
        ("not yet", theme.muted)
    };
    lines.push(Line::from(vec![
        Span::styled("Saved to database: ", Style::default().fg(theme.muted)),
        Span::styled(saved, Style::default().fg(saved_color)),
    ]));

    let job_state = store.job_status().map(|status| status.status);
    let mut job = vec![
        Span::styled("Listing scrape: ", Style::default().fg(theme.muted)),
        Span::styled(
            job_status_text(store.apify_job_id(), store.job_status()),
            Style::default().fg(theme::job_color(job_state, theme)),
        ),
    ];
    if let Some(job_id) = store.apify_job_id() {
        job.push(Span::styled(
            format!("  (job {job_id})"),
            Style::default().fg(theme.border),
        ));
    }
    lines.push(Line::from(job));
    lines
}

fn stage_title(id: AgentId) -> &'static str {
    match id {
        AgentId::Parser => "Parse Request",
        AgentId::Mapbox => "Process Location",
        AgentId::Apify => "Search Listings",
        AgentId::Evaluator => "Evaluate Matches",
    }
}

pub fn workflow_lines(store: &ViewStateStore, theme: Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, id) in AgentId::ALL.into_iter().enumerate() {
        let agent = store.agent(id);
        let color = theme::agent_color(agent.status, theme);
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}. {:<18}", idx + 1, stage_title(id)),
                Style::default().fg(theme.text),
            ),
            Span::styled(
                format!("[{}]", stage_label(agent.status)),
                Style::default().fg(color),
            ),
        ]));
        if agent.status != hsa_core::AgentStatus::Idle {
            lines.push(Line::from(Span::styled(
                format!("   {}", agent.current_task),
                Style::default().fg(theme.muted),
            )));
        }
    }
    lines
}

fn field_value(field: CriteriaField, criteria: &SearchCriteria) -> String {
    let value = field.get(criteria);
    match field {
        CriteriaField::PriceMin | CriteriaField::PriceMax => format_price(value),
        CriteriaField::SquareFeetMin | CriteriaField::SquareFeetMax => format_thousands(value),
        _ => format_count(value),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub fn criteria_lines(store: &ViewStateStore, theme: Theme) -> Vec<Line<'static>> {
    let editor = store.criteria_edit();
    if let Some(buffer) = editor.buffer() {
        let mut lines = vec![Line::from(Span::styled(
            "Editing criteria",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ))];
        for field in CriteriaField::ALL {
            let focused = editor.field() == Some(field);
            let style = if focused {
                theme::SELECTED_STYLE
            } else {
                Style::default().fg(theme.text)
            };
            lines.push(Line::from(vec![
                Span::raw(if focused { "> " } else { "  " }),
                Span::styled(format!("{:<20}", field.label()), style),
                Span::styled(field_value(field, buffer), style),
            ]));
        }
        lines.push(Line::from(""));
        if editor.is_saving() {
            lines.push(Line::from(Span::styled(
                "Saving...",
                Style::default().fg(theme.warn),
            )));
        }
        if let Some(error) = editor.error() {
            lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(theme.critical),
            )));
        }
        lines.push(Line::from(Span::styled(
            "j/k field  +/- adjust  s save  Esc cancel",
            Style::default().fg(theme.muted),
        )));
        return lines;
    }

    let Some(criteria) = store.criteria() else {
        return vec![Line::from(Span::styled(
            "Extracting search criteria...",
            Style::default().fg(theme.muted),
        ))];
    };
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<16}"), Style::default().fg(theme.muted)),
            Span::styled(value, Style::default().fg(theme.text)),
        ])
    };
    vec![
        row(
            "Bedrooms",
            format!(
                "{} - {}",
                format_count(criteria.bedrooms.min),
                format_count(criteria.bedrooms.max)
            ),
        ),
        row(
            "Bathrooms",
            format!(
                "{} - {}",
                format_count(criteria.bathrooms.min),
                format_count(criteria.bathrooms.max)
            ),
        ),
        row(
            "Price",
            format!(
                "{} - {}",
                format_price(criteria.price_range.min),
                format_price(criteria.price_range.max)
            ),
        ),
        row(
            "Square feet",
            format!(
                "{} - {}",
                format_thousands(criteria.square_feet.min),
                format_thousands(criteria.square_feet.max)
            ),
        ),
        row("Property types", list_or_none(&criteria.property_types)),
        row("Must have", list_or_none(&criteria.must_have)),
        row("Nice to have", list_or_none(&criteria.nice_to_have)),
        row("Deal breakers", list_or_none(&criteria.deal_breakers)),
        Line::from(""),
        Line::from(Span::styled(
            "e edit",
            Style::default().fg(theme.muted),
        )),
    ]
}

pub fn location_lines(store: &ViewStateStore, theme: Theme) -> Vec<Line<'static>> {
    let Some(location) = store.location() else {
        return vec![Line::from(Span::styled(
            "Processing location data...",
            Style::default().fg(theme.muted),
        ))];
    };
    let bounds = location.bounding_box;
    let muted = Style::default().fg(theme.muted);
    let text = Style::default().fg(theme.text);
    vec![
        Line::from(vec![
            Span::styled("Radius: ", muted),
            Span::styled(format!("{} mile radius", format_count(location.radius)), text),
        ]),
        Line::from(""),
        Line::from(Span::styled("Center Point", muted)),
        Line::from(format!("  Latitude: {}", format_degrees(location.center.lat))),
        Line::from(format!("  Longitude: {}", format_degrees(location.center.lng))),
        Line::from(Span::styled("Bounding Box", muted)),
        Line::from(format!(
            "  North: {}  South: {}",
            format_degrees(bounds.north),
            format_degrees(bounds.south)
        )),
        Line::from(format!(
            "  East: {}  West: {}",
            format_degrees(bounds.east),
            format_degrees(bounds.west)
        )),
        Line::from(Span::styled("Target Neighborhoods", muted)),
        Line::from(format!("  {}", list_or_none(&location.neighborhoods))),
    ]
}

fn home_lines(
    rank: usize,
    home: &Home,
    selected: bool,
    image_index: usize,
    theme: Theme,
) -> Vec<Line<'static>> {
    let band = score_band(home.score);
    let title_style = if selected {
        theme::SELECTED_STYLE
    } else {
        Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
    };
    let muted = Style::default().fg(theme.muted);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("#{rank} {}", home.address), title_style),
            Span::raw("  "),
            Span::styled(format_price(home.price), Style::default().fg(theme.accent)),
        ]),
        Line::from(Span::styled(
            format!("   {}, {} {}", home.city, home.state, home.zip),
            muted,
        )),
        Line::from(format!(
            "   {}  {}  {} sqft  {}",
            plural(home.bedrooms, "bed"),
            plural(home.bathrooms, "bath"),
            format_thousands(home.square_feet),
            home.property_type
        )),
        Line::from(vec![
            Span::styled(
                format!(
                    "   {} {}",
                    theme::score_label(band),
                    format_count(home.score)
                ),
                Style::default().fg(theme::score_color(band, theme)),
            ),
            Span::styled(
                format!("  {}% match", format_count(home.match_percentage)),
                muted,
            ),
        ]),
    ];
    for pro in &home.pros {
        lines.push(Line::from(Span::styled(
            format!("   {} {pro}", icons::PRO),
            Style::default().fg(theme.ok),
        )));
    }
    for con in &home.cons {
        lines.push(Line::from(Span::styled(
            format!("   {} {con}", icons::CON),
            Style::default().fg(theme.critical),
        )));
    }
    if !home.llm_analysis.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("   {}", home.llm_analysis),
            muted,
        )));
    }
    let image = match home.images.get(image_index) {
        Some(url) => format!("   Image {}/{}: {url}", image_index + 1, home.images.len()),
        None => "   No images".to_string(),
    };
    lines.push(Line::from(Span::styled(image, muted)));
    let mut footer = format!("   Source: {}", home.source);
    if !home.listing_url.is_empty() {
        footer.push_str(&format!("  {}", home.listing_url));
    }
    lines.push(Line::from(Span::styled(footer, muted)));
    lines.push(Line::from(""));
    lines
}

pub fn results_lines(app: &App, store: &ViewStateStore, theme: Theme) -> Vec<Line<'static>> {
    let muted = Style::default().fg(theme.muted);
    if !store.results_ready() {
        return vec![Line::from(Span::styled(
            "Waiting for search to complete...",
            muted,
        ))];
    }
    let results = match store.results() {
        ResultsState::NotRequested | ResultsState::Loading => {
            return vec![Line::from(Span::styled("Loading results...", muted))];
        }
        ResultsState::Failed(message) => {
            return vec![Line::from(Span::styled(
                message.clone(),
                Style::default().fg(theme.critical),
            ))];
        }
        ResultsState::Loaded(results) => results,
    };
    if results.homes.is_empty() {
        return vec![Line::from(Span::styled(
            "No homes found matching your criteria",
            muted,
        ))];
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} Homes Found", results.homes.len()),
                Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Sorted by best match  [/] images  j/k select", muted),
        ]),
        Line::from(""),
    ];
    for (idx, home) in results.homes.iter().enumerate() {
        lines.extend(home_lines(
            idx + 1,
            home,
            idx == app.selected_home,
            app.image_index(&home.id),
            theme,
        ));
    }
    lines
}

fn render_form(
    frame: &mut Frame,
    app: &App,
    controller: &SearchController,
    theme: Theme,
    area: Rect,
) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Describe the home you want and where to look.",
            Style::default().fg(theme.muted),
        )),
        Line::from(""),
    ];
    for field in [FormField::Request, FormField::Location, FormField::Budget] {
        let focused = app.form.focus == field;
        let label_style = if focused {
            theme::SELECTED_STYLE
        } else {
            Style::default().fg(theme.title)
        };
        let value = app.form.value(field);
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(Span::styled(field.label(), label_style)));
        lines.push(Line::from(Span::styled(
            format!("  {value}{cursor}"),
            Style::default().fg(theme.text),
        )));
        lines.push(Line::from(""));
    }
    if controller.is_starting() {
        lines.push(Line::from(Span::styled(
            "Starting search...",
            Style::default().fg(theme.warn),
        )));
    } else if let Some(error) = controller.start_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(theme.critical),
        )));
    }
    let form = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("New Search", theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(form, area);
}

fn parse_created_at(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Local));
    }
    // Offset-less timestamps are taken as local time.
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Age relative to `now` for the first week, then the calendar date.
/// Unparseable values are shown as sent.
fn format_created_at(raw: &str, now: DateTime<Local>) -> String {
    let Some(created) = parse_created_at(raw) else {
        return raw.to_string();
    };
    let age = now.signed_duration_since(created);
    let minutes = age.num_minutes().max(0);
    if minutes < 60 {
        return format!("{} ago", plural(minutes as f64, "minute"));
    }
    let hours = age.num_hours();
    if hours < 24 {
        return format!("{} ago", plural(hours as f64, "hour"));
    }
    let days = age.num_days();
    if days < 7 {
        return format!("{} ago", plural(days as f64, "day"));
    }
    created.format("%b %-d, %Y").to_string()
}

pub fn history_lines(app: &App, theme: Theme) -> Vec<Line<'static>> {
    let muted = Style::default().fg(theme.muted);
    let entries = match &app.history {
        HistoryState::NotLoaded | HistoryState::Loading => {
            return vec![Line::from(Span::styled(
                "Loading search history...",
                muted,
            ))];
        }
        HistoryState::Failed(message) => {
            return vec![Line::from(Span::styled(
                message.clone(),
                Style::default().fg(theme.critical),
            ))];
        }
        HistoryState::Loaded(entries) => entries,
    };

    let totals = app.history_totals();
    let filter = if app.filtering {
        format!("Filter: {}_", app.history_filter)
    } else if app.history_filter.is_empty() {
        "Search by location or request... (/)".to_string()
    } else {
        format!("Filter: {}", app.history_filter)
    };
    let mut lines = vec![
        Line::from(format!(
            "Total Searches: {}  Homes Discovered: {}  Completed: {}",
            totals.searches, totals.homes, totals.completed
        )),
        Line::from(Span::styled(filter, muted)),
        Line::from(""),
    ];

    let now = Local::now();
    let filtered = app.filtered_history();
    if filtered.is_empty() {
        let message = if entries.is_empty() {
            "No searches yet"
        } else {
            "No searches found matching your query"
        };
        lines.push(Line::from(Span::styled(message, muted)));
        return lines;
    }
    for (idx, entry) in filtered.into_iter().enumerate() {
        let title_style = if idx == app.history_selected {
            theme::SELECTED_STYLE
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(vec![
            Span::styled(entry.request.clone(), title_style),
            Span::raw("  "),
            Span::styled(
                entry.status.label(),
                Style::default().fg(theme::history_color(entry.status, theme)),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            format!(
                "   {}  {}  {} homes  {}",
                entry.location,
                entry.budget,
                entry.homes_found,
                format_created_at(&entry.created_at, now)
            ),
            muted,
        )));
    }
    lines
}

fn render_history(frame: &mut Frame, app: &App, theme: Theme, area: Rect) {
    let body = Paragraph::new(Text::from(history_lines(app, theme)))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Search History", theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, area);
}
