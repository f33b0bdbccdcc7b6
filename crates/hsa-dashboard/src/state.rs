use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hsa_core::{
    display::wrap_index, HistoryEntry, HistoryStatus, HousingRequest, ResultsState,
    ViewStateStore,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    NewSearch,
    ActiveSearch,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Agents,
    Workflow,
    Criteria,
    Location,
    Results,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Agents,
        Tab::Workflow,
        Tab::Criteria,
        Tab::Location,
        Tab::Results,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Agents => "Agents",
            Tab::Workflow => "Workflow",
            Tab::Criteria => "Criteria",
            Tab::Location => "Location",
            Tab::Results => "Results",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Request,
    Location,
    Budget,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::Request => "What are you looking for?",
            FormField::Location => "Location",
            FormField::Budget => "Budget",
        }
    }

    fn next(self) -> Self {
        match self {
            FormField::Request => FormField::Location,
            FormField::Location => FormField::Budget,
            FormField::Budget => FormField::Request,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Request => FormField::Budget,
            FormField::Location => FormField::Request,
            FormField::Budget => FormField::Location,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchForm {
    pub request: String,
    pub location: String,
    pub budget: String,
    pub focus: FormField,
}

impl SearchForm {
    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Request => &self.request,
            FormField::Location => &self.location,
            FormField::Budget => &self.budget,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Request => &mut self.request,
            FormField::Location => &mut self.location,
            FormField::Budget => &mut self.budget,
        }
    }

    pub fn to_request(&self) -> HousingRequest {
        HousingRequest::new(
            self.request.trim(),
            self.location.trim(),
            self.budget.trim(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub enum HistoryState {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Vec<HistoryEntry>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryTotals {
    pub searches: usize,
    pub homes: u32,
    pub completed: usize,
}

/// Work the event loop has to perform on the controller after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    SubmitSearch(HousingRequest),
    OpenSearch(String),
    LoadHistory,
    BeginEdit,
    CancelEdit,
    FocusField(i32),
    AdjustField(i32),
    SaveCriteria,
}

/// UI-only state. Everything synchronized with the backend lives in the
/// controller's store; this tracks what the user is looking at.
#[derive(Debug, Default)]
pub struct App {
    pub view: View,
    pub tab: Tab,
    pub form: SearchForm,
    pub history: HistoryState,
    pub history_filter: String,
    pub filtering: bool,
    pub history_selected: usize,
    pub selected_home: usize,
    carousel: HashMap<String, usize>,
    pub status_note: Option<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to the dashboard for a freshly opened search.
    pub fn show_search(&mut self, search_id: &str) {
        self.view = View::ActiveSearch;
        self.tab = Tab::Agents;
        self.selected_home = 0;
        self.carousel.clear();
        self.status_note = Some(format!("opened search {search_id}"));
    }

    pub fn set_history(&mut self, result: Result<Vec<HistoryEntry>, String>) {
        self.history = match result {
            Ok(entries) => HistoryState::Loaded(entries),
            Err(message) => HistoryState::Failed(message),
        };
        self.history_selected = 0;
    }

    pub fn filtered_history(&self) -> Vec<&HistoryEntry> {
        match &self.history {
            HistoryState::Loaded(entries) => entries
                .iter()
                .filter(|entry| entry.matches_query(&self.history_filter))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn history_totals(&self) -> HistoryTotals {
        let HistoryState::Loaded(entries) = &self.history else {
            return HistoryTotals::default();
        };
        HistoryTotals {
            searches: entries.len(),
            homes: entries.iter().map(|entry| entry.homes_found).sum(),
            completed: entries
                .iter()
                .filter(|entry| entry.status == HistoryStatus::Completed)
                .count(),
        }
    }

    pub fn image_index(&self, home_id: &str) -> usize {
        self.carousel.get(home_id).copied().unwrap_or(0)
    }

    fn move_carousel(&mut self, store: Option<&ViewStateStore>, delta: isize) {
        let Some(ResultsState::Loaded(results)) = store.map(ViewStateStore::results) else {
            return;
        };
        let Some(home) = results.homes.get(self.selected_home) else {
            return;
        };
        let current = self.image_index(&home.id);
        let next = wrap_index(current, delta, home.images.len());
        self.carousel.insert(home.id.clone(), next);
    }

    fn move_home(&mut self, store: Option<&ViewStateStore>, delta: isize) {
        let Some(ResultsState::Loaded(results)) = store.map(ViewStateStore::results) else {
            return;
        };
        let len = results.homes.len();
        if len == 0 {
            return;
        }
        let next = self.selected_home as isize + delta;
        self.selected_home = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn handle_key(
        &mut self,
        key: KeyEvent,
        store: Option<&ViewStateStore>,
    ) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }
        match self.view {
            View::NewSearch => self.handle_form_key(key, store),
            View::ActiveSearch => self.handle_dashboard_key(key, store),
            View::History => self.handle_history_key(key),
        }
    }

    fn handle_form_key(
        &mut self,
        key: KeyEvent,
        store: Option<&ViewStateStore>,
    ) -> Option<Command> {
        match key.code {
            KeyCode::Esc => {
                if store.is_some() {
                    self.view = View::ActiveSearch;
                } else {
                    return self.open_history();
                }
            }
            KeyCode::Tab | KeyCode::Down => self.form.focus = self.form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus = self.form.focus.prev(),
            KeyCode::Enter => return Some(Command::SubmitSearch(self.form.to_request())),
            KeyCode::Backspace => {
                self.form.focused_mut().pop();
            }
            KeyCode::Char(ch) => self.form.focused_mut().push(ch),
            _ => {}
        }
        None
    }

    fn handle_dashboard_key(
        &mut self,
        key: KeyEvent,
        store: Option<&ViewStateStore>,
    ) -> Option<Command> {
        let editing = store
            .map(|store| store.criteria_edit().is_editing())
            .unwrap_or(false);
        if editing && self.tab == Tab::Criteria {
            match key.code {
                KeyCode::Esc => return Some(Command::CancelEdit),
                KeyCode::Char('s') => return Some(Command::SaveCriteria),
                KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => {
                    return Some(Command::AdjustField(1))
                }
                KeyCode::Char('-') | KeyCode::Left => return Some(Command::AdjustField(-1)),
                KeyCode::Down | KeyCode::Char('j') => return Some(Command::FocusField(1)),
                KeyCode::Up | KeyCode::Char('k') => return Some(Command::FocusField(-1)),
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => return Some(Command::Quit),
            KeyCode::Char('n') => self.view = View::NewSearch,
            KeyCode::Char('h') => return self.open_history(),
            KeyCode::Char(ch @ '1'..='5') => {
                let idx = ch as usize - '1' as usize;
                self.tab = Tab::ALL[idx];
            }
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Char('e') if self.tab == Tab::Criteria && !editing => {
                return Some(Command::BeginEdit)
            }
            KeyCode::Char('[') if self.tab == Tab::Results => self.move_carousel(store, -1),
            KeyCode::Char(']') if self.tab == Tab::Results => self.move_carousel(store, 1),
            KeyCode::Down | KeyCode::Char('j') if self.tab == Tab::Results => {
                self.move_home(store, 1)
            }
            KeyCode::Up | KeyCode::Char('k') if self.tab == Tab::Results => {
                self.move_home(store, -1)
            }
            _ => {}
        }
        None
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.filtering {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.filtering = false,
                KeyCode::Backspace => {
                    self.history_filter.pop();
                    self.history_selected = 0;
                }
                KeyCode::Char(ch) => {
                    self.history_filter.push(ch);
                    self.history_selected = 0;
                }
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char('q') => return Some(Command::Quit),
            KeyCode::Char('n') => self.view = View::NewSearch,
            KeyCode::Char('/') => self.filtering = true,
            KeyCode::Char('r') => return self.open_history(),
            KeyCode::Esc => {
                if !self.history_filter.is_empty() {
                    self.history_filter.clear();
                    self.history_selected = 0;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.filtered_history().len();
                if len > 0 {
                    self.history_selected = (self.history_selected + 1).min(len - 1);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.history_selected = self.history_selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                let id = self
                    .filtered_history()
                    .get(self.history_selected)
                    .map(|entry| entry.id.clone());
                if let Some(id) = id {
                    return Some(Command::OpenSearch(id));
                }
            }
            _ => {}
        }
        None
    }

    fn open_history(&mut self) -> Option<Command> {
        self.view = View::History;
        self.history = HistoryState::Loading;
        Some(Command::LoadHistory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsa_core::{Home, SearchResults};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn entry(
        id: &str,
        request: &str,
        location: &str,
        status: HistoryStatus,
        homes: u32,
    ) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            request: request.to_string(),
            location: location.to_string(),
            budget: "$500k".to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            status,
            homes_found: homes,
        }
    }

    fn store_with_homes(images: &[usize]) -> ViewStateStore {
        let mut store = ViewStateStore::new("s-1");
        let homes = images
            .iter()
            .enumerate()
            .map(|(idx, count)| Home {
                id: format!("home-{idx}"),
                images: (0..*count).map(|n| format!("https://img/{idx}/{n}")).collect(),
                ..Home::default()
            })
            .collect();
        store.set_results(Ok(SearchResults {
            homes,
            ..SearchResults::default()
        }));
        store
    }

    #[test]
    fn form_typing_and_submit() {
        let mut app = App::new();
        for ch in "3 bed".chars() {
            app.handle_key(press(KeyCode::Char(ch)), None);
        }
        app.handle_key(press(KeyCode::Tab), None);
        for ch in "Austin".chars() {
            app.handle_key(press(KeyCode::Char(ch)), None);
        }
        app.handle_key(press(KeyCode::Tab), None);
        app.handle_key(press(KeyCode::Char('9')), None);
        app.handle_key(press(KeyCode::Backspace), None);
        for ch in "$500k ".chars() {
            app.handle_key(press(KeyCode::Char(ch)), None);
        }

        let command = app.handle_key(press(KeyCode::Enter), None);
        assert_eq!(
            command,
            Some(Command::SubmitSearch(HousingRequest::new(
                "3 bed", "Austin", "$500k"
            )))
        );
    }

    #[test]
    fn q_types_into_the_form_but_quits_the_dashboard() {
        let mut app = App::new();
        assert_eq!(app.handle_key(press(KeyCode::Char('q')), None), None);
        assert_eq!(app.form.request, "q");

        let store = ViewStateStore::new("s-1");
        app.show_search("s-1");
        assert_eq!(
            app.handle_key(press(KeyCode::Char('q')), Some(&store)),
            Some(Command::Quit)
        );
    }

    #[test]
    fn number_keys_and_tab_switch_tabs() {
        let mut app = App::new();
        let store = ViewStateStore::new("s-1");
        app.show_search("s-1");

        app.handle_key(press(KeyCode::Char('5')), Some(&store));
        assert_eq!(app.tab, Tab::Results);
        app.handle_key(press(KeyCode::Tab), Some(&store));
        assert_eq!(app.tab, Tab::Agents);
        app.handle_key(press(KeyCode::Char('3')), Some(&store));
        assert_eq!(app.tab, Tab::Criteria);
    }

    #[test]
    fn criteria_keys_only_apply_while_editing() {
        let mut app = App::new();
        let mut store = ViewStateStore::new("s-1");
        app.show_search("s-1");
        app.tab = Tab::Criteria;

        assert_eq!(app.handle_key(press(KeyCode::Char('s')), Some(&store)), None);
        assert_eq!(
            app.handle_key(press(KeyCode::Char('e')), Some(&store)),
            Some(Command::BeginEdit)
        );

        store.apply(hsa_core::StreamMessage::CriteriaUpdate(Default::default()));
        assert!(store.begin_criteria_edit());
        assert_eq!(
            app.handle_key(press(KeyCode::Char('+')), Some(&store)),
            Some(Command::AdjustField(1))
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('s')), Some(&store)),
            Some(Command::SaveCriteria)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Esc), Some(&store)),
            Some(Command::CancelEdit)
        );
    }

    #[test]
    fn carousel_wraps_per_home() {
        let mut app = App::new();
        let store = store_with_homes(&[3, 0]);
        app.show_search("s-1");
        app.tab = Tab::Results;

        app.handle_key(press(KeyCode::Char('[')), Some(&store));
        assert_eq!(app.image_index("home-0"), 2);
        app.handle_key(press(KeyCode::Char(']')), Some(&store));
        app.handle_key(press(KeyCode::Char(']')), Some(&store));
        assert_eq!(app.image_index("home-0"), 1);

        app.handle_key(press(KeyCode::Down), Some(&store));
        assert_eq!(app.selected_home, 1);
        app.handle_key(press(KeyCode::Char(']')), Some(&store));
        assert_eq!(app.image_index("home-1"), 0);
        assert_eq!(app.image_index("home-0"), 1);

        app.handle_key(press(KeyCode::Down), Some(&store));
        assert_eq!(app.selected_home, 1);
    }

    #[test]
    fn history_filter_and_reopen() {
        let mut app = App::new();
        assert_eq!(
            app.handle_key(press(KeyCode::Esc), None),
            Some(Command::LoadHistory)
        );
        assert_eq!(app.view, View::History);
        app.set_history(Ok(vec![
            entry("s-1", "House with yard", "Austin, TX", HistoryStatus::Completed, 12),
            entry("s-2", "Condo", "Denver, CO", HistoryStatus::InProgress, 0),
            entry("s-3", "Loft", "austin, tx", HistoryStatus::Failed, 3),
        ]));

        let totals = app.history_totals();
        assert_eq!(
            totals,
            HistoryTotals {
                searches: 3,
                homes: 15,
                completed: 1
            }
        );

        app.handle_key(press(KeyCode::Char('/')), None);
        for ch in "AUSTIN".chars() {
            app.handle_key(press(KeyCode::Char(ch)), None);
        }
        app.handle_key(press(KeyCode::Enter), None);
        let ids: Vec<&str> = app
            .filtered_history()
            .iter()
            .map(|entry| entry.id.as_str())
            .collect();
        assert_eq!(ids, vec!["s-1", "s-3"]);

        app.handle_key(press(KeyCode::Down), None);
        assert_eq!(
            app.handle_key(press(KeyCode::Enter), None),
            Some(Command::OpenSearch("s-3".to_string()))
        );
    }

    #[test]
    fn ctrl_c_quits_from_any_view() {
        let mut app = App::new();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(key, None), Some(Command::Quit));
        assert_eq!(app.form.request, "");
    }
}
