use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::columns::ColumnModel;
use crate::domain::{CMDMode, Command, HELP_TEXT, Message, TVConfig};
use crate::fetcher::{FetchError, Page, Record};
use crate::inputter::{InputResult, Inputter};
use crate::pagination::Pagination;
use crate::transform::{FilterState, SortState, sort_records};
use crate::ui::{COLUMN_WIDTH_MARGIN, cell_text};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    EMPTY,
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    RECORD,
    COLUMNS,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub key: String,
    pub name: String,
    pub sort_indicator: Option<&'static str>,
    /// False once a fetch replaced the rows the sort was applied to.
    pub sort_applied: bool,
    pub width: usize,
    pub data: Vec<String>,
}

/// Page strip state, navigation buttons carry their enabled flag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PagerView {
    pub current_page: usize,
    pub total_pages: usize,
    pub window: Vec<usize>,
    pub first_enabled: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub last_enabled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnEntry {
    pub label: String,
    pub visible: bool,
}

/// Everything the UI needs to draw one frame.
pub struct UIData {
    pub title: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub loading: bool,
    pub filter: Option<FilterState>,
    pub pager: Option<PagerView>,
    pub show_column_panel: bool,
    pub column_entries: Vec<ColumnEntry>,
    pub column_cursor: usize,
    pub record: Option<Vec<(String, String)>>,
    pub record_line: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            title: String::new(),
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            loading: false,
            filter: None,
            pager: None,
            show_column_panel: false,
            column_entries: Vec::new(),
            column_cursor: 0,
            record: None,
            record_line: 0,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    records: Vec<Record>,
    columns: ColumnModel,
    sort: SortState,
    sort_applied: bool,
    filter: FilterState,
    pagination: Pagination,
    generation: u64,
    loaded_page: Option<usize>,
    curser_row: usize,
    curser_column: usize,
    column_curser: usize,
    record_idx: usize,
    record_line: usize,
    search_results: Vec<(usize, usize)>,
    search_idx: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &TVConfig) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            records: Vec::new(),
            columns: ColumnModel::default(),
            sort: SortState::default(),
            sort_applied: false,
            filter: FilterState::default(),
            pagination: Pagination::new(config.page_size),
            generation: 0,
            loaded_page: None,
            curser_row: 0,
            curser_column: 0,
            column_curser: 0,
            record_idx: 0,
            record_line: 0,
            search_results: Vec::new(),
            search_idx: 0,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started jtv!".to_string(),
            uidata: UIData::empty(),
        };
        model.update_uidata();
        model
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::LOADING
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    pub fn update(&mut self, message: Message) -> Option<Command> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        let command = match message {
            Message::Quit => {
                self.quit();
                None
            }
            Message::FetchFinished { generation, result } => {
                self.fetch_finished(generation, result)
            }
            msg => match self.modus {
                Modus::TABLE => self.update_table(msg),
                Modus::COLUMNS => self.update_column_panel(msg),
                Modus::RECORD => match msg {
                    Message::MoveUp => self.move_record_line(-1),
                    Message::MoveDown => self.move_record_line(1),
                    Message::MoveLeft => self.move_record(-1),
                    Message::MoveRight => self.move_record(1),
                    Message::Help => self.show_help(),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => None,
                },
                Modus::POPUP => match msg {
                    Message::Enter | Message::Exit | Message::Help => self.exit(),
                    _ => None,
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    _ => None,
                },
            },
        };

        self.update_uidata();
        command
    }

    fn update_table(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::MoveUp => self.move_table_selection(-1, 0),
            Message::MoveDown => self.move_table_selection(1, 0),
            Message::MoveLeft => self.move_table_selection(0, -1),
            Message::MoveRight => self.move_table_selection(0, 1),
            Message::Sort => self.sort_current_column(),
            Message::Enter => self.enter(),
            Message::Help => self.show_help(),
            Message::ToggleColumnPanel => self.open_column_panel(),
            Message::EditFilterTitle => self.edit_filter(CMDMode::FilterTitle),
            Message::EditFilterBody => self.edit_filter(CMDMode::FilterBody),
            Message::Search => {
                if self.config.capabilities.search {
                    self.enter_cmd_mode(CMDMode::Search, "");
                }
                None
            }
            Message::SearchNext => self.search_next(1),
            Message::SearchPrev => self.search_next(-1),
            msg => self.update_shared(msg),
        }
    }

    fn update_column_panel(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::MoveUp => {
                self.column_curser = self.column_curser.saturating_sub(1);
                None
            }
            Message::MoveDown => {
                if self.column_curser + 1 < self.columns.len() {
                    self.column_curser += 1;
                }
                None
            }
            Message::ToggleSelectedColumn => {
                match self.columns.get(self.column_curser).map(|c| c.key.clone()) {
                    Some(key) => self.update_shared(Message::ToggleColumn(key)),
                    None => None,
                }
            }
            Message::MoveColumnUp => self.move_selected_column(-1),
            Message::MoveColumnDown => self.move_selected_column(1),
            Message::ToggleColumnPanel | Message::Exit | Message::Enter => self.exit(),
            msg => self.update_shared(msg),
        }
    }

    // Events that are accepted from the table as well as from the column panel.
    fn update_shared(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Mount | Message::Refresh => self.start_fetch(),
            Message::NextPage => self.paginate(Pagination::next),
            Message::PreviousPage => self.paginate(Pagination::previous),
            Message::FirstPage => self.paginate(Pagination::first),
            Message::LastPage => self.paginate(Pagination::last),
            Message::GoToPage(page) => self.paginate(|p| p.go_to(page)),
            Message::GoToWindowSlot(slot) => match self.pagination.window().get(slot) {
                Some(&page) => self.update_shared(Message::GoToPage(page)),
                None => None,
            },
            Message::SortBy(key) => self.sort_by(&key),
            Message::ToggleColumn(key) => {
                self.toggle_column(&key);
                None
            }
            Message::Reorder { from, to } => {
                self.reorder_columns(from, to);
                None
            }
            Message::SetFilter { title, body } => {
                if self.config.capabilities.filter {
                    self.filter = FilterState { title, body };
                }
                None
            }
            Message::ApplyFilter => self.apply_filter(),
            Message::SearchFor(term) => {
                self.search(&term);
                None
            }
            Message::Exit => self.exit(),
            _ => None,
        }
    }

    // -------------------- Fetch cycle ---------------------- //

    fn start_fetch(&mut self) -> Option<Command> {
        if self.status == Status::QUITTING {
            return None;
        }
        if self.is_loading() {
            debug!("Fetch already in flight, ignoring request");
            return None;
        }
        self.generation += 1;
        self.status = Status::LOADING;
        self.set_status_message(format!("Loading page {} ...", self.pagination.current_page()));
        Some(Command::Fetch {
            generation: self.generation,
            page: self.pagination.current_page(),
            page_size: self.pagination.page_size(),
        })
    }

    fn fetch_finished(
        &mut self,
        generation: u64,
        result: Result<Page, FetchError>,
    ) -> Option<Command> {
        if generation != self.generation {
            debug!(
                "Discarding stale result of fetch {generation}, latest is {}",
                self.generation
            );
            return None;
        }
        if self.status == Status::LOADING {
            self.status = Status::READY;
        }

        match result {
            Ok(page) => {
                self.records = page.records;
                self.columns.reseed(&self.records);
                self.pagination.set_total_count(page.total_count);
                self.loaded_page = Some(self.pagination.current_page());
                self.clear_search();
                self.sort_applied = false;
                self.curser_row = 0;
                self.clamp_curser_column();
                if self.modus == Modus::RECORD {
                    self.modus = Modus::TABLE;
                }
                info!(
                    "Loaded {} records of page {}/{}",
                    self.records.len(),
                    self.pagination.current_page(),
                    self.pagination.total_pages()
                );
                self.set_status_message(format!(
                    "Loaded {} records, page {}/{}",
                    self.records.len(),
                    self.pagination.current_page(),
                    self.pagination.total_pages()
                ));
                // The collection shrank below the requested page.
                if self.pagination.clamp_current() {
                    info!(
                        "Page out of range, moving to page {}",
                        self.pagination.current_page()
                    );
                    return self.start_fetch();
                }
            }
            Err(e) => {
                error!(
                    "Fetching page {} failed: {e}",
                    self.pagination.current_page()
                );
                // Keep the page number in line with the records that stay on screen.
                if let Some(page) = self.loaded_page {
                    self.pagination.go_to(page);
                }
                self.set_status_message(format!("Loading failed: {e}"));
            }
        }
        None
    }

    fn paginate(&mut self, navigate: impl FnOnce(&mut Pagination) -> bool) -> Option<Command> {
        if !self.config.capabilities.pagination {
            trace!("Pagination disabled");
            return None;
        }
        if self.is_loading() {
            trace!("Ignoring page change while loading");
            return None;
        }
        if navigate(&mut self.pagination) {
            self.start_fetch()
        } else {
            None
        }
    }

    fn apply_filter(&mut self) -> Option<Command> {
        if !self.config.capabilities.filter || self.is_loading() {
            return None;
        }
        // Filter values are only kept locally, the endpoint receives page and limit.
        debug!(
            "Apply filter title={:?} body={:?}",
            self.filter.title, self.filter.body
        );
        self.pagination.reset();
        self.start_fetch()
    }

    // -------------------- View transforms ---------------------- //

    fn sort_current_column(&mut self) -> Option<Command> {
        let key = self
            .columns
            .visible()
            .nth(self.curser_column)
            .map(|c| c.key.clone());
        match key {
            Some(key) => self.update_shared(Message::SortBy(key)),
            None => None,
        }
    }

    fn sort_by(&mut self, key: &str) -> Option<Command> {
        if !self.config.capabilities.sort {
            trace!("Sorting disabled");
            return None;
        }
        if !self.columns.columns().iter().any(|c| c.key == key) {
            trace!("Unknown sort column {key}");
            return None;
        }
        self.sort.toggle(key);
        let start_time = Instant::now();
        sort_records(&mut self.records, key, self.sort.direction);
        self.sort_applied = true;
        trace!(
            "Sorted {} records by {key} {:?} in {}µs",
            self.records.len(),
            self.sort.direction,
            start_time.elapsed().as_micros()
        );
        self.clear_search();
        None
    }

    fn toggle_column(&mut self, key: &str) {
        if !self.config.capabilities.column_toggle {
            trace!("Column toggle disabled");
            return;
        }
        self.columns.toggle_visibility(key);
        self.clamp_curser_column();
        self.clear_search();
    }

    fn reorder_columns(&mut self, from: usize, to: usize) -> bool {
        if !self.config.capabilities.column_toggle {
            trace!("Column toggle disabled");
            return false;
        }
        let moved = self.columns.reorder(from, to);
        if moved {
            self.clear_search();
        }
        moved
    }

    fn move_selected_column(&mut self, step: isize) -> Option<Command> {
        let from = self.column_curser;
        let (Some(to), Some(key)) = (
            from.checked_add_signed(step),
            self.columns.get(from).map(|c| c.key.clone()),
        ) else {
            return None;
        };
        self.update_shared(Message::Reorder { from, to });
        // The panel selection follows the moved column.
        if self.columns.get(to).is_some_and(|c| c.key == key) {
            self.column_curser = to;
        }
        None
    }

    fn open_column_panel(&mut self) -> Option<Command> {
        if self.config.capabilities.column_toggle && !self.columns.is_empty() {
            self.previous_modus = self.modus;
            self.modus = Modus::COLUMNS;
            self.column_curser = self.column_curser.min(self.columns.len().saturating_sub(1));
        }
        None
    }

    // -------------------- Filter input and search ---------------------- //

    fn edit_filter(&mut self, mode: CMDMode) -> Option<Command> {
        if self.config.capabilities.filter {
            let current = match mode {
                CMDMode::FilterTitle => self.filter.title.clone(),
                _ => self.filter.body.clone(),
            };
            self.enter_cmd_mode(mode, &current);
        }
        None
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, initial: &str) {
        trace!("Entering command mode {mode:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(initial);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Option<Command> {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                return self.handle_cmd_input();
            }
        }
        None
    }

    fn handle_cmd_input(&mut self) -> Option<Command> {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_mode = self.cmd_mode.take();
        if self.last_input.canceled {
            return None;
        }
        let cmd_input = self.last_input.input.clone();
        let message = match cmd_mode {
            Some(CMDMode::FilterTitle) => Message::SetFilter {
                title: cmd_input,
                body: self.filter.body.clone(),
            },
            Some(CMDMode::FilterBody) => Message::SetFilter {
                title: self.filter.title.clone(),
                body: cmd_input,
            },
            Some(CMDMode::Search) => Message::SearchFor(cmd_input),
            None => {
                info!("Cmd mode is none!");
                return None;
            }
        };
        self.update_shared(message)
    }

    fn clear_search(&mut self) {
        self.search_results.clear();
        self.search_idx = 0;
    }

    fn search(&mut self, term: &str) {
        if !self.config.capabilities.search {
            return;
        }
        trace!("Starting search for {term} ...");
        self.clear_search();
        if term.is_empty() {
            return;
        }

        let keys: Vec<&str> = self.columns.visible().map(|c| c.key.as_str()).collect();
        for (row, record) in self.records.iter().enumerate() {
            for (col, key) in keys.iter().enumerate() {
                if cell_text(record, key).contains(term) {
                    self.search_results.push((row, col));
                }
            }
        }

        if self.search_results.is_empty() {
            self.set_status_message("Found no matches!");
        } else {
            self.search_idx = self
                .search_results
                .iter()
                .position(|&(row, _)| row >= self.curser_row)
                .unwrap_or(0);
            self.search_next(0);
        }
    }

    // Step is -1, 0 or 1 and wraps around at both ends.
    fn search_next(&mut self, step: isize) -> Option<Command> {
        let total = self.search_results.len();
        if total == 0 {
            return None;
        }
        self.search_idx = (self.search_idx as isize + step).rem_euclid(total as isize) as usize;
        let (row, col) = self.search_results[self.search_idx];
        self.curser_row = row;
        self.curser_column = col;
        self.set_status_message(format!("Search result {}/{}", self.search_idx + 1, total));
        None
    }

    // -------------------- Cursor handling ---------------------- //

    fn clamp_curser_column(&mut self) {
        self.curser_column = self
            .curser_column
            .min(self.columns.visible_count().saturating_sub(1));
    }

    fn move_table_selection(&mut self, rows: isize, columns: isize) -> Option<Command> {
        let max_row = self.records.len().saturating_sub(1);
        let max_col = self.columns.visible_count().saturating_sub(1);
        self.curser_row = self.curser_row.saturating_add_signed(rows).min(max_row);
        self.curser_column = self.curser_column.saturating_add_signed(columns).min(max_col);
        None
    }

    fn enter(&mut self) -> Option<Command> {
        if self.curser_row < self.records.len() {
            self.record_idx = self.curser_row;
            self.record_line = 0;
            self.previous_modus = Modus::TABLE;
            self.modus = Modus::RECORD;
        }
        None
    }

    fn exit(&mut self) -> Option<Command> {
        match self.modus {
            Modus::RECORD => {
                self.curser_row = self.record_idx;
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::COLUMNS => {
                self.previous_modus = Modus::COLUMNS;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
        None
    }

    fn show_help(&mut self) -> Option<Command> {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        None
    }

    fn move_record(&mut self, step: isize) -> Option<Command> {
        let max = self.records.len().saturating_sub(1);
        self.record_idx = self.record_idx.saturating_add_signed(step).min(max);
        None
    }

    fn move_record_line(&mut self, step: isize) -> Option<Command> {
        let max = self
            .records
            .get(self.record_idx)
            .map(|r| r.len().saturating_sub(1))
            .unwrap_or(0);
        self.record_line = self.record_line.saturating_add_signed(step).min(max);
        None
    }

    // -------------------- Render surface ---------------------- //

    fn build_column_views(&self) -> Vec<ColumnView> {
        self.columns
            .visible()
            .map(|column| {
                let sort_indicator = self.sort.indicator_for(&column.key);
                let header_width = column.label.chars().count()
                    + sort_indicator.map_or(0, |i| i.chars().count() + 1);
                let data: Vec<String> = self
                    .records
                    .iter()
                    .map(|r| cell_text(r, &column.key))
                    .collect();
                let max_width = data
                    .iter()
                    .map(|d| d.chars().count())
                    .chain(std::iter::once(header_width))
                    .max()
                    .unwrap_or(0);
                ColumnView {
                    key: column.key.clone(),
                    name: column.label.clone(),
                    sort_indicator,
                    sort_applied: self.sort_applied,
                    width: std::cmp::min(
                        max_width + COLUMN_WIDTH_MARGIN,
                        self.config.max_column_width,
                    ),
                    data,
                }
            })
            .collect()
    }

    fn build_pager_view(&self) -> PagerView {
        let p = &self.pagination;
        let idle = !self.is_loading();
        PagerView {
            current_page: p.current_page(),
            total_pages: p.total_pages(),
            window: p.window(),
            first_enabled: idle && p.has_previous(),
            previous_enabled: idle && p.has_previous(),
            next_enabled: idle && p.has_next(),
            last_enabled: idle && p.has_next(),
        }
    }

    // A view stays visible underneath the help popup.
    fn showing(&self, modus: Modus) -> bool {
        self.modus == modus || (self.modus == Modus::POPUP && self.previous_modus == modus)
    }

    fn update_uidata(&mut self) {
        let caps = self.config.capabilities;
        let record = self
            .showing(Modus::RECORD)
            .then(|| self.records.get(self.record_idx))
            .flatten()
            .map(|r| {
                r.keys()
                    .map(|key| (key.clone(), cell_text(r, key)))
                    .collect::<Vec<(String, String)>>()
            });

        self.uidata = UIData {
            title: self.config.title.clone(),
            table: self.build_column_views(),
            nrows: self.records.len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            loading: self.is_loading(),
            filter: caps.filter.then(|| self.filter.clone()),
            pager: caps.pagination.then(|| self.build_pager_view()),
            show_column_panel: self.showing(Modus::COLUMNS),
            column_entries: self
                .columns
                .columns()
                .iter()
                .map(|c| ColumnEntry {
                    label: c.label.clone(),
                    visible: c.visible,
                })
                .collect(),
            column_cursor: self.column_curser,
            record,
            record_line: self.record_line,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Capabilities;
    use crate::fetcher::PageSource;
    use crate::transform::SortDirection;
    use async_trait::async_trait;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use serde_json::{Value, json};

    struct MemorySource {
        records: Vec<Record>,
    }

    impl MemorySource {
        // Titles run backwards so sorting by title reverses the id order.
        fn posts(n: usize) -> Self {
            let records = (1..=n)
                .filter_map(|i| match json!({
                    "userId": i % 3 + 1,
                    "id": i,
                    "title": format!("post {:02}", n + 1 - i),
                    "body": format!("body of {i}"),
                }) {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            MemorySource { records }
        }
    }

    #[async_trait]
    impl PageSource for MemorySource {
        async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page, FetchError> {
            Ok(Page {
                records: self
                    .records
                    .iter()
                    .skip((page - 1) * page_size)
                    .take(page_size)
                    .cloned()
                    .collect(),
                total_count: self.records.len(),
            })
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PageSource for FailingSource {
        async fn fetch_page(&self, _page: usize, _page_size: usize) -> Result<Page, FetchError> {
            Err(FetchError::Http {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    /// Feeds a message and completes every fetch it triggers.
    async fn drive(model: &mut Model, source: &dyn PageSource, message: Message) {
        let mut command = model.update(message);
        while let Some(Command::Fetch {
            generation,
            page,
            page_size,
        }) = command
        {
            let result = source.fetch_page(page, page_size).await;
            command = model.update(Message::FetchFinished { generation, result });
        }
    }

    fn config(capabilities: Capabilities) -> TVConfig {
        TVConfig::default()
            .endpoint("memory://posts".to_string())
            .page_size(10)
            .capabilities(capabilities)
    }

    async fn mounted(capabilities: Capabilities) -> Model {
        let mut model = Model::init(&config(capabilities));
        drive(&mut model, &MemorySource::posts(25), Message::Mount).await;
        model
    }

    fn ids(model: &Model) -> Vec<i64> {
        model
            .records
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect()
    }

    fn column_keys(model: &Model) -> Vec<String> {
        model.columns.columns().iter().map(|c| c.key.clone()).collect()
    }

    fn rendered_keys(model: &Model) -> Vec<String> {
        model.get_uidata().table.iter().map(|c| c.key.clone()).collect()
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn browses_sorts_and_pages() {
        let source = MemorySource::posts(25);
        let mut model = Model::init(&config(Capabilities::default()));
        drive(&mut model, &source, Message::Mount).await;

        assert_eq!(model.status, Status::READY);
        assert_eq!(model.records.len(), 10);
        assert_eq!(model.pagination.total_pages(), 3);
        assert_eq!(column_keys(&model), vec!["userId", "id", "title", "body"]);
        assert_eq!(model.get_uidata().nrows, 10);

        // Select the title column and sort by it.
        model.update(Message::MoveRight);
        model.update(Message::MoveRight);
        assert!(model.update(Message::Sort).is_none());
        assert_eq!(ids(&model), vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
        let title = &model.get_uidata().table[2];
        assert_eq!((title.name.as_str(), title.sort_indicator), ("TITLE", Some("▲")));
        assert!(title.sort_applied);

        model.update(Message::Sort);
        assert_eq!(ids(&model), (1..=10).collect::<Vec<i64>>());
        assert_eq!(model.get_uidata().table[2].sort_indicator, Some("▼"));

        drive(&mut model, &source, Message::NextPage).await;
        assert_eq!(model.pagination.current_page(), 2);
        assert_eq!(ids(&model), (11..=20).collect::<Vec<i64>>());
        // The sort is a transform of one page and is not re-applied.
        assert_eq!(model.sort.column.as_deref(), Some("title"));
        let title = &model.get_uidata().table[2];
        assert_eq!(title.sort_indicator, Some("▼"));
        assert!(!title.sort_applied);
        assert!(model.get_uidata().table[0].sort_indicator.is_none());

        drive(&mut model, &source, Message::NextPage).await;
        assert_eq!(ids(&model), (21..=25).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn new_sort_column_starts_ascending() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::SortBy("title".to_string()));
        model.update(Message::SortBy("title".to_string()));
        assert_eq!(model.sort.direction, SortDirection::Descending);

        model.update(Message::SortBy("id".to_string()));
        assert_eq!(model.sort.column.as_deref(), Some("id"));
        assert_eq!(model.sort.direction, SortDirection::Ascending);
        assert_eq!(ids(&model), (1..=10).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn navigation_stays_within_page_range() {
        let source = MemorySource::posts(25);
        let mut model = mounted(Capabilities::default()).await;

        for _ in 0..5 {
            drive(&mut model, &source, Message::NextPage).await;
        }
        assert_eq!(model.pagination.current_page(), 3);
        assert!(model.update(Message::NextPage).is_none());
        assert!(model.update(Message::LastPage).is_none());

        for _ in 0..5 {
            drive(&mut model, &source, Message::PreviousPage).await;
        }
        assert_eq!(model.pagination.current_page(), 1);
        assert!(model.update(Message::FirstPage).is_none());

        drive(&mut model, &source, Message::GoToPage(99)).await;
        assert_eq!(model.pagination.current_page(), 3);
        drive(&mut model, &source, Message::GoToWindowSlot(0)).await;
        assert_eq!(model.pagination.current_page(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_displayed_page() {
        let mut model = mounted(Capabilities::default()).await;
        let records = model.records.clone();
        let columns = model.columns.clone();

        drive(&mut model, &FailingSource, Message::NextPage).await;

        assert!(!model.is_loading());
        assert_eq!(model.records, records);
        assert_eq!(model.columns, columns);
        assert_eq!(model.pagination.current_page(), 1);
        assert!(model.get_uidata().status_message.contains("503"));
    }

    #[tokio::test]
    async fn failed_mount_leaves_model_empty() {
        let mut model = Model::init(&config(Capabilities::default()));
        drive(&mut model, &FailingSource, Message::Mount).await;
        assert!(model.records.is_empty());
        assert!(model.columns.is_empty());
        assert_eq!(model.status, Status::READY);
        assert!(!model.get_uidata().loading);
        assert!(model.get_uidata().status_message.starts_with("Loading failed"));
    }

    #[tokio::test]
    async fn empty_page_keeps_columns() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::ToggleColumn("body".to_string()));
        let columns = model.columns.clone();

        let Some(Command::Fetch { generation, .. }) = model.update(Message::Refresh) else {
            panic!("refresh should fetch");
        };
        model.update(Message::FetchFinished {
            generation,
            result: Ok(Page::default()),
        });

        assert!(model.records.is_empty());
        assert_eq!(model.columns, columns);
        assert_eq!(model.pagination.total_pages(), 0);
        assert_eq!(rendered_keys(&model), vec!["userId", "id", "title"]);
    }

    #[tokio::test]
    async fn fetch_rederives_columns() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::Reorder { from: 3, to: 0 });
        model.update(Message::ToggleColumn("id".to_string()));
        assert_eq!(rendered_keys(&model), vec!["body", "userId", "title"]);

        let other = match json!({"name": "x", "size": 3}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let Some(Command::Fetch { generation, .. }) = model.update(Message::Refresh) else {
            panic!("refresh should fetch");
        };
        model.update(Message::FetchFinished {
            generation,
            result: Ok(Page {
                records: vec![other],
                total_count: 1,
            }),
        });
        assert_eq!(rendered_keys(&model), vec!["name", "size"]);
    }

    #[tokio::test]
    async fn shrinking_collection_moves_back_into_range() {
        let mut model = mounted(Capabilities::default()).await;
        drive(&mut model, &MemorySource::posts(25), Message::LastPage).await;
        assert_eq!(model.pagination.current_page(), 3);

        let Some(Command::Fetch { generation, .. }) = model.update(Message::Refresh) else {
            panic!("refresh should fetch");
        };
        let command = model.update(Message::FetchFinished {
            generation,
            result: Ok(Page {
                records: Vec::new(),
                total_count: 5,
            }),
        });

        assert_eq!(model.pagination.current_page(), 1);
        assert_eq!(model.pagination.total_pages(), 1);
        assert!(matches!(command, Some(Command::Fetch { page: 1, .. })));
        assert!(model.is_loading());

        let Some(Command::Fetch { generation, .. }) = command else {
            unreachable!();
        };
        let source = MemorySource::posts(5);
        let result = source.fetch_page(1, 10).await;
        assert!(model.update(Message::FetchFinished { generation, result }).is_none());
        assert_eq!(ids(&model), vec![1, 2, 3, 4, 5]);
        let pager = model.get_uidata().pager.clone().unwrap();
        assert_eq!((pager.current_page, pager.total_pages), (1, 1));
        assert!(!pager.previous_enabled && !pager.next_enabled);
    }

    #[tokio::test]
    async fn ignores_requests_while_loading() {
        let mut model = mounted(Capabilities::default()).await;
        let command = model.update(Message::NextPage);
        assert!(matches!(command, Some(Command::Fetch { page: 2, .. })));
        assert!(model.get_uidata().loading);

        assert!(model.update(Message::NextPage).is_none());
        assert!(model.update(Message::Refresh).is_none());
        assert!(model.update(Message::ApplyFilter).is_none());
        let pager = model.get_uidata().pager.clone().unwrap();
        assert!(!pager.next_enabled && !pager.previous_enabled);
    }

    #[tokio::test]
    async fn discards_stale_results() {
        let mut model = mounted(Capabilities::default()).await;
        let records = model.records.clone();
        let Some(Command::Fetch { generation, .. }) = model.update(Message::NextPage) else {
            panic!("next page should fetch");
        };

        model.update(Message::FetchFinished {
            generation: generation - 1,
            result: Ok(Page::default()),
        });
        assert!(model.is_loading());
        assert_eq!(model.records, records);
    }

    #[tokio::test]
    async fn apply_filter_returns_to_first_page() {
        let source = MemorySource::posts(25);
        let mut model = mounted(Capabilities::default()).await;
        drive(&mut model, &source, Message::LastPage).await;
        assert_eq!(model.pagination.current_page(), 3);

        model.update(Message::SetFilter {
            title: "post".to_string(),
            body: String::new(),
        });
        let command = model.update(Message::ApplyFilter);
        assert!(matches!(command, Some(Command::Fetch { page: 1, .. })));
        assert_eq!(model.filter.title, "post");

        // Applying again on page one still re-fetches.
        let mut model = mounted(Capabilities::default()).await;
        assert!(model.update(Message::ApplyFilter).is_some());
    }

    #[tokio::test]
    async fn filter_text_is_edited_without_fetching() {
        let mut model = mounted(Capabilities::default()).await;
        assert!(model.update(Message::EditFilterTitle).is_none());
        assert!(model.raw_keyevents());
        for c in "qui".chars() {
            assert!(model.update(key(KeyCode::Char(c))).is_none());
        }
        assert!(model.update(key(KeyCode::Enter)).is_none());
        assert!(!model.raw_keyevents());
        assert_eq!(model.filter.title, "qui");

        model.update(Message::EditFilterBody);
        model.update(key(KeyCode::Char('x')));
        model.update(key(KeyCode::Esc));
        assert_eq!(model.filter.body, "");
        assert_eq!(model.get_uidata().filter.clone().unwrap().title, "qui");
    }

    #[tokio::test]
    async fn disabled_column_toggle_leaves_columns_untouched() {
        let caps = Capabilities::default().with_column_toggle(false);
        let mut model = mounted(caps).await;
        let columns = model.columns.clone();

        model.update(Message::Reorder { from: 0, to: 3 });
        model.update(Message::ToggleColumn("title".to_string()));
        model.update(Message::ToggleColumnPanel);
        model.update(Message::ToggleSelectedColumn);
        model.update(Message::MoveColumnDown);

        assert_eq!(model.columns, columns);
        assert!(!model.get_uidata().show_column_panel);
    }

    #[tokio::test]
    async fn disabled_capabilities_are_noops() {
        let caps = Capabilities::default()
            .with_sort(false)
            .with_filter(false)
            .with_pagination(false)
            .with_search(false);
        let mut model = mounted(caps).await;
        let records = model.records.clone();

        assert!(model.update(Message::SortBy("title".to_string())).is_none());
        assert_eq!(model.records, records);
        assert_eq!(model.sort, SortState::default());

        assert!(model.update(Message::NextPage).is_none());
        assert!(model.update(Message::GoToPage(2)).is_none());
        assert_eq!(model.pagination.current_page(), 1);

        model.update(Message::SetFilter {
            title: "x".to_string(),
            body: "y".to_string(),
        });
        assert!(model.update(Message::ApplyFilter).is_none());
        assert_eq!(model.filter, FilterState::default());

        model.update(Message::SearchFor("post".to_string()));
        assert!(model.search_results.is_empty());

        let uidata = model.get_uidata();
        assert!(uidata.filter.is_none());
        assert!(uidata.pager.is_none());
    }

    #[tokio::test]
    async fn search_cycles_through_hits() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::SearchFor("post 2".to_string()));
        // Titles "post 25" down to "post 20" sit in the first six rows.
        assert_eq!(model.search_results.len(), 6);
        assert_eq!((model.curser_row, model.curser_column), (0, 2));

        model.update(Message::SearchNext);
        assert_eq!(model.curser_row, 1);
        model.update(Message::SearchPrev);
        model.update(Message::SearchPrev);
        assert_eq!(model.curser_row, 5);

        model.update(Message::SearchFor("nothing like this".to_string()));
        assert!(model.search_results.is_empty());
        assert_eq!(model.get_uidata().status_message, "Found no matches!");
    }

    #[tokio::test]
    async fn column_panel_hides_and_moves_columns() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::ToggleColumnPanel);
        assert!(model.get_uidata().show_column_panel);

        model.update(Message::MoveDown);
        model.update(Message::ToggleSelectedColumn);
        assert_eq!(rendered_keys(&model), vec!["userId", "title", "body"]);

        model.update(Message::MoveColumnDown);
        assert_eq!(column_keys(&model), vec!["userId", "title", "id", "body"]);
        assert_eq!(model.get_uidata().column_cursor, 2);

        model.update(Message::ToggleSelectedColumn);
        assert_eq!(rendered_keys(&model), vec!["userId", "title", "id", "body"]);

        model.update(Message::Exit);
        assert!(!model.get_uidata().show_column_panel);
    }

    #[tokio::test]
    async fn record_view_shows_all_fields() {
        let mut model = mounted(Capabilities::default()).await;
        model.update(Message::ToggleColumn("body".to_string()));
        model.update(Message::MoveDown);
        model.update(Message::Enter);

        let record = model.get_uidata().record.clone().unwrap();
        assert_eq!(record.len(), 4);
        assert_eq!(record[1], ("id".to_string(), "2".to_string()));

        model.update(Message::MoveRight);
        model.update(Message::Exit);
        assert!(model.get_uidata().record.is_none());
        assert_eq!(model.curser_row, 2);
    }

    #[test]
    fn help_popup_returns_to_previous_view() {
        let mut model = Model::init(&config(Capabilities::default()));
        model.update(Message::Help);
        assert!(model.get_uidata().show_popup);
        model.update(Message::Exit);
        assert!(!model.get_uidata().show_popup);
        assert_eq!(model.modus, Modus::TABLE);

        model.update(Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
        assert!(model.update(Message::Refresh).is_none());
        assert_eq!(model.status, Status::QUITTING);
    }
}
