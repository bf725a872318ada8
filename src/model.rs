use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use crate::dataset::{Datasets, ResultSet, Value};
use crate::domain::{
    CMDMode, HELP_TEXT, Message, PREDEFINED_QUERIES, SelectorKind, ViewerConfig, ViewerError,
};
use crate::export::{export_to_file, quote_cell};
use crate::inputter::{InputState, LineInput};
use crate::interpreter::{PendingQuery, QueryError, QueryOutcome, QueryRunner};
use crate::layout::{ColumnMetrics, render_widths, visible_columns};
use crate::storage::{Preferences, Storage};
use crate::ui::{
    CMDLINE_HEIGH, HEADER_HEIGHT, PAGINATION_HEIGHT, QUERY_HEIGHT, ROW_HEIGHT, SCROLLBAR_WIDTH,
    STATS_HEIGHT, TABLE_HEADER_HEIGHT,
};
use crate::view::TableState;
use crate::viewport::Viewport;

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Running,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
    CmdInput,
    Selector,
}

/// What the controller should map keys to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyContext {
    Table,
    Popup,
    Selector(SelectorKind),
    Raw,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorView {
    pub title: String,
    pub items: Vec<String>,
    pub cursor: usize,
    pub hint: String,
}

struct Selector {
    kind: SelectorKind,
    items: Vec<String>,
    cursor: usize,
}

/// Everything the ui needs to draw a frame.
pub struct UIData {
    pub dark_mode: bool,
    pub query: String,
    pub running: Option<Duration>,
    pub stats: Option<(bool, String)>,
    pub empty_message: Option<String>,
    pub columns_only: bool,
    pub table: Vec<ColumnView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub list_height: usize,
    pub page_info: String,
    pub page_label: String,
    pub filter: String,
    pub cmdinput: InputState,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub selector: Option<SelectorView>,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            dark_mode: false,
            query: String::new(),
            running: None,
            stats: None,
            empty_message: None,
            columns_only: false,
            table: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            list_height: 0,
            page_info: String::new(),
            page_label: String::new(),
            filter: String::new(),
            cmdinput: InputState::default(),
            cmd_mode: None,
            active_cmdinput: false,
            show_popup: false,
            popup_message: String::new(),
            selector: None,
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let chrome = HEADER_HEIGHT
            + QUERY_HEIGHT
            + STATS_HEIGHT
            + TABLE_HEADER_HEIGHT
            + PAGINATION_HEIGHT
            + CMDLINE_HEIGH;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(chrome),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    runner: QueryRunner,
    pending: Option<PendingQuery>,
    query_text: String,
    result: Option<ResultSet>,
    last_outcome: Option<QueryOutcome>,
    table: Option<TableState>,
    columns_only: bool,
    widths: Vec<usize>,
    metrics: ColumnMetrics,
    viewport: Viewport,
    offset_column: usize,
    curser_column: usize,
    uilayout: UILayout,
    uidata: UIData,
    prefs: Preferences,
    storage: Box<dyn Storage>,
    clipboard: Option<Clipboard>,
    input: LineInput,
    cmd_mode: Option<CMDMode>,
    last_input: InputState,
    active_cmdinput: bool,
    selector: Option<Selector>,
    popup_message: String,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &ViewerConfig,
        datasets: Arc<Datasets>,
        storage: Box<dyn Storage>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, ViewerError> {
        let prefs = Preferences::load(storage.as_ref());
        debug!(
            "Loaded preferences: dark {}, {} history, {} bookmarks",
            prefs.dark_mode,
            prefs.history.len(),
            prefs.bookmarks.len()
        );
        let uilayout = UILayout::from_values(ui_width, ui_height);
        let query_text = config
            .initial_query
            .clone()
            .unwrap_or_else(|| PREDEFINED_QUERIES[0].label.to_string());

        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            runner: QueryRunner::new(datasets, Duration::from_millis(config.max_delay_ms)),
            pending: None,
            query_text,
            result: None,
            last_outcome: None,
            table: None,
            columns_only: false,
            widths: Vec::new(),
            metrics: ColumnMetrics::cells(),
            viewport: Viewport::new(ROW_HEIGHT, uilayout.table_height),
            offset_column: 0,
            curser_column: 0,
            uilayout,
            uidata: UIData::empty(),
            prefs,
            storage,
            clipboard: None,
            input: LineInput::default(),
            cmd_mode: None,
            last_input: InputState::default(),
            active_cmdinput: false,
            selector: None,
            popup_message: String::new(),
            status_message: "Press ? for help".to_string(),
        };
        model.update_uidata();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn key_context(&self) -> KeyContext {
        match self.modus {
            Modus::Table => KeyContext::Table,
            Modus::Popup => KeyContext::Popup,
            Modus::CmdInput => KeyContext::Raw,
            Modus::Selector => match &self.selector {
                Some(s) => KeyContext::Selector(s.kind),
                None => KeyContext::Table,
            },
        }
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        trace!("Status: {}", self.status_message);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), ViewerError> {
        self.poll_query();

        if let Some(msg) = message {
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MoveBeginning => self.viewport.move_beginning(),
                    Message::MoveEnd => self.viewport.move_end(self.page_len()),
                    Message::NextPage => self.change_page(true),
                    Message::PrevPage => self.change_page(false),
                    Message::GrowPageSize => self.change_page_size(true),
                    Message::ShrinkPageSize => self.change_page_size(false),
                    Message::EditQuery => self.enter_cmd_mode(CMDMode::Query),
                    Message::RunQuery => self.run_query(),
                    Message::ClearQuery => self.clear_query(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                    Message::ClearFilter => self.apply_filter(""),
                    Message::ToggleColumnsView => self.toggle_columns_view(),
                    Message::ToggleTheme => self.toggle_theme(),
                    Message::Export => self.export(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::OpenSelector(kind) => self.open_selector(kind),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::Selector => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selector(true),
                    Message::MoveUp => self.move_selector(false),
                    Message::Enter => self.pick_selector_item(),
                    Message::Bookmark => self.bookmark_selected(),
                    Message::RemoveBookmark => self.remove_selected_bookmark(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CmdInput => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Query execution ---------------------- //

    pub fn set_query_text(&mut self, text: &str) {
        self.query_text = text.to_string();
        self.update_uidata();
    }

    fn run_query(&mut self) {
        if let Some(pending) = &self.pending {
            debug!("Rejecting run, \"{}\" is still running", pending.query());
            self.set_status_message("A query is already running ...");
            return;
        }
        let query = self.query_text.clone();
        if self.prefs.record_history(&query) {
            self.persist();
        }
        self.pending = Some(self.runner.spawn(&query));
        self.status = Status::Running;
        self.set_status_message("Running query ...");
    }

    fn poll_query(&mut self) {
        let outcome = match &self.pending {
            Some(pending) => pending.poll(),
            None => return,
        };
        if let Some(outcome) = outcome {
            self.pending = None;
            if self.status == Status::Running {
                self.status = Status::Ready;
            }
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: QueryOutcome) {
        info!(
            "Query \"{}\" finished: {}",
            outcome.query,
            outcome.stats.summary()
        );
        match &outcome.result {
            Ok(result) => {
                self.result = Some(result.clone());
                self.rebuild_table();
                self.set_status_message(format!("Loaded {}", outcome.stats.summary()));
            }
            Err(e) => {
                self.result = None;
                self.table = None;
                self.widths.clear();
                self.set_status_message(e.to_string());
            }
        }
        self.last_outcome = Some(outcome);
    }

    fn clear_query(&mut self) {
        // A query still in flight is dropped together with its outcome
        if let Some(pending) = self.pending.take() {
            debug!("Discarding running query \"{}\"", pending.query());
            self.status = Status::Ready;
        }
        self.query_text.clear();
        self.result = None;
        self.table = None;
        self.widths.clear();
        self.last_outcome = None;
        self.set_status_message("Cleared query");
    }

    /// Builds the displayed table from the last result. Filter and paging start over.
    fn rebuild_table(&mut self) {
        self.table = self.result.as_ref().map(|result| {
            let source = if self.columns_only {
                result.columns_view()
            } else {
                result.clone()
            };
            TableState::new(source, self.config.page_size)
        });
        self.viewport.reset();
        self.offset_column = 0;
        self.curser_column = 0;
        self.recompute_widths();
    }

    fn recompute_widths(&mut self) {
        self.widths = match &self.table {
            Some(table) => render_widths(
                table.result(),
                table.filtered_rows(),
                self.uilayout.table_width,
                &self.metrics,
            ),
            None => Vec::new(),
        };
        trace!("Column widths: {:?}", self.widths);
    }

    fn toggle_columns_view(&mut self) {
        self.columns_only = !self.columns_only;
        self.rebuild_table();
        self.set_status_message(if self.columns_only {
            "Showing columns"
        } else {
            "Showing data"
        });
    }

    // -------------------- Filter and paging ---------------------- //

    fn apply_filter(&mut self, term: &str) {
        if let Some(table) = self.table.as_mut() {
            if term.is_empty() {
                table.clear_filter();
            } else {
                table.set_filter(term);
            }
            self.viewport.reset();
            self.recompute_widths();
        }
    }

    fn page_len(&self) -> usize {
        self.table.as_ref().map(|t| t.page_rows().len()).unwrap_or(0)
    }

    fn change_page(&mut self, forward: bool) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let moved = if forward {
            table.next_page()
        } else {
            table.prev_page()
        };
        if moved {
            self.viewport.reset();
        }
    }

    fn change_page_size(&mut self, grow: bool) {
        if let Some(table) = self.table.as_mut() {
            table.cycle_page_size(grow);
            let size = table.paging().page_size;
            self.viewport.clamp(self.page_len());
            self.set_status_message(format!("{size} rows per page"));
        }
    }

    // -------------------- Navigation ---------------------- //

    fn move_selection_down(&mut self, size: usize) {
        let rows = self.page_len();
        self.viewport.move_down(size, rows);
    }

    fn move_selection_up(&mut self, size: usize) {
        let rows = self.page_len();
        self.viewport.move_up(size, rows);
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.widths.len() {
            self.curser_column += 1;
        }
        // Shift the view until the selected column is completely visible
        while self.offset_column < self.curser_column {
            let visible =
                visible_columns(&self.widths, self.offset_column, self.uilayout.table_width);
            let fully_visible = visible
                .iter()
                .any(|&(idx, width)| idx == self.curser_column && width == self.widths[idx]);
            if fully_visible {
                break;
            }
            self.offset_column += 1;
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        let rows = self.page_len();
        self.viewport.set_max_height(self.uilayout.table_height, rows);
        self.recompute_widths();
    }

    // -------------------- Cmd input ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        if mode == CMDMode::Filter && self.table.is_none() {
            self.set_status_message("Nothing to filter, run a query first");
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        let initial = match mode {
            CMDMode::Query => self.query_text.clone(),
            CMDMode::Filter => self
                .table
                .as_ref()
                .map(|t| t.filter_text().to_string())
                .unwrap_or_default(),
        };
        self.input.set(&initial);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);

        // Filtering is live, every change is applied right away
        if self.cmd_mode == Some(CMDMode::Filter) && self.last_input.changed {
            let term = self.last_input.text.clone();
            self.apply_filter(&term);
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.text);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;

        let input = self.last_input.clone();
        match self.cmd_mode {
            Some(CMDMode::Query) => {
                if !input.canceled {
                    self.query_text = input.text;
                    self.run_query();
                }
            }
            Some(CMDMode::Filter) => {
                if input.canceled {
                    self.apply_filter("");
                }
                if let Some(table) = &self.table {
                    let message = format!("{} matching rows", table.filtered_len());
                    self.set_status_message(message);
                }
            }
            None => info!("Cmd mode is none!"),
        }
        self.cmd_mode = None;
        self.input.clear();
    }

    // -------------------- Popups and selectors ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::Popup => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::Popup;
                self.popup_message.clear();
            }
            Modus::Selector => {
                self.selector = None;
                self.modus = Modus::Table;
                self.previous_modus = Modus::Selector;
            }
            Modus::Table | Modus::CmdInput => {}
        }
    }

    fn selector_items(&self, kind: SelectorKind) -> Vec<String> {
        match kind {
            SelectorKind::Predefined => PREDEFINED_QUERIES
                .iter()
                .map(|q| q.label.to_string())
                .collect(),
            SelectorKind::History => self.prefs.history.iter().map(|q| q.label.clone()).collect(),
            SelectorKind::Bookmarks => self
                .prefs
                .bookmarks
                .iter()
                .map(|q| q.label.clone())
                .collect(),
        }
    }

    fn open_selector(&mut self, kind: SelectorKind) {
        let items = self.selector_items(kind);
        // Preselect the entry matching the editor content
        let cursor = items
            .iter()
            .position(|i| *i == self.query_text)
            .unwrap_or(0);
        self.selector = Some(Selector {
            kind,
            items,
            cursor,
        });
        self.previous_modus = self.modus;
        self.modus = Modus::Selector;
    }

    fn move_selector(&mut self, down: bool) {
        if let Some(selector) = self.selector.as_mut() {
            if down {
                if selector.cursor + 1 < selector.items.len() {
                    selector.cursor += 1;
                }
            } else {
                selector.cursor = selector.cursor.saturating_sub(1);
            }
        }
    }

    fn selected_item(&self) -> Option<String> {
        self.selector
            .as_ref()
            .and_then(|s| s.items.get(s.cursor).cloned())
    }

    fn pick_selector_item(&mut self) {
        if let Some(label) = self.selected_item() {
            debug!("Loading query from selector: {label}");
            self.query_text = label;
        }
        self.exit();
    }

    fn bookmark_selected(&mut self) {
        let is_history = matches!(
            self.selector.as_ref().map(|s| s.kind),
            Some(SelectorKind::History)
        );
        if !is_history {
            return;
        }
        if let Some(label) = self.selected_item() {
            if self.prefs.add_bookmark(&label) {
                self.persist();
                self.set_status_message("Bookmarked query");
            } else {
                self.set_status_message("Query is already bookmarked");
            }
        }
    }

    fn remove_selected_bookmark(&mut self) {
        let is_bookmarks = matches!(
            self.selector.as_ref().map(|s| s.kind),
            Some(SelectorKind::Bookmarks)
        );
        if !is_bookmarks {
            return;
        }
        if let Some(label) = self.selected_item()
            && self.prefs.remove_bookmark(&label)
        {
            self.persist();
            self.set_status_message("Removed bookmark");
            let items = self.selector_items(SelectorKind::Bookmarks);
            if let Some(selector) = self.selector.as_mut() {
                selector.cursor = std::cmp::min(selector.cursor, items.len().saturating_sub(1));
                selector.items = items;
            }
        }
    }

    // -------------------- Preferences ---------------------- //

    fn toggle_theme(&mut self) {
        self.prefs.toggle_theme();
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.prefs.save(self.storage.as_mut()) {
            error!("Saving preferences failed: {e}");
            self.set_status_message(format!("Saving preferences failed: {e}"));
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    // -------------------- Export and clipboard ---------------------- //

    fn export(&mut self) {
        let Some(table) = &self.table else {
            self.set_status_message("Nothing to export, run a query first");
            return;
        };
        match export_to_file(table.result(), table.filtered_rows(), &self.config.export_path) {
            Ok((path, rows)) => {
                self.set_status_message(format!("Exported {} rows to {}", rows, path.display()))
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    /// Result row under the curser.
    fn selected_record(&self) -> Option<usize> {
        let table = self.table.as_ref()?;
        table.page_rows().get(self.viewport.cursor()).copied()
    }

    fn selected_cell_text(&self) -> Option<String> {
        let table = self.table.as_ref()?;
        let record = self.selected_record()?;
        table.result().rows()[record]
            .get(self.curser_column)
            .map(Value::cell_text)
    }

    fn selected_row_as_csv(&self) -> Option<String> {
        let table = self.table.as_ref()?;
        let record = self.selected_record()?;
        let content = table.result().rows()[record]
            .values
            .iter()
            .map(|v| quote_cell(&v.cell_text()))
            .collect::<Vec<String>>();
        Some(content.join(","))
    }

    fn copy_to_clipboard(&mut self, content: String) -> Result<(), ViewerError> {
        if self.clipboard.is_none() {
            let clipboard = Clipboard::new().map_err(|e| ViewerError::Clipboard(e.to_string()))?;
            self.clipboard = Some(clipboard);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard
                .set_text(content)
                .map_err(|e| ViewerError::Clipboard(e.to_string()))?;
        }
        Ok(())
    }

    fn copy_cell(&mut self) {
        if let Some(cell) = self.selected_cell_text() {
            trace!("Cell content: {}", cell);
            self.copy_with_status(cell, "Copied cell to clipboard");
        }
    }

    fn copy_row(&mut self) {
        if let Some(row) = self.selected_row_as_csv() {
            self.copy_with_status(row, "Copied row to clipboard");
        }
    }

    fn copy_with_status(&mut self, content: String, done: &str) {
        match self.copy_to_clipboard(content) {
            Ok(_) => self.set_status_message(done),
            Err(e) => {
                error!("Error copying to clipboard: {e}");
                self.set_status_message(e.to_string());
            }
        }
    }

    // -------------------- UI data ---------------------- //

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            return reduced;
        }
        name.to_string()
    }

    fn display_text(value: &Value) -> String {
        if value.is_null() {
            return String::from("∅");
        }
        value
            .to_string()
            .replace("\r\n", " ↵ ")
            .replace('\n', " ↵ ")
    }

    fn build_table_view(&self, table: &TableState) -> (Vec<ColumnView>, usize) {
        let page = table.page_rows();
        let window = self.viewport.window(page.len());
        let records = &page[window];

        let visible = visible_columns(&self.widths, self.offset_column, self.uilayout.table_width);
        let views = visible
            .iter()
            .map(|&(cidx, width)| ColumnView {
                name: Self::get_visible_name(&table.result().columns()[cidx], width),
                width,
                data: records
                    .iter()
                    .map(|&r| {
                        table.result().rows()[r]
                            .get(cidx)
                            .map(Self::display_text)
                            .unwrap_or_default()
                    })
                    .collect(),
            })
            .collect();
        let selected_column = visible
            .iter()
            .position(|&(cidx, _)| cidx == self.curser_column)
            .unwrap_or(0);
        (views, selected_column)
    }

    fn update_uidata(&mut self) {
        let mut uidata = UIData::empty();
        uidata.dark_mode = self.prefs.dark_mode;
        uidata.query = self.query_text.clone();
        uidata.running = self.pending.as_ref().map(|p| p.running_for());
        uidata.columns_only = self.columns_only;
        uidata.stats = self.last_outcome.as_ref().map(|o| {
            let ok = o.result.is_ok();
            let label = if ok {
                "Query executed successfully"
            } else {
                "Query failed"
            };
            (ok, format!("{label}  {}", o.stats.summary()))
        });

        uidata.empty_message = match (&self.last_outcome, &self.table) {
            (Some(QueryOutcome { result: Err(e), .. }), _) => Some(Self::error_text(e)),
            (_, None) => Some("Run a query to see results".to_string()),
            (_, Some(table)) if table.filtered_len() == 0 => Some(
                if table.filter_text().is_empty() {
                    "No data available"
                } else {
                    "No matching records found"
                }
                .to_string(),
            ),
            _ => None,
        };

        if let Some(table) = &self.table {
            let (views, selected_column) = self.build_table_view(table);
            let paging = table.paging();
            uidata.table = views;
            uidata.selected_column = selected_column;
            uidata.selected_row = self
                .viewport
                .cursor()
                .saturating_sub(self.viewport.window(self.page_len()).start);
            uidata.list_height = self.viewport.list_height(self.page_len());
            uidata.page_info = table.page_info();
            uidata.page_label = format!(
                "Page {}/{}  {} rows per page",
                if table.page_count() == 0 { 0 } else { paging.page + 1 },
                table.page_count(),
                paging.page_size
            );
            uidata.filter = table.filter_text().to_string();
        }

        uidata.cmdinput = self.last_input.clone();
        uidata.cmd_mode = self.cmd_mode;
        uidata.active_cmdinput = self.active_cmdinput;
        uidata.show_popup = self.modus == Modus::Popup;
        uidata.popup_message = self.popup_message.clone();
        uidata.selector = self.selector.as_ref().map(Self::selector_view);
        uidata.status_message = self.status_message.clone();
        self.uidata = uidata;
    }

    fn error_text(error: &QueryError) -> String {
        error.to_string()
    }

    fn selector_view(selector: &Selector) -> SelectorView {
        let (title, hint) = match selector.kind {
            SelectorKind::Predefined => (" Predefined queries ", "<Enter> load  <Esc> close"),
            SelectorKind::History => (
                " Query history ",
                "<Enter> load  <b> bookmark  <Esc> close",
            ),
            SelectorKind::Bookmarks => (
                " Bookmarked queries ",
                "<Enter> load  <d> remove  <Esc> close",
            ),
        };
        let items = match selector.kind {
            SelectorKind::Predefined => PREDEFINED_QUERIES
                .iter()
                .map(|q| format!("{}: {}", q.name, q.label))
                .collect(),
            _ => selector.items.clone(),
        };
        SelectorView {
            title: title.to_string(),
            items,
            cursor: selector.cursor,
            hint: hint.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HISTORY_KEY, MemoryStorage};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::thread;
    use std::time::Instant;

    fn model_with(config: ViewerConfig) -> Model {
        Model::init(
            &config,
            Datasets::load().unwrap(),
            Box::new(MemoryStorage::default()),
            120,
            40,
        )
        .unwrap()
    }

    fn model() -> Model {
        model_with(ViewerConfig::default().with_max_delay_ms(0))
    }

    fn wait_for_query(model: &mut Model) {
        let started = Instant::now();
        while model.status == Status::Running {
            assert!(started.elapsed() < Duration::from_secs(10), "query never finished");
            thread::sleep(Duration::from_millis(5));
            model.update(None).unwrap();
        }
    }

    fn run(model: &mut Model, query: &str) {
        model.set_query_text(query);
        model.update(Some(Message::RunQuery)).unwrap();
        wait_for_query(model);
    }

    fn type_keys(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    fn press(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    #[test]
    fn starts_with_first_predefined_query() {
        let model = model();
        assert_eq!(model.get_uidata().query, "SELECT * FROM categories");
        assert_eq!(
            model.get_uidata().empty_message.as_deref(),
            Some("Run a query to see results")
        );
    }

    #[test]
    fn running_a_query_fills_the_table() {
        let mut model = model();
        run(&mut model, "SELECT * FROM products");
        let ui = model.get_uidata();
        assert_eq!(ui.page_info, "Showing 1 to 10 of 77 entries");
        assert!(ui.empty_message.is_none());
        assert_eq!(ui.table[0].name, "productID");
        assert_eq!(ui.table[0].data.len(), 10);
        let (ok, stats) = ui.stats.clone().unwrap();
        assert!(ok);
        assert!(stats.starts_with("Query executed successfully  77 rows in"));
    }

    #[test]
    fn failed_queries_show_the_error() {
        let mut model = model();
        run(&mut model, "banana smoothie");
        let ui = model.get_uidata();
        assert_eq!(
            ui.empty_message.as_deref(),
            Some("Invalid SQL syntax. Please use proper SQL keywords.")
        );
        let (ok, stats) = ui.stats.clone().unwrap();
        assert!(!ok);
        assert!(stats.contains(" 0 rows in "));

        run(&mut model, "SELECT * FROM orders");
        assert!(
            model
                .get_uidata()
                .empty_message
                .as_deref()
                .unwrap()
                .starts_with("Invalid table name")
        );
    }

    #[test]
    fn second_run_is_rejected_while_in_flight() {
        let mut model = model_with(ViewerConfig::default().with_max_delay_ms(300));
        model.set_query_text("SELECT * FROM categories");
        model.run_query();
        assert!(model.pending.is_some());
        // No poll in between, the first query is still pending
        model.query_text = "SELECT * FROM products".to_string();
        model.run_query();
        assert_eq!(model.status_message, "A query is already running ...");
        assert_eq!(model.pending.as_ref().unwrap().query(), "SELECT * FROM categories");
        wait_for_query(&mut model);
        assert_eq!(model.table.as_ref().unwrap().result().len(), 8);
    }

    #[test]
    fn beverages_query() {
        let mut model = model();
        run(&mut model, PREDEFINED_QUERIES[1].label);
        assert_eq!(model.get_uidata().page_info, "Showing 1 to 1 of 1 entries");
    }

    #[test]
    fn live_filter_resets_page() {
        let mut model = model();
        run(&mut model, "SELECT * FROM products");
        model.update(Some(Message::NextPage)).unwrap();
        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.table.as_ref().unwrap().paging().page, 2);

        model.update(Some(Message::Filter)).unwrap();
        type_keys(&mut model, "bottles");
        assert_eq!(model.table.as_ref().unwrap().paging().page, 0);
        assert_eq!(model.get_uidata().filter, "bottles");
        let filtered = model.table.as_ref().unwrap().filtered_len();
        assert!(filtered > 0 && filtered < 77);

        // Escape drops the filter
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.table.as_ref().unwrap().filtered_len(), 77);
        assert_eq!(model.key_context(), KeyContext::Table);
    }

    #[test]
    fn filter_without_matches() {
        let mut model = model();
        run(&mut model, "SELECT * FROM categories");
        model.update(Some(Message::Filter)).unwrap();
        type_keys(&mut model, "zzz");
        press(&mut model, KeyCode::Enter);
        let ui = model.get_uidata();
        assert_eq!(ui.empty_message.as_deref(), Some("No matching records found"));
        assert_eq!(ui.page_info, "Showing 0 entries");
        assert_eq!(ui.filter, "zzz");
    }

    #[test]
    fn editing_the_query_runs_it() {
        let mut model = model();
        model.update(Some(Message::EditQuery)).unwrap();
        assert_eq!(model.key_context(), KeyContext::Raw);
        let key = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        model.update(Some(Message::RawKey(key))).unwrap();
        type_keys(&mut model, "select * from employees");
        press(&mut model, KeyCode::Enter);
        wait_for_query(&mut model);
        assert_eq!(model.get_uidata().query, "select * from employees");
        assert_eq!(model.table.as_ref().unwrap().result().len(), 9);
    }

    #[test]
    fn history_is_recorded_and_persisted() {
        let mut model = model();
        run(&mut model, "SELECT * FROM categories");
        run(&mut model, "SELECT * FROM products");
        run(&mut model, "SELECT * FROM categories");
        let labels: Vec<&str> = model
            .preferences()
            .history
            .iter()
            .map(|q| q.label.as_str())
            .collect();
        assert_eq!(labels, vec!["SELECT * FROM products", "SELECT * FROM categories"]);
        let stored = model.storage.get(HISTORY_KEY).unwrap().unwrap();
        assert!(stored.contains("SELECT * FROM products"));
    }

    #[test]
    fn history_selector_bookmarks_and_loads() {
        let mut model = model();
        run(&mut model, "SELECT * FROM employees");
        model.set_query_text("");
        model
            .update(Some(Message::OpenSelector(SelectorKind::History)))
            .unwrap();
        assert_eq!(
            model.key_context(),
            KeyContext::Selector(SelectorKind::History)
        );
        model.update(Some(Message::Bookmark)).unwrap();
        assert_eq!(model.preferences().bookmarks.len(), 1);
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.get_uidata().query, "SELECT * FROM employees");
        assert_eq!(model.key_context(), KeyContext::Table);

        model
            .update(Some(Message::OpenSelector(SelectorKind::Bookmarks)))
            .unwrap();
        model.update(Some(Message::RemoveBookmark)).unwrap();
        assert!(model.preferences().bookmarks.is_empty());
        assert!(model.get_uidata().selector.as_ref().unwrap().items.is_empty());
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.get_uidata().selector.is_none());
    }

    #[test]
    fn predefined_selector_loads_label() {
        let mut model = model();
        model
            .update(Some(Message::OpenSelector(SelectorKind::Predefined)))
            .unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.get_uidata().query, PREDEFINED_QUERIES[2].label);
        assert!(model.pending.is_none());
    }

    #[test]
    fn columns_view_toggle() {
        let mut model = model();
        run(&mut model, "SELECT * FROM categories");
        model.update(Some(Message::ToggleColumnsView)).unwrap();
        let ui = model.get_uidata();
        assert!(ui.columns_only);
        assert_eq!(ui.table.len(), 1);
        assert_eq!(ui.table[0].data, vec!["categoryID", "categoryName", "description"]);
        model.update(Some(Message::ToggleColumnsView)).unwrap();
        assert_eq!(model.get_uidata().table.len(), 3);
    }

    #[test]
    fn clear_resets_everything() {
        let mut model = model();
        run(&mut model, "SELECT * FROM categories");
        model.update(Some(Message::ClearQuery)).unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.query, "");
        assert!(ui.stats.is_none());
        assert!(ui.table.is_empty());
    }

    #[test]
    fn clear_discards_running_query() {
        let mut model = model_with(ViewerConfig::default().with_max_delay_ms(200));
        model.set_query_text("SELECT * FROM products");
        model.run_query();
        model.update(Some(Message::ClearQuery)).unwrap();
        assert_eq!(model.status, Status::Ready);
        assert!(model.get_uidata().running.is_none());

        // Longer than the largest simulated delay
        thread::sleep(Duration::from_millis(400));
        model.update(None).unwrap();
        let ui = model.get_uidata();
        assert!(ui.stats.is_none());
        assert!(ui.table.is_empty());
        assert_eq!(
            ui.empty_message.as_deref(),
            Some("Run a query to see results")
        );
    }

    #[test]
    fn spacers_do_not_push_columns_out_of_view() {
        let mut model = model();
        run(&mut model, "SELECT * FROM categories");
        model.update(Some(Message::Resize(100, 40))).unwrap();
        assert_eq!(model.get_uidata().table.len(), 3);
        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::MoveRight)).unwrap();
        assert_eq!(model.curser_column, 2);
        assert_eq!(model.offset_column, 0);
        let ui = model.get_uidata();
        assert_eq!(ui.table[0].name, "categoryID");
        assert_eq!(ui.table[2].width, model.widths[2]);
    }

    #[test]
    fn theme_toggle_persists() {
        let mut model = model();
        model.update(Some(Message::ToggleTheme)).unwrap();
        assert!(model.get_uidata().dark_mode);
        assert_eq!(
            model.storage.get(crate::storage::THEME_KEY).unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn export_writes_filtered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut model = model_with(
            ViewerConfig::default()
                .with_max_delay_ms(0)
                .with_export_path(path.clone()),
        );
        run(&mut model, "SELECT * FROM categories");
        model.update(Some(Message::Filter)).unwrap();
        type_keys(&mut model, "sweet");
        press(&mut model, KeyCode::Enter);
        model.update(Some(Message::Export)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(model.get_uidata().status_message.starts_with("Exported 2 rows"));
    }

    #[test]
    fn virtualized_window_follows_resize() {
        let mut model = model_with(
            ViewerConfig::default()
                .with_max_delay_ms(0)
                .with_page_size(100),
        );
        run(&mut model, "SELECT * FROM products");
        assert_eq!(model.get_uidata().table[0].data.len(), 32);

        model.update(Some(Message::Resize(120, 18))).unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.list_height, 10);
        assert_eq!(ui.table[0].data.len(), 10);

        for _ in 0..15 {
            model.update(Some(Message::MoveDown)).unwrap();
        }
        let ui = model.get_uidata();
        assert_eq!(ui.table[0].data[0], "7");
        assert_eq!(ui.selected_row, 9);
    }

    #[test]
    fn column_navigation_and_copy_helpers() {
        let mut model = model_with(ViewerConfig::default().with_max_delay_ms(0));
        run(&mut model, "SELECT * FROM employees");
        model.update(Some(Message::Resize(30, 40))).unwrap();
        for _ in 0..5 {
            model.update(Some(Message::MoveRight)).unwrap();
        }
        assert_eq!(model.curser_column, 5);
        assert!(model.offset_column > 0);
        let ui = model.get_uidata();
        assert_eq!(ui.table[ui.selected_column].name, "birthDate");
        assert_eq!(model.selected_cell_text().as_deref(), Some("1948-12-08"));

        model.update(Some(Message::MoveDown)).unwrap();
        let row = model.selected_row_as_csv().unwrap();
        assert!(row.starts_with("2,Fuller,Andrew,\"Vice President, Sales\""));
        assert!(row.ends_with(",3457,"));

        for _ in 0..6 {
            model.update(Some(Message::MoveLeft)).unwrap();
        }
        assert_eq!(model.curser_column, 0);
        assert_eq!(model.offset_column, 0);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_popup);
        assert_eq!(model.key_context(), KeyContext::Popup);
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn visible_name_is_shortened() {
        assert_eq!(Model::get_visible_name("description", 8), "descr...");
        assert_eq!(Model::get_visible_name("id", 8), "id");
        assert_eq!(Model::get_visible_name("id", 2), "");
    }
}
