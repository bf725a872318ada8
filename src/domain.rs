use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::export::DEFAULT_EXPORT_FILE;
use crate::view::DEFAULT_PAGE_SIZE;

pub const HELP_TEXT: &str = "\
Query
  e / :      edit query (Enter runs, Esc cancels)
  r          run current query
  c          clear query and results
  l          predefined queries
  h          query history (b: bookmark)
  m          bookmarks (d: remove)

Results
  j k / ↑ ↓  move cursor
  ← →        scroll columns
  g G        first / last row of page
  n b        next / previous page
  + -        page size
  /          filter (live, Esc clears)
  x          clear filter
  v          toggle data / columns view
  s          export filtered rows to CSV
  y Y        copy cell / row

General
  t          toggle dark mode
  ?          help
  q          quit";

#[derive(Debug)]
pub enum ViewerError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    Clipboard(String),
    LoadingFailed(String),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::IoError(e) => write!(f, "io error: {e}"),
            ViewerError::PolarsError(e) => write!(f, "polars error: {e}"),
            ViewerError::JsonError(e) => write!(f, "json error: {e}"),
            ViewerError::Clipboard(e) => write!(f, "clipboard error: {e}"),
            ViewerError::LoadingFailed(e) => write!(f, "loading failed: {e}"),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<Error> for ViewerError {
    fn from(err: Error) -> Self {
        ViewerError::IoError(err)
    }
}

impl From<PolarsError> for ViewerError {
    fn from(err: PolarsError) -> Self {
        ViewerError::PolarsError(err)
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub initial_query: Option<String>,
    pub state_file: PathBuf,
    pub export_path: PathBuf,
    pub page_size: usize,
    pub max_delay_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            initial_query: None,
            state_file: PathBuf::from("~/.sqlview_state.json"),
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            page_size: DEFAULT_PAGE_SIZE,
            max_delay_ms: 1000,
        }
    }
}

pub struct PredefinedQuery {
    pub name: &'static str,
    pub label: &'static str,
}

pub const PREDEFINED_QUERIES: [PredefinedQuery; 5] = [
    PredefinedQuery {
        name: "allCategories",
        label: "SELECT * FROM categories",
    },
    PredefinedQuery {
        name: "beveragesOnly",
        label: "SELECT * FROM categories WHERE categoryName = \"Beverages\"",
    },
    PredefinedQuery {
        name: "nameDesc",
        label: "SELECT categoryName, description FROM categories",
    },
    PredefinedQuery {
        name: "allEmployees",
        label: "SELECT * FROM employees",
    },
    PredefinedQuery {
        name: "allProducts",
        label: "SELECT * FROM products",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Query,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectorKind {
    Predefined,
    History,
    Bookmarks,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    NextPage,
    PrevPage,
    GrowPageSize,
    ShrinkPageSize,
    EditQuery,
    RunQuery,
    ClearQuery,
    Filter,
    ClearFilter,
    ToggleColumnsView,
    ToggleTheme,
    Export,
    CopyCell,
    CopyRow,
    OpenSelector(SelectorKind),
    Bookmark,
    RemoveBookmark,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
