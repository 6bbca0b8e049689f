use std::fmt;
use std::io::Error;
use std::path::Path;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use serde::Deserialize;

use crate::fetcher::{FetchError, Page};

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    ConfigError(serde_json::Error),
    InvalidConfig(String),
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "I/O error: {e}"),
            TVError::ConfigError(e) => write!(f, "Invalid config file: {e}"),
            TVError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<serde_json::Error> for TVError {
    fn from(err: serde_json::Error) -> Self {
        TVError::ConfigError(err)
    }
}

/// Which classes of user interaction are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Setters)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct Capabilities {
    pub filter: bool,
    pub search: bool,
    pub sort: bool,
    pub pagination: bool,
    pub column_toggle: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            filter: true,
            search: true,
            sort: true,
            pagination: true,
            column_toggle: true,
        }
    }
}

/// Fixed for the lifetime of one table.
#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[serde(default)]
pub struct TVConfig {
    pub title: String,
    pub endpoint: String,
    pub page_size: usize,
    pub capabilities: Capabilities,
    pub max_column_width: usize,
    pub event_poll_time: u64,
    /// Page request timeout in ms.
    pub request_timeout: u64,
}

impl Default for TVConfig {
    fn default() -> Self {
        TVConfig {
            title: "Table".to_string(),
            endpoint: String::new(),
            page_size: 10,
            capabilities: Capabilities::default(),
            max_column_width: 40,
            event_poll_time: 100,
            request_timeout: 10_000,
        }
    }
}

impl TVConfig {
    pub fn from_file(path: &Path) -> Result<Self, TVError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), TVError> {
        if self.endpoint.is_empty() {
            return Err(TVError::InvalidConfig("no endpoint given".into()));
        }
        if self.page_size == 0 {
            return Err(TVError::InvalidConfig("page size must be > 0".into()));
        }
        if self.request_timeout == 0 {
            return Err(TVError::InvalidConfig("request timeout must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    FilterTitle,
    FilterBody,
    Search,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::FilterTitle => "title: ",
            CMDMode::FilterBody => "body: ",
            CMDMode::Search => "/",
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Mount,
    Refresh,
    FetchFinished {
        generation: u64,
        result: Result<Page, FetchError>,
    },
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Sort,
    SortBy(String),
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    GoToPage(usize),
    GoToWindowSlot(usize),
    ToggleColumnPanel,
    ToggleColumn(String),
    ToggleSelectedColumn,
    Reorder { from: usize, to: usize },
    MoveColumnUp,
    MoveColumnDown,
    EditFilterTitle,
    EditFilterBody,
    SetFilter { title: String, body: String },
    ApplyFilter,
    Search,
    SearchFor(String),
    SearchNext,
    SearchPrev,
    Enter,
    Exit,
    Help,
    RawKey(KeyEvent),
}

/// Side effects requested by `Model::update`, executed by the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch {
        generation: u64,
        page: usize,
        page_size: usize,
    },
}

pub const HELP_TEXT: &str = "\
Navigation
  ←↓↑→ / hjkl   move selection
  n / p         next / previous page
  g / G         first / last page
  1-5           jump to page in the page strip
  r             reload current page

Table
  s             sort by selected column (again to flip)
  Enter         show selected record
  c             column panel (Space toggle, J/K move)

Filter & search
  t / b         edit title / body filter
  a             apply filter
  /             search on this page
  ] / [         next / previous search result

  ?             this help
  Esc           close view
  q             quit";
