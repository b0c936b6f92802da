//! Interactive shell state for covidmap
//!
//! Holds the plot on screen, the prompt contents and the status line, and
//! turns keyboard input into lookups against the relational store.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{error, info};

use crate::data::{GeoStore, StoreError};
use crate::render::{MapPlot, RenderOutcome, Renderer, Selection};
use crate::search::fuzzy_match;

/// Printed to stdout after the terminal is restored when the user types `exit`
pub const FAREWELL: &str = "Thanks for using this tool, bye!";

/// Shown when a country cannot be found even by fuzzy matching
pub const INVALID_COUNTRY: &str = "invalid, please try again";

/// One line of feedback under the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

impl StatusMessage {
    pub fn text(&self) -> &str {
        match self {
            StatusMessage::Info(text) | StatusMessage::Error(text) => text,
        }
    }
}

/// Main application struct managing the shell
pub struct App {
    /// Plot currently drawn
    pub plot: MapPlot,
    /// Text typed at the prompt
    pub input: String,
    /// Feedback from the last submitted line
    pub status: Option<StatusMessage>,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Whether the user left with `exit`
    pub said_goodbye: bool,
    store: GeoStore,
    /// Known country names, for fuzzy lookup
    countries: Vec<String>,
}

impl App {
    /// Creates the shell showing the world view
    ///
    /// # Returns
    /// * `Ok(App)` with the world plot built
    /// * `Err(StoreError)` if the store cannot be queried
    pub fn new(store: GeoStore) -> Result<Self, StoreError> {
        let plot = Renderer::new(&store).render_world()?;
        let countries = store.country_names()?;
        info!(countries = countries.len(), "shell ready");

        Ok(Self {
            plot,
            input: String::new(),
            status: None,
            should_quit: false,
            show_help: false,
            said_goodbye: false,
            store,
            countries,
        })
    }

    /// Zooms to `country` before the first frame, if given
    pub fn with_initial_country(mut self, country: Option<&str>) -> Self {
        if let Some(country) = country {
            self.show(country);
        }
        self
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Handles keyboard input
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(key_event.code, KeyCode::Esc | KeyCode::F(1)) {
                self.show_help = false;
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::F(1) => {
                self.show_help = true;
            }
            KeyCode::Enter => {
                self.submit();
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    /// Acts on the prompt contents and clears the prompt
    pub fn submit(&mut self) {
        let line = std::mem::take(&mut self.input);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if line.eq_ignore_ascii_case("exit") {
            self.said_goodbye = true;
            self.should_quit = true;
            return;
        }

        self.show(line);
    }

    /// Shows the world or the country named by `query`
    ///
    /// The status line names the plot shown. An unknown name is retried with
    /// the closest known country name; when that fails too the current plot
    /// stays and the status line says so.
    pub fn show(&mut self, query: &str) {
        match self.lookup(query) {
            Ok(Some(plot)) => {
                self.status = Some(StatusMessage::Info(format!("Showing {}", plot.title)));
                self.plot = plot;
            }
            Ok(None) => {
                info!(query, "country not found");
                self.status = Some(StatusMessage::Error(INVALID_COUNTRY.to_string()));
            }
            Err(e) => {
                error!(error = %e, query, "lookup failed");
                self.status = Some(StatusMessage::Error(e.to_string()));
            }
        }
    }

    /// Renders `query`, falling back to a fuzzy country match
    fn lookup(&self, query: &str) -> Result<Option<MapPlot>, StoreError> {
        let renderer = Renderer::new(&self.store);
        let selection = Selection::parse(query);

        if let RenderOutcome::Rendered(plot) = renderer.render(&selection)? {
            return Ok(Some(plot));
        }

        let Selection::Country(name) = selection else {
            return Ok(None);
        };
        match fuzzy_match(&name, &self.countries) {
            Some(matched) if matched != name => {
                info!(query = %name, matched, "using closest country name");
                match renderer.render(&Selection::Country(matched.to_string()))? {
                    RenderOutcome::Rendered(plot) => Ok(Some(plot)),
                    RenderOutcome::NotFound => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}
