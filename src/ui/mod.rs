//! UI rendering module for covidmap
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod help_overlay;
pub mod map_view;

use ratatui::Frame;

use crate::app::App;

pub use help_overlay::render as render_help_overlay;
pub use map_view::render as render_map_view;

/// Renders the map screen, with the help overlay on top when open
pub fn render(frame: &mut Frame, app: &App) {
    render_map_view(frame, app);
    if app.show_help {
        render_help_overlay(frame);
    }
}
