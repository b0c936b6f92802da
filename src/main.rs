//! covidmap - COVID-19 cases and vaccinations on a terminal world map
//!
//! Refreshes the local database from the public datasets (through the
//! response cache), then opens an interactive map that zooms to a country
//! typed at the prompt.

use std::io;
use std::panic;
use std::process;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info, warn};

use covidmap::app::{App, FAREWELL};
use covidmap::cache::CacheStore;
use covidmap::cli::{Cli, StartupConfig};
use covidmap::data::GeoStore;
use covidmap::fetch::{Fetcher, HttpTransport};
use covidmap::logging::{init_logging, LOG_FILE_NAME};
use covidmap::refresh;
use covidmap::ui;

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Renders a progress message while the database is being rebuilt
fn render_loading(frame: &mut ratatui::Frame, message: &str) {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Style},
        widgets::Paragraph,
    };

    let area = frame.area();

    // Center the loading message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let loading_text = Paragraph::new(format!("{message}..."))
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}

/// Refreshes the store if configured, then runs the shell until it quits
///
/// Returns whether the user left with `exit`.
async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &StartupConfig,
    mut store: GeoStore,
) -> Result<bool, Box<dyn std::error::Error>> {
    if let Some(refresh_config) = &config.refresh {
        let cache = CacheStore::open(&config.cache_file);
        let mut fetcher = Fetcher::new(cache, HttpTransport::new());

        let summary = refresh::run(&mut fetcher, &mut store, refresh_config, |stage| {
            if let Err(e) = terminal.draw(|f| render_loading(f, &stage.to_string())) {
                warn!(error = %e, "failed to draw progress");
            }
        })
        .await?;
        info!(?summary, "database refreshed");
    } else {
        info!("ingest skipped, using existing database");
    }

    let mut app = App::new(store)?.with_initial_country(config.initial_country.as_deref());

    // Main event loop
    loop {
        terminal.draw(|f| ui::render(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(app.said_goodbye)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    // Must live until main returns
    let _logging = match init_logging(&config.data_dir, LOG_FILE_NAME) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled ({}): {e}", config.log_file.display());
            None
        }
    };
    info!(
        database = %config.database.display(),
        cache = %config.cache_file.display(),
        "starting"
    );

    let store = GeoStore::open(&config.database)?;

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &config, store).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match result {
        Ok(said_goodbye) => {
            if said_goodbye {
                println!("{FAREWELL}");
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run failed");
            Err(e)
        }
    }
}
