//! Map screen rendering
//!
//! Draws the current [`MapPlot`] on a braille canvas: a graticule under the
//! coastlines, then the case layer in red and the vaccination layer in green,
//! with the status line and the country prompt underneath.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Context, Line as CanvasLine, Map, MapResolution},
        Block, Borders, Paragraph,
    },
    Frame,
};

use crate::app::{App, StatusMessage};
use crate::render::{MapPlot, Marker};

const LAND_COLOR: Color = Color::Rgb(0xcc, 0x99, 0x66);
const GRID_COLOR: Color = Color::DarkGray;
const CASE_COLOR: Color = Color::Red;
const VACCINATION_COLOR: Color = Color::Green;

/// Degrees between parallels
const PARALLEL_STEP: i32 = 20;
/// Degrees between meridians
const MERIDIAN_STEP: i32 = 60;

const PROMPT: &str = "> ";

/// Renders the map screen
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_map(frame, &app.plot, chunks[0]);
    render_status(frame, app.status.as_ref(), chunks[1]);
    render_prompt(frame, &app.input, chunks[2]);
}

fn render_map(frame: &mut Frame, plot: &MapPlot, area: Rect) {
    let x_bounds = plot.projection.x_bounds();
    let y_bounds = plot.projection.y_bounds();
    let span = x_bounds[1] - x_bounds[0];
    let resolution = if plot.projection.is_regional() {
        MapResolution::High
    } else {
        MapResolution::Low
    };

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", plot.title),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled("● confirmed cases ", Style::default().fg(CASE_COLOR)),
        Span::styled("● peak vaccinations per hundred ", Style::default().fg(VACCINATION_COLOR)),
    ]);

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            draw_graticule(ctx);
            ctx.draw(&Map {
                resolution,
                color: LAND_COLOR,
            });
            ctx.layer();
            draw_markers(ctx, &plot.cases, span, CASE_COLOR);
            ctx.layer();
            draw_markers(ctx, &plot.vaccinations, span, VACCINATION_COLOR);
        });

    frame.render_widget(canvas, area);
}

fn draw_graticule(ctx: &mut Context) {
    for lat in (-90..=90).step_by(PARALLEL_STEP as usize) {
        ctx.draw(&CanvasLine {
            x1: -180.0,
            y1: f64::from(lat),
            x2: 180.0,
            y2: f64::from(lat),
            color: GRID_COLOR,
        });
    }
    for lng in (-180..=180).step_by(MERIDIAN_STEP as usize) {
        ctx.draw(&CanvasLine {
            x1: f64::from(lng),
            y1: -90.0,
            x2: f64::from(lng),
            y2: 90.0,
            color: GRID_COLOR,
        });
    }
}

fn draw_markers(ctx: &mut Context, markers: &[Marker], span: f64, color: Color) {
    for marker in markers {
        ctx.draw(&Circle {
            x: marker.lng,
            y: marker.lat,
            radius: marker.radius(span),
            color,
        });
    }
}

fn render_status(frame: &mut Frame, status: Option<&StatusMessage>, area: Rect) {
    let line = match status {
        Some(StatusMessage::Error(text)) => {
            Line::from(Span::styled(text.as_str(), Style::default().fg(Color::Red)))
        }
        Some(StatusMessage::Info(text)) => {
            Line::from(Span::styled(text.as_str(), Style::default().fg(Color::Cyan)))
        }
        None => Line::from(Span::styled(
            "Type a country name and press Enter. F1 for help.",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_prompt(frame: &mut Frame, input: &str, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Country (or 'world', 'exit') ")
        .border_style(Style::default().fg(Color::Cyan));
    let prompt = Paragraph::new(format!("{PROMPT}{input}")).block(block);
    frame.render_widget(prompt, area);

    let typed =
        u16::try_from(PROMPT.chars().count() + input.chars().count()).unwrap_or(u16::MAX);
    let x = area
        .x
        .saturating_add(1)
        .saturating_add(typed)
        .min(area.right().saturating_sub(2));
    frame.set_cursor_position(Position::new(x, area.y.saturating_add(1)));
}
