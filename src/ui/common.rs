//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_age;

/// Render the header bar with connectivity and delivery mode.
///
/// Displays: channel indicator, delivery mode, active building.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let channel_label = match app.connection {
        Some(state) => state.label(),
        None => "push off",
    };

    let mode = match app.delivery {
        Some(mode) => Span::styled(
            mode.label().to_uppercase(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        None => Span::styled("IDLE", Style::default().add_modifier(Modifier::DIM)),
    };

    let building = match (app.target_building(), app.target.get()) {
        (Some(b), _) => b.address.clone(),
        (None, Some(id)) => id,
        (None, None) => "no building selected".to_string(),
    };

    let line = Line::from(vec![
        Span::styled(" ● ", app.theme.connection_style(app.connection)),
        Span::styled("METERWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(channel_label, app.theme.connection_style(app.connection)),
        Span::raw(" │ "),
        mode,
        Span::raw(" │ "),
        Span::styled(building, Style::default().fg(app.theme.highlight)),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the tab bar showing available views.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![
        Line::from(" 1:Telemetry "),
        Line::from(format!(" 2:Buildings ({}) ", app.buildings.len())),
    ];

    let selected = match app.current_view {
        View::Telemetry => 0,
        View::Buildings => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: data age, poll counters, available controls.
/// Also displays temporary status messages and catalog errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.current_view {
        View::Telemetry => "Tab:buildings a:analysis ?:help q:quit",
        View::Buildings => "↑↓:select Enter:watch Tab:telemetry ?:help q:quit",
    };

    let status = if let Some(ref reading) = app.reading {
        let stats = &app.poll_stats;
        format!(
            " {} | Updated {} ago | polls {} skipped {} failed {} | {}",
            app.source,
            format_age(reading.received_at.elapsed()),
            stats.cycles,
            stats.skipped,
            stats.failures,
            controls,
        )
    } else if let Some(ref err) = app.catalog_error {
        format!(" Catalog unavailable: {} | {}", err, controls)
    } else {
        format!(" {} | Waiting for data... | {}", app.source, controls)
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  Tab/1/2     Switch views"),
        Line::from("  ↑/↓ j/k     Navigate buildings"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Watch building"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        section(" Telemetry"),
        Line::from("  a         Consumption analysis"),
        Line::from(""),
        section(" General"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 20u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
