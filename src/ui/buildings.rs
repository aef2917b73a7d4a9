//! Building catalog view.
//!
//! Lists every building the backend knows about. The active target is
//! marked, and Enter makes the highlighted row the new target.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Buildings ({}) ", app.buildings.len()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    if app.buildings.is_empty() {
        let message = match app.catalog_error {
            Some(ref err) => format!("  Catalog unavailable: {}", err),
            None => "  No buildings registered".to_string(),
        };
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(message, Style::default().add_modifier(Modifier::DIM))),
        ])
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from(""),
        Cell::from("Address"),
        Cell::from("ID"),
        Cell::from("FIAS"),
        Cell::from("UNOM"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = app
        .buildings
        .iter()
        .map(|b| {
            let active = app.target.matches(&b.id);
            let marker = if active { "▶" } else { "" };
            let style = if active {
                Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(b.address.clone()),
                Cell::from(b.id.clone()),
                Cell::from(b.fias_id.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(b.unom_id.clone().unwrap_or_else(|| "-".to_string())),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Fill(3),
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected);

    let mut state = TableState::default();
    state.select(Some(app.selected_index));

    frame.render_stateful_widget(table, area, &mut state);
}
