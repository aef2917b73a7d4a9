//! Live telemetry panel for the active building.

use meterwatch_client::{SnapshotOrigin, TelemetrySnapshot};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table},
    Frame,
};

use crate::app::App;
use crate::data::Reading;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref reading) = app.reading else {
        render_waiting(frame, app, area);
        return;
    };

    let chunks = Layout::vertical([
        Constraint::Length(10), // Flows + temperature
        Constraint::Min(4),     // Trends
    ])
    .split(area);

    let top = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[0]);

    render_flows(frame, app, reading, top[0]);
    render_temperature(frame, app, &reading.snapshot, top[1]);
    render_trends(frame, app, chunks[1]);
}

fn block<'a>(app: &App, title: impl Into<Line<'a>>) -> Block<'a> {
    let title: Line<'a> = title.into();
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border))
}

fn render_waiting(frame: &mut Frame, app: &App, area: Rect) {
    let message = if app.target.is_set() {
        "  Waiting for the first reading..."
    } else {
        "  No building selected (Tab to pick one)"
    };
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().add_modifier(Modifier::DIM))),
    ])
    .block(block(app, " Telemetry "));
    frame.render_widget(paragraph, area);
}

/// Marker shown next to the panel title for the reading's source.
pub fn origin_marker(snapshot: &TelemetrySnapshot) -> &'static str {
    match snapshot.origin {
        SnapshotOrigin::Push => "LIVE",
        SnapshotOrigin::Poll => "POLLED",
        SnapshotOrigin::Synthetic => "SIMULATED",
    }
}

fn render_flows(frame: &mut Frame, app: &App, reading: &Reading, area: Rect) {
    let snapshot = &reading.snapshot;
    let cold = Style::default().fg(app.theme.cold);
    let hot = Style::default().fg(app.theme.hot);

    let return_label = if snapshot.estimated {
        "Cold return (est.)"
    } else {
        "Cold return"
    };

    let rows = vec![
        flow_row("Cold supply (ITP)", snapshot.cold_supply_rate, cold),
        flow_row(return_label, snapshot.cold_return_rate, cold),
        flow_row("Hot channel 1", snapshot.hot_rates[0], hot),
        flow_row("Hot channel 2", snapshot.hot_rates[1], hot),
        flow_row("Hot total", snapshot.total_hot_rate(), hot.add_modifier(Modifier::BOLD)),
        Row::new(vec![
            Cell::from("Balance"),
            Cell::from(format!("{:.1}", snapshot.cold_balance())),
            Cell::from(reading.health.symbol()).style(app.theme.status_style(reading.health)),
        ]),
    ];

    let header = Row::new(vec![Cell::from("Line"), Cell::from("m³/h"), Cell::from("")])
        .height(1)
        .style(app.theme.header);

    let title = Line::from(vec![
        Span::raw(" Flows "),
        Span::styled(
            format!("[{}] ", origin_marker(snapshot)),
            app.theme.origin_style(snapshot.origin),
        ),
    ]);

    let table = Table::new(
        rows,
        [Constraint::Fill(2), Constraint::Length(10), Constraint::Length(6)],
    )
    .header(header)
    .block(block(app, title));

    frame.render_widget(table, area);
}

fn flow_row(label: &'static str, rate: f64, style: Style) -> Row<'static> {
    Row::new(vec![
        Cell::from(label),
        Cell::from(format!("{:.1}", rate)).style(style),
        Cell::from(""),
    ])
}

fn render_temperature(frame: &mut Frame, app: &App, snapshot: &TelemetrySnapshot, area: Rect) {
    let lines = match snapshot.temperature {
        Some(t) => vec![
            Line::from(""),
            Line::from(vec![
                Span::raw(" Supply  "),
                Span::styled(format!("{:.1} °C", t.supply), Style::default().fg(app.theme.hot)),
            ]),
            Line::from(vec![
                Span::raw(" Return  "),
                Span::styled(
                    format!("{:.1} °C", t.return_temp),
                    Style::default().fg(app.theme.cold),
                ),
            ]),
            Line::from(vec![
                Span::raw(" Delta   "),
                Span::styled(
                    format!("{:.1} °C", t.delta),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
        ],
        None => vec![
            Line::from(""),
            Line::from(Span::styled(" No reading", Style::default().add_modifier(Modifier::DIM))),
        ],
    };

    frame.render_widget(Paragraph::new(lines).block(block(app, " Temperature ")), area);
}

fn render_trends(frame: &mut Frame, app: &App, area: Rect) {
    let halves =
        Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).split(area);

    let cold_title = match (app.history.cold_average(), app.history.cold_trend()) {
        (Some(avg), Some(trend)) => format!(" Cold supply  avg {:.1}  Δ {:+.1} ", avg, trend),
        (Some(avg), None) => format!(" Cold supply  avg {:.1} ", avg),
        _ => " Cold supply ".to_string(),
    };

    let cold_data = app.history.cold_sparkline();
    let cold = Sparkline::default()
        .block(block(app, cold_title))
        .data(&cold_data)
        .max(100)
        .style(Style::default().fg(app.theme.cold));
    frame.render_widget(cold, halves[0]);

    let hot_data = app.history.hot_sparkline();
    let hot = Sparkline::default()
        .block(block(app, " Hot total "))
        .data(&hot_data)
        .max(100)
        .style(Style::default().fg(app.theme.hot));
    frame.render_widget(hot, halves[1]);
}
