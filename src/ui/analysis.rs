//! Consumption analysis overlay.
//!
//! Displays a modal with the backend's analysis of the active building.

use meterwatch_client::ConsumptionAnalysis;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{AnalysisState, App};
use crate::data::{analysis_health, HealthStatus};

/// Minimum width required for the overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 14;

/// Render the analysis as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }
    let Some(ref state) = app.analysis else {
        return;
    };

    let overlay_width = (area.width * 90 / 100).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = (area.height * 85 / 100).clamp(MIN_OVERLAY_HEIGHT, 30);
    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
        .title(format!(" Consumption Analysis ({} days) ", app.analysis_days))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    match state {
        AnalysisState::Loading => {
            let paragraph = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    "  Loading...",
                    Style::default().add_modifier(Modifier::DIM),
                )),
            ])
            .block(block);
            frame.render_widget(paragraph, overlay_area);
        }
        AnalysisState::Failed(err) => {
            let paragraph = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("  Analysis unavailable: {}", err),
                    app.theme.status_style(HealthStatus::Critical),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "  Esc to close",
                    Style::default().add_modifier(Modifier::DIM),
                )),
            ])
            .block(block);
            frame.render_widget(paragraph, overlay_area);
        }
        AnalysisState::Ready(analysis) => {
            let inner = block.inner(overlay_area);
            frame.render_widget(block, overlay_area);
            render_report(frame, app, analysis, inner);
        }
    }
}

fn render_report(frame: &mut Frame, app: &App, analysis: &ConsumptionAnalysis, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Totals
        Constraint::Length(6), // Status table
        Constraint::Min(2),    // Recommendations
    ])
    .split(area);

    let overall = analysis_health(analysis);
    let totals = vec![
        Line::from(vec![
            Span::raw(" Period: "),
            Span::styled(analysis.period.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("   Overall: "),
            Span::styled(overall.symbol(), app.theme.status_style(overall)),
        ]),
        Line::from(vec![
            Span::raw(" Cold "),
            Span::styled(
                format!("{} m³", analysis.total_cold_water),
                Style::default().fg(app.theme.cold),
            ),
            Span::raw("   Hot "),
            Span::styled(
                format!("{} m³", analysis.total_hot_water),
                Style::default().fg(app.theme.hot),
            ),
            Span::raw(format!(
                "   Difference {} m³ ({:.1}%)",
                analysis.difference, analysis.difference_percent
            )),
        ]),
    ];
    frame.render_widget(Paragraph::new(totals), chunks[0]);

    let status_row = |label: &'static str, value: String, status: &str| {
        let health = HealthStatus::from_status(status);
        Row::new(vec![
            Cell::from(label),
            Cell::from(value),
            Cell::from(health.symbol()).style(app.theme.status_style(health)),
        ])
    };

    let anomalies = if analysis.has_anomalies {
        format!("{} detected", analysis.anomaly_count)
    } else {
        "none".to_string()
    };
    let anomaly_status = if analysis.has_anomalies { "warning" } else { "normal" };

    let rows = vec![
        status_row(
            "Water balance",
            analysis.water_balance_status.clone(),
            &analysis.water_balance_status,
        ),
        status_row(
            "Temperature",
            analysis.temperature_status.clone(),
            &analysis.temperature_status,
        ),
        status_row(
            "Pumps",
            format!("{} ({} h)", analysis.pump_status, analysis.pump_operating_hours),
            &analysis.pump_status,
        ),
        status_row("Anomalies", anomalies, anomaly_status),
    ];

    let header = Row::new(vec![Cell::from("Check"), Cell::from("Result"), Cell::from("")])
        .style(app.theme.header);
    let table = Table::new(
        rows,
        [Constraint::Length(16), Constraint::Fill(1), Constraint::Length(6)],
    )
    .header(header);
    frame.render_widget(table, chunks[1]);

    let mut lines = vec![Line::from(Span::styled(
        " Recommendations",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if analysis.recommendations.is_empty() {
        lines.push(Line::from(Span::styled(
            "  none",
            Style::default().add_modifier(Modifier::DIM),
        )));
    } else {
        lines.extend(analysis.recommendations.iter().map(|r| Line::from(format!("  • {}", r))));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[2]);
}
