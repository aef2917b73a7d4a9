//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use meterwatch_client::{ConnectionState, SnapshotOrigin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::HealthStatus;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    pub warning: Color,
    pub critical: Color,
    pub healthy: Color,
    /// Cold-water series.
    pub cold: Color,
    /// Hot-water series.
    pub hot: Color,
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    pub tab_active: Style,
    pub tab_inactive: Style,
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            cold: Color::LightBlue,
            hot: Color::LightRed,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            cold: Color::Blue,
            hot: Color::Red,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a health status
    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Healthy => Style::default().fg(self.healthy),
            HealthStatus::Warning => Style::default().fg(self.warning),
            HealthStatus::Critical => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    /// Style for the connectivity indicator. `None` means push is disabled.
    pub fn connection_style(&self, state: Option<ConnectionState>) -> Style {
        match state {
            Some(ConnectionState::Connected) => Style::default().fg(self.healthy),
            Some(ConnectionState::Connecting | ConnectionState::Reconnecting) => {
                Style::default().fg(self.warning)
            }
            Some(ConnectionState::Failed) => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
            Some(ConnectionState::Disconnected) => Style::default().fg(self.critical),
            None => Style::default().add_modifier(Modifier::DIM),
        }
    }

    /// Style for the data-source marker next to a reading.
    pub fn origin_style(&self, origin: SnapshotOrigin) -> Style {
        match origin {
            SnapshotOrigin::Push => Style::default().fg(self.healthy),
            SnapshotOrigin::Poll => Style::default().fg(self.highlight),
            SnapshotOrigin::Synthetic => {
                Style::default().fg(self.warning).add_modifier(Modifier::ITALIC)
            }
        }
    }
}
