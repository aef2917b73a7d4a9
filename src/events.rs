use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{App, View};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.show_analysis {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('a') => {
                app.go_back();
            }
            KeyCode::Char('q') => app.quit(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Tab | KeyCode::BackTab => app.next_view(),
        KeyCode::Char('1') => app.set_view(View::Telemetry),
        KeyCode::Char('2') => app.set_view(View::Buildings),

        // Catalog navigation
        KeyCode::Up | KeyCode::Char('k') if app.current_view == View::Buildings => {
            app.select_prev()
        }
        KeyCode::Down | KeyCode::Char('j') if app.current_view == View::Buildings => {
            app.select_next()
        }
        KeyCode::PageUp if app.current_view == View::Buildings => app.select_prev_n(10),
        KeyCode::PageDown if app.current_view == View::Buildings => app.select_next_n(10),
        KeyCode::Home if app.current_view == View::Buildings => app.select_first(),
        KeyCode::End if app.current_view == View::Buildings => app.select_last(),
        KeyCode::Enter if app.current_view == View::Buildings => {
            app.activate_selected();
        }

        KeyCode::Char('a') => app.open_analysis(),

        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        MouseEventKind::ScrollUp if app.current_view == View::Buildings => app.select_prev(),
        MouseEventKind::ScrollDown if app.current_view == View::Buildings => app.select_next(),

        MouseEventKind::Down(MouseButton::Left) => {
            let clicked_row = mouse.row;

            // Rows below the table header select a building
            if app.current_view == View::Buildings && clicked_row > content_start_row {
                let item_row = (clicked_row - content_start_row - 1) as usize;
                if item_row < app.buildings.len() {
                    app.selected_index = item_row;
                }
            }

            // Tab clicks (row 1, after header)
            if clicked_row == 1 {
                if mouse.column < 14 {
                    app.set_view(View::Telemetry);
                } else if mouse.column < 34 {
                    app.set_view(View::Buildings);
                }
            }
        }

        MouseEventKind::Down(MouseButton::Right) => app.go_back(),

        _ => {}
    }
}
