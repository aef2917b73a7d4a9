//! JSON-lines output for running without a terminal UI.
//!
//! Each presenter event becomes one line on stdout:
//!
//! ```text
//! {"event":"connectivity","state":"connected"}
//! {"event":"snapshot","building_id":"b-1","cold_supply_rate":84.0,...}
//! ```
//!
//! ```
//! use meterwatch_client::{ConnectionState, PresenterEvent};
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let (tx, rx) = mpsc::unbounded_channel();
//! tx.send(PresenterEvent::Connectivity(ConnectionState::Connected)).unwrap();
//! drop(tx);
//!
//! let mut out = Vec::new();
//! let lines = meterwatch::headless::run(rx, &mut out, std::future::pending::<()>())
//!     .await
//!     .unwrap();
//! assert_eq!(lines, 1);
//! # });
//! ```

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use meterwatch_client::{ConnectionState, PresenterEvent, TelemetrySnapshot};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Snapshot(&'a TelemetrySnapshot),
    Connectivity { state: ConnectionState },
}

impl<'a> From<&'a PresenterEvent> for Record<'a> {
    fn from(event: &'a PresenterEvent) -> Self {
        match event {
            PresenterEvent::Snapshot(snapshot) => Record::Snapshot(snapshot),
            PresenterEvent::Connectivity(state) => Record::Connectivity { state: *state },
        }
    }
}

/// Write one event as a JSON line.
pub fn write_event<W: Write>(out: &mut W, event: &PresenterEvent) -> Result<()> {
    serde_json::to_writer(&mut *out, &Record::from(event))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Print events until `shutdown` resolves or the presenter goes away.
///
/// Returns the number of lines written.
pub async fn run<W, F>(
    mut events: mpsc::UnboundedReceiver<PresenterEvent>,
    mut out: W,
    shutdown: F,
) -> Result<u64>
where
    W: Write,
    F: Future,
{
    tokio::pin!(shutdown);
    let mut written = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => {
                    write_event(&mut out, &event)?;
                    written += 1;
                }
                None => break,
            },
        }
    }

    Ok(written)
}
