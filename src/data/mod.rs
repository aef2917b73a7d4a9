//! Display-side processing of delivered snapshots.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of interval strings (e.g., "3s", "500ms")
//! - [`history`]: Rolling flow history for sparklines and trends
//! - [`reading`]: Health classification ([`Reading`], [`HealthStatus`], [`Thresholds`])
//!
//! ## Data Flow
//!
//! ```text
//! PresenterEvent::Snapshot
//!        │
//!        ▼
//! Reading::from_snapshot()
//!        │
//!        ├──▶ HealthStatus (from Thresholds)
//!        │
//!        └──▶ History::record() (for sparklines)
//! ```

pub mod duration;
pub mod history;
pub mod reading;

pub use history::History;
pub use reading::{analysis_health, HealthStatus, Reading, Thresholds};
