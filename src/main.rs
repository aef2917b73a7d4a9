use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use meterwatch::config::{Overrides, Settings};
use meterwatch::data::duration::parse_duration;
use meterwatch::logging::{self, LogTarget};
use meterwatch::ui::Theme;
use meterwatch::{events, headless, ui, App, Request};
use meterwatch_client::{
    ActiveTarget, ApiClient, Building, ChannelManager, ChannelPresenter, ConsumptionAnalysis,
    TelemetrySession,
};

#[derive(Parser, Debug)]
#[command(name = "meterwatch", version)]
#[command(about = "Terminal dashboard for live water-metering telemetry")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend REST base URL (e.g., http://localhost:8080/api)
    #[arg(long)]
    api_url: Option<String>,

    /// Push channel URL (e.g., ws://localhost:8080/ws)
    #[arg(long)]
    ws_url: Option<String>,

    /// Building to watch. Defaults to the first building in the catalog
    #[arg(short, long)]
    building: Option<String>,

    /// Never open the push channel; poll only
    #[arg(long)]
    no_push: bool,

    /// Use the slower background polling cadence
    #[arg(long)]
    background: bool,

    /// Polling interval (e.g., "3s", "500ms")
    #[arg(long, value_parser = parse_interval)]
    poll_interval: Option<Duration>,

    /// Print each reading as a JSON line instead of running the TUI
    #[arg(long)]
    headless: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_url: self.api_url.clone(),
            ws_url: self.ws_url.clone(),
            no_push: self.no_push,
            background: self.background,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    match parse_duration(s) {
        Ok(d) if d.is_zero() => Err("interval must be positive".to_string()),
        Ok(d) => Ok(d),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply(&args.overrides());

    let _log_guard = logging::init(&LogTarget::for_mode(args.headless, args.log_file.clone()))?;

    let rt = Runtime::new()?;
    let _runtime = rt.enter();

    let api = settings.api_client()?;
    let target = ActiveTarget::new();
    if let Some(ref id) = args.building {
        target.select(id.clone());
    }
    let catalog = rt.block_on(load_catalog(&api, &target));

    let (presenter, presenter_events) = ChannelPresenter::new();
    let channel = settings.channel_config().map(ChannelManager::spawn);
    let initial_state = channel.as_ref().map(ChannelManager::state);

    let mut session = TelemetrySession::new(
        channel,
        Arc::new(api.clone()),
        target.clone(),
        presenter.into_shared(),
        settings.session_config(),
    );
    let mode = rt.block_on(session.start());
    info!(
        mode = mode.label(),
        interval = ?settings.poll_interval(),
        "telemetry session started"
    );

    let result = if args.headless {
        rt.block_on(headless::run(presenter_events, io::stdout().lock(), async {
            let _ = tokio::signal::ctrl_c().await;
        }))
        .map(|lines| info!(lines, "headless output stopped"))
    } else {
        let mut app = App::new(presenter_events, target, settings.api.base_url.clone())
            .with_theme(Theme::auto_detect())
            .with_analysis_days(settings.analysis_days);
        app.set_catalog(catalog);
        if let Some(state) = initial_state {
            app.set_connection(state);
        }
        run_tui(&rt, &mut app, &api, &session)
    };

    session.stop();
    result
}

/// Fetch the building catalog and default the target to its first entry.
///
/// A failure leaves the target unset; the scheduler then feeds synthetic data.
async fn load_catalog(api: &ApiClient, target: &ActiveTarget) -> Result<Vec<Building>, String> {
    match api.buildings().await {
        Ok(buildings) => {
            if let Some(id) = target.select_default(&buildings) {
                info!(building = %id, count = buildings.len(), "building catalog loaded");
            }
            Ok(buildings)
        }
        Err(err) => {
            warn!(error = %err, "building catalog unavailable");
            Err(err.to_string())
        }
    }
}

/// Run the TUI until the user quits
fn run_tui(rt: &Runtime, app: &mut App, api: &ApiClient, session: &TelemetrySession) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal before the default hook prints
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, rt, app, api, session);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

type AnalysisResult = (String, Result<ConsumptionAnalysis, String>);

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    rt: &Runtime,
    app: &mut App,
    api: &ApiClient,
    session: &TelemetrySession,
) -> Result<()> {
    let (analysis_tx, mut analysis_rx) = mpsc::unbounded_channel::<AnalysisResult>();

    while app.running {
        app.drain_events();
        app.set_delivery(session.mode(), session.poll_stats());
        while let Ok((building_id, result)) = analysis_rx.try_recv() {
            app.apply_analysis(&building_id, result);
        }

        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                // Content starts after header (1) + tabs (1) + block border (1)
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse, 3),
                _ => {}
            }
        }

        for request in app.take_requests() {
            match request {
                Request::LoadAnalysis { building_id, days } => {
                    let api = api.clone();
                    let tx = analysis_tx.clone();
                    rt.spawn(async move {
                        let result = api
                            .analysis(&building_id, days)
                            .await
                            .map_err(|err| err.to_string());
                        let _ = tx.send((building_id, result));
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_to_overrides() {
        let args = Args::parse_from([
            "meterwatch",
            "--api-url",
            "http://meters/api",
            "--no-push",
            "--poll-interval",
            "750ms",
            "--building",
            "b-7",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.api_url.as_deref(), Some("http://meters/api"));
        assert!(overrides.no_push);
        assert_eq!(overrides.poll_interval, Some(Duration::from_millis(750)));
        assert_eq!(args.building.as_deref(), Some("b-7"));
    }

    #[test]
    fn test_bad_interval_rejected() {
        assert!(Args::try_parse_from(["meterwatch", "--poll-interval", "often"]).is_err());
        assert!(Args::try_parse_from(["meterwatch", "--poll-interval", "0s"]).is_err());
    }
}
