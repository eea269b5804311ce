use anyhow::Context;
use clap::Parser;
use crossbeam_channel as chan;
use std::time::{Duration, Instant};

mod analysis;
mod audio;
mod cli;
mod config;
mod geometry;
mod logging;
mod types;
mod ui;
mod visualizer;

use audio::AudioController;
use cli::Cli;
use config::Config;
use types::AudioEvent;
use ui::{App, draw_ui, handle_events, init_terminal, restore_terminal};
use visualizer::Visualizer;

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    if cli.list_devices {
        return audio::list_devices();
    }

    let cfg = Config::load(&cli)?;
    logging::init_logging()?;
    tracing::info!("Starting soniccanvas {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Config: {:?}", cfg);

    let mut terminal = init_terminal()?;

    ctrlc::set_handler(move || {
        let _ = restore_terminal();
        std::process::exit(0);
    })
    .context("Error setting Ctrl-C handler")?;

    let result = run(&mut terminal, &cfg);

    restore_terminal()?;
    if let Err(e) = &result {
        tracing::error!("Exiting with error: {e:#}");
    }
    result
}

fn run(terminal: &mut ui::TerminalType, cfg: &Config) -> Result<(), anyhow::Error> {
    let (tx_events, rx_events) = chan::bounded::<AudioEvent>(32);
    let mut audio = AudioController::new(
        cfg.device.clone(),
        cfg.window_size,
        Duration::from_millis(cfg.interval_ms),
        tx_events,
    );

    let mut app = App::new(Visualizer::new(cfg.visualizer, cfg.sensitivity), cfg.source);
    app.start_capture(&mut audio);

    let frame_duration = Duration::from_millis(cfg.interval_ms);

    loop {
        let frame_start = Instant::now();

        while let Ok(event) = rx_events.try_recv() {
            app.on_audio_event(event, &mut audio);
        }

        handle_events(&mut app, &mut audio)?;

        if app.should_quit {
            break;
        }

        terminal.draw(|f| draw_ui(f, &app))?;

        std::thread::sleep(frame_duration.saturating_sub(frame_start.elapsed()));
    }

    if audio.is_running() {
        app.stop_capture(&mut audio);
    }
    tracing::info!("Shutting down");
    Ok(())
}
