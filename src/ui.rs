use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Sparkline,
        canvas::{Canvas, Circle, Context, Line as CanvasLine},
    },
};
use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use crate::audio::AudioController;
use crate::geometry::{Bar, FULL_SCALE, Point, Ring};
use crate::types::{AudioEvent, AudioSource, VisualizerType};
use crate::visualizer::{Shape, Visualizer};

const STATUS_TTL: Duration = Duration::from_millis(2500);
const SENSITIVITY_STEP: f32 = 0.5;

const BORDER: Color = Color::Rgb(96, 160, 192);
const LABEL: Color = Color::Rgb(128, 160, 192);
const KEY: Color = Color::Rgb(255, 255, 0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Quit,
    ToggleCapture,
    ToggleSource,
    SetMode(VisualizerType),
    NextMode,
    Sensitivity(f32),
}

pub struct App {
    pub should_quit: bool,
    pub visualizer: Visualizer,
    pub source: AudioSource,
    pub capturing: bool,
    pub device_name: String,
    pub sample_rate: u32,
    status: Option<(String, Instant)>,
}

impl App {
    pub fn new(visualizer: Visualizer, source: AudioSource) -> App {
        App {
            should_quit: false,
            visualizer,
            source,
            capturing: false,
            device_name: String::from("none"),
            sample_rate: 0,
            status: None,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn status_message(&self, now: Instant) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| now.duration_since(*at) < STATUS_TTL)
            .map(|(msg, _)| msg.as_str())
    }

    pub fn apply(&mut self, command: Command, audio: &mut AudioController) {
        match command {
            Command::Quit => self.should_quit = true,
            Command::ToggleCapture => {
                if self.capturing {
                    self.stop_capture(audio);
                } else {
                    self.start_capture(audio);
                }
            }
            Command::ToggleSource => {
                self.source = self.source.toggle();
                if self.capturing {
                    self.stop_capture(audio);
                    self.start_capture(audio);
                } else {
                    self.set_status(format!("Using {} for input", self.source));
                }
            }
            Command::SetMode(kind) => {
                self.visualizer.set_type(kind);
                tracing::debug!("Visualizer type changed to: {}", kind);
            }
            Command::NextMode => {
                let kind = self.visualizer.kind().next();
                self.visualizer.set_type(kind);
                tracing::debug!("Visualizer type changed to: {}", kind);
            }
            Command::Sensitivity(delta) => {
                self.visualizer.adjust_sensitivity(delta);
                self.set_status(format!("Sensitivity {:.1}", self.visualizer.sensitivity()));
            }
        }
    }

    pub fn on_audio_event(&mut self, event: AudioEvent, audio: &mut AudioController) {
        match event {
            AudioEvent::Frame(frame) => {
                if self.capturing {
                    self.visualizer.update(frame.magnitude, frame.samples);
                }
            }
            AudioEvent::Error(err) => {
                if self.capturing {
                    self.stop_capture(audio);
                    self.set_status(format!("Audio error, capture stopped: {err}"));
                }
            }
        }
    }

    pub fn start_capture(&mut self, audio: &mut AudioController) {
        match audio.start(self.source) {
            Ok(used) => {
                if used != self.source {
                    self.set_status("Device output unavailable. Falling back to microphone.");
                    self.source = audio.source();
                } else {
                    self.set_status(format!("Using {} for input", used));
                }
                self.capturing = true;
                self.device_name = audio.device_name().to_string();
                self.sample_rate = audio.sample_rate();
            }
            Err(e) => {
                tracing::error!("Error starting audio capture: {e:#}");
                self.set_status(format!("Error starting audio capture: {e}"));
            }
        }
    }

    pub fn stop_capture(&mut self, audio: &mut AudioController) {
        audio.stop();
        self.capturing = false;
        self.visualizer.clear();
    }
}

pub type TerminalType = Terminal<CrosstermBackend<Stdout>>;

pub fn init_terminal() -> Result<TerminalType, anyhow::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal() -> Result<(), anyhow::Error> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

pub fn command_for(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char(' ') => Command::ToggleCapture,
        KeyCode::Char('s') | KeyCode::Char('S') => Command::ToggleSource,
        KeyCode::Char('1') | KeyCode::Char('w') => Command::SetMode(VisualizerType::Waveform),
        KeyCode::Char('2') | KeyCode::Char('b') => Command::SetMode(VisualizerType::Bars),
        KeyCode::Char('3') | KeyCode::Char('c') => Command::SetMode(VisualizerType::Circular),
        KeyCode::Tab => Command::NextMode,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
            Command::Sensitivity(SENSITIVITY_STEP)
        }
        KeyCode::Char('-') | KeyCode::Down => Command::Sensitivity(-SENSITIVITY_STEP),
        _ => return None,
    };
    Some(command)
}

pub fn handle_events(app: &mut App, audio: &mut AudioController) -> Result<(), anyhow::Error> {
    while event::poll(Duration::from_millis(0))? {
        if let Event::Key(key) = event::read()? {
            if let Some(command) = command_for(key) {
                app.apply(command, audio);
            }
        }
    }
    Ok(())
}

fn mode_color(kind: VisualizerType) -> (u8, u8, u8) {
    match kind {
        VisualizerType::Waveform => (64, 224, 208),
        VisualizerType::Bars => (128, 224, 128),
        VisualizerType::Circular => (176, 128, 240),
    }
}

/// Stand-in for alpha blending over the dark background.
fn translucent((r, g, b): (u8, u8, u8), alpha: u8) -> Color {
    let a = alpha as u16;
    let mix = |c: u8| ((c as u16 * a) / 255) as u8;
    Color::Rgb(mix(r), mix(g), mix(b))
}

/// Blend toward white for highlights.
fn lighten((r, g, b): (u8, u8, u8), amount: u8) -> Color {
    let a = amount as u16;
    let mix = |c: u8| (c as u16 + ((255 - c as u16) * a) / 255) as u8;
    Color::Rgb(mix(r), mix(g), mix(b))
}

fn create_color_gradient(position: f32) -> Color {
    let pos = position.clamp(0.0, 1.0);

    if pos < 0.5 {
        let t = pos / 0.5;
        let r = (64.0 + (128.0 - 64.0) * t) as u8;
        let g = (224.0 + (160.0 - 224.0) * t) as u8;
        let b = (208.0 + (240.0 - 208.0) * t) as u8;
        Color::Rgb(r, g, b)
    } else {
        let t = (pos - 0.5) / 0.5;
        let r = (128.0 + (240.0 - 128.0) * t) as u8;
        let g = (160.0 + (96.0 - 160.0) * t) as u8;
        let b = (240.0 + (160.0 - 240.0) * t) as u8;
        Color::Rgb(r, g, b)
    }
}

pub fn draw_ui(f: &mut Frame, app: &App) {
    let size = f.area();

    if size.width < 30 || size.height < 12 {
        let error_msg = Paragraph::new("Terminal too small!\nMinimum: 30x12")
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(error_msg, size);
        return;
    }

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(6),    // Visualizer
            Constraint::Length(5), // Level history
            Constraint::Length(4), // Status bar
        ])
        .split(size);

    draw_title(f, main_layout[0], app);
    draw_visualizer(f, main_layout[1], app);
    draw_history(f, main_layout[2], app);
    draw_status_bar(f, main_layout[3], app);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let modes: Vec<Span> = VisualizerType::ALL
        .iter()
        .enumerate()
        .flat_map(|(i, kind)| {
            let style = if *kind == app.visualizer.kind() {
                let (r, g, b) = mode_color(*kind);
                Style::default()
                    .fg(Color::Rgb(r, g, b))
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(LABEL)
            };
            [
                Span::raw("  "),
                Span::styled(format!(" {} {} ", i + 1, kind), style),
            ]
        })
        .collect();

    let mut spans = vec![Span::styled(
        "SonicCanvas",
        Style::default()
            .fg(Color::Rgb(128, 224, 208))
            .add_modifier(Modifier::BOLD),
    )];
    spans.extend(modes);

    let title = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(BORDER)),
        );
    f.render_widget(title, area);
}

fn draw_visualizer(f: &mut Frame, area: Rect, app: &App) {
    let kind = app.visualizer.kind();
    let block = Block::default()
        .title(format!(
            " {} | sensitivity {:.1} ",
            kind,
            app.visualizer.sensitivity()
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));

    let inner = block.inner(area);
    // braille cells are 2x4 dots
    let width = inner.width as f64 * 2.0;
    let height = inner.height as f64 * 4.0;

    let Some(shape) = app.visualizer.shape(width, height) else {
        let hint = if !app.capturing {
            "Press Space to start the visualizer"
        } else if app.visualizer.has_data() {
            "Panel too small"
        } else {
            "Waiting for audio data..."
        };
        let waiting = Paragraph::new(hint)
            .style(Style::default().fg(Color::Rgb(128, 128, 128)))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(waiting, area);
        return;
    };

    let rgb = mode_color(kind);
    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| match &shape {
            Shape::Waveform(points) => paint_waveform(ctx, points, height, rgb),
            Shape::Bars(bars) => paint_bars(ctx, bars, height, rgb),
            Shape::Circular(ring) => paint_ring(ctx, ring, height, rgb),
        });
    f.render_widget(canvas, area);
}

// The geometry is top-down; the canvas is bottom-up.
fn polyline(ctx: &mut Context, points: &[Point], height: f64, dy: f64, color: Color) {
    for pair in points.windows(2) {
        ctx.draw(&CanvasLine::new(
            pair[0].x,
            height - pair[0].y + dy,
            pair[1].x,
            height - pair[1].y + dy,
            color,
        ));
    }
}

fn paint_waveform(ctx: &mut Context, points: &[Point], height: f64, rgb: (u8, u8, u8)) {
    let glow = translucent(rgb, 80);
    polyline(ctx, points, height, 1.0, glow);
    polyline(ctx, points, height, -1.0, glow);
    ctx.layer();
    let (r, g, b) = rgb;
    polyline(ctx, points, height, 0.0, Color::Rgb(r, g, b));
}

fn paint_bars(ctx: &mut Context, bars: &[Bar], height: f64, rgb: (u8, u8, u8)) {
    let (r, g, b) = rgb;
    let body = Color::Rgb(r, g, b);
    let highlight = lighten(rgb, 60);

    for bar in bars {
        let mut dx = 0.0;
        while dx <= bar.width {
            let top = bar.y + bar.top_inset(dx);
            let color = if dx < bar.highlight_width { highlight } else { body };
            ctx.draw(&CanvasLine::new(
                bar.x + dx,
                0.0,
                bar.x + dx,
                height - top,
                color,
            ));
            dx += 1.0;
        }
    }
}

fn paint_ring(ctx: &mut Context, ring: &Ring, height: f64, rgb: (u8, u8, u8)) {
    let cx = ring.center.x;
    let cy = height - ring.center.y;
    let disc = translucent(rgb, 40);

    let mut radius = 0.5;
    while radius <= ring.inner_radius {
        ctx.draw(&Circle {
            x: cx,
            y: cy,
            radius,
            color: disc,
        });
        radius += 1.0;
    }
    ctx.layer();

    let (r, g, b) = rgb;
    let color = Color::Rgb(r, g, b);
    polyline(ctx, &ring.points, height, 0.0, color);
    if let (Some(first), Some(last)) = (ring.points.first(), ring.points.last()) {
        polyline(ctx, &[*last, *first], height, 0.0, color);
    }
}

fn draw_history(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(format!(" Level {:.0} ", app.visualizer.history().latest()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let data = history_bars(app.visualizer.history().as_slice(), inner.width as usize);
    let level = (app.visualizer.magnitude() as f64 / FULL_SCALE) as f32;

    let sparkline = Sparkline::default()
        .data(&data)
        .style(Style::default().fg(create_color_gradient(level)));
    f.render_widget(sparkline, inner);
}

/// Newest magnitude on the right, oldest that still fits on the left.
fn history_bars(history: &[f32], width: usize) -> Vec<u64> {
    let mut data: Vec<u64> = history
        .iter()
        .take(width)
        .map(|m| m.max(0.0).round() as u64)
        .collect();
    data.reverse();
    data
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let state = if app.capturing {
        Span::styled("● LIVE", Style::default().fg(Color::Rgb(255, 96, 96)))
    } else {
        Span::styled("■ STOPPED", Style::default().fg(Color::Rgb(160, 160, 160)))
    };

    let rate = if app.sample_rate > 0 {
        format!("{} Hz", app.sample_rate)
    } else {
        "-".to_string()
    };

    let info = Line::from(vec![
        state,
        Span::styled(" | Source: ", Style::default().fg(LABEL)),
        Span::styled(app.source.to_string(), Style::default().fg(Color::White)),
        Span::styled(" | Device: ", Style::default().fg(LABEL)),
        Span::styled(app.device_name.clone(), Style::default().fg(Color::White)),
        Span::styled(" | ", Style::default().fg(LABEL)),
        Span::styled(rate, Style::default().fg(Color::White)),
    ]);

    let second = match app.status_message(Instant::now()) {
        Some(msg) => Line::from(Span::styled(
            msg.to_string(),
            Style::default()
                .fg(Color::Rgb(255, 224, 128))
                .add_modifier(Modifier::BOLD),
        )),
        None => {
            let key = Style::default().fg(KEY).add_modifier(Modifier::BOLD);
            let text = Style::default().fg(Color::White);
            Line::from(vec![
                Span::styled("Space", key),
                Span::styled(" start/stop  ", text),
                Span::styled("1-3/Tab", key),
                Span::styled(" mode  ", text),
                Span::styled("S", key),
                Span::styled(" source  ", text),
                Span::styled("+/-", key),
                Span::styled(" sensitivity  ", text),
                Span::styled("Q", key),
                Span::styled(" quit", text),
            ])
        }
    };

    let status = Paragraph::new(vec![info, second]).alignment(Alignment::Center);
    f.render_widget(status, inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFrame;
    use crossterm::event::KeyEventState;
    use ratatui::backend::TestBackend;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn idle_controller() -> AudioController {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        AudioController::new("default".into(), 1024, Duration::from_millis(16), tx)
    }

    fn app() -> App {
        App::new(Visualizer::new(VisualizerType::Waveform, 5.0), AudioSource::Microphone)
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for(press(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(
            command_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(
            command_for(press(KeyCode::Char('c'))),
            Some(Command::SetMode(VisualizerType::Circular))
        );
        assert_eq!(command_for(press(KeyCode::Char(' '))), Some(Command::ToggleCapture));
        assert_eq!(command_for(press(KeyCode::Tab)), Some(Command::NextMode));
        assert_eq!(command_for(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn key_releases_are_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(command_for(release), None);
    }

    #[test]
    fn mode_and_sensitivity_commands_update_visualizer() {
        let mut audio = idle_controller();
        let mut app = app();
        app.apply(Command::NextMode, &mut audio);
        assert_eq!(app.visualizer.kind(), VisualizerType::Bars);
        app.apply(Command::SetMode(VisualizerType::Circular), &mut audio);
        assert_eq!(app.visualizer.kind(), VisualizerType::Circular);
        app.apply(Command::Sensitivity(-0.5), &mut audio);
        assert_eq!(app.visualizer.sensitivity(), 4.5);
        assert_eq!(app.status_message(Instant::now()), Some("Sensitivity 4.5"));
    }

    #[test]
    fn toggling_source_while_idle_does_not_start_capture() {
        let mut audio = idle_controller();
        let mut app = app();
        app.apply(Command::ToggleSource, &mut audio);
        assert_eq!(app.source, AudioSource::DeviceOutput);
        assert!(!app.capturing);
        assert!(!audio.is_running());
    }

    #[test]
    fn status_message_expires() {
        let mut app = app();
        app.set_status("hello");
        let now = Instant::now();
        assert_eq!(app.status_message(now), Some("hello"));
        assert_eq!(app.status_message(now + STATUS_TTL), None);
    }

    #[test]
    fn frames_are_ignored_while_stopped() {
        let mut audio = idle_controller();
        let mut app = app();
        let frame = AudioFrame {
            magnitude: 10.0,
            samples: vec![1; 64],
        };
        app.on_audio_event(AudioEvent::Frame(frame.clone()), &mut audio);
        assert!(!app.visualizer.has_data());

        app.capturing = true;
        app.on_audio_event(AudioEvent::Frame(frame), &mut audio);
        assert_eq!(app.visualizer.magnitude(), 50.0);
    }

    #[test]
    fn stream_error_stops_and_clears() {
        let mut audio = idle_controller();
        let mut app = app();
        app.capturing = true;
        app.visualizer.update(10.0, vec![1; 64]);
        app.on_audio_event(AudioEvent::Error("device unplugged".into()), &mut audio);
        assert!(!app.capturing);
        assert!(!app.visualizer.has_data());
        assert!(
            app.status_message(Instant::now())
                .is_some_and(|m| m.contains("device unplugged"))
        );
    }

    #[test]
    fn history_bars_put_newest_on_the_right() {
        let history = [3.0, 2.0, 1.0, 0.0];
        assert_eq!(history_bars(&history, 3), vec![1, 2, 3]);
        assert_eq!(history_bars(&history, 10).len(), 4);
    }

    #[test]
    fn translucent_darkens_toward_black() {
        assert_eq!(translucent((200, 100, 0), 255), Color::Rgb(200, 100, 0));
        assert_eq!(translucent((200, 100, 0), 0), Color::Rgb(0, 0, 0));
        assert_eq!(lighten((0, 0, 0), 255), Color::Rgb(255, 255, 255));
    }

    #[test]
    fn renders_every_mode_without_panicking() {
        let backend = TestBackend::new(80, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = app();
        app.capturing = true;
        let samples: Vec<i16> = (0..1024).map(|i| ((i * 97) % 20000 - 10000) as i16).collect();
        app.visualizer.update(3000.0, samples);

        for kind in VisualizerType::ALL {
            app.visualizer.set_type(kind);
            terminal.draw(|f| draw_ui(f, &app)).unwrap();
        }
    }

    #[test]
    fn small_terminal_shows_warning() {
        let backend = TestBackend::new(26, 8);
        let mut terminal = Terminal::new(backend).unwrap();
        let app = app();
        terminal.draw(|f| draw_ui(f, &app)).unwrap();
        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Terminal too small"));
    }
}
