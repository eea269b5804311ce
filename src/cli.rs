use clap::Parser;

use crate::types::{AudioSource, VisualizerType};

/// Live audio visualizer for the terminal: waveform, bars or a pulsing ring.
#[derive(Parser, Debug, Default)]
#[command(name = "soniccanvas")]
#[command(version)]
#[command(
    after_help = "KEYS:\n    Space        start / stop capture\n    1 2 3, w b c choose waveform, bars, circular\n    Tab          next mode\n    s            switch microphone / device output\n    + -          sensitivity\n    q, Esc       quit\n\nCONFIGURATION:\n    Config file:  <config dir>/soniccanvas/soniccanvas.toml (or $SONICCANVAS_CONFIG)\n    Logs:         ~/.local/state/soniccanvas/soniccanvas.log.*"
)]
pub struct Cli {
    /// Audio source to capture from
    #[arg(short, long, value_enum)]
    pub source: Option<AudioSource>,

    /// Initial visualizer mode
    #[arg(short, long, value_enum)]
    pub mode: Option<VisualizerType>,

    /// Gain applied to magnitude and per-sample amplitude
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// Input device: "default", a device name, or an index from --list-devices
    #[arg(short, long)]
    pub device: Option<String>,

    /// Samples per analysis window
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Minimum milliseconds between visualizer updates
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Print available audio devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_value_enums() {
        let cli = Cli::parse_from(["soniccanvas", "-s", "output", "-m", "bars"]);
        assert_eq!(cli.source, Some(AudioSource::DeviceOutput));
        assert_eq!(cli.mode, Some(VisualizerType::Bars));
        assert!(!cli.list_devices);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["soniccanvas", "--mode", "spiral"]).is_err());
    }
}
