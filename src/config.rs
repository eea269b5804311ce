use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::cli::Cli;
use crate::types::{AudioSource, VisualizerType};
use crate::visualizer::{MAX_SENSITIVITY, MIN_SENSITIVITY};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: AudioSource,
    pub visualizer: VisualizerType,
    pub sensitivity: f32,
    /// "default", an input device name, or its index in `--list-devices`.
    pub device: String,
    pub window_size: usize,
    pub interval_ms: u64,
}

impl Config {
    pub fn defaults() -> Self {
        Self {
            source: AudioSource::Microphone,
            visualizer: VisualizerType::Waveform,
            sensitivity: 5.0,
            device: "default".to_string(),
            window_size: 1024,
            interval_ms: 16,
        }
    }

    /// Defaults, then config file, then environment, then command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::defaults();

        if let Some(file_cfg) = load_file_config()? {
            cfg.apply_file(file_cfg);
        }

        cfg.apply_env();
        cfg.apply_cli(cli);
        cfg.sanitize();

        Ok(cfg)
    }

    fn apply_file(&mut self, fc: FileConfig) {
        if let Some(v) = fc.source {
            self.source = v;
        }
        if let Some(v) = fc.visualizer {
            self.visualizer = v;
        }
        if let Some(v) = fc.sensitivity {
            self.sensitivity = v;
        }
        if let Some(v) = fc.device {
            self.device = v;
        }
        if let Some(v) = fc.window_size {
            self.window_size = v;
        }
        if let Some(v) = fc.interval_ms {
            self.interval_ms = v;
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_enum::<AudioSource>("SONICCANVAS_SOURCE") {
            self.source = v;
        }
        if let Some(v) = env_enum::<VisualizerType>("SONICCANVAS_VISUALIZER") {
            self.visualizer = v;
        }
        if let Some(v) = env_parse::<f32>("SONICCANVAS_SENSITIVITY") {
            self.sensitivity = v;
        }
        if let Ok(v) = env::var("SONICCANVAS_DEVICE") {
            self.device = v;
        }
        if let Some(v) = env_parse::<usize>("SONICCANVAS_WINDOW_SIZE") {
            self.window_size = v;
        }
        if let Some(v) = env_parse::<u64>("SONICCANVAS_INTERVAL_MS") {
            self.interval_ms = v;
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = cli.source {
            self.source = v;
        }
        if let Some(v) = cli.mode {
            self.visualizer = v;
        }
        if let Some(v) = cli.sensitivity {
            self.sensitivity = v;
        }
        if let Some(v) = &cli.device {
            self.device = v.clone();
        }
        if let Some(v) = cli.window_size {
            self.window_size = v;
        }
        if let Some(v) = cli.interval_ms {
            self.interval_ms = v;
        }
    }

    fn sanitize(&mut self) {
        // clamp instead of failing
        if !self.sensitivity.is_finite() {
            self.sensitivity = 5.0;
        }
        self.sensitivity = self.sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        self.window_size = self.window_size.clamp(64, 8192);
        self.interval_ms = self.interval_ms.clamp(8, 100);

        if self.device.trim().is_empty() {
            self.device = "default".to_string();
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    pub source: Option<AudioSource>,
    pub visualizer: Option<VisualizerType>,
    pub sensitivity: Option<f32>,
    pub device: Option<String>,
    pub window_size: Option<usize>,
    pub interval_ms: Option<u64>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

fn env_enum<T: ValueEnum>(name: &str) -> Option<T> {
    env::var(name)
        .ok()
        .and_then(|v| T::from_str(v.trim(), true).ok())
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("failed to resolve config directory")?
        .join("soniccanvas")
        .join("soniccanvas.toml"))
}

fn load_file_config() -> Result<Option<FileConfig>> {
    if let Ok(p) = env::var("SONICCANVAS_CONFIG") {
        let path = PathBuf::from(p);
        if !path.exists() {
            anyhow::bail!(
                "SONICCANVAS_CONFIG points to a missing file: {}",
                path.display()
            );
        }
        return Ok(Some(read_toml(&path)?));
    }

    let path = config_path()?;
    if path.exists() {
        return Ok(Some(read_toml(&path)?));
    }

    Ok(None)
}

fn read_toml(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("invalid TOML in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_file(s: &str) -> FileConfig {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut cfg = Config::defaults();
        cfg.apply_file(parse_file(
            "source = \"output\"\nvisualizer = \"bars\"\nsensitivity = 2.5\nwindow_size = 2048\n",
        ));
        assert_eq!(cfg.source, AudioSource::DeviceOutput);
        assert_eq!(cfg.visualizer, VisualizerType::Bars);
        assert_eq!(cfg.sensitivity, 2.5);
        assert_eq!(cfg.window_size, 2048);
        assert_eq!(cfg.interval_ms, 16);
        assert_eq!(cfg.device, "default");
    }

    #[test]
    fn unknown_mode_is_a_toml_error() {
        assert!(toml::from_str::<FileConfig>("visualizer = \"spiral\"").is_err());
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut cfg = Config {
            sensitivity: f32::NAN,
            window_size: 3,
            interval_ms: 10_000,
            device: "  ".to_string(),
            ..Config::defaults()
        };
        cfg.sanitize();
        assert_eq!(cfg.sensitivity, 5.0);
        assert_eq!(cfg.window_size, 64);
        assert_eq!(cfg.interval_ms, 100);
        assert_eq!(cfg.device, "default");
    }

    #[test]
    fn cli_flags_win_over_file() {
        let mut cfg = Config::defaults();
        cfg.apply_file(parse_file("visualizer = \"bars\"\ndevice = \"USB Mic\""));
        let cli = Cli::parse_from(["soniccanvas", "--mode", "circular", "--sensitivity", "7"]);
        cfg.apply_cli(&cli);
        assert_eq!(cfg.visualizer, VisualizerType::Circular);
        assert_eq!(cfg.sensitivity, 7.0);
        assert_eq!(cfg.device, "USB Mic");
    }

    #[test]
    fn env_enum_is_case_insensitive() {
        // SAFETY: the variable name is unique to this test
        unsafe { env::set_var("SONICCANVAS_TEST_ENUM_ONLY", "Circular") };
        assert_eq!(
            env_enum::<VisualizerType>("SONICCANVAS_TEST_ENUM_ONLY"),
            Some(VisualizerType::Circular)
        );
        unsafe { env::remove_var("SONICCANVAS_TEST_ENUM_ONLY") };
    }
}
