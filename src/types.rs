use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rendering the visualizer panel uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VisualizerType {
    #[default]
    Waveform,
    Bars,
    Circular,
}

impl VisualizerType {
    pub const ALL: [VisualizerType; 3] = [Self::Waveform, Self::Bars, Self::Circular];

    pub fn next(self) -> Self {
        match self {
            Self::Waveform => Self::Bars,
            Self::Bars => Self::Circular,
            Self::Circular => Self::Waveform,
        }
    }
}

impl fmt::Display for VisualizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waveform => write!(f, "waveform"),
            Self::Bars => write!(f, "bars"),
            Self::Circular => write!(f, "circular"),
        }
    }
}

/// Where captured samples come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    #[default]
    Microphone,
    /// Loopback capture of the default output device.
    #[value(name = "output")]
    #[serde(rename = "output")]
    DeviceOutput,
}

impl AudioSource {
    pub fn toggle(self) -> Self {
        match self {
            Self::Microphone => Self::DeviceOutput,
            Self::DeviceOutput => Self::Microphone,
        }
    }

    /// Gain applied to the raw window magnitude before it reaches the visualizer.
    pub fn gain(self) -> f32 {
        match self {
            Self::Microphone => 2.5,
            Self::DeviceOutput => 2.0,
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microphone => write!(f, "microphone"),
            Self::DeviceOutput => write!(f, "device output"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub magnitude: f32,
    pub samples: Vec<i16>,
}

#[derive(Clone, Debug)]
pub enum AudioEvent {
    Frame(AudioFrame),
    Error(String),
}
