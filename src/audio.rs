use anyhow::{Context, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Host, InputCallbackInfo, Sample, SampleFormat, SizedSample, Stream,
    StreamConfig, StreamError,
};
use crossbeam_channel::{self as chan, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::analysis::{Windower, f32_to_i16, magnitude};
use crate::types::{AudioEvent, AudioFrame, AudioSource};

/// Turns the raw mono stream into paced, analyzed frames.
pub struct FrameReader {
    windower: Windower,
    gain: f32,
    interval: Duration,
    last_emit: Option<Instant>,
}

impl FrameReader {
    pub fn new(window_size: usize, gain: f32, interval: Duration) -> Self {
        Self {
            windower: Windower::new(window_size),
            gain,
            interval,
            last_emit: None,
        }
    }

    /// Feeds one chunk. Returns a frame for the newest complete window once
    /// at least `interval` has passed since the previous one.
    pub fn process(&mut self, chunk: &[i16], now: Instant) -> Option<AudioFrame> {
        let window = self.windower.push(chunk).pop()?;

        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_emit = Some(now);

        Some(AudioFrame {
            magnitude: magnitude(&window) * self.gain,
            samples: window,
        })
    }
}

pub fn start_frame_reader(
    rx_chunks: Receiver<Vec<i16>>,
    tx_events: Sender<AudioEvent>,
    mut reader: FrameReader,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("frame-reader".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match rx_chunks.recv_timeout(Duration::from_millis(100)) {
                    Ok(chunk) => {
                        if let Some(frame) = reader.process(&chunk, Instant::now()) {
                            let _ = tx_events.try_send(AudioEvent::Frame(frame));
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Frame reader stopped");
        })
}

/// Averages interleaved frames down to one 16-bit channel.
pub fn downmix_to_i16<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: Sample,
    f32: FromSample<<T as Sample>::Float>,
{
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| {
            let sum: f32 = frame
                .iter()
                .map(|s| f32::from_sample(s.to_float_sample()))
                .sum();
            f32_to_i16(sum / frame.len() as f32)
        })
        .collect()
}

pub fn build_capture_stream<T>(
    device: &Device,
    cfg: &StreamConfig,
    channels: usize,
    tx_chunks: Sender<Vec<i16>>,
    tx_events: Sender<AudioEvent>,
) -> Result<Stream, anyhow::Error>
where
    T: Sample + Send + 'static + SizedSample + std::fmt::Debug,
    f32: FromSample<<T as Sample>::Float>,
{
    let err_callback = move |err: StreamError| {
        tracing::error!("Audio stream error: {}", err);
        let _ = tx_events.try_send(AudioEvent::Error(err.to_string()));
    };

    let input_callback = move |data: &[T], _info: &InputCallbackInfo| {
        let mono = downmix_to_i16(data, channels);
        if !mono.is_empty() {
            let _ = tx_chunks.try_send(mono);
        }
    };

    let latency = Some(Duration::from_millis(20));
    let stream = device.build_input_stream(cfg, input_callback, err_callback, latency)?;
    stream.play()?;
    Ok(stream)
}

pub fn create_capture_stream(
    device: &Device,
    sample_format: SampleFormat,
    cfg: &StreamConfig,
    channels: usize,
    tx_chunks: Sender<Vec<i16>>,
    tx_events: Sender<AudioEvent>,
) -> Result<Stream, anyhow::Error> {
    match sample_format {
        SampleFormat::F32 => {
            build_capture_stream::<f32>(device, cfg, channels, tx_chunks, tx_events)
        }
        SampleFormat::I16 => {
            build_capture_stream::<i16>(device, cfg, channels, tx_chunks, tx_events)
        }
        SampleFormat::U16 => {
            build_capture_stream::<u16>(device, cfg, channels, tx_chunks, tx_events)
        }
        SampleFormat::I32 => {
            build_capture_stream::<i32>(device, cfg, channels, tx_chunks, tx_events)
        }
        SampleFormat::U8 => build_capture_stream::<u8>(device, cfg, channels, tx_chunks, tx_events),
        _ => bail!("Unsupported sample format: {:?}", sample_format),
    }
}

/// Owns the live capture stream and its reader thread.
pub struct AudioController {
    device_spec: String,
    window_size: usize,
    interval: Duration,
    tx_events: Sender<AudioEvent>,
    stream: Option<Stream>,
    reader: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    source: AudioSource,
    device_name: String,
    sample_rate: u32,
}

impl AudioController {
    pub fn new(
        device_spec: String,
        window_size: usize,
        interval: Duration,
        tx_events: Sender<AudioEvent>,
    ) -> Self {
        Self {
            device_spec,
            window_size,
            interval,
            tx_events,
            stream: None,
            reader: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            source: AudioSource::Microphone,
            device_name: String::from("none"),
            sample_rate: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn source(&self) -> AudioSource {
        self.source
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Starts capture, returning the source actually in use. Device output
    /// falls back to the microphone when it cannot be opened.
    pub fn start(&mut self, source: AudioSource) -> Result<AudioSource, anyhow::Error> {
        self.stop();

        match self.open(source) {
            Ok(()) => Ok(source),
            Err(e) if source == AudioSource::DeviceOutput => {
                tracing::warn!("Device output capture failed, falling back to microphone: {e:#}");
                self.open(AudioSource::Microphone)?;
                Ok(AudioSource::Microphone)
            }
            Err(e) => Err(e),
        }
    }

    pub fn stop(&mut self) {
        if self.stream.is_none() && self.reader.is_none() {
            return;
        }

        self.stop_flag.store(true, Ordering::Relaxed);
        drop(self.stream.take());

        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                tracing::error!("Frame reader thread panicked");
            }
        }
        tracing::info!("Capture stopped ({})", self.source);
    }

    fn open(&mut self, source: AudioSource) -> Result<(), anyhow::Error> {
        let host = cpal::default_host();

        let (device, supported) = match source {
            AudioSource::Microphone => {
                let device = find_input_device(&host, &self.device_spec)?;
                let supported = device
                    .default_input_config()
                    .context("Failed to query input configuration")?;
                (device, supported)
            }
            AudioSource::DeviceOutput => {
                let device = host
                    .default_output_device()
                    .ok_or_else(|| anyhow!("No audio output device available"))?;
                let supported = device
                    .default_output_config()
                    .context("Failed to query output configuration")?;
                (device, supported)
            }
        };

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());
        let cfg = supported.config();
        let channels = cfg.channels as usize;

        tracing::debug!(
            "Opening {} on {}: {}Hz, {} channels, {:?}",
            source,
            device_name,
            cfg.sample_rate.0,
            channels,
            supported.sample_format()
        );

        let (tx_chunks, rx_chunks) = chan::bounded::<Vec<i16>>(16);
        let stream = create_capture_stream(
            &device,
            supported.sample_format(),
            &cfg,
            channels,
            tx_chunks,
            self.tx_events.clone(),
        )
        .with_context(|| format!("Failed to open {source} stream on {device_name}"))?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let reader = FrameReader::new(self.window_size, source.gain(), self.interval);
        let handle = start_frame_reader(
            rx_chunks,
            self.tx_events.clone(),
            reader,
            Arc::clone(&stop_flag),
        )
        .context("Failed to spawn frame reader")?;

        self.stream = Some(stream);
        self.reader = Some(handle);
        self.stop_flag = stop_flag;
        self.source = source;
        self.sample_rate = cfg.sample_rate.0;
        self.device_name = device_name;

        tracing::info!("Capture started: {} ({})", self.device_name, source);
        Ok(())
    }
}

impl Drop for AudioController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolves "default", a numeric index, or an exact device name.
fn find_input_device(host: &Host, device_spec: &str) -> Result<Device, anyhow::Error> {
    if device_spec == "default" {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No audio input device available"));
    }

    let devices: Vec<Device> = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            )
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().is_ok_and(|name| name == device_spec))
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use --list-devices to see available devices."
            )
        })
}

pub fn list_devices() -> Result<(), anyhow::Error> {
    let host = cpal::default_host();

    let default_in = host.default_input_device().and_then(|d| d.name().ok());
    let default_out = host.default_output_device().and_then(|d| d.name().ok());

    println!("Input devices (microphone source):");
    let inputs = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate input devices: {e}"))?;
    for (index, device) in inputs.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let marker = if default_in.as_deref() == Some(name.as_str()) {
            " [DEFAULT]"
        } else {
            ""
        };
        let info = match device.default_input_config() {
            Ok(c) => format!("{}Hz, {} channels", c.sample_rate().0, c.channels()),
            Err(_) => "configuration unavailable".to_string(),
        };
        println!("  {index:>2}  {name}{marker} ({info})");
    }

    println!();
    println!("Output devices (device output source uses the default):");
    let outputs = host
        .output_devices()
        .map_err(|e| anyhow!("Failed to enumerate output devices: {e}"))?;
    for device in outputs {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let marker = if default_out.as_deref() == Some(name.as_str()) {
            " [DEFAULT]"
        } else {
            ""
        };
        println!("      {name}{marker}");
    }

    Ok(())
}
