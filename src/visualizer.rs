use crate::analysis::MagnitudeHistory;
use crate::geometry::{self, Bar, Point, Ring};
use crate::types::VisualizerType;

pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 20.0;

/// What one frame of the visualizer panel should draw.
#[derive(Debug, PartialEq)]
pub enum Shape {
    Waveform(Vec<Point>),
    Bars(Vec<Bar>),
    Circular(Ring),
}

pub struct Visualizer {
    kind: VisualizerType,
    sensitivity: f32,
    magnitude: f32,
    samples: Vec<i16>,
    history: MagnitudeHistory,
}

impl Visualizer {
    pub fn new(kind: VisualizerType, sensitivity: f32) -> Self {
        Self {
            kind,
            sensitivity: sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY),
            magnitude: 0.0,
            samples: Vec::new(),
            history: MagnitudeHistory::new(),
        }
    }

    pub fn update(&mut self, magnitude: f32, samples: Vec<i16>) {
        self.magnitude = magnitude * self.sensitivity;
        self.samples = samples;
        self.history.push(self.magnitude);
    }

    pub fn clear(&mut self) {
        self.magnitude = 0.0;
        self.history.clear();
        self.samples.clear();
    }

    pub fn kind(&self) -> VisualizerType {
        self.kind
    }

    pub fn set_type(&mut self, kind: VisualizerType) {
        self.kind = kind;
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
    }

    pub fn adjust_sensitivity(&mut self, delta: f32) {
        self.set_sensitivity(self.sensitivity + delta);
    }

    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    pub fn history(&self) -> &MagnitudeHistory {
        &self.history
    }

    pub fn has_data(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Shape for the current mode in a `width` x `height` pixel space, or
    /// `None` when there is nothing to draw yet.
    pub fn shape(&self, width: f64, height: f64) -> Option<Shape> {
        if self.samples.is_empty() || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let s = &self.samples;
        match self.kind {
            VisualizerType::Waveform => {
                Some(Shape::Waveform(geometry::waveform_path(s, self.sensitivity, width, height)))
            }
            VisualizerType::Bars => {
                Some(Shape::Bars(geometry::bar_rects(s, self.sensitivity, width, height)))
            }
            VisualizerType::Circular => {
                geometry::circular_ring(s, self.sensitivity, width, height).map(Shape::Circular)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_scales_magnitude_and_records_history() {
        let mut v = Visualizer::new(VisualizerType::Waveform, 2.0);
        v.update(100.0, vec![1, 2, 3, 4]);
        assert_eq!(v.magnitude(), 200.0);
        assert_eq!(v.history().latest(), 200.0);
        v.update(50.0, vec![1, 2]);
        assert_eq!(&v.history().as_slice()[..2], &[100.0, 200.0]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut v = Visualizer::new(VisualizerType::Bars, 3.5);
        v.update(10.0, vec![5; 64]);
        v.clear();
        assert_eq!(v.magnitude(), 0.0);
        assert!(!v.has_data());
        assert!(v.history().as_slice().iter().all(|&m| m == 0.0));
        assert!(v.shape(100.0, 100.0).is_none());
    }

    #[test]
    fn sensitivity_is_clamped() {
        let mut v = Visualizer::new(VisualizerType::Waveform, 100.0);
        assert_eq!(v.sensitivity(), MAX_SENSITIVITY);
        v.set_sensitivity(1.0);
        v.adjust_sensitivity(-5.0);
        assert_eq!(v.sensitivity(), MIN_SENSITIVITY);
    }

    #[test]
    fn shape_follows_selected_mode() {
        let mut v = Visualizer::new(VisualizerType::Waveform, 1.0);
        v.update(1.0, vec![0; 256]);
        assert!(matches!(v.shape(100.0, 50.0), Some(Shape::Waveform(p)) if p.len() == 128));

        v.set_type(VisualizerType::Bars);
        assert!(matches!(v.shape(100.0, 50.0), Some(Shape::Bars(b)) if b.len() == 32));

        v.set_type(VisualizerType::Circular);
        assert!(matches!(v.shape(100.0, 50.0), Some(Shape::Circular(r)) if r.points.len() == 180));
    }

    #[test]
    fn shape_skips_degenerate_area() {
        let mut v = Visualizer::new(VisualizerType::Circular, 1.0);
        v.update(1.0, vec![0; 16]);
        assert!(v.shape(0.0, 10.0).is_none());
    }
}
