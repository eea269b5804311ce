//! Per-frame shape computation for the three visualizer modes.
//!
//! Everything here works in a pixel space of `width` x `height` with the
//! origin at the top-left and `y` growing downward. The renderer maps that
//! space onto the terminal canvas.

use std::f64::consts::PI;

pub const FULL_SCALE: f64 = 32768.0;

pub const WAVEFORM_MAX_POINTS: usize = 128;

pub const BAR_COUNT: usize = 32;
pub const BAR_MIN_HEIGHT: f64 = 10.0;
pub const BAR_CORNER_RADIUS: f64 = 8.0;
const BAR_FILL: f64 = 0.8;
const BAR_HIGHLIGHT: f64 = 0.3;

pub const RING_POINTS: usize = 180;
const RING_BASE: f64 = 0.6;
const RING_SWING: f64 = 0.5;
const RING_INNER: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub x: f64,
    /// Top edge; the bar always reaches down to the bottom of the view.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub highlight_width: f64,
    pub corner_radius: f64,
}

impl Bar {
    /// How far the top edge drops below `y` at horizontal offset `dx` into the
    /// bar, given its rounded corners.
    pub fn top_inset(&self, dx: f64) -> f64 {
        let r = self
            .corner_radius
            .min(self.width / 2.0)
            .min(self.height / 2.0)
            .max(0.0);
        if r == 0.0 {
            return 0.0;
        }
        let edge = dx.min(self.width - dx);
        if edge >= r {
            return 0.0;
        }
        let d = r - edge.max(0.0);
        r - (r * r - d * d).max(0.0).sqrt()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ring {
    pub center: Point,
    pub base_radius: f64,
    pub inner_radius: f64,
    /// Outline points in angular order; the path closes back to the first.
    pub points: Vec<Point>,
}

#[inline]
fn amplitude(sample: i16, sensitivity: f32) -> f64 {
    sample as f64 / FULL_SCALE * sensitivity as f64
}

/// Line path through the even-indexed samples, centered on the vertical midline.
pub fn waveform_path(samples: &[i16], sensitivity: f32, width: f64, height: f64) -> Vec<Point> {
    let count = (samples.len() / 2).min(WAVEFORM_MAX_POINTS);
    if count == 0 {
        return Vec::new();
    }

    let x_step = width / count as f64;
    let y_mid = height / 2.0;

    (0..count)
        .map(|i| Point {
            x: i as f64 * x_step,
            y: y_mid - amplitude(samples[i * 2], sensitivity) * height / 2.0,
        })
        .collect()
}

/// One bar per contiguous chunk, bottom-aligned, height from mean absolute amplitude.
pub fn bar_rects(samples: &[i16], sensitivity: f32, width: f64, height: f64) -> Vec<Bar> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let bar_width = width / BAR_COUNT as f64 * BAR_FILL;
    let spacing = (width - BAR_COUNT as f64 * bar_width) / (BAR_COUNT as f64 + 1.0);
    let per_bar = n / BAR_COUNT;

    let mut x = spacing;
    let mut bars = Vec::with_capacity(BAR_COUNT);

    for i in 0..BAR_COUNT {
        let mut bar_height = if per_bar == 0 {
            0.0
        } else {
            let sum: u64 = samples[i * per_bar..(i + 1) * per_bar]
                .iter()
                .map(|s| s.unsigned_abs() as u64)
                .sum();
            let mean = sum as f64 / per_bar as f64;
            mean / FULL_SCALE * height * BAR_FILL * sensitivity as f64
        };

        if bar_height < BAR_MIN_HEIGHT {
            bar_height = BAR_MIN_HEIGHT;
        }
        if bar_height > height {
            bar_height = height;
        }

        bars.push(Bar {
            x,
            y: height - bar_height,
            width: bar_width,
            height: bar_height,
            highlight_width: bar_width * BAR_HIGHLIGHT,
            corner_radius: BAR_CORNER_RADIUS,
        });

        x += bar_width + spacing;
    }

    bars
}

/// Closed ring whose radius swells with the nearest sample at each angle.
pub fn circular_ring(samples: &[i16], sensitivity: f32, width: f64, height: f64) -> Option<Ring> {
    let n = samples.len();
    if n == 0 {
        return None;
    }

    let center = Point {
        x: width / 2.0,
        y: height / 2.0,
    };
    let base_radius = center.x.min(center.y) * RING_BASE;
    let step = 2.0 * PI / RING_POINTS as f64;

    let points = (0..RING_POINTS)
        .map(|i| {
            let idx = (i * n / RING_POINTS) % n;
            let amp = amplitude(samples[idx], sensitivity).abs();
            let radius = base_radius + amp * base_radius * RING_SWING;
            let angle = i as f64 * step;
            Point {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();

    Some(Ring {
        center,
        base_radius,
        inner_radius: base_radius * RING_INNER,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn waveform_is_empty_without_samples() {
        assert!(waveform_path(&[], 1.0, 100.0, 100.0).is_empty());
        assert!(waveform_path(&[42], 1.0, 100.0, 100.0).is_empty());
    }

    #[test]
    fn waveform_caps_point_count() {
        let samples = vec![0i16; 1000];
        let path = waveform_path(&samples, 1.0, 256.0, 100.0);
        assert_eq!(path.len(), WAVEFORM_MAX_POINTS);
        assert!(close(path[1].x - path[0].x, 2.0));
        assert!(path.iter().all(|p| close(p.y, 50.0)));
    }

    #[test]
    fn waveform_uses_even_indices_and_sensitivity() {
        // odd indices are never read
        let samples = [16384, i16::MAX, -16384, i16::MIN];
        let path = waveform_path(&samples, 2.0, 10.0, 100.0);
        assert_eq!(path.len(), 2);
        // 0.5 * 2.0 = full swing up
        assert!(close(path[0].y, 0.0));
        assert!(close(path[1].y, 100.0));
        assert!(close(path[1].x, 5.0));
    }

    #[test]
    fn bars_are_empty_without_samples() {
        assert!(bar_rects(&[], 1.0, 320.0, 100.0).is_empty());
    }

    #[test]
    fn bars_layout_fills_width_evenly() {
        let samples = vec![0i16; 64];
        let bars = bar_rects(&samples, 1.0, 320.0, 100.0);
        assert_eq!(bars.len(), BAR_COUNT);

        let bw = 320.0 / 32.0 * 0.8;
        let spacing = (320.0 - 32.0 * bw) / 33.0;
        assert!(close(bars[0].x, spacing));
        assert!(close(bars[0].width, bw));
        assert!(close(bars[0].highlight_width, bw * 0.3));
        let last = bars[BAR_COUNT - 1];
        assert!(close(last.x + last.width + spacing, 320.0));
    }

    #[test]
    fn silent_bars_sit_at_the_floor() {
        let bars = bar_rects(&vec![0i16; 320], 5.0, 320.0, 100.0);
        for bar in bars {
            assert!(close(bar.height, BAR_MIN_HEIGHT));
            assert!(close(bar.y, 100.0 - BAR_MIN_HEIGHT));
        }
    }

    #[test]
    fn loud_bars_are_capped_at_view_height() {
        let bars = bar_rects(&vec![i16::MAX; 64], 5.0, 320.0, 100.0);
        for bar in bars {
            assert!(close(bar.height, 100.0));
            assert!(bar.y.abs() < EPS);
        }
    }

    #[test]
    fn bar_height_follows_chunk_mean() {
        // first chunk loud, rest silent; 2 samples per bar
        let mut samples = vec![0i16; 64];
        samples[0] = 8192;
        samples[1] = -8192;
        let bars = bar_rects(&samples, 1.0, 320.0, 200.0);
        // 0.25 * 200 * 0.8 = 40
        assert!(close(bars[0].height, 40.0));
        assert!(close(bars[1].height, BAR_MIN_HEIGHT));
    }

    #[test]
    fn short_buffers_give_floor_bars() {
        let bars = bar_rects(&[i16::MAX; 5], 5.0, 320.0, 100.0);
        assert_eq!(bars.len(), BAR_COUNT);
        assert!(bars.iter().all(|b| close(b.height, BAR_MIN_HEIGHT)));
    }

    #[test]
    fn bar_floor_never_exceeds_tiny_view() {
        let bars = bar_rects(&[0i16; 64], 1.0, 320.0, 6.0);
        assert!(bars.iter().all(|b| close(b.height, 6.0) && close(b.y, 0.0)));
    }

    #[test]
    fn bar_corners_are_rounded_only_at_the_edges() {
        let bar = Bar {
            x: 0.0,
            y: 0.0,
            width: 40.0,
            height: 100.0,
            highlight_width: 12.0,
            corner_radius: 8.0,
        };
        assert!(close(bar.top_inset(0.0), 8.0));
        assert!(close(bar.top_inset(20.0), 0.0));
        assert!(close(bar.top_inset(40.0), 8.0));
        assert!(bar.top_inset(4.0) > 0.0 && bar.top_inset(4.0) < 8.0);
    }

    #[test]
    fn ring_is_none_without_samples() {
        assert!(circular_ring(&[], 1.0, 100.0, 100.0).is_none());
    }

    #[test]
    fn silent_ring_is_a_circle_at_base_radius() {
        let ring = circular_ring(&[0i16; 10], 3.0, 200.0, 100.0).unwrap();
        assert_eq!(ring.points.len(), RING_POINTS);
        assert!(close(ring.base_radius, 30.0));
        assert!(close(ring.inner_radius, 9.0));
        for p in &ring.points {
            let r = ((p.x - 100.0).powi(2) + (p.y - 50.0).powi(2)).sqrt();
            assert!(close(r, 30.0));
        }
        assert!(close(ring.points[0].x, 130.0));
        assert!(close(ring.points[0].y, 50.0));
    }

    #[test]
    fn ring_radius_swells_with_amplitude() {
        // single full-scale negative sample maps to every angle
        let ring = circular_ring(&[i16::MIN], 1.0, 100.0, 100.0).unwrap();
        let base = 30.0;
        for p in &ring.points {
            let r = ((p.x - 50.0).powi(2) + (p.y - 50.0).powi(2)).sqrt();
            assert!(close(r, base * 1.5));
        }
    }

    #[test]
    fn ring_uses_nearest_neighbor_index() {
        // 360 samples over 180 points: point i reads sample 2i
        let mut samples = vec![0i16; 360];
        samples[2] = i16::MIN;
        samples[3] = i16::MIN;
        let ring = circular_ring(&samples, 1.0, 100.0, 100.0).unwrap();
        let radius = |p: &Point| ((p.x - 50.0).powi(2) + (p.y - 50.0).powi(2)).sqrt();
        assert!(close(radius(&ring.points[0]), 30.0));
        assert!(close(radius(&ring.points[1]), 45.0));
        assert!(close(radius(&ring.points[2]), 30.0));
    }
}
