pub const HISTORY_LEN: usize = 256;

/// Mean absolute amplitude of a 16-bit window.
pub fn magnitude(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&s| s.unsigned_abs() as u64).sum();
    sum as f32 / samples.len() as f32
}

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Most-recent-first shift register of window magnitudes.
pub struct MagnitudeHistory {
    data: [f32; HISTORY_LEN],
}

impl MagnitudeHistory {
    pub fn new() -> Self {
        Self {
            data: [0.0; HISTORY_LEN],
        }
    }

    pub fn push(&mut self, magnitude: f32) {
        self.data.copy_within(0..HISTORY_LEN - 1, 1);
        self.data[0] = magnitude;
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn latest(&self) -> f32 {
        self.data[0]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl Default for MagnitudeHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Cuts a continuous mono stream into fixed-size windows.
pub struct Windower {
    window_size: usize,
    pending: Vec<i16>,
}

impl Windower {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            pending: Vec::with_capacity(window_size * 2),
        }
    }

    /// Appends `chunk` and returns every complete window it closes, oldest first.
    pub fn push(&mut self, chunk: &[i16]) -> Vec<Vec<i16>> {
        self.pending.extend_from_slice(chunk);

        let full = self.pending.len() / self.window_size;
        if full == 0 {
            return Vec::new();
        }

        let used = full * self.window_size;
        let windows = self.pending[..used]
            .chunks_exact(self.window_size)
            .map(<[i16]>::to_vec)
            .collect();
        self.pending.drain(..used);
        windows
    }
}
