//! Mood value to color mapping
//!
//! Colors are produced by two linear segments: low → mid over `[0, mid]` and
//! mid → high over `(mid, scale_max]`, with `mid = scale_max / 2`. Values
//! outside the scale extrapolate along the active segment.

use crate::error::MoodError;
use crate::types::Rgb;

/// Channels whose segment endpoints differ by less than this are constant.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// App palette: red for bad days
pub const PALETTE_RED: Rgb = Rgb::new(1.0, 0.5, 0.43);
/// App palette: yellow for neutral days
pub const PALETTE_YELLOW: Rgb = Rgb::new(1.0, 0.81, 0.29);
/// App palette: green for good days
pub const PALETTE_GREEN: Rgb = Rgb::new(0.59, 0.83, 0.36);

/// Piecewise-linear interpolator from a mood value to an [`Rgb`] color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorInterpolator {
    low: Rgb,
    mid: Rgb,
    high: Rgb,
    scale_max: f64,
}

impl Default for ColorInterpolator {
    fn default() -> Self {
        Self {
            low: PALETTE_RED,
            mid: PALETTE_YELLOW,
            high: PALETTE_GREEN,
            scale_max: 1.0,
        }
    }
}

impl ColorInterpolator {
    /// Create an interpolator with custom anchors.
    ///
    /// `scale_max` must be finite and strictly positive.
    pub fn new(low: Rgb, mid: Rgb, high: Rgb, scale_max: f64) -> Result<Self, MoodError> {
        if !scale_max.is_finite() || scale_max <= 0.0 {
            return Err(MoodError::ConfigError(format!(
                "scale_max must be finite and > 0, got {scale_max}"
            )));
        }
        let anchors_finite = [low, mid, high]
            .iter()
            .flat_map(|c| c.channels())
            .all(f64::is_finite);
        if !anchors_finite {
            return Err(MoodError::ConfigError(
                "palette anchors must have finite channels".to_string(),
            ));
        }

        Ok(Self {
            low,
            mid,
            high,
            scale_max,
        })
    }

    pub fn low(&self) -> Rgb {
        self.low
    }

    pub fn mid(&self) -> Rgb {
        self.mid
    }

    pub fn high(&self) -> Rgb {
        self.high
    }

    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }

    /// Midpoint control value
    pub fn mid_point(&self) -> f64 {
        self.scale_max / 2.0
    }

    /// Color for a mood value. Never clamps.
    pub fn color(&self, value: f64) -> Rgb {
        let mid_point = self.mid_point();
        let (from, to, v0, v1) = if value <= mid_point {
            (self.low, self.mid, 0.0, mid_point)
        } else {
            (self.mid, self.high, mid_point, self.scale_max)
        };

        let from = from.channels();
        let to = to.channels();
        let mut out = [0.0; 3];
        for (i, channel) in out.iter_mut().enumerate() {
            *channel = segment(from[i], to[i], v0, v1, value);
        }
        Rgb::from_channels(out)
    }
}

/// Evaluate `y = a + b·x` on the line through `(v0, c0)` and `(v1, c1)`
fn segment(c0: f64, c1: f64, v0: f64, v1: f64, x: f64) -> f64 {
    if (c1 - c0).abs() < DEGENERATE_EPSILON || (v1 - v0).abs() < DEGENERATE_EPSILON {
        return c0;
    }
    let b = (c1 - c0) / (v1 - v0);
    let a = c0 - v0 * b;
    a + b * x
}
