//! Adaptive render quality
//!
//! Measured frame rate nudges the resolution scale up or down every half
//! second. A sustained drop below the target trips a one-way performance
//! boost that turns shadows off for the rest of the session.

use serde::{Deserialize, Serialize};

pub const SAMPLE_WINDOW: f32 = 0.5;
const LOWER_BELOW_FPS: u32 = 55;
const RAISE_ABOVE_FPS: u32 = 70;
const SCALE_DOWN_STEP: f32 = 0.05;
const SCALE_UP_STEP: f32 = 0.04;
pub const SCALE_MIN: f32 = 0.9;
pub const SCALE_MAX: f32 = 1.25;
const INITIAL_SCALE: f32 = 1.05;

/// Frame rate the boost defends
pub const TARGET_FPS: u32 = 50;
const LOW_FPS_DECAY: f32 = 0.5;
const BOOST_AFTER: f32 = 1.2;
const BOOST_SCALE_DROP: f32 = 0.15;

const DPR_FLOOR: f32 = 1.1;
const DPR_DEVICE_CAP: f32 = 2.4;
const DPR_CEILING: f32 = 3.0;
const BOOSTED_DPR_BASE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    pub dpr_base: f32,
    pub dpr_scale: f32,
    pub shadows: bool,
    pub boosted: bool,
}

impl QualitySettings {
    /// Pixel ratio the client should render at
    pub fn pixel_ratio(&self) -> f32 {
        (self.dpr_base * self.dpr_scale).min(DPR_CEILING).max(DPR_FLOOR)
    }
}

/// One adjustment made at the end of a sample window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityChange {
    pub fps: u32,
    pub settings: QualitySettings,
    /// The performance boost fired in this window
    pub boost: bool,
}

#[derive(Debug, Clone)]
pub struct QualityController {
    settings: QualitySettings,
    frames: u32,
    window: f32,
    low_fps_time: f32,
}

impl QualityController {
    pub fn new(device_pixel_ratio: f32) -> Self {
        let dpr = if device_pixel_ratio.is_finite() {
            device_pixel_ratio
        } else {
            DPR_FLOOR
        };
        Self {
            settings: QualitySettings {
                dpr_base: dpr.clamp(DPR_FLOOR, DPR_DEVICE_CAP),
                dpr_scale: INITIAL_SCALE,
                shadows: true,
                boosted: false,
            },
            frames: 0,
            window: 0.0,
            low_fps_time: 0.0,
        }
    }

    pub fn settings(&self) -> QualitySettings {
        self.settings
    }

    /// Count one frame of `elapsed` wall time. Returns the new settings when
    /// the window closes and something changed.
    pub fn record_frame(&mut self, elapsed: f32) -> Option<QualityChange> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return None;
        }
        self.frames += 1;
        self.window += elapsed;
        if self.window < SAMPLE_WINDOW {
            return None;
        }

        let fps = (self.frames as f32 / self.window) as u32;
        let before = self.settings;
        let s = &mut self.settings;
        if fps < LOWER_BELOW_FPS && s.dpr_scale > SCALE_MIN {
            s.dpr_scale = (s.dpr_scale - SCALE_DOWN_STEP).max(SCALE_MIN);
        } else if fps > RAISE_ABOVE_FPS && s.dpr_scale < SCALE_MAX {
            s.dpr_scale = (s.dpr_scale + SCALE_UP_STEP).min(SCALE_MAX);
        }

        let mut boost = false;
        if fps < TARGET_FPS {
            self.low_fps_time += self.window;
            if self.low_fps_time > BOOST_AFTER && !s.boosted {
                s.boosted = true;
                s.shadows = false;
                s.dpr_base = s.dpr_base.min(BOOSTED_DPR_BASE);
                s.dpr_scale = (s.dpr_scale - BOOST_SCALE_DROP).max(SCALE_MIN);
                boost = true;
            }
        } else {
            self.low_fps_time = (self.low_fps_time - LOW_FPS_DECAY).max(0.0);
        }

        self.frames = 0;
        self.window = 0.0;
        (self.settings != before).then_some(QualityChange {
            fps,
            settings: self.settings,
            boost,
        })
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(q: &mut QualityController, fps: f32, seconds: f32) -> Vec<QualityChange> {
        let frames = (fps * seconds).round() as usize;
        (0..frames).filter_map(|_| q.record_frame(1.0 / fps)).collect()
    }

    #[test]
    fn steady_sixty_changes_nothing() {
        let mut q = QualityController::default();
        assert!(run(&mut q, 60.0, 5.0).is_empty());
        assert_eq!(q.settings().dpr_scale, INITIAL_SCALE);
    }

    #[test]
    fn fast_frames_raise_scale_up_to_cap() {
        let mut q = QualityController::default();
        run(&mut q, 120.0, 10.0);
        assert!((q.settings().dpr_scale - SCALE_MAX).abs() < 1e-5);
        assert!(q.settings().shadows);
    }

    #[test]
    fn dip_lowers_scale_without_boost() {
        let mut q = QualityController::default();
        let changes = run(&mut q, 52.0, 1.0);
        assert!(!changes.is_empty());
        assert!(q.settings().dpr_scale < INITIAL_SCALE);
        assert!(!q.settings().boosted);
    }

    #[test]
    fn sustained_low_fps_boosts_once() {
        let mut q = QualityController::new(2.0);
        let changes = run(&mut q, 30.0, 4.0);
        assert_eq!(changes.iter().filter(|c| c.boost).count(), 1);
        let s = q.settings();
        assert!(s.boosted);
        assert!(!s.shadows);
        assert!(s.dpr_base <= 1.0);
        assert!(s.dpr_scale >= SCALE_MIN);

        // recovery never brings shadows back
        run(&mut q, 120.0, 10.0);
        assert!(!q.settings().shadows);
        assert!(q.settings().pixel_ratio() >= 1.1);
    }
}
