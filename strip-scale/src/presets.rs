// SPDX-License-Identifier: MIT
//! # Scaling Plan Computation
//!
//! A [`ScalePlan`] captures the input size, the constraint that was applied and
//! the resulting output size. Plans are pure values: computing one never touches
//! pixel data, so callers can inspect the outcome (or skip the resize entirely
//! when [`ScalePlan::is_identity`] holds) before allocating buffers.
//!
//! Planning rules:
//! - Aspect ratio is always preserved; the free dimension is derived and rounded
//! - No upscaling: images already within the constraint are left unchanged
//! - Every output dimension is clamped to at least 1px

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Defines the size constraint for a scaling operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the width to this value, derive the height proportionally.
    /// This is what the strip normalizer uses (800px by default).
    Width(u32),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target constraint used for planning
    pub target: ScaleTarget,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the output has the same dimensions as the input.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }

    /// Byte length of a tightly packed RGB8 output buffer.
    pub fn out_len(&self) -> usize {
        (self.out.w as usize) * (self.out.h as usize) * 3
    }
}

/// Compute a scaling plan for `input` under `target`.
///
/// # Performance
/// O(1) computation with a handful of floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget) -> ScalePlan {
    let (w, h) = match target {
        ScaleTarget::Width(max_w) => fit_width(input, max_w),
    };
    ScalePlan {
        input,
        target,
        out: Size { w, h },
    }
}

/// Fit the image to `max_w` pixels wide, height follows.
fn fit_width(input: Size, max_w: u32) -> (u32, u32) {
    let s = (max_w as f64 / input.w.max(1) as f64).min(1.0);
    scale_dims(input, s)
}

fn scale_dims(input: Size, s: f64) -> (u32, u32) {
    let (w, h) = (input.w as f64, input.h as f64);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}
