// SPDX-License-Identifier: MIT
//! # strip-scale: Payload-Bounded Photo Scaling for VLM Input
//!
//! This crate computes and executes the resize step that sits between a camera
//! shot and a vision-model request. A phone camera produces 12+ megapixel
//! frames; a model only needs enough resolution to read the colour pads on a
//! test strip, so frames are shrunk to a fixed width before JPEG encoding.
//!
//! ## Key Components
//!
//! - [`presets`]: Scaling plan computation (target width, aspect preserved)
//! - [`cpu`]: CPU-based RGB scaling using fast_image_resize (SIMD accelerated)
//!
//! ## Usage Example
//!
//! ```rust
//! use strip_scale::presets::{build_plan, ScaleTarget, Size};
//!
//! let plan = build_plan(Size { w: 4032, h: 3024 }, ScaleTarget::Width(800));
//! assert_eq!(plan.out.w, 800);
//! assert_eq!(plan.out.h, 600);
//!
//! let src = vec![0u8; 4032 * 3024 * 3];
//! let mut dst = vec![0u8; plan.out_len()];
//! let mut resizer = fast_image_resize::Resizer::new();
//! strip_scale::cpu::scale_rgb_cpu(&mut resizer, &src, &plan, &mut dst).unwrap();
//! ```

pub mod cpu;
pub mod presets;
