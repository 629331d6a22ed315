//! # Image Normalizer
//!
//! Decode → flatten to RGB8 → resize to the target width → JPEG → base64.
//!
//! The step exists to bound the request payload: a 12 MP phone shot becomes an
//! 800px-wide JPEG of a few tens of kilobytes. Every stage is deterministic, so
//! normalizing the same photo twice yields byte-identical output.
//!
//! ## Pipeline
//!
//! ```text
//! artifact bytes ──▶ image::load_from_memory ──▶ to_rgb8
//!                                                   │
//!       strip_scale::build_plan(Width(800)) ◀───────┘
//!                    │
//!                    ▼
//!       strip_scale::cpu::scale_rgb_cpu ──▶ JpegEncoder(q) ──▶ base64
//! ```

use base64::{Engine as _, engine::general_purpose};
use fast_image_resize::Resizer;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use strip_scale::cpu::scale_rgb_cpu;
use strip_scale::presets::{ScaleTarget, Size, build_plan};
use tracing::debug;

use crate::capture::CaptureArtifact;
use crate::error::{StripError, StripResult};

pub const JPEG_MIME: &str = "image/jpeg";

/// A photo ready to embed in an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub width: u32,
    pub height: u32,
    /// Standard, padded base64 of the JPEG bytes
    pub encoded: String,
    pub mime_type: &'static str,
}

impl NormalizedImage {
    /// `data:image/jpeg;base64,...`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded)
    }

    /// Decode the payload back into JPEG bytes.
    pub fn jpeg_bytes(&self) -> StripResult<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.encoded)
            .map_err(|e| StripError::processing("base64 decode", e.to_string()))
    }
}

/// Fixed-width, fixed-quality photo normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageNormalizer {
    target_width: u32,
    quality: u8,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(800, 70)
    }
}

impl ImageNormalizer {
    /// `quality` is clamped to the JPEG range 1-100.
    pub fn new(target_width: u32, quality: u8) -> Self {
        Self {
            target_width: target_width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Normalize a captured photo. Decoding and encoding run on the blocking pool.
    pub async fn normalize(&self, artifact: &CaptureArtifact) -> StripResult<NormalizedImage> {
        let path = artifact.path().to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StripError::io_at("read captured photo", &path, e))?;

        let normalizer = *self;
        tokio::task::spawn_blocking(move || normalizer.normalize_bytes(&bytes))
            .await
            .map_err(|e| StripError::processing("normalize", e.to_string()))?
    }

    /// Synchronous variant over a file path.
    pub fn normalize_path(&self, path: &std::path::Path) -> StripResult<NormalizedImage> {
        let bytes =
            std::fs::read(path).map_err(|e| StripError::io_at("read photo", path, e))?;
        self.normalize_bytes(&bytes)
    }

    /// Normalize an encoded photo held in memory.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> StripResult<NormalizedImage> {
        let decoded = image::load_from_memory(bytes)?;
        let rgb = decoded.to_rgb8();
        let input = Size {
            w: rgb.width(),
            h: rgb.height(),
        };

        let plan = build_plan(input, ScaleTarget::Width(self.target_width));
        let mut scaled = vec![0u8; plan.out_len()];
        let mut resizer = Resizer::new();
        scale_rgb_cpu(&mut resizer, rgb.as_raw(), &plan, &mut scaled)?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(&scaled, plan.out.w, plan.out.h, ExtendedColorType::Rgb8)
            .map_err(|e| StripError::processing("jpeg encode", e.to_string()))?;

        debug!(
            in_w = input.w,
            in_h = input.h,
            out_w = plan.out.w,
            out_h = plan.out.h,
            jpeg_bytes = jpeg.len(),
            "photo normalized"
        );

        Ok(NormalizedImage {
            width: plan.out.w,
            height: plan.out.h,
            encoded: general_purpose::STANDARD.encode(&jpeg),
            mime_type: JPEG_MIME,
        })
    }
}
