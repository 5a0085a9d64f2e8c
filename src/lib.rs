#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

//! Animated PNG / animated WebP assembly from per-frame still images.
//!
//! An [`Encoder`] collects frames, hands each one to an external
//! [`StillEncoder`] boundary, and re-packs the returned bitstreams into one
//! animated container. The PNG path additionally owns palette quantization,
//! ordered dithering, and movie-style inter-frame pixel recycling; the WebP
//! path trusts its lossy still encoder and only re-wraps chunks.
//!
//! Encoding is cooperative: [`Encoder::encode`] runs to completion, while
//! [`Encoder::driver`] exposes the tick-at-a-time [`EncodeDriver`] for hosts
//! that need to interleave work and report progress.

extern crate alloc;

mod container;
pub mod crc32;
pub mod dither;
pub mod error;
mod extract;
pub mod histogram;
pub mod palette;
mod quantize;
mod render;
pub mod scheduler;
pub mod still;

pub use error::EncodeError;
pub use scheduler::{EncodeDriver, Stage};
#[cfg(feature = "flate2")]
pub use still::Flate2Compressor;
pub use still::{Compressor, StillEncoder};

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Animated PNG (APNG), or a plain PNG when there is a single frame.
    Png,
    /// Animated WebP, or a plain WebP when there is a single frame.
    WebP,
}

impl Format {
    /// The still-image bitstream the boundary must produce per frame.
    pub fn source_format(self) -> SourceFormat {
        match self {
            Format::Png => SourceFormat::Png,
            Format::WebP => SourceFormat::Webp,
        }
    }
}

/// Still-image bitstream formats at the encoder boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Png,
    Webp,
    /// Reserved. No extraction path exists yet, so capability queries always
    /// report it unsupported.
    Gif,
}

/// How frame pixels relate across the animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStyle {
    /// Transparency is fixed from frame 0; unchanged pixels are recycled as
    /// transparent for better compression.
    Movie,
    /// Every frame is drawn in full and may change transparent regions.
    Sprite,
}

/// How a source image is placed on the session canvas. Consumed by the
/// [`StillEncoder::render`] boundary; the core never does the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fitting {
    /// Draw at natural size, top-left anchored.
    Actual,
    /// Scale each axis independently to fill the canvas.
    Stretch,
    /// Uniform scale to cover the canvas, centered, overflow cut off.
    Crop,
    /// Uniform scale to fit inside the canvas, centered, possibly letterboxed.
    Preserve,
}

/// Physical pixel density, written into the PNG pHYs chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalResolution {
    Ppi(u32),
    Ppm(u32),
}

impl PhysicalResolution {
    pub(crate) fn pixels_per_meter(self) -> u32 {
        match self {
            PhysicalResolution::Ppm(ppm) => ppm,
            // 1 inch is exactly 0.0254 meters.
            PhysicalResolution::Ppi(ppi) => (ppi as f64 / 0.0254).round() as u32,
        }
    }
}

/// A source pixel buffer at its natural dimensions.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<rgb::RGBA<u8>>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<rgb::RGBA<u8>>) -> Result<Self, EncodeError> {
        if width == 0 || height == 0 {
            return Err(EncodeError::ZeroDimension);
        }
        if pixels.len() != width as usize * height as usize {
            return Err(EncodeError::DimensionMismatch {
                len: pixels.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

/// One animation frame: a source image plus an optional delay override.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: ImageData,
    /// Display duration in milliseconds; `None` uses the session default.
    pub delay_ms: Option<u32>,
}

impl Frame {
    pub fn new(image: ImageData) -> Self {
        Self {
            image,
            delay_ms: None,
        }
    }

    pub fn with_delay(image: ImageData, delay_ms: u32) -> Self {
        Self {
            image,
            delay_ms: Some(delay_ms),
        }
    }
}

/// Configuration for one encode session.
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub format: Format,
    /// Canvas width in pixels (>= 1).
    pub width: u32,
    /// Canvas height in pixels (>= 1).
    pub height: u32,
    /// Quality in 0.0..=1.0. 1.0 is lossless on the PNG path; lower values
    /// enable quantization and, below 0.75 with a compressor present,
    /// indexed output.
    pub quality: f32,
    /// Default per-frame display duration in milliseconds.
    pub delay_ms: u32,
    pub fitting: Fitting,
    pub style: AnimationStyle,
    pub resolution: Option<PhysicalResolution>,
}

impl EncodeConfig {
    pub fn new(format: Format, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            quality: 0.75,
            delay_ms: 75,
            fitting: Fitting::Actual,
            style: AnimationStyle::Movie,
            resolution: None,
        }
    }

    pub fn quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn fitting(mut self, fitting: Fitting) -> Self {
        self.fitting = fitting;
        self
    }

    pub fn style(mut self, style: AnimationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn resolution(mut self, resolution: PhysicalResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// Whether an animated container of the given source format can be built
/// with this backend. Pure query, no side effects; callers must pick a
/// supported format before constructing an encoder.
pub fn supports_format<S: StillEncoder>(backend: &S, format: SourceFormat) -> bool {
    !matches!(format, SourceFormat::Gif) && backend.supports(format)
}

/// An encode session: configuration, collaborators, and the frame queue.
///
/// Working state (histogram, palette, recycling buffers, payloads) lives in
/// the per-encode [`EncodeDriver`], so a session can encode repeatedly and
/// every run starts clean.
pub struct Encoder<S: StillEncoder> {
    pub(crate) config: EncodeConfig,
    pub(crate) backend: S,
    pub(crate) compressor: Option<Box<dyn Compressor>>,
    pub(crate) frames: Vec<Frame>,
}

impl<S: StillEncoder> Encoder<S> {
    pub fn new(config: EncodeConfig, backend: S) -> Result<Self, EncodeError> {
        validate_config(&config)?;
        let source = config.format.source_format();
        if !supports_format(&backend, source) {
            return Err(EncodeError::UnsupportedFormat(source));
        }
        Ok(Self {
            config,
            backend,
            compressor: None,
            frames: Vec::new(),
        })
    }

    /// Attach the deflate collaborator that unlocks indexed PNG output.
    /// Without one, low-quality PNG sessions fall back to truecolor.
    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn add_frame(&mut self, frame: Frame) -> Result<(), EncodeError> {
        let image = &frame.image;
        if image.pixels.len() != image.width as usize * image.height as usize {
            return Err(EncodeError::DimensionMismatch {
                len: image.pixels.len(),
                width: image.width,
                height: image.height,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
    }

    /// Start a tick-at-a-time encode of the queued frames.
    pub fn driver(&mut self) -> Result<EncodeDriver<'_, S>, EncodeError> {
        EncodeDriver::new(self)
    }

    /// Encode the queued frames to completion.
    pub fn encode(&mut self) -> Result<Vec<u8>, EncodeError> {
        let mut driver = EncodeDriver::new(self)?;
        while !driver.tick()? {}
        Ok(driver.into_output())
    }
}

fn validate_config(config: &EncodeConfig) -> Result<(), EncodeError> {
    if config.width == 0 || config.height == 0 {
        return Err(EncodeError::ZeroDimension);
    }
    if !(0.0..=1.0).contains(&config.quality) {
        return Err(EncodeError::InvalidQuality(config.quality));
    }
    Ok(())
}
