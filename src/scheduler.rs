//! Cooperative, tick-driven encode pipeline.
//!
//! One tick performs one frame of one stage, strictly in frame order, so a
//! host sharing its thread with other work can interleave encoding without
//! losing responsiveness. Recycling and dithering state is sequential, which
//! rules out processing frames in parallel anyway.

use alloc::vec::Vec;

use crate::container::{assemble_png, assemble_webp, ContainerParams, Payload};
use crate::dither::DitherMasks;
use crate::error::EncodeError;
use crate::histogram::ColorHistogram;
use crate::palette::{palette_limit, Palette};
use crate::quantize::{quant_thresh, quantize};
use crate::render::{self, RecycleState};
use crate::still::StillEncoder;
use crate::{AnimationStyle, Encoder, Format, SourceFormat};

/// Pipeline position. Stages always advance in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Histogram pre-pass over every frame (PNG with quality < 1 only).
    ColorCounting,
    /// One payload produced per tick.
    Rendering,
    /// Container assembly, a single tick.
    Packing,
    Done,
}

/// Drives one encode across ticks. Dropping a driver mid-run discards all
/// progress; the next driver starts from cleared state.
pub struct EncodeDriver<'a, S: StillEncoder> {
    encoder: &'a mut Encoder<S>,
    stage: Stage,
    frame_index: usize,
    ticks_done: u32,
    ticks_total: u32,
    hist: Option<ColorHistogram>,
    palette: Option<Palette>,
    masks: Option<DitherMasks>,
    recycle: RecycleState,
    payloads: Vec<Payload>,
    seq: u32,
    output: Vec<u8>,
}

impl<'a, S: StillEncoder> EncodeDriver<'a, S> {
    pub(crate) fn new(encoder: &'a mut Encoder<S>) -> Result<Self, EncodeError> {
        if encoder.frames.is_empty() {
            return Err(EncodeError::NoFrames);
        }
        let config = &encoder.config;
        let frame_count = encoder.frames.len() as u32;

        // Lossless PNG needs neither the histogram nor a palette, so the
        // counting pass is skipped and every tick renders.
        let counting = config.format == Format::Png && config.quality < 1.0;
        let ticks_total = frame_count * (1 + counting as u32) + 1;

        let hist = counting.then(|| ColorHistogram::new(config.width, config.height, frame_count));
        let mut recycle = RecycleState::default();
        recycle.reset(config.width as usize * config.height as usize);

        Ok(Self {
            stage: if counting {
                Stage::ColorCounting
            } else {
                Stage::Rendering
            },
            encoder,
            frame_index: 0,
            ticks_done: 0,
            ticks_total,
            hist,
            palette: None,
            masks: None,
            recycle,
            payloads: Vec::new(),
            seq: 0,
            output: Vec::new(),
        })
    }

    /// Perform one unit of work. Returns `Ok(true)` once the encode is
    /// complete and the output is available. An error aborts the encode.
    pub fn tick(&mut self) -> Result<bool, EncodeError> {
        match self.stage {
            Stage::ColorCounting => self.count_tick()?,
            Stage::Rendering => self.render_tick()?,
            Stage::Packing => self.pack_tick()?,
            Stage::Done => return Ok(true),
        }
        self.ticks_done += 1;
        Ok(self.stage == Stage::Done)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fraction of the encode completed, evenly weighted across ticks.
    pub fn progress(&self) -> f32 {
        self.ticks_done as f32 / self.ticks_total as f32
    }

    /// The assembled container. Empty until [`tick`](Self::tick) has
    /// returned true.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    fn count_tick(&mut self) -> Result<(), EncodeError> {
        let config = &self.encoder.config;
        let (width, height, fitting) = (config.width, config.height, config.fitting);
        let pixels = self.encoder.backend.render(
            &self.encoder.frames[self.frame_index].image,
            width,
            height,
            fitting,
        );
        check_canvas(pixels.len(), width, height)?;
        if let Some(hist) = self.hist.as_mut() {
            for px in &pixels {
                hist.increment(*px);
            }
        }

        self.frame_index += 1;
        if self.frame_index == self.encoder.frames.len() {
            self.frame_index = 0;
            self.palette = self.build_palette();
            self.stage = Stage::Rendering;
        }
        Ok(())
    }

    /// Palette eligibility is decided once, after counting: indexed output
    /// needs the deflate collaborator and a quality setting that selects it.
    fn build_palette(&self) -> Option<Palette> {
        if self.encoder.compressor.is_none() {
            return None;
        }
        let hist = self.hist.as_ref()?;
        let config = &self.encoder.config;
        let limit = palette_limit(config.quality, hist.significant_colors())?;
        Some(Palette::build(
            hist,
            limit,
            config.width,
            config.height,
            self.encoder.frames.len() as u32,
        ))
    }

    fn render_tick(&mut self) -> Result<(), EncodeError> {
        let config = self.encoder.config.clone();
        let frame_index = self.frame_index as u32;
        let frame_count = self.encoder.frames.len() as u32;
        let movie = config.style == AnimationStyle::Movie;
        let delay_ms = self.encoder.frames[self.frame_index]
            .delay_ms
            .unwrap_or(config.delay_ms);

        let mut pixels = self.encoder.backend.render(
            &self.encoder.frames[self.frame_index].image,
            config.width,
            config.height,
            config.fitting,
        );
        check_canvas(pixels.len(), config.width, config.height)?;

        let payload = match config.format {
            Format::WebP => {
                // The lossy still encoder owns rate control; no palette,
                // quantization, or recycling on this path.
                let stream = self.encoder.backend.encode(
                    &pixels,
                    config.width,
                    config.height,
                    SourceFormat::Webp,
                    config.quality,
                )?;
                render::webp_payload(&stream, delay_ms)?
            }
            Format::Png => match (&self.palette, self.encoder.compressor.as_deref_mut()) {
                (Some(palette), Some(compressor)) => render::indexed_payload(
                    &mut pixels,
                    config.width,
                    config.height,
                    frame_index,
                    frame_count,
                    movie,
                    delay_ms,
                    palette,
                    &mut self.recycle,
                    &mut self.seq,
                    compressor,
                )?,
                _ => {
                    if let Some(hist) = self.hist.as_ref() {
                        let masks = DitherMasks::ensure(&mut self.masks, config.width, config.height);
                        let thresh =
                            quant_thresh(config.width, config.height, frame_count, config.quality);
                        quantize(&mut pixels, hist, masks, config.quality, thresh);
                    }
                    render::recycle_direct(&mut pixels, frame_index, movie, &mut self.recycle);
                    let stream = self.encoder.backend.encode(
                        &pixels,
                        config.width,
                        config.height,
                        SourceFormat::Png,
                        config.quality,
                    )?;
                    render::png_payload(
                        &stream,
                        config.width,
                        config.height,
                        frame_index,
                        frame_count,
                        movie,
                        delay_ms,
                        &mut self.seq,
                    )?
                }
            },
        };
        self.payloads.push(payload);

        self.frame_index += 1;
        if self.frame_index == self.encoder.frames.len() {
            self.stage = Stage::Packing;
        }
        Ok(())
    }

    fn pack_tick(&mut self) -> Result<(), EncodeError> {
        let config = &self.encoder.config;
        let params = ContainerParams {
            width: config.width,
            height: config.height,
            ppm: config.resolution.map(|r| r.pixels_per_meter()),
            palette: self.palette.as_ref(),
        };
        self.output = match config.format {
            Format::Png => assemble_png(&params, &self.payloads)?,
            Format::WebP => assemble_webp(&params, &self.payloads)?,
        };
        self.stage = Stage::Done;
        Ok(())
    }
}

fn check_canvas(len: usize, width: u32, height: u32) -> Result<(), EncodeError> {
    if len != width as usize * height as usize {
        return Err(EncodeError::DimensionMismatch { len, width, height });
    }
    Ok(())
}
