// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Single-input scale, crop, transpose and format conversion.

use crate::{
    constraint::PadConfig,
    context::{ContextParams, FrameStatus, RgaContext, RgaOptions},
    device::RgaDevice,
    error::{Error, Result},
    format::PixelFormat,
    frame::{BufferPool, Frame, FrameSink, Rect},
};
use clap::ValueEnum;
use std::sync::Arc;
use tracing::{error, instrument};

pub const MIN_SIZE: u32 = 2;
pub const MAX_SIZE: u32 = 8192;

/// Rotation and flip applied to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transpose {
    /// Rotate counter-clockwise with horizontal flip
    #[value(name = "cclock_hflip")]
    CclockFlip,
    /// Rotate clockwise
    Clock,
    /// Rotate counter-clockwise
    Cclock,
    /// Rotate clockwise with horizontal flip
    #[value(name = "clock_hflip")]
    ClockFlip,
    /// Rotate by half-turn
    Reversal,
    Hflip,
    Vflip,
}

const ROT_90: u32 = 0x04;
const ROT_180: u32 = 0x03;
const ROT_270: u32 = 0x07;
const FLIP_H: u32 = 0x01;
const FLIP_V: u32 = 0x02;

impl Transpose {
    /// Driver rotation word.
    pub fn rotate_mode(self) -> u32 {
        match self {
            Transpose::CclockFlip => ROT_270 | (FLIP_H << 4),
            Transpose::Clock => ROT_90,
            Transpose::Cclock => ROT_270,
            Transpose::ClockFlip => ROT_90 | (FLIP_H << 4),
            Transpose::Reversal => ROT_180,
            Transpose::Hflip => FLIP_H,
            Transpose::Vflip => FLIP_V,
        }
    }

    /// Quarter turns exchange output width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Transpose::CclockFlip | Transpose::Clock | Transpose::Cclock | Transpose::ClockFlip
        )
    }
}

/// How a requested output size is reconciled with the input aspect ratio.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AspectRatio {
    /// Use the requested size as-is
    #[default]
    Disable,
    /// Shrink one side to keep the input aspect ratio
    Decrease,
    /// Grow one side to keep the input aspect ratio
    Increase,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ForceYuv {
    #[default]
    Disable,
    /// Match in/out bit depth
    Auto,
    #[value(name = "8bit")]
    Bit8,
    /// 10-bit uncompact, 8-bit without RGA3
    #[value(name = "10bit")]
    Bit10,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ForceChroma {
    /// Match in/out chroma
    #[default]
    Auto,
    #[value(name = "420sp")]
    Yuv420sp,
    #[value(name = "420p")]
    Yuv420p,
    #[value(name = "422sp")]
    Yuv422sp,
    #[value(name = "422p")]
    Yuv422p,
}

/// Source crop. Missing offsets centre the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: i32,
    pub height: i32,
}

impl Crop {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            x: None,
            y: None,
            width,
            height,
        }
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Output format, the input format when `None`.
    pub format: Option<PixelFormat>,
    /// Output size, the crop size when `None`.
    pub size: Option<(u32, u32)>,
    pub crop: Option<Crop>,
    pub transpose: Option<Transpose>,
    pub aspect_ratio: AspectRatio,
    pub divisible_by: u32,
    pub force_yuv: ForceYuv,
    pub force_chroma: ForceChroma,
    pub options: RgaOptions,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            format: None,
            size: None,
            crop: None,
            transpose: None,
            aspect_ratio: AspectRatio::Disable,
            divisible_by: 2,
            force_yuv: ForceYuv::Disable,
            force_chroma: ForceChroma::Auto,
            options: RgaOptions::default(),
        }
    }
}

impl TransformConfig {
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_transpose(mut self, transpose: Transpose) -> Self {
        self.transpose = Some(transpose);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio, divisible_by: u32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self.divisible_by = divisible_by;
        self
    }

    pub fn with_force_yuv(mut self, force_yuv: ForceYuv) -> Self {
        self.force_yuv = force_yuv;
        self
    }

    pub fn with_force_chroma(mut self, force_chroma: ForceChroma) -> Self {
        self.force_chroma = force_chroma;
        self
    }

    pub fn with_options(mut self, options: RgaOptions) -> Self {
        self.options = options;
        self
    }
}

fn check_size(what: &str, width: i64, height: i64) -> Result<()> {
    let range = MIN_SIZE as i64..=MAX_SIZE as i64;
    if !range.contains(&width) || !range.contains(&height) {
        let msg = format!(
            "Supported {what} size is range from {MIN_SIZE}x{MIN_SIZE} ~ {MAX_SIZE}x{MAX_SIZE}"
        );
        error!("{msg}");
        return Err(Error::InvalidSize(msg));
    }
    Ok(())
}

/// Clamps a crop into an `in_w` x `in_h` input.
pub fn clamp_crop(crop: Rect, in_w: i32, in_h: i32) -> Rect {
    let mut x = crop.x.clamp(0, in_w);
    let mut y = crop.y.clamp(0, in_h);
    let mut w = crop.width.clamp(0, in_w);
    let mut h = crop.height.clamp(0, in_h);

    x = x.min(in_w - w);
    y = y.min(in_h - h);
    w = w.min(in_w - x);
    h = h.min(in_h - y);
    Rect::new(x, y, w, h)
}

fn rescale(a: i64, b: i64, c: i64) -> i64 {
    (a * b + c / 2) / c
}

/// Fits `(w, h)` to the input aspect ratio per `policy`.
pub fn adjust_dimensions(
    in_w: i64,
    in_h: i64,
    w: i64,
    h: i64,
    policy: AspectRatio,
    divisible_by: i64,
) -> (i64, i64) {
    let d = divisible_by.max(1);
    let tmp_w = rescale(h, in_w, in_h * d) * d;
    let tmp_h = rescale(w, in_h, in_w * d) * d;
    match policy {
        AspectRatio::Disable => (w, h),
        AspectRatio::Decrease => {
            let w = tmp_w.min(w);
            let h = tmp_h.min(h);
            (w / d * d, h / d * d)
        }
        AspectRatio::Increase => {
            let w = tmp_w.max(w);
            let h = tmp_h.max(h);
            ((w + d - 1) / d * d, (h + d - 1) / d * d)
        }
    }
}

/// Output format after the `force_yuv`/`force_chroma` policy.
pub fn forced_format(
    input: PixelFormat,
    output: PixelFormat,
    force_yuv: ForceYuv,
    force_chroma: ForceChroma,
    has_rga3: bool,
) -> PixelFormat {
    let mut depth = match force_yuv {
        ForceYuv::Disable => return output,
        ForceYuv::Auto if matches!(input, PixelFormat::Nv15 | PixelFormat::Nv20) => 10,
        ForceYuv::Auto => return output,
        ForceYuv::Bit8 => 8,
        ForceYuv::Bit10 => 10,
    };
    if depth >= 10 && !has_rga3 {
        depth = 8;
    }

    let desc = input.descriptor();
    let mut chroma = force_chroma;
    if input.is_yuv() && chroma == ForceChroma::Auto {
        match (desc.log2_chroma_w, desc.log2_chroma_h) {
            (1, 1) if desc.fully_planar => chroma = ForceChroma::Yuv420p,
            (1, 1) => chroma = ForceChroma::Yuv420sp,
            (1, 0) if desc.fully_planar => chroma = ForceChroma::Yuv422p,
            (1, 0) => chroma = ForceChroma::Yuv422sp,
            _ => {}
        }
    }

    match chroma {
        ForceChroma::Yuv422p => PixelFormat::Yuv422p,
        ForceChroma::Yuv422sp if depth == 10 => PixelFormat::P210,
        ForceChroma::Yuv422sp => PixelFormat::Nv16,
        ForceChroma::Yuv420p => PixelFormat::Yuv420p,
        _ if depth == 10 => PixelFormat::P010,
        _ => PixelFormat::Nv12,
    }
}

/// Scale/crop/transpose filter.
///
/// # Example
///
/// ```no_run
/// use edgefirst_rga::{
///     constraint::PadConfig, device::LibRga, format::PixelFormat,
///     frame::{DmaHeapPool, Frame}, transform::{Transform, TransformConfig},
/// };
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = |frame: Arc<Frame>| {
///     println!("{frame}");
///     Ok::<(), edgefirst_rga::Error>(())
/// };
/// let mut vpp = Transform::new(
///     Box::new(LibRga::new()?),
///     Box::new(DmaHeapPool::new()?),
///     Box::new(sink),
///     PadConfig::new(1920, 1080, PixelFormat::Nv12),
///     &TransformConfig::default().with_size(640, 360),
/// )?;
/// # let frame: Arc<Frame> = unimplemented!();
/// vpp.process_frame(frame)?;
/// vpp.flush()?;
/// # Ok(())
/// # }
/// ```
pub struct Transform {
    ctx: RgaContext,
    output: PadConfig,
}

impl Transform {
    pub fn new(
        device: Box<dyn RgaDevice>,
        buffers: Box<dyn BufferPool>,
        sink: Box<dyn FrameSink>,
        input: PadConfig,
        config: &TransformConfig,
    ) -> Result<Self> {
        check_size("input", input.width as i64, input.height as i64)?;
        let (in_w, in_h) = (input.width as i32, input.height as i32);

        let (crop_w, crop_h) = config
            .crop
            .map_or((in_w, in_h), |crop| (crop.width, crop.height));
        let (mut w, mut h) = config
            .size
            .map_or((crop_w as i64, crop_h as i64), |(w, h)| (w as i64, h as i64));

        let mut crop = None;
        if let Some(c) = config.crop {
            let cx = c.x.unwrap_or((in_w - c.width) / 2);
            let cy = c.y.unwrap_or((in_h - c.height) / 2);
            if crop_w != in_w || crop_h != in_h {
                crop = Some(clamp_crop(Rect::new(cx, cy, c.width, c.height), in_w, in_h));
            }
        }

        (w, h) = adjust_dimensions(
            in_w as i64,
            in_h as i64,
            w,
            h,
            config.aspect_ratio,
            config.divisible_by as i64,
        );
        if h * in_w as i64 > i32::MAX as i64 || w * in_h as i64 > i32::MAX as i64 {
            let msg = "Rescaled value for width or height is too big.".to_owned();
            error!("{msg}");
            return Err(Error::InvalidSize(msg));
        }
        check_size("output", w, h)?;

        let mut rotate_mode = 0;
        if let Some(transpose) = config.transpose {
            rotate_mode = transpose.rotate_mode();
            if transpose.swaps_dimensions() {
                std::mem::swap(&mut w, &mut h);
            }
        }

        let has_rga3 = device.version().contains("RGA_3");
        let format = forced_format(
            input.format,
            config.format.unwrap_or(input.format),
            config.force_yuv,
            config.force_chroma,
            has_rga3,
        );
        let output = PadConfig::new(w as u32, h as u32, format);

        let params = ContextParams {
            rotate_mode,
            crop,
            ..Default::default()
        };
        let ctx = RgaContext::new(
            device,
            buffers,
            sink,
            &[input],
            output,
            &params,
            &config.options,
        )?;
        Ok(Self { ctx, output })
    }

    /// Negotiated output pad.
    pub fn output(&self) -> &PadConfig {
        &self.output
    }

    pub fn context(&self) -> &RgaContext {
        &self.ctx
    }

    #[instrument(skip_all)]
    pub fn process_frame(&mut self, frame: Arc<Frame>) -> Result<FrameStatus> {
        self.ctx.process(frame, None)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.ctx.flush()
    }

    pub fn close(&mut self) {
        self.ctx.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_clamps_into_input() {
        assert_eq!(
            clamp_crop(Rect::new(1800, -5, 400, 2000), 1920, 1080),
            Rect::new(1520, 0, 400, 1080)
        );
        assert_eq!(
            clamp_crop(Rect::new(100, 100, 640, 360), 1920, 1080),
            Rect::new(100, 100, 640, 360)
        );
    }

    #[test]
    fn aspect_policies() {
        // 16:9 input into a 4:3 box.
        assert_eq!(
            adjust_dimensions(1920, 1080, 640, 480, AspectRatio::Decrease, 2),
            (640, 360)
        );
        assert_eq!(
            adjust_dimensions(1920, 1080, 640, 480, AspectRatio::Increase, 2),
            (854, 480)
        );
        assert_eq!(
            adjust_dimensions(1920, 1080, 640, 480, AspectRatio::Disable, 2),
            (640, 480)
        );
    }

    #[test]
    fn transpose_codes() {
        assert_eq!(Transpose::CclockFlip.rotate_mode(), 0x17);
        assert_eq!(Transpose::ClockFlip.rotate_mode(), 0x14);
        assert_eq!(Transpose::Reversal.rotate_mode(), 0x03);
        assert!(Transpose::Clock.swaps_dimensions());
        assert!(!Transpose::Vflip.swaps_dimensions());
    }

    #[test]
    fn force_yuv_policy() {
        use PixelFormat::*;
        let f = forced_format;
        assert_eq!(f(Nv15, Rgba, ForceYuv::Auto, ForceChroma::Auto, true), P010);
        assert_eq!(f(Nv15, Rgba, ForceYuv::Auto, ForceChroma::Auto, false), Nv12);
        assert_eq!(f(Nv12, Rgba, ForceYuv::Auto, ForceChroma::Auto, true), Rgba);
        assert_eq!(f(Nv20, Rgba, ForceYuv::Auto, ForceChroma::Auto, true), P210);
        assert_eq!(f(Yuv420p, Rgba, ForceYuv::Bit8, ForceChroma::Auto, true), Yuv420p);
        assert_eq!(f(Yuv422p, Rgba, ForceYuv::Bit10, ForceChroma::Auto, true), Yuv422p);
        assert_eq!(f(Rgb24, Rgba, ForceYuv::Bit8, ForceChroma::Auto, true), Nv12);
        assert_eq!(f(Rgb24, Rgba, ForceYuv::Bit8, ForceChroma::Yuv422sp, true), Nv16);
        assert_eq!(f(Nv12, Nv12, ForceYuv::Disable, ForceChroma::Yuv422p, true), Nv12);
    }
}
