// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hardware unit selection.
//!
//! The RGA3 cores are faster but refuse small, huge or oddly strided
//! surfaces and several formats, while RGA2 has tighter output limits and no
//! 10-bit support. [`resolve`] looks at a configured context and picks a unit
//! and scheduling core once; [`UnitState::revalidate_stride`] may later push
//! a session from RGA3 onto RGA2 when a frame's strides turn out to be
//! unusable.

use crate::{
    caps::{Capabilities, SchedulerCore},
    error::{Error, Result},
    format::{map_to_native, PixelFormat, RgaFormat},
    frame::Rect,
    pool::FrameRole,
};
use tracing::{error, warn};

/// Frames above this many pixels limit the pipeline to one in flight.
pub const LARGE_FRAME_PIXELS: u64 = 3840 * 2160 * 3;

const RGA3_MIN_WIDTH: i32 = 68;
const RGA3_MIN_HEIGHT: i32 = 2;
const RGA3_MAX_INPUT: i32 = 8176;
const RGA3_MAX_OUTPUT: i32 = 8128;
const RGA2_MAX_OUTPUT: i32 = 4096;

const RGA2_ONLY_INPUT: [PixelFormat; 7] = [
    PixelFormat::Gray8,
    PixelFormat::Yuv420p,
    PixelFormat::Yuvj420p,
    PixelFormat::Yuv422p,
    PixelFormat::Yuvj422p,
    PixelFormat::Rgb555,
    PixelFormat::Bgr555,
];

const RGA2_ONLY_OUTPUT: [PixelFormat; 11] = [
    PixelFormat::Gray8,
    PixelFormat::Yuv420p,
    PixelFormat::Yuvj420p,
    PixelFormat::Yuv422p,
    PixelFormat::Yuvj422p,
    PixelFormat::Rgb555,
    PixelFormat::Bgr555,
    PixelFormat::Argb,
    PixelFormat::Xrgb,
    PixelFormat::Abgr,
    PixelFormat::Xbgr,
];

const RGA2_PRO_ONLY: [PixelFormat; 2] = [PixelFormat::Nv24, PixelFormat::Nv42];

/// Negotiated geometry and format of one pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PadConfig {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Per-pad state the validator and the descriptor builder work from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub format: PixelFormat,
    pub rga_format: RgaFormat,
    pub bytes_pp: f32,
    /// Pad size, before any crop.
    pub width: u32,
    pub height: u32,
    /// Region the hardware actually touches.
    pub act: Rect,
    pub uncompact_10b_msb: bool,
    pub rotate_mode: u32,
    pub blend_mode: u32,
    pub crop: bool,
    pub scheduler_core: SchedulerCore,
    pub overlay_x: i32,
    pub overlay_y: i32,
}

fn pad_name(role: FrameRole) -> &'static str {
    match role {
        FrameRole::Source => "input",
        FrameRole::Destination => "output",
        FrameRole::Pattern | FrameRole::PatternPreprocessed => "overlay",
    }
}

impl FrameInfo {
    /// Maps the pad format and sets the active region to the whole pad,
    /// rounded down to even sizes for YUV.
    pub fn from_pad(pad: &PadConfig, role: FrameRole) -> Result<Self> {
        let rga_format = map_to_native(pad.format, role).ok_or_else(|| {
            error!("Unsupported {} format: '{}'", pad_name(role), pad.format);
            Error::UnsupportedFormat {
                pad: pad_name(role),
                format: pad.format,
            }
        })?;

        let mut act = Rect::new(0, 0, pad.width as i32, pad.height as i32);
        if !pad.format.is_rgb() {
            act.width = align_down(act.width, 2);
            act.height = align_down(act.height, 2);
        }

        Ok(Self {
            format: pad.format,
            rga_format,
            bytes_pp: pad.format.bytes_pp(),
            width: pad.width,
            height: pad.height,
            act,
            uncompact_10b_msb: pad.format.is_uncompact_10bit(),
            rotate_mode: 0,
            blend_mode: 0,
            crop: false,
            scheduler_core: SchedulerCore::DEFAULT,
            overlay_x: 0,
            overlay_y: 0,
        })
    }

    /// Restricts the active region to `rect`, rounded down to even values
    /// for YUV.
    pub fn set_crop(&mut self, rect: Rect) {
        let mut rect = rect;
        if !self.format.is_rgb() {
            rect.x = align_down(rect.x, 2);
            rect.y = align_down(rect.y, 2);
            rect.width = align_down(rect.width, 2);
            rect.height = align_down(rect.height, 2);
        }
        self.act = rect;
        self.crop = true;
    }
}

pub(crate) fn align_down(value: i32, to: i32) -> i32 {
    value / to * to
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDecision {
    pub rga2_used: bool,
    pub scheduler_core: SchedulerCore,
    pub max_scale_ratio: f32,
}

impl UnitDecision {
    pub fn min_scale_ratio(&self) -> f32 {
        1.0 / self.max_scale_ratio
    }
}

fn is_10bit_msb(format: PixelFormat) -> bool {
    format.is_uncompact_10bit()
}

fn unsupported(msg: String) -> Error {
    error!("{msg}");
    Error::Unsupported(msg)
}

fn invalid_size(msg: String) -> Error {
    error!("{msg}");
    Error::InvalidSize(msg)
}

/// Picks the hardware unit and scheduling core for a configured context.
///
/// `pat` is the overlay pad, when present. Pure apart from logging.
pub fn resolve(
    caps: &Capabilities,
    src: &FrameInfo,
    dst: &FrameInfo,
    pat: Option<&FrameInfo>,
    nb_inputs: usize,
) -> Result<UnitDecision> {
    let scale_w = dst.act.width as f32 / src.act.width as f32;
    let scale_h = dst.act.height as f32 / src.act.height as f32;

    for (format, side) in [(src.format, "Input"), (dst.format, "Output")] {
        if format == PixelFormat::P010 && !caps.has_rga3 {
            return Err(unsupported(format!(
                "{side} format '{format}' is only supported by RGA3"
            )));
        }
        if format == PixelFormat::P210 && !caps.has_rga3 {
            return Err(unsupported(format!(
                "{side} format '{format}' is only supported by RGA3"
            )));
        }
        if RGA2_PRO_ONLY.contains(&format) && !caps.has_rga2_pro {
            return Err(unsupported(format!(
                "{side} format '{format}' is only supported by RGA2 Pro"
            )));
        }
    }
    if RGA2_ONLY_INPUT.contains(&src.format) && !caps.has_rga2 {
        return Err(unsupported(format!(
            "Input format '{}' is not supported by RGA3",
            src.format
        )));
    }
    if RGA2_ONLY_OUTPUT.contains(&dst.format) && !caps.has_rga2 {
        return Err(unsupported(format!(
            "Output format '{}' is not supported by RGA3",
            dst.format
        )));
    }
    if dst.format.is_full_range() && !src.format.is_full_range() {
        return Err(unsupported(format!(
            "Unsupported full range conversion '{}' to '{}'",
            src.format, dst.format
        )));
    }
    if is_10bit_msb(src.format) && RGA2_ONLY_OUTPUT.contains(&dst.format) {
        return Err(unsupported(format!(
            "'{}' to '{}' is not supported",
            src.format, dst.format
        )));
    }
    if is_10bit_msb(dst.format) && RGA2_ONLY_INPUT.contains(&src.format) {
        return Err(unsupported(format!(
            "'{}' to '{}' is not supported",
            src.format, dst.format
        )));
    }

    let mut rga2_used = RGA2_ONLY_INPUT.contains(&src.format)
        || RGA2_PRO_ONLY.contains(&src.format)
        || RGA2_ONLY_OUTPUT.contains(&dst.format)
        || RGA2_PRO_ONLY.contains(&dst.format);
    rga2_used |= caps.requires_rga2();

    if caps.has_rga3 {
        let out_of_ratio = |s: f32| !(0.125..=8.0).contains(&s);
        if out_of_ratio(scale_w) || out_of_ratio(scale_h) {
            rga2_used = true;
        }
        if src.act.width < RGA3_MIN_WIDTH
            || src.act.width > RGA3_MAX_INPUT
            || src.act.height > RGA3_MAX_INPUT
            || dst.act.width < RGA3_MIN_WIDTH
        {
            rga2_used = true;
        }
        if let Some(pat) = pat {
            if pat.act.width < RGA3_MIN_WIDTH
                || pat.act.width > RGA3_MAX_INPUT
                || pat.act.height > RGA3_MAX_INPUT
            {
                rga2_used = true;
            }
        }
    }

    verify_dynamic(caps, rga2_used, src, dst)?;

    let mut core = caps.core;
    if rga2_used {
        core = SchedulerCore::RGA2_CORE0;
        if caps.has_rga2_pro {
            core |= SchedulerCore::RGA2_CORE1;
        }
    }

    // Prefer RGA3 for scaling, cropping, blending and 10-bit expansion when
    // RGA2 is only an Enhance variant.
    if caps.has_rga3
        && caps.has_rga2_enhance
        && !rga2_used
        && (core.is_default()
            || nb_inputs > 1
            || scale_w != 1.0
            || scale_h != 1.0
            || src.crop
            || src.uncompact_10b_msb
            || dst.uncompact_10b_msb)
    {
        core = SchedulerCore::RGA3;
    }

    let max_scale_ratio = if (rga2_used && caps.has_rga2_lite)
        || (!rga2_used && caps.has_rga3 && !caps.has_rga2)
        || core.is_rga3_only()
    {
        8.0
    } else {
        16.0
    };
    let min_scale_ratio = 1.0 / max_scale_ratio;

    if scale_w < min_scale_ratio
        || scale_w > max_scale_ratio
        || scale_h < min_scale_ratio
        || scale_h > max_scale_ratio
    {
        let err = Error::ScaleRatio {
            width: scale_w,
            height: scale_h,
            min: min_scale_ratio,
            max: max_scale_ratio,
        };
        error!("{err}");
        return Err(err);
    }

    Ok(UnitDecision {
        rga2_used,
        scheduler_core: core,
        max_scale_ratio,
    })
}

/// Limits that depend on which unit ends up running the operation.
pub fn verify_dynamic(
    caps: &Capabilities,
    rga2_used: bool,
    src: &FrameInfo,
    dst: &FrameInfo,
) -> Result<()> {
    if rga2_used && !caps.has_rga2 {
        return Err(unsupported(format!(
            "RGA2 is requested but not available for '{}' to '{}'",
            src.format, dst.format
        )));
    }
    if rga2_used && (is_10bit_msb(src.format) || is_10bit_msb(dst.format)) {
        return Err(unsupported(format!(
            "'{}' to '{}' is not supported by RGA2",
            src.format, dst.format
        )));
    }
    if rga2_used && matches!(dst.format, PixelFormat::Nv15 | PixelFormat::Nv20) {
        return Err(unsupported(format!(
            "Output format '{}' is not supported by RGA2",
            dst.format
        )));
    }
    if rga2_used && !caps.has_rga2_pro && src.crop && src.format.depth() >= 10 {
        return Err(unsupported(format!(
            "Cropping 10-bit '{}' input is not supported by RGA2",
            src.format
        )));
    }
    if rga2_used
        && !caps.has_rga2_pro
        && (dst.act.width > RGA2_MAX_OUTPUT || dst.act.height > RGA2_MAX_OUTPUT)
    {
        return Err(invalid_size(format!(
            "Max supported output size of RGA2 is {RGA2_MAX_OUTPUT}x{RGA2_MAX_OUTPUT}"
        )));
    }
    if !rga2_used && (src.act.width < RGA3_MIN_WIDTH || src.act.height < RGA3_MIN_HEIGHT) {
        return Err(invalid_size(format!(
            "Min supported input size of RGA3 is {RGA3_MIN_WIDTH}x{RGA3_MIN_HEIGHT}"
        )));
    }
    if !rga2_used && (dst.act.width > RGA3_MAX_OUTPUT || dst.act.height > RGA3_MAX_OUTPUT) {
        return Err(invalid_size(format!(
            "Max supported output size of RGA3 is {RGA3_MAX_OUTPUT}x{RGA3_MAX_OUTPUT}"
        )));
    }
    Ok(())
}

/// Whether RGA3 can address a surface with these pixel strides.
pub fn is_rga3_stride_compatible(wstride: i32, hstride: i32, format: RgaFormat) -> bool {
    match format {
        RgaFormat::YCBCR_420_SP | RgaFormat::YCRCB_420_SP | RgaFormat::YCBCR_422_SP => {
            wstride % 16 == 0 && hstride % 2 == 0
        }
        RgaFormat::YCBCR_420_SP_10B | RgaFormat::YCBCR_422_SP_10B => {
            wstride % 64 == 0 && hstride % 2 == 0
        }
        RgaFormat::YUYV_422 | RgaFormat::YVYU_422 | RgaFormat::UYVY_422 => {
            wstride % 8 == 0 && hstride % 2 == 0
        }
        RgaFormat::RGB_565 | RgaFormat::BGR_565 => wstride % 8 == 0,
        RgaFormat::RGB_888 | RgaFormat::BGR_888 => wstride % 16 == 0,
        RgaFormat::RGBA_8888
        | RgaFormat::BGRA_8888
        | RgaFormat::ARGB_8888
        | RgaFormat::ABGR_8888 => wstride % 4 == 0,
        _ => false,
    }
}

/// Unit selection carried across the frames of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitState {
    pub rga2_used: bool,
}

impl UnitState {
    pub fn new(decision: &UnitDecision) -> Self {
        Self {
            rga2_used: decision.rga2_used,
        }
    }

    /// Re-checks a session pinned to RGA3 against one input frame's strides.
    ///
    /// Falls back to RGA2 (and retargets `dst` to the RGA2 core) when the
    /// strides don't suit RGA3. AFBC inputs are exempt from the stride test.
    /// Sessions not pinned to RGA3 are left alone.
    pub fn revalidate_stride(
        &mut self,
        caps: &Capabilities,
        src: &FrameInfo,
        dst: &mut FrameInfo,
        stride: (i32, i32),
        is_afbc: bool,
    ) -> Result<()> {
        if !dst.scheduler_core.is_rga3_only() {
            return Ok(());
        }
        if !is_afbc && !is_rga3_stride_compatible(stride.0, stride.1, src.rga_format) {
            warn!(
                "Input pixel stride ({}x{}) format '{}' is not supported by RGA3",
                stride.0, stride.1, src.format
            );
            self.rga2_used = true;
        }
        verify_dynamic(caps, self.rga2_used, src, dst)?;
        if self.rga2_used {
            dst.scheduler_core = SchedulerCore::RGA2_CORE0;
        }
        Ok(())
    }
}
