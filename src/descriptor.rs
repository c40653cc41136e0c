// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Builds the native descriptor for each side of an operation.
//!
//! Inputs are wrapped as they arrive ([`RgaContext::submit_frame`]); outputs
//! are allocated from the host buffer pool first
//! ([`RgaContext::query_frame`]). Both derive pixel strides from the DRM
//! layout, handle AFBC/RFBC compressed layouts and park the frame in the
//! pool for its role.

use crate::{
    caps::SchedulerCore,
    constraint::FrameInfo,
    context::RgaContext,
    device::{RgaInfo, RgaRect, SyncMode, RD_MODE_AFBC16X16, RD_MODE_RFBC64X4},
    error::{Error, Result},
    format::{PixelFormat, RgaFormat},
    frame::{
        ColorInfo, ColorRange, ColorSpace, DrmDescriptor, Frame, FrameRequest,
        AFBC_OUTPUT_MODIFIER,
    },
    pool::{FrameRole, SlotId},
};
use std::sync::Arc;
use tracing::{error, warn};

const AFBC_ALIGN: (i32, i32) = (16, 16);
const RFBC_ALIGN: (i32, i32) = (64, 4);

/// `color_space_mode` values understood by the driver.
pub mod csc {
    pub const RGB_TO_YUV_BT601_LIMIT: u32 = 2 << 2;
    pub const RGB_TO_YUV_BT709_LIMIT: u32 = 0xb << 8;
    pub const YUV_TO_RGB_BT601_LIMIT: u32 = 1;
    pub const YUV_TO_RGB_BT601_FULL: u32 = 2;
    pub const YUV_TO_RGB_BT709_LIMIT: u32 = 3;
}

pub(crate) fn align(value: i32, to: i32) -> i32 {
    (value + to - 1) / to * to
}

fn invalid_frame(msg: String) -> Error {
    error!("{msg}");
    Error::InvalidFrame(msg)
}

/// Pixel strides `(wstride, hstride)` of a linear DRM layout.
///
/// Packed formats derive the width stride from the pitch and the height
/// stride from the buffer size; planar ones from the pitch and the offset of
/// the second plane.
pub fn pixel_stride(desc: &DrmDescriptor, format: PixelFormat) -> Option<(i32, i32)> {
    let object = desc.objects.first()?;
    let planes = &desc.layers.first()?.planes;
    let plane0 = planes.first()?;
    let bytes_pp = format.bytes_pp();
    if plane0.pitch == 0 || bytes_pp <= 0.0 {
        return None;
    }

    let rgb = format.is_rgb();
    let packed = rgb || !format.is_planar();
    let (ws, hs) = if packed {
        let rows = (object.size / plane0.pitch) as i32;
        let hs = if rgb { rows } else { rows / 2 * 2 };
        ((plane0.pitch as f32 / bytes_pp) as i32, hs)
    } else {
        let plane1 = planes.get(1)?;
        (plane0.pitch as i32, (plane1.offset / plane0.pitch) as i32)
    };

    (ws > 0 && hs > 0).then_some((ws, hs))
}

/// Converts a byte pitch to pixels (`reverse`) or pixels to bytes.
pub fn afbc_pixel_stride(bytes_pp: f32, stride: i32, reverse: bool) -> Option<i32> {
    if stride <= 0 || bytes_pp <= 0.0 {
        return None;
    }
    let stride = if reverse {
        (stride as f32 / bytes_pp) as i32
    } else {
        (stride as f32 * bytes_pp) as i32
    };
    (stride > 0).then_some(stride)
}

/// Picks the conversion matrix for `src` → `dst` and retags `out` to match.
/// Returns the driver's `color_space_mode`, zero for none.
pub fn color_space_mode(
    src: PixelFormat,
    input: &ColorInfo,
    dst: PixelFormat,
    out: &mut ColorInfo,
) -> u32 {
    let mut mode = 0;

    if src.is_rgb() && !dst.is_rgb() {
        if input.range == ColorRange::Full {
            match input.space {
                ColorSpace::Bt709 => {
                    out.space = ColorSpace::Bt709;
                    mode = csc::RGB_TO_YUV_BT709_LIMIT;
                }
                ColorSpace::Bt470bg => {
                    out.space = ColorSpace::Bt470bg;
                    mode = csc::RGB_TO_YUV_BT601_LIMIT;
                }
                _ => {}
            }
        }
        if mode != 0 {
            out.transfer = None;
            out.primaries = None;
            out.range = ColorRange::Limited;
        }
    }

    if !src.is_rgb() && dst.is_rgb() {
        match (input.range, input.space) {
            (ColorRange::Limited, ColorSpace::Bt709) => {
                out.space = ColorSpace::Bt709;
                mode = csc::YUV_TO_RGB_BT709_LIMIT;
            }
            (ColorRange::Limited, ColorSpace::Bt470bg) => {
                out.space = ColorSpace::Bt470bg;
                mode = csc::YUV_TO_RGB_BT601_LIMIT;
            }
            (ColorRange::Full, ColorSpace::Bt470bg) => {
                out.space = ColorSpace::Bt470bg;
                mode = csc::YUV_TO_RGB_BT601_FULL;
            }
            _ => {}
        }
        if mode != 0 {
            out.transfer = None;
            out.primaries = None;
            out.range = ColorRange::Full;
        }
    }

    if src.is_full_range() && !dst.is_rgb() {
        out.range = ColorRange::Full;
    }

    mode
}

impl RgaContext {
    /// Wraps an input frame as the `role` side of the next operation.
    ///
    /// `Pattern` is an overlay used as-is, `PatternPreprocessed` an overlay
    /// feeding the pre-composite step.
    pub(crate) fn submit_frame(
        &mut self,
        role: FrameRole,
        frame: &Arc<Frame>,
        do_overlay: bool,
    ) -> Result<SlotId> {
        let in_info = match role {
            FrameRole::Source => self.inputs[0],
            FrameRole::Pattern | FrameRole::PatternPreprocessed => {
                self.inputs.get(1).copied().ok_or_else(|| {
                    Error::InvalidConfig("overlay submitted without an overlay input".to_owned())
                })?
            }
            FrameRole::Destination => {
                return Err(Error::InvalidConfig(
                    "outputs are queried, not submitted".to_owned(),
                ))
            }
        };

        let pool = self.pools.get_mut(role);
        pool.recycle();
        let slot = pool.acquire();

        match self.describe_input(role, &in_info, frame, do_overlay) {
            Ok(info) => {
                self.pools.get_mut(role).attach(slot, frame.clone(), info);
                Ok(slot)
            }
            Err(err) => {
                error!("Failed to submit frame on input: {}", frame);
                self.pools.get_mut(role).release(slot);
                Err(err)
            }
        }
    }

    fn describe_input(
        &mut self,
        role: FrameRole,
        in_info: &FrameInfo,
        frame: &Frame,
        do_overlay: bool,
    ) -> Result<RgaInfo> {
        let pat_preproc = role == FrameRole::PatternPreprocessed;
        let desc = frame
            .drm()
            .ok_or_else(|| invalid_frame("RGA gets a wrong frame".to_owned()))?;
        let object = *desc
            .objects
            .first()
            .ok_or_else(|| invalid_frame("Frame has no DRM objects".to_owned()))?;
        if object.fd < 0 {
            return Err(invalid_frame(format!("Invalid frame fd {}", object.fd)));
        }

        let is_afbc = object.is_afbc();
        let is_rfbc = object.is_rfbc();
        let is_fbc = is_afbc || is_rfbc;

        let (ws, hs) = if is_fbc {
            (0, 0)
        } else {
            pixel_stride(desc, in_info.format)
                .ok_or_else(|| invalid_frame("Failed to get frame pixel stride".to_owned()))?
        };

        let mut info = RgaInfo {
            fd: object.fd,
            format: in_info.rga_format,
            ..Default::default()
        };
        if in_info.uncompact_10b_msb {
            info.is_10b_compact = true;
            info.is_10b_endian = true;
        }
        if role == FrameRole::Source {
            info.rotation = in_info.rotate_mode;
            info.blend = if do_overlay { in_info.blend_mode } else { 0 };
        }

        if is_fbc
            && !self.caps.has_rga2_pro
            && (self.unit.rga2_used || self.output.scheduler_core == SchedulerCore::RGA2_CORE0)
        {
            return Err(Error::Unsupported(format!(
                "Input format '{}' with AFBC/RFBC modifier is not supported by RGA2",
                in_info.format
            )));
        }

        // Strides are only known per frame; a session pinned to RGA3 may
        // have to move to RGA2 here.
        self.unit
            .revalidate_stride(&self.caps, in_info, &mut self.output, (ws, hs), is_afbc)?;

        let main_act = self.inputs[0].act;
        info.rect = if pat_preproc {
            RgaRect::new(
                0,
                0,
                (main_act.width - in_info.overlay_x).min(in_info.act.width),
                (main_act.height - in_info.overlay_y).min(in_info.act.height),
                ws,
                hs,
                in_info.rga_format,
            )
        } else {
            RgaRect::new(
                in_info.act.x,
                in_info.act.y,
                in_info.act.width,
                in_info.act.height,
                ws,
                hs,
                in_info.rga_format,
            )
        };

        if is_fbc {
            let (align_w, align_h) = if is_afbc { AFBC_ALIGN } else { RFBC_ALIGN };
            let fbc_format = if is_afbc {
                in_info.format.drm_afbc_format()
            } else {
                in_info.format.drm_rfbc_format()
            };

            let mut offset_y = 0;
            if frame.crop_top > 0 {
                offset_y = if is_afbc { frame.crop_top as i32 } else { 0 };
                info.rect.y += offset_y;
            }

            let layer = desc
                .layers
                .first()
                .ok_or_else(|| invalid_frame("Frame has no DRM layers".to_owned()))?;
            let pitch = layer.planes.first().map_or(0, |plane| plane.pitch as i32);
            if fbc_format != Some(layer.format) {
                return Err(invalid_frame(format!(
                    "Input format '{}' with AFBC/RFBC modifier is not supported",
                    in_info.format
                )));
            }

            let mut wstride = afbc_pixel_stride(in_info.bytes_pp, pitch, true)
                .ok_or_else(|| invalid_frame("Invalid compressed frame pitch".to_owned()))?;
            if wstride % align_w != 0 {
                wstride = align(in_info.width as i32, align_w);
            }
            info.rect.wstride = wstride;
            info.rect.hstride = align(in_info.height as i32 + offset_y, align_h);
            info.rd_mode = if is_afbc {
                RD_MODE_AFBC16X16
            } else {
                RD_MODE_RFBC64X4
            };
        }

        Ok(info)
    }

    /// Allocates an output frame as the `role` side of the next operation.
    ///
    /// `Destination` is the filter output. `Pattern` is the canvas of the
    /// pre-composite step: main-sized, in the overlay's format. `driver` is
    /// the input the output copies its timestamp and colorimetry from.
    pub(crate) fn query_frame(&mut self, role: FrameRole, driver: &Frame) -> Result<SlotId> {
        let pat_preproc = match role {
            FrameRole::Destination => false,
            FrameRole::Pattern => true,
            FrameRole::Source | FrameRole::PatternPreprocessed => {
                return Err(Error::InvalidConfig(
                    "inputs are submitted, not queried".to_owned(),
                ))
            }
        };

        let pool = self.pools.get_mut(role);
        pool.recycle();
        let slot = pool.acquire();

        match self.output_frame(pat_preproc, driver) {
            Ok((frame, info)) => {
                self.pools
                    .get_mut(role)
                    .attach(slot, Arc::new(frame), info);
                Ok(slot)
            }
            Err(err) => {
                error!("Failed to query an output frame");
                self.pools.get_mut(role).release(slot);
                Err(err)
            }
        }
    }

    fn output_frame(&mut self, pat_preproc: bool, driver: &Frame) -> Result<(Frame, RgaInfo)> {
        let main = self.inputs[0];
        let out_info = if pat_preproc {
            self.inputs.get(1).copied().ok_or_else(|| {
                Error::InvalidConfig("pre-composite without an overlay input".to_owned())
            })?
        } else {
            self.output
        };
        let request = if pat_preproc {
            FrameRequest {
                width: main.width,
                height: main.height,
                format: out_info.format,
            }
        } else {
            FrameRequest {
                width: self.output.width,
                height: self.output.height,
                format: self.output.format,
            }
        };

        let mut frame = self.buffers.allocate(&request).map_err(|err| {
            error!("Cannot allocate an internal frame: {err}");
            err
        })?;
        frame.copy_props(driver);

        if (self.unit.rga2_used || out_info.scheduler_core == SchedulerCore::RGA2_CORE0)
            && self.afbc_out
            && !pat_preproc
        {
            warn!(
                "Output format '{}' with AFBC modifier is not supported by RGA2",
                out_info.format
            );
            self.afbc_out = false;
        }
        let is_afbc = self.afbc_out && !pat_preproc;

        let desc = frame
            .drm()
            .ok_or_else(|| invalid_frame("Buffer pool returned a non-DRM frame".to_owned()))?;
        let fd = desc
            .objects
            .first()
            .map(|object| object.fd)
            .filter(|fd| *fd >= 0)
            .ok_or_else(|| invalid_frame("Buffer pool returned an invalid fd".to_owned()))?;
        let (ws, hs) = match pixel_stride(desc, out_info.format) {
            Some(stride) => stride,
            None if is_afbc => (0, 0),
            None => {
                return Err(invalid_frame(
                    "Failed to get output frame pixel stride".to_owned(),
                ))
            }
        };

        let mut info = RgaInfo {
            fd,
            format: out_info.rga_format,
            core: out_info.scheduler_core,
            sync_mode: SyncMode::Async,
            ..Default::default()
        };
        if out_info.uncompact_10b_msb {
            info.is_10b_compact = true;
            info.is_10b_endian = true;
        }

        if !pat_preproc {
            let input = driver.color;
            info.color_space_mode =
                color_space_mode(main.format, &input, out_info.format, &mut frame.color);
        }

        info.rect = if pat_preproc {
            RgaRect::new(
                out_info.overlay_x,
                out_info.overlay_y,
                (main.act.width - out_info.overlay_x).min(out_info.act.width),
                (main.act.height - out_info.overlay_y).min(out_info.act.height),
                ws,
                hs,
                out_info.rga_format,
            )
        } else {
            RgaRect::new(
                out_info.act.x,
                out_info.act.y,
                out_info.act.width,
                out_info.act.height,
                ws,
                hs,
                out_info.rga_format,
            )
        };

        if is_afbc {
            self.apply_afbc_output(&mut frame, &mut info, &out_info)?;
        }

        Ok((frame, info))
    }

    /// Switches an output to the AFBC 16x16 sparse layout, or disables AFBC
    /// output for the session when the format can't be compressed.
    fn apply_afbc_output(
        &mut self,
        frame: &mut Frame,
        info: &mut RgaInfo,
        out_info: &FrameInfo,
    ) -> Result<()> {
        let Some(drm_afbc) = out_info.format.drm_afbc_format() else {
            warn!(
                "Output format '{}' with AFBC modifier is not supported",
                out_info.format
            );
            self.afbc_out = false;
            return Ok(());
        };

        let wstride = align(out_info.width as i32, AFBC_ALIGN.0);
        let hstride = align(out_info.height as i32, AFBC_ALIGN.1);
        if matches!(
            info.rect.format,
            RgaFormat::YCBCR_420_SP_10B | RgaFormat::YCBCR_422_SP_10B
        ) && wstride % 64 != 0
        {
            warn!(
                "Output pixel wstride '{wstride}' format '{}' is not supported by RGA3 AFBC",
                out_info.format
            );
            self.afbc_out = false;
            return Ok(());
        }

        // AFBC swizzles the 8888 channel order.
        info.rect.format = match info.rect.format {
            RgaFormat::RGBA_8888 => RgaFormat::BGRA_8888,
            RgaFormat::BGRA_8888 => RgaFormat::RGBA_8888,
            other => other,
        };
        info.rect.wstride = wstride;
        info.rect.hstride = hstride;
        info.rd_mode = RD_MODE_AFBC16X16;

        let pitch = afbc_pixel_stride(out_info.bytes_pp, wstride, false)
            .ok_or_else(|| invalid_frame("Invalid AFBC output pitch".to_owned()))?;
        let desc = frame
            .drm_mut()
            .ok_or_else(|| invalid_frame("Buffer pool returned a non-DRM frame".to_owned()))?;
        if let Some(object) = desc.objects.first_mut() {
            object.format_modifier = AFBC_OUTPUT_MODIFIER;
        }
        if let Some(layer) = desc.layers.first_mut() {
            layer.format = drm_afbc;
            layer.planes.truncate(1);
            if let Some(plane) = layer.planes.first_mut() {
                plane.offset = 0;
                plane.pitch = pitch as usize;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_stride_from_plane_offset() {
        let desc = DrmDescriptor::linear(PixelFormat::Nv12, 1920, 1080, 3, 1 << 22);
        assert_eq!(pixel_stride(&desc, PixelFormat::Nv12), Some((1920, 1080)));
    }

    #[test]
    fn packed_stride_from_size() {
        let desc = DrmDescriptor::linear(PixelFormat::Rgb24, 100, 50, 3, 312 * 51);
        assert_eq!(pixel_stride(&desc, PixelFormat::Rgb24), Some((104, 51)));

        // YUV packed rows round down to even.
        let desc = DrmDescriptor::linear(PixelFormat::Yuyv422, 64, 9, 3, 128 * 9);
        assert_eq!(pixel_stride(&desc, PixelFormat::Yuyv422), Some((64, 8)));
    }

    #[test]
    fn empty_buffer_has_no_stride() {
        let desc = DrmDescriptor::linear(PixelFormat::Rgba, 64, 64, 3, 0);
        assert_eq!(pixel_stride(&desc, PixelFormat::Rgba), None);
    }

    #[test]
    fn afbc_stride_both_ways() {
        assert_eq!(afbc_pixel_stride(1.5, 1920, false), Some(2880));
        assert_eq!(afbc_pixel_stride(4.0, 4096, true), Some(1024));
        assert_eq!(afbc_pixel_stride(4.0, 0, true), None);
    }

    #[test]
    fn rgb_to_yuv_limits_range() {
        let input = ColorInfo {
            range: ColorRange::Full,
            space: ColorSpace::Bt709,
            transfer: Some(1),
            primaries: Some(1),
        };
        let mut out = input;
        let mode = color_space_mode(PixelFormat::Rgba, &input, PixelFormat::Nv12, &mut out);
        assert_eq!(mode, csc::RGB_TO_YUV_BT709_LIMIT);
        assert_eq!(out.range, ColorRange::Limited);
        assert_eq!(out.transfer, None);
        assert_eq!(out.primaries, None);
    }

    #[test]
    fn limited_rgb_input_is_untouched() {
        let input = ColorInfo {
            range: ColorRange::Limited,
            space: ColorSpace::Bt709,
            ..Default::default()
        };
        let mut out = input;
        let mode = color_space_mode(PixelFormat::Rgb24, &input, PixelFormat::Nv12, &mut out);
        assert_eq!(mode, 0);
        assert_eq!(out, input);
    }

    #[test]
    fn yuv_to_rgb_matrices() {
        let mut out = ColorInfo::default();
        let bt601_full = ColorInfo {
            range: ColorRange::Full,
            space: ColorSpace::Bt470bg,
            ..Default::default()
        };
        assert_eq!(
            color_space_mode(PixelFormat::Nv12, &bt601_full, PixelFormat::Rgb24, &mut out),
            csc::YUV_TO_RGB_BT601_FULL
        );
        assert_eq!(out.range, ColorRange::Full);

        // Full range BT.709 has no matrix.
        let bt709_full = ColorInfo {
            space: ColorSpace::Bt709,
            ..bt601_full
        };
        let mut out = ColorInfo::default();
        assert_eq!(
            color_space_mode(PixelFormat::Nv12, &bt709_full, PixelFormat::Rgb24, &mut out),
            0
        );
        assert_eq!(out, ColorInfo::default());
    }

    #[test]
    fn yuvj_output_stays_full_range() {
        let mut out = ColorInfo::default();
        let mode = color_space_mode(
            PixelFormat::Yuvj420p,
            &ColorInfo::default(),
            PixelFormat::Nv12,
            &mut out,
        );
        assert_eq!(mode, 0);
        assert_eq!(out.range, ColorRange::Full);
    }
}
