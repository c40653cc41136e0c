// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The native operation descriptor and the hardware seam.

use crate::{
    caps::SchedulerCore,
    error::{Error, Result},
    format::RgaFormat,
};
use rga_sys::{rga_info_t, rga_rect_t, Rga, RGA_BLIT_ASYNC, RGA_BLIT_SYNC};
use std::{
    io,
    os::fd::{FromRawFd, OwnedFd, RawFd},
};
use tracing::debug;

/// `rd_mode` for AFBC 16x16 block layouts.
pub const RD_MODE_AFBC16X16: u32 = 1 << 1;
/// `rd_mode` for RFBC 64x4 block layouts.
pub const RD_MODE_RFBC64X4: u32 = 1 << 4;

/// Region of a surface the operation reads or writes, with the surface's
/// pixel strides.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RgaRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub wstride: i32,
    pub hstride: i32,
    pub format: RgaFormat,
}

impl RgaRect {
    pub fn new(
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        wstride: i32,
        hstride: i32,
        format: RgaFormat,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            wstride,
            hstride,
            format,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The blit returns once the hardware is done.
    #[default]
    Sync,
    /// The blit returns a fence that signals on completion.
    Async,
}

/// One side of a blit: source, destination or pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgaInfo {
    pub fd: RawFd,
    pub format: RgaFormat,
    pub rect: RgaRect,
    pub blend: u32,
    pub rotation: u32,
    pub color_space_mode: u32,
    pub sync_mode: SyncMode,
    pub rd_mode: u32,
    pub is_10b_compact: bool,
    pub is_10b_endian: bool,
    pub in_fence_fd: RawFd,
    pub out_fence_fd: RawFd,
    pub core: SchedulerCore,
    pub priority: i32,
    pub mmu: bool,
}

impl Default for RgaInfo {
    fn default() -> Self {
        Self {
            fd: -1,
            format: RgaFormat::default(),
            rect: RgaRect::default(),
            blend: 0,
            rotation: 0,
            color_space_mode: 0,
            sync_mode: SyncMode::Sync,
            rd_mode: 0,
            is_10b_compact: false,
            is_10b_endian: false,
            in_fence_fd: -1,
            out_fence_fd: -1,
            core: SchedulerCore::DEFAULT,
            priority: 0,
            mmu: true,
        }
    }
}

impl From<&RgaInfo> for rga_info_t {
    fn from(info: &RgaInfo) -> Self {
        let mut raw = rga_info_t::default();
        raw.fd = info.fd;
        raw.format = info.format.0;
        raw.rect = rga_rect_t {
            xoffset: info.rect.x,
            yoffset: info.rect.y,
            width: info.rect.width,
            height: info.rect.height,
            wstride: info.rect.wstride,
            hstride: info.rect.hstride,
            format: info.rect.format.0,
            size: 0,
        };
        raw.blend = info.blend;
        raw.rotation = info.rotation as i32;
        raw.color_space_mode = info.color_space_mode as i32;
        raw.sync_mode = match info.sync_mode {
            SyncMode::Sync => RGA_BLIT_SYNC,
            SyncMode::Async => RGA_BLIT_ASYNC,
        };
        raw.rd_mode = info.rd_mode as i32;
        raw.is_10b_compact = info.is_10b_compact as u16;
        raw.is_10b_endian = info.is_10b_endian as u16;
        raw.in_fence_fd = info.in_fence_fd;
        raw.out_fence_fd = info.out_fence_fd;
        raw.core = info.core.bits() as i32;
        raw.priority = info.priority;
        raw.mmuFlag = info.mmu as i32;
        raw
    }
}

/// Access to RGA hardware.
///
/// The engine only ever talks to the blitter through this trait, so tests
/// and benchmarks can run without the hardware present.
pub trait RgaDevice {
    /// Driver version string listing the available generations.
    fn version(&self) -> String;

    /// Submits one operation. On success an async `dst` carries its
    /// completion fence in `out_fence_fd`. Errors are the raw driver status.
    fn blit(
        &self,
        src: &RgaInfo,
        dst: &mut RgaInfo,
        pat: Option<&RgaInfo>,
    ) -> std::result::Result<(), i32>;

    /// Blocks until `fence` signals, taking ownership of it.
    fn sync(&self, fence: RawFd) -> io::Result<()>;
}

/// [`RgaDevice`] backed by the vendor `librga`.
pub struct LibRga {
    rga: Rga,
}

impl LibRga {
    pub fn new() -> Result<Self> {
        Self::with_library(rga_sys::LIBRGA)
    }

    pub fn with_library(path: &str) -> Result<Self> {
        let rga = unsafe { Rga::new(path) }.map_err(|err| Error::Library(err.to_string()))?;
        Ok(Self { rga })
    }
}

fn log_info(role: &str, info: &RgaInfo) {
    debug!(
        "RGA {role} | fd:{} mmu:{} rd_mode:{} | x:{} y:{} w:{} h:{} ws:{} hs:{} fmt:{}",
        info.fd,
        info.mmu,
        info.rd_mode,
        info.rect.x,
        info.rect.y,
        info.rect.width,
        info.rect.height,
        info.rect.wstride,
        info.rect.hstride,
        info.rect.format
    );
}

impl RgaDevice for LibRga {
    fn version(&self) -> String {
        self.rga.version()
    }

    fn blit(
        &self,
        src: &RgaInfo,
        dst: &mut RgaInfo,
        pat: Option<&RgaInfo>,
    ) -> std::result::Result<(), i32> {
        log_info("src", src);
        if let Some(pat) = pat {
            log_info("pat", pat);
        }
        log_info("dst", dst);

        let mut raw_src = rga_info_t::from(src);
        let mut raw_dst = rga_info_t::from(&*dst);
        let mut raw_pat = pat.map(rga_info_t::from);
        let ret = unsafe { self.rga.blit(&mut raw_src, &mut raw_dst, raw_pat.as_mut()) };
        dst.out_fence_fd = raw_dst.out_fence_fd;
        match ret {
            0 => Ok(()),
            err => Err(err),
        }
    }

    fn sync(&self, fence: RawFd) -> io::Result<()> {
        if fence < 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        let fence = unsafe { OwnedFd::from_raw_fd(fence) };
        rga_sys::fence_wait(fence).map_err(io::Error::from)
    }
}
