// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Low-level bindings for the Rockchip RGA user-space library (`librga`).
//!
//! The library is loaded at runtime with `libloading` so binaries built
//! against this crate still start on hosts without RGA hardware. Only the
//! legacy `c_RkRgaBlit` entry point and `querystring` are bound; the
//! higher level im2d API is not used.

#![allow(non_camel_case_types, non_snake_case)]

use libloading::Library;
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags, PollTimeout},
};
use std::{
    ffi::{c_char, c_int, c_uint, c_ushort, c_void, CStr, OsStr},
    mem,
    os::fd::{AsFd, OwnedFd},
    ptr,
};

/// Default soname of the RGA library.
pub const LIBRGA: &str = "librga.so.2";

/// `IM_INFORMATION` selector for the driver/library version string.
pub const RGA_VERSION: c_int = 1;

pub const RGA_BLIT_SYNC: c_int = 0x5017;
pub const RGA_BLIT_ASYNC: c_int = 0x5018;

// RgaSURF_FORMAT
pub const RK_FORMAT_RGBA_8888: c_int = 0x0 << 8;
pub const RK_FORMAT_RGBX_8888: c_int = 0x1 << 8;
pub const RK_FORMAT_RGB_888: c_int = 0x2 << 8;
pub const RK_FORMAT_BGRA_8888: c_int = 0x3 << 8;
pub const RK_FORMAT_RGB_565: c_int = 0x4 << 8;
pub const RK_FORMAT_RGBA_5551: c_int = 0x5 << 8;
pub const RK_FORMAT_RGBA_4444: c_int = 0x6 << 8;
pub const RK_FORMAT_BGR_888: c_int = 0x7 << 8;
pub const RK_FORMAT_YCbCr_422_SP: c_int = 0x8 << 8;
pub const RK_FORMAT_YCbCr_422_P: c_int = 0x9 << 8;
pub const RK_FORMAT_YCbCr_420_SP: c_int = 0xa << 8;
pub const RK_FORMAT_YCbCr_420_P: c_int = 0xb << 8;
pub const RK_FORMAT_YCrCb_422_SP: c_int = 0xc << 8;
pub const RK_FORMAT_YCrCb_422_P: c_int = 0xd << 8;
pub const RK_FORMAT_YCrCb_420_SP: c_int = 0xe << 8;
pub const RK_FORMAT_YCrCb_420_P: c_int = 0xf << 8;
pub const RK_FORMAT_YCbCr_400: c_int = 0x15 << 8;
pub const RK_FORMAT_BGRX_8888: c_int = 0x16 << 8;
pub const RK_FORMAT_YVYU_422: c_int = 0x18 << 8;
pub const RK_FORMAT_VYUY_422: c_int = 0x1a << 8;
pub const RK_FORMAT_YUYV_422: c_int = 0x1c << 8;
pub const RK_FORMAT_UYVY_422: c_int = 0x1e << 8;
pub const RK_FORMAT_YCbCr_420_SP_10B: c_int = 0x20 << 8;
pub const RK_FORMAT_YCrCb_420_SP_10B: c_int = 0x21 << 8;
pub const RK_FORMAT_YCbCr_422_SP_10B: c_int = 0x22 << 8;
pub const RK_FORMAT_YCrCb_422_SP_10B: c_int = 0x23 << 8;
pub const RK_FORMAT_BGR_565: c_int = 0x24 << 8;
pub const RK_FORMAT_BGRA_5551: c_int = 0x25 << 8;
pub const RK_FORMAT_BGRA_4444: c_int = 0x26 << 8;
pub const RK_FORMAT_ARGB_8888: c_int = 0x28 << 8;
pub const RK_FORMAT_XRGB_8888: c_int = 0x29 << 8;
pub const RK_FORMAT_ABGR_8888: c_int = 0x2c << 8;
pub const RK_FORMAT_XBGR_8888: c_int = 0x2d << 8;
// Not yet in every librga header release.
pub const RK_FORMAT_YCbCr_444_SP: c_int = 0x32 << 8;
pub const RK_FORMAT_YCrCb_444_SP: c_int = 0x33 << 8;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct rga_rect_t {
    pub xoffset: c_int,
    pub yoffset: c_int,
    pub width: c_int,
    pub height: c_int,
    pub wstride: c_int,
    pub hstride: c_int,
    pub format: c_int,
    pub size: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct rga_nn_t {
    pub nn_flag: c_int,
    pub scale_r: c_int,
    pub scale_g: c_int,
    pub scale_b: c_int,
    pub offset_r: c_int,
    pub offset_g: c_int,
    pub offset_b: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct rga_dither_t {
    pub enable: c_int,
    pub mode: c_int,
    pub lut0_l: c_int,
    pub lut0_h: c_int,
    pub lut1_l: c_int,
    pub lut1_h: c_int,
}

/// Mirror of `rga_info_t` from `RgaApi.h`.
///
/// Only the leading fields are named. The trailing mosaic/OSD/pre-intr
/// blocks are covered by `reserve`, which must stay zeroed.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct rga_info_t {
    pub fd: c_int,
    pub virAddr: *mut c_void,
    pub phyAddr: *mut c_void,
    pub hnd: c_uint,
    pub format: c_int,
    pub rect: rga_rect_t,
    pub blend: c_uint,
    pub bufferSize: c_int,
    pub rotation: c_int,
    pub color: c_int,
    pub testLog: c_int,
    pub mmuFlag: c_int,
    pub colorkey_en: c_int,
    pub colorkey_mode: c_int,
    pub colorkey_max: c_int,
    pub colorkey_min: c_int,
    pub scale_mode: c_int,
    pub color_space_mode: c_int,
    pub sync_mode: c_int,
    pub nn: rga_nn_t,
    pub dither: rga_dither_t,
    pub rop_code: c_int,
    pub rd_mode: c_int,
    pub is_10b_compact: c_ushort,
    pub is_10b_endian: c_ushort,
    pub in_fence_fd: c_int,
    pub out_fence_fd: c_int,
    pub core: c_int,
    pub priority: c_int,
    pub enable: c_ushort,
    pub handle: c_int,
    pub reserve: [u8; 1024],
}

impl Default for rga_info_t {
    fn default() -> Self {
        // SAFETY: every field is an integer, a raw pointer or a byte array,
        // all of which are valid when zeroed.
        unsafe { mem::zeroed() }
    }
}

type QueryStringFn = unsafe extern "C" fn(c_int) -> *const c_char;
type BlitFn = unsafe extern "C" fn(*mut rga_info_t, *mut rga_info_t, *mut rga_info_t) -> c_int;

/// Handle to a dynamically loaded `librga`.
pub struct Rga {
    querystring: QueryStringFn,
    blit: BlitFn,
    _lib: Library,
}

impl Rga {
    /// Loads the RGA library from `path`.
    ///
    /// # Safety
    ///
    /// Loading a shared library runs its initialisers. The caller must make
    /// sure `path` names a genuine `librga` build exporting `querystring` and
    /// `c_RkRgaBlit` with the expected C signatures.
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let lib = Library::new(path)?;
        let querystring = *lib.get::<QueryStringFn>(b"querystring\0")?;
        let blit = *lib.get::<BlitFn>(b"c_RkRgaBlit\0")?;
        Ok(Self {
            querystring,
            blit,
            _lib: lib,
        })
    }

    /// Returns the `RGA_VERSION` information string, e.g.
    /// `"RGA_3 ... RGA_2_Enhance ..."`. Empty when the driver reports nothing.
    pub fn version(&self) -> String {
        let ptr = unsafe { (self.querystring)(RGA_VERSION) };
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned()
    }

    /// Issues one blit. Returns the raw driver status, zero on success.
    ///
    /// # Safety
    ///
    /// The `fd` of every descriptor must be a live dma-buf large enough for
    /// the rectangle and strides it describes.
    pub unsafe fn blit(
        &self,
        src: &mut rga_info_t,
        dst: &mut rga_info_t,
        pat: Option<&mut rga_info_t>,
    ) -> c_int {
        let pat = pat.map_or(ptr::null_mut(), |p| p as *mut rga_info_t);
        (self.blit)(src, dst, pat)
    }
}

/// Blocks until `fence` signals, then closes it.
///
/// There is no timeout: a fence returned by an accepted blit always signals.
pub fn fence_wait(fence: OwnedFd) -> nix::Result<()> {
    let mut fds = [PollFd::new(fence.as_fd(), PollFlags::POLLIN)];
    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => break,
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => continue,
            Err(err) => return Err(err),
        }
    }
    match fds[0].revents() {
        Some(ev) if ev.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) => Err(Errno::EIO),
        _ => Ok(()),
    }
}
