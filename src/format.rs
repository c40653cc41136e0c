// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pixel formats and the mapping between host formats and native RGA
//! surface formats.
//!
//! The host side describes buffers with a [`PixelFormat`] plus a DRM fourcc
//! in the buffer's layout descriptor. The RGA driver wants an
//! `RK_FORMAT_*` code, wrapped here as [`RgaFormat`]. Two lookup tables
//! exist: the main table used for sources and destinations, and a smaller
//! overlay table (RGB families only) used for pattern inputs.

use crate::pool::FrameRole;
use rga_sys as sys;
use std::{fmt, str::FromStr};

/// Builds a little-endian DRM fourcc code.
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24
}

pub const DRM_FORMAT_INVALID: u32 = 0;
pub const DRM_FORMAT_R8: u32 = fourcc(b'R', b'8', b' ', b' ');
pub const DRM_FORMAT_YUV420: u32 = fourcc(b'Y', b'U', b'1', b'2');
pub const DRM_FORMAT_YUV422: u32 = fourcc(b'Y', b'U', b'1', b'6');
pub const DRM_FORMAT_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const DRM_FORMAT_NV21: u32 = fourcc(b'N', b'V', b'2', b'1');
pub const DRM_FORMAT_NV16: u32 = fourcc(b'N', b'V', b'1', b'6');
pub const DRM_FORMAT_NV24: u32 = fourcc(b'N', b'V', b'2', b'4');
pub const DRM_FORMAT_NV42: u32 = fourcc(b'N', b'V', b'4', b'2');
pub const DRM_FORMAT_P010: u32 = fourcc(b'P', b'0', b'1', b'0');
pub const DRM_FORMAT_P210: u32 = fourcc(b'P', b'2', b'1', b'0');
pub const DRM_FORMAT_NV15: u32 = fourcc(b'N', b'V', b'1', b'5');
pub const DRM_FORMAT_NV20: u32 = fourcc(b'N', b'V', b'2', b'0');
pub const DRM_FORMAT_YUYV: u32 = fourcc(b'Y', b'U', b'Y', b'V');
pub const DRM_FORMAT_YVYU: u32 = fourcc(b'Y', b'V', b'Y', b'U');
pub const DRM_FORMAT_UYVY: u32 = fourcc(b'U', b'Y', b'V', b'Y');
pub const DRM_FORMAT_XRGB1555: u32 = fourcc(b'X', b'R', b'1', b'5');
pub const DRM_FORMAT_XBGR1555: u32 = fourcc(b'X', b'B', b'1', b'5');
pub const DRM_FORMAT_RGB565: u32 = fourcc(b'R', b'G', b'1', b'6');
pub const DRM_FORMAT_BGR565: u32 = fourcc(b'B', b'G', b'1', b'6');
pub const DRM_FORMAT_RGB888: u32 = fourcc(b'R', b'G', b'2', b'4');
pub const DRM_FORMAT_BGR888: u32 = fourcc(b'B', b'G', b'2', b'4');
pub const DRM_FORMAT_ARGB8888: u32 = fourcc(b'A', b'R', b'2', b'4');
pub const DRM_FORMAT_XRGB8888: u32 = fourcc(b'X', b'R', b'2', b'4');
pub const DRM_FORMAT_ABGR8888: u32 = fourcc(b'A', b'B', b'2', b'4');
pub const DRM_FORMAT_XBGR8888: u32 = fourcc(b'X', b'B', b'2', b'4');
pub const DRM_FORMAT_RGBA8888: u32 = fourcc(b'R', b'A', b'2', b'4');
pub const DRM_FORMAT_RGBX8888: u32 = fourcc(b'R', b'X', b'2', b'4');
pub const DRM_FORMAT_BGRA8888: u32 = fourcc(b'B', b'A', b'2', b'4');
pub const DRM_FORMAT_BGRX8888: u32 = fourcc(b'B', b'X', b'2', b'4');
pub const DRM_FORMAT_VUY888: u32 = fourcc(b'V', b'U', b'2', b'4');
pub const DRM_FORMAT_YUV420_8BIT: u32 = fourcc(b'Y', b'U', b'0', b'8');
pub const DRM_FORMAT_YUV420_10BIT: u32 = fourcc(b'Y', b'U', b'1', b'0');
pub const DRM_FORMAT_Y210: u32 = fourcc(b'Y', b'2', b'1', b'0');

/// Native RGA surface format (`RK_FORMAT_*`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgaFormat(pub i32);

impl RgaFormat {
    pub const RGBA_8888: Self = Self(sys::RK_FORMAT_RGBA_8888);
    pub const RGB_888: Self = Self(sys::RK_FORMAT_RGB_888);
    pub const BGRA_8888: Self = Self(sys::RK_FORMAT_BGRA_8888);
    pub const RGB_565: Self = Self(sys::RK_FORMAT_RGB_565);
    pub const RGBA_5551: Self = Self(sys::RK_FORMAT_RGBA_5551);
    pub const BGR_888: Self = Self(sys::RK_FORMAT_BGR_888);
    pub const YCBCR_422_SP: Self = Self(sys::RK_FORMAT_YCbCr_422_SP);
    pub const YCBCR_422_P: Self = Self(sys::RK_FORMAT_YCbCr_422_P);
    pub const YCBCR_420_SP: Self = Self(sys::RK_FORMAT_YCbCr_420_SP);
    pub const YCBCR_420_P: Self = Self(sys::RK_FORMAT_YCbCr_420_P);
    pub const YCRCB_420_SP: Self = Self(sys::RK_FORMAT_YCrCb_420_SP);
    pub const YCBCR_400: Self = Self(sys::RK_FORMAT_YCbCr_400);
    pub const YVYU_422: Self = Self(sys::RK_FORMAT_YVYU_422);
    pub const YUYV_422: Self = Self(sys::RK_FORMAT_YUYV_422);
    pub const UYVY_422: Self = Self(sys::RK_FORMAT_UYVY_422);
    pub const YCBCR_420_SP_10B: Self = Self(sys::RK_FORMAT_YCbCr_420_SP_10B);
    pub const YCBCR_422_SP_10B: Self = Self(sys::RK_FORMAT_YCbCr_422_SP_10B);
    pub const BGR_565: Self = Self(sys::RK_FORMAT_BGR_565);
    pub const BGRA_5551: Self = Self(sys::RK_FORMAT_BGRA_5551);
    pub const ARGB_8888: Self = Self(sys::RK_FORMAT_ARGB_8888);
    pub const ABGR_8888: Self = Self(sys::RK_FORMAT_ABGR_8888);
    pub const YCBCR_444_SP: Self = Self(sys::RK_FORMAT_YCbCr_444_SP);
    pub const YCRCB_444_SP: Self = Self(sys::RK_FORMAT_YCrCb_444_SP);
}

impl fmt::Display for RgaFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0 >> 8)
    }
}

/// Host pixel formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray8,
    Yuv420p,
    Yuvj420p,
    Yuv422p,
    Yuvj422p,
    Nv12,
    Nv21,
    Nv16,
    Nv24,
    Nv42,
    P010,
    P210,
    /// 10-bit compact 4:2:0 semi-planar (NV12 layout, 10 bits packed)
    Nv15,
    /// 10-bit compact 4:2:2 semi-planar
    Nv20,
    Yuyv422,
    Yvyu422,
    Uyvy422,
    Rgb555,
    Bgr555,
    Rgb565,
    Bgr565,
    Rgb24,
    Bgr24,
    Rgba,
    Rgb0,
    Bgra,
    Bgr0,
    Argb,
    Xrgb,
    Abgr,
    Xbgr,
}

/// Static layout properties of a [`PixelFormat`].
#[derive(Debug, Clone, Copy)]
pub struct PixelDescriptor {
    pub name: &'static str,
    pub rgb: bool,
    /// Luma and chroma live in separate planes (semi-planar included).
    pub planar: bool,
    /// Chroma U and V live in separate planes.
    pub fully_planar: bool,
    pub alpha: bool,
    pub components: u8,
    /// Bit depth of the first component.
    pub depth: u8,
    pub log2_chroma_w: u8,
    pub log2_chroma_h: u8,
    /// Padded bits per pixel, averaged over the chroma subsampling.
    pub bits_pp: u32,
    pub planes: u8,
    /// Largest byte step per pixel of each plane.
    pub steps: [u8; 3],
    pub drm: u32,
}

const fn yuv(
    name: &'static str,
    planes: u8,
    fully_planar: bool,
    depth: u8,
    chroma: (u8, u8),
    bits_pp: u32,
    steps: [u8; 3],
    drm: u32,
) -> PixelDescriptor {
    PixelDescriptor {
        name,
        rgb: false,
        planar: planes > 1,
        fully_planar,
        alpha: false,
        components: 3,
        depth,
        log2_chroma_w: chroma.0,
        log2_chroma_h: chroma.1,
        bits_pp,
        planes,
        steps,
        drm,
    }
}

const fn rgb(
    name: &'static str,
    components: u8,
    alpha: bool,
    depth: u8,
    bits_pp: u32,
    drm: u32,
) -> PixelDescriptor {
    PixelDescriptor {
        name,
        rgb: true,
        planar: false,
        fully_planar: false,
        alpha,
        components,
        depth,
        log2_chroma_w: 0,
        log2_chroma_h: 0,
        bits_pp,
        planes: 1,
        steps: [(bits_pp / 8) as u8, 0, 0],
        drm,
    }
}

// Indexed by `PixelFormat as usize`.
static DESCRIPTORS: [PixelDescriptor; 31] = [
    PixelDescriptor {
        name: "gray",
        rgb: false,
        planar: false,
        fully_planar: false,
        alpha: false,
        components: 1,
        depth: 8,
        log2_chroma_w: 0,
        log2_chroma_h: 0,
        bits_pp: 8,
        planes: 1,
        steps: [1, 0, 0],
        drm: DRM_FORMAT_R8,
    },
    yuv("yuv420p", 3, true, 8, (1, 1), 12, [1, 1, 1], DRM_FORMAT_YUV420),
    yuv("yuvj420p", 3, true, 8, (1, 1), 12, [1, 1, 1], DRM_FORMAT_YUV420),
    yuv("yuv422p", 3, true, 8, (1, 0), 16, [1, 1, 1], DRM_FORMAT_YUV422),
    yuv("yuvj422p", 3, true, 8, (1, 0), 16, [1, 1, 1], DRM_FORMAT_YUV422),
    yuv("nv12", 2, false, 8, (1, 1), 12, [1, 2, 0], DRM_FORMAT_NV12),
    yuv("nv21", 2, false, 8, (1, 1), 12, [1, 2, 0], DRM_FORMAT_NV21),
    yuv("nv16", 2, false, 8, (1, 0), 16, [1, 2, 0], DRM_FORMAT_NV16),
    yuv("nv24", 2, false, 8, (0, 0), 24, [1, 2, 0], DRM_FORMAT_NV24),
    yuv("nv42", 2, false, 8, (0, 0), 24, [1, 2, 0], DRM_FORMAT_NV42),
    yuv("p010le", 2, false, 10, (1, 1), 24, [2, 4, 0], DRM_FORMAT_P010),
    yuv("p210le", 2, false, 10, (1, 0), 32, [2, 4, 0], DRM_FORMAT_P210),
    // Bitstream layouts, linesize is computed separately.
    yuv("nv15", 2, false, 10, (1, 1), 15, [0, 0, 0], DRM_FORMAT_NV15),
    yuv("nv20", 2, false, 10, (1, 0), 20, [0, 0, 0], DRM_FORMAT_NV20),
    yuv("yuyv422", 1, false, 8, (1, 0), 16, [2, 0, 0], DRM_FORMAT_YUYV),
    yuv("yvyu422", 1, false, 8, (1, 0), 16, [2, 0, 0], DRM_FORMAT_YVYU),
    yuv("uyvy422", 1, false, 8, (1, 0), 16, [2, 0, 0], DRM_FORMAT_UYVY),
    rgb("rgb555le", 3, false, 5, 16, DRM_FORMAT_XRGB1555),
    rgb("bgr555le", 3, false, 5, 16, DRM_FORMAT_XBGR1555),
    rgb("rgb565le", 3, false, 5, 16, DRM_FORMAT_RGB565),
    rgb("bgr565le", 3, false, 5, 16, DRM_FORMAT_BGR565),
    rgb("rgb24", 3, false, 8, 24, DRM_FORMAT_BGR888),
    rgb("bgr24", 3, false, 8, 24, DRM_FORMAT_RGB888),
    rgb("rgba", 4, true, 8, 32, DRM_FORMAT_ABGR8888),
    rgb("rgb0", 3, false, 8, 32, DRM_FORMAT_XBGR8888),
    rgb("bgra", 4, true, 8, 32, DRM_FORMAT_ARGB8888),
    rgb("bgr0", 3, false, 8, 32, DRM_FORMAT_XRGB8888),
    rgb("argb", 4, true, 8, 32, DRM_FORMAT_BGRA8888),
    rgb("0rgb", 3, false, 8, 32, DRM_FORMAT_BGRX8888),
    rgb("abgr", 4, true, 8, 32, DRM_FORMAT_RGBA8888),
    rgb("0bgr", 3, false, 8, 32, DRM_FORMAT_RGBX8888),
];

impl PixelFormat {
    pub const ALL: [PixelFormat; 31] = [
        PixelFormat::Gray8,
        PixelFormat::Yuv420p,
        PixelFormat::Yuvj420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuvj422p,
        PixelFormat::Nv12,
        PixelFormat::Nv21,
        PixelFormat::Nv16,
        PixelFormat::Nv24,
        PixelFormat::Nv42,
        PixelFormat::P010,
        PixelFormat::P210,
        PixelFormat::Nv15,
        PixelFormat::Nv20,
        PixelFormat::Yuyv422,
        PixelFormat::Yvyu422,
        PixelFormat::Uyvy422,
        PixelFormat::Rgb555,
        PixelFormat::Bgr555,
        PixelFormat::Rgb565,
        PixelFormat::Bgr565,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Rgba,
        PixelFormat::Rgb0,
        PixelFormat::Bgra,
        PixelFormat::Bgr0,
        PixelFormat::Argb,
        PixelFormat::Xrgb,
        PixelFormat::Abgr,
        PixelFormat::Xbgr,
    ];

    pub fn descriptor(self) -> &'static PixelDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn is_rgb(self) -> bool {
        self.descriptor().rgb
    }

    pub fn is_planar(self) -> bool {
        self.descriptor().planar
    }

    pub fn has_alpha(self) -> bool {
        self.descriptor().alpha
    }

    pub fn is_yuv(self) -> bool {
        let desc = self.descriptor();
        !desc.rgb && desc.components >= 2
    }

    pub fn depth(self) -> u8 {
        self.descriptor().depth
    }

    /// Bytes per pixel, fractional for sub-byte packed layouts.
    pub fn bytes_pp(self) -> f32 {
        self.descriptor().bits_pp as f32 / 8.0
    }

    /// 10-bit MSB aligned layouts that RGA must expand.
    pub fn is_uncompact_10bit(self) -> bool {
        matches!(self, PixelFormat::P010 | PixelFormat::P210)
    }

    pub fn is_full_range(self) -> bool {
        matches!(self, PixelFormat::Yuvj420p | PixelFormat::Yuvj422p)
    }

    /// Linear DRM fourcc.
    pub fn drm_format(self) -> u32 {
        self.descriptor().drm
    }

    /// Canonical AFBC fourcc, see the kernel AFBC documentation.
    pub fn drm_afbc_format(self) -> Option<u32> {
        match self {
            PixelFormat::Nv12 => Some(DRM_FORMAT_YUV420_8BIT),
            PixelFormat::Nv15 => Some(DRM_FORMAT_YUV420_10BIT),
            PixelFormat::Nv16 => Some(DRM_FORMAT_YUYV),
            PixelFormat::Nv20 => Some(DRM_FORMAT_Y210),
            PixelFormat::Nv24 => Some(DRM_FORMAT_VUY888),
            PixelFormat::Rgb565 => Some(DRM_FORMAT_RGB565),
            PixelFormat::Bgr565 => Some(DRM_FORMAT_BGR565),
            PixelFormat::Rgb24 => Some(DRM_FORMAT_RGB888),
            PixelFormat::Bgr24 => Some(DRM_FORMAT_BGR888),
            PixelFormat::Rgba => Some(DRM_FORMAT_ABGR8888),
            PixelFormat::Rgb0 => Some(DRM_FORMAT_XBGR8888),
            PixelFormat::Bgra => Some(DRM_FORMAT_ARGB8888),
            PixelFormat::Bgr0 => Some(DRM_FORMAT_XRGB8888),
            _ => None,
        }
    }

    /// RFBC fourcc; Rockchip's row compression only covers YUV.
    pub fn drm_rfbc_format(self) -> Option<u32> {
        match self {
            PixelFormat::Nv12
            | PixelFormat::Nv15
            | PixelFormat::Nv16
            | PixelFormat::Nv20
            | PixelFormat::Nv24 => self.drm_afbc_format(),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        let alias = match s.as_str() {
            "gray8" => "gray",
            "p010" => "p010le",
            "p210" => "p210le",
            "rgb555" => "rgb555le",
            "bgr555" => "bgr555le",
            "rgb565" => "rgb565le",
            "bgr565" => "bgr565le",
            "yuyv" => "yuyv422",
            "yvyu" => "yvyu422",
            "uyvy" => "uyvy422",
            other => other,
        };
        PixelFormat::ALL
            .iter()
            .copied()
            .find(|fmt| fmt.name() == alias)
            .ok_or_else(|| format!("unknown pixel format '{s}'"))
    }
}

static MAIN_FORMATS: [(PixelFormat, RgaFormat); 31] = [
    (PixelFormat::Gray8, RgaFormat::YCBCR_400),
    (PixelFormat::Yuv420p, RgaFormat::YCBCR_420_P),
    (PixelFormat::Yuvj420p, RgaFormat::YCBCR_420_P),
    (PixelFormat::Yuv422p, RgaFormat::YCBCR_422_P),
    (PixelFormat::Yuvj422p, RgaFormat::YCBCR_422_P),
    (PixelFormat::Nv12, RgaFormat::YCBCR_420_SP),
    (PixelFormat::Nv21, RgaFormat::YCRCB_420_SP),
    (PixelFormat::Nv16, RgaFormat::YCBCR_422_SP),
    (PixelFormat::Nv24, RgaFormat::YCBCR_444_SP),
    (PixelFormat::Nv42, RgaFormat::YCRCB_444_SP),
    (PixelFormat::P010, RgaFormat::YCBCR_420_SP_10B),
    (PixelFormat::P210, RgaFormat::YCBCR_422_SP_10B),
    (PixelFormat::Nv15, RgaFormat::YCBCR_420_SP_10B),
    (PixelFormat::Nv20, RgaFormat::YCBCR_422_SP_10B),
    (PixelFormat::Yuyv422, RgaFormat::YUYV_422),
    (PixelFormat::Yvyu422, RgaFormat::YVYU_422),
    (PixelFormat::Uyvy422, RgaFormat::UYVY_422),
    (PixelFormat::Rgb555, RgaFormat::BGRA_5551),
    (PixelFormat::Bgr555, RgaFormat::RGBA_5551),
    (PixelFormat::Rgb565, RgaFormat::BGR_565),
    (PixelFormat::Bgr565, RgaFormat::RGB_565),
    (PixelFormat::Rgb24, RgaFormat::RGB_888),
    (PixelFormat::Bgr24, RgaFormat::BGR_888),
    (PixelFormat::Rgba, RgaFormat::RGBA_8888),
    // RGBX_8888 would push multicore hardware onto RGA2
    (PixelFormat::Rgb0, RgaFormat::RGBA_8888),
    (PixelFormat::Bgra, RgaFormat::BGRA_8888),
    (PixelFormat::Bgr0, RgaFormat::BGRA_8888),
    (PixelFormat::Argb, RgaFormat::ARGB_8888),
    (PixelFormat::Xrgb, RgaFormat::ARGB_8888),
    (PixelFormat::Abgr, RgaFormat::ABGR_8888),
    (PixelFormat::Xbgr, RgaFormat::ABGR_8888),
];

// The overlay table is the RGB tail of the main table.
const FIRST_RGB_ENTRY: usize = 17;

/// Which lookup table a pad uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTable {
    Main,
    Overlay,
}

impl FormatTable {
    pub fn for_role(role: FrameRole) -> Self {
        match role {
            FrameRole::Source | FrameRole::Destination => FormatTable::Main,
            FrameRole::Pattern | FrameRole::PatternPreprocessed => FormatTable::Overlay,
        }
    }

    pub fn entries(self) -> &'static [(PixelFormat, RgaFormat)] {
        match self {
            FormatTable::Main => &MAIN_FORMATS,
            FormatTable::Overlay => &MAIN_FORMATS[FIRST_RGB_ENTRY..],
        }
    }
}

/// Looks up the native format for `format` in the table used by `role`.
pub fn map_to_native(format: PixelFormat, role: FrameRole) -> Option<RgaFormat> {
    FormatTable::for_role(role)
        .entries()
        .iter()
        .find(|(pix, _)| *pix == format)
        .map(|(_, rga)| *rga)
}

/// Reverse lookup: the first host format of the table mapping to `native`.
pub fn map_from_native(native: RgaFormat, role: FrameRole) -> Option<PixelFormat> {
    FormatTable::for_role(role)
        .entries()
        .iter()
        .find(|(_, rga)| *rga == native)
        .map(|(pix, _)| *pix)
}
