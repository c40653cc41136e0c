// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Zero-copy host frames.
//!
//! A [`Frame`] carries a DRM PRIME layout descriptor (dma-buf fds, plane
//! offsets and pitches, a format modifier) and never a CPU copy of the
//! pixels. Frames are shared as `Arc<Frame>` between the host, the engine's
//! frame pools and downstream consumers; dropping the last reference closes
//! the owned dma-buf, if any.

use crate::{
    error::{Error, Result},
    format::PixelFormat,
};
use dma_buf::DmaBuf;
use dma_heap::{Heap, HeapKind};
use libc::{dup, mmap, munmap, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
use std::{
    ffi::c_void,
    fmt, io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
    ptr::null_mut,
    slice::{from_raw_parts, from_raw_parts_mut},
    sync::Arc,
};
use tracing::{debug, warn};

pub const DRM_FORMAT_MOD_LINEAR: u64 = 0;
pub const DRM_FORMAT_MOD_VENDOR_ARM: u64 = 0x08;
pub const DRM_FORMAT_MOD_VENDOR_ROCKCHIP: u64 = 0x0b;
pub const AFBC_FORMAT_MOD_BLOCK_SIZE_16X16: u64 = 1;
pub const AFBC_FORMAT_MOD_SPARSE: u64 = 1 << 6;
pub const ROCKCHIP_RFBC_BLOCK_SIZE_64X4: u64 = 2;
const DRM_FORMAT_MOD_ARM_TYPE_AFBC: u64 = 0x00;
const DRM_FORMAT_MOD_ROCKCHIP_TYPE_RFBC: u64 = 0x01;

/// ARM frame buffer compression modifier with the given AFBC flags.
pub const fn afbc_modifier(flags: u64) -> u64 {
    (DRM_FORMAT_MOD_VENDOR_ARM << 56) | (DRM_FORMAT_MOD_ARM_TYPE_AFBC << 52) | flags
}

/// Rockchip row-based frame buffer compression modifier.
pub const fn rfbc_modifier(block_size: u64) -> u64 {
    (DRM_FORMAT_MOD_VENDOR_ROCKCHIP << 56) | (DRM_FORMAT_MOD_ROCKCHIP_TYPE_RFBC << 52) | block_size
}

/// Modifier written on AFBC output frames.
pub const AFBC_OUTPUT_MODIFIER: u64 =
    afbc_modifier(AFBC_FORMAT_MOD_SPARSE | AFBC_FORMAT_MOD_BLOCK_SIZE_16X16);

/// Rectangle in pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: i32,
    /// Y coordinate of top-left corner
    pub y: i32,
    /// Width of the rectangle in pixels
    pub width: i32,
    /// Height of the rectangle in pixels
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    #[default]
    Unspecified,
    /// Limited (MPEG/TV) range
    Limited,
    /// Full (JPEG/PC) range
    Full,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    #[default]
    Unspecified,
    Bt709,
    /// BT.601 625-line, the colorimetry tag used for BT.601 content
    Bt470bg,
    Smpte170m,
    Bt2020Ncl,
}

/// Colorimetry tags carried alongside a frame.
///
/// Transfer characteristics and primaries are kept as raw ITU-T H.273 code
/// points, `None` meaning unspecified.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ColorInfo {
    pub range: ColorRange,
    pub space: ColorSpace,
    pub transfer: Option<u8>,
    pub primaries: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrmObject {
    pub fd: RawFd,
    pub size: usize,
    pub format_modifier: u64,
}

impl DrmObject {
    pub fn is_afbc(&self) -> bool {
        self.format_modifier >> 52 == (DRM_FORMAT_MOD_ARM_TYPE_AFBC | (DRM_FORMAT_MOD_VENDOR_ARM << 4))
    }

    pub fn is_rfbc(&self) -> bool {
        self.format_modifier >> 52
            == (DRM_FORMAT_MOD_ROCKCHIP_TYPE_RFBC | (DRM_FORMAT_MOD_VENDOR_ROCKCHIP << 4))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrmPlane {
    pub object_index: usize,
    pub offset: usize,
    pub pitch: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmLayer {
    /// DRM fourcc
    pub format: u32,
    pub planes: Vec<DrmPlane>,
}

/// DRM PRIME frame descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmDescriptor {
    pub objects: Vec<DrmObject>,
    pub layers: Vec<DrmLayer>,
}

impl DrmDescriptor {
    /// Linear single-object layout used by the hardware buffer pools.
    ///
    /// Plane 0 starts at offset zero; each following plane is stacked after
    /// the previous one's `pitch * rows`.
    pub fn linear(format: PixelFormat, width: u32, height: u32, fd: RawFd, size: usize) -> Self {
        let desc = format.descriptor();
        let planes = desc.planes as usize;
        let mut layout: Vec<DrmPlane> = Vec::with_capacity(planes);
        for plane in 0..planes {
            let offset = match layout.last() {
                None => 0,
                Some(prev) => {
                    let rows = if plane > 1 {
                        height >> desc.log2_chroma_h
                    } else {
                        height
                    };
                    prev.offset + prev.pitch * rows as usize
                }
            };
            layout.push(DrmPlane {
                object_index: 0,
                offset,
                pitch: aligned_linesize(format, width, plane),
            });
        }

        Self {
            objects: vec![DrmObject {
                fd,
                size,
                format_modifier: DRM_FORMAT_MOD_LINEAR,
            }],
            layers: vec![DrmLayer {
                format: format.drm_format(),
                planes: layout,
            }],
        }
    }
}

fn align(value: usize, to: usize) -> usize {
    value.div_ceil(to) * to
}

/// Bytes of one unpadded row of `plane`. Zero for the bitstream 10-bit
/// layouts, which have no per-sample step.
pub fn linesize(format: PixelFormat, width: u32, plane: usize) -> usize {
    let desc = format.descriptor();
    let shift = if plane > 0 { desc.log2_chroma_w } else { 0 };
    let samples = (width as usize).div_ceil(1 << shift);
    samples * desc.steps.get(plane).copied().unwrap_or(0) as usize
}

/// Plane pitch in bytes as laid out by the hardware buffer pools.
///
/// Packed formats align the pixel count to 8, planar formats align bytes to
/// 64. The compact 10-bit formats use the decoder's 256-odd alignment.
pub fn aligned_linesize(format: PixelFormat, width: u32, plane: usize) -> usize {
    if matches!(format, PixelFormat::Nv15 | PixelFormat::Nv20) {
        let log2_chroma_w = if plane == 1 { 1 } else { 0 };
        let width_align_256_odds = align((width as usize) << log2_chroma_w, 256) | 256;
        return align(width_align_256_odds * 10 / 8, 64);
    }

    let linesize = linesize(format, width, plane);
    let desc = format.descriptor();
    if desc.rgb || !desc.planar {
        let pixel_width = (desc.bits_pp / 8) as usize;
        align(linesize / pixel_width, 8) * pixel_width
    } else {
        align(linesize, 64)
    }
}

/// Buffer size reserved for a frame, with headroom for the decoder's
/// alignment padding.
pub fn buffer_size(format: PixelFormat, width: u32, height: u32) -> usize {
    let aligned_w = align(width as usize * 6 / 5, 64);
    let aligned_h = align(height as usize * 6 / 5, 64);
    aligned_w * aligned_h * format.descriptor().bits_pp as usize / 8
}

#[derive(Debug)]
enum FrameStorage {
    Drm(DrmDescriptor),
    System(Vec<u8>),
}

/// A host video frame.
///
/// # Example
///
/// ```
/// use edgefirst_rga::{format::PixelFormat, frame::{DrmDescriptor, Frame}};
///
/// let desc = DrmDescriptor::linear(PixelFormat::Nv12, 1920, 1080, 3, 1 << 22);
/// let frame = Frame::from_drm(1920, 1080, PixelFormat::Nv12, desc);
/// assert_eq!(frame.drm().unwrap().layers[0].planes.len(), 2);
/// ```
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    storage: FrameStorage,
    backing: Option<OwnedFd>,
    pub pts: Option<i64>,
    pub color: ColorInfo,
    /// Rows of decoder padding above the picture (compressed inputs only).
    pub crop_top: u32,
}

impl Frame {
    /// Wraps an existing DRM PRIME descriptor. The fds are borrowed; the
    /// caller keeps them open for the frame's lifetime.
    pub fn from_drm(width: u32, height: u32, format: PixelFormat, desc: DrmDescriptor) -> Self {
        Self {
            width,
            height,
            format,
            storage: FrameStorage::Drm(desc),
            backing: None,
            pts: None,
            color: ColorInfo::default(),
            crop_top: 0,
        }
    }

    /// A frame in CPU memory. The engine rejects these; they exist so hosts
    /// can pass everything through one type.
    pub fn from_system(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            storage: FrameStorage::System(data),
            backing: None,
            pts: None,
            color: ColorInfo::default(),
            crop_top: 0,
        }
    }

    /// Hands ownership of the dma-buf behind object 0 to the frame.
    pub fn with_backing(mut self, fd: OwnedFd) -> Self {
        self.backing = Some(fd);
        self
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    pub fn with_color(mut self, color: ColorInfo) -> Self {
        self.color = color;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn drm(&self) -> Option<&DrmDescriptor> {
        match &self.storage {
            FrameStorage::Drm(desc) => Some(desc),
            FrameStorage::System(_) => None,
        }
    }

    pub fn drm_mut(&mut self) -> Option<&mut DrmDescriptor> {
        match &mut self.storage {
            FrameStorage::Drm(desc) => Some(desc),
            FrameStorage::System(_) => None,
        }
    }

    pub fn system_data(&self) -> Option<&[u8]> {
        match &self.storage {
            FrameStorage::System(data) => Some(data),
            FrameStorage::Drm(_) => None,
        }
    }

    /// Copies timestamp and colorimetry from `src`.
    pub fn copy_props(&mut self, src: &Frame) {
        self.pts = src.pts;
        self.color = src.color;
        self.crop_top = 0;
    }

    /// The dma-buf behind object 0.
    pub fn dmabuf(&self) -> Result<DmaBuf> {
        let fd = self.object_fd()?;
        let dup_fd = unsafe { dup(fd) };
        if dup_fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(unsafe { DmaBuf::from_raw_fd(dup_fd) })
    }

    fn object_fd(&self) -> Result<RawFd> {
        self.drm()
            .and_then(|desc| desc.objects.first())
            .map(|obj| obj.fd)
            .filter(|fd| *fd >= 0)
            .ok_or_else(|| Error::InvalidFrame("frame has no dma-buf object".to_owned()))
    }

    /// Maps object 0 into the process for CPU access.
    pub fn mmap(&self) -> Result<MappedFrame> {
        let fd = self.object_fd()?;
        let len = self
            .drm()
            .and_then(|desc| desc.objects.first())
            .map_or(0, |obj| obj.size);
        let mmap = unsafe {
            mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd,
                0,
            )
        };
        if mmap == MAP_FAILED {
            return Err(io::Error::last_os_error().into());
        }
        Ok(MappedFrame {
            mmap: mmap as *mut u8,
            len,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.storage {
            FrameStorage::Drm(desc) => write!(
                f,
                "{}x{} {} fd:{:?} mod:0x{:x}",
                self.width,
                self.height,
                self.format,
                desc.objects.first().map(|obj| obj.fd),
                desc.objects.first().map_or(0, |obj| obj.format_modifier),
            ),
            FrameStorage::System(data) => write!(
                f,
                "{}x{} {} system:{}",
                self.width,
                self.height,
                self.format,
                data.len()
            ),
        }
    }
}

/// Memory-mapped view of a [`Frame`]'s first dma-buf object.
///
/// Hardware writes must have completed (the frame was delivered) before the
/// mapping is read.
pub struct MappedFrame {
    mmap: *mut u8,
    len: usize,
}

impl MappedFrame {
    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.mmap, self.len) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.mmap, self.len) }
    }
}

impl Drop for MappedFrame {
    fn drop(&mut self) {
        if unsafe { munmap(self.mmap.cast::<c_void>(), self.len) } != 0 {
            warn!("unmap failed!");
        }
    }
}

/// Geometry and format of a buffer to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Host buffer pool handing out zero-copy frames.
pub trait BufferPool {
    fn allocate(&self, request: &FrameRequest) -> Result<Frame>;
}

/// [`BufferPool`] backed by a Linux DMA heap.
pub struct DmaHeapPool {
    heap: Heap,
}

impl DmaHeapPool {
    /// Opens the CMA heap, which the RGA2 MMU-less cores require.
    pub fn new() -> Result<Self> {
        Self::with_kind(HeapKind::Cma)
    }

    pub fn with_kind(kind: HeapKind) -> Result<Self> {
        let heap = Heap::new(kind).map_err(|err| Error::Allocation(err.to_string()))?;
        Ok(Self { heap })
    }
}

impl BufferPool for DmaHeapPool {
    fn allocate(&self, request: &FrameRequest) -> Result<Frame> {
        let size = buffer_size(request.format, request.width, request.height);
        let fd = self
            .heap
            .allocate(size)
            .map_err(|err| Error::Allocation(err.to_string()))?;
        let desc = DrmDescriptor::linear(
            request.format,
            request.width,
            request.height,
            fd.as_raw_fd(),
            size,
        );
        debug!(
            width = request.width,
            height = request.height,
            format = %request.format,
            size,
            "dma heap frame alloc'd"
        );
        Ok(Frame::from_drm(request.width, request.height, request.format, desc).with_backing(fd))
    }
}

/// Downstream consumer of completed frames.
pub trait FrameSink {
    /// Receives one completed frame; called in submission order.
    fn deliver(&mut self, frame: Arc<Frame>) -> Result<()>;

    /// No more frames will follow until the next submission.
    fn end_of_stream(&mut self) {}
}

impl<F> FrameSink for F
where
    F: FnMut(Arc<Frame>) -> Result<()>,
{
    fn deliver(&mut self, frame: Arc<Frame>) -> Result<()> {
        self(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_linear_layout() {
        let desc = DrmDescriptor::linear(PixelFormat::Nv12, 1920, 1080, 3, 0);
        let planes = &desc.layers[0].planes;
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].pitch, 1920);
        assert_eq!(planes[1].offset, 1920 * 1080);
        assert_eq!(planes[1].pitch, 1920);
    }

    #[test]
    fn packed_pitch_aligns_pixels() {
        // 100 px of RGB24 rounds up to 104 px.
        assert_eq!(aligned_linesize(PixelFormat::Rgb24, 100, 0), 104 * 3);
        assert_eq!(aligned_linesize(PixelFormat::Yuyv422, 1280, 0), 2560);
        assert_eq!(aligned_linesize(PixelFormat::Rgba, 200, 0), 800);
    }

    #[test]
    fn planar_pitch_aligns_bytes() {
        assert_eq!(aligned_linesize(PixelFormat::Nv12, 1000, 0), 1024);
        assert_eq!(aligned_linesize(PixelFormat::Yuv420p, 1920, 1), 960);
        assert_eq!(aligned_linesize(PixelFormat::P010, 1920, 0), 3840);
    }

    #[test]
    fn yuv420p_third_plane_uses_chroma_rows() {
        let desc = DrmDescriptor::linear(PixelFormat::Yuv420p, 1920, 1080, 3, 0);
        let planes = &desc.layers[0].planes;
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[1].offset, 1920 * 1080);
        assert_eq!(planes[2].offset, 1920 * 1080 + 960 * 540);
    }

    #[test]
    fn compression_tags() {
        let afbc = DrmObject {
            fd: 3,
            size: 0,
            format_modifier: AFBC_OUTPUT_MODIFIER,
        };
        assert!(afbc.is_afbc());
        assert!(!afbc.is_rfbc());
        assert_eq!(AFBC_OUTPUT_MODIFIER, 0x0800_0000_0000_0041);

        let rfbc = DrmObject {
            format_modifier: rfbc_modifier(ROCKCHIP_RFBC_BLOCK_SIZE_64X4),
            ..afbc
        };
        assert!(rfbc.is_rfbc());
        assert!(!rfbc.is_afbc());
    }
}
