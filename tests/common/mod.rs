// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use edgefirst_rga::{
    device::{RgaDevice, RgaInfo, SyncMode},
    error::{Error, Result},
    format::PixelFormat,
    frame::{buffer_size, BufferPool, DrmDescriptor, Frame, FrameRequest, FrameSink},
};
use std::{
    io,
    os::fd::RawFd,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc, Mutex,
    },
};

/// RK3588: two RGA3 cores plus an RGA2 Enhance core.
pub const RK3588: &str = "RGA_3 RGA_2_Enhance";
/// RK3568: a single RGA2 Enhance core.
pub const RK3568: &str = "RGA_2_Enhance";
pub const RGA2_LITE: &str = "RGA_2_lite";
pub const RGA2_PRO: &str = "RGA_2_PRO";
pub const RGA3_ONLY: &str = "RGA_3";

#[derive(Debug, Clone)]
pub struct Blit {
    pub src: RgaInfo,
    pub dst: RgaInfo,
    pub pat: Option<RgaInfo>,
}

#[derive(Debug, Default)]
pub struct DeviceLog {
    pub blits: Vec<Blit>,
    pub synced: Vec<RawFd>,
}

/// Records every call instead of touching hardware.
pub struct MockDevice {
    version: String,
    log: Arc<Mutex<DeviceLog>>,
    next_fence: AtomicI32,
    fail_blit: Option<i32>,
    fail_sync: bool,
    bad_fence: bool,
}

impl MockDevice {
    pub fn new(version: &str) -> (Self, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let device = Self {
            version: version.to_owned(),
            log: log.clone(),
            next_fence: AtomicI32::new(100),
            fail_blit: None,
            fail_sync: false,
            bad_fence: false,
        };
        (device, log)
    }

    pub fn failing_blit(mut self, status: i32) -> Self {
        self.fail_blit = Some(status);
        self
    }

    pub fn failing_sync(mut self) -> Self {
        self.fail_sync = true;
        self
    }

    pub fn without_fences(mut self) -> Self {
        self.bad_fence = true;
        self
    }
}

impl RgaDevice for MockDevice {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn blit(
        &self,
        src: &RgaInfo,
        dst: &mut RgaInfo,
        pat: Option<&RgaInfo>,
    ) -> std::result::Result<(), i32> {
        if let Some(status) = self.fail_blit {
            return Err(status);
        }
        if dst.sync_mode == SyncMode::Async {
            dst.out_fence_fd = if self.bad_fence {
                -1
            } else {
                self.next_fence.fetch_add(1, Ordering::SeqCst)
            };
        }
        self.log.lock().unwrap().blits.push(Blit {
            src: *src,
            dst: *dst,
            pat: pat.copied(),
        });
        Ok(())
    }

    fn sync(&self, fence: RawFd) -> io::Result<()> {
        self.log.lock().unwrap().synced.push(fence);
        if self.fail_sync {
            return Err(io::Error::other("fence signalled an error"));
        }
        Ok(())
    }
}

/// Hands out frames with made-up fds and the hardware pool layout.
#[derive(Default)]
pub struct MockPool {
    requests: Arc<Mutex<Vec<FrameRequest>>>,
    next_fd: AtomicI32,
    fail: bool,
}

impl MockPool {
    pub fn new() -> (Self, Arc<Mutex<Vec<FrameRequest>>>) {
        let pool = Self {
            next_fd: AtomicI32::new(1000),
            ..Default::default()
        };
        let requests = pool.requests.clone();
        (pool, requests)
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl BufferPool for MockPool {
    fn allocate(&self, request: &FrameRequest) -> Result<Frame> {
        if self.fail {
            return Err(Error::Allocation("pool exhausted".to_owned()));
        }
        self.requests.lock().unwrap().push(*request);
        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        Ok(drm_frame(request.width, request.height, request.format, fd))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Collected {
    pub frames: Arc<Mutex<Vec<Arc<Frame>>>>,
    pub end_of_stream: Arc<Mutex<usize>>,
}

impl Collected {
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn pts(&self) -> Vec<Option<i64>> {
        self.frames.lock().unwrap().iter().map(|f| f.pts).collect()
    }

    pub fn eos(&self) -> usize {
        *self.end_of_stream.lock().unwrap()
    }
}

pub struct CollectSink(pub Collected);

impl CollectSink {
    pub fn new() -> (Self, Collected) {
        let collected = Collected::default();
        (Self(collected.clone()), collected)
    }
}

impl FrameSink for CollectSink {
    fn deliver(&mut self, frame: Arc<Frame>) -> Result<()> {
        self.0.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn end_of_stream(&mut self) {
        *self.0.end_of_stream.lock().unwrap() += 1;
    }
}

/// A linear DRM frame with the hardware pool layout.
pub fn drm_frame(width: u32, height: u32, format: PixelFormat, fd: RawFd) -> Frame {
    let size = buffer_size(format, width, height);
    let desc = DrmDescriptor::linear(format, width, height, fd, size);
    Frame::from_drm(width, height, format, desc)
}

pub fn input(width: u32, height: u32, format: PixelFormat, pts: i64) -> Arc<Frame> {
    Arc::new(drm_frame(width, height, format, 10 + pts as RawFd).with_pts(pts))
}
