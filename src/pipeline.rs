// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bounded FIFO of submitted operations.
//!
//! Up to `depth` operations stay in flight; the oldest is waited on and
//! delivered once the FIFO grows past that. Depth zero degenerates to
//! submit-then-wait for every frame.

use crate::{
    device::{RgaDevice, RgaInfo, SyncMode},
    error::{Error, Result},
    frame::FrameSink,
    pool::{FramePools, SlotId},
};
use std::collections::VecDeque;
use tracing::{error, trace, warn};

/// Slots referenced by one submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub src: SlotId,
    pub dst: SlotId,
    pub pat: Option<SlotId>,
}

/// Issues one blit and checks the async contract.
pub fn call_blit(
    device: &dyn RgaDevice,
    src: &RgaInfo,
    dst: &mut RgaInfo,
    pat: Option<&RgaInfo>,
) -> Result<()> {
    if let Err(ret) = device.blit(src, dst, pat) {
        error!("RGA blit failed: {ret}");
        return Err(Error::Blit(ret));
    }
    if dst.sync_mode == SyncMode::Async && dst.out_fence_fd <= 0 {
        error!("RGA async blit returned invalid fence_fd: {}", dst.out_fence_fd);
        return Err(Error::InvalidFence(dst.out_fence_fd));
    }
    Ok(())
}

fn set_locked(pools: &mut FramePools, entry: &InFlight, locked: bool) {
    pools.source.set_locked(entry.src, locked);
    pools.destination.set_locked(entry.dst, locked);
    if let Some(pat) = entry.pat {
        pools.pattern.set_locked(pat, locked);
    }
}

/// Waits on an entry's fence. The fence is consumed either way.
fn wait(device: &dyn RgaDevice, pools: &mut FramePools, entry: &InFlight) -> Result<()> {
    let info = pools.destination.info_mut(entry.dst);
    let fence = info.out_fence_fd;
    info.out_fence_fd = -1;
    if info.sync_mode == SyncMode::Sync {
        return Ok(());
    }
    device.sync(fence).map_err(|err| Error::Sync(err.to_string()))
}

#[derive(Debug)]
pub struct AsyncPipeline {
    fifo: VecDeque<InFlight>,
    depth: usize,
}

impl AsyncPipeline {
    pub fn new(depth: usize) -> Self {
        Self {
            fifo: VecDeque::with_capacity(depth + 1),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Blits `entry` and queues it, pinning its slots until it drains.
    pub fn submit(
        &mut self,
        device: &dyn RgaDevice,
        pools: &mut FramePools,
        entry: InFlight,
    ) -> Result<()> {
        let pat = entry.pat.map(|pat| pools.pattern.info(pat));
        call_blit(
            device,
            pools.source.info(entry.src),
            pools.destination.info_mut(entry.dst),
            pat,
        )?;
        set_locked(pools, &entry, true);
        self.fifo.push_back(entry);
        trace!(in_flight = self.fifo.len(), "queued");
        Ok(())
    }

    /// Delivers the oldest entry if more than `depth` are in flight.
    /// Returns whether a frame went downstream.
    pub fn drain_over_depth(
        &mut self,
        device: &dyn RgaDevice,
        pools: &mut FramePools,
        sink: &mut dyn FrameSink,
    ) -> Result<bool> {
        if self.fifo.len() <= self.depth {
            return Ok(false);
        }
        let Some(entry) = self.fifo.pop_front() else {
            return Ok(false);
        };

        let synced = wait(device, pools, &entry);
        set_locked(pools, &entry, false);
        if let Err(err) = synced {
            error!("{err}");
            pools.destination.take_frame(entry.dst);
            return Err(err);
        }

        match pools.destination.take_frame(entry.dst) {
            Some(frame) => {
                sink.deliver(frame)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits on every entry in submission order. Completed frames go to
    /// `sink` when one is given and are dropped otherwise. A failed wait is
    /// only a warning here. Returns the number of frames delivered.
    pub fn drain_all(
        &mut self,
        device: &dyn RgaDevice,
        pools: &mut FramePools,
        mut sink: Option<&mut dyn FrameSink>,
    ) -> Result<usize> {
        let mut delivered = 0;
        while let Some(entry) = self.fifo.pop_front() {
            if let Err(err) = wait(device, pools, &entry) {
                warn!("{err}");
            }
            set_locked(pools, &entry, false);

            let frame = pools.destination.take_frame(entry.dst);
            if let (Some(sink), Some(frame)) = (sink.as_deref_mut(), frame) {
                sink.deliver(frame)?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}
