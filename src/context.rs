// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The processing context shared by [`Transform`](crate::transform::Transform)
//! and [`Composite`](crate::composite::Composite).

use crate::{
    caps::{Capabilities, SchedulerCore},
    constraint::{self, FrameInfo, PadConfig, UnitState, LARGE_FRAME_PIXELS},
    device::{RgaDevice, SyncMode},
    error::{Error, Result},
    frame::{BufferPool, Frame, FrameSink, Rect},
    pipeline::{call_blit, AsyncPipeline, InFlight},
    pool::{FramePools, FrameRole},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_ASYNC_DEPTH: usize = 2;
pub const MAX_ASYNC_DEPTH: usize = 4;

/// Options common to every RGA filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgaOptions {
    /// Scheduling-core override, zero for automatic.
    pub core: SchedulerCore,
    /// Operations kept in flight before the oldest is waited on.
    pub async_depth: usize,
    /// Emit AFBC-compressed output where possible.
    pub afbc: bool,
}

impl Default for RgaOptions {
    fn default() -> Self {
        Self {
            core: SchedulerCore::DEFAULT,
            async_depth: DEFAULT_ASYNC_DEPTH,
            afbc: false,
        }
    }
}

impl RgaOptions {
    pub fn with_core(mut self, core: SchedulerCore) -> Self {
        self.core = core;
        self
    }

    pub fn with_async_depth(mut self, async_depth: usize) -> Self {
        self.async_depth = async_depth;
        self
    }

    pub fn with_afbc(mut self, afbc: bool) -> Self {
        self.afbc = afbc;
        self
    }
}

/// Per-filter parameters, already resolved by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextParams {
    pub rotate_mode: u32,
    /// Source crop; single-input only.
    pub crop: Option<Rect>,
    pub global_alpha: u8,
    pub overlay_x: i32,
    pub overlay_y: i32,
}

/// Outcome of submitting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// At least one output went downstream during the call.
    Delivered,
    /// The frame was queued; output will follow with later frames or flush.
    NotReady,
}

/// Blend word for an overlay drawn at global `alpha`. Overlays with an
/// alpha channel are treated as premultiplied.
pub fn blend_mode(overlay_has_alpha: bool, alpha: u8) -> u32 {
    let premultiplied = overlay_has_alpha;
    if alpha > 0 && alpha < 0xff {
        let base = if premultiplied { 0x4 | (1 << 12) } else { 0x4 };
        base | (alpha as u32) << 16 | 0xff << 24
    } else if premultiplied {
        0x504
    } else {
        0x501
    }
}

pub struct RgaContext {
    pub(crate) device: Box<dyn RgaDevice>,
    pub(crate) buffers: Box<dyn BufferPool>,
    pub(crate) sink: Box<dyn FrameSink>,
    pub(crate) caps: Capabilities,
    pub(crate) inputs: Vec<FrameInfo>,
    pub(crate) output: FrameInfo,
    pub(crate) unit: UnitState,
    pub(crate) afbc_out: bool,
    pub(crate) overlay_offset_valid: bool,
    pub(crate) pools: FramePools,
    pub(crate) pipeline: AsyncPipeline,
}

impl RgaContext {
    /// Detects the hardware, validates the pads and resolves the unit.
    pub fn new(
        device: Box<dyn RgaDevice>,
        buffers: Box<dyn BufferPool>,
        sink: Box<dyn FrameSink>,
        inputs: &[PadConfig],
        output: PadConfig,
        params: &ContextParams,
        options: &RgaOptions,
    ) -> Result<Self> {
        if inputs.is_empty() || inputs.len() > 2 {
            return Err(Error::InvalidConfig(format!(
                "expected 1 or 2 inputs, got {}",
                inputs.len()
            )));
        }
        if options.async_depth > MAX_ASYNC_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "async_depth {} out of range 0..={MAX_ASYNC_DEPTH}",
                options.async_depth
            )));
        }

        let caps = Capabilities::detect(device.as_ref(), options.core)?;

        let mut async_depth = options.async_depth;
        let mut infos = Vec::with_capacity(inputs.len());
        for (index, pad) in inputs.iter().enumerate() {
            let role = if index == 0 {
                FrameRole::Source
            } else {
                FrameRole::Pattern
            };
            infos.push(FrameInfo::from_pad(pad, role)?);
            if pad.pixels() > LARGE_FRAME_PIXELS {
                async_depth = async_depth.min(1);
            }
        }

        if infos.len() == 1 {
            let src = &mut infos[0];
            src.rotate_mode = params.rotate_mode;
            if let Some(crop) = params.crop {
                src.set_crop(crop);
            }
        }

        let mut overlay_offset_valid = false;
        if infos.len() > 1 {
            let main_act = infos[0].act;
            let overlay = &mut infos[1];
            let blend = blend_mode(overlay.format.has_alpha(), params.global_alpha);
            overlay.overlay_x = params.overlay_x.max(0);
            overlay.overlay_y = params.overlay_y.max(0);
            overlay_offset_valid = params.overlay_x < main_act.width - 2
                && params.overlay_y < main_act.height - 2;
            infos[0].blend_mode = blend;
            if !overlay_offset_valid {
                warn!(
                    x = params.overlay_x,
                    y = params.overlay_y,
                    "Overlay offset is outside the main frame, frames pass through"
                );
            }
        }

        let mut out = FrameInfo::from_pad(&output, FrameRole::Destination)?;
        if output.pixels() > LARGE_FRAME_PIXELS {
            async_depth = async_depth.min(1);
        }

        let decision = constraint::resolve(&caps, &infos[0], &out, infos.get(1), infos.len())?;
        out.scheduler_core = decision.scheduler_core;

        for (index, info) in infos.iter().enumerate() {
            debug!(
                "Input{index} w:{} h:{} fmt:{} crop:{} act {}x{}+{}+{}",
                info.width,
                info.height,
                info.format,
                info.crop,
                info.act.width,
                info.act.height,
                info.act.x,
                info.act.y
            );
        }
        info!(
            "RGA {} -> {}x{} {} | rga2:{} core:{} depth:{}",
            infos[0].format,
            out.width,
            out.height,
            out.format,
            decision.rga2_used,
            out.scheduler_core,
            async_depth
        );

        Ok(Self {
            device,
            buffers,
            sink,
            caps,
            inputs: infos,
            output: out,
            unit: UnitState::new(&decision),
            afbc_out: options.afbc,
            overlay_offset_valid,
            pools: FramePools::new(),
            pipeline: AsyncPipeline::new(async_depth),
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn input_info(&self, index: usize) -> Option<&FrameInfo> {
        self.inputs.get(index)
    }

    pub fn output_info(&self) -> &FrameInfo {
        &self.output
    }

    pub fn scheduler_core(&self) -> SchedulerCore {
        self.output.scheduler_core
    }

    pub fn uses_rga2(&self) -> bool {
        self.unit.rga2_used
    }

    pub fn async_depth(&self) -> usize {
        self.pipeline.depth()
    }

    pub fn afbc_enabled(&self) -> bool {
        self.afbc_out
    }

    pub fn overlay_offset_valid(&self) -> bool {
        self.overlay_offset_valid
    }

    /// Operations submitted but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.pipeline.len()
    }

    pub fn pools(&self) -> &FramePools {
        &self.pools
    }

    /// Submits one source frame and, for composites, its overlay.
    pub fn process(&mut self, src: Arc<Frame>, pat: Option<Arc<Frame>>) -> Result<FrameStatus> {
        let do_overlay = self.inputs.len() > 1 && self.overlay_offset_valid && pat.is_some();

        let src_slot = self.submit_frame(FrameRole::Source, &src, do_overlay)?;
        let dst_slot = self.query_frame(FrameRole::Destination, &src)?;

        let mut pat_slot = None;
        if let Some(pat) = pat.filter(|_| do_overlay) {
            let main = self.inputs[0];
            let overlay = self.inputs[1];
            let needs_preprocess = overlay.act.width != main.act.width
                || overlay.act.height != main.act.height
                || overlay.overlay_x > 0
                || overlay.overlay_y > 0;
            if needs_preprocess {
                let pat_in = self.submit_frame(FrameRole::PatternPreprocessed, &pat, false)?;
                let pat_out = self.query_frame(FrameRole::Pattern, &pat)?;
                // The overlay may have moved the session onto RGA2.
                let dst_core = self.output.scheduler_core;
                self.pools.destination.info_mut(dst_slot).core = dst_core;
                {
                    let info = self.pools.pattern.info_mut(pat_out);
                    info.priority = 1;
                    info.core = dst_core;
                    info.sync_mode = SyncMode::Sync;
                }
                call_blit(
                    self.device.as_ref(),
                    self.pools.pattern_preprocessed.info(pat_in),
                    self.pools.pattern.info_mut(pat_out),
                    None,
                )?;
                let rect = &mut self.pools.pattern.info_mut(pat_out).rect;
                rect.x = 0;
                rect.y = 0;
                rect.width = main.act.width;
                rect.height = main.act.height;
                pat_slot = Some(pat_out);
            } else {
                pat_slot = Some(self.submit_frame(FrameRole::Pattern, &pat, false)?);
                self.pools.destination.info_mut(dst_slot).core = self.output.scheduler_core;
            }
        }

        let entry = InFlight {
            src: src_slot,
            dst: dst_slot,
            pat: pat_slot,
        };
        self.pipeline
            .submit(self.device.as_ref(), &mut self.pools, entry)?;

        let delivered = self.pipeline.drain_over_depth(
            self.device.as_ref(),
            &mut self.pools,
            &mut *self.sink,
        )?;
        Ok(if delivered {
            FrameStatus::Delivered
        } else {
            FrameStatus::NotReady
        })
    }

    /// Delivers everything in flight, then signals end of stream.
    #[instrument(skip_all)]
    pub fn flush(&mut self) -> Result<()> {
        let delivered = self.pipeline.drain_all(
            self.device.as_ref(),
            &mut self.pools,
            Some(&mut *self.sink),
        )?;
        debug!(delivered, "flushed");
        self.sink.end_of_stream();
        Ok(())
    }

    /// Waits for outstanding work without delivering it and frees the pools.
    pub fn close(&mut self) {
        if let Err(err) = self
            .pipeline
            .drain_all(self.device.as_ref(), &mut self.pools, None)
        {
            warn!("{err}");
        }
        self.pools.clear();
    }
}

impl Drop for RgaContext {
    fn drop(&mut self) {
        self.close();
    }
}
