// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Overlay composition of a pattern input onto a main input.
//!
//! The overlay is blended at `(x, y)` with a global alpha. Overlays that
//! don't already cover the main frame exactly are first placed onto a
//! main-sized canvas in a synchronous pre-composite blit.

use crate::{
    constraint::PadConfig,
    context::{ContextParams, FrameStatus, RgaContext, RgaOptions},
    device::RgaDevice,
    error::{Error, Result},
    format::PixelFormat,
    frame::{BufferPool, Frame, FrameSink},
    transform::{MAX_SIZE, MIN_SIZE},
};
use std::sync::Arc;
use tracing::{error, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeConfig {
    /// Output format, the main input's format when `None`.
    pub format: Option<PixelFormat>,
    pub x: i32,
    pub y: i32,
    pub alpha: u8,
    pub options: RgaOptions,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            format: None,
            x: 0,
            y: 0,
            alpha: 255,
            options: RgaOptions::default(),
        }
    }
}

impl CompositeConfig {
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_alpha(mut self, alpha: u8) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_options(mut self, options: RgaOptions) -> Self {
        self.options = options;
        self
    }
}

fn check_input(what: &str, pad: &PadConfig) -> Result<()> {
    let range = MIN_SIZE..=MAX_SIZE;
    if !range.contains(&pad.width) || !range.contains(&pad.height) {
        let msg = format!(
            "Supported {what} size is range from {MIN_SIZE}x{MIN_SIZE} ~ {MAX_SIZE}x{MAX_SIZE}"
        );
        error!("{msg}");
        return Err(Error::InvalidSize(msg));
    }
    Ok(())
}

pub struct Composite {
    ctx: RgaContext,
    output: PadConfig,
}

impl Composite {
    pub fn new(
        device: Box<dyn RgaDevice>,
        buffers: Box<dyn BufferPool>,
        sink: Box<dyn FrameSink>,
        main: PadConfig,
        overlay: PadConfig,
        config: &CompositeConfig,
    ) -> Result<Self> {
        check_input("main", &main)?;
        check_input("overlay", &overlay)?;

        let output = PadConfig::new(main.width, main.height, config.format.unwrap_or(main.format));
        let params = ContextParams {
            global_alpha: config.alpha,
            overlay_x: config.x,
            overlay_y: config.y,
            ..Default::default()
        };
        let ctx = RgaContext::new(
            device,
            buffers,
            sink,
            &[main, overlay],
            output,
            &params,
            &config.options,
        )?;
        Ok(Self { ctx, output })
    }

    pub fn output(&self) -> &PadConfig {
        &self.output
    }

    pub fn context(&self) -> &RgaContext {
        &self.ctx
    }

    /// Composites `overlay` onto `main`. Without an overlay frame, or with
    /// an offset outside the main frame, `main` is only converted.
    #[instrument(skip_all)]
    pub fn process_frame(
        &mut self,
        main: Arc<Frame>,
        overlay: Option<Arc<Frame>>,
    ) -> Result<FrameStatus> {
        self.ctx.process(main, overlay)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.ctx.flush()
    }

    pub fn close(&mut self) {
        self.ctx.close()
    }
}
