// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_rga::{
    caps::SchedulerCore,
    composite::CompositeConfig,
    context::RgaOptions,
    format::PixelFormat,
    transform::{AspectRatio, Crop, ForceChroma, ForceYuv, TransformConfig, Transpose},
};
use std::path::PathBuf;

fn parse_core(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid core mask '{s}': {err}"))
}

/// Command-line arguments for the RGA frame processor.
///
/// Reads tightly packed raw frames from `--input`, runs them through the
/// RGA and writes the results, one after another, to `--output`. Giving
/// `--overlay` switches from a transform to a composite.
///
/// # Example
///
/// ```bash
/// # Scale 1080p NV12 down to 640x360 RGB
/// edgefirst-rga --input in.nv12 --size "1920 1080" --format nv12 \
///     --output out.rgb --out-size "640 360" --out-format rgb24
///
/// # Via environment variables
/// export RGA_ASYNC_DEPTH=4
/// edgefirst-rga --input in.nv12 --output out.nv12
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Raw input frames
    #[arg(short, long, env = "INPUT")]
    pub input: PathBuf,

    /// Input resolution in pixels (width height)
    #[arg(
        long,
        env = "SIZE",
        default_value = "1920 1080",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub size: Vec<u32>,

    /// Input pixel format
    #[arg(short, long, env = "FORMAT", default_value = "nv12")]
    pub format: PixelFormat,

    /// Raw output frames
    #[arg(short, long, env = "OUTPUT")]
    pub output: PathBuf,

    /// Output resolution in pixels (width height), defaults to the crop size
    #[arg(long, env = "OUT_SIZE", value_delimiter = ' ', num_args = 2)]
    pub out_size: Option<Vec<u32>>,

    /// Output pixel format, defaults to the input format
    #[arg(long, env = "OUT_FORMAT")]
    pub out_format: Option<PixelFormat>,

    /// Source crop (x y width height)
    #[arg(long, env = "CROP", value_delimiter = ' ', num_args = 4)]
    pub crop: Option<Vec<i32>>,

    /// Rotation and flip
    #[arg(long, env = "TRANSPOSE", value_enum)]
    pub transpose: Option<Transpose>,

    /// Keep the input aspect ratio when scaling
    #[arg(long, env = "ASPECT_RATIO", default_value = "disable", value_enum)]
    pub aspect_ratio: AspectRatio,

    /// Round the aspect corrected size to a multiple of this
    #[arg(long, env = "DIVISIBLE_BY", default_value = "2")]
    pub divisible_by: u32,

    /// Force YUV output at the given bit depth
    #[arg(long, env = "FORCE_YUV", default_value = "disable", value_enum)]
    pub force_yuv: ForceYuv,

    /// Chroma layout of forced YUV output
    #[arg(long, env = "FORCE_CHROMA", default_value = "auto", value_enum)]
    pub force_chroma: ForceChroma,

    /// Raw overlay frame, blended onto every input frame
    #[arg(long, env = "OVERLAY")]
    pub overlay: Option<PathBuf>,

    /// Overlay resolution in pixels (width height)
    #[arg(
        long,
        env = "OVERLAY_SIZE",
        default_value = "256 256",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub overlay_size: Vec<u32>,

    /// Overlay pixel format
    #[arg(long, env = "OVERLAY_FORMAT", default_value = "rgba")]
    pub overlay_format: PixelFormat,

    /// Overlay position (x y)
    #[arg(
        long,
        env = "OVERLAY_POS",
        default_value = "0 0",
        value_delimiter = ' ',
        num_args = 2,
        allow_negative_numbers = true
    )]
    pub overlay_pos: Vec<i32>,

    /// Overlay global alpha
    #[arg(long, env = "ALPHA", default_value = "255")]
    pub alpha: u8,

    /// Scheduler core mask (0 for automatic, e.g. 0x4 for RGA2)
    #[arg(long, env = "RGA_CORE", default_value = "0", value_parser = parse_core)]
    pub core: u32,

    /// Frames kept in flight (0-4)
    #[arg(long, env = "RGA_ASYNC_DEPTH", default_value = "2")]
    pub async_depth: usize,

    /// Emit AFBC compressed output
    #[arg(long, env = "RGA_AFBC")]
    pub afbc: bool,

    /// Stop after this many frames
    #[arg(short = 'n', long, env = "FRAMES")]
    pub frames: Option<usize>,

    /// RGA library to load
    #[arg(long, env = "LIBRGA", default_value = rga_sys::LIBRGA)]
    pub library: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    pub fn options(&self) -> RgaOptions {
        RgaOptions::default()
            .with_core(SchedulerCore(self.core))
            .with_async_depth(self.async_depth)
            .with_afbc(self.afbc)
    }

    pub fn transform_config(&self) -> TransformConfig {
        let mut config = TransformConfig::default()
            .with_aspect_ratio(self.aspect_ratio, self.divisible_by)
            .with_force_yuv(self.force_yuv)
            .with_force_chroma(self.force_chroma)
            .with_options(self.options());
        if let Some(format) = self.out_format {
            config = config.with_format(format);
        }
        if let Some(size) = &self.out_size {
            config = config.with_size(size[0], size[1]);
        }
        if let Some(crop) = &self.crop {
            config = config.with_crop(Crop::new(crop[2], crop[3]).with_offset(crop[0], crop[1]));
        }
        if let Some(transpose) = self.transpose {
            config = config.with_transpose(transpose);
        }
        config
    }

    pub fn composite_config(&self) -> CompositeConfig {
        let mut config = CompositeConfig::default()
            .with_position(self.overlay_pos[0], self.overlay_pos[1])
            .with_alpha(self.alpha)
            .with_options(self.options());
        if let Some(format) = self.out_format {
            config = config.with_format(format);
        }
        config
    }
}
