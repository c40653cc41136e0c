// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst RGA Library
//!
//! This library drives the Rockchip RGA 2D blitters for video frame
//! processing: scaling, cropping, rotation, pixel format and color space
//! conversion, and alpha-blended overlay composition. Frames stay in DMA
//! buffers end to end; the engine only describes them to the hardware.
//!
//! ## Features
//!
//! - **Unit Selection**: Detects the RGA2 and RGA3 generations present and
//!   routes each session to the unit whose formats, sizes, strides and
//!   scale ratios fit it.
//! - **Async Pipelining**: Keeps up to four operations in flight and
//!   delivers completed frames in submission order.
//! - **Compressed Layouts**: Reads AFBC and RFBC compressed input and can
//!   write AFBC compressed output on RGA3.
//! - **Overlay Composition**: Blends an RGB overlay onto the main stream at
//!   a given position and global alpha.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_rga::{
//!     constraint::PadConfig,
//!     device::LibRga,
//!     format::PixelFormat,
//!     frame::{DmaHeapPool, Frame},
//!     transform::{Transform, TransformConfig},
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = |frame: Arc<Frame>| -> edgefirst_rga::Result<()> {
//!     println!("{frame}");
//!     Ok(())
//! };
//!
//! // Convert 1080p NV12 to 720p RGBA
//! let mut vpp = Transform::new(
//!     Box::new(LibRga::new()?),
//!     Box::new(DmaHeapPool::new()?),
//!     Box::new(sink),
//!     PadConfig::new(1920, 1080, PixelFormat::Nv12),
//!     &TransformConfig::default()
//!         .with_size(1280, 720)
//!         .with_format(PixelFormat::Rgba),
//! )?;
//! vpp.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: Kernel 5.10+ with the RGA driver and DMA heap support
//! - **Hardware**: Rockchip SoC with RGA2 and/or RGA3, `librga.so.2`
//!   installed
//!
//! ## Safety
//!
//! The `rga-sys` crate and the [`frame`] mapping code use `unsafe` for FFI
//! and dma-buf access. Everything else goes through the [`device::RgaDevice`]
//! trait and safe wrappers.

pub mod caps;
pub mod composite;
pub mod constraint;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod pipeline;
pub mod pool;
pub mod transform;

pub use error::{Error, Result};
