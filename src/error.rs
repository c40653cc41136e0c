// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::format::PixelFormat;
use thiserror::Error;

/// Result type alias for RGA engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// RGA engine error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("No RGA2/RGA3 hw available")]
    NoHardware,

    #[error("Unsupported {pad} format: '{format}'")]
    UnsupportedFormat {
        pad: &'static str,
        format: PixelFormat,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    InvalidSize(String),

    #[error("RGA scale ratio ({width:.4}x{height:.4}) exceeds {min:.4} ~ {max:.4}")]
    ScaleRatio {
        width: f32,
        height: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Resource errors
    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Frame contract errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // Hardware errors
    #[error("RGA blit failed: {0}")]
    Blit(i32),

    #[error("RGA async blit returned invalid fence_fd: {0}")]
    InvalidFence(i32),

    #[error("RGA sync failed: {0}")]
    Sync(String),

    #[error("RGA library error: {0}")]
    Library(String),

    // Downstream errors
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl Error {
    /// Check if this error is fatal to the processing context
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::NoHardware
                | Error::UnsupportedFormat { .. }
                | Error::Unsupported(_)
                | Error::InvalidSize(_)
                | Error::ScaleRatio { .. }
                | Error::InvalidConfig(_)
        )
    }

    /// Check if a later frame may succeed once resources free up
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Error::Allocation(_) | Error::Io(_) | Error::InvalidFrame(_)
        )
    }

    /// Check if the hardware or its driver reported the failure
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Error::Blit(_) | Error::InvalidFence(_) | Error::Sync(_) | Error::Library(_)
        )
    }
}
