// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hardware generation detection.
//!
//! Rockchip SoCs carry one or both of two blitter generations: the legacy
//! RGA2 (with lite, enhance and pro variants) and the modern RGA3. Which
//! ones exist is read from the driver's version string once per context.

use crate::{
    device::RgaDevice,
    error::{Error, Result},
};
use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
};
use tracing::{debug, error, warn};

/// Scheduling-core bitmask handed to the driver. Zero lets it choose.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerCore(pub u32);

impl SchedulerCore {
    pub const DEFAULT: Self = Self(0);
    pub const RGA3_CORE0: Self = Self(0x1);
    pub const RGA3_CORE1: Self = Self(0x2);
    /// Either RGA3 core.
    pub const RGA3: Self = Self(0x3);
    pub const RGA2_CORE0: Self = Self(0x4);
    pub const RGA2_CORE1: Self = Self(0x8);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Pinned to RGA3 cores and nothing else.
    pub fn is_rga3_only(self) -> bool {
        self.0 > 0 && self.0 == self.0 & Self::RGA3.0
    }
}

impl BitOr for SchedulerCore {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SchedulerCore {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// What the attached RGA hardware can do, plus the validated core override.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub has_rga2: bool,
    pub has_rga2_lite: bool,
    pub has_rga2_enhance: bool,
    pub has_rga2_pro: bool,
    pub has_rga3: bool,
    /// Core bits a caller may select.
    pub core_mask: u32,
    /// Caller override after validation; zero when rejected or not given.
    pub core: SchedulerCore,
}

impl Capabilities {
    /// Parses a driver version string and validates `requested` against it.
    pub fn from_version(version: &str, requested: SchedulerCore) -> Result<Self> {
        let mut caps = Capabilities {
            has_rga2: version.contains("RGA_2"),
            has_rga2_lite: version.contains("RGA_2_lite"),
            has_rga2_enhance: version.contains("RGA_2_Enhance"),
            has_rga2_pro: version.contains("RGA_2_PRO"),
            has_rga3: version.contains("RGA_3"),
            core_mask: 0,
            core: requested,
        };
        caps.core_mask = if caps.has_rga2_pro { 0xf } else { 0x7 };

        if !(caps.has_rga2 || caps.has_rga3) {
            error!("No RGA2/RGA3 hw available");
            return Err(Error::NoHardware);
        }

        if !caps.core.is_default() && !caps.is_multicore() && !caps.has_rga2_pro {
            warn!("Option 'core' cannot be set on non-multicore RGA hw, ignoring");
            caps.core = SchedulerCore::DEFAULT;
        }
        if caps.core.0 & !caps.core_mask != 0 {
            warn!("Invalid scheduler core set, ignoring");
            caps.core = SchedulerCore::DEFAULT;
        }
        if !caps.core.is_default() && caps.core.0 == caps.core.0 & SchedulerCore::RGA3.0 {
            caps.has_rga2 = false;
            caps.has_rga2_lite = false;
            caps.has_rga2_enhance = false;
            caps.has_rga2_pro = false;
        }
        if caps.core == SchedulerCore::RGA2_CORE0 && !caps.has_rga2_pro {
            caps.has_rga3 = false;
        }

        debug!(
            rga2 = caps.has_rga2,
            lite = caps.has_rga2_lite,
            enhance = caps.has_rga2_enhance,
            pro = caps.has_rga2_pro,
            rga3 = caps.has_rga3,
            core = %caps.core,
            "RGA capabilities"
        );
        Ok(caps)
    }

    /// Queries the device's version string and detects from it.
    pub fn detect(device: &dyn RgaDevice, requested: SchedulerCore) -> Result<Self> {
        Self::from_version(&device.version(), requested)
    }

    /// Both generations are present.
    pub fn is_multicore(&self) -> bool {
        self.has_rga2 && self.has_rga3
    }

    /// Without RGA3 every operation runs on the legacy unit.
    pub fn requires_rga2(&self) -> bool {
        !self.has_rga3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rga3_only_mask() {
        assert!(SchedulerCore::RGA3_CORE0.is_rga3_only());
        assert!(SchedulerCore::RGA3.is_rga3_only());
        assert!(!SchedulerCore::DEFAULT.is_rga3_only());
        assert!(!(SchedulerCore::RGA3 | SchedulerCore::RGA2_CORE0).is_rga3_only());
    }

    #[test]
    fn display_hex() {
        assert_eq!(SchedulerCore(0xc).to_string(), "0xc");
    }
}
