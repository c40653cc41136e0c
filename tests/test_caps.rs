// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{MockDevice, RGA2_LITE, RGA2_PRO, RGA3_ONLY, RK3568, RK3588};
use edgefirst_rga::{
    caps::{Capabilities, SchedulerCore},
    Error,
};
use std::error::Error as StdError;

#[test]
fn test_detect_multicore() -> Result<(), Box<dyn StdError>> {
    let (device, _) = MockDevice::new(RK3588);
    let caps = Capabilities::detect(&device, SchedulerCore::DEFAULT)?;
    println!("caps: {caps:?}");

    assert!(caps.has_rga2);
    assert!(caps.has_rga2_enhance);
    assert!(!caps.has_rga2_lite);
    assert!(!caps.has_rga2_pro);
    assert!(caps.has_rga3);
    assert!(caps.is_multicore());
    assert!(!caps.requires_rga2());
    assert_eq!(caps.core_mask, 0x7);
    assert_eq!(caps.core, SchedulerCore::DEFAULT);
    Ok(())
}

#[test]
fn test_detect_single_generation() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RK3568, SchedulerCore::DEFAULT)?;
    assert!(caps.has_rga2 && !caps.has_rga3);
    assert!(caps.requires_rga2());

    let caps = Capabilities::from_version(RGA2_LITE, SchedulerCore::DEFAULT)?;
    assert!(caps.has_rga2_lite);
    assert!(!caps.has_rga2_enhance);

    let caps = Capabilities::from_version(RGA3_ONLY, SchedulerCore::DEFAULT)?;
    assert!(caps.has_rga3 && !caps.has_rga2);
    assert!(!caps.is_multicore());
    Ok(())
}

#[test]
fn test_no_hardware() {
    let err = Capabilities::from_version("", SchedulerCore::DEFAULT).unwrap_err();
    assert!(matches!(err, Error::NoHardware));
    assert!(err.is_config());

    let err = Capabilities::from_version("RGA_1", SchedulerCore::DEFAULT).unwrap_err();
    assert!(matches!(err, Error::NoHardware));
}

#[test]
fn test_core_override_needs_multicore() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RK3568, SchedulerCore::RGA2_CORE0)?;
    assert_eq!(caps.core, SchedulerCore::DEFAULT);
    assert!(caps.has_rga2);
    Ok(())
}

#[test]
fn test_core_override_outside_mask() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RK3588, SchedulerCore::RGA2_CORE1)?;
    assert_eq!(caps.core, SchedulerCore::DEFAULT);
    assert!(caps.has_rga2 && caps.has_rga3);
    Ok(())
}

#[test]
fn test_core_override_pins_rga3() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RK3588, SchedulerCore::RGA3_CORE0)?;
    assert_eq!(caps.core, SchedulerCore::RGA3_CORE0);
    assert!(!caps.has_rga2);
    assert!(!caps.has_rga2_enhance);
    assert!(caps.has_rga3);

    let caps = Capabilities::from_version(RK3588, SchedulerCore::RGA3)?;
    assert_eq!(caps.core, SchedulerCore::RGA3);
    assert!(!caps.has_rga2);
    Ok(())
}

#[test]
fn test_core_override_pins_rga2() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RK3588, SchedulerCore::RGA2_CORE0)?;
    assert_eq!(caps.core, SchedulerCore::RGA2_CORE0);
    assert!(caps.has_rga2);
    assert!(!caps.has_rga3);
    assert!(caps.requires_rga2());
    Ok(())
}

#[test]
fn test_pro_accepts_second_core() -> Result<(), Box<dyn StdError>> {
    let caps = Capabilities::from_version(RGA2_PRO, SchedulerCore::RGA2_CORE1)?;
    assert_eq!(caps.core_mask, 0xf);
    assert_eq!(caps.core, SchedulerCore::RGA2_CORE1);
    assert!(caps.has_rga2_pro);
    Ok(())
}
