// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_rga::{
    format::{map_from_native, map_to_native, FormatTable, PixelFormat, RgaFormat},
    pool::FrameRole,
};
use std::error::Error;

#[test]
fn test_main_table() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        map_to_native(PixelFormat::Nv12, FrameRole::Source),
        Some(RgaFormat::YCBCR_420_SP)
    );
    assert_eq!(
        map_to_native(PixelFormat::P010, FrameRole::Destination),
        Some(RgaFormat::YCBCR_420_SP_10B)
    );
    assert_eq!(
        map_to_native(PixelFormat::Rgb0, FrameRole::Destination),
        Some(RgaFormat::RGBA_8888)
    );
    for format in PixelFormat::ALL {
        let native = map_to_native(format, FrameRole::Source)
            .ok_or_else(|| format!("{format} missing from the main table"))?;
        println!("{format} -> {native}");
    }
    Ok(())
}

#[test]
fn test_overlay_table_is_rgb_only() {
    let entries = FormatTable::Overlay.entries();
    assert!(entries.iter().all(|(format, _)| format.is_rgb()));
    assert!(entries.len() < FormatTable::Main.entries().len());

    assert_eq!(map_to_native(PixelFormat::Nv12, FrameRole::Pattern), None);
    assert_eq!(
        map_to_native(PixelFormat::Rgba, FrameRole::Pattern),
        Some(RgaFormat::RGBA_8888)
    );
    assert_eq!(
        map_to_native(PixelFormat::Bgr24, FrameRole::PatternPreprocessed),
        Some(RgaFormat::BGR_888)
    );
}

#[test]
fn test_reverse_lookup_first_match() {
    assert_eq!(
        map_from_native(RgaFormat::YCBCR_420_P, FrameRole::Source),
        Some(PixelFormat::Yuv420p)
    );
    assert_eq!(
        map_from_native(RgaFormat::YCBCR_420_SP_10B, FrameRole::Source),
        Some(PixelFormat::P010)
    );
    assert_eq!(
        map_from_native(RgaFormat::RGBA_8888, FrameRole::Pattern),
        Some(PixelFormat::Rgba)
    );
    assert_eq!(
        map_from_native(RgaFormat::ABGR_8888, FrameRole::Pattern),
        Some(PixelFormat::Abgr)
    );
    assert_eq!(map_from_native(RgaFormat::YUYV_422, FrameRole::Pattern), None);
}

#[test]
fn test_parse_names() -> Result<(), Box<dyn Error>> {
    assert_eq!("nv12".parse::<PixelFormat>()?, PixelFormat::Nv12);
    assert_eq!("NV12".parse::<PixelFormat>()?, PixelFormat::Nv12);
    assert_eq!("p010".parse::<PixelFormat>()?, PixelFormat::P010);
    assert_eq!("yuyv".parse::<PixelFormat>()?, PixelFormat::Yuyv422);
    assert!("h264".parse::<PixelFormat>().is_err());

    for format in PixelFormat::ALL {
        assert_eq!(format.to_string().parse::<PixelFormat>()?, format);
    }
    Ok(())
}

#[test]
fn test_format_properties() {
    assert_eq!(PixelFormat::Nv12.bytes_pp(), 1.5);
    assert_eq!(PixelFormat::Nv15.bytes_pp(), 1.875);
    assert_eq!(PixelFormat::Nv20.bytes_pp(), 2.5);
    assert_eq!(PixelFormat::Rgba.bytes_pp(), 4.0);

    assert!(PixelFormat::P010.is_uncompact_10bit());
    assert!(!PixelFormat::Nv15.is_uncompact_10bit());
    assert!(PixelFormat::Yuvj420p.is_full_range());
    assert!(PixelFormat::Rgba.has_alpha());
    assert!(!PixelFormat::Rgb0.has_alpha());
    assert!(PixelFormat::Nv16.is_yuv());
    assert!(!PixelFormat::Gray8.is_rgb());
}

#[test]
fn test_compressed_fourcc() {
    assert!(PixelFormat::Nv12.drm_afbc_format().is_some());
    assert!(PixelFormat::Nv15.drm_afbc_format().is_some());
    assert!(PixelFormat::Rgba.drm_afbc_format().is_some());
    assert_eq!(PixelFormat::Nv21.drm_afbc_format(), None);
    assert_eq!(PixelFormat::Gray8.drm_rfbc_format(), None);
}
