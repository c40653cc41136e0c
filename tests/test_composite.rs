// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{drm_frame, input, CollectSink, Collected, DeviceLog, MockDevice, MockPool, RK3588};
use edgefirst_rga::{
    caps::SchedulerCore,
    composite::{Composite, CompositeConfig},
    constraint::PadConfig,
    device::SyncMode,
    format::PixelFormat,
    frame::{Frame, FrameRequest},
    Error,
};
use std::{
    error::Error as StdError,
    sync::{Arc, Mutex},
};

const MAIN: PadConfig = PadConfig {
    width: 1920,
    height: 1080,
    format: PixelFormat::Nv12,
};

struct Harness {
    filter: Composite,
    log: Arc<Mutex<DeviceLog>>,
    requests: Arc<Mutex<Vec<FrameRequest>>>,
    collected: Collected,
}

fn composite(overlay: PadConfig, config: &CompositeConfig) -> Result<Harness, Error> {
    let (device, log) = MockDevice::new(RK3588);
    let (pool, requests) = MockPool::new();
    let (sink, collected) = CollectSink::new();
    let filter = Composite::new(
        Box::new(device),
        Box::new(pool),
        Box::new(sink),
        MAIN,
        overlay,
        config,
    )?;
    Ok(Harness {
        filter,
        log,
        requests,
        collected,
    })
}

fn overlay_frame(width: u32, height: u32) -> Arc<Frame> {
    Arc::new(drm_frame(width, height, PixelFormat::Rgba, 500))
}

#[test]
fn test_full_size_overlay() -> Result<(), Box<dyn StdError>> {
    let mut h = composite(
        PadConfig::new(1920, 1080, PixelFormat::Rgba),
        &CompositeConfig::default(),
    )?;
    assert_eq!(*h.filter.output(), MAIN);
    assert!(h.filter.context().overlay_offset_valid());
    assert_eq!(h.filter.context().scheduler_core(), SchedulerCore::RGA3);

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(1920, 1080)),
    )?;
    h.filter.flush()?;

    let log = h.log.lock().unwrap();
    assert_eq!(log.blits.len(), 1);
    let blit = &log.blits[0];
    println!("src: {:?}", blit.src);
    println!("pat: {:?}", blit.pat);
    assert_eq!(blit.src.blend, 0x504);
    let pat = blit.pat.ok_or("no pattern")?;
    assert_eq!(pat.fd, 500);
    assert_eq!((pat.rect.width, pat.rect.height), (1920, 1080));
    assert_eq!(blit.dst.core, SchedulerCore::RGA3);
    assert_eq!(h.collected.len(), 1);
    Ok(())
}

#[test]
fn test_positioned_overlay_is_preprocessed() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default()
        .with_position(100, 50)
        .with_alpha(128);
    let mut h = composite(PadConfig::new(256, 256, PixelFormat::Rgba), &config)?;

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(256, 256)),
    )?;

    let log = h.log.lock().unwrap();
    assert_eq!(log.blits.len(), 2);

    // Overlay onto a main-sized canvas first, synchronously.
    let pre = &log.blits[0];
    assert_eq!(pre.src.fd, 500);
    assert_eq!(
        (pre.src.rect.x, pre.src.rect.y, pre.src.rect.width, pre.src.rect.height),
        (0, 0, 256, 256)
    );
    assert_eq!(
        (pre.dst.rect.x, pre.dst.rect.y, pre.dst.rect.width, pre.dst.rect.height),
        (100, 50, 256, 256)
    );
    assert_eq!(pre.dst.sync_mode, SyncMode::Sync);
    assert_eq!(pre.dst.priority, 1);
    assert_eq!(pre.dst.core, SchedulerCore::RGA3);
    assert!(pre.pat.is_none());

    let main = &log.blits[1];
    assert_eq!(main.src.blend, 0x1004 | 128 << 16 | 0xff << 24);
    let pat = main.pat.ok_or("no pattern")?;
    assert_eq!(pat.fd, pre.dst.fd);
    assert_eq!(
        (pat.rect.x, pat.rect.y, pat.rect.width, pat.rect.height),
        (0, 0, 1920, 1080)
    );
    assert_eq!(main.dst.sync_mode, SyncMode::Async);

    let requests = h.requests.lock().unwrap();
    assert_eq!(
        *requests,
        [
            FrameRequest {
                width: 1920,
                height: 1080,
                format: PixelFormat::Nv12
            },
            FrameRequest {
                width: 1920,
                height: 1080,
                format: PixelFormat::Rgba
            },
        ]
    );
    Ok(())
}

#[test]
fn test_overlay_clipped_at_edge() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default().with_position(1800, 1000);
    let mut h = composite(PadConfig::new(256, 256, PixelFormat::Rgba), &config)?;

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(256, 256)),
    )?;
    let log = h.log.lock().unwrap();
    let pre = &log.blits[0];
    assert_eq!((pre.src.rect.width, pre.src.rect.height), (120, 80));
    assert_eq!(
        (pre.dst.rect.x, pre.dst.rect.y, pre.dst.rect.width, pre.dst.rect.height),
        (1800, 1000, 120, 80)
    );
    Ok(())
}

#[test]
fn test_negative_position_clamps() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default().with_position(-10, -20);
    let mut h = composite(PadConfig::new(256, 256, PixelFormat::Rgba), &config)?;
    assert!(h.filter.context().overlay_offset_valid());

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(256, 256)),
    )?;
    let log = h.log.lock().unwrap();
    assert_eq!((log.blits[0].dst.rect.x, log.blits[0].dst.rect.y), (0, 0));
    Ok(())
}

#[test]
fn test_offset_outside_main_passes_through() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default().with_position(1919, 0);
    let mut h = composite(PadConfig::new(256, 256, PixelFormat::Rgba), &config)?;
    assert!(!h.filter.context().overlay_offset_valid());

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(256, 256)),
    )?;
    h.filter.flush()?;

    let log = h.log.lock().unwrap();
    assert_eq!(log.blits.len(), 1);
    assert!(log.blits[0].pat.is_none());
    assert_eq!(log.blits[0].src.blend, 0);
    assert_eq!(h.collected.len(), 1);
    Ok(())
}

#[test]
fn test_missing_overlay_frame() -> Result<(), Box<dyn StdError>> {
    let mut h = composite(
        PadConfig::new(1920, 1080, PixelFormat::Rgba),
        &CompositeConfig::default(),
    )?;
    h.filter
        .process_frame(input(1920, 1080, PixelFormat::Nv12, 7), None)?;
    h.filter.flush()?;

    let log = h.log.lock().unwrap();
    assert!(log.blits[0].pat.is_none());
    assert_eq!(log.blits[0].src.blend, 0);
    assert_eq!(h.collected.pts(), [Some(7)]);
    Ok(())
}

#[test]
fn test_output_format() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default().with_format(PixelFormat::Rgba);
    let h = composite(PadConfig::new(640, 480, PixelFormat::Bgra), &config)?;
    assert_eq!(
        *h.filter.output(),
        PadConfig::new(1920, 1080, PixelFormat::Rgba)
    );
    Ok(())
}

#[test]
fn test_yuv_overlay_rejected() {
    let err = composite(
        PadConfig::new(256, 256, PixelFormat::Nv12),
        &CompositeConfig::default(),
    )
    .err()
    .unwrap();
    println!("{err}");
    assert!(matches!(
        err,
        Error::UnsupportedFormat {
            pad: "overlay",
            format: PixelFormat::Nv12
        }
    ));
}

#[test]
fn test_small_overlay_runs_on_rga2() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default().with_position(16, 16);
    let mut h = composite(PadConfig::new(32, 32, PixelFormat::Rgba), &config)?;
    assert!(h.filter.context().uses_rga2());
    assert_eq!(
        h.filter.context().scheduler_core(),
        SchedulerCore::RGA2_CORE0
    );

    h.filter.process_frame(
        input(1920, 1080, PixelFormat::Nv12, 0),
        Some(overlay_frame(32, 32)),
    )?;
    let log = h.log.lock().unwrap();
    assert_eq!(log.blits[0].dst.core, SchedulerCore::RGA2_CORE0);
    assert_eq!(log.blits[1].dst.core, SchedulerCore::RGA2_CORE0);
    Ok(())
}

#[test]
fn test_overlay_stride_moves_session_to_rga2() -> Result<(), Box<dyn StdError>> {
    let config = CompositeConfig::default()
        .with_position(50, 50)
        .with_alpha(128);
    let mut h = composite(PadConfig::new(200, 100, PixelFormat::Rgb24), &config)?;
    assert_eq!(h.filter.context().scheduler_core(), SchedulerCore::RGA3);
    assert!(!h.filter.context().uses_rga2());

    // 200 pixel RGB24 rows are not 16 aligned, which RGA3 cannot read.
    let overlay = Arc::new(drm_frame(200, 100, PixelFormat::Rgb24, 500));
    for pts in 0..2 {
        h.filter.process_frame(
            input(1920, 1080, PixelFormat::Nv12, pts),
            Some(overlay.clone()),
        )?;
        assert!(h.filter.context().uses_rga2());
        assert_eq!(
            h.filter.context().scheduler_core(),
            SchedulerCore::RGA2_CORE0
        );
    }

    let log = h.log.lock().unwrap();
    assert_eq!(log.blits.len(), 4);
    for (i, blit) in log.blits.iter().enumerate() {
        println!("blit {i}: core {}", blit.dst.core);
        assert_eq!(blit.dst.core, SchedulerCore::RGA2_CORE0);
    }
    assert_eq!(log.blits[0].dst.sync_mode, SyncMode::Sync);
    assert_eq!(log.blits[2].dst.sync_mode, SyncMode::Sync);
    Ok(())
}
