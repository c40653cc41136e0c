// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_rga::{
    composite::Composite,
    constraint::PadConfig,
    context::FrameStatus,
    device::LibRga,
    frame::{linesize, BufferPool, DmaHeapPool, Frame, FrameRequest},
    transform::Transform,
};
use std::{
    error::Error,
    fs::File,
    io::{self, BufWriter, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod args;

fn init_tracing(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(level);
    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(level)),
        Err(_) => None,
    };
    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(level))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(journald)
        .with(tracy)
        .init();
}

/// Row count of `plane` for a `height` tall frame.
fn plane_rows(frame: &Frame, plane: usize) -> usize {
    let desc = frame.format().descriptor();
    let shift = if plane > 0 { desc.log2_chroma_h } else { 0 };
    (frame.height() as usize).div_ceil(1 << shift)
}

/// Reads one tightly packed frame into a freshly allocated hardware frame.
/// Returns `None` at end of file.
fn load_frame(
    pool: &DmaHeapPool,
    pad: &PadConfig,
    reader: &mut impl Read,
    pts: i64,
) -> Result<Option<Frame>, Box<dyn Error>> {
    let frame = pool
        .allocate(&FrameRequest {
            width: pad.width,
            height: pad.height,
            format: pad.format,
        })?
        .with_pts(pts);
    let planes = frame
        .drm()
        .and_then(|desc| desc.layers.first())
        .map(|layer| layer.planes.clone())
        .unwrap_or_default();

    let mut map = frame.mmap()?;
    let data = map.as_slice_mut();
    for (index, plane) in planes.iter().enumerate() {
        let row = linesize(pad.format, pad.width, index);
        if row == 0 {
            return Err(format!("raw '{}' frames are not supported", pad.format).into());
        }
        for y in 0..plane_rows(&frame, index) {
            let start = plane.offset + y * plane.pitch;
            match reader.read_exact(&mut data[start..start + row]) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
    }
    drop(map);
    Ok(Some(frame))
}

/// Copies the visible rows of every plane out of a mapped output frame.
fn unpack_planes(pix: &[u8], frame: Option<&Frame>) -> Result<Vec<u8>, Box<dyn Error>> {
    let frame = frame.ok_or("missing frame")?;
    let desc = frame.drm().ok_or("not a dma-buf frame")?;
    let object = desc.objects.first().ok_or("no dma-buf object")?;
    if object.is_afbc() {
        return Ok(pix.to_vec());
    }

    let mut out = Vec::new();
    let layer = desc.layers.first().ok_or("no DRM layer")?;
    for (index, plane) in layer.planes.iter().enumerate() {
        let row = linesize(frame.format(), frame.width(), index);
        for y in 0..plane_rows(frame, index) {
            let start = plane.offset + y * plane.pitch;
            out.extend_from_slice(&pix[start..start + row]);
        }
    }
    Ok(out)
}

fn write_frame(writer: &mut impl Write, frame: &Frame) -> Result<(), Box<dyn Error>> {
    let dma = frame.dmabuf()?;
    let mem = dma.memory_map()?;
    let data = mem.read(unpack_planes, Some(frame))?;
    writer.write_all(&data)?;
    Ok(())
}

/// Locks state shared with the sink, reporting a poisoned lock as a
/// delivery failure.
fn lock<T>(mutex: &Mutex<T>) -> edgefirst_rga::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|err| edgefirst_rga::Error::Delivery(err.to_string()))
}

enum Filter {
    Transform(Transform),
    Composite(Composite, Arc<Frame>),
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args);

    let input = PadConfig::new(args.size[0], args.size[1], args.format);
    let pool = DmaHeapPool::new()?;
    let mut reader = File::open(&args.input)?;

    let writer = Arc::new(Mutex::new(BufWriter::new(File::create(&args.output)?)));
    let written = Arc::new(Mutex::new(0usize));
    let sink = {
        let writer = writer.clone();
        let written = written.clone();
        move |frame: Arc<Frame>| -> edgefirst_rga::Result<()> {
            let mut writer = lock(&writer)?;
            write_frame(&mut *writer, &frame)
                .map_err(|err| edgefirst_rga::Error::Delivery(err.to_string()))?;
            *lock(&written)? += 1;
            Ok(())
        }
    };

    let device = Box::new(LibRga::with_library(&args.library)?);
    let mut filter = match &args.overlay {
        None => Filter::Transform(Transform::new(
            device,
            Box::new(DmaHeapPool::new()?),
            Box::new(sink),
            input,
            &args.transform_config(),
        )?),
        Some(path) => {
            let overlay = PadConfig::new(
                args.overlay_size[0],
                args.overlay_size[1],
                args.overlay_format,
            );
            let frame = load_frame(&pool, &overlay, &mut File::open(path)?, 0)?
                .ok_or("overlay file is shorter than one frame")?;
            Filter::Composite(
                Composite::new(
                    device,
                    Box::new(DmaHeapPool::new()?),
                    Box::new(sink),
                    input,
                    overlay,
                    &args.composite_config(),
                )?,
                Arc::new(frame),
            )
        }
    };

    let start = Instant::now();
    let mut count = 0usize;
    let mut pending = 0usize;
    while args.frames.map_or(true, |limit| count < limit) {
        let Some(frame) = load_frame(&pool, &input, &mut reader, count as i64)? else {
            break;
        };
        let status = match &mut filter {
            Filter::Transform(vpp) => vpp.process_frame(Arc::new(frame))?,
            Filter::Composite(overlay, pattern) => {
                overlay.process_frame(Arc::new(frame), Some(pattern.clone()))?
            }
        };
        if status == FrameStatus::NotReady {
            pending += 1;
        }
        count += 1;
    }

    match &mut filter {
        Filter::Transform(vpp) => vpp.flush()?,
        Filter::Composite(overlay, _) => overlay.flush()?,
    }
    lock(&writer)?.flush()?;

    let written = *lock(&written)?;
    if written != count {
        warn!("{count} frames read but {written} written");
    }
    info!(
        "processed {count} frames ({pending} queued behind the pipeline) in {:?}",
        start.elapsed()
    );
    Ok(())
}
