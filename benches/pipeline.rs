use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_rga::{
    constraint::PadConfig,
    context::RgaOptions,
    device::{RgaDevice, RgaInfo, SyncMode},
    format::PixelFormat,
    frame::{buffer_size, BufferPool, DrmDescriptor, Frame, FrameRequest},
    transform::{Transform, TransformConfig},
};
use std::{io, os::fd::RawFd, sync::Arc};

/// Completes every blit immediately, so only the engine's own work is timed.
struct NullDevice;

impl RgaDevice for NullDevice {
    fn version(&self) -> String {
        "RGA_3 RGA_2_Enhance".to_owned()
    }

    fn blit(&self, _: &RgaInfo, dst: &mut RgaInfo, _: Option<&RgaInfo>) -> Result<(), i32> {
        if dst.sync_mode == SyncMode::Async {
            dst.out_fence_fd = 100;
        }
        Ok(())
    }

    fn sync(&self, _: RawFd) -> io::Result<()> {
        Ok(())
    }
}

struct NullPool;

impl BufferPool for NullPool {
    fn allocate(&self, request: &FrameRequest) -> edgefirst_rga::Result<Frame> {
        let size = buffer_size(request.format, request.width, request.height);
        let desc = DrmDescriptor::linear(request.format, request.width, request.height, 3, size);
        Ok(Frame::from_drm(request.width, request.height, request.format, desc))
    }
}

fn transform(input: PadConfig, config: &TransformConfig) -> Transform {
    let sink = |_: Arc<Frame>| -> edgefirst_rga::Result<()> { Ok(()) };
    Transform::new(
        Box::new(NullDevice),
        Box::new(NullPool),
        Box::new(sink),
        input,
        config,
    )
    .unwrap()
}

pub fn benchmark_configure(c: &mut Criterion) {
    let dims = [(640, 480), (1920, 1080), (3840, 2160)];
    let fmts = [PixelFormat::Nv12, PixelFormat::Rgba, PixelFormat::Yuyv422];

    let mut group = c.benchmark_group("configure");
    for fmt in fmts {
        for dim in dims {
            let input = PadConfig::new(dim.0, dim.1, fmt);
            let config = TransformConfig::default()
                .with_size(dim.0 / 2, dim.1 / 2)
                .with_format(PixelFormat::Rgba);
            group.bench_with_input(
                format!("{}/{}x{}", fmt, dim.0, dim.1),
                &(input, config),
                |b, (input, config)| b.iter(|| transform(*input, config)),
            );
        }
    }
}

pub fn benchmark_process(c: &mut Criterion) {
    let input = PadConfig::new(1920, 1080, PixelFormat::Nv12);
    let desc = DrmDescriptor::linear(
        input.format,
        input.width,
        input.height,
        3,
        buffer_size(input.format, input.width, input.height),
    );
    let frame = Arc::new(Frame::from_drm(input.width, input.height, input.format, desc));

    let mut group = c.benchmark_group("process");
    for depth in 0..=4 {
        let config = TransformConfig::default()
            .with_size(1280, 720)
            .with_format(PixelFormat::Rgba)
            .with_options(RgaOptions::default().with_async_depth(depth));
        let mut vpp = transform(input, &config);
        group.bench_function(format!("depth{depth}"), |b| {
            b.iter(|| vpp.process_frame(frame.clone()).unwrap())
        });
        vpp.flush().unwrap();
    }
}

criterion_group!(benches, benchmark_configure, benchmark_process);
criterion_main!(benches);
