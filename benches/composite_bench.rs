use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rfstitch::compositor::TileCompositor;
use rfstitch::page::SnapshotProvider;
use rfstitch::synthetic::SyntheticPage;
use rfstitch::{CaptureConfig, Capturer, Tile};

fn bench_composite(c: &mut Criterion) {
    let mut page = SyntheticPage::new(1280, 7300, 720, 1.0);
    let geometry = page.geometry();
    let schedule = geometry.schedule();
    let tile: Tile = page.snapshot().expect("snapshot");

    c.bench_function("composite_11_tiles_1280x7300", |b| {
        b.iter(|| {
            let mut compositor = TileCompositor::new(geometry);
            for segment in &schedule {
                compositor.composite(segment, &tile);
            }
            black_box(compositor.into_surface())
        })
    });
}

fn bench_full_capture(c: &mut Criterion) {
    let capturer = Capturer::new(CaptureConfig::instant()).expect("config");

    c.bench_function("capture_full_page_synthetic_2x", |b| {
        b.iter(|| {
            let mut page = SyntheticPage::new(640, 3000, 720, 2.0).with_fixed_header(40);
            black_box(capturer.capture_full_page(&mut page).expect("capture"))
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_composite, bench_full_capture
}
criterion_main!(benches);
