use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tikz_diagram_renderer::config::{LayoutConfig, RenderConfig};
use tikz_diagram_renderer::layout::compute_layout;
use tikz_diagram_renderer::parser::{InputFormat, parse_spec};
use tikz_diagram_renderer::render::{DEFAULT_TEMPLATE, render_tikz};
use tikz_diagram_renderer::theme::Theme;

/// `layers` rows of `width` groups, each linking into a scattered group of
/// the row below.
fn layered_source(layers: usize, width: usize) -> String {
    let mut out = String::new();
    for layer in 0..layers {
        for i in 0..width {
            out.push_str(&format!("N{layer}x{i}\n"));
        }
    }
    for layer in 1..layers {
        for i in 0..width {
            let target = (i * 3 + layer) % width;
            out.push_str(&format!("N{layer}x{i} -> N{}x{target}\n", layer - 1));
        }
    }
    out
}

fn fixture(name: &str) -> &'static str {
    match name {
        "chain" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/chain.txt")),
        "fan_in" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fan_in.txt")),
        "underlined" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/underlined.txt"
        )),
        "proof" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/proof.txt")),
        _ => panic!("unknown fixture"),
    }
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for name in ["chain", "fan_in", "underlined", "proof"] {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let spec = parse_spec(black_box(data), InputFormat::Text).expect("parse failed");
                black_box(spec.groups.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for name in ["chain", "fan_in", "underlined", "proof"] {
        let spec = parse_spec(fixture(name), InputFormat::Text).expect("parse failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &spec, |b, spec| {
            b.iter(|| {
                let layout = compute_layout(black_box(spec), &config).expect("layout failed");
                black_box(layout.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_ordering_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_ordering_modes");
    group.sample_size(20);
    let exhaustive = LayoutConfig::default();
    let mut heuristic = LayoutConfig::default();
    heuristic.exhaustive_order_limit = 0;

    for (layers, width) in [(3usize, 5usize), (4, 7), (4, 8)] {
        let name = format!("layered_{layers}x{width}");
        let spec =
            parse_spec(&layered_source(layers, width), InputFormat::Text).expect("parse failed");
        group.bench_with_input(BenchmarkId::new("exhaustive", &name), &spec, |b, spec| {
            b.iter(|| {
                let layout = compute_layout(black_box(spec), &exhaustive).expect("layout failed");
                black_box(layout.arrows.len());
            });
        });
        group.bench_with_input(BenchmarkId::new("heuristic", &name), &spec, |b, spec| {
            b.iter(|| {
                let layout = compute_layout(black_box(spec), &heuristic).expect("layout failed");
                black_box(layout.arrows.len());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let theme = Theme::default();
    let config = LayoutConfig::default();
    let render = RenderConfig::default();
    for name in ["underlined", "proof"] {
        let spec = parse_spec(fixture(name), InputFormat::Text).expect("parse failed");
        let layout = compute_layout(&spec, &config).expect("layout failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &layout, |b, layout| {
            b.iter(|| {
                let tex = render_tikz(black_box(layout), DEFAULT_TEMPLATE, &theme, &render);
                black_box(tex.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_layout,
    bench_ordering_modes,
    bench_render
);
criterion_main!(benches);
