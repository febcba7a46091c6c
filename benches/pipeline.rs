//! Benchmarks for the sitekit pipeline.

use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sitekit::pipeline::{execute, DependencyGraph};
use sitekit::steps::images::optimize_svg;
use sitekit::steps::markup::minify;
use sitekit::steps::sprite::{assemble_sprite, Icon};
use sitekit::build_graph;

fn icon(n: usize) -> Icon {
    Icon {
        id: format!("icon-{:03}", n),
        path: PathBuf::from(format!("icons/icon-{:03}.svg", n)),
        source: format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><defs><linearGradient id="g{n}"/></defs><path d="M{n} 0h24v24H0z" fill="#000"/></svg>"##
        ),
    }
}

fn page(sections: usize) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n  <head>\n    <title>Bench</title>\n  </head>\n  <body>\n");
    for i in 0..sections {
        html.push_str(&format!(
            "    <section class=\"s{i}\">\n      <h2>  Section {i}  </h2>\n      <p>\n        Lorem   ipsum   dolor\n      </p>\n    </section>\n"
        ));
    }
    html.push_str("  </body>\n</html>\n");
    html
}

// -- Scheduling benchmarks --

fn bench_scheduling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduling");

    let graph = build_graph();
    group.bench_function("build_graph_noop", |b| {
        b.iter(|| execute(black_box(&graph), |_| Ok(())).unwrap())
    });

    // A layered graph: 8 layers of 8 nodes, each depending on the whole previous layer
    let mut layered: DependencyGraph<String> = DependencyGraph::new();
    for layer in 1..8 {
        for node in 0..8 {
            for upstream in 0..8 {
                layered.add_dependency(
                    format!("{}-{}", layer, node),
                    format!("{}-{}", layer - 1, upstream),
                );
            }
        }
    }
    group.bench_function("layered_64_noop", |b| {
        b.iter(|| execute(black_box(&layered), |_| Ok(())).unwrap())
    });

    group.finish();
}

// -- Step benchmarks --

fn bench_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("steps");

    let icons: Vec<Icon> = (0..100).map(icon).collect();
    group.bench_function("assemble_sprite_100", |b| {
        b.iter(|| assemble_sprite(black_box(&icons)).unwrap())
    });

    let svg = format!(
        "<?xml version=\"1.0\"?>\n<!-- exported -->\n<svg xmlns=\"http://www.w3.org/2000/svg\">\n{}</svg>\n",
        (0..200)
            .map(|i| format!("  <metadata>{i}</metadata>\n  <rect x=\"{i}\" width=\"1\" height=\"1\"/>\n"))
            .collect::<String>()
    );
    group.bench_function("optimize_svg", |b| {
        b.iter(|| optimize_svg(black_box(&svg), Path::new("bench.svg")).unwrap())
    });

    let html = page(200);
    group.bench_function("minify_html", |b| b.iter(|| minify(black_box(html.as_bytes()))));

    group.finish();
}

criterion_group!(benches, bench_scheduling, bench_steps);
criterion_main!(benches);
