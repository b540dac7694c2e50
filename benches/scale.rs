// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use criterion::{criterion_group, criterion_main, Criterion};
use shmobile_video::scale::ScaleProgram;
use std::hint::black_box;

pub fn benchmark_scale(c: &mut Criterion) {
    let dims = [160u32, 176, 320, 352, 480, 640, 720, 800];
    let mut group = c.benchmark_group("scale");
    for src in dims.iter() {
        for dst in dims.iter() {
            group.bench_with_input(format!("{src}-{dst}"), &(*src, *dst), |b, &(src, dst)| {
                b.iter(|| ScaleProgram::compute(black_box(src), black_box(dst), black_box(dst)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, benchmark_scale);
criterion_main!(benches);
