use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tir_parser::parse_module;

fn synthetic_module(functions: usize, insts_per_function: usize) -> String {
    let mut source = String::from("module \"bench\"\nstage raw\n");
    for f in 0..functions {
        source.push_str(&format!("func @f{f}: (i32) -> i32 {{\n'entry(%x: i32):\n"));
        let mut previous = "%x".to_string();
        for i in 0..insts_per_function {
            source.push_str(&format!("    %t{i} = add {previous}: i32, 1: i32\n"));
            previous = format!("%t{i}");
        }
        source.push_str(&format!("    return {previous}: i32\n}}\n"));
    }
    source
}

fn bench_parser(c: &mut Criterion) {
    let small = synthetic_module(4, 16);
    let large = synthetic_module(32, 64);

    c.bench_function("parse_small_module", |b| {
        b.iter(|| parse_module(black_box(&small)).unwrap())
    });
    c.bench_function("parse_large_module", |b| {
        b.iter(|| parse_module(black_box(&large)).unwrap())
    });
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
