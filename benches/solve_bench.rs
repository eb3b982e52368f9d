//! Solver benchmarks using Criterion.
//!
//! Run with: `cargo bench`
//!
//! These measure the resolution loop end to end: clause indexing, variable
//! freshening, environment cloning, and backtracking on the classic list
//! workloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sldlog::engine::Engine;

const LIST_PROGRAM: &str = "\
append([], L, L).\n\
append([H|T], L, [H|R]) :- append(T, L, R).\n\
nrev([], []).\n\
nrev([H|T], R) :- nrev(T, RT), append(RT, [H], R).\n";

fn list_of(n: usize) -> String {
    let items: Vec<String> = (0..n).map(|i| i.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    for n in [8usize, 32, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut engine = Engine::new().with_output(Box::new(Vec::new()));
            engine.consult_str(LIST_PROGRAM).unwrap();
            let query = format!("append({}, [x], R).", list_of(n));
            b.iter(|| {
                let rows = engine.run_query(black_box(&query)).unwrap();
                black_box(rows)
            });
        });
    }
    group.finish();
}

fn bench_naive_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("nrev");
    for n in [8usize, 16, 24] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut engine = Engine::new().with_output(Box::new(Vec::new()));
            engine.consult_str(LIST_PROGRAM).unwrap();
            let query = format!("nrev({}, R).", list_of(n));
            b.iter(|| {
                let rows = engine.run_query(black_box(&query)).unwrap();
                black_box(rows)
            });
        });
    }
    group.finish();
}

fn bench_backtracking(c: &mut Criterion) {
    c.bench_function("cross_product_backtrack", |b| {
        let mut engine = Engine::new().with_output(Box::new(Vec::new()));
        let mut program = String::new();
        for i in 0..20 {
            program.push_str(&format!("left({}).\n", i));
            program.push_str(&format!("right({}).\n", i));
        }
        program.push_str("pair(A, B) :- left(A), right(B).\n");
        engine.consult_str(&program).unwrap();
        b.iter(|| {
            let rows = engine.run_query(black_box("pair(A, B).")).unwrap();
            black_box(rows)
        });
    });
}

fn bench_first_arg_index(c: &mut Criterion) {
    c.bench_function("first_arg_indexed_lookup", |b| {
        let mut engine = Engine::new().with_output(Box::new(Vec::new()));
        let mut program = String::new();
        for i in 0..500 {
            program.push_str(&format!("edge(n{}, n{}).\n", i, i + 1));
        }
        engine.consult_str(&program).unwrap();
        b.iter(|| {
            let rows = engine.run_query(black_box("edge(n250, X).")).unwrap();
            black_box(rows)
        });
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_naive_reverse,
    bench_backtracking,
    bench_first_arg_index
);
criterion_main!(benches);
