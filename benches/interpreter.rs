//! Lexer, parser and evaluator benchmarks
//!
//! Run with: cargo bench --bench interpreter
//! Profile with: cargo flamegraph --bench interpreter -- --bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::executor::block_on;
use sandrun::lexer::{Lexer, TokenKind};
use sandrun::parser::Parser;
use sandrun::{DeserializeOptions, Interpreter, PauseController};

/// Recursive calls
const FIBONACCI: &str = r#"
function fib(n) {
    return n < 2 ? n : fib(n - 1) + fib(n - 2);
}
fib(15)
"#;

/// Loop with closures and per-iteration bindings
const LOOPS: &str = r#"
let total = 0;
const fns = [];
for (let i = 0; i < 500; i++) {
    fns.push(() => i);
    total += i % 7;
}
total + fns.length
"#;

/// Array method chaining
const ARRAYS: &str = r#"
const numbers = [];
for (let i = 0; i < 200; i++) {
    numbers.push(i);
}
numbers
    .filter(n => n % 2 === 0)
    .map(n => n * 3)
    .reduce((acc, n) => acc + n, 0)
"#;

/// Classes, inheritance and getters
const CLASSES: &str = r#"
class Shape {
    constructor(name) { this.name = name }
    get label() { return `${this.name}:${this.area()}` }
}
class Rect extends Shape {
    constructor(w, h) { super('rect'); this.w = w; this.h = h }
    area() { return this.w * this.h }
}
const labels = [];
for (let i = 0; i < 100; i++) {
    labels.push(new Rect(i, 2).label);
}
labels.length
"#;

/// Objects, JSON and string building
const OBJECTS: &str = r#"
const records = [];
for (let i = 0; i < 100; i++) {
    records.push({ id: i, name: 'item' + i, tags: ['a', 'b'], meta: { score: i * 1.5 } });
}
const text = JSON.stringify(records);
JSON.parse(text).length
"#;

/// Straight-line code that stays inside the synchronous subset
const SYNC_SUBSET: &str = r#"
function scale(v, f) { return v * f }
const point = { x: 3, y: 4 };
const moved = { x: scale(point.x, 2), y: scale(point.y, 2) };
const summary = [moved.x, moved.y].map(n => n + 1).join(',');
`${summary}:${Math.hypot(moved.x, moved.y)}`
"#;

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    for (name, source) in [("fibonacci", FIBONACCI), ("classes", CLASSES), ("objects", OBJECTS)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokens", name), source, |b, s| {
            b.iter(|| {
                let mut lexer = Lexer::new(black_box(s));
                let mut count = 0usize;
                while lexer.next_token().kind != TokenKind::Eof {
                    count += 1;
                }
                black_box(count)
            });
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    let cases = [
        ("fibonacci", FIBONACCI.to_string()),
        ("classes", CLASSES.to_string()),
        (
            "1000_let_statements",
            (0..1000).map(|i| format!("let x{} = {};\n", i, i)).collect(),
        ),
    ];
    for (name, source) in &cases {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("program", name), source, |b, s| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(s));
                black_box(parser.parse_program())
            });
        });
    }
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let cases = [
        ("fibonacci", FIBONACCI),
        ("loops", LOOPS),
        ("arrays", ARRAYS),
        ("classes", CLASSES),
        ("objects", OBJECTS),
    ];
    for (name, source) in cases {
        group.bench_with_input(BenchmarkId::new("async", name), source, |b, s| {
            b.iter(|| {
                let interp = Interpreter::new();
                black_box(block_on(interp.execute(black_box(s))))
            });
        });
    }
    group.bench_function("sync/subset", |b| {
        b.iter(|| {
            let interp = Interpreter::new();
            black_box(interp.evaluate_sync(black_box(SYNC_SUBSET)))
        });
    });
    group.finish();
}

fn bench_tracked(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked");
    // Same programs with checkpoints and frame bookkeeping enabled
    for (name, source) in [("fibonacci", FIBONACCI), ("loops", LOOPS)] {
        group.bench_with_input(BenchmarkId::new("controller", name), source, |b, s| {
            b.iter(|| {
                let controller = PauseController::new(Interpreter::new());
                black_box(block_on(controller.execute(black_box(s))))
            });
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let controller = PauseController::new(Interpreter::new());
    if block_on(controller.interpreter().execute(OBJECTS)).is_err() {
        return;
    }
    group.bench_function("serialize", |b| {
        b.iter(|| black_box(controller.serialize().and_then(|s| s.to_json())));
    });
    let Ok(state) = controller.serialize() else {
        return;
    };
    group.bench_function("deserialize", |b| {
        b.iter(|| {
            let restored = PauseController::deserialize(state.clone(), DeserializeOptions::new());
            black_box(block_on(restored).is_ok())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_lexer,
    bench_parser,
    bench_execute,
    bench_tracked,
    bench_snapshot,
);
criterion_main!(benches);
