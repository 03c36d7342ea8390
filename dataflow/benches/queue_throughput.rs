//! Throughput of the write/peek/commit cycle on `FanoutFifo` and
//! `RoundRobinFifo`, with one and with several readers attached.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dataflow_core::ids::PortId;
use dataflow_core::options::QueueOptions;
use dataflow_core::queue::FanoutFifo;
use dataflow_core::round_robin::RoundRobinFifo;
use dataflow_core::token::Token;

fn fanout_single_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_fifo/single_reader");
    for capacity in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut q = FanoutFifo::new(QueueOptions::default().with_capacity(capacity));
            let reader = PortId::new();
            q.add_reader(reader);
            b.iter(|| {
                q.write(Token::new(1)).unwrap();
                let t = q.peek(reader).unwrap();
                q.commit(reader).unwrap();
                criterion::black_box(t);
            });
        });
    }
    group.finish();
}

fn fanout_multi_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_fifo/readers");
    for reader_count in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(reader_count),
            &reader_count,
            |b, &reader_count| {
                let mut q = FanoutFifo::new(QueueOptions::default().with_capacity(256));
                let readers: Vec<PortId> = (0..reader_count).map(|_| PortId::new()).collect();
                for r in &readers {
                    q.add_reader(*r);
                }
                b.iter(|| {
                    q.write(Token::new(1)).unwrap();
                    for r in &readers {
                        let t = q.peek(*r).unwrap();
                        q.commit(*r).unwrap();
                        criterion::black_box(t);
                    }
                });
            },
        );
    }
    group.finish();
}

fn round_robin_multi_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_robin_fifo/readers");
    for reader_count in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(reader_count),
            &reader_count,
            |b, &reader_count| {
                let mut q = RoundRobinFifo::new(QueueOptions::default().with_capacity(256));
                let readers: Vec<PortId> = (0..reader_count).map(|_| PortId::new()).collect();
                for r in &readers {
                    q.add_reader(*r);
                }
                b.iter(|| {
                    let assigned = q.write(Token::new(1)).unwrap();
                    let t = q.peek(assigned).unwrap();
                    q.commit(assigned).unwrap();
                    criterion::black_box(t);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, fanout_single_reader, fanout_multi_reader, round_robin_multi_reader);
criterion_main!(benches);
