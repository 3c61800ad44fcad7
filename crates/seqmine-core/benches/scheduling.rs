use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use seqmine_core::{ArchiveReader, SequenceWriter, StaticScheduler, WorkerPool, WorkerSlots};

// Skewed costs: a few very expensive records, as with large assemblies.
fn synthetic_cost(task_index: usize) -> usize {
    match task_index % 8 {
        0 => 1_600,
        1 => 1_200,
        2 => 900,
        3 => 700,
        4 => 400,
        5 => 250,
        6 => 140,
        _ => 60,
    }
}

fn simulate_work(cost: usize) -> u64 {
    let mut acc = 0x9E37_79B9_7F4A_7C15u64 ^ (cost as u64);
    for i in 0..(cost * 32) {
        acc = acc
            .wrapping_mul(6364136223846793005)
            .wrapping_add(i as u64 + 1442695040888963407);
    }
    acc
}

fn run_static(tasks: &[usize], workers: usize, chunk: usize) -> u64 {
    let scheduler = StaticScheduler::new(workers, chunk);
    let slots = scheduler
        .run(tasks, |_worker, &cost, slot| slot.push(simulate_work(cost)))
        .expect("static scheduler failed");
    slots.into_iter().flatten().fold(0u64, |sum, value| sum ^ value)
}

fn run_pool(tasks: &[usize], workers: usize) -> u64 {
    let pool = WorkerPool::new(workers);
    let slots = Arc::new(WorkerSlots::new(pool.max_workers()));
    for &cost in tasks {
        let slots = Arc::clone(&slots);
        pool.submit(move |worker| slots.extend(worker, [simulate_work(cost)]))
            .expect("pool closed");
    }
    pool.finish().expect("pool worker panicked");
    drop(pool);

    let slots = Arc::try_unwrap(slots)
        .ok()
        .expect("slots released after finish");
    slots
        .into_inner()
        .into_iter()
        .flatten()
        .fold(0u64, |sum, value| sum ^ value)
}

fn bench_work_scheduling(c: &mut Criterion) {
    let workers = num_cpus::get().clamp(2, 8);
    let tasks: Vec<usize> = (0..768).map(synthetic_cost).collect();

    let mut group = c.benchmark_group("work_scheduling");
    group.throughput(Throughput::Elements(tasks.len() as u64));

    group.bench_function("static_chunk_1", |b| {
        b.iter(|| black_box(run_static(&tasks, workers, 1)))
    });

    group.bench_function("static_chunk_4", |b| {
        b.iter(|| black_box(run_static(&tasks, workers, 4)))
    });

    group.bench_function("pool", |b| b.iter(|| black_box(run_pool(&tasks, workers))));

    group.finish();
}

fn bench_archive_reader(c: &mut Criterion) {
    let payload = vec![0xABu8; 4 * 1024];
    let mut writer = SequenceWriter::new(Vec::new(), [0; 16]).expect("header written");
    for index in 0..2_048usize {
        let key = format!("{:04X}", index);
        writer.append(&key, &payload).expect("record appended");
        if index % 100 == 99 {
            writer.sync().expect("marker written");
        }
    }
    let container = writer.finish().expect("container flushed");

    let mut group = c.benchmark_group("archive_reader");
    group.throughput(Throughput::Bytes(container.len() as u64));
    group.bench_function("frames", |b| {
        b.iter(|| {
            let mut reader =
                ArchiveReader::new(Cursor::new(container.as_slice())).expect("header read");
            let mut bytes = 0usize;
            while reader.has_next().expect("stream readable") {
                bytes += reader.next_frame().expect("frame decoded").payload.len();
            }
            black_box(bytes)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_work_scheduling, bench_archive_reader);
criterion_main!(benches);
