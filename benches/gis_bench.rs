use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maxent_gis::train::{EventStore, Trainer};
use maxent_gis::Event;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NUM_PREDICATES: u32 = 2000;
const NUM_LABELS: u32 = 12;

fn synthetic_store(num_events: usize) -> EventStore {
    let mut rng = StdRng::seed_from_u64(42);
    let events = (0..num_events)
        .map(|_| {
            let label = rng.gen_range(0..NUM_LABELS);
            let len = rng.gen_range(1..20);
            let mut predicates: Vec<u32> =
                (0..len).map(|_| rng.gen_range(0..NUM_PREDICATES)).collect();
            predicates.sort_unstable();
            predicates.dedup();
            let values = predicates.iter().map(|_| rng.gen_range(0.1..2.0)).collect();
            Event::new(label, predicates, Some(values), rng.gen_range(1..4)).unwrap()
        })
        .collect();
    EventStore::new(events, NUM_PREDICATES as usize, NUM_LABELS as usize).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let store = synthetic_store(20_000);
    let mut group = c.benchmark_group("train");
    group.sample_size(10);
    group.bench_function("gis", |b| {
        let trainer = Trainer::new().with_max_iterations(5).unwrap();
        b.iter(|| {
            let _model = trainer.train(black_box(&store)).unwrap();
        })
    });
    group.bench_function("gis_smoothed", |b| {
        let trainer = Trainer::new()
            .with_max_iterations(5)
            .unwrap()
            .with_gaussian_smoothing(true);
        b.iter(|| {
            let _model = trainer.train(black_box(&store)).unwrap();
        })
    });
    group.finish();

    let outcome = Trainer::new()
        .with_max_iterations(20)
        .unwrap()
        .train(&store)
        .unwrap();
    let model = outcome.model;
    let queries = &store.events()[..1000];
    c.bench_function("classify", |b| {
        b.iter(|| {
            for event in queries {
                let _label = model.classify(black_box(event)).unwrap();
            }
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
