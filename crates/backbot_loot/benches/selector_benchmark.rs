//! Benchmark for weighted back selection and ledger rendering.
//!
//! Run with: cargo bench --package backbot_loot --bench selector_benchmark

// criterion_group! generates an undocumented function
#![allow(missing_docs)]

use std::sync::Arc;

use backbot_loot::codec::write_table;
use backbot_loot::{Back, Catalog, LedgerState, Rarity, Selector, UserId};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn create_test_catalog() -> Catalog {
    let mut backs = vec![Back::parse("Rollback/reset.dca").unwrap()];
    for i in 0..10 {
        backs.push(Back::parse(&format!("Rare/rare_{i}.dca")).unwrap());
    }
    for i in 0..90 {
        backs.push(Back::parse(&format!("Uncommon/uncommon_{i}.dca")).unwrap());
    }
    for i in 0..400 {
        backs.push(Back::parse(&format!("Common/common_{i}.dca")).unwrap());
    }
    Catalog::from_backs(backs)
}

fn benchmark_single_pick(c: &mut Criterion) {
    let selector = Selector::with_seed(Arc::new(create_test_catalog()), 1);

    c.bench_function("single_weighted_pick", |b| {
        b.iter(|| black_box(selector.pick_weighted()));
    });
}

fn benchmark_tier_pick(c: &mut Criterion) {
    let selector = Selector::with_seed(Arc::new(create_test_catalog()), 2);

    c.bench_function("single_tier_pick", |b| {
        b.iter(|| black_box(selector.pick_from_tier(black_box(Rarity::Common))));
    });
}

fn benchmark_statistics(c: &mut Criterion) {
    let selector = Selector::with_seed(Arc::new(create_test_catalog()), 3);

    let mut group = c.benchmark_group("weighted_batch");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("100k_picks", |b| {
        b.iter(|| black_box(selector.run_statistics(100_000)));
    });
    group.finish();
}

fn benchmark_ledger_render(c: &mut Criterion) {
    let catalog = create_test_catalog();
    let selector = Selector::with_seed(Arc::new(catalog), 4);
    let mut state = LedgerState::new();
    for user in 0..1000 {
        let user = UserId::new(format!("user_{user}"));
        for _ in 0..20 {
            if let Ok(back) = selector.pick_weighted() {
                state.add_loot(&user, &back);
            }
        }
    }

    c.bench_function("render_1000_users", |b| {
        b.iter(|| black_box(write_table(&state)));
    });
}

criterion_group!(
    benches,
    benchmark_single_pick,
    benchmark_tier_pick,
    benchmark_statistics,
    benchmark_ledger_render
);
criterion_main!(benches);
