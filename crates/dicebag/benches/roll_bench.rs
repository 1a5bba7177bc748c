use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dicebag::{roll_d20, DiceExpr, DicePool, DiceRng, D6};

fn bench_d20_plain(c: &mut Criterion) {
    let mut rng = DiceRng::from_seed(42);

    c.bench_function("d20_plain", |b| {
        b.iter(|| black_box(roll_d20(&mut rng, false, false)))
    });
}

fn bench_d20_advantage(c: &mut Criterion) {
    let mut rng = DiceRng::from_seed(42);

    c.bench_function("d20_advantage", |b| {
        b.iter(|| black_box(roll_d20(&mut rng, true, false)))
    });
}

fn bench_damage_pool(c: &mut Criterion) {
    let mut rng = DiceRng::from_seed(42);
    let expr = DiceExpr::WithExtra {
        base: DicePool::of(2, D6),
        extra: DicePool::of(4, D6),
    };

    c.bench_function("damage_pool_2d6_plus_4d6", |b| {
        b.iter(|| black_box(expr.roll(&mut rng)))
    });
}

criterion_group!(benches, bench_d20_plain, bench_d20_advantage, bench_damage_pool);
criterion_main!(benches);
