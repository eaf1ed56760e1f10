use adt_learning::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn target(size: usize, seed: u64) -> MealyMachine<char, u8> {
    MealyMachine::random(alphabet!(simple 'a', 'b', 'c'), size, &[0, 1], seed)
}

fn learn(target: &MealyMachine<char, u8>, replacer: Box<dyn SubtreeReplacer<char, u8>>) -> usize {
    let oracle = SulOracle::new(MealySul::new(target.clone()));
    let mut learner = AdtLearner::builder(target.alphabet().clone(), oracle)
        .boxed_subtree_replacer(replacer)
        .build();
    learner
        .infer(&mut MealyOracle::new(target.clone()))
        .map(|model| model.size())
        .unwrap_or_default()
}

fn bench_random_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("random targets");
    group.sample_size(20);
    for size in [8, 16, 32] {
        let target = target(size, size as u64);
        group.bench_with_input(BenchmarkId::new("never replace", size), &target, |b, t| {
            b.iter(|| learn(t, Box::new(NeverReplace)))
        });
        group.bench_with_input(BenchmarkId::new("level order", size), &target, |b, t| {
            b.iter(|| learn(t, Box::new(LevelOrderReplacer)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_random_targets);
criterion_main!(benches);
