use criterion::{black_box, criterion_group, criterion_main, Criterion};

use treedop::{most_probable_parse, parse_treebank, ExportMode, Grammar, ReductionOptions, Tree};

const TREEBANK_SRC: &str = "\
(S (NP John) (VP (V likes) (NP Mary)))
(S (NP Peter) (VP (V hates) (NP Susan)))
(S (NP Harry) (VP (V eats) (NP pizza)))
(S (NP Hermione) (VP (V eats)))
";

fn criterion_benchmark(c: &mut Criterion) {
  let treebank = parse_treebank(TREEBANK_SRC).unwrap();
  let opts = ReductionOptions {
    mode: ExportMode::Probabilities,
    ..ReductionOptions::default()
  };

  c.bench_function("reduce treebank", |b| {
    b.iter(|| Grammar::from_treebank(black_box(&treebank), black_box(&opts)).unwrap())
  });

  let candidates: Vec<(f64, Tree)> = vec![
    (0.4, "(S@0 (NP@1 John) (VP@2 (V@3 likes) (NP@4 Mary)))".parse().unwrap()),
    (0.3, "(S@0 (NP John) (VP@2 (V@3 likes) (NP@4 Mary)))".parse().unwrap()),
    (0.3, "(S@0 (NP (N John)) (VP@2 (V@3 likes) (NP@4 Mary)))".parse().unwrap()),
  ];

  c.bench_function("disambiguate n-best", |b| {
    b.iter(|| most_probable_parse(black_box(&candidates)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
