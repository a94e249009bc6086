use criterion::{criterion_group, criterion_main, Criterion};
use engine::Tokenizer;

fn bench_tokenize(c: &mut Criterion) {
    let paragraph = "The campus orchestra closed its winter season with a full \
concert program, drawing students and alumni to the rehearsal hall for an \
evening of melody, staging, and light. Organizers said ticket demand ran far \
ahead of previous seasons.";
    let text = paragraph.repeat(50);
    let tok = Tokenizer::new();
    c.bench_function("tokenize_article", |b| b.iter(|| tok.tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
