use criterion::{Criterion, criterion_group, criterion_main};
use lore_whisper::config::BudgetScope;
use lore_whisper::index::RetrievalResult;
use lore_whisper::retrieval::{AssembledPrompt, PromptMode, pack_context, rank};
use std::hint::black_box;

fn sample_results(count: usize) -> Vec<RetrievalResult> {
    (0..count)
        .map(|i| RetrievalResult {
            title: format!("Entry {}", i),
            tags: "dwarves|mountain|forge".to_string(),
            text: "The hold was carved over three generations; its halls still echo with \
                   the hammers of the founding clans. "
                .repeat(1 + i % 4),
            distance: (i as f32 * 0.37) % 1.5,
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let results = sample_results(200);
    let ranked = rank(results.clone());

    c.bench_function("rank", |b| b.iter(|| rank(black_box(results.clone()))));
    c.bench_function("pack_context", |b| {
        b.iter(|| pack_context(black_box(&ranked), black_box(4000)))
    });
    c.bench_function("assemble_prompt_scope", |b| {
        b.iter(|| {
            AssembledPrompt::build(
                PromptMode::Generator,
                "instruction",
                black_box("A new dwarven hold"),
                black_box(&ranked),
                4000,
                BudgetScope::Prompt,
            )
            .render()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
