//! Benchmarks for directive scanning.
//!
//! The scanner runs on every model message, most of which carry no
//! directive at all, so the no-directive path matters as much as the
//! extraction paths.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use strategist_chat::Scanner;
use strategist_core::config::EngineConfig;

const PROSE: &str = "That's a great step forward. Building the habit matters more than \
    the distance right now, so keep the runs short and easy for the next two weeks. \
    If your knees complain, swap one run for a brisk walk. How did the last session feel?";

/// A model message with a directive in the given wrapping.
fn message(index: usize) -> String {
    let directive = format!(
        "{{\"action_type\": \"update_progress\", \"data\": {{\"goal_id\": {}, \
         \"progress_value\": {}, \"notes\": \"felt {{good}} today\"}}}}",
        index,
        index % 101
    );
    match index % 4 {
        0 => format!("{}\n\n```json\n{}\n```", PROSE, directive),
        1 => format!("{}\n\nHere's the action: {}", PROSE, directive),
        2 => format!("{} {}", PROSE, directive),
        _ => format!(
            "{} A goal looks like {{\"title\": \"...\"}}. {}",
            PROSE, directive
        ),
    }
}

fn bench_scan(c: &mut Criterion) {
    let scanner = Scanner::from_config(&EngineConfig::default());
    let messages: Vec<String> = (0..1000).map(message).collect();
    let truncated: Vec<String> = messages
        .iter()
        .map(|m| m[..m.len() - 2].to_string())
        .collect();

    let mut group = c.benchmark_group("scanner");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("plain_prose", |b| b.iter(|| scanner.scan(PROSE)));

    group.bench_function("with_directive", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let found = scanner.scan(&messages[idx % messages.len()]);
            idx += 1;
            found
        });
    });

    group.bench_function("truncated_directive", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let found = scanner.scan(&truncated[idx % truncated.len()]);
            idx += 1;
            found
        });
    });

    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
