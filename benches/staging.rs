use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use screenstage::{
    button::{Button, ButtonAction},
    staging::StagingBuffer,
};

fn draft(i: u64) -> Button {
    Button::draft(
        1,
        format!("Button {i}"),
        i as u32,
        ButtonAction::ShowMessage {
            message: "pressed".to_string(),
            dismissable: true,
        },
    )
}

fn bench_stage_adds(c: &mut Criterion) {
    c.bench_function("stage_add_10k", |b| {
        b.iter(|| {
            let mut buf = StagingBuffer::new();
            for i in 0..10_000u64 {
                let _ = buf.stage_add(draft(i));
            }
        });
    });
}

fn bench_stage_merge_churn(c: &mut Criterion) {
    c.bench_function("stage_update_then_delete_5k_adds", |b| {
        b.iter(|| {
            let mut buf = StagingBuffer::new();
            let ids: Vec<_> = (0..5_000u64).map(|i| buf.stage_add(draft(i))).collect();
            for &id in &ids {
                buf.stage_update(id, draft(99)).expect("update");
            }
            buf.stage_deletes(&ids).expect("delete");
            assert!(buf.is_empty());
        });
    });
}

fn bench_materialized_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialized_view");

    for n in [100usize, 1_000usize, 10_000usize] {
        let committed: Vec<Button> = (0..n as u64)
            .map(|i| {
                let mut b = draft(i);
                b.id = i as i64 + 1;
                b
            })
            .collect();

        let mut buf = StagingBuffer::new();
        for i in 0..(n / 10).max(1) as u64 {
            buf.stage_update(i as i64 + 1, draft(i)).expect("update");
            let _ = buf.stage_add(draft(i + 1_000_000));
        }

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let view = buf.materialized_view(&committed);
                assert!(!view.is_empty());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stage_adds,
    bench_stage_merge_churn,
    bench_materialized_view
);
criterion_main!(benches);
