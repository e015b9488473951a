//! Benchmarks for document paths and template rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use provisionflow::context::{ExecutionContext, JsonPath, ValueTemplate};
use provisionflow::testing::sample_pipeline_document;

fn path_benchmark(c: &mut Criterion) {
    c.bench_function("parse_search_path", |b| {
        b.iter(|| JsonPath::parse(black_box("$..preprocessing.preprocessing.jobName")));
    });

    let ctx = ExecutionContext::from_value(sample_pipeline_document());
    let selector = ValueTemplate::object([
        ("DatasetGroup", ValueTemplate::optional("datasetGroup")),
        ("GroupName", ValueTemplate::path("datasetGroup.serviceConfig.name")),
        (
            "Arn",
            ValueTemplate::format(
                "arn:aws:personalize:{}:{}:dataset-group/{}",
                &[
                    "eventTracker.serviceConfig.name",
                    "datasetGroup.serviceConfig.name",
                    "datasetGroup.serviceConfig.name",
                ],
            ),
        ),
    ]);
    c.bench_function("render_selector", |b| {
        b.iter(|| selector.render(black_box(&ctx)));
    });
}

criterion_group!(benches, path_benchmark);
criterion_main!(benches);
