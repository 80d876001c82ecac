use criterion::{black_box, criterion_group, criterion_main, Criterion};
use croprec_core::{CropConfig, CropPipeline, Dataset, FeatureVector};

fn query() -> FeatureVector {
    FeatureVector {
        nitrogen: 25.0,
        phosphorus: 65.0,
        potassium: 45.0,
        ph: 5.4,
        rainfall: 120.0,
        temperature: 25.0,
        soil_type: "Loamy".to_string(),
    }
}

fn bench_fit(c: &mut Criterion) {
    let dataset = Dataset::kerala();

    c.bench_function("forest_fit_kerala", |b| {
        b.iter(|| {
            let mut pipeline = CropPipeline::new(CropConfig::default());
            pipeline.fit(black_box(&dataset)).map(|_| ()).ok();
        });
    });
}

fn bench_recommend(c: &mut Criterion) {
    let mut pipeline = CropPipeline::new(CropConfig::default());
    if pipeline.fit(&Dataset::kerala()).is_err() {
        return;
    }
    let query = query();

    c.bench_function("recommend_top5", |b| {
        b.iter(|| {
            let rec = pipeline.recommend(black_box(&query));
            black_box(rec.ok());
        });
    });
}

criterion_group!(croprec_benches, bench_fit, bench_recommend);
criterion_main!(croprec_benches);
