//! Benchmarks for one pipeline cycle
//!
//! With `step = 1` every push completes a window, so one iteration is one
//! full extraction, normalization and classification. Compare the result
//! against the sample period (1000us at 1 kHz).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use myoflex_core::classifier::{Classifier, DenseLayer, LinearModel, NetworkModel};
use myoflex_core::features::{FeatureExtractor, FeatureLayout, FeatureSet, ZeroCrossing};
use myoflex_core::model::Model;
use myoflex_core::normalize::Scaler;
use myoflex_core::pipeline::Pipeline;
use myoflex_core::types::{ClassTable, EmgSample};
use myoflex_core::window::{WindowConfig, Windower};

const CHANNELS: usize = 4;
const CLASSES: usize = 5;

/// Generate synthetic EMG (bursty carrier with pseudo-noise)
fn generate_emg_samples(n: usize) -> Vec<EmgSample> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let readings: Vec<f32> = (0..CHANNELS)
                .map(|ch| {
                    let envelope = ((t / 200.0) + ch as f64).sin().abs();
                    let carrier = (t * 0.9 + ch as f64 * 1.7).sin();
                    let noise = (t * 0.123 * (ch + 1) as f64).sin() * 0.2;
                    ((envelope * carrier + noise) * 500.0) as f32
                })
                .collect();
            EmgSample::from_readings(i as u64 * 1000, i as u32, &readings).unwrap()
        })
        .collect()
}

fn pseudo_weights(rows: usize, cols: usize, seed: f64) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|r| (0..cols).map(|c| ((r * cols + c) as f64 * seed).sin() * 0.1).collect())
        .collect()
}

fn class_table() -> ClassTable {
    ClassTable::from_names(&["rest", "fist", "open", "pinch", "point"])
}

fn layout() -> FeatureLayout {
    FeatureLayout::new(CHANNELS, FeatureSet::TimeDomain6, ZeroCrossing::MeanCrossing).unwrap()
}

fn linear_model() -> Model {
    let width = layout().feature_count();
    let linear = LinearModel::new(pseudo_weights(CLASSES, width, 0.37), vec![0.0; CLASSES]).unwrap();
    Model::new(layout(), Scaler::identity(width), Classifier::Linear(linear), class_table()).unwrap()
}

fn network_model() -> Model {
    let width = layout().feature_count();
    let layers = vec![
        DenseLayer::new(pseudo_weights(32, width, 0.11), vec![0.01; 32]).unwrap(),
        DenseLayer::new(pseudo_weights(16, 32, 0.23), vec![0.01; 16]).unwrap(),
        DenseLayer::new(pseudo_weights(CLASSES, 16, 0.31), vec![0.0; CLASSES]).unwrap(),
    ];
    let network = NetworkModel::new(layers).unwrap();
    Model::new(layout(), Scaler::identity(width), Classifier::Network(network), class_table()).unwrap()
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");

    for window in [50usize, 150, 300] {
        let samples = generate_emg_samples(window);
        let extractor = FeatureExtractor::new(layout());

        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, _| {
            let mut windower: Windower = Windower::new(WindowConfig::new(CHANNELS, window, 1)).unwrap();
            for sample in &samples[..window - 1] {
                windower.push(sample);
            }
            let last = samples[window - 1];
            b.iter(|| {
                let view = windower.push(black_box(&last)).unwrap();
                black_box(extractor.extract(&view).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_pipeline_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_cycle");
    let samples = generate_emg_samples(2048);

    let models = [("linear", linear_model()), ("network", network_model())];
    for (name, model) in &models {
        for window in [150usize, 300] {
            group.bench_with_input(BenchmarkId::new(*name, window), &window, |b, &window| {
                let mut pipeline: Pipeline<'_> =
                    Pipeline::new(model, WindowConfig::new(CHANNELS, window, 1)).unwrap();
                for sample in &samples[..window] {
                    pipeline.push(sample);
                }
                let mut i = window;
                b.iter(|| {
                    let mut sample = samples[i % samples.len()];
                    sample.timestamp_us = i as u64 * 1000;
                    i += 1;
                    black_box(pipeline.push(black_box(&sample)))
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_feature_extraction, bench_pipeline_cycle);
criterion_main!(benches);
