//! Trains a small network to tell apart points in the odd and even
//! quadrants, saves it, reloads it and scores it.
//!
//! Usage: `train [MODEL_PATH]` (defaults to `quadrants.model`). Set
//! `RUST_LOG=info` to see per-epoch progress.

use log::{error, info};
use mlp::utils::{argmax, one_hot};
use mlp::{Logging, Network, NetworkConfig, StoppingMetric, Trainer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::process;

type Sample = (Vec<f64>, Vec<f64>);

fn generate_data(rng: &mut StdRng, num_samples: usize) -> mlp::Result<Vec<Sample>> {
    let noise = Normal::new(0.0, 0.1).map_err(|err| mlp::Error::InvalidConfig(err.to_string()))?;
    let mut data = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let theta: f64 = rng.gen_range(0.0..2.0 * std::f64::consts::PI);
        let dx: f64 = noise.sample(rng);
        let dy: f64 = noise.sample(rng);
        let point = vec![theta.cos() + dx, theta.sin() + dy];
        let class = if point[0] * point[1] > 0.0 { 0 } else { 1 };
        data.push((point, one_hot(class, 2)?));
    }
    Ok(data)
}

fn score(set_name: &str, network: &Network, test_data: &[Sample]) -> mlp::Result<()> {
    let mut num_correct = 0;
    for (input, expected) in test_data {
        if Some(network.predict_class(input)?) == argmax(expected) {
            num_correct += 1;
        }
    }
    println!(
        "{} set results: {} of {} correct",
        set_name,
        num_correct,
        test_data.len()
    );
    Ok(())
}

fn run(model_path: &str) -> mlp::Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);
    let training_data = generate_data(&mut rng, 2_000)?;
    let validation_data = generate_data(&mut rng, 500)?;

    let config = NetworkConfig::new(2, &[5, 5], 2).learning_rate(0.1).seed(7);
    let mut network = Network::new(&config)?;
    let report = Trainer::new()
        .epochs(200)
        .patience(10)
        .stopping_metric(StoppingMetric::MaximizeAccuracy)
        .logging(Logging::Epochs(10))
        .train(&mut network, &training_data, Some(&validation_data[..]))?;
    info!("training ended: {}", report.stop_reason);

    network.save(model_path)?;
    info!("model saved to {}", model_path);

    let restored = Network::from_file(model_path, config.output_mode)?;
    println!();
    score("Training", &restored, &training_data)?;
    score("Validation", &restored, &validation_data)?;
    score("Test", &restored, &generate_data(&mut rng, 1_000)?)?;
    Ok(())
}

fn main() {
    env_logger::init();
    let model_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "quadrants.model".to_string());
    if let Err(err) = run(&model_path) {
        error!("{}", err);
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
