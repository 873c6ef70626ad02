//! Sum-of-features teaching example
//!
//! Learns to classify ten integers in `0..=3` by their sum (31 classes) with a
//! 10-50-31 MLP, then prints the mean train and test loss as the squared
//! error between the softmax output and the one-hot label.
//!
//! ```bash
//! sum-features
//! sum-features --records 5000 --epochs 5 --seed 7
//! ```

use clap::Parser;
use lenet_train::data::SumFeaturesConfig;
use lenet_train::logging::setup_logging;
use lenet_train::monitor::MetricsReporter;
use lenet_train::nn::mlp;
use lenet_train::optim::OptimizerKind;
use lenet_train::train::{EpochScheduler, Model, TrainingConfig};
use std::process::ExitCode;
use tracing::info;

const HIDDEN: usize = 50;

#[derive(Parser, Debug)]
#[command(name = "sum-features")]
#[command(version)]
#[command(about = "Train a small MLP to classify synthetic records by the sum of their features")]
struct Args {
    /// Records generated; 70% train, 30% test
    #[arg(long, default_value_t = 1000)]
    records: usize,

    #[arg(long, default_value_t = 1)]
    epochs: usize,

    #[arg(long = "minibatch_size", default_value_t = 64)]
    minibatch_size: usize,

    /// Adam step size
    #[arg(long = "learning_rate", default_value_t = 0.001)]
    learning_rate: f32,

    /// Seed for the data and the weights
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose, false) {
        eprintln!("Warning: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> lenet_train::Result<()> {
    let data = SumFeaturesConfig::default()
        .with_records(args.records)
        .with_seed(args.seed);
    let (train, test) = data.generate_split()?;
    info!(train = train.len(), test = test.len(), "generated records");

    let optimizer = OptimizerKind::Adam.build(args.learning_rate, args.minibatch_size);
    let mut net = mlp(data.features, HIDDEN, data.num_classes(), args.seed, optimizer)?;
    println!("{} ({} parameters)", net.architecture(), net.num_parameters());

    let config = TrainingConfig::new(args.learning_rate, args.epochs, args.minibatch_size);
    let mut scheduler = EpochScheduler::new(config, Box::new(MetricsReporter::disabled()));
    let result = scheduler.run(&mut net, &train, &test)?;

    let loss_train = result.model.softmax_mse(&train)? / train.len() as f32;
    let loss_test = result.model.softmax_mse(&test)? / test.len() as f32;
    println!("train loss: {loss_train}\t test loss: {loss_test}");
    println!(
        "train accuracy: {}% test accuracy: {}%",
        result.last.train_accuracy, result.last.test_accuracy
    );

    Ok(())
}
