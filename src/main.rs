//! lenet-train CLI
//!
//! Trains LeNet-5 on a slice of MNIST and reports every epoch to a local
//! metrics listener.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: lr 0.1, 1 epoch, minibatch 32
//! lenet-train --data_path ./data
//!
//! # All training flags
//! lenet-train --data_path ./data --learning_rate 0.05 --epochs 30 --minibatch_size 16 --backend_type internal
//!
//! # Run file with overrides, no reporting
//! lenet-train --config run.yaml --epochs 5 --no_report
//! ```

use clap::{CommandFactory, Parser};
use lenet_train::config::{resolve_spec, train_from_spec, Cli};
use lenet_train::logging::setup_logging;
use lenet_train::train::CancellationToken;
use lenet_train::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet) {
        eprintln!("Warning: {e}");
    }

    let result = resolve_spec(&cli)
        .and_then(|spec| train_from_spec(&spec, &CancellationToken::new()));

    match result {
        Ok(summary) => {
            println!(
                "Final test accuracy: {}% after {} epoch(s). Model saved to {}",
                summary.last.test_accuracy,
                summary.history.len(),
                summary.model_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(Error::Validation(e)) => {
            eprintln!("{e}");
            eprintln!();
            eprintln!("{}", Cli::command().render_usage());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
