//! Local listener for `lenet-train` epoch metrics
//!
//! ```bash
//! metrics-sink                       # 127.0.0.1:8080, replies "ok"
//! metrics-sink --addr 0.0.0.0:9000
//! ```

use clap::Parser;
use lenet_train::logging::setup_logging;
use lenet_train::monitor::{MetricsSink, DEFAULT_ACK, DEFAULT_METRICS_ADDR};
use lenet_train::train::CancellationToken;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "metrics-sink")]
#[command(version)]
#[command(about = "Print the per-epoch metrics sent by lenet-train")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_METRICS_ADDR)]
    addr: String,

    /// Never acknowledge messages
    #[arg(long)]
    silent: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose, false) {
        eprintln!("Warning: {e}");
    }

    let sink = match MetricsSink::bind(&args.addr) {
        Ok(sink) => sink.with_ack((!args.silent).then(|| DEFAULT_ACK.to_vec())),
        Err(e) => {
            eprintln!("Error: cannot listen on {}: {e}", args.addr);
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %args.addr, "waiting for metrics");

    let mut epoch = 0;
    let result = sink.serve(&CancellationToken::new(), |peer, record| {
        epoch += 1;
        println!(
            "[{peer}] #{epoch} train loss: {} test loss: {} train accuracy: {}% test accuracy: {}%",
            record.train_loss, record.test_loss, record.train_accuracy, record.test_accuracy
        );
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
