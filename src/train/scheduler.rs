//! Epoch orchestration: batches, evaluation, reporting

use super::callback::{CallbackContext, CallbackManager, TrainerCallback};
use super::cancel::CancellationToken;
use super::config::TrainingConfig;
use super::evaluation::evaluate_epoch;
use super::metrics::{EpochMetrics, MetricsHistory};
use super::model::Model;
use crate::data::Dataset;
use crate::monitor::{ReportOutcome, Reporter};
use crate::{Error, Result};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a completed run
#[derive(Debug)]
pub struct FinalResult<'m, M: ?Sized> {
    /// Metrics of the final epoch
    pub last: EpochMetrics,
    /// One entry per epoch, in order
    pub history: MetricsHistory,
    pub total_secs: f64,
    /// The trained model
    pub model: &'m M,
}

/// Drives a fixed number of epochs over a training set
///
/// Owns the reporter and callbacks for the run. The reporter is closed when
/// [`run`](Self::run) returns, whatever the outcome.
///
/// # Example
///
/// ```no_run
/// use lenet_train::monitor::MetricsReporter;
/// use lenet_train::train::{EpochScheduler, ProgressCallback, TrainingConfig};
/// # use lenet_train::data::Dataset;
/// # use lenet_train::nn::Network;
/// # fn demo(net: &mut Network, train: &Dataset, test: &Dataset) -> lenet_train::Result<()> {
///
/// let mut scheduler = EpochScheduler::new(
///     TrainingConfig::new(0.1, 5, 32),
///     Box::new(MetricsReporter::disabled()),
/// );
/// scheduler.add_callback(ProgressCallback::default());
///
/// let result = scheduler.run(net, train, test)?;
/// println!("{}", result.last);
/// # Ok(())
/// # }
/// ```
pub struct EpochScheduler {
    config: TrainingConfig,
    reporter: Box<dyn Reporter>,
    callbacks: CallbackManager,
    cancel: CancellationToken,
}

impl EpochScheduler {
    pub fn new(config: TrainingConfig, reporter: Box<dyn Reporter>) -> Self {
        Self {
            config,
            reporter,
            callbacks: CallbackManager::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run between batches once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn add_callback<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Token checked before every epoch and batch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Train `model` for the configured number of epochs
    ///
    /// Fails with [`Error::Config`] or [`Error::EmptyDataset`] before any
    /// batch when the configuration does not fit the data. A model error
    /// aborts the run; a cancelled run returns [`Error::Cancelled`] and drops
    /// the unfinished epoch.
    pub fn run<'m, M: Model + ?Sized>(
        &mut self,
        model: &'m mut M,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<FinalResult<'m, M>> {
        let outcome = self.run_epochs(&mut *model, train, test);
        self.reporter.close();

        let (history, total_secs) = outcome?;
        let last = history
            .last()
            .cloned()
            .ok_or_else(|| Error::Config("no epoch was run".to_string()))?;

        Ok(FinalResult {
            last,
            history,
            total_secs,
            model,
        })
    }

    fn check_preconditions(&self, train: &Dataset, test: &Dataset) -> Result<()> {
        if train.is_empty() || test.is_empty() {
            return Err(Error::EmptyDataset);
        }
        self.config.validate(train.len())
    }

    fn run_epochs<M: Model + ?Sized>(
        &mut self,
        model: &mut M,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<(MetricsHistory, f64)> {
        self.check_preconditions(train, test)?;

        let epochs = self.config.epochs;
        let batch_size = self.config.minibatch_size;
        let mut ctx = CallbackContext {
            epoch: 0,
            max_epochs: epochs,
            batch: 0,
            batches_per_epoch: self.config.batches_per_epoch(train.len()),
            samples_done: 0,
            samples_per_epoch: train.len(),
            elapsed_secs: 0.0,
        };

        info!(
            epochs,
            minibatch_size = batch_size,
            learning_rate = self.config.learning_rate,
            train = train.len(),
            test = test.len(),
            "starting run"
        );
        self.callbacks.on_train_begin(&ctx);

        let run_start = Instant::now();
        let mut history = MetricsHistory::new();

        for epoch in 1..=epochs {
            let completed_epochs = epoch - 1;
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled { completed_epochs });
            }

            let epoch_start = Instant::now();
            ctx.epoch = epoch;
            ctx.batch = 0;
            ctx.samples_done = 0;
            ctx.elapsed_secs = 0.0;
            self.callbacks.on_epoch_begin(&ctx);

            for batch in train.minibatches(batch_size) {
                if self.cancel.is_cancelled() {
                    info!(epoch, batch = batch.index, "run cancelled");
                    return Err(Error::Cancelled { completed_epochs });
                }

                model.train_batch(&batch)?;

                ctx.batch = batch.index + 1;
                ctx.samples_done = batch.offset + batch.len();
                ctx.elapsed_secs = epoch_start.elapsed().as_secs_f64();
                self.callbacks.on_batch_end(&ctx);
            }

            let metrics = evaluate_epoch(&*model, train, test, epoch, epoch_start.elapsed())?;

            match self.reporter.report(&metrics) {
                ReportOutcome::Sent { reply_len } => {
                    debug!(epoch, reply_len, "metrics delivered");
                }
                ReportOutcome::Skipped => {}
                ReportOutcome::Failed => debug!(epoch, "metrics record dropped"),
            }

            ctx.elapsed_secs = metrics.elapsed_secs;
            self.callbacks.on_epoch_end(&ctx, &metrics);
            history.push(metrics);
        }

        self.callbacks.on_train_end(history.as_slice());

        let total_secs = run_start.elapsed().as_secs_f64();
        info!(epochs = history.len(), total_secs, "run finished");
        Ok((history, total_secs))
    }
}

impl std::fmt::Debug for EpochScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochScheduler")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
