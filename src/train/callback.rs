//! Observer hooks for training events
//!
//! Callbacks watch the run; they cannot steer it. Stopping early goes through
//! [`CancellationToken`](super::CancellationToken).
//!
//! # Example
//!
//! ```rust
//! use lenet_train::train::{CallbackContext, EpochMetrics, TrainerCallback};
//!
//! struct PrintCallback;
//!
//! impl TrainerCallback for PrintCallback {
//!     fn on_epoch_end(&mut self, ctx: &CallbackContext, metrics: &EpochMetrics) {
//!         println!("epoch {}/{}: {}", ctx.epoch, ctx.max_epochs, metrics.test_accuracy);
//!     }
//! }
//! ```

use super::metrics::EpochMetrics;
use tracing::{debug, info};

/// Position of the run when a callback fires
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallbackContext {
    /// Current epoch (1-based)
    pub epoch: usize,
    pub max_epochs: usize,
    /// Batches finished in this epoch
    pub batch: usize,
    pub batches_per_epoch: usize,
    /// Samples consumed in this epoch
    pub samples_done: usize,
    pub samples_per_epoch: usize,
    /// Seconds since the epoch began
    pub elapsed_secs: f64,
}

/// Hooks with no-op defaults; implement the ones you need
pub trait TrainerCallback {
    fn on_train_begin(&mut self, _ctx: &CallbackContext) {}

    fn on_epoch_begin(&mut self, _ctx: &CallbackContext) {}

    fn on_batch_end(&mut self, _ctx: &CallbackContext) {}

    /// After evaluation and reporting of the epoch
    fn on_epoch_end(&mut self, _ctx: &CallbackContext, _metrics: &EpochMetrics) {}

    /// Fires only when every epoch completed
    fn on_train_end(&mut self, _history: &[EpochMetrics]) {}

    fn name(&self) -> &str {
        "TrainerCallback"
    }
}

// =============================================================================
// Progress Callback
// =============================================================================

/// Prints the per-epoch summary lines and logs batch progress
#[derive(Clone, Debug)]
pub struct ProgressCallback {
    /// Log every N batches
    log_interval: usize,
}

impl ProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl Default for ProgressCallback {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TrainerCallback for ProgressCallback {
    fn on_train_begin(&mut self, ctx: &CallbackContext) {
        info!(
            epochs = ctx.max_epochs,
            batches_per_epoch = ctx.batches_per_epoch,
            samples = ctx.samples_per_epoch,
            "start training"
        );
    }

    fn on_batch_end(&mut self, ctx: &CallbackContext) {
        if ctx.batch % self.log_interval == 0 || ctx.batch == ctx.batches_per_epoch {
            debug!(
                epoch = ctx.epoch,
                "{}/{} samples",
                ctx.samples_done,
                ctx.samples_per_epoch
            );
        }
    }

    fn on_epoch_end(&mut self, ctx: &CallbackContext, metrics: &EpochMetrics) {
        println!(
            "Epoch {}/{} finished. {:.3}s elapsed.",
            ctx.epoch, ctx.max_epochs, metrics.elapsed_secs
        );
        println!("{metrics}");
    }

    fn on_train_end(&mut self, history: &[EpochMetrics]) {
        info!(epochs = history.len(), "end training");
    }

    fn name(&self) -> &str {
        "ProgressCallback"
    }
}

// =============================================================================
// Callback Manager
// =============================================================================

/// Fires events on every registered callback in registration order
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn add_boxed(&mut self, callback: Box<dyn TrainerCallback>) {
        self.callbacks.push(callback);
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    pub fn on_train_begin(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_train_begin(ctx);
        }
    }

    pub fn on_epoch_begin(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_epoch_begin(ctx);
        }
    }

    pub fn on_batch_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_batch_end(ctx);
        }
    }

    pub fn on_epoch_end(&mut self, ctx: &CallbackContext, metrics: &EpochMetrics) {
        for cb in &mut self.callbacks {
            cb.on_epoch_end(ctx, metrics);
        }
    }

    pub fn on_train_end(&mut self, history: &[EpochMetrics]) {
        for cb in &mut self.callbacks {
            cb.on_train_end(history);
        }
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("callbacks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        tag: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl TrainerCallback for Recorder {
        fn on_train_begin(&mut self, _ctx: &CallbackContext) {
            self.log.borrow_mut().push(format!("{}:begin", self.tag));
        }

        fn on_batch_end(&mut self, ctx: &CallbackContext) {
            self.log
                .borrow_mut()
                .push(format!("{}:batch{}", self.tag, ctx.batch));
        }

        fn on_epoch_end(&mut self, ctx: &CallbackContext, _metrics: &EpochMetrics) {
            self.log
                .borrow_mut()
                .push(format!("{}:epoch{}", self.tag, ctx.epoch));
        }

        fn name(&self) -> &str {
            self.tag
        }
    }

    #[test]
    fn test_manager_fires_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = CallbackManager::new();
        manager.add(Recorder {
            tag: "a",
            log: Rc::clone(&log),
        });
        manager.add(Recorder {
            tag: "b",
            log: Rc::clone(&log),
        });

        let ctx = CallbackContext {
            epoch: 1,
            batch: 2,
            ..CallbackContext::default()
        };
        manager.on_train_begin(&ctx);
        manager.on_batch_end(&ctx);
        manager.on_epoch_end(&ctx, &EpochMetrics {
            epoch: 1,
            train_loss: 0.0,
            test_loss: 0.0,
            train_accuracy: 0.0,
            test_accuracy: 0.0,
            elapsed_secs: 0.0,
        });

        assert_eq!(
            *log.borrow(),
            vec!["a:begin", "b:begin", "a:batch2", "b:batch2", "a:epoch1", "b:epoch1"]
        );
        assert_eq!(manager.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_default_hooks_are_noops() {
        struct Silent;
        impl TrainerCallback for Silent {}

        let mut manager = CallbackManager::new();
        assert!(manager.is_empty());
        manager.add(Silent);
        manager.on_train_end(&[]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.names(), vec!["TrainerCallback"]);
    }

    #[test]
    fn test_progress_interval_never_zero() {
        assert_eq!(ProgressCallback::new(0).log_interval, 1);
    }
}
