//! Utilities for training neural networks.
//!
//! Training is online gradient descent: every example updates the weights
//! immediately, in dataset order. After each epoch the network is scored on
//! the training set (and the validation set, when given) and an early
//! stopping policy decides whether to continue.

use crate::error::{check_len, Error, Result};
use crate::feed_forward::{Metrics, Network};

use log::info;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// The signal early stopping watches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppingMetric {
    /// Improvement means the mean squared error dropped by more than the
    /// minimal improvement.
    MinimizeLoss,
    /// Improvement means the accuracy rose by more than the minimal
    /// improvement.
    MaximizeAccuracy,
}

impl StoppingMetric {
    /// The minimal improvement used when none is configured.
    pub fn default_min_improvement(&self) -> f64 {
        match *self {
            StoppingMetric::MinimizeLoss => 1e-4,
            StoppingMetric::MaximizeAccuracy => 1e-3,
        }
    }

    /// The starting point that any finite first epoch improves on.
    fn worst(&self) -> f64 {
        match *self {
            StoppingMetric::MinimizeLoss => f64::INFINITY,
            StoppingMetric::MaximizeAccuracy => f64::NEG_INFINITY,
        }
    }

    fn value(&self, metrics: &Metrics) -> f64 {
        match *self {
            StoppingMetric::MinimizeLoss => metrics.mse,
            StoppingMetric::MaximizeAccuracy => metrics.accuracy,
        }
    }

    fn improves(&self, current: f64, best: f64, min_improvement: f64) -> bool {
        match *self {
            StoppingMetric::MinimizeLoss => current < best - min_improvement,
            StoppingMetric::MaximizeAccuracy => current > best + min_improvement,
        }
    }
}

/// Tracks the best value of a metric and how many epochs have passed
/// without beating it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EarlyStopping {
    metric: StoppingMetric,
    min_improvement: f64,
    patience: usize,
    best: f64,
    stale: usize,
}

impl EarlyStopping {
    /// Starts from the metric's worst value, so the first update always
    /// improves.
    pub fn new(metric: StoppingMetric, patience: usize, min_improvement: f64) -> EarlyStopping {
        EarlyStopping {
            metric,
            min_improvement,
            patience,
            best: metric.worst(),
            stale: 0,
        }
    }

    /// Records one epoch's value of the metric, returning whether it
    /// improved on the best so far. An improvement resets the stale count.
    pub fn update(&mut self, value: f64) -> bool {
        let improved = self.metric.improves(value, self.best, self.min_improvement);
        if improved {
            self.best = value;
            self.stale = 0;
        } else {
            self.stale += 1;
        }
        improved
    }

    /// Whether `patience` epochs in a row have gone by without improvement.
    pub fn should_stop(&self) -> bool {
        self.stale >= self.patience
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn stale_epochs(&self) -> usize {
        self.stale
    }
}

/// Logging frequency to use during training
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Logging {
    /// No logs will be emitted
    Silent,
    /// A summary will be logged at completion
    Completion,
    /// A summary will be logged after every `n` epochs, and at completion
    Epochs(usize),
}

impl Logging {
    /// Performs logging at the end of an epoch.
    fn epoch(&self, report: &EpochReport) {
        if let Logging::Epochs(freq) = *self {
            if freq > 0 && report.epoch % freq == 0 {
                info!("{}", report);
            }
        }
    }

    /// Performs logging at the end of training.
    fn completion(&self, report: &TrainingReport, start_time: Instant) {
        if let Logging::Silent = *self {
            return;
        }
        info!(
            "Ran {} epochs in {:.2} seconds ({}).",
            report.epochs_run,
            start_time.elapsed().as_secs_f64(),
            report.stop_reason
        );
        info!("Best tracked value: {}", report.best);
    }
}

/// Why the training loop ended. Neither case is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of epochs ran.
    MaxEpochs,
    /// The tracked metric did not improve for `patience` epochs in a row.
    EarlyStopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StopReason::MaxEpochs => write!(f, "epoch limit reached"),
            StopReason::EarlyStopped => write!(f, "stopped early"),
        }
    }
}

/// The outcome of a single epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch index.
    pub epoch: usize,
    pub training: Metrics,
    pub validation: Option<Metrics>,
    /// Whether the tracked metric improved during this epoch.
    pub improved: bool,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Epoch {}:\tMSE={:.6}\taccuracy={:.2}%",
            self.epoch,
            self.training.mse,
            self.training.accuracy * 100.0
        )?;
        if let Some(validation) = &self.validation {
            write!(
                f,
                "\tvalidation MSE={:.6}\tvalidation accuracy={:.2}%",
                validation.mse,
                validation.accuracy * 100.0
            )?;
        }
        Ok(())
    }
}

/// The outcome of a full training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub stop_reason: StopReason,
    /// Best value of the tracked metric.
    pub best: f64,
    pub history: Vec<EpochReport>,
}

impl TrainingReport {
    /// Returns the report of the final epoch, if any epoch ran.
    pub fn last_epoch(&self) -> Option<&EpochReport> {
        self.history.last()
    }
}

/// A builder for training runs.
pub struct Trainer<'a> {
    epochs: usize,
    patience: usize,
    min_improvement: Option<f64>,
    stopping_metric: StoppingMetric,
    logging: Logging,
    observer: Option<Box<dyn FnMut(&EpochReport) + 'a>>,
}

impl<'a> Default for Trainer<'a> {
    fn default() -> Self {
        Trainer::new()
    }
}

impl<'a> fmt::Debug for Trainer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("epochs", &self.epochs)
            .field("patience", &self.patience)
            .field("min_improvement", &self.effective_min_improvement())
            .field("stopping_metric", &self.stopping_metric)
            .field("logging", &self.logging)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl<'a> Trainer<'a> {
    /// Creates a new Trainer instance.
    ///
    /// The trainer is initialized with some default values. These defaults are:
    ///
    /// * At most 100 epochs.
    /// * A patience of 5 epochs.
    /// * Early stopping on accuracy, with the metric's default minimal
    ///   improvement.
    /// * Logs on training completion.
    pub fn new() -> Self {
        Trainer {
            epochs: 100,
            patience: 5,
            min_improvement: None,
            stopping_metric: StoppingMetric::MaximizeAccuracy,
            logging: Logging::Completion,
            observer: None,
        }
    }

    /// Sets the maximum number of epochs.
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets how many epochs in a row may pass without improvement.
    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Sets the margin by which the tracked metric must beat its best value.
    pub fn min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = Some(min_improvement);
        self
    }

    /// Sets the metric early stopping tracks.
    pub fn stopping_metric(mut self, metric: StoppingMetric) -> Self {
        self.stopping_metric = metric;
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Registers a callback that receives every epoch's report.
    pub fn on_epoch<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&EpochReport) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    fn effective_min_improvement(&self) -> f64 {
        self.min_improvement
            .unwrap_or_else(|| self.stopping_metric.default_min_improvement())
    }

    /// Trains `network` on `training`, one example at a time in the given
    /// order.
    ///
    /// The tracked metric comes from `validation` when it is provided,
    /// otherwise from `training`. Training ends after `epochs` epochs, or
    /// once the metric has gone `patience` epochs in a row without
    /// improving, whichever comes first.
    pub fn train<I, O>(
        mut self,
        network: &mut Network,
        training: &[(I, O)],
        validation: Option<&[(I, O)]>,
    ) -> Result<TrainingReport>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        validate(network, training)?;
        if let Some(validation) = validation {
            validate(network, validation)?;
        }

        let start_time = Instant::now();
        let metric = self.stopping_metric;
        let mut stopping =
            EarlyStopping::new(metric, self.patience, self.effective_min_improvement());
        let mut history = Vec::new();
        let mut stop_reason = StopReason::MaxEpochs;

        for epoch in 1..=self.epochs {
            for (input, target) in training {
                network.train(input.as_ref(), target.as_ref())?;
            }

            let training_metrics = network.evaluate(training)?;
            let validation_metrics = match validation {
                Some(samples) => Some(network.evaluate(samples)?),
                None => None,
            };
            let current = metric.value(validation_metrics.as_ref().unwrap_or(&training_metrics));
            let improved = stopping.update(current);

            let report = EpochReport {
                epoch,
                training: training_metrics,
                validation: validation_metrics,
                improved,
            };
            self.logging.epoch(&report);
            if let Some(observer) = self.observer.as_mut() {
                observer(&report);
            }
            history.push(report);

            if stopping.should_stop() {
                if self.logging != Logging::Silent {
                    info!("Early stopping triggered after {} epochs.", epoch);
                }
                stop_reason = StopReason::EarlyStopped;
                break;
            }
        }

        let report = TrainingReport {
            epochs_run: history.len(),
            stop_reason,
            best: stopping.best(),
            history,
        };
        self.logging.completion(&report, start_time);
        Ok(report)
    }
}

/// Verifies that a labelled set fits `network`, returning an error if
/// something is wrong.
fn validate<I, O>(network: &Network, samples: &[(I, O)]) -> Result<()>
where
    I: AsRef<[f64]>,
    O: AsRef<[f64]>,
{
    if samples.is_empty() {
        return Err(Error::InvalidData("training requires at least one example".into()));
    }
    for (input, target) in samples {
        check_len(network.input_len(), input.as_ref().len())?;
        check_len(network.output_len(), target.as_ref().len())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_forward::{NetworkConfig, OutputMode};
    use std::cell::RefCell;

    fn and_gate() -> Vec<([f64; 2], [f64; 2])> {
        vec![
            ([0.0, 0.0], [1.0, 0.0]),
            ([0.0, 1.0], [1.0, 0.0]),
            ([1.0, 0.0], [1.0, 0.0]),
            ([1.0, 1.0], [0.0, 1.0]),
        ]
    }

    /// Every input appears once per class, so whatever the weights, exactly
    /// half of the samples are classified correctly.
    fn plateau_validation() -> Vec<([f64; 2], [f64; 2])> {
        vec![
            ([0.0, 1.0], [1.0, 0.0]),
            ([0.0, 1.0], [0.0, 1.0]),
            ([1.0, 1.0], [1.0, 0.0]),
            ([1.0, 1.0], [0.0, 1.0]),
        ]
    }

    #[test]
    fn empty_training_set() {
        let mut network = Network::new(&NetworkConfig::new(2, &[], 2).seed(0)).unwrap();
        let examples: Vec<([f64; 2], [f64; 2])> = vec![];
        assert!(matches!(
            Trainer::new().train(&mut network, &examples, None),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn wrong_input_size() {
        let mut network = Network::new(&NetworkConfig::new(2, &[2], 2).seed(0)).unwrap();
        let before = network.clone();
        let examples = [(vec![0.0, 0.0], vec![1.0, 0.0]), (vec![0.0], vec![1.0, 0.0])];
        assert!(matches!(
            Trainer::new().train(&mut network, &examples, None),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(network, before);
    }

    #[test]
    fn wrong_validation_target_size() {
        let mut network = Network::new(&NetworkConfig::new(2, &[2], 2).seed(0)).unwrap();
        let training = [(vec![0.0, 0.0], vec![1.0, 0.0])];
        let validation = [(vec![0.0, 0.0], vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            Trainer::new().train(&mut network, &training, Some(&validation[..])),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn perceptron_learns_and_gate() {
        let config = NetworkConfig::new(2, &[], 2).learning_rate(0.5).seed(17);
        let mut network = Network::new(&config).unwrap();
        let report = Trainer::new()
            .epochs(500)
            .patience(500)
            .logging(Logging::Silent)
            .train(&mut network, &and_gate(), None)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::MaxEpochs);
        assert_eq!(report.last_epoch().unwrap().training.accuracy, 1.0);
        for (input, target) in and_gate() {
            let expected = if target[1] == 1.0 { 1 } else { 0 };
            assert_eq!(network.predict_class(&input).unwrap(), expected);
        }
    }

    #[test]
    fn stops_after_validation_plateau() {
        let mut network = Network::new(&NetworkConfig::new(2, &[3], 2).seed(4)).unwrap();
        let epochs = RefCell::new(Vec::new());
        let report = Trainer::new()
            .epochs(100)
            .patience(4)
            .stopping_metric(StoppingMetric::MaximizeAccuracy)
            .on_epoch(|r| epochs.borrow_mut().push(r.epoch))
            .train(&mut network, &and_gate(), Some(&plateau_validation()[..]))
            .unwrap();

        // The first epoch sets the plateau, the next `patience` fail to beat it.
        assert_eq!(report.stop_reason, StopReason::EarlyStopped);
        assert_eq!(report.epochs_run, 1 + 4);
        assert_eq!(report.best, 0.5);
        assert_eq!(*epochs.borrow(), vec![1, 2, 3, 4, 5]);
        assert!(report.history[0].improved);
        assert!(report.history[1..].iter().all(|r| !r.improved));
        assert!(report.history.iter().all(|r| r.validation.unwrap().accuracy == 0.5));
    }

    #[test]
    fn loss_metric_runs_to_epoch_limit_while_improving() {
        let config = NetworkConfig::new(2, &[], 2).learning_rate(0.1).seed(8);
        let mut network = Network::new(&config).unwrap();
        let report = Trainer::new()
            .epochs(10)
            .patience(10)
            .min_improvement(0.0)
            .stopping_metric(StoppingMetric::MinimizeLoss)
            .logging(Logging::Epochs(1))
            .train(&mut network, &and_gate(), None)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::MaxEpochs);
        assert_eq!(report.epochs_run, 10);
        let lowest = report
            .history
            .iter()
            .map(|r| r.training.mse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.best, lowest);
        assert!(report.history[0].improved);
        assert!(report.history.iter().all(|r| r.validation.is_none()));
    }

    /// Feeds `values` one epoch at a time, returning the epoch (1-based)
    /// at which the policy asks to stop.
    fn stop_epoch(stopping: &mut EarlyStopping, values: &[f64]) -> Option<usize> {
        for (i, &value) in values.iter().enumerate() {
            stopping.update(value);
            if stopping.should_stop() {
                return Some(i + 1);
            }
        }
        None
    }

    #[test]
    fn improvement_resets_stale_count() {
        let mut stopping = EarlyStopping::new(StoppingMetric::MinimizeLoss, 3, 0.0);
        assert!(stopping.update(1.0));
        assert!(!stopping.update(1.0));
        assert_eq!(stopping.stale_epochs(), 1);
        assert!(stopping.update(0.5));
        assert_eq!(stopping.stale_epochs(), 0);
        assert_eq!(stopping.best(), 0.5);
        assert!(!stopping.update(0.6));
        assert!(!stopping.update(0.5));
        assert!(!stopping.should_stop());
        assert!(!stopping.update(0.7));
        assert!(stopping.should_stop());
        assert_eq!(stopping.best(), 0.5);
    }

    #[test]
    fn stops_patience_epochs_after_last_improvement() {
        // improve, stale, improve at epoch 3, then stale for good.
        let losses = [1.0, 1.0, 0.5, 0.6, 0.5, 0.7, 0.8, 0.9];
        let mut stopping = EarlyStopping::new(StoppingMetric::MinimizeLoss, 3, 0.0);
        assert_eq!(stop_epoch(&mut stopping, &losses), Some(3 + 3));

        // Last improvement at epoch 4.
        let accuracies = [0.2, 0.4, 0.4, 0.6, 0.6, 0.55, 0.6, 0.6];
        let mut stopping = EarlyStopping::new(StoppingMetric::MaximizeAccuracy, 2, 1e-3);
        assert_eq!(stop_epoch(&mut stopping, &accuracies), Some(4 + 2));
    }

    #[test]
    fn min_improvement_counts_small_gains_as_stale() {
        let mut stopping = EarlyStopping::new(StoppingMetric::MaximizeAccuracy, 2, 0.05);
        assert!(stopping.update(0.5));
        assert!(!stopping.update(0.53));
        assert!(!stopping.update(0.55));
        assert!(stopping.should_stop());
        assert_eq!(stopping.best(), 0.5);
    }

    #[test]
    fn zero_patience_stops_after_first_epoch() {
        let mut network = Network::new(&NetworkConfig::new(2, &[], 2).seed(2)).unwrap();
        let report = Trainer::new()
            .epochs(10)
            .patience(0)
            .train(&mut network, &and_gate(), None)
            .unwrap();
        assert_eq!(report.epochs_run, 1);
        assert_eq!(report.stop_reason, StopReason::EarlyStopped);
    }

    #[test]
    fn zero_epochs_leaves_network_untouched() {
        let mut network = Network::new(&NetworkConfig::new(2, &[2], 2).seed(2)).unwrap();
        let before = network.clone();
        let report = Trainer::new()
            .epochs(0)
            .train(&mut network, &and_gate(), None)
            .unwrap();
        assert_eq!(report.epochs_run, 0);
        assert_eq!(report.stop_reason, StopReason::MaxEpochs);
        assert_eq!(network, before);
    }

    #[test]
    fn training_is_deterministic() {
        let config = NetworkConfig::new(2, &[4, 3], 2)
            .output_mode(OutputMode::SigmoidMse)
            .learning_rate(0.3)
            .seed(99);
        let run = || {
            let mut network = Network::new(&config).unwrap();
            let report = Trainer::new()
                .epochs(25)
                .stopping_metric(StoppingMetric::MinimizeLoss)
                .train(&mut network, &and_gate(), Some(&plateau_validation()[..]))
                .unwrap();
            (network, report)
        };
        let (first, first_report) = run();
        let (second, second_report) = run();
        assert_eq!(first, second);
        assert_eq!(first_report, second_report);
    }

    #[test]
    fn start_training_tracks_accuracy() {
        let mut network = Network::new(&NetworkConfig::new(2, &[3], 2).seed(4)).unwrap();
        let report = network
            .start_training(&and_gate(), Some(&plateau_validation()[..]), 50, 2, 1e-3)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::EarlyStopped);
        assert_eq!(report.epochs_run, 3);
    }

    #[test]
    fn epoch_report_display() {
        let report = EpochReport {
            epoch: 3,
            training: Metrics { mse: 0.25, accuracy: 0.5 },
            validation: Some(Metrics { mse: 0.125, accuracy: 0.75 }),
            improved: true,
        };
        let line = report.to_string();
        assert!(line.starts_with("Epoch 3:"));
        assert!(line.contains("accuracy=50.00%"));
        assert!(line.contains("validation accuracy=75.00%"));
    }
}
