//! A [Feedforward neural network]
//! (https://en.wikipedia.org/wiki/Feedforward_neural_network) trained with
//! online backpropagation.
//!
//! # Example
//!
//! Let's build a network for three classes and push a sample through it:
//!
//! ```
//! # use mlp::feed_forward::*;
//! let config = NetworkConfig::new(4, &[8, 6], 3)
//!     .learning_rate(0.05)
//!     .seed(42);
//! let mut network = Network::new(&config).unwrap();
//!
//! let input = [0.1, 0.9, 0.3, 0.0];
//! let probabilities = network.forward(&input).unwrap();
//! assert_eq!(probabilities.len(), 3);
//! assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
//!
//! // A single backpropagation step towards class 2.
//! network.train(&input, &[0.0, 0.0, 1.0]).unwrap();
//! assert!(network.predict_class(&input).unwrap() < 3);
//! ```

use crate::activator::Activator;
use crate::error::{check_len, Error, Result};
use crate::layer::{self, Layer};
use crate::trainer::{StoppingMetric, Trainer, TrainingReport};
use crate::utils::{argmax, mean_square_error, softmax};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

/// How the output layer turns weighted sums into predictions, and which
/// loss its gradient follows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Sigmoid outputs trained against the squared error.
    SigmoidMse,
    /// Softmax probabilities trained against the cross-entropy.
    #[default]
    SoftmaxCrossEntropy,
}

/// The shape and hyperparameters of a network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
    pub learning_rate: f64,
    pub output_mode: OutputMode,
    /// Seeds weight initialization. `None` draws the seed from the OS.
    pub seed: Option<u64>,
}

impl NetworkConfig {
    /// Creates a configuration with the given layer sizes.
    ///
    /// The defaults are:
    ///
    /// * A learning rate of 0.1.
    /// * Softmax outputs with a cross-entropy gradient.
    /// * Randomly seeded weights.
    pub fn new(input_size: usize, hidden_sizes: &[usize], output_size: usize) -> Self {
        NetworkConfig {
            input_size,
            hidden_sizes: hidden_sizes.to_vec(),
            output_size,
            learning_rate: 0.1,
            output_mode: OutputMode::default(),
            seed: None,
        }
    }

    /// Sets the learning rate shared by every unit.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Sets the `OutputMode` of the network.
    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Makes weight initialization reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(Error::InvalidConfig("input size must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Mean squared error and classification accuracy over a labelled set.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mse: f64,
    pub accuracy: f64,
}

/// A Feedforward neural network
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    hidden: Vec<Layer>,
    output: Layer,
    mode: OutputMode,
}

impl Network {
    /// Creates a new, untrained neural network from `config`.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Network::with_rng(config, &mut rng)
    }

    /// Creates a new, untrained neural network drawing its initial weights
    /// from `rng`.
    pub fn with_rng<R>(config: &NetworkConfig, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        config.validate()?;
        let mut hidden = Vec::with_capacity(config.hidden_sizes.len());
        let mut inputs = config.input_size;
        for &size in &config.hidden_sizes {
            hidden.push(Layer::new(rng, inputs, size, config.learning_rate)?);
            inputs = size;
        }
        let output = Layer::new(rng, inputs, config.output_size, config.learning_rate)?;
        Ok(Network {
            hidden,
            output,
            mode: config.output_mode,
        })
    }

    /// Assembles a network from existing layers, checking that consecutive
    /// layers fit together.
    pub fn from_layers(hidden: Vec<Layer>, output: Layer, mode: OutputMode) -> Result<Self> {
        let network = Network {
            hidden,
            output,
            mode,
        };
        network.validate()?;
        Ok(network)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut expected = None;
        for layer in self.layers() {
            layer.validate()?;
            if let Some(width) = expected {
                check_len(width, layer.input_len())?;
            }
            expected = Some(layer.output_len());
        }
        Ok(())
    }

    /// Returns the size of the input layer to the network.
    pub fn input_len(&self) -> usize {
        self.hidden.first().unwrap_or(&self.output).input_len()
    }

    /// Returns the size of the output layer from the network.
    pub fn output_len(&self) -> usize {
        self.output.output_len()
    }

    pub fn hidden_layers(&self) -> &[Layer] {
        &self.hidden
    }

    pub fn hidden_layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.hidden.get_mut(index)
    }

    pub fn output_layer(&self) -> &Layer {
        &self.output
    }

    pub fn output_layer_mut(&mut self) -> &mut Layer {
        &mut self.output
    }

    pub fn output_mode(&self) -> OutputMode {
        self.mode
    }

    /// Iterates over every layer, hidden layers first.
    fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.hidden.iter().chain(std::iter::once(&self.output))
    }

    fn output_activator(&self) -> Activator {
        match self.mode {
            OutputMode::SigmoidMse => Activator::Sigmoid,
            OutputMode::SoftmaxCrossEntropy => Activator::Identity,
        }
    }

    /// Feeds the provided `input` through the network, returning the output
    /// layer.
    ///
    /// In softmax mode the result is a probability distribution over the
    /// output units.
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut activations = input.to_vec();
        for layer in &self.hidden {
            activations = layer.compute_outputs(&activations, Activator::Sigmoid)?;
        }
        let raw = self.output.compute_outputs(&activations, self.output_activator())?;
        self.finish(raw)
    }

    /// Fails instead of returning NaN outputs.
    fn finish(&self, outputs: Vec<f64>) -> Result<Vec<f64>> {
        match self.mode {
            OutputMode::SigmoidMse if outputs.iter().any(|o| o.is_nan()) => {
                Err(Error::InvalidData("network output is NaN".into()))
            }
            OutputMode::SigmoidMse => Ok(outputs),
            OutputMode::SoftmaxCrossEntropy => softmax(&outputs),
        }
    }

    /// Returns the index of the most likely class for `input`.
    pub fn predict_class(&self, input: &[f64]) -> Result<usize> {
        let output = self.forward(input)?;
        argmax(&output).ok_or(Error::EmptyLayer)
    }

    /// Feeds the provided `input` through the network, returning the activated
    /// values for each layer. Index 0 holds the input itself and the last
    /// entry holds the final network output.
    fn feed_forward(&self, input: &[f64]) -> Result<Vec<Vec<f64>>> {
        let mut activations = Vec::with_capacity(self.hidden.len() + 2);
        activations.push(input.to_vec());
        for layer in &self.hidden {
            let next =
                layer.compute_outputs(&activations[activations.len() - 1], Activator::Sigmoid)?;
            activations.push(next);
        }
        let raw = self
            .output
            .compute_outputs(&activations[activations.len() - 1], self.output_activator())?;
        activations.push(self.finish(raw)?);
        Ok(activations)
    }

    /// Performs a single backpropagation step on one labelled example.
    ///
    /// Every layer's error is carried to the layer below before that layer's
    /// own weights move, so all deltas refer to the weights used in the
    /// forward pass.
    pub fn train(&mut self, input: &[f64], target: &[f64]) -> Result<()> {
        check_len(self.input_len(), input.len())?;
        check_len(self.output_len(), target.len())?;
        let activations = self.feed_forward(input)?;
        let output = &activations[activations.len() - 1];

        let errors: Vec<f64> = output.iter().zip(target).map(|(o, t)| o - t).collect();
        let mut deltas = match self.mode {
            OutputMode::SigmoidMse => layer::local_deltas(Activator::Sigmoid, output, &errors)?,
            OutputMode::SoftmaxCrossEntropy => errors,
        };

        let depth = self.hidden.len();
        let mut layers: Vec<&mut Layer> = self
            .hidden
            .iter_mut()
            .chain(std::iter::once(&mut self.output))
            .collect();
        for i in (0..=depth).rev() {
            let below = if i > 0 {
                let errors = layers[i].backward(&deltas)?;
                Some(layer::local_deltas(Activator::Sigmoid, &activations[i], &errors)?)
            } else {
                None
            };
            layers[i].apply_gradients(&activations[i], &deltas)?;
            match below {
                Some(next) => deltas = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Computes the mean squared error and the accuracy of the network over
    /// `samples`, comparing the argmax of each output with the argmax of its
    /// one-hot target.
    pub fn evaluate<I, O>(&self, samples: &[(I, O)]) -> Result<Metrics>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        if samples.is_empty() {
            return Err(Error::InvalidData("cannot evaluate an empty set".into()));
        }
        let mut total_error = 0.0;
        let mut correct = 0;
        for (input, target) in samples {
            let target = target.as_ref();
            let output = self.forward(input.as_ref())?;
            total_error += mean_square_error(&output, target)?;
            if argmax(&output) == argmax(target) {
                correct += 1;
            }
        }
        let n = samples.len() as f64;
        Ok(Metrics {
            mse: total_error / n,
            accuracy: correct as f64 / n,
        })
    }

    /// Returns the fraction of `samples` classified correctly.
    pub fn accuracy<I, O>(&self, samples: &[(I, O)]) -> Result<f64>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        self.evaluate(samples).map(|m| m.accuracy)
    }

    /// Trains the network on `training`, stopping early once the tracked
    /// accuracy stalls for `patience` epochs.
    ///
    /// Accuracy is taken from `validation` when given, otherwise from the
    /// training set. Use `Trainer` directly to track the loss instead or to
    /// observe each epoch.
    pub fn start_training<I, O>(
        &mut self,
        training: &[(I, O)],
        validation: Option<&[(I, O)]>,
        epochs: usize,
        patience: usize,
        min_improvement: f64,
    ) -> Result<TrainingReport>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        Trainer::new()
            .stopping_metric(StoppingMetric::MaximizeAccuracy)
            .epochs(epochs)
            .patience(patience)
            .min_improvement(min_improvement)
            .train(self, training, validation)
    }
}
