use crate::activator::Activator;
use crate::error::{check_len, Result};

use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// A single neuron: a weighted sum of its inputs plus a bias.
///
/// Field order matters, since it fixes the on-disk record of a unit: weight
/// count, weights, bias, learning rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
}

impl Unit {
    /// Initializes a new, untrained unit.
    ///
    /// Every weight and the bias are drawn uniformly from `[-1, 1]`.
    pub fn new<R>(rng: &mut R, inputs: usize, learning_rate: f64) -> Self
    where
        R: Rng + ?Sized,
    {
        let weights = (0..inputs).map(|_| rng.gen_range(-1.0..=1.0)).collect();
        Unit {
            weights,
            bias: rng.gen_range(-1.0..=1.0),
            learning_rate,
        }
    }

    /// Initializes a unit with all weights and the bias set to zero.
    pub fn zeroed(inputs: usize, learning_rate: f64) -> Self {
        Unit {
            weights: vec![0.0; inputs],
            bias: 0.0,
            learning_rate,
        }
    }

    /// Builds a unit from explicit parameters.
    pub fn from_parts(weights: Vec<f64>, bias: f64, learning_rate: f64) -> Self {
        Unit {
            weights,
            bias,
            learning_rate,
        }
    }

    /// Returns the number of inputs this unit accepts.
    pub fn input_len(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mutable access to the weights. The slice cannot change length.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Returns `bias + Σ weights[i] * input[i]`.
    pub fn compute_raw(&self, input: &[f64]) -> Result<f64> {
        check_len(self.weights.len(), input.len())?;
        Ok(self
            .weights
            .iter()
            .zip(input)
            .fold(self.bias, |sum, (w, x)| sum + w * x))
    }

    /// Returns the sigmoid of the weighted sum.
    pub fn compute_activated(&self, input: &[f64]) -> Result<f64> {
        self.compute(input, Activator::Sigmoid)
    }

    /// Returns the weighted sum passed through `activator`.
    pub fn compute(&self, input: &[f64], activator: Activator) -> Result<f64> {
        self.compute_raw(input).map(|x| activator.f(x))
    }

    /// Takes one gradient descent step.
    ///
    /// `delta` is the derivative of the loss with respect to this unit's
    /// weighted sum, so `delta * input[i]` is the gradient of weight `i`.
    pub fn apply_gradient(&mut self, input: &[f64], delta: f64) -> Result<()> {
        check_len(self.weights.len(), input.len())?;
        let step = self.learning_rate * delta;
        for (w, x) in self.weights.iter_mut().zip(input) {
            *w -= step * x;
        }
        self.bias -= step;
        Ok(())
    }
}
