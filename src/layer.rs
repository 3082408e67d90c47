use crate::activator::Activator;
use crate::error::{check_len, Error, Result};
use crate::unit::Unit;

use itertools::multizip;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// A wrapper for a single fully connected layer of the neural network.
///
/// Every unit in a layer reads the same input vector, so all of them carry
/// the same number of weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    units: Vec<Unit>,
}

impl Layer {
    /// Initializes a new, untrained layer.
    ///
    /// Arguments:
    ///
    ///  * `inputs` - the number of inputs to this layer.
    ///  * `outputs` - the number of units in this layer.
    ///  * `learning_rate` - the gradient descent step size of every unit.
    pub fn new<R>(
        rng: &mut R,
        inputs: usize,
        outputs: usize,
        learning_rate: f64,
    ) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let units = (0..outputs)
            .map(|_| Unit::new(rng, inputs, learning_rate))
            .collect();
        Layer::from_units(units)
    }

    /// Builds a layer from existing units, checking that it is non-empty and
    /// that every unit has the same input width.
    pub fn from_units(units: Vec<Unit>) -> Result<Self> {
        let layer = Layer { units };
        layer.validate()?;
        Ok(layer)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let width = self.units.first().ok_or(Error::EmptyLayer)?.input_len();
        for unit in &self.units {
            check_len(width, unit.input_len())?;
        }
        Ok(())
    }

    /// Returns the number of inputs to this layer.
    pub fn input_len(&self) -> usize {
        self.units.first().map_or(0, Unit::input_len)
    }

    /// Returns the number of outputs from this layer.
    pub fn output_len(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_mut(&mut self, index: usize) -> Option<&mut Unit> {
        self.units.get_mut(index)
    }

    /// Feeds the provided `input` forward through the layer.
    ///
    /// Units do not depend on each other, so each output is computed
    /// independently.
    pub fn compute_outputs(
        &self,
        input: &[f64],
        activator: Activator,
    ) -> Result<Vec<f64>> {
        if self.units.is_empty() {
            return Err(Error::EmptyLayer);
        }
        check_len(self.input_len(), input.len())?;
        self.units
            .iter()
            .map(|unit| unit.compute(input, activator))
            .collect()
    }

    /// Carries this layer's `deltas` back to its inputs.
    ///
    /// Returns `Σ_k deltas[k] * units[k].weights[i]` for every input `i`.
    /// Must run before `apply_gradients`, so the errors are expressed in the
    /// weights that produced the forward pass.
    pub fn backward(&self, deltas: &[f64]) -> Result<Vec<f64>> {
        check_len(self.output_len(), deltas.len())?;
        let mut input_errors = vec![0.0; self.input_len()];
        for (unit, delta) in self.units.iter().zip(deltas) {
            for (e, w) in input_errors.iter_mut().zip(unit.weights()) {
                *e += delta * w;
            }
        }
        Ok(input_errors)
    }

    /// Applies one gradient descent step to every unit, given the `input`
    /// that fed the layer and each unit's delta.
    pub fn apply_gradients(&mut self, input: &[f64], deltas: &[f64]) -> Result<()> {
        check_len(self.output_len(), deltas.len())?;
        for (unit, &delta) in self.units.iter_mut().zip(deltas) {
            unit.apply_gradient(input, delta)?;
        }
        Ok(())
    }
}

/// Turns errors propagated into a layer's outputs into that layer's deltas,
/// by scaling with the activation derivative at each output.
pub(crate) fn local_deltas(
    activator: Activator,
    outputs: &[f64],
    errors: &[f64],
) -> Result<Vec<f64>> {
    check_len(outputs.len(), errors.len())?;
    let mut deltas = vec![0.0; outputs.len()];
    for (d, y, e) in multizip((deltas.iter_mut(), outputs, errors)) {
        *d = e * activator.fprime(*y);
    }
    Ok(deltas)
}
