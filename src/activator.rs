//! Activation function types.

use serde_derive::{Deserialize, Serialize};

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activator {
    /// Sigmoid function, used by every hidden unit.
    Sigmoid,
    /// Passes the weighted sum through untouched. Only the output layer uses
    /// this, right before softmax normalization.
    Identity,
}

impl Activator {
    /// Evaluates `f(x)` for the selected the activation function.
    pub fn f(&self, x: f64) -> f64 {
        match *self {
            Activator::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activator::Identity => x,
        }
    }

    /// Evaluates the derivative `f'(x)`, where `x = f^{-1}(y)`.
    ///
    /// Note that this function takes in the *output* of the activation
    /// function, rather than the input. This is an optimization that means we
    /// don't have to store the intermediate results before activation.
    pub fn fprime(&self, y: f64) -> f64 {
        match *self {
            Activator::Sigmoid => y * (1.0 - y),
            Activator::Identity => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigmoid_values() {
        assert_abs_diff_eq!(Activator::Sigmoid.f(0.0), 0.5);
        assert!(Activator::Sigmoid.f(40.0) > 0.999_999);
        assert!(Activator::Sigmoid.f(-40.0) < 1e-6);
    }

    #[test]
    fn sigmoid_derivative_from_output() {
        let x = 0.7;
        let y = Activator::Sigmoid.f(x);
        let h = 1e-6;
        let numeric =
            (Activator::Sigmoid.f(x + h) - Activator::Sigmoid.f(x - h)) / (2.0 * h);
        assert_abs_diff_eq!(Activator::Sigmoid.fprime(y), numeric, epsilon = 1e-8);
    }

    #[test]
    fn identity_is_passthrough() {
        assert_eq!(Activator::Identity.f(-3.25), -3.25);
        assert_eq!(Activator::Identity.fprime(12.0), 1.0);
    }
}
