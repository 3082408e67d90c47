//! A multilayer perceptron with sigmoid hidden units, a softmax (or sigmoid)
//! output layer, online backpropagation, early stopping and a compact binary
//! model format.

pub mod activator;
pub mod error;
pub mod feed_forward;
pub mod layer;
pub mod persist;
pub mod trainer;
pub mod unit;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::feed_forward::{Metrics, Network, NetworkConfig, OutputMode};
pub use crate::trainer::{EarlyStopping, Logging, StopReason, StoppingMetric, Trainer, TrainingReport};
