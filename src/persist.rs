//! Binary model files.
//!
//! A model file holds, in order: the hidden layer count, every hidden layer,
//! then the output layer. A layer is its unit count followed by one record
//! per unit: weight count, weights, bias and learning rate. Counts are
//! little-endian `u64`, values little-endian `f64`. There is no header, so
//! files written by earlier tools on little-endian hosts load unchanged.

use crate::error::{Error, Result};
use crate::feed_forward::{Network, OutputMode};
use crate::layer::Layer;

use bincode::Options;
use log::debug;
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Serialize)]
struct ModelRef<'a> {
    hidden: &'a [Layer],
    output: &'a Layer,
}

#[derive(Deserialize)]
struct Model {
    hidden: Vec<Layer>,
    output: Layer,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

fn corrupt(err: bincode::Error) -> Error {
    Error::CorruptModel(err.to_string())
}

/// Encodes the layers of `network`.
pub fn to_bytes(network: &Network) -> Result<Vec<u8>> {
    let model = ModelRef {
        hidden: network.hidden_layers(),
        output: network.output_layer(),
    };
    options().serialize(&model).map_err(corrupt)
}

/// Decodes a network from `bytes`, giving it the output `mode`.
///
/// Fails with `CorruptModel` when the bytes end early, continue past the
/// output layer, describe layers that do not fit together, a network with
/// no inputs, or a learning rate that is not a positive number.
pub fn from_bytes(bytes: &[u8], mode: OutputMode) -> Result<Network> {
    let model: Model = options().deserialize(bytes).map_err(corrupt)?;
    let network =
        Network::from_layers(model.hidden, model.output, mode).map_err(|err| match err {
            Error::EmptyLayer | Error::DimensionMismatch { .. } => {
                Error::CorruptModel(format!("inconsistent layers: {}", err))
            }
            other => other,
        })?;
    check_parameters(&network)?;
    Ok(network)
}

/// Rejects what `NetworkConfig` would never have produced.
fn check_parameters(network: &Network) -> Result<()> {
    if network.input_len() == 0 {
        return Err(Error::CorruptModel("model takes no inputs".into()));
    }
    let units = network
        .hidden_layers()
        .iter()
        .chain(std::iter::once(network.output_layer()))
        .flat_map(Layer::units);
    for unit in units {
        let rate = unit.learning_rate();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::CorruptModel(format!("invalid learning rate {}", rate)));
        }
    }
    Ok(())
}

impl Network {
    /// Writes the network's layers to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = to_bytes(self)?;
        fs::write(path, &bytes)?;
        debug!(
            "saved {} hidden layers ({} bytes) to {}",
            self.hidden_layers().len(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    /// Replaces the network's layers with the ones stored at `path`.
    ///
    /// The loaded topology may differ from the current one; check
    /// `input_len` and `output_len` afterwards if a specific shape is
    /// expected. The output mode is not stored and stays as it was. On error
    /// the network is left unchanged.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        *self = Network::from_file(path, self.output_mode())?;
        debug!(
            "loaded {} hidden layers from {}",
            self.hidden_layers().len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a complete network from `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, mode: OutputMode) -> Result<Self> {
        from_bytes(&fs::read(path)?, mode)
    }

    /// Writes the network's layers to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&to_bytes(self)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a complete network from `reader`, consuming it to the end.
    pub fn read_from<R: Read>(mut reader: R, mode: OutputMode) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        from_bytes(&bytes, mode)
    }
}
