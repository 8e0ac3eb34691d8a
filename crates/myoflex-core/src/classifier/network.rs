//! Fully connected feed-forward network
//!
//! Hidden layers use ReLU; the output layer is linear and its argmax is the
//! predicted class. Activations live in two fixed stack buffers of
//! [`MAX_LAYER_WIDTH`] so inference never allocates.
//!
//! Weights are stored `[outputs][inputs]` (one row per neuron). Exporters
//! that write `[inputs][outputs]` matrices must transpose before bundling.

use alloc::vec::Vec;

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::math;
use crate::normalize::check_finite;
use crate::types::ClassId;

/// Widest layer (inputs or outputs) the scratch buffers can hold.
pub const MAX_LAYER_WIDTH: usize = 64;

/// One dense layer.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseLayer {
    /// Row-major, `outputs × inputs`
    weights: Vec<f64>,
    biases: Vec<f64>,
    inputs: usize,
}

impl DenseLayer {
    /// Build from per-neuron weight rows.
    ///
    /// # Errors
    ///
    /// Empty or ragged rows, bias count not matching the row count, a width
    /// over [`MAX_LAYER_WIDTH`], or non-finite entries.
    pub fn new(rows: Vec<Vec<f64>>, biases: Vec<f64>) -> Result<Self, ConfigurationError> {
        let outputs = rows.len();
        let inputs = rows.first().map_or(0, Vec::len);
        if outputs == 0 || inputs == 0 {
            return Err(ConfigurationError::MissingParameter { name: "network.weights" });
        }
        for width in [inputs, outputs] {
            if width > MAX_LAYER_WIDTH {
                return Err(ConfigurationError::CapacityExceeded {
                    what: "network layer",
                    requested: width,
                    capacity: MAX_LAYER_WIDTH,
                });
            }
        }
        if biases.len() != outputs {
            return Err(DimensionMismatch {
                stage: "network.biases",
                expected: outputs,
                got: biases.len(),
            }
            .into());
        }

        let mut weights = Vec::with_capacity(outputs * inputs);
        for row in &rows {
            if row.len() != inputs {
                return Err(DimensionMismatch {
                    stage: "network.weights",
                    expected: inputs,
                    got: row.len(),
                }
                .into());
            }
            weights.extend_from_slice(row);
        }
        check_finite("network.weights", &weights)?;
        check_finite("network.biases", &biases)?;

        Ok(Self { weights, biases, inputs })
    }

    /// Input width.
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Output width.
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.biases.len()
    }

    fn forward(&self, input: &[f64], output: &mut [f64]) {
        for ((o, row), &b) in output.iter_mut().zip(self.weights.chunks_exact(self.inputs)).zip(&self.biases) {
            *o = b + math::dot(row, input);
        }
    }
}

/// Stack of dense layers.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkModel {
    layers: Vec<DenseLayer>,
}

impl NetworkModel {
    /// Chain layers, checking that each consumes its predecessor's output.
    ///
    /// # Errors
    ///
    /// No layers, or adjacent layers whose widths disagree.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ConfigurationError> {
        if layers.is_empty() {
            return Err(ConfigurationError::MissingParameter { name: "network.layers" });
        }
        for pair in layers.windows(2) {
            if pair[1].inputs() != pair[0].outputs() {
                return Err(DimensionMismatch {
                    stage: "network layer chain",
                    expected: pair[0].outputs(),
                    got: pair[1].inputs(),
                }
                .into());
            }
        }
        Ok(Self { layers })
    }

    /// Layers in evaluation order.
    #[must_use]
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Feature vector length consumed by the first layer.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    /// Number of output classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::outputs)
    }

    /// Classify a normalized feature vector.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `x` is not [`Self::feature_count`] long.
    pub fn classify(&self, x: &[f64]) -> Result<(ClassId, f64), DimensionMismatch> {
        if x.len() != self.feature_count() {
            return Err(DimensionMismatch {
                stage: "network classifier",
                expected: self.feature_count(),
                got: x.len(),
            });
        }

        let mut front = [0.0f64; MAX_LAYER_WIDTH];
        let mut back = [0.0f64; MAX_LAYER_WIDTH];
        front[..x.len()].copy_from_slice(x);
        let mut width = x.len();

        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = &mut back[..layer.outputs()];
            layer.forward(&front[..width], out);
            if i < last {
                math::relu_in_place(out);
            }
            width = layer.outputs();
            core::mem::swap(&mut front, &mut back);
        }

        let (class, score) = math::argmax(&front[..width]).unwrap_or((0, 0.0));
        // Output width is bounded by MAX_LAYER_WIDTH
        Ok((ClassId(class as u16), score))
    }
}
