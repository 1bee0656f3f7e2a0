//! Orthogonal initialization for the policy networks.
//!
//! Orthogonal weight matrices preserve the norm of their input, which keeps
//! the scale of activations and gradients stable through the MLP extractor.
//! Actor-critic policies use the following gains:
//!
//! - sqrt(2) for hidden layers
//! - 0.01 for the action head (near-uniform initial policy)
//! - 1.0 for the value head

use burn::module::{Module, Param};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for [`OrthogonalLinear`].
#[derive(Debug, Clone)]
pub struct OrthogonalLinearConfig {
    /// Number of input features.
    pub d_input: usize,
    /// Number of output features.
    pub d_output: usize,
    /// Gain applied to the orthogonal weights.
    pub gain: f64,
    /// Whether to include a bias term.
    pub bias: bool,
    /// Use orthogonal weights; otherwise uniform in +-1/sqrt(d_input).
    pub orthogonal: bool,
}

impl OrthogonalLinearConfig {
    /// Create a new configuration.
    pub fn new(d_input: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_output,
            gain: 1.0,
            bias: true,
            orthogonal: true,
        }
    }

    /// Set the gain factor.
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Set whether to include bias.
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Toggle orthogonal initialization.
    pub fn with_orthogonal(mut self, orthogonal: bool) -> Self {
        self.orthogonal = orthogonal;
        self
    }

    /// Initialize the layer with an unseeded generator.
    pub fn init<B: Backend>(&self, device: &B::Device) -> OrthogonalLinear<B> {
        self.init_with_rng(device, &mut StdRng::from_entropy())
    }

    /// Initialize the layer, drawing every random value from `rng`.
    pub fn init_with_rng<B: Backend, R: Rng + ?Sized>(
        &self,
        device: &B::Device,
        rng: &mut R,
    ) -> OrthogonalLinear<B> {
        let weight = if self.orthogonal {
            generate_orthogonal_weights::<B, R>(self.d_output, self.d_input, self.gain, device, rng)
        } else {
            let bound = 1.0 / (self.d_input.max(1) as f32).sqrt();
            let values: Vec<f32> = (0..self.d_output * self.d_input)
                .map(|_| rng.gen_range(-bound..bound))
                .collect();
            Tensor::<B, 1>::from_floats(values.as_slice(), device)
                .reshape([self.d_output, self.d_input])
        };

        let bias = if self.bias {
            Some(Param::from_tensor(Tensor::zeros([self.d_output], device)))
        } else {
            None
        };

        OrthogonalLinear {
            weight: Param::from_tensor(weight),
            bias,
            d_input: self.d_input,
            d_output: self.d_output,
        }
    }
}

/// Linear layer `y = x W^T + b` with a `[d_output, d_input]` weight.
#[derive(Module, Debug)]
pub struct OrthogonalLinear<B: Backend> {
    /// Weight matrix of shape [d_output, d_input]
    pub weight: Param<Tensor<B, 2>>,
    /// Optional bias of shape [d_output]
    pub bias: Option<Param<Tensor<B, 1>>>,
    d_input: usize,
    d_output: usize,
}

impl<B: Backend> OrthogonalLinear<B> {
    /// Forward pass for 2D input.
    ///
    /// # Arguments
    /// * `input` - Tensor of shape [batch_size, d_input]
    ///
    /// # Returns
    /// Tensor of shape [batch_size, d_output]
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.weight.val().transpose());

        match &self.bias {
            Some(bias) => output + bias.val().unsqueeze_dim(0),
            None => output,
        }
    }

    /// Get input dimension.
    pub fn d_input(&self) -> usize {
        self.d_input
    }

    /// Get output dimension.
    pub fn d_output(&self) -> usize {
        self.d_output
    }

    /// Replace the weight values, keeping the parameter identity.
    pub fn with_weight(mut self, weight: Tensor<B, 2>) -> Self {
        self.weight = self.weight.map(|_| weight.require_grad());
        self
    }

    /// Replace the bias values, keeping the parameter identity.
    ///
    /// No-op for layers built without bias.
    pub fn with_bias_values(mut self, bias: Tensor<B, 1>) -> Self {
        self.bias = self.bias.map(|param| param.map(|_| bias.require_grad()));
        self
    }
}

/// Generate an orthogonal weight matrix using Gram-Schmidt.
///
/// Burn has no QR decomposition, so Gaussian vectors drawn from `rng` are
/// orthonormalized one by one on the host. They become the columns of tall
/// matrices and the rows of wide ones.
///
/// # Returns
/// Orthogonal weight tensor of shape [rows, cols], scaled by `gain`
pub fn generate_orthogonal_weights<B: Backend, R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    gain: f64,
    device: &B::Device,
    rng: &mut R,
) -> Tensor<B, 2> {
    let tall = rows >= cols;
    let (len, count) = if tall { (rows, cols) } else { (cols, rows) };

    let mut values = vec![0.0f32; rows * cols];
    for (j, vector) in orthonormal_vectors(len, count, rng).iter().enumerate() {
        for (i, &x) in vector.iter().enumerate() {
            let index = if tall { i * cols + j } else { j * cols + i };
            values[index] = (x * gain) as f32;
        }
    }

    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols])
}

/// `count` orthonormal vectors of length `len` (`count <= len`).
fn orthonormal_vectors<R: Rng + ?Sized>(len: usize, count: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(count);

    while basis.len() < count {
        let mut v: Vec<f64> = (0..len).map(|_| standard_normal(rng)).collect();

        for u in &basis {
            // Basis vectors are already unit length
            let dot = dot_product(&v, u);
            for (a, b) in v.iter_mut().zip(u) {
                *a -= dot * b;
            }
        }

        let norm = dot_product(&v, &v).sqrt();
        // A nearly dependent draw is discarded and redrawn
        if norm > 1e-8 {
            v.iter_mut().for_each(|a| *a /= norm);
            basis.push(v);
        }
    }

    basis
}

fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// One draw from N(0, 1) using the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - U lies in (0, 1], so the log is finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
