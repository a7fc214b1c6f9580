//! Gradient-based optimizers for GCN training.
//!
//! Both optimizers read gradients off the thread-local tape via parameter
//! tensor IDs and update the parameter data in place, which preserves each
//! tensor's identity across epochs.
//!
//! # References
//!
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic optimization. ICLR.

use serde::{Deserialize, Serialize};

use crate::autograd::{get_grad, Tensor};

/// Optimizer selection for [`crate::gcn::GcnConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// Gradient descent with staircase exponential learning-rate decay.
    #[default]
    GradientDescent,
    /// Adam with default betas.
    Adam,
}

pub(crate) enum AnyOptimizer {
    GradientDescent(GradientDescent),
    Adam(Adam),
}

impl AnyOptimizer {
    pub(crate) fn new(kind: OptimizerKind, lr: f32) -> Self {
        match kind {
            OptimizerKind::GradientDescent => Self::GradientDescent(GradientDescent::new(lr)),
            OptimizerKind::Adam => Self::Adam(Adam::new(lr)),
        }
    }

    pub(crate) fn step_with_params(&mut self, params: &mut [&mut Tensor]) {
        match self {
            Self::GradientDescent(opt) => opt.step_with_params(params),
            Self::Adam(opt) => opt.step_with_params(params),
        }
    }
}

/// Gradient descent with staircase exponential learning-rate decay.
///
/// The effective learning rate at step `t` is:
/// ```text
/// lr_t = lr * 0.96^floor(t / 200)
/// ```
#[derive(Debug)]
pub struct GradientDescent {
    lr: f32,
    decay_rate: f32,
    decay_steps: usize,
    step: usize,
}

impl GradientDescent {
    /// Create a new optimizer with base learning rate `lr`.
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            decay_rate: 0.96,
            decay_steps: 200,
            step: 0,
        }
    }

    /// Learning rate after decay for the current step.
    #[must_use]
    pub fn effective_lr(&self) -> f32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let exponent = (self.step / self.decay_steps) as i32;
        self.lr * self.decay_rate.powi(exponent)
    }

    /// Apply one update to every parameter and advance the step counter.
    pub fn step_with_params(&mut self, params: &mut [&mut Tensor]) {
        let lr = self.effective_lr();
        for param in params.iter_mut() {
            let Some(grad) = get_grad(param.id()) else {
                continue;
            };

            let grad_data = grad.as_slice();
            let param_data = param.data_mut().as_mut_slice();
            for i in 0..param_data.len() {
                param_data[i] -= lr * grad_data[i];
            }
        }
        self.step += 1;
    }
}

/// Adam optimizer (Kingma & Ba, 2015).
///
/// Update rule:
/// ```text
/// m_t = β₁ * m_{t-1} + (1 - β₁) * grad
/// v_t = β₂ * v_{t-1} + (1 - β₂) * grad²
/// m̂_t = m_t / (1 - β₁ᵗ)
/// v̂_t = v_t / (1 - β₂ᵗ)
/// param = param - lr * m̂_t / (√v̂_t + ε)
/// ```
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    /// First moment estimates, one buffer per parameter
    m: Vec<Vec<f32>>,
    /// Second moment estimates
    v: Vec<Vec<f32>>,
    /// Current timestep for bias correction
    t: usize,
}

impl Adam {
    /// Create a new Adam optimizer with default hyperparameters.
    ///
    /// Default: β₁=0.9, β₂=0.999, ε=1e-8
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Set beta parameters.
    #[must_use]
    pub fn betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Apply one Adam update to every parameter.
    pub fn step_with_params(&mut self, params: &mut [&mut Tensor]) {
        self.t += 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (idx, param) in params.iter_mut().enumerate() {
            let Some(grad) = get_grad(param.id()) else {
                continue;
            };

            let grad_data = grad.as_slice();
            let param_data = param.data_mut().as_mut_slice();

            if idx >= self.m.len() {
                self.m.resize(idx + 1, Vec::new());
                self.v.resize(idx + 1, Vec::new());
            }
            if self.m[idx].len() != param_data.len() {
                self.m[idx] = vec![0.0; param_data.len()];
                self.v[idx] = vec![0.0; param_data.len()];
            }

            let m = &mut self.m[idx];
            let v = &mut self.v[idx];

            for i in 0..param_data.len() {
                let g = grad_data[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

                let m_hat = m[i] / bias_correction1;
                let v_hat = v[i] / bias_correction2;
                param_data[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }
}
