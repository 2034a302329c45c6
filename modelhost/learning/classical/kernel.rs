use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Kernel function used by the support-vector classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// Plain dot product.
    Linear,
    /// Gaussian radial basis function `exp(-gamma * |a - b|^2)`.
    Rbf {
        /// Kernel coefficient.
        gamma: f64,
    },
}

impl Kernel {
    /// RBF kernel with `gamma = 1 / n_features`.
    #[must_use]
    pub fn rbf_auto(n_features: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let gamma = 1.0 / n_features.max(1) as f64;
        Self::Rbf { gamma }
    }

    /// Evaluates the kernel on two feature vectors.
    #[must_use]
    pub fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::Linear => a.dot(&b),
            Self::Rbf { gamma } => {
                let distance: f64 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum();
                (-gamma * distance).exp()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rbf_is_one_on_identical_points() {
        let kernel = Kernel::rbf_auto(2);
        let point = array![1.0, 2.0];
        assert!((kernel.eval(point.view(), point.view()) - 1.0).abs() < 1e-12);
        assert_eq!(kernel, Kernel::Rbf { gamma: 0.5 });
    }

    #[test]
    fn linear_is_dot_product() {
        let a = array![1.0, 2.0];
        let b = array![3.0, 4.0];
        assert!((Kernel::Linear.eval(a.view(), b.view()) - 11.0).abs() < 1e-12);
    }
}
