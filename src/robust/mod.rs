//! M-estimators (robust kernels) applied to the squared, whitened
//! residual norm `d2 = ||r||^2` before it contributes to the cost and the
//! normal equations. Each kernel exposes both its loss `rho(d2)` and the
//! weight `rho'(d2)` the optimizer multiplies the Jacobian/residual by.

use dyn_clone::DynClone;

use crate::linalg::dtype;

pub trait RobustCost: std::fmt::Debug + DynClone {
    /// `rho(d2)`, the (possibly saturating) cost contributed by a squared
    /// residual norm of `d2`.
    fn loss(&self, d2: dtype) -> dtype;

    /// `rho'(d2)`, the down-weighting factor applied to the residual and
    /// Jacobian before they enter the normal equations.
    fn weight(&self, d2: dtype) -> dtype;
}
dyn_clone::clone_trait_object!(RobustCost);

#[derive(Debug, Clone, Copy, Default)]
pub struct L2;
impl RobustCost for L2 {
    fn loss(&self, d2: dtype) -> dtype {
        0.5 * d2
    }
    fn weight(&self, _d2: dtype) -> dtype {
        1.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct L1;
impl RobustCost for L1 {
    fn loss(&self, d2: dtype) -> dtype {
        d2.sqrt()
    }
    fn weight(&self, d2: dtype) -> dtype {
        1.0 / d2.sqrt().max(1e-12)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Huber {
    pub k: dtype,
}
impl Huber {
    pub fn new(k: dtype) -> Self {
        Self { k }
    }
}
impl RobustCost for Huber {
    fn loss(&self, d2: dtype) -> dtype {
        let d = d2.sqrt();
        if d <= self.k {
            0.5 * d2
        } else {
            self.k * (d - 0.5 * self.k)
        }
    }
    fn weight(&self, d2: dtype) -> dtype {
        let d = d2.sqrt();
        if d <= self.k {
            1.0
        } else {
            self.k / d.max(1e-12)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Fair {
    pub c: dtype,
}
impl Fair {
    pub fn new(c: dtype) -> Self {
        Self { c }
    }
}
impl RobustCost for Fair {
    fn loss(&self, d2: dtype) -> dtype {
        let d = d2.sqrt();
        self.c.powi(2) * (d / self.c - (1.0 + d / self.c).ln())
    }
    fn weight(&self, d2: dtype) -> dtype {
        let d = d2.sqrt();
        1.0 / (1.0 + d / self.c)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cauchy {
    pub c: dtype,
}
impl Cauchy {
    pub fn new(c: dtype) -> Self {
        Self { c }
    }
}
impl RobustCost for Cauchy {
    fn loss(&self, d2: dtype) -> dtype {
        0.5 * self.c.powi(2) * (1.0 + d2 / self.c.powi(2)).ln()
    }
    fn weight(&self, d2: dtype) -> dtype {
        1.0 / (1.0 + d2 / self.c.powi(2))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GemanMcClure {
    pub c: dtype,
}
impl GemanMcClure {
    pub fn new(c: dtype) -> Self {
        Self { c }
    }
}
impl RobustCost for GemanMcClure {
    fn loss(&self, d2: dtype) -> dtype {
        0.5 * d2 / (self.c.powi(2) + d2)
    }
    fn weight(&self, d2: dtype) -> dtype {
        let denom = self.c.powi(2) + d2;
        0.5 * self.c.powi(2) / denom.powi(2)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Welsch {
    pub c: dtype,
}
impl Welsch {
    pub fn new(c: dtype) -> Self {
        Self { c }
    }
}
impl RobustCost for Welsch {
    fn loss(&self, d2: dtype) -> dtype {
        0.5 * self.c.powi(2) * (1.0 - (-d2 / self.c.powi(2)).exp())
    }
    fn weight(&self, d2: dtype) -> dtype {
        (-d2 / self.c.powi(2)).exp()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tukey {
    pub c: dtype,
}
impl Tukey {
    pub fn new(c: dtype) -> Self {
        Self { c }
    }
}
impl RobustCost for Tukey {
    fn loss(&self, d2: dtype) -> dtype {
        if d2 <= self.c.powi(2) {
            let t = 1.0 - d2 / self.c.powi(2);
            self.c.powi(2) / 6.0 * (1.0 - t.powi(3))
        } else {
            self.c.powi(2) / 6.0
        }
    }
    fn weight(&self, d2: dtype) -> dtype {
        if d2 <= self.c.powi(2) {
            let t = 1.0 - d2 / self.c.powi(2);
            t.powi(2)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::numerical_gradient;

    macro_rules! robust_tests {
        ($name:ident, $kernel:expr) => {
            mod $name {
                use super::*;

                #[test]
                fn loss_zero_at_zero() {
                    let k = $kernel;
                    assert!(k.loss(0.0).abs() < 1e-9);
                }

                #[test]
                fn weight_matches_loss_derivative() {
                    let k = $kernel;
                    for &d2 in &[0.01, 0.5, 1.0, 4.0, 10.0] {
                        let numeric = numerical_gradient(|x| k.loss(x), d2);
                        let analytic = k.weight(d2);
                        assert!(
                            (numeric - analytic).abs() < 1e-3,
                            "{} at d2={d2}: numeric={numeric} analytic={analytic}",
                            stringify!($name)
                        );
                    }
                }
            }
        };
    }

    robust_tests!(l2, L2);
    robust_tests!(huber, Huber::new(1.5));
    robust_tests!(fair, Fair::new(1.4));
    robust_tests!(cauchy, Cauchy::new(2.4));
    robust_tests!(geman_mcclure, GemanMcClure::new(1.0));
    robust_tests!(welsch, Welsch::new(2.9));
    robust_tests!(tukey, Tukey::new(4.7));
}
