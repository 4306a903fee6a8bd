use super::{dtype, MatrixX, VectorX};
use crate::variables::VariableSafe;

const PWR: i32 = 6;

/// Central-difference Jacobian of `f` with respect to the tangent space of
/// each variable in `vars`, evaluated at the linearization point `vars`
/// itself. `f` is evaluated through [`VariableSafe::oplus_boxed`] so it
/// never needs to know the concrete type of any variable it is handed.
///
/// This is the residual layer's sole differentiation strategy: every
/// residual is defined purely in terms of variable values, and Jacobians
/// fall out of perturbing each variable's local tangent coordinates in
/// turn and re-evaluating.
pub fn numerical_jacobian<F>(f: F, vars: &[Box<dyn VariableSafe>]) -> (VectorX, MatrixX)
where
    F: Fn(&[Box<dyn VariableSafe>]) -> VectorX,
{
    let eps = dtype::powi(10.0, -PWR);
    let dims: Vec<usize> = vars.iter().map(|v| v.dim()).collect();
    let total_dim: usize = dims.iter().sum();

    let res0 = f(vars);
    let dim_out = res0.len();
    let mut jac = MatrixX::zeros(dim_out, total_dim);

    let mut col = 0;
    for (i, dim_i) in dims.iter().enumerate() {
        for j in 0..*dim_i {
            let mut tangent = VectorX::zeros(*dim_i);

            tangent[j] = eps;
            let mut perturbed: Vec<Box<dyn VariableSafe>> =
                vars.iter().map(|v| v.clone_box()).collect();
            perturbed[i] = vars[i].oplus_boxed(&tangent);
            let plus = f(&perturbed);

            tangent[j] = -eps;
            let mut perturbed: Vec<Box<dyn VariableSafe>> =
                vars.iter().map(|v| v.clone_box()).collect();
            perturbed[i] = vars[i].oplus_boxed(&tangent);
            let minus = f(&perturbed);

            let delta = (plus - minus) / (2.0 * eps);
            jac.column_mut(col).copy_from(&delta);
            col += 1;
        }
    }

    (res0, jac)
}

/// Central-difference gradient of a scalar-valued `f`, used by the robust
/// kernel unit tests to check `weight(d2) == loss'(d2) / d2` numerically.
pub fn numerical_gradient<F: Fn(dtype) -> dtype>(f: F, x: dtype) -> dtype {
    let eps = dtype::powi(10.0, -PWR);
    (f(x + eps) - f(x - eps)) / (2.0 * eps)
}
