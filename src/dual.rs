//! Forward-mode automatic differentiation.
//!
//! A [`Dual`] carries a primal value and one tangent per seeded
//! direction. Seeding every parameter gives the gradient in a single
//! pass; nesting `Dual<Dual<f64>>` with one outer direction gives a
//! Hessian-vector product.
//!
//! ```
//! use momi::{gradient, Differentiable, MomiError, Scalar};
//!
//! struct Rosenbrock;
//!
//! impl Differentiable for Rosenbrock {
//!     fn evaluate<T: Scalar>(&self, x: &[T]) -> Result<T, MomiError> {
//!         let a = -x[0].clone() + 1.0;
//!         let b = x[1].clone() - x[0].clone() * x[0].clone();
//!         Ok(a.clone() * a + b.clone() * b * 100.0)
//!     }
//! }
//!
//! let g = gradient(&Rosenbrock, &[1.0, 1.0]).unwrap();
//! assert_eq!(g, vec![0.0, 0.0]);
//! ```

use crate::error::MomiError;
use crate::scalar::Scalar;

/// A dual number `re + Σ eps_i ε_i` with `ε_i ε_j = 0`.
///
/// Missing trailing tangents are zero, so constants carry an
/// empty tangent vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Dual<T> {
    re: T,
    eps: Vec<T>,
}

impl<T: Scalar> Dual<T> {
    /// A seeded variable: tangent `1` in direction `index` out of `num_directions`.
    pub fn variable(re: T, index: usize, num_directions: usize) -> Self {
        let mut eps = vec![T::zero(); num_directions];
        eps[index] = T::one();
        Self { re, eps }
    }

    /// A number with explicit tangents.
    pub fn new(re: T, eps: Vec<T>) -> Self {
        Self { re, eps }
    }

    /// Seed every entry of `values` as its own direction.
    pub fn variables(values: &[T]) -> Vec<Self> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Self::variable(v.clone(), i, values.len()))
            .collect()
    }

    /// The primal part.
    pub fn re(&self) -> &T {
        &self.re
    }

    /// Tangent in direction `index`; zero if the direction was never seeded.
    pub fn tangent(&self, index: usize) -> T {
        self.eps.get(index).cloned().unwrap_or_else(T::zero)
    }

    /// The first `n` tangents.
    pub fn tangents(&self, n: usize) -> Vec<T> {
        (0..n).map(|i| self.tangent(i)).collect()
    }

    fn lift(re: T) -> Self {
        Self { re, eps: vec![] }
    }

    // Chain rule for a unary function with derivative `d`.
    fn chain(self, re: T, d: T) -> Self {
        Self {
            re,
            eps: self.eps.into_iter().map(|e| e * d.clone()).collect(),
        }
    }
}

// a * ca + b * cb, tangent-wise, treating missing entries as zero.
fn combine<T: Scalar>(a: Vec<T>, ca: Option<&T>, b: Vec<T>, cb: Option<&T>) -> Vec<T> {
    let scale = |x: T, c: Option<&T>| match c {
        Some(c) => x * c.clone(),
        None => x,
    };
    let n = a.len().max(b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    (0..n)
        .map(|_| match (a.next(), b.next()) {
            (Some(x), Some(y)) => scale(x, ca) + scale(y, cb),
            (Some(x), None) => scale(x, ca),
            (None, Some(y)) => scale(y, cb),
            (None, None) => T::zero(),
        })
        .collect()
}

impl<T: Scalar> std::ops::Add for Dual<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            re: self.re + rhs.re,
            eps: combine(self.eps, None, rhs.eps, None),
        }
    }
}

impl<T: Scalar> std::ops::Sub for Dual<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl<T: Scalar> std::ops::Mul for Dual<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        let eps = combine(self.eps, Some(&rhs.re), rhs.eps, Some(&self.re));
        Self {
            re: self.re * rhs.re,
            eps,
        }
    }
}

impl<T: Scalar> std::ops::Div for Dual<T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        let inv = T::one() / rhs.re.clone();
        let re = self.re * inv.clone();
        let d_rhs = -(re.clone() * inv.clone());
        Self {
            eps: combine(self.eps, Some(&inv), rhs.eps, Some(&d_rhs)),
            re,
        }
    }
}

impl<T: Scalar> std::ops::Neg for Dual<T> {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self {
            re: -self.re,
            eps: self.eps.into_iter().map(|e| -e).collect(),
        }
    }
}

impl<T: Scalar> std::ops::AddAssign for Dual<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.re += rhs.re;
        if self.eps.len() < rhs.eps.len() {
            self.eps.resize(rhs.eps.len(), T::zero());
        }
        for (e, r) in self.eps.iter_mut().zip(rhs.eps) {
            *e += r;
        }
    }
}

impl_dual_shift_by_f64!(Add, add);
impl_dual_shift_by_f64!(Sub, sub);
impl_dual_scale_by_f64!(Mul, mul);
impl_dual_scale_by_f64!(Div, div);
impl_f64_lhs_dual_op!(Add, add);
impl_f64_lhs_dual_op!(Sub, sub);
impl_f64_lhs_dual_op!(Mul, mul);
impl_f64_lhs_dual_op!(Div, div);

impl<T: Scalar> Scalar for Dual<T> {
    fn constant(value: f64) -> Self {
        Self::lift(T::constant(value))
    }

    fn value(&self) -> f64 {
        self.re.value()
    }

    // exp(-inf) is returned as an exact constant zero.
    fn exp(&self) -> Self {
        if self.value() == f64::NEG_INFINITY {
            return Self::zero();
        }
        let e = self.re.exp();
        self.clone().chain(e.clone(), e)
    }

    fn exp_m1(&self) -> Self {
        if self.value() == f64::NEG_INFINITY {
            return Self::constant(-1.0);
        }
        let d = self.re.exp();
        self.clone().chain(self.re.exp_m1(), d)
    }

    // ln(0) is returned as an exact constant -inf.
    fn ln(&self) -> Self {
        if self.value() == 0.0 {
            return Self::constant(f64::NEG_INFINITY);
        }
        let d = T::one() / self.re.clone();
        self.clone().chain(self.re.ln(), d)
    }
}

/// A scalar function that can be evaluated on any [`Scalar`].
///
/// This is the seam between a model and the differentiation
/// engine: implementations never see which number type they
/// are evaluated with.
pub trait Differentiable {
    fn evaluate<T: Scalar>(&self, x: &[T]) -> Result<T, MomiError>;
}

/// Value and gradient in one forward pass.
pub fn value_and_gradient<F: Differentiable + ?Sized>(
    f: &F,
    x: &[f64],
) -> Result<(f64, Vec<f64>), MomiError> {
    let y = f.evaluate(&Dual::variables(x))?;
    Ok((*y.re(), y.tangents(x.len())))
}

/// Gradient of `f` at `x`.
pub fn gradient<F: Differentiable + ?Sized>(f: &F, x: &[f64]) -> Result<Vec<f64>, MomiError> {
    Ok(value_and_gradient(f, x)?.1)
}

/// `H(x) v`, the Hessian of `f` at `x` applied to `v`.
///
/// The outer dual carries the single direction `v`, the inner
/// duals carry the coordinate directions, so the inner gradient of
/// the outer tangent is `∇(∇f · v) = H v`.
pub fn hessian_vector_product<F: Differentiable + ?Sized>(
    f: &F,
    x: &[f64],
    v: &[f64],
) -> Result<Vec<f64>, MomiError> {
    if x.len() != v.len() {
        return Err(MomiError::ConfigurationError(format!(
            "point has dimension {} but direction has dimension {}",
            x.len(),
            v.len()
        )));
    }
    let inner = Dual::variables(x);
    let seeded = inner
        .into_iter()
        .zip(v.iter())
        .map(|(xi, vi)| Dual::new(xi, vec![Dual::constant(*vi)]))
        .collect::<Vec<_>>();
    let y = f.evaluate(&seeded)?;
    Ok(y.tangent(0).tangents(x.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl Differentiable for Quadratic {
        // f(x, y) = x^2 y + 3 y
        fn evaluate<T: Scalar>(&self, x: &[T]) -> Result<T, MomiError> {
            Ok(x[0].clone() * x[0].clone() * x[1].clone() + x[1].clone() * 3.0)
        }
    }

    struct Transcendental;

    impl Differentiable for Transcendental {
        // f(x, y) = ln(x) / y + exp(x y)
        fn evaluate<T: Scalar>(&self, x: &[T]) -> Result<T, MomiError> {
            Ok(x[0].ln() / x[1].clone() + (x[0].clone() * x[1].clone()).exp())
        }
    }

    #[test]
    fn test_gradient_of_polynomial() {
        let (value, grad) = value_and_gradient(&Quadratic, &[2.0, 5.0]).unwrap();
        assert_eq!(value, 35.0);
        assert_eq!(grad, vec![20.0, 7.0]);
    }

    #[test]
    fn test_hessian_vector_product_of_polynomial() {
        // H = [[2y, 2x], [2x, 0]]
        let hv = hessian_vector_product(&Quadratic, &[2.0, 5.0], &[1.0, -1.0]).unwrap();
        assert_eq!(hv, vec![10.0 - 4.0, 4.0]);
    }

    #[test]
    fn test_gradient_of_transcendental() {
        let (x, y) = (1.5_f64, 0.5_f64);
        let grad = gradient(&Transcendental, &[x, y]).unwrap();
        let dx = 1.0 / (x * y) + y * (x * y).exp();
        let dy = -x.ln() / (y * y) + x * (x * y).exp();
        assert!((grad[0] - dx).abs() < 1e-12);
        assert!((grad[1] - dy).abs() < 1e-12);
    }

    #[test]
    fn test_limits_are_constant() {
        let x = Dual::variable(f64::NEG_INFINITY, 0, 2);
        let e = x.exp();
        assert_eq!(e.value(), 0.0);
        assert_eq!(e.tangents(2), vec![0.0, 0.0]);

        let z = Dual::variable(0.0, 1, 2);
        let l = z.ln();
        assert_eq!(l.value(), f64::NEG_INFINITY);
        assert_eq!(l.tangents(2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_constants_mix_with_variables() {
        let x = Dual::variable(3.0, 0, 1);
        let y = 2.0 - x.clone() / 4.0;
        assert_eq!(y.value(), 1.25);
        assert_eq!(y.tangent(0), -0.25);
        let z = Dual::<f64>::constant(7.0) * x;
        assert_eq!(z.tangent(0), 7.0);
    }

    #[test]
    fn test_mismatched_direction() {
        assert!(matches!(
            hessian_vector_product(&Quadratic, &[1.0, 2.0], &[1.0]),
            Err(MomiError::ConfigurationError(_))
        ));
    }
}
