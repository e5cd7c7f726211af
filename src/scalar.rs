//! The numeric-operations interface used by every likelihood
//! computation.
//!
//! All arithmetic in [`size_history`](crate::size_history),
//! [`sum_product`](crate::sum_product) and
//! [`likelihood`](crate::likelihood) is written against [`Scalar`].
//! Plain `f64` evaluates a model; [`Dual`](crate::Dual) numbers
//! carry derivatives through the same code.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A differentiable real number.
///
/// Implementations must agree with `f64` on [`Scalar::value`].
/// Code generic over `Scalar` may only branch on
/// [`Scalar::value`] where the function is constant on both
/// sides of the branch (an exact zero, an infinite duration).
pub trait Scalar:
    Clone
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
{
    /// A value that does not depend on any parameter.
    fn constant(value: f64) -> Self;

    /// The primal value.
    fn value(&self) -> f64;

    /// `e^x`
    fn exp(&self) -> Self;

    /// `e^x - 1`, accurate near zero.
    fn exp_m1(&self) -> Self;

    /// Natural logarithm.
    fn ln(&self) -> Self;

    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn one() -> Self {
        Self::constant(1.0)
    }

    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }

    fn is_infinite(&self) -> bool {
        self.value().is_infinite()
    }
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }

    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    fn exp_m1(&self) -> Self {
        f64::exp_m1(*self)
    }

    fn ln(&self) -> Self {
        f64::ln(*self)
    }
}

/// Sum of a sequence of scalars; zero if empty.
pub fn sum<T: Scalar, I: IntoIterator<Item = T>>(values: I) -> T {
    values.into_iter().fold(T::zero(), |acc, x| acc + x)
}

/// `ln(Σ e^{x_i})` evaluated around the largest term.
///
/// Terms equal to `-inf` are skipped. Returns `-inf` when
/// nothing remains.
pub fn log_sum_exp<T: Scalar>(terms: &[T]) -> T {
    let finite = terms
        .iter()
        .filter(|t| t.value() != f64::NEG_INFINITY)
        .collect::<Vec<_>>();
    let shift = match finite
        .iter()
        .max_by(|a, b| a.value().total_cmp(&b.value()))
    {
        Some(&shift) => shift.clone(),
        None => return T::constant(f64::NEG_INFINITY),
    };
    let total = sum(finite.iter().map(|t| ((*t).clone() - shift.clone()).exp()));
    shift + total.ln()
}
