//! Population-size histories of a single deme and the truncated
//! coalescent they induce.
//!
//! Time runs backwards from the bottom (most recent end) of an epoch.
//! Sizes are scaled so that each pair of lineages coalesces at rate
//! `1/N`.
//!
//! Every history is tabulated once, at construction, for up to
//! `n_max` lineages:
//!
//! * `transition(b, a)`: probability that `b` lineages at the bottom
//!   leave `a` lineages at the top;
//! * `expected_time(b, k)`: expected time spent with exactly `k`
//!   lineages, given `b` at the bottom;
//! * `truncated_sfs(b, i)`: expected length of branches inside the
//!   epoch ancestral to exactly `i` of the `b` bottom lineages.
//!
//! The tables depend only on parameters, never on observed data.
//!
//! For a finite epoch the number of lineages is a pure-death chain
//! whose generator is bidiagonal. Both tables come from one matrix
//! exponential, computed by scaling and squaring. Every entry is then
//! a sum of non-negative terms, which keeps small probabilities
//! accurate for large samples and short epochs.

use ndarray::Array2;

use crate::combinatorics::{pairs, Binomials};
use crate::error::MomiError;
use crate::scalar::Scalar;
use crate::traits::Validate;

#[derive(Clone, Debug)]
struct Tabulation<T> {
    transition: Array2<T>,
    expected_times: Array2<T>,
    truncated_sfs: Array2<T>,
}

impl<T: Scalar> Tabulation<T> {
    fn new(transition: Array2<T>, expected_times: Array2<T>, n_max: usize) -> Self {
        let binomials = Binomials::new(n_max);
        let mut truncated_sfs = Array2::from_elem((n_max + 1, n_max + 1), T::zero());
        for b in 1..=n_max {
            for i in 1..=b {
                let mut acc = T::zero();
                for k in 1..=b {
                    let w = binomials.subtends(b, k, i);
                    if w != 0.0 {
                        acc += expected_times[[b, k]].clone() * (w * k as f64);
                    }
                }
                truncated_sfs[[b, i]] = acc;
            }
        }
        Self {
            transition,
            expected_times,
            truncated_sfs,
        }
    }
}

fn zeros<T: Scalar>(n_max: usize) -> Array2<T> {
    Array2::from_elem((n_max + 1, n_max + 1), T::zero())
}

// Enough for a generator of norm 1/2 to reach double precision.
const TAYLOR_TERMS: usize = 18;

// Product of two lower-triangular tables indexed by lineage counts.
fn lower_product<T: Scalar>(a: &Array2<T>, b: &Array2<T>, n_max: usize) -> Array2<T> {
    let mut out = zeros(n_max);
    for i in 0..=n_max {
        for j in 0..=i {
            let mut acc = T::zero();
            for k in j..=i {
                acc += a[[i, k]].clone() * b[[k, j]].clone();
            }
            out[[i, j]] = acc;
        }
    }
    out
}

fn identity<T: Scalar>(n_max: usize) -> Array2<T> {
    let mut m = zeros(n_max);
    for b in 0..=n_max {
        m[[b, b]] = T::one();
    }
    m
}

/// A constant population size `N` over a duration `tau`.
///
/// `tau` may be infinite for the ancestral epoch of the root deme.
///
/// # Examples
///
/// ```
/// use momi::ConstantTruncatedSizeHistory;
///
/// let h = ConstantTruncatedSizeHistory::new(2.0, 1.0, 4).unwrap();
/// // Two lineages stay apart with probability exp(-tau / N).
/// assert!((h.transition(2, 2) - (-0.5_f64).exp()).abs() < 1e-12);
/// ```
///
/// # Errors
///
/// [`MomiError::DegenerateModelError`] if `N` or `tau` is NaN or negative.
#[derive(Clone, Debug)]
pub struct ConstantTruncatedSizeHistory<T> {
    size: T,
    tau: T,
    n_max: usize,
    tables: Tabulation<T>,
}

impl<T: Scalar> Validate for ConstantTruncatedSizeHistory<T> {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError> {
        let (size, tau) = (self.size.value(), self.tau.value());
        if size.is_nan() || size < 0.0 {
            Err(err(format!("population size must be >= 0, got: {size}")))
        } else if tau.is_nan() || tau < 0.0 {
            Err(err(format!("epoch duration must be >= 0, got: {tau}")))
        } else {
            Ok(())
        }
    }
}

impl<T: Scalar> ConstantTruncatedSizeHistory<T> {
    pub fn new(size: T, tau: T, n_max: usize) -> Result<Self, MomiError> {
        let (size_value, tau_value) = (size.value(), tau.value());
        let mut history = Self {
            size,
            tau,
            n_max,
            tables: Tabulation {
                transition: zeros(0),
                expected_times: zeros(0),
                truncated_sfs: zeros(0),
            },
        };
        history.validate(MomiError::DegenerateModelError)?;

        let (transition, expected_times) = if tau_value == 0.0 {
            (identity(n_max), zeros(n_max))
        } else if tau_value.is_infinite() {
            history.tabulate_unbounded()
        } else if size_value == 0.0 {
            history.tabulate_instant_coalescence()
        } else if size_value.is_infinite() {
            history.tabulate_no_coalescence()
        } else {
            history.tabulate_matrix_exponential()
        };
        history.tables = Tabulation::new(transition, expected_times, n_max);
        Ok(history)
    }

    // A single lineage, or none, has nothing to coalesce with.
    fn trivial_rows(&self, transition: &mut Array2<T>, expected_times: &mut Array2<T>) {
        for b in 0..=self.n_max.min(1) {
            transition[[b, b]] = T::one();
        }
        if self.n_max >= 1 && self.tau.is_finite() {
            expected_times[[1, 1]] = self.tau.clone();
        }
    }

    fn tabulate_unbounded(&self) -> (Array2<T>, Array2<T>) {
        let n = self.n_max;
        let mut transition = zeros(n);
        let mut expected_times = zeros(n);
        self.trivial_rows(&mut transition, &mut expected_times);
        for b in 2..=n {
            transition[[b, 1]] = T::one();
            for k in 2..=b {
                expected_times[[b, k]] = self.size.clone() / pairs(k);
            }
        }
        (transition, expected_times)
    }

    fn tabulate_instant_coalescence(&self) -> (Array2<T>, Array2<T>) {
        let n = self.n_max;
        let mut transition = zeros(n);
        let mut expected_times = zeros(n);
        self.trivial_rows(&mut transition, &mut expected_times);
        for b in 2..=n {
            transition[[b, 1]] = T::one();
            expected_times[[b, 1]] = self.tau.clone();
        }
        (transition, expected_times)
    }

    fn tabulate_no_coalescence(&self) -> (Array2<T>, Array2<T>) {
        let n = self.n_max;
        let transition = identity(n);
        let mut expected_times = zeros(n);
        for b in 1..=n {
            expected_times[[b, b]] = self.tau.clone();
        }
        (transition, expected_times)
    }

    fn tabulate_matrix_exponential(&self) -> (Array2<T>, Array2<T>) {
        let n = self.n_max;
        let ratio = self.tau.value() / self.size.value();
        if !ratio.is_finite() {
            return self.tabulate_instant_coalescence();
        }

        // Halve the step until the generator has norm at most 1/2.
        let norm = 2.0 * pairs(n) * ratio;
        let mut fraction = 1.0;
        let mut squarings = 0;
        while norm * fraction > 0.5 {
            fraction /= 2.0;
            squarings += 1;
        }
        let step = self.tau.clone() / self.size.clone() * fraction;
        let mut generator = zeros::<T>(n);
        for k in 2..=n {
            let rate = step.clone() * pairs(k);
            generator[[k, k]] = -rate.clone();
            generator[[k, k - 1]] = rate;
        }

        // exp(Q h) and ∫₀ʰ exp(Q s) ds / h as Taylor series.
        let mut power = identity::<T>(n);
        let mut transition = identity::<T>(n);
        let mut integral = identity::<T>(n);
        for j in 1..=TAYLOR_TERMS {
            power = lower_product(&power, &generator, n);
            power.mapv_inplace(|x| x / j as f64);
            transition.zip_mut_with(&power, |t, p| *t += p.clone());
            integral.zip_mut_with(&power, |f, p| *f += p.clone() / (j + 1) as f64);
        }
        let span = self.tau.clone() * fraction;
        integral.mapv_inplace(|x| x * span.clone());
        integral[[0, 0]] = T::zero();

        // exp(2Qh) = exp(Qh)², and ∫₀²ʰ = ∫₀ʰ + exp(Qh) ∫₀ʰ.
        for _ in 0..squarings {
            let carried = lower_product(&transition, &integral, n);
            integral.zip_mut_with(&carried, |f, c| *f += c.clone());
            transition = lower_product(&transition, &transition, n);
        }
        (transition, integral)
    }

    pub fn size(&self) -> &T {
        &self.size
    }

    pub fn tau(&self) -> &T {
        &self.tau
    }

    pub fn n_max(&self) -> usize {
        self.n_max
    }

    pub fn is_infinite(&self) -> bool {
        self.tau.is_infinite()
    }

    /// Population size `t` time units above the bottom of the epoch.
    pub fn size_at(&self, _t: f64) -> T {
        self.size.clone()
    }

    /// `∫₀ᵗ 1/N(s) ds`, with `t` clamped to the epoch.
    pub fn scaled_time(&self, t: &T) -> T {
        let t = if t.value() > self.tau.value() {
            self.tau.clone()
        } else {
            t.clone()
        };
        if t.value() == 0.0 {
            return T::zero();
        }
        t / self.size.clone()
    }

    /// Probability that `b` lineages at the bottom leave `a` at the top.
    pub fn transition(&self, b: usize, a: usize) -> &T {
        &self.tables.transition[[b, a]]
    }

    /// Expected time spent with `k` lineages, given `b` at the bottom.
    ///
    /// For an unbounded epoch the time with one lineage is infinite
    /// and is reported as zero.
    pub fn expected_time(&self, b: usize, k: usize) -> &T {
        &self.tables.expected_times[[b, k]]
    }

    /// Expected length of epoch branches ancestral to exactly `i` of `b` lineages.
    pub fn truncated_sfs(&self, b: usize, i: usize) -> &T {
        &self.tables.truncated_sfs[[b, i]]
    }
}

/// A sequence of constant epochs, most recent first.
///
/// # Errors
///
/// [`MomiError::ConfigurationError`] if there are no pieces, if the pieces
/// disagree on `n_max`, or if any piece but the last is unbounded.
#[derive(Clone, Debug)]
pub struct PiecewiseHistory<T> {
    pieces: Vec<ConstantTruncatedSizeHistory<T>>,
    tau: T,
    tables: Tabulation<T>,
}

impl<T: Scalar> Validate for PiecewiseHistory<T> {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError> {
        let first = match self.pieces.first() {
            Some(first) => first,
            None => return Err(err("a piecewise history needs at least one piece".to_string())),
        };
        if let Some(p) = self.pieces.iter().find(|p| p.n_max() != first.n_max()) {
            return Err(err(format!(
                "pieces tabulated for different lineage counts: {} and {}",
                first.n_max(),
                p.n_max()
            )));
        }
        if self.pieces[..self.pieces.len() - 1]
            .iter()
            .any(|p| p.is_infinite())
        {
            return Err(err(
                "only the most ancient piece may have unbounded duration".to_string(),
            ));
        }
        Ok(())
    }
}

impl<T: Scalar> PiecewiseHistory<T> {
    pub fn new(pieces: Vec<ConstantTruncatedSizeHistory<T>>) -> Result<Self, MomiError> {
        let mut history = Self {
            pieces,
            tau: T::zero(),
            tables: Tabulation {
                transition: zeros(0),
                expected_times: zeros(0),
                truncated_sfs: zeros(0),
            },
        };
        history.validate(MomiError::ConfigurationError)?;

        let n = history.n_max();
        let mut prefix = identity::<T>(n);
        let mut expected_times = zeros::<T>(n);
        let mut tau = T::zero();
        for piece in &history.pieces {
            tau += piece.tau().clone();
            for b in 1..=n {
                for k in 1..=b {
                    let mut acc = T::zero();
                    for m in k..=b {
                        if prefix[[b, m]].value() != 0.0 {
                            acc += prefix[[b, m]].clone() * piece.expected_time(m, k).clone();
                        }
                    }
                    expected_times[[b, k]] += acc;
                }
            }
            let mut next = zeros::<T>(n);
            for b in 0..=n {
                for a in 0..=b {
                    let mut acc = T::zero();
                    for m in a..=b {
                        if prefix[[b, m]].value() != 0.0 {
                            acc += prefix[[b, m]].clone() * piece.transition(m, a).clone();
                        }
                    }
                    next[[b, a]] = acc;
                }
            }
            prefix = next;
        }
        history.tau = tau;
        history.tables = Tabulation::new(prefix, expected_times, n);
        Ok(history)
    }

    pub fn pieces(&self) -> &[ConstantTruncatedSizeHistory<T>] {
        &self.pieces
    }

    pub fn n_max(&self) -> usize {
        self.pieces[0].n_max()
    }

    pub fn tau(&self) -> &T {
        &self.tau
    }

    pub fn is_infinite(&self) -> bool {
        self.pieces[self.pieces.len() - 1].is_infinite()
    }

    pub fn size_at(&self, t: f64) -> T {
        let mut start = 0.0;
        for piece in &self.pieces {
            let end = start + piece.tau().value();
            if t < end {
                return piece.size().clone();
            }
            start = end;
        }
        self.pieces[self.pieces.len() - 1].size().clone()
    }

    pub fn scaled_time(&self, t: &T) -> T {
        let mut remaining = t.clone();
        let mut total = T::zero();
        for piece in &self.pieces {
            if remaining.value() <= 0.0 {
                break;
            }
            total += piece.scaled_time(&remaining);
            if piece.is_infinite() {
                break;
            }
            remaining = remaining - piece.tau().clone();
        }
        total
    }

    pub fn transition(&self, b: usize, a: usize) -> &T {
        &self.tables.transition[[b, a]]
    }

    pub fn expected_time(&self, b: usize, k: usize) -> &T {
        &self.tables.expected_times[[b, k]]
    }

    pub fn truncated_sfs(&self, b: usize, i: usize) -> &T {
        &self.tables.truncated_sfs[[b, i]]
    }
}

/// The size history attached to a node of a [`Demography`](crate::Demography).
#[derive(Clone, Debug)]
pub enum SizeHistory<T> {
    Constant(ConstantTruncatedSizeHistory<T>),
    Piecewise(PiecewiseHistory<T>),
}

impl<T> From<ConstantTruncatedSizeHistory<T>> for SizeHistory<T> {
    fn from(value: ConstantTruncatedSizeHistory<T>) -> Self {
        Self::Constant(value)
    }
}

impl<T> From<PiecewiseHistory<T>> for SizeHistory<T> {
    fn from(value: PiecewiseHistory<T>) -> Self {
        Self::Piecewise(value)
    }
}

macro_rules! delegate {
    ($self: ident, $h: ident => $e: expr) => {
        match $self {
            SizeHistory::Constant($h) => $e,
            SizeHistory::Piecewise($h) => $e,
        }
    };
}

impl<T: Scalar> SizeHistory<T> {
    pub fn n_max(&self) -> usize {
        delegate!(self, h => h.n_max())
    }

    /// Total duration.
    pub fn tau(&self) -> &T {
        delegate!(self, h => h.tau())
    }

    pub fn is_infinite(&self) -> bool {
        delegate!(self, h => h.is_infinite())
    }

    pub fn size_at(&self, t: f64) -> T {
        delegate!(self, h => h.size_at(t))
    }

    pub fn scaled_time(&self, t: &T) -> T {
        delegate!(self, h => h.scaled_time(t))
    }

    pub fn transition(&self, b: usize, a: usize) -> &T {
        delegate!(self, h => h.transition(b, a))
    }

    pub fn expected_time(&self, b: usize, k: usize) -> &T {
        delegate!(self, h => h.expected_time(b, k))
    }

    pub fn truncated_sfs(&self, b: usize, i: usize) -> &T {
        delegate!(self, h => h.truncated_sfs(b, i))
    }

    /// The constant epochs making up this history, most recent first.
    pub fn pieces(&self) -> &[ConstantTruncatedSizeHistory<T>] {
        match self {
            SizeHistory::Constant(h) => std::slice::from_ref(h),
            SizeHistory::Piecewise(h) => h.pieces(),
        }
    }
}
