//! Probability of a leaf configuration by message passing.
//!
//! A configuration is the number of derived alleles at every leaf,
//! produced by a single mutation on the genealogy. Going up the tree,
//! the message of a node holds, for `b` lineages at the bottom of its
//! epoch of which `i` carry the derived allele, the joint probability
//! of `b` and of the allele counts observed below.
//!
//! * Leaves start from a point mass at their sample size and
//!   observed count.
//! * Each epoch is crossed with the truncated-coalescent transition.
//!   Derived alleles among fewer ancestral lineages spread to their
//!   descendants as in a Pólya urn.
//! * Children are joined by convolution. Derived lineages are an
//!   exchangeable subset, so counts are weighted by hypergeometric
//!   probabilities.
//! * A node whose subtree holds every derived leaf contributes the
//!   expected length of its epoch branches subtending the derived
//!   lineages.
//!
//! Tables are rescaled by their largest entry as they go up and
//! the scale is kept as a logarithm, so deep trees do not underflow.

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::combinatorics::Binomials;
use crate::demography::{Demography, NodeId};
use crate::error::MomiError;
use crate::scalar::{log_sum_exp, Scalar};
use crate::sfs::configurations;

#[derive(Clone, Debug)]
struct Message<T> {
    table: Array2<T>,
    log_scale: T,
}

impl<T: Scalar> Message<T> {
    fn rescaled(mut table: Array2<T>, log_scale: T) -> Self {
        let largest = table
            .iter()
            .max_by(|a, b| a.value().total_cmp(&b.value()))
            .cloned();
        match largest {
            Some(largest) if largest.value() > 0.0 && largest.is_finite() => {
                table.mapv_inplace(|x| x / largest.clone());
                Self {
                    table,
                    log_scale: log_scale + largest.ln(),
                }
            }
            _ => Self { table, log_scale },
        }
    }
}

/// Evaluates the probability of the state set on a [`Demography`].
///
/// # Examples
///
/// ```
/// use momi::{ConstantTruncatedSizeHistory, DemographyBuilder, SumProduct};
///
/// let mut b = DemographyBuilder::<f64>::new();
/// b.add_leaf("a", 2).unwrap();
/// b.set_history("a", ConstantTruncatedSizeHistory::new(1.0, f64::INFINITY, 2).unwrap())
///     .unwrap();
/// let mut demo = b.build().unwrap();
/// demo.update_derived(&[1]).unwrap();
///
/// // Singletons are the only polymorphic configuration of two lineages.
/// let p = SumProduct::new(&demo).p(true).unwrap();
/// assert!((p - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct SumProduct<'a, T> {
    demo: &'a Demography<T>,
    binomials: Binomials,
}

impl<'a, T: Scalar> SumProduct<'a, T> {
    pub fn new(demo: &'a Demography<T>) -> Self {
        Self {
            demo,
            binomials: Binomials::new(demo.n_lineages()),
        }
    }

    /// Probability of the current leaf state.
    ///
    /// Unnormalized, this is the expected length of branches whose
    /// mutations produce the state. Normalized, it is divided by
    /// [`Demography::total_sfs_sum`].
    ///
    /// # Errors
    ///
    /// * [`MomiError::InvalidStateError`] if a leaf has no state or
    ///   the state is monomorphic.
    /// * [`MomiError::DegenerateModelError`] if `normalized` and the
    ///   total SFS sum is not finite and positive.
    pub fn p(&self, normalized: bool) -> Result<T, MomiError> {
        Ok(self.log_p(normalized)?.exp())
    }

    /// Natural logarithm of [`SumProduct::p`]; `-inf` if the
    /// state cannot occur.
    pub fn log_p(&self, normalized: bool) -> Result<T, MomiError> {
        let derived = self.demo.derived_counts().ok_or_else(|| {
            MomiError::InvalidStateError("not every leaf has a state".to_string())
        })?;
        self.log_p_of(&derived, normalized)
    }

    fn log_p_of(&self, derived: &[usize], normalized: bool) -> Result<T, MomiError> {
        let log_p = self.log_p_unnormalized(derived)?;
        if normalized {
            let total = self.demo.total_sfs_sum()?;
            Ok(log_p - total.ln())
        } else {
            Ok(log_p)
        }
    }

    fn log_p_unnormalized(&self, derived: &[usize]) -> Result<T, MomiError> {
        let demo = self.demo;
        let n_total = demo.n_lineages();
        let total_derived = derived.iter().sum::<usize>();
        if total_derived == 0 || total_derived == n_total {
            return Err(MomiError::InvalidStateError(format!(
                "configuration {derived:?} is monomorphic"
            )));
        }

        let mut tops: Vec<Option<Message<T>>> = vec![None; demo.num_nodes()];
        let mut derived_below = vec![0; demo.num_nodes()];
        let mut terms = vec![];
        for &id in demo.postorder() {
            let node = demo.node(id);
            let n = node.n_lineages();
            let bottom = match demo.leaf_position(id) {
                Some(position) => {
                    derived_below[id.index()] = derived[position];
                    let mut table = Array2::from_elem((n + 1, n + 1), T::zero());
                    table[[n, derived[position]]] = T::one();
                    Message {
                        table,
                        log_scale: T::zero(),
                    }
                }
                None => {
                    derived_below[id.index()] = node
                        .children()
                        .iter()
                        .map(|c| derived_below[c.index()])
                        .sum();
                    self.join(node.children(), &mut tops)?
                }
            };

            if derived_below[id.index()] == total_derived {
                let history = node.history();
                let mut s = T::zero();
                for b in 1..=n {
                    let last = if n == n_total { b - 1 } else { b };
                    for i in 1..=last {
                        s += bottom.table[[b, i]].clone() * history.truncated_sfs(b, i).clone();
                    }
                }
                if s.value() > 0.0 {
                    terms.push(bottom.log_scale.clone() + s.ln());
                }
            }

            if id != demo.root() {
                tops[id.index()] = Some(self.cross_epoch(id, bottom));
            }
        }
        Ok(log_sum_exp(&terms))
    }

    // Message at the top of the epoch of `id`, from the one at its bottom.
    fn cross_epoch(&self, id: NodeId, bottom: Message<T>) -> Message<T> {
        let node = self.demo.node(id);
        let history = node.history();
        let n = node.n_lineages();
        let mut top = Array2::from_elem((n + 1, n + 1), T::zero());
        for b in 1..=n {
            for a in 1..=b {
                let stay = history.transition(b, a);
                for j in 0..=a {
                    let mut acc = T::zero();
                    for i in j..=(b - a + j) {
                        let w = self.binomials.polya(b, a, i, j);
                        if w != 0.0 {
                            acc += bottom.table[[b, i]].clone() * w;
                        }
                    }
                    top[[a, j]] += stay.clone() * acc;
                }
            }
        }
        Message::rescaled(top, bottom.log_scale)
    }

    // Message at the bottom of a node from the messages at the top of its children.
    fn join(
        &self,
        children: &[NodeId],
        tops: &mut [Option<Message<T>>],
    ) -> Result<Message<T>, MomiError> {
        let mut joined: Option<Message<T>> = None;
        for child in children {
            let message = tops[child.index()].take().ok_or_else(|| {
                MomiError::ConfigurationError(format!(
                    "{} was not visited before its parent",
                    self.demo.node(*child).name()
                ))
            })?;
            joined = Some(match joined {
                None => message,
                Some(acc) => self.convolve(acc, message),
            });
        }
        let joined = joined.ok_or_else(|| {
            MomiError::ConfigurationError("an internal node has no children".to_string())
        })?;
        Ok(Message::rescaled(joined.table, joined.log_scale))
    }

    // Pools the lineages of two subtrees. The derived lineages of the
    // pool are an exchangeable subset, so each pair of entries is
    // weighted by the hypergeometric probability of the split.
    fn convolve(&self, left: Message<T>, right: Message<T>) -> Message<T> {
        let (n1, n2) = (left.table.nrows() - 1, right.table.nrows() - 1);
        let mut table = Array2::from_elem((n1 + n2 + 1, n1 + n2 + 1), T::zero());
        for a1 in 1..=n1 {
            for j1 in 0..=a1 {
                let x = &left.table[[a1, j1]];
                for a2 in 1..=n2 {
                    for j2 in 0..=a2 {
                        let w = self.binomials.hypergeometric(a1 + a2, j1 + j2, a1, j1);
                        table[[a1 + a2, j1 + j2]] +=
                            x.clone() * right.table[[a2, j2]].clone() * w;
                    }
                }
            }
        }
        Message {
            table,
            log_scale: left.log_scale + right.log_scale,
        }
    }
}

/// Expected total length of polymorphic branches. See
/// [`Demography::total_sfs_sum`].
///
/// Lineage counts at the bottom of each epoch are tracked as a
/// distribution; a node's epoch contributes the expected time times
/// the number of lineages, excluding the time with a single lineage
/// ancestral to the whole sample.
pub(crate) fn total_sfs_sum<T: Scalar>(demo: &Demography<T>) -> T {
    let n_total = demo.n_lineages();
    let mut tops: Vec<Vec<T>> = vec![vec![]; demo.num_nodes()];
    let mut total = T::zero();
    for &id in demo.postorder() {
        let node = demo.node(id);
        let n = node.n_lineages();
        let bottom = if node.is_leaf() {
            let mut point = vec![T::zero(); n + 1];
            point[n] = T::one();
            point
        } else {
            let mut acc = vec![T::one()];
            for child in node.children() {
                let top = std::mem::take(&mut tops[child.index()]);
                let mut next = vec![T::zero(); acc.len() + top.len() - 1];
                for (x, px) in acc.iter().enumerate() {
                    for (y, py) in top.iter().enumerate() {
                        next[x + y] += px.clone() * py.clone();
                    }
                }
                acc = next;
            }
            acc
        };

        let history = node.history();
        for (b, pb) in bottom.iter().enumerate().skip(1) {
            let mut length = T::zero();
            for k in 2..=b {
                length += history.expected_time(b, k).clone() * k as f64;
            }
            if n < n_total {
                length += history.expected_time(b, 1).clone();
            }
            total += pb.clone() * length;
        }

        if id != demo.root() {
            let mut top = vec![T::zero(); n + 1];
            for (b, pb) in bottom.iter().enumerate().skip(1) {
                for (a, pa) in top.iter_mut().enumerate().take(b + 1).skip(1) {
                    *pa += pb.clone() * history.transition(b, a).clone();
                }
            }
            tops[id.index()] = top;
        }
    }
    total
}

/// Probability of every polymorphic configuration of `demo`,
/// keyed by derived counts in [`Demography::leaves`] order.
///
/// The leaf states of `demo` are left untouched.
pub fn expected_sfs<T: Scalar>(
    demo: &Demography<T>,
    normalized: bool,
) -> Result<BTreeMap<Vec<usize>, T>, MomiError> {
    let engine = SumProduct::new(demo);
    configurations(&demo.leaf_lineages())
        .into_iter()
        .map(|config| {
            let p = engine.log_p_of(&config, normalized)?.exp();
            Ok((config, p))
        })
        .collect()
}
