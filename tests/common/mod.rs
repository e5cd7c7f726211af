#![allow(dead_code)]

use momi::{
    ConstantTruncatedSizeHistory, Demography, DemographyBuilder, DemographyFn, MomiError,
    PiecewiseHistory, Scalar,
};

pub fn constant<T: Scalar>(
    size: T,
    tau: T,
    n_max: usize,
) -> Result<ConstantTruncatedSizeHistory<T>, MomiError> {
    ConstantTruncatedSizeHistory::new(size, tau, n_max)
}

pub fn unbounded<T: Scalar>(size: T, n_max: usize) -> Result<ConstantTruncatedSizeHistory<T>, MomiError> {
    ConstantTruncatedSizeHistory::new(size, T::constant(f64::INFINITY), n_max)
}

/// Two demes joining into an ancestral one.
///
/// Parameters: log sizes of `a`, `b` and `ab`, then the log of the
/// split time.
pub struct TwoPopulations {
    pub n_a: usize,
    pub n_b: usize,
}

impl DemographyFn for TwoPopulations {
    fn demography<T: Scalar>(&self, params: &[T]) -> Result<Demography<T>, MomiError> {
        let mut b = DemographyBuilder::from_edges(
            &[("ab", "a"), ("ab", "b")],
            &[("a", self.n_a), ("b", self.n_b)],
        )?;
        let tau = params[3].exp();
        b.set_history("a", constant(params[0].exp(), tau.clone(), self.n_a)?)?;
        b.set_history("b", constant(params[1].exp(), tau, self.n_b)?)?;
        b.set_history("ab", unbounded(params[2].exp(), self.n_a + self.n_b)?)?;
        b.build()
    }
}

/// Like [`TwoPopulations`], with a bottleneck in `a` and a size
/// change in the ancestral deme.
///
/// Parameters: log sizes of the two pieces of `a`, log size of `b`,
/// log sizes of the two pieces of `ab`, then log durations of the
/// first piece of `a`, of `a` and `b`, and of the first piece of `ab`.
pub struct Bottleneck {
    pub n_a: usize,
    pub n_b: usize,
}

impl DemographyFn for Bottleneck {
    fn demography<T: Scalar>(&self, params: &[T]) -> Result<Demography<T>, MomiError> {
        let (n_a, n_b) = (self.n_a, self.n_b);
        let mut b =
            DemographyBuilder::from_edges(&[("ab", "a"), ("ab", "b")], &[("a", n_a), ("b", n_b)])?;
        let first = params[5].exp();
        let split = params[6].exp();
        b.set_history(
            "a",
            PiecewiseHistory::new(vec![
                constant(params[0].exp(), first.clone(), n_a)?,
                constant(params[1].exp(), split.clone(), n_a)?,
            ])?,
        )?;
        b.set_history("b", constant(params[2].exp(), split + first, n_b)?)?;
        b.set_history(
            "ab",
            PiecewiseHistory::new(vec![
                constant(params[3].exp(), params[7].exp(), n_a + n_b)?,
                unbounded(params[4].exp(), n_a + n_b)?,
            ])?,
        )?;
        b.build()
    }
}

/// `((a, b), (c, (d, e)))`.
///
/// Parameters: log sizes of `a, b, c, d, e, ab, de, cde, root`, then
/// log durations of every node but the root, in the same order.
pub struct FivePopulations {
    pub n: [usize; 5],
}

impl FivePopulations {
    pub const NODES: [&'static str; 9] = ["a", "b", "c", "d", "e", "ab", "de", "cde", "root"];
}

impl DemographyFn for FivePopulations {
    fn demography<T: Scalar>(&self, params: &[T]) -> Result<Demography<T>, MomiError> {
        let leaves = Self::NODES[..5]
            .iter()
            .zip(self.n)
            .map(|(name, n)| (*name, n))
            .collect::<Vec<_>>();
        let mut b = DemographyBuilder::from_edges(
            &[
                ("ab", "a"),
                ("ab", "b"),
                ("de", "d"),
                ("de", "e"),
                ("cde", "c"),
                ("cde", "de"),
                ("root", "ab"),
                ("root", "cde"),
            ],
            &leaves,
        )?;
        for (i, name) in Self::NODES.iter().enumerate() {
            let n = b.n_lineages(name)?;
            let size = params[i].exp();
            if *name == "root" {
                b.set_history(name, unbounded(size, n)?)?;
            } else {
                b.set_history(name, constant(size, params[9 + i].exp(), n)?)?;
            }
        }
        b.build()
    }
}

/// A demography with a fixed, hand-picked set of parameters.
pub fn fixed<M: DemographyFn>(model: &M, params: &[f64]) -> Demography<f64> {
    model.demography(params).unwrap()
}
