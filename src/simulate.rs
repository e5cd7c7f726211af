//! Coalescent simulation of SFS data under a [`Demography`].

use rand::distr::Distribution;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, Poisson};

use crate::combinatorics::pairs;
use crate::demography::Demography;
use crate::error::MomiError;
use crate::options::SimulationOptions;
use crate::sfs::{is_monomorphic, Sfs};
use crate::traits::Validate;

// A lineage, as the number of sampled lineages it is ancestral to at each leaf.
type Lineage = Vec<usize>;

/// Simulate `num_replicates` independent loci.
///
/// Genealogies follow the coalescent within each piece of each deme's
/// size history. A branch of length `dt` carries
/// `Poisson(mutation_rate * dt)` mutations, each recorded under the
/// configuration of sampled lineages below it.
///
/// # Errors
///
/// [`MomiError::DegenerateModelError`] if lineages can never coalesce
/// in the root, or if a rate is not a valid distribution parameter.
pub fn simulate<R: Rng + ?Sized>(
    demo: &Demography<f64>,
    num_replicates: usize,
    mutation_rate: f64,
    rng: &mut R,
) -> Result<Vec<Sfs>, MomiError> {
    log::debug!(
        "simulating {num_replicates} loci with mutation rate {mutation_rate} for {} leaves",
        demo.leaves().len()
    );
    let simulator = Simulator {
        demo,
        mutation_rate,
        n_lineages: demo.leaf_lineages(),
    };
    (0..num_replicates)
        .map(|_| simulator.locus(rng))
        .collect()
}

/// [`simulate`] with settings and a seed taken from `options`.
pub fn simulate_with(
    demo: &Demography<f64>,
    options: &SimulationOptions,
) -> Result<Vec<Sfs>, MomiError> {
    options.validate(MomiError::ConfigurationError)?;
    let mut rng = SmallRng::seed_from_u64(options.seed);
    simulate(demo, options.num_replicates, options.mutation_rate, &mut rng)
}

struct Simulator<'a> {
    demo: &'a Demography<f64>,
    mutation_rate: f64,
    n_lineages: Vec<usize>,
}

impl Simulator<'_> {
    fn locus<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sfs, MomiError> {
        let demo = self.demo;
        let num_leaves = demo.leaves().len();
        let mut sfs = Sfs::new();
        let mut tops: Vec<Vec<Lineage>> = vec![vec![]; demo.num_nodes()];
        for &id in demo.postorder() {
            let node = demo.node(id);
            let mut lineages = match demo.leaf_position(id) {
                Some(position) => {
                    let mut lineage = vec![0; num_leaves];
                    lineage[position] = 1;
                    vec![lineage; node.n_lineages()]
                }
                None => node
                    .children()
                    .iter()
                    .flat_map(|c| std::mem::take(&mut tops[c.index()]))
                    .collect(),
            };
            for piece in node.history().pieces() {
                self.epoch(&mut lineages, *piece.size(), *piece.tau(), &mut sfs, rng)?;
            }
            tops[id.index()] = lineages;
        }
        Ok(sfs)
    }

    fn epoch<R: Rng + ?Sized>(
        &self,
        lineages: &mut Vec<Lineage>,
        size: f64,
        tau: f64,
        sfs: &mut Sfs,
        rng: &mut R,
    ) -> Result<(), MomiError> {
        let mut remaining = tau;
        loop {
            let k = lineages.len();
            if k <= 1 && remaining.is_infinite() {
                return Ok(());
            }
            let wait = if k < 2 || size.is_infinite() {
                f64::INFINITY
            } else if size == 0.0 {
                0.0
            } else {
                Exp::new(pairs(k) / size)
                    .map_err(|e| MomiError::DegenerateModelError(e.to_string()))?
                    .sample(rng)
            };
            let dt = wait.min(remaining);
            if !dt.is_finite() {
                return Err(MomiError::DegenerateModelError(format!(
                    "{k} lineages never coalesce in an unbounded epoch of size {size}"
                )));
            }
            self.mutate(lineages, dt, sfs, rng)?;
            if wait >= remaining {
                return Ok(());
            }
            remaining -= wait;

            let i = rng.random_range(0..k);
            let mut j = rng.random_range(0..k - 1);
            if j >= i {
                j += 1;
            }
            let (first, second) = (i.min(j), i.max(j));
            let merged = lineages.swap_remove(second);
            for (x, y) in lineages[first].iter_mut().zip(merged) {
                *x += y;
            }
        }
    }

    fn mutate<R: Rng + ?Sized>(
        &self,
        lineages: &[Lineage],
        dt: f64,
        sfs: &mut Sfs,
        rng: &mut R,
    ) -> Result<(), MomiError> {
        let mean = self.mutation_rate * dt;
        if mean <= 0.0 {
            return Ok(());
        }
        let poisson =
            Poisson::new(mean).map_err(|e| MomiError::DegenerateModelError(e.to_string()))?;
        for lineage in lineages {
            let count: f64 = poisson.sample(rng);
            if count > 0.0 && !is_monomorphic(lineage, &self.n_lineages) {
                sfs.add(lineage.clone(), count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantTruncatedSizeHistory, DemographyBuilder, PiecewiseHistory};

    fn two_populations() -> Demography<f64> {
        let mut b = DemographyBuilder::new();
        b.add_leaf("a", 3).unwrap();
        b.add_leaf("b", 2).unwrap();
        b.add_ancestor("ab", &["a", "b"]).unwrap();
        b.set_history(
            "a",
            PiecewiseHistory::new(vec![
                ConstantTruncatedSizeHistory::new(0.5, 0.2, 3).unwrap(),
                ConstantTruncatedSizeHistory::new(2.0, 0.3, 3).unwrap(),
            ])
            .unwrap(),
        )
        .unwrap();
        b.set_history("b", ConstantTruncatedSizeHistory::new(1.0, 0.5, 2).unwrap())
            .unwrap();
        b.set_history(
            "ab",
            ConstantTruncatedSizeHistory::new(1.5, f64::INFINITY, 5).unwrap(),
        )
        .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_seed_is_reproducible() {
        let demo = two_populations();
        let options = SimulationOptions {
            num_replicates: 3,
            mutation_rate: 2.0,
            seed: 101,
        };
        let a = simulate_with(&demo, &options).unwrap();
        let b = simulate_with(&demo, &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_only_polymorphic_configurations() {
        let demo = two_populations();
        let mut rng = SmallRng::seed_from_u64(7);
        for sfs in simulate(&demo, 20, 5.0, &mut rng).unwrap() {
            for (config, _) in &sfs {
                assert!(!is_monomorphic(config, &[3, 2]));
                assert!(config[0] <= 3 && config[1] <= 2);
            }
        }
    }

    #[test]
    fn test_mean_number_of_sites() {
        let demo = two_populations();
        let mut rng = SmallRng::seed_from_u64(2024);
        let mutation_rate = 1.0;
        let loci = simulate(&demo, 4000, mutation_rate, &mut rng).unwrap();
        let mean = loci.iter().map(|s| s.total()).sum::<f64>() / loci.len() as f64;
        let expected = mutation_rate * demo.total_sfs_sum().unwrap();
        assert!((mean - expected).abs() < 0.1 * expected, "{mean} {expected}");
    }

    #[test]
    fn test_root_without_coalescence() {
        let mut b = DemographyBuilder::new();
        b.add_leaf("a", 2).unwrap();
        b.set_history(
            "a",
            ConstantTruncatedSizeHistory::new(f64::INFINITY, f64::INFINITY, 2).unwrap(),
        )
        .unwrap();
        let demo = b.build().unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(matches!(
            simulate(&demo, 1, 1.0, &mut rng),
            Err(MomiError::DegenerateModelError(_))
        ));
    }
}
