use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::error::MomiError;
use crate::traits::Validate;

/// One `(config, count)` pair of a serialized [`Sfs`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SfsEntry {
    /// Number of derived alleles at each leaf.
    pub config: Vec<usize>,
    /// Number of sites with this configuration.
    pub count: f64,
}

impl Validate for SfsEntry {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError> {
        if !self.count.is_finite() || self.count < 0.0 {
            Err(err(format!(
                "count of {:?} must be finite and >= 0, got {}",
                self.config, self.count
            )))
        } else {
            Ok(())
        }
    }
}

/// A site frequency spectrum: number of sites per configuration.
///
/// A configuration lists the number of derived alleles at each leaf,
/// in the leaf order of the [`Demography`](crate::Demography) it is
/// evaluated against. Every configuration has the same length.
///
/// # Examples
///
/// ```
/// let yaml = "
/// - config: [1, 0]
///   count: 3
/// - config: [0, 2]
///   count: 1
/// - config: [1, 0]
///   count: 2
/// ";
/// let sfs = momi::Sfs::from_yaml_str(yaml).unwrap();
/// assert_eq!(sfs.get(&[1, 0]), 5.0);
/// assert_eq!(sfs.total(), 6.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SfsEntry>", into = "Vec<SfsEntry>")]
pub struct Sfs {
    counts: BTreeMap<Vec<usize>, f64>,
}

impl TryFrom<Vec<SfsEntry>> for Sfs {
    type Error = MomiError;

    fn try_from(entries: Vec<SfsEntry>) -> Result<Self, Self::Error> {
        let mut sfs = Self::new();
        for entry in entries {
            sfs.add(entry.config, entry.count)?;
        }
        Ok(sfs)
    }
}

impl From<Sfs> for Vec<SfsEntry> {
    fn from(sfs: Sfs) -> Self {
        sfs.counts
            .into_iter()
            .map(|(config, count)| SfsEntry { config, count })
            .collect()
    }
}

impl Sfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` sites with configuration `config`.
    ///
    /// # Errors
    ///
    /// [`MomiError::SfsError`] if `count` is negative or not finite,
    /// or if `config` does not have the length of the configurations
    /// already present.
    pub fn add(&mut self, config: Vec<usize>, count: f64) -> Result<(), MomiError> {
        let entry = SfsEntry { config, count };
        entry.validate(MomiError::SfsError)?;
        if let Some(n) = self.num_leaves() {
            if n != entry.config.len() {
                return Err(MomiError::SfsError(format!(
                    "configuration {:?} has {} entries, expected {n}",
                    entry.config,
                    entry.config.len()
                )));
            }
        }
        *self.counts.entry(entry.config).or_insert(0.0) += entry.count;
        Ok(())
    }

    /// Number of sites with configuration `config`; zero if absent.
    pub fn get(&self, config: &[usize]) -> f64 {
        self.counts.get(config).copied().unwrap_or(0.0)
    }

    /// Number of distinct configurations.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Length of the configurations, if there are any.
    pub fn num_leaves(&self) -> Option<usize> {
        self.counts.keys().next().map(|c| c.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<usize>, &f64)> {
        self.counts.iter()
    }

    /// Total number of sites.
    pub fn total(&self) -> f64 {
        self.counts.values().sum()
    }

    /// Sum of several spectra, such as one per locus.
    pub fn aggregate(spectra: &[Sfs]) -> Result<Self, MomiError> {
        let mut total = Self::new();
        for sfs in spectra {
            for (config, count) in sfs.iter() {
                total.add(config.clone(), *count)?;
            }
        }
        Ok(total)
    }

    /// The polymorphic part of the spectrum for leaves with
    /// `n_lineages` sampled lineages.
    ///
    /// # Errors
    ///
    /// [`MomiError::SfsError`] if a configuration has the wrong length
    /// or more derived alleles than lineages at some leaf.
    pub fn segregating(&self, n_lineages: &[usize]) -> Result<Self, MomiError> {
        let mut polymorphic = Self::new();
        for (config, count) in self.iter() {
            check_config(config, n_lineages)?;
            if !is_monomorphic(config, n_lineages) {
                polymorphic.add(config.clone(), *count)?;
            }
        }
        Ok(polymorphic)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MomiError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, MomiError> {
        Ok(serde_yaml::to_string(self)?)
    }

    #[cfg(feature = "json")]
    #[cfg_attr(doc_cfg, doc(cfg(feature = "json")))]
    pub fn from_json_str(json: &str) -> Result<Self, MomiError> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "json")]
    #[cfg_attr(doc_cfg, doc(cfg(feature = "json")))]
    pub fn to_json_string(&self) -> Result<String, MomiError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<'a> IntoIterator for &'a Sfs {
    type Item = (&'a Vec<usize>, &'a f64);
    type IntoIter = std::collections::btree_map::Iter<'a, Vec<usize>, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

pub(crate) fn check_config(config: &[usize], n_lineages: &[usize]) -> Result<(), MomiError> {
    if config.len() != n_lineages.len() {
        return Err(MomiError::SfsError(format!(
            "configuration {config:?} has {} entries but there are {} leaves",
            config.len(),
            n_lineages.len()
        )));
    }
    if config.iter().zip(n_lineages).any(|(d, n)| d > n) {
        return Err(MomiError::SfsError(format!(
            "configuration {config:?} exceeds sample sizes {n_lineages:?}"
        )));
    }
    Ok(())
}

/// `true` if every lineage carries the same allele.
pub fn is_monomorphic(config: &[usize], n_lineages: &[usize]) -> bool {
    config.iter().all(|&d| d == 0) || config == n_lineages
}

/// Every polymorphic configuration for leaves with `n_lineages`
/// sampled lineages, in lexicographic order.
pub fn configurations(n_lineages: &[usize]) -> Vec<Vec<usize>> {
    let mut all = vec![vec![]];
    for &n in n_lineages {
        all = all
            .into_iter()
            .flat_map(|prefix: Vec<usize>| {
                (0..=n).map(move |d| {
                    let mut config = prefix.clone();
                    config.push(d);
                    config
                })
            })
            .collect();
    }
    all.into_iter()
        .filter(|config| !is_monomorphic(config, n_lineages))
        .collect()
}
