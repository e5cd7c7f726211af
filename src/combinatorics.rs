//! Constant combinatorial weights of the coalescent.
//!
//! Nothing here depends on model parameters, so everything is
//! plain `f64`.

/// Pascal's triangle up to a fixed order.
#[derive(Clone, Debug)]
pub(crate) struct Binomials {
    rows: Vec<Vec<f64>>,
}

impl Binomials {
    pub(crate) fn new(max_n: usize) -> Self {
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);
        for n in 0..=max_n {
            let mut row = vec![1.0; n + 1];
            for k in 1..n {
                row[k] = rows[n - 1][k - 1] + rows[n - 1][k];
            }
            rows.push(row);
        }
        Self { rows }
    }

    /// `C(n, k)`, zero outside `0 <= k <= n`.
    pub(crate) fn choose(&self, n: isize, k: isize) -> f64 {
        if n < 0 || k < 0 || k > n {
            return 0.0;
        }
        self.rows[n as usize][k as usize]
    }

    /// Probability that, of `b` lineages descending from `a` ancestors of
    /// which `j` carry the derived allele, exactly `i` carry it.
    ///
    /// Ancestors are exchangeable under the coalescent, so the count
    /// follows a Pólya urn started with `j` derived and `a - j` ancestral
    /// balls, run for `b - a` draws.
    pub(crate) fn polya(&self, b: usize, a: usize, i: usize, j: usize) -> f64 {
        if a == 0 || a > b || j > a || i > b {
            return 0.0;
        }
        if j == 0 {
            return if i == 0 { 1.0 } else { 0.0 };
        }
        if j == a {
            return if i == b { 1.0 } else { 0.0 };
        }
        let (b, a, i, j) = (b as isize, a as isize, i as isize, j as isize);
        self.choose(i - 1, j - 1) * self.choose(b - i - 1, a - j - 1) / self.choose(b - 1, a - 1)
    }

    /// Probability that one of `k` lineages, descended from `b` lineages,
    /// is ancestral to exactly `i` of them.
    pub(crate) fn subtends(&self, b: usize, k: usize, i: usize) -> f64 {
        if k == 1 {
            return if i == b { 1.0 } else { 0.0 };
        }
        self.polya(b, k, i, 1)
    }

    /// Probability that a subset of `m` out of `n` exchangeable lineages
    /// holds `i` of the `j` derived ones: `C(m, i) C(n - m, j - i) / C(n, j)`.
    pub(crate) fn hypergeometric(&self, n: usize, j: usize, m: usize, i: usize) -> f64 {
        let (n, j, m, i) = (n as isize, j as isize, m as isize, i as isize);
        let denom = self.choose(n, j);
        if denom == 0.0 {
            return 0.0;
        }
        self.choose(m, i) * self.choose(n - m, j - i) / denom
    }
}

/// `C(k, 2)` as a float.
pub(crate) fn pairs(k: usize) -> f64 {
    (k * k.saturating_sub(1)) as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomials() {
        let b = Binomials::new(10);
        assert_eq!(b.choose(10, 3), 120.0);
        assert_eq!(b.choose(4, 5), 0.0);
        assert_eq!(b.choose(-1, 0), 0.0);
        assert_eq!(b.choose(0, 0), 1.0);
    }

    #[test]
    fn test_polya_is_a_distribution() {
        let bin = Binomials::new(20);
        for b in 1..=8 {
            for a in 1..=b {
                for j in 0..=a {
                    let total: f64 = (0..=b).map(|i| bin.polya(b, a, i, j)).sum();
                    assert!((total - 1.0).abs() < 1e-12, "{b} {a} {j} {total}");
                }
            }
        }
    }

    #[test]
    fn test_subtends_is_a_distribution() {
        let bin = Binomials::new(20);
        for b in 1..=8 {
            for k in 1..=b {
                let total: f64 = (1..=b).map(|i| bin.subtends(b, k, i)).sum();
                assert!((total - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_hypergeometric_is_a_distribution() {
        let bin = Binomials::new(20);
        let (n, m) = (9, 4);
        for j in 0..=n {
            let total: f64 = (0..=m).map(|i| bin.hypergeometric(n, j, m, i)).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }
}
