use std::collections::HashMap;

use crate::demography::{Demography, Node, NodeId};
use crate::error::MomiError;
use crate::scalar::Scalar;
use crate::size_history::SizeHistory;

#[derive(Debug)]
struct PendingNode<T> {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    n_lineages: usize,
    history: Option<SizeHistory<T>>,
}

/// This type builds a [`Demography`] from code.
///
/// Topology comes first: leaves with their sample sizes, then
/// ancestors naming their children. Once the topology is known,
/// [`DemographyBuilder::n_lineages`] reports how many lineages each
/// node subtends, which is what a [`SizeHistory`] has to be
/// tabulated for.
///
/// # Examples
///
/// ```
/// use momi::{ConstantTruncatedSizeHistory, DemographyBuilder};
///
/// let mut b = DemographyBuilder::<f64>::new();
/// b.add_leaf("a", 2).unwrap();
/// b.add_leaf("b", 3).unwrap();
/// b.add_ancestor("ab", &["a", "b"]).unwrap();
/// for (name, tau) in [("a", 0.5), ("b", 0.5), ("ab", f64::INFINITY)] {
///     let n = b.n_lineages(name).unwrap();
///     b.set_history(name, ConstantTruncatedSizeHistory::new(1.0, tau, n).unwrap())
///         .unwrap();
/// }
/// let demo = b.build().unwrap();
/// assert_eq!(demo.n_lineages_subtended_by("ab").unwrap(), 5);
/// ```
///
/// # Notes
///
/// * Structural errors are reported as soon as they can be detected.
///   Missing histories and root problems are reported by
///   [`DemographyBuilder::build`].
#[derive(Debug)]
pub struct DemographyBuilder<T> {
    nodes: Vec<PendingNode<T>>,
    index: HashMap<String, usize>,
}

impl<T: Scalar> Default for DemographyBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> DemographyBuilder<T> {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            index: HashMap::default(),
        }
    }

    /// Build the topology from `(parent, child)` edges.
    ///
    /// Nodes without children are leaves and must be listed in
    /// `leaf_lineages`. Leaves are ordered as in `leaf_lineages`,
    /// which fixes the order of entries in a configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// let b = momi::DemographyBuilder::<f64>::from_edges(
    ///     &[("abc", "ab"), ("abc", "c"), ("ab", "a"), ("ab", "b")],
    ///     &[("a", 1), ("b", 2), ("c", 3)],
    /// )
    /// .unwrap();
    /// assert_eq!(b.n_lineages("abc").unwrap(), 6);
    /// ```
    pub fn from_edges<S: AsRef<str>>(
        edges: &[(S, S)],
        leaf_lineages: &[(S, usize)],
    ) -> Result<Self, MomiError> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::default();
        let mut parents: HashMap<&str, &str> = HashMap::default();
        let mut internal_order: Vec<&str> = vec![];
        for (parent, child) in edges {
            let (parent, child) = (parent.as_ref(), child.as_ref());
            if let Some(previous) = parents.insert(child, parent) {
                return Err(MomiError::ConfigurationError(format!(
                    "{child} has more than one parent: {previous} and {parent}"
                )));
            }
            if !children.contains_key(parent) {
                internal_order.push(parent);
            }
            children.entry(parent).or_default().push(child);
        }

        let mut builder = Self::new();
        for (name, n) in leaf_lineages {
            let name = name.as_ref();
            if children.contains_key(name) {
                return Err(MomiError::ConfigurationError(format!(
                    "{name} has children and cannot carry a sample"
                )));
            }
            builder.add_leaf(name, *n)?;
        }
        for child in parents.keys() {
            if !children.contains_key(child) && !builder.index.contains_key(*child) {
                return Err(MomiError::ConfigurationError(format!(
                    "leaf {child} has no lineage count"
                )));
            }
        }

        let mut in_progress = vec![];
        for name in internal_order {
            builder.visit(name, &children, &mut in_progress)?;
        }
        Ok(builder)
    }

    // Depth-first insertion of `name` after all of its descendants.
    fn visit<'a>(
        &mut self,
        name: &'a str,
        children: &HashMap<&'a str, Vec<&'a str>>,
        in_progress: &mut Vec<&'a str>,
    ) -> Result<(), MomiError> {
        if self.index.contains_key(name) {
            return Ok(());
        }
        if in_progress.contains(&name) {
            return Err(MomiError::ConfigurationError(format!(
                "the demography contains a cycle through {name}"
            )));
        }
        in_progress.push(name);
        let kids = children.get(name).cloned().unwrap_or_default();
        for &child in &kids {
            self.visit(child, children, in_progress)?;
        }
        in_progress.pop();
        self.add_ancestor(name, &kids)?;
        Ok(())
    }

    fn push(&mut self, name: &str, node: PendingNode<T>) -> Result<NodeId, MomiError> {
        if self.index.contains_key(name) {
            return Err(MomiError::ConfigurationError(format!(
                "duplicate node name: {name}"
            )));
        }
        let id = self.nodes.len();
        self.index.insert(name.to_string(), id);
        self.nodes.push(node);
        Ok(NodeId::new(id))
    }

    fn lookup(&self, name: &str) -> Result<usize, MomiError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| MomiError::ConfigurationError(format!("unknown node: {name}")))
    }

    /// Add a sampled deme with `n_lineages` lineages.
    pub fn add_leaf(&mut self, name: &str, n_lineages: usize) -> Result<NodeId, MomiError> {
        if n_lineages == 0 {
            return Err(MomiError::ConfigurationError(format!(
                "leaf {name} must have at least one lineage"
            )));
        }
        self.push(
            name,
            PendingNode {
                name: name.to_string(),
                parent: None,
                children: vec![],
                n_lineages,
                history: None,
            },
        )
    }

    /// Add the deme that `children` merge into, backwards in time.
    ///
    /// A single child is allowed and simply continues the lineage.
    pub fn add_ancestor<S: AsRef<str>>(
        &mut self,
        name: &str,
        children: &[S],
    ) -> Result<NodeId, MomiError> {
        if children.is_empty() {
            return Err(MomiError::ConfigurationError(format!(
                "ancestor {name} has no children"
            )));
        }
        let mut ids = vec![];
        for child in children {
            let id = self.lookup(child.as_ref())?;
            if ids.contains(&id) {
                return Err(MomiError::ConfigurationError(format!(
                    "{} is listed twice as a child of {name}",
                    child.as_ref()
                )));
            }
            if let Some(parent) = self.nodes[id].parent {
                return Err(MomiError::ConfigurationError(format!(
                    "{} already has parent {}",
                    child.as_ref(),
                    self.nodes[parent].name
                )));
            }
            ids.push(id);
        }
        let n_lineages = ids.iter().map(|&id| self.nodes[id].n_lineages).sum();
        let parent = self.nodes.len();
        let node = self.push(
            name,
            PendingNode {
                name: name.to_string(),
                parent: None,
                children: ids.clone(),
                n_lineages,
                history: None,
            },
        )?;
        for id in ids {
            self.nodes[id].parent = Some(parent);
        }
        Ok(node)
    }

    /// Number of sampled lineages below `name`.
    pub fn n_lineages(&self, name: &str) -> Result<usize, MomiError> {
        Ok(self.nodes[self.lookup(name)?].n_lineages)
    }

    /// Attach (or replace) the size history of `name`.
    pub fn set_history<H: Into<SizeHistory<T>>>(
        &mut self,
        name: &str,
        history: H,
    ) -> Result<(), MomiError> {
        let id = self.lookup(name)?;
        self.nodes[id].history = Some(history.into());
        Ok(())
    }

    /// Validate and freeze the demography.
    ///
    /// # Errors
    ///
    /// * [`MomiError::ConfigurationError`] if there is not exactly one root,
    ///   if a node has no history, if a history is tabulated for fewer
    ///   lineages than its node subtends, or if the root history is bounded.
    /// * [`MomiError::DegenerateModelError`] if a non-root history is unbounded.
    pub fn build(self) -> Result<Demography<T>, MomiError> {
        let roots = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if roots.len() != 1 {
            let names = roots
                .iter()
                .map(|&i| self.nodes[i].name.as_str())
                .collect::<Vec<_>>();
            return Err(MomiError::ConfigurationError(format!(
                "a demography must have exactly one root, found {names:?}"
            )));
        }
        let root = roots[0];

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, pending) in self.nodes.into_iter().enumerate() {
            let history = pending.history.ok_or_else(|| {
                MomiError::ConfigurationError(format!("{} has no size history", pending.name))
            })?;
            if history.n_max() < pending.n_lineages {
                return Err(MomiError::ConfigurationError(format!(
                    "history of {} is tabulated for {} lineages but the node subtends {}",
                    pending.name,
                    history.n_max(),
                    pending.n_lineages
                )));
            }
            if i == root && !history.is_infinite() {
                return Err(MomiError::ConfigurationError(format!(
                    "root {} must have an unbounded history",
                    pending.name
                )));
            }
            if i != root && history.is_infinite() {
                return Err(MomiError::DegenerateModelError(format!(
                    "{} is not the root but has an unbounded history",
                    pending.name
                )));
            }
            nodes.push(Node::new(
                pending.name,
                pending.parent.map(NodeId::new),
                pending.children.into_iter().map(NodeId::new).collect(),
                pending.n_lineages,
                history,
            ));
        }
        let demography = Demography::new(nodes, self.index, NodeId::new(root));
        log::debug!(
            "built demography with {} nodes, {} leaves and {} lineages",
            demography.num_nodes(),
            demography.leaves().len(),
            demography.n_lineages()
        );
        Ok(demography)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstantTruncatedSizeHistory;

    fn constant(n: usize, tau: f64) -> ConstantTruncatedSizeHistory<f64> {
        ConstantTruncatedSizeHistory::new(1.0, tau, n).unwrap()
    }

    #[test]
    fn test_lineage_counts() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 2).unwrap();
        b.add_leaf("b", 3).unwrap();
        b.add_leaf("c", 4).unwrap();
        b.add_ancestor("ab", &["a", "b"]).unwrap();
        b.add_ancestor("abc", &["ab", "c"]).unwrap();
        assert_eq!(b.n_lineages("ab").unwrap(), 5);
        assert_eq!(b.n_lineages("abc").unwrap(), 9);
    }

    #[test]
    fn test_child_with_two_parents() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 2).unwrap();
        b.add_leaf("b", 3).unwrap();
        b.add_ancestor("ab", &["a", "b"]).unwrap();
        assert!(matches!(
            b.add_ancestor("x", &["a"]),
            Err(MomiError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_from_edges_cycle() {
        let result =
            DemographyBuilder::<f64>::from_edges(&[("x", "y"), ("y", "x"), ("x", "a")], &[("a", 1)]);
        assert!(matches!(result, Err(MomiError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_edges_missing_leaf_count() {
        let result = DemographyBuilder::<f64>::from_edges(&[("ab", "a"), ("ab", "b")], &[("a", 1)]);
        assert!(matches!(result, Err(MomiError::ConfigurationError(_))));
    }

    #[test]
    fn test_missing_history() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 2).unwrap();
        assert!(matches!(b.build(), Err(MomiError::ConfigurationError(_))));
    }

    #[test]
    fn test_two_roots() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 2).unwrap();
        b.add_leaf("b", 2).unwrap();
        b.set_history("a", constant(2, f64::INFINITY)).unwrap();
        b.set_history("b", constant(2, f64::INFINITY)).unwrap();
        assert!(matches!(b.build(), Err(MomiError::ConfigurationError(_))));
    }

    #[test]
    fn test_history_too_small() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 3).unwrap();
        b.set_history("a", constant(2, f64::INFINITY)).unwrap();
        assert!(matches!(b.build(), Err(MomiError::ConfigurationError(_))));
    }

    #[test]
    fn test_bounded_root_and_unbounded_leaf() {
        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 3).unwrap();
        b.set_history("a", constant(3, 1.0)).unwrap();
        assert!(matches!(b.build(), Err(MomiError::ConfigurationError(_))));

        let mut b = DemographyBuilder::<f64>::new();
        b.add_leaf("a", 1).unwrap();
        b.add_leaf("b", 1).unwrap();
        b.add_ancestor("ab", &["a", "b"]).unwrap();
        b.set_history("a", constant(1, f64::INFINITY)).unwrap();
        b.set_history("b", constant(1, 1.0)).unwrap();
        b.set_history("ab", constant(2, f64::INFINITY)).unwrap();
        assert!(matches!(b.build(), Err(MomiError::DegenerateModelError(_))));
    }

    #[test]
    fn test_zero_lineage_leaf() {
        let mut b = DemographyBuilder::<f64>::new();
        assert!(matches!(
            b.add_leaf("a", 0),
            Err(MomiError::ConfigurationError(_))
        ));
    }
}
