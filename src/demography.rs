use std::cell::OnceCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MomiError;
use crate::scalar::Scalar;
use crate::size_history::SizeHistory;

/// Index of a node in a [`Demography`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the node in [`Demography::nodes`].
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Observed allele counts among the lineages sampled from a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafState {
    pub ancestral: usize,
    pub derived: usize,
}

impl LeafState {
    pub fn new(ancestral: usize, derived: usize) -> Self {
        Self {
            ancestral,
            derived,
        }
    }

    /// Number of lineages this state accounts for.
    pub fn n_lineages(&self) -> usize {
        self.ancestral + self.derived
    }
}

/// A deme of a [`Demography`].
#[derive(Clone, Debug)]
pub struct Node<T> {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    n_lineages: usize,
    history: SizeHistory<T>,
    state: Option<LeafState>,
}

impl<T> Node<T> {
    pub(crate) fn new(
        name: String,
        parent: Option<NodeId>,
        children: Vec<NodeId>,
        n_lineages: usize,
        history: SizeHistory<T>,
    ) -> Self {
        Self {
            name,
            parent,
            children,
            n_lineages,
            history,
            state: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of sampled lineages subtended by this node.
    pub fn n_lineages(&self) -> usize {
        self.n_lineages
    }

    pub fn history(&self) -> &SizeHistory<T> {
        &self.history
    }

    /// The last observation set by [`Demography::update_state`].
    /// Always `None` for internal nodes.
    pub fn state(&self) -> Option<LeafState> {
        self.state
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree of demes, each with a [`SizeHistory`], plus the
/// allele counts currently observed at the leaves.
///
/// Built with [`DemographyBuilder`](crate::DemographyBuilder).
/// The size histories, and everything derived from them, are fixed
/// once built. Only the leaf states change, through
/// [`Demography::update_state`] and [`Demography::update_derived`].
#[derive(Clone, Debug)]
pub struct Demography<T> {
    nodes: Vec<Node<T>>,
    index: HashMap<String, usize>,
    root: NodeId,
    postorder: Vec<NodeId>,
    leaves: Vec<NodeId>,
    leaf_positions: Vec<Option<usize>>,
    total_sfs_sum: OnceCell<T>,
}

impl<T> Demography<T> {
    pub(crate) fn new(nodes: Vec<Node<T>>, index: HashMap<String, usize>, root: NodeId) -> Self {
        let mut postorder = Vec::with_capacity(nodes.len());
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                postorder.push(id);
            } else {
                stack.push((id, true));
                for &child in nodes[id.0].children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        // Leaves keep their insertion order.
        let leaves = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
            .map(|(i, _)| NodeId(i))
            .collect::<Vec<_>>();
        let mut leaf_positions = vec![None; nodes.len()];
        for (position, leaf) in leaves.iter().enumerate() {
            leaf_positions[leaf.0] = Some(position);
        }
        Self {
            nodes,
            index,
            root,
            postorder,
            leaves,
            leaf_positions,
            total_sfs_sum: OnceCell::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.0]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).map(|&i| NodeId(i))
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node<T>> {
        self.node_id(name).map(|id| self.node(id))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Every node after all of its descendants.
    pub fn postorder(&self) -> &[NodeId] {
        &self.postorder
    }

    /// The sampled demes, in the order used by configurations.
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    pub fn leaf_names(&self) -> Vec<&str> {
        self.leaves.iter().map(|&id| self.node(id).name()).collect()
    }

    /// Position of `id` in [`Demography::leaves`].
    pub fn leaf_position(&self, id: NodeId) -> Option<usize> {
        self.leaf_positions[id.0]
    }

    /// Sample sizes in [`Demography::leaves`] order.
    pub fn leaf_lineages(&self) -> Vec<usize> {
        self.leaves
            .iter()
            .map(|&id| self.node(id).n_lineages)
            .collect()
    }

    /// Total number of sampled lineages.
    pub fn n_lineages(&self) -> usize {
        self.node(self.root).n_lineages
    }

    /// Number of sampled lineages below the deme called `name`.
    pub fn n_lineages_subtended_by(&self, name: &str) -> Result<usize, MomiError> {
        self.node_by_name(name)
            .map(|node| node.n_lineages)
            .ok_or_else(|| MomiError::ConfigurationError(format!("unknown node: {name}")))
    }

    /// Derived counts in [`Demography::leaves`] order, if every
    /// leaf has a state.
    pub fn derived_counts(&self) -> Option<Vec<usize>> {
        self.leaves
            .iter()
            .map(|&id| self.node(id).state.map(|s| s.derived))
            .collect()
    }

    /// Replace the observations at every leaf.
    ///
    /// Nothing is written unless all states are valid.
    ///
    /// # Errors
    ///
    /// [`MomiError::InvalidStateError`] if a name is not a leaf, a leaf
    /// is given twice or not at all, or a state does not account for
    /// exactly the lineages sampled at its leaf.
    pub fn update_state<S, I>(&mut self, states: I) -> Result<(), MomiError>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, LeafState)>,
    {
        let mut pending: Vec<Option<LeafState>> = vec![None; self.leaves.len()];
        for (name, state) in states {
            let name = name.as_ref();
            let position = self
                .node_id(name)
                .and_then(|id| self.leaf_position(id))
                .ok_or_else(|| MomiError::InvalidStateError(format!("{name} is not a leaf")))?;
            let n = self.node(self.leaves[position]).n_lineages;
            if state.n_lineages() != n {
                return Err(MomiError::InvalidStateError(format!(
                    "state {state:?} of {name} does not match its {n} lineages"
                )));
            }
            if pending[position].replace(state).is_some() {
                return Err(MomiError::InvalidStateError(format!(
                    "{name} is given more than one state"
                )));
            }
        }
        let mut states = Vec::with_capacity(pending.len());
        for (position, state) in pending.into_iter().enumerate() {
            match state {
                Some(state) => states.push(state),
                None => {
                    return Err(MomiError::InvalidStateError(format!(
                        "no state given for leaf {}",
                        self.node(self.leaves[position]).name
                    )))
                }
            }
        }
        for (position, state) in states.into_iter().enumerate() {
            let id = self.leaves[position];
            self.nodes[id.0].state = Some(state);
        }
        Ok(())
    }

    /// Set the derived counts of every leaf, in [`Demography::leaves`] order.
    ///
    /// # Errors
    ///
    /// [`MomiError::InvalidStateError`] if the number of entries differs
    /// from the number of leaves or a count exceeds a sample size.
    pub fn update_derived(&mut self, derived: &[usize]) -> Result<(), MomiError> {
        if derived.len() != self.leaves.len() {
            return Err(MomiError::InvalidStateError(format!(
                "configuration {derived:?} has {} entries but there are {} leaves",
                derived.len(),
                self.leaves.len()
            )));
        }
        let states = self
            .leaves
            .iter()
            .zip(derived)
            .map(|(&id, &d)| {
                let node = self.node(id);
                if d > node.n_lineages {
                    Err(MomiError::InvalidStateError(format!(
                        "{d} derived alleles at {} but only {} lineages",
                        node.name, node.n_lineages
                    )))
                } else {
                    Ok(LeafState::new(node.n_lineages - d, d))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (position, state) in states.into_iter().enumerate() {
            let id = self.leaves[position];
            self.nodes[id.0].state = Some(state);
        }
        Ok(())
    }
}

impl<T: Scalar> Demography<T> {
    /// Expected total length of branches whose mutations are
    /// polymorphic in the sample: the sum of unnormalized
    /// probabilities over every non-monomorphic configuration.
    ///
    /// Computed once and kept across state updates.
    ///
    /// # Errors
    ///
    /// [`MomiError::DegenerateModelError`] if the sum is not finite
    /// and positive.
    pub fn total_sfs_sum(&self) -> Result<T, MomiError> {
        let total = self
            .total_sfs_sum
            .get_or_init(|| crate::sum_product::total_sfs_sum(self))
            .clone();
        if !(total.is_finite() && total.value() > 0.0) {
            log::warn!("degenerate total SFS sum: {}", total.value());
            return Err(MomiError::DegenerateModelError(format!(
                "total SFS sum is {}",
                total.value()
            )));
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantTruncatedSizeHistory, DemographyBuilder};

    fn three_leaves() -> Demography<f64> {
        let mut b = DemographyBuilder::from_edges(
            &[("abc", "ab"), ("abc", "c"), ("ab", "a"), ("ab", "b")],
            &[("a", 2), ("b", 1), ("c", 3)],
        )
        .unwrap();
        for (name, tau) in [
            ("a", 0.1),
            ("b", 0.2),
            ("c", 0.3),
            ("ab", 0.4),
            ("abc", f64::INFINITY),
        ] {
            let n = b.n_lineages(name).unwrap();
            b.set_history(name, ConstantTruncatedSizeHistory::new(1.0, tau, n).unwrap())
                .unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn test_structure() {
        let demo = three_leaves();
        assert_eq!(demo.leaf_names(), vec!["a", "b", "c"]);
        assert_eq!(demo.n_lineages(), 6);
        assert_eq!(demo.n_lineages_subtended_by("ab").unwrap(), 3);
        assert_eq!(demo.node(demo.root()).name(), "abc");
        let order = demo
            .postorder()
            .iter()
            .map(|&id| demo.node(id).name())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "b", "ab", "c", "abc"]);
        let ab = demo.node_by_name("ab").unwrap();
        assert_eq!(ab.parent(), demo.node_id("abc"));
    }

    #[test]
    fn test_update_state() {
        let mut demo = three_leaves();
        assert!(demo.derived_counts().is_none());
        demo.update_state([
            ("a", LeafState::new(1, 1)),
            ("c", LeafState::new(3, 0)),
            ("b", LeafState::new(0, 1)),
        ])
        .unwrap();
        assert_eq!(demo.derived_counts().unwrap(), vec![1, 1, 0]);
        demo.update_derived(&[2, 0, 1]).unwrap();
        assert_eq!(
            demo.node_by_name("c").unwrap().state(),
            Some(LeafState::new(2, 1))
        );
    }

    #[test]
    fn test_bad_states_do_not_write() {
        let mut demo = three_leaves();
        demo.update_derived(&[1, 0, 0]).unwrap();
        for states in [
            vec![("a", LeafState::new(1, 1)), ("b", LeafState::new(0, 1))],
            vec![
                ("a", LeafState::new(1, 1)),
                ("b", LeafState::new(0, 1)),
                ("c", LeafState::new(0, 4)),
            ],
            vec![
                ("a", LeafState::new(1, 1)),
                ("ab", LeafState::new(0, 1)),
                ("c", LeafState::new(3, 0)),
            ],
            vec![
                ("a", LeafState::new(1, 1)),
                ("a", LeafState::new(1, 1)),
                ("b", LeafState::new(0, 1)),
                ("c", LeafState::new(3, 0)),
            ],
        ] {
            assert!(matches!(
                demo.update_state(states),
                Err(MomiError::InvalidStateError(_))
            ));
        }
        assert!(matches!(
            demo.update_derived(&[0, 2, 0]),
            Err(MomiError::InvalidStateError(_))
        ));
        assert!(matches!(
            demo.update_derived(&[0, 1]),
            Err(MomiError::InvalidStateError(_))
        ));
        assert_eq!(demo.derived_counts().unwrap(), vec![1, 0, 0]);
    }

    #[test]
    fn test_total_sfs_sum_survives_updates() {
        let mut demo = three_leaves();
        let before = demo.total_sfs_sum().unwrap();
        demo.update_derived(&[1, 1, 1]).unwrap();
        assert_eq!(before, demo.total_sfs_sum().unwrap());
    }
}
