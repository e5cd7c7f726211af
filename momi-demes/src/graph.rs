use std::collections::HashMap;

use momi::{
    ConstantTruncatedSizeHistory, Demography, DemographyBuilder, PiecewiseHistory, Scalar,
    SizeHistory,
};

use crate::MomiDemesError;

struct Converter<'g, T> {
    graph: &'g demes::Graph,
    builder: DemographyBuilder<T>,
    // Sampled children of each retained deme.
    children: Vec<Vec<usize>>,
    sampled: HashMap<usize, usize>,
}

fn time(t: demes::Time) -> f64 {
    f64::from(t)
}

fn check_deme(deme: &demes::Deme) -> Result<(), MomiDemesError> {
    if deme.ancestor_indexes().len() > 1 {
        return Err(MomiDemesError::UnsupportedModel(format!(
            "deme {} has more than one ancestor",
            deme.name()
        )));
    }
    for epoch in deme.epochs() {
        let constant = matches!(epoch.size_function(), demes::SizeFunction::Constant)
            && f64::from(epoch.start_size()) == f64::from(epoch.end_size());
        if !constant {
            return Err(MomiDemesError::UnsupportedModel(format!(
                "deme {} changes size within an epoch",
                deme.name()
            )));
        }
    }
    Ok(())
}

impl<'g, T: Scalar> Converter<'g, T> {
    // Constant pieces of `deme` between `bottom` and `top`, most recent first.
    // Sizes are doubled so that a pair of lineages coalesces at rate 1/size.
    fn history(
        &self,
        deme: usize,
        bottom: f64,
        top: f64,
        n_max: usize,
    ) -> Result<SizeHistory<T>, MomiDemesError> {
        let mut pieces = vec![];
        for epoch in self.graph.demes()[deme].epochs().iter().rev() {
            let lo = bottom.max(time(epoch.end_time()));
            let hi = top.min(time(epoch.start_time()));
            if hi > lo {
                let size = 2.0 * f64::from(epoch.start_size());
                pieces.push(ConstantTruncatedSizeHistory::new(
                    T::constant(size),
                    T::constant(hi - lo),
                    n_max,
                )?);
            }
        }
        if pieces.len() == 1 {
            if let Some(piece) = pieces.pop() {
                return Ok(piece.into());
            }
        }
        Ok(PiecewiseHistory::new(pieces)?.into())
    }

    // Adds the nodes of `deme` and of its sampled descendants.
    // Returns the name of the node holding its lineages when it starts.
    fn visit(&mut self, deme: usize) -> Result<String, MomiDemesError> {
        let graph = self.graph;
        let d = &graph.demes()[deme];
        let name = d.name().to_string();

        let mut current: Option<(String, f64)> = self
            .sampled
            .get(&deme)
            .map(|_| (name.clone(), time(d.end_time())));

        let mut events = self.children[deme]
            .iter()
            .map(|&c| time(graph.demes()[c].start_time()))
            .collect::<Vec<_>>();
        events.sort_by(|a, b| a.total_cmp(b));
        events.dedup();

        for event in events {
            let joining = self.children[deme]
                .iter()
                .copied()
                .filter(|&c| time(graph.demes()[c].start_time()) == event)
                .collect::<Vec<_>>();
            let mut below = vec![];
            if let Some((node, bottom)) = current.take() {
                self.close(deme, &node, bottom, event)?;
                below.push(node);
            }
            for child in joining {
                below.push(self.visit(child)?);
            }
            let node = if self.builder_has(&name) {
                format!("{name}@{event}")
            } else {
                name.clone()
            };
            self.builder.add_ancestor(&node, &below)?;
            current = Some((node, event));
        }

        match current {
            Some((node, bottom)) => {
                self.close(deme, &node, bottom, time(d.start_time()))?;
                Ok(node)
            }
            None => Err(MomiDemesError::UnsupportedModel(format!(
                "deme {name} has no sampled lineages"
            ))),
        }
    }

    fn builder_has(&self, name: &str) -> bool {
        self.builder.n_lineages(name).is_ok()
    }

    fn close(&mut self, deme: usize, node: &str, bottom: f64, top: f64) -> Result<(), MomiDemesError> {
        let n = self.builder.n_lineages(node)?;
        let history = self.history(deme, bottom, top, n)?;
        self.builder.set_history(node, history)?;
        Ok(())
    }
}

/// Build a [`Demography`] from a demes graph and per-deme sample sizes.
///
/// Times are converted to generations. Each deme of size `N` becomes
/// a sequence of nodes of size `2N`, so that two lineages coalesce
/// with probability `1 / 2N` per generation. A deme is cut where
/// its sampled children join it: the most recent part keeps the
/// deme name and older parts are named `name@time`. Demes without
/// sampled descendants are ignored.
///
/// Leaves appear in the order of `samples`.
///
/// # Errors
///
/// * [`MomiDemesError::UnsupportedModel`] if the graph has migrations
///   or pulses, if a retained deme has several ancestors or a size that
///   is not constant within an epoch, if a sampled deme does not reach
///   time zero, or if the sampled demes do not share a single root.
/// * [`MomiDemesError::SampleError`] for unknown demes, repeated demes
///   or empty samples.
pub fn demography_from_graph<T: Scalar, S: AsRef<str>>(
    graph: &demes::Graph,
    samples: &[(S, usize)],
) -> Result<Demography<T>, MomiDemesError> {
    let graph = graph.clone().into_generations()?;
    if !graph.migrations().is_empty() {
        return Err(MomiDemesError::UnsupportedModel(
            "migrations are not supported".to_string(),
        ));
    }
    if !graph.pulses().is_empty() {
        return Err(MomiDemesError::UnsupportedModel(
            "pulses are not supported".to_string(),
        ));
    }

    let index = graph
        .demes()
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name().to_string(), i))
        .collect::<HashMap<_, _>>();

    let mut builder = DemographyBuilder::new();
    let mut sampled = HashMap::default();
    for (name, n) in samples {
        let name = name.as_ref();
        let i = *index
            .get(name)
            .ok_or_else(|| MomiDemesError::SampleError(format!("unknown deme: {name}")))?;
        if *n == 0 {
            return Err(MomiDemesError::SampleError(format!(
                "empty sample from deme {name}"
            )));
        }
        if sampled.insert(i, *n).is_some() {
            return Err(MomiDemesError::SampleError(format!(
                "deme {name} is sampled more than once"
            )));
        }
        if time(graph.demes()[i].end_time()) != 0.0 {
            return Err(MomiDemesError::UnsupportedModel(format!(
                "deme {name} does not exist at time zero"
            )));
        }
        builder.add_leaf(name, *n)?;
    }
    if sampled.is_empty() {
        return Err(MomiDemesError::SampleError("no samples".to_string()));
    }

    // Mark every ancestor of a sampled deme, and record the tree.
    let mut retained = vec![false; graph.num_demes()];
    let mut children = vec![vec![]; graph.num_demes()];
    for &i in sampled.keys() {
        let mut current = i;
        retained[current] = true;
        loop {
            let deme = &graph.demes()[current];
            check_deme(deme)?;
            match deme.ancestor_indexes().first() {
                Some(&parent) => {
                    if !children[parent].contains(&current) {
                        children[parent].push(current);
                    }
                    if retained[parent] {
                        break;
                    }
                    retained[parent] = true;
                    current = parent;
                }
                None => break,
            }
        }
    }
    for c in children.iter_mut() {
        c.sort_unstable();
    }
    let roots = (0..graph.num_demes())
        .filter(|&i| retained[i] && graph.demes()[i].ancestor_indexes().is_empty())
        .collect::<Vec<_>>();
    if roots.len() != 1 {
        return Err(MomiDemesError::UnsupportedModel(format!(
            "sampled demes must descend from a single root, found {}",
            roots.len()
        )));
    }

    let mut converter = Converter {
        graph: &graph,
        builder,
        children,
        sampled,
    };
    converter.visit(roots[0])?;
    let demography = converter.builder.build()?;
    log::debug!(
        "converted {} demes into {} nodes",
        graph.num_demes(),
        demography.num_nodes()
    );
    Ok(demography)
}

/// [`demography_from_graph`] for a graph given as YAML.
pub fn demography_from_yaml<T: Scalar, S: AsRef<str>>(
    yaml: &str,
    samples: &[(S, usize)],
) -> Result<Demography<T>, MomiDemesError> {
    let graph = demes::loads(yaml)?;
    demography_from_graph(&graph, samples)
}
