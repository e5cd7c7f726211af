use glob::glob;
use momi_demes::demes;
use momi_demes::momi;
use momi_demes::MomiDemesError;

// Two lineages from every deme alive at time zero.
fn contemporary_samples(graph: &demes::Graph) -> Vec<(String, usize)> {
    graph
        .demes()
        .iter()
        .filter(|d| f64::from(d.end_time()) == 0.0)
        .map(|d| (d.name().to_string(), 2))
        .collect()
}

fn load(path: &std::path::Path) -> demes::Graph {
    let yaml = std::fs::read_to_string(path).unwrap();
    demes::loads(&yaml).unwrap()
}

fn two_way_split() -> demes::Graph {
    load(std::path::Path::new("tests/data/valid/two_way_split.yaml"))
}

#[test]
fn convert_valid_graphs() {
    let mut count = 0;
    for path in glob("tests/data/valid/*.yaml").unwrap() {
        let path = path.unwrap();
        let graph = load(&path);
        let samples = contemporary_samples(&graph);
        let demo = momi_demes::demography_from_graph::<f64, _>(&graph, &samples)
            .unwrap_or_else(|e| panic!("{path:?}: {e}"));
        let total: f64 = momi::expected_sfs(&demo, true).unwrap().values().sum();
        assert!((total - 1.0).abs() < 1e-8, "{path:?}");
        count += 1;
    }
    assert!(count > 0);
}

#[test]
fn reject_unsupported_graphs() {
    let mut count = 0;
    for path in glob("tests/data/unsupported/*.yaml").unwrap() {
        let path = path.unwrap();
        let graph = load(&path);
        let samples = contemporary_samples(&graph);
        let result = momi_demes::demography_from_graph::<f64, _>(&graph, &samples);
        assert!(
            matches!(result, Err(MomiDemesError::UnsupportedModel(_))),
            "{path:?}"
        );
        count += 1;
    }
    assert!(count > 0);
}

#[test]
fn split_structure() {
    let graph = two_way_split();
    let demo =
        momi_demes::demography_from_graph::<f64, _>(&graph, &[("right", 3), ("left", 1)]).unwrap();
    assert_eq!(demo.leaf_names(), vec!["right", "left"]);
    let ancestor = demo.node_by_name("ancestor").unwrap();
    assert_eq!(ancestor.n_lineages(), 4);
    assert!(ancestor.history().is_infinite());
    let left = demo.node_by_name("left").unwrap();
    assert_eq!(*left.history().tau(), 500.0);
    assert_eq!(left.history().size_at(0.0), 400.0);
    assert_eq!(left.parent(), demo.node_id("ancestor"));
}

#[test]
fn persisting_deme_is_cut_where_a_branch_joins() -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string("tests/data/valid/branching.yaml")?;
    let demo = momi_demes::demography_from_yaml::<f64, _>(&yaml, &[("main", 2), ("branch", 2)])?;
    // 5000 years are 200 generations.
    let older = demo.node_by_name("main@200").unwrap();
    assert_eq!(older.children().len(), 2);
    assert!(older.history().is_infinite());
    assert_eq!(older.history().pieces().len(), 2);
    let main = demo.node_by_name("main").unwrap();
    assert_eq!(*main.history().tau(), 200.0);
    assert_eq!(main.history().size_at(0.0), 2000.0);
    Ok(())
}

#[test]
fn unsampled_demes_are_pruned() {
    let yaml = std::fs::read_to_string("tests/data/valid/extinct_branch.yaml").unwrap();
    let demo =
        momi_demes::demography_from_yaml::<f64, _>(&yaml, &[("A", 2), ("B", 3)]).unwrap();
    assert!(demo.node_by_name("ghost").is_none());
    assert_eq!(demo.num_nodes(), 3);

    let only_a = momi_demes::demography_from_yaml::<f64, _>(&yaml, &[("A", 2)]).unwrap();
    assert_eq!(only_a.num_nodes(), 1);
}

#[test]
fn piecewise_sizes() {
    let yaml = std::fs::read_to_string("tests/data/valid/size_changes.yaml").unwrap();
    let demo = momi_demes::demography_from_yaml::<f64, _>(&yaml, &[("A", 4)]).unwrap();
    let history = demo.node_by_name("A").unwrap().history();
    let sizes = history
        .pieces()
        .iter()
        .map(|p| *p.size())
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![20000.0, 1000.0, 10000.0]);
    assert_eq!(history.size_at(1000.0), 1000.0);
}

#[test]
fn bad_samples() {
    let graph = two_way_split();
    for samples in [
        vec![("nowhere", 2)],
        vec![("left", 0)],
        vec![("left", 2), ("left", 1)],
    ] {
        let result = momi_demes::demography_from_graph::<f64, _>(&graph, &samples);
        assert!(matches!(result, Err(MomiDemesError::SampleError(_))));
    }
    let result = momi_demes::demography_from_graph::<f64, &str>(&graph, &[]);
    assert!(matches!(result, Err(MomiDemesError::SampleError(_))));
    let result = momi_demes::demography_from_graph::<f64, _>(&graph, &[("ancestor", 2)]);
    assert!(matches!(result, Err(MomiDemesError::UnsupportedModel(_))));
}

#[test]
fn errors_from_demes_and_momi() {
    assert!(matches!(
        momi_demes::demography_from_yaml::<f64, _>("demes: []", &[("a", 1)]),
        Err(MomiDemesError::DemesError(_))
    ));
    let e = MomiDemesError::from(momi::MomiError::ConfigurationError("x".to_string()));
    assert!(matches!(e, MomiDemesError::MomiError(_)));
}
