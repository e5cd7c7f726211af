//! # Demographies from demes models.
//!
//! Converts a [`demes::Graph`] whose demes form a tree, with
//! constant sizes and no gene flow, into a [`momi::Demography`].
//!
//! ## Re-exports
//!
//! This crate re-exports `demes` and `momi`.
//!
//! ```{rust}
//! use momi_demes::{demes, momi};
//!
//! let yaml = "
//! time_units: generations
//! demes:
//!  - name: ancestor
//!    epochs:
//!     - start_size: 100
//!       end_time: 50
//!  - name: left
//!    ancestors: [ancestor]
//!    epochs:
//!     - start_size: 50
//!  - name: right
//!    ancestors: [ancestor]
//!    epochs:
//!     - start_size: 200
//! ";
//! let graph = demes::loads(yaml).unwrap();
//! let demo = momi_demes::demography_from_graph::<f64, _>(&graph, &[("left", 4), ("right", 2)])
//!     .unwrap();
//! assert_eq!(demo.leaf_names(), vec!["left", "right"]);
//! assert_eq!(demo.n_lineages(), 6);
//! let mut demo = demo;
//! demo.update_derived(&[1, 0]).unwrap();
//! let p = momi::SumProduct::new(&demo).p(true).unwrap();
//! assert!(p > 0.0 && p < 1.0);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod error;
mod graph;

pub use demes;
pub use error::MomiDemesError;
pub use graph::{demography_from_graph, demography_from_yaml};
pub use momi;
