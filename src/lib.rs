//! # ctx-graph: a multi-colour de Bruijn graph
//!
//! This crate stores a de Bruijn graph built from DNA sequencing reads of multiple samples ("colours").
//! Nodes are canonical k-mers, and the topology is implicit in overlapping k-mers together with a per-node edge byte.
//! Each colour contributes its own coverage and edge presence over the shared node set.
//!
//! ### Basic concepts
//!
//! A k-mer is stored as a [`kmer::BinaryKmer`] using two bits per base.
//! The node for a k-mer is keyed by the canonical form: the smaller of the k-mer and its reverse complement.
//! Nodes are accessed by [`NodeHandle`]s, which are dense and stable identifiers assigned by the [`KmerTable`].
//! A [`DbNode`] is a node handle together with an orientation.
//! The forward orientation reads the canonical k-mer, while the reverse orientation reads its reverse complement.
//!
//! Edges are stored in one byte per node and edge track.
//! The low four bits are the bases that can be appended to the forward k-mer, and the high four bits are the bases that can be appended to the reverse k-mer.
//! See [`ColourLayout`] for the ways edges and colour membership can be stored.
//!
//! ### Paths
//!
//! The [`PathStore`] is an append-only arena of packed paths.
//! A path starts from a node in a given orientation and lists the bases chosen at each fork in the graph.
//! Each node has a linked list of its paths, newest first.
//! [`DeBruijnGraph::check_all_paths`] validates every stored path against the graph topology.
//!
//! ### Reads
//!
//! Reads are split into clean contigs by base quality and homopolymer cutoffs (see [`contigs::ContigIter`]).
//! A [`DbAlignment`] maps a read or a read pair to the nodes of the graph.
//! A [`GraphBuilder`] loads reads into the graph, and a [`GraphBase`] stores the graph in a SQLite database.

pub mod alignment;
pub mod build;
pub mod contigs;
pub mod db;
pub mod edges;
pub mod graph;
pub mod kmer;
pub mod nodes;
pub mod path_check;
pub mod path_store;
pub mod reads;
pub mod utils;

pub use alignment::DbAlignment;
pub use build::{BuildParams, BuildStats, GraphBuilder};
pub use db::GraphBase;
pub use graph::{ColourLayout, DeBruijnGraph, KmerTable, NodeHandle};
pub use nodes::DbNode;
pub use path_check::PathStats;
pub use path_store::{PathRecord, PathStore};
pub use reads::Read;
