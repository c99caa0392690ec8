//! A multi-colour de Bruijn graph.
//!
//! Nodes are canonical k-mers stored in a [`KmerTable`], which assigns each k-mer a dense integer handle.
//! Each colour (sample) has its own coverage for every node.
//! Edges are stored according to a [`ColourLayout`] chosen when the graph is created:
//!
//! * [`ColourLayout::PerColour`]: one [`Edges`] byte per node and colour.
//! * [`ColourLayout::MergedWithPresence`]: one shared [`Edges`] byte per node and a bit per node and colour telling whether the node belongs to the colour.
//! * [`ColourLayout::MergedWithCoverage`]: one shared [`Edges`] byte per node; a node belongs to a colour if it has nonzero coverage in it.
//!
//! With merged edges, the edges of a node in a specific colour are the merged edges leading to nodes that belong to the colour.
//! See [`DeBruijnGraph::edges_in_colour`].
//!
//! The graph also owns a [`PathStore`] with the paths recorded for its nodes.

use crate::edges::{self, Covg, Edges};
use crate::kmer::{self, BinaryKmer, Nucleotide, MAX_KMER_SIZE};
use crate::nodes::DbNode;
use crate::path_store::PathStore;

use gbz::Orientation;

use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};


//-----------------------------------------------------------------------------

/// A stable identifier for a canonical k-mer.
pub type NodeHandle = usize;

/// A hash table mapping canonical k-mers to node handles.
///
/// Handles are assigned densely in insertion order, starting from 0.
/// They remain valid for the lifetime of the table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KmerTable {
    map: HashMap<BinaryKmer, NodeHandle>,
    kmers: Vec<BinaryKmer>,
}

impl KmerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        KmerTable::default()
    }

    /// Returns the number of k-mers in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    /// Returns `true` if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    /// Returns the handle of the key, or [`None`] if the key is not in the table.
    #[inline]
    pub fn find(&self, key: &BinaryKmer) -> Option<NodeHandle> {
        self.map.get(key).copied()
    }

    /// Returns the handle of the key, inserting it if necessary.
    ///
    /// The second return value is `true` if the key was already present.
    pub fn find_or_insert(&mut self, key: BinaryKmer) -> (NodeHandle, bool) {
        if let Some(handle) = self.map.get(&key) {
            return (*handle, true);
        }
        let handle = self.kmers.len();
        self.map.insert(key, handle);
        self.kmers.push(key);
        (handle, false)
    }

    /// Returns the key with the given handle.
    ///
    /// # Panics
    ///
    /// Will panic if the handle is invalid.
    #[inline]
    pub fn kmer(&self, handle: NodeHandle) -> BinaryKmer {
        self.kmers[handle]
    }

    /// Returns an iterator over the keys in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &BinaryKmer> {
        self.kmers.iter()
    }
}

//-----------------------------------------------------------------------------

/// How edges are stored for the colours of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColourLayout {
    /// Each colour has its own edges.
    PerColour,
    /// All colours share the same edges, and colour membership is stored explicitly.
    MergedWithPresence,
    /// All colours share the same edges, and colour membership is inferred from coverage.
    MergedWithCoverage,
}

impl ColourLayout {
    /// Returns a short name for the layout.
    pub fn name(&self) -> &'static str {
        match self {
            ColourLayout::PerColour => "per-colour",
            ColourLayout::MergedWithPresence => "merged-presence",
            ColourLayout::MergedWithCoverage => "merged-coverage",
        }
    }

    /// Parses a layout from its name.
    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "per-colour" => Ok(ColourLayout::PerColour),
            "merged-presence" => Ok(ColourLayout::MergedWithPresence),
            "merged-coverage" => Ok(ColourLayout::MergedWithCoverage),
            _ => Err(format!("Unknown colour layout: {}", name)),
        }
    }
}

impl Display for ColourLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// Edge storage for each layout, carrying exactly the arrays the layout needs.
#[derive(Clone, Debug)]
enum ColourData {
    PerColour { edges: Vec<Edges> },
    MergedWithPresence { edges: Vec<Edges>, in_colour: RawVector },
    MergedWithCoverage { edges: Vec<Edges> },
}

/// A next node reached from a node by following an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextNode {
    /// The next node.
    pub node: DbNode,
    /// The base appended to the oriented k-mer to reach the next node.
    pub nuc: Nucleotide,
}

//-----------------------------------------------------------------------------

/// A multi-colour de Bruijn graph.
///
/// # Examples
///
/// ```
/// use ctx_graph::{DeBruijnGraph, ColourLayout};
/// use ctx_graph::kmer::BinaryKmer;
/// use gbz::Orientation;
///
/// let mut graph = DeBruijnGraph::new(3, 1, ColourLayout::PerColour).unwrap();
/// let (from, _) = graph.add_kmer(&BinaryKmer::from_bases(b"ACG", 3));
/// let (to, _) = graph.add_kmer(&BinaryKmer::from_bases(b"CGT", 3));
/// graph.add_edge(0, from, to);
///
/// // ACG -> CGT in forward orientation.
/// assert_eq!(from.orient, Orientation::Forward);
/// let next = graph.next_nodes(from, graph.edges_in_colour(from, 0));
/// assert_eq!(next.len(), 1);
/// assert_eq!(next[0].node, to);
/// ```
#[derive(Debug)]
pub struct DeBruijnGraph {
    kmer_size: usize,
    num_of_cols: usize,
    table: KmerTable,
    colours: ColourData,
    // Coverage for node `handle` in colour `col` is at `handle * num_of_cols + col`.
    covgs: Vec<AtomicU32>,
    paths: PathStore,
}

/// Construction and basic properties.
impl DeBruijnGraph {
    /// Creates an empty graph.
    ///
    /// Returns an error if the k-mer size or the number of colours is invalid.
    pub fn new(kmer_size: usize, num_of_cols: usize, layout: ColourLayout) -> Result<Self, String> {
        if kmer_size == 0 || kmer_size > MAX_KMER_SIZE {
            return Err(format!("Invalid k-mer size {} (must be in 1..={})", kmer_size, MAX_KMER_SIZE));
        }
        if num_of_cols == 0 {
            return Err(String::from("The graph must have at least one colour"));
        }
        let colours = match layout {
            ColourLayout::PerColour => ColourData::PerColour { edges: Vec::new() },
            ColourLayout::MergedWithPresence => ColourData::MergedWithPresence { edges: Vec::new(), in_colour: RawVector::new() },
            ColourLayout::MergedWithCoverage => ColourData::MergedWithCoverage { edges: Vec::new() },
        };
        Ok(DeBruijnGraph {
            kmer_size,
            num_of_cols,
            table: KmerTable::new(),
            colours,
            covgs: Vec::new(),
            paths: PathStore::new(num_of_cols),
        })
    }

    /// Returns the k-mer size.
    #[inline]
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Returns the number of colours.
    #[inline]
    pub fn num_of_cols(&self) -> usize {
        self.num_of_cols
    }

    /// Returns the number of edge tracks per node: the number of colours or 1 with merged edges.
    #[inline]
    pub fn num_edge_cols(&self) -> usize {
        match self.colours {
            ColourData::PerColour { .. } => self.num_of_cols,
            _ => 1,
        }
    }

    /// Returns the colour layout.
    pub fn layout(&self) -> ColourLayout {
        match self.colours {
            ColourData::PerColour { .. } => ColourLayout::PerColour,
            ColourData::MergedWithPresence { .. } => ColourLayout::MergedWithPresence,
            ColourData::MergedWithCoverage { .. } => ColourLayout::MergedWithCoverage,
        }
    }

    /// Returns the number of nodes.
    #[inline]
    pub fn nodes(&self) -> usize {
        self.table.len()
    }

    /// Returns the k-mer table.
    #[inline]
    pub fn table(&self) -> &KmerTable {
        &self.table
    }

    /// Returns the path store.
    #[inline]
    pub fn paths(&self) -> &PathStore {
        &self.paths
    }

    /// Returns a mutable reference to the path store.
    #[inline]
    pub fn paths_mut(&mut self) -> &mut PathStore {
        &mut self.paths
    }

    /// Replaces the path store.
    ///
    /// Returns an error if the store was built for a different number of colours.
    pub fn set_paths(&mut self, paths: PathStore) -> Result<(), String> {
        if paths.num_of_cols() != self.num_of_cols {
            return Err(format!("Path store has {} colours, the graph has {}", paths.num_of_cols(), self.num_of_cols));
        }
        self.paths = paths;
        Ok(())
    }

    // Panics with a useful message if the colour is out of range.
    #[inline]
    fn check_colour(&self, colour: usize) {
        assert!(colour < self.num_of_cols, "Colour {} is out of range (the graph has {} colours)", colour, self.num_of_cols);
    }

    // Index of the edge byte for the node and colour.
    #[inline]
    fn edge_index(&self, handle: NodeHandle, colour: usize) -> usize {
        match self.colours {
            ColourData::PerColour { .. } => handle * self.num_of_cols + colour,
            _ => handle,
        }
    }

    /// Adds the canonical key of the k-mer to the graph.
    ///
    /// Returns the node corresponding to the k-mer and `true` if the key was already present.
    /// A new node has no edges, no coverage, and belongs to no colours.
    pub fn add_kmer(&mut self, bkmer: &BinaryKmer) -> (DbNode, bool) {
        let key = bkmer.get_key(self.kmer_size);
        let orient = BinaryKmer::orientation(bkmer, &key);
        let (handle, found) = self.table.find_or_insert(key);
        if !found {
            let num_of_cols = self.num_of_cols;
            match &mut self.colours {
                ColourData::PerColour { edges } => edges.resize(edges.len() + num_of_cols, 0),
                ColourData::MergedWithPresence { edges, in_colour } => {
                    edges.push(0);
                    for _ in 0..num_of_cols {
                        in_colour.push_bit(false);
                    }
                },
                ColourData::MergedWithCoverage { edges } => edges.push(0),
            }
            self.covgs.extend((0..num_of_cols).map(|_| AtomicU32::new(0)));
        }
        (DbNode::new(handle, orient), found)
    }

    /// Returns the node corresponding to the k-mer, or [`None`] if the canonical key is not in the graph.
    pub fn find_node(&self, bkmer: &BinaryKmer) -> Option<DbNode> {
        let key = bkmer.get_key(self.kmer_size);
        let handle = self.table.find(&key)?;
        Some(DbNode::new(handle, BinaryKmer::orientation(bkmer, &key)))
    }

    /// Returns the canonical k-mer stored for the handle.
    #[inline]
    pub fn bkmer(&self, handle: NodeHandle) -> BinaryKmer {
        self.table.kmer(handle)
    }

    /// Returns the k-mer of the node in its orientation.
    #[inline]
    pub fn oriented_bkmer(&self, node: DbNode) -> BinaryKmer {
        self.bkmer(node.key).oriented(self.kmer_size, node.orient)
    }

    /// Returns the last base of the oriented k-mer of the node.
    #[inline]
    pub fn node_last_nuc(&self, node: DbNode) -> Nucleotide {
        let bkmer = self.bkmer(node.key);
        match node.orient {
            Orientation::Forward => bkmer.last_nuc(),
            Orientation::Reverse => kmer::complement(bkmer.first_nuc(self.kmer_size)),
        }
    }
}

//-----------------------------------------------------------------------------

/// Edges.
impl DeBruijnGraph {
    fn edge_array(&self) -> &[Edges] {
        match &self.colours {
            ColourData::PerColour { edges } => edges,
            ColourData::MergedWithPresence { edges, .. } => edges,
            ColourData::MergedWithCoverage { edges } => edges,
        }
    }

    fn edge_array_mut(&mut self) -> &mut Vec<Edges> {
        match &mut self.colours {
            ColourData::PerColour { edges } => edges,
            ColourData::MergedWithPresence { edges, .. } => edges,
            ColourData::MergedWithCoverage { edges } => edges,
        }
    }

    /// Returns the stored edge byte for the node in the given colour.
    ///
    /// With merged edges, the colour is ignored and the shared edges are returned.
    #[inline]
    pub fn edges(&self, handle: NodeHandle, colour: usize) -> Edges {
        self.check_colour(colour);
        self.edge_array()[self.edge_index(handle, colour)]
    }

    /// Replaces the stored edge byte for the node in the given colour.
    ///
    /// With merged edges, this replaces the shared edges.
    pub fn set_edges(&mut self, handle: NodeHandle, colour: usize, value: Edges) {
        self.check_colour(colour);
        let index = self.edge_index(handle, colour);
        self.edge_array_mut()[index] = value;
    }

    /// Returns the union of the edges of the node over all colours.
    pub fn edges_union(&self, handle: NodeHandle) -> Edges {
        let tracks = self.num_edge_cols();
        edges::union(&self.edge_array()[handle * tracks..(handle + 1) * tracks])
    }

    /// Adds an edge from node `from` to node `to` in the given colour.
    ///
    /// The edge is stored in both nodes: as an outgoing edge of `from` and as an outgoing edge of the reverse of `to`.
    /// The nodes are assumed to be adjacent.
    pub fn add_edge(&mut self, colour: usize, from: DbNode, to: DbNode) {
        let nuc = self.node_last_nuc(to);
        let rev_nuc = kmer::complement(self.oriented_bkmer(from).first_nuc(self.kmer_size));
        let value = edges::set_edge(self.edges(from.key, colour), nuc, from.orient);
        self.set_edges(from.key, colour, value);
        let value = edges::set_edge(self.edges(to.key, colour), rev_nuc, kmer::flip(to.orient));
        self.set_edges(to.key, colour, value);
    }

    /// Removes the edge from node `from` to node `to` in the given colour.
    ///
    /// This is the inverse of [`DeBruijnGraph::add_edge`].
    pub fn del_edge(&mut self, colour: usize, from: DbNode, to: DbNode) {
        let nuc = self.node_last_nuc(to);
        let rev_nuc = kmer::complement(self.oriented_bkmer(from).first_nuc(self.kmer_size));
        let value = edges::del_edge(self.edges(from.key, colour), nuc, from.orient);
        self.set_edges(from.key, colour, value);
        let value = edges::del_edge(self.edges(to.key, colour), rev_nuc, kmer::flip(to.orient));
        self.set_edges(to.key, colour, value);
    }

    /// Returns the nodes reached from `node` by following the given edges in the orientation of the node.
    ///
    /// Edges leading to k-mers missing from the table are ignored.
    /// The next nodes are listed in the order of the appended base.
    pub fn next_nodes(&self, node: DbNode, edges: Edges) -> Vec<NextNode> {
        let bkmer = self.oriented_bkmer(node);
        let edges = edges::with_orientation(edges, node.orient);
        let mut result = Vec::with_capacity(edges.count_ones() as usize);
        for nuc in 0..4 {
            if edges & (1 << nuc) == 0 {
                continue;
            }
            if let Some(next) = self.find_node(&bkmer.left_shift_add(self.kmer_size, nuc)) {
                result.push(NextNode { node: next, nuc });
            }
        }
        result
    }

    /// Returns the edges of the node in the given colour, restricted to the orientation of the node.
    ///
    /// With per-colour edges, this is the stored edge byte masked to the orientation.
    /// With merged edges, the edges are recomputed from the merged edges by keeping only the next nodes that belong to the colour.
    pub fn edges_in_colour(&self, node: DbNode, colour: usize) -> Edges {
        self.check_colour(colour);
        match &self.colours {
            ColourData::PerColour { edges } => {
                edges::mask_orientation(edges[node.key * self.num_of_cols + colour], node.orient)
            },
            ColourData::MergedWithPresence { edges, .. } | ColourData::MergedWithCoverage { edges } => {
                let mut result: Edges = 0;
                for next in self.next_nodes(node, edges[node.key]) {
                    if self.has_colour(next.node.key, colour) {
                        result = edges::set_edge(result, next.nuc, node.orient);
                    }
                }
                result
            },
        }
    }
}

//-----------------------------------------------------------------------------

/// Colour membership.
impl DeBruijnGraph {
    /// Returns `true` if the node belongs to the colour.
    ///
    /// With explicit presence information, this is the stored bit.
    /// Otherwise a node belongs to a colour if it has nonzero coverage in it.
    pub fn has_colour(&self, handle: NodeHandle, colour: usize) -> bool {
        self.check_colour(colour);
        match &self.colours {
            ColourData::MergedWithPresence { in_colour, .. } => in_colour.bit(handle * self.num_of_cols + colour),
            _ => self.coverage(handle, colour) > 0,
        }
    }

    /// Marks the node as belonging to the colour.
    ///
    /// This only has an effect with explicit presence information.
    pub fn set_colour(&mut self, handle: NodeHandle, colour: usize) {
        self.check_colour(colour);
        let num_of_cols = self.num_of_cols;
        if let ColourData::MergedWithPresence { in_colour, .. } = &mut self.colours {
            in_colour.set_bit(handle * num_of_cols + colour, true);
        }
    }

    /// Removes the node from the colour.
    ///
    /// This only has an effect with explicit presence information.
    pub fn clear_colour(&mut self, handle: NodeHandle, colour: usize) {
        self.check_colour(colour);
        let num_of_cols = self.num_of_cols;
        if let ColourData::MergedWithPresence { in_colour, .. } = &mut self.colours {
            in_colour.set_bit(handle * num_of_cols + colour, false);
        }
    }
}

//-----------------------------------------------------------------------------

/// Coverage.
impl DeBruijnGraph {
    #[inline]
    fn covg_cell(&self, handle: NodeHandle, colour: usize) -> &AtomicU32 {
        self.check_colour(colour);
        &self.covgs[handle * self.num_of_cols + colour]
    }

    /// Returns the coverage of the node in the colour.
    #[inline]
    pub fn coverage(&self, handle: NodeHandle, colour: usize) -> Covg {
        self.covg_cell(handle, colour).load(Ordering::Relaxed)
    }

    /// Adds `delta` to the coverage of the node in the colour, saturating at [`edges::COVG_MAX`].
    pub fn add_coverage(&mut self, handle: NodeHandle, colour: usize, delta: Covg) {
        self.check_colour(colour);
        let cell = self.covgs[handle * self.num_of_cols + colour].get_mut();
        *cell = edges::safe_add_covg(*cell, delta);
    }

    /// Increments the coverage of the node in the colour, saturating at [`edges::COVG_MAX`].
    pub fn increment_coverage(&mut self, handle: NodeHandle, colour: usize) {
        self.add_coverage(handle, colour, 1);
    }

    /// Increments the coverage of the node in the colour, saturating at [`edges::COVG_MAX`].
    ///
    /// Concurrent calls from multiple threads never lose increments.
    /// Returns the new value.
    pub fn increment_coverage_mt(&self, handle: NodeHandle, colour: usize) -> Covg {
        edges::increment_atomic(self.covg_cell(handle, colour))
    }

    /// Returns the total coverage of the node over all colours, saturating at [`edges::COVG_MAX`].
    pub fn sum_coverage(&self, handle: NodeHandle) -> Covg {
        let start = handle * self.num_of_cols;
        self.covgs[start..start + self.num_of_cols].iter().fold(0, |acc, cell| {
            edges::safe_add_covg(acc, cell.load(Ordering::Relaxed))
        })
    }
}

//-----------------------------------------------------------------------------
