//! Oriented graph nodes and operations on node lists.
//!
//! A [`DbNode`] is a node handle together with an orientation.
//! A list of nodes is a walk in the graph if each node extends the previous one by a single base.
//! See [`check_contiguous`] for the formal definition.

use crate::graph::{DeBruijnGraph, NodeHandle};
use crate::kmer::{self, BinaryKmer};
use crate::edges;

use gbz::Orientation;

use std::io::{self, Write};


//-----------------------------------------------------------------------------

/// A node of the graph in a specific orientation.
///
/// The handle identifies the canonical k-mer.
/// In forward orientation, the node corresponds to the canonical k-mer; in reverse orientation, to its reverse complement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DbNode {
    /// Handle of the canonical k-mer.
    pub key: NodeHandle,
    /// Orientation of the node.
    pub orient: Orientation,
}

impl DbNode {
    /// Creates a new node.
    #[inline]
    pub fn new(key: NodeHandle, orient: Orientation) -> Self {
        DbNode { key, orient }
    }

    /// Returns the same node in the other orientation.
    #[inline]
    pub fn reverse(&self) -> Self {
        DbNode { key: self.key, orient: kmer::flip(self.orient) }
    }
}

//-----------------------------------------------------------------------------

/// Reverses the order of the nodes without changing their orientations.
pub fn reverse_nodes(nodes: &mut [DbNode]) {
    if nodes.len() <= 1 {
        return;
    }
    let (mut i, mut j) = (0, nodes.len() - 1);
    while i < j {
        nodes.swap(i, j);
        i += 1;
        j -= 1;
    }
}

/// Reverses the order of the nodes and flips their orientations.
///
/// This turns a walk into the same walk in the opposite direction.
pub fn reverse_complement_nodes(nodes: &mut [DbNode]) {
    reverse_nodes(nodes);
    for node in nodes.iter_mut() {
        *node = node.reverse();
    }
}

// Greatest common divisor.
fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let tmp = a % b;
        a = b;
        b = tmp;
    }
    a
}

/// Rotates the slice to the left by `shift` positions.
///
/// The rotation follows `gcd(len, shift)` cycles and uses a single temporary value.
/// Shifts larger than the length are reduced modulo the length.
///
/// # Examples
///
/// ```
/// use ctx_graph::nodes;
///
/// let mut values = vec![1, 2, 3, 4, 5, 6];
/// nodes::rotate_left(&mut values, 4);
/// assert_eq!(values, vec![5, 6, 1, 2, 3, 4]);
/// ```
pub fn rotate_left<T: Copy>(values: &mut [T], shift: usize) {
    let n = values.len();
    if n <= 1 {
        return;
    }
    let shift = shift % n;
    if shift == 0 {
        return;
    }

    // Each cycle moves values[k] to values[j] for k = j + shift (mod n) until we return to the start.
    for i in 0..gcd(n, shift) {
        let tmp = values[i];
        let mut j = i;
        loop {
            let mut k = j + shift;
            if k >= n {
                k -= n;
            }
            if k == i {
                break;
            }
            values[j] = values[k];
            j = k;
        }
        values[j] = tmp;
    }
}

//-----------------------------------------------------------------------------

/// Returns the sequence spelled by the walk.
///
/// The sequence is the oriented k-mer of the first node followed by the last base of each subsequent node.
/// Its length is `kmer_size + nodes.len() - 1`.
/// Returns an empty string if there are no nodes.
pub fn nodes_to_string(nodes: &[DbNode], graph: &DeBruijnGraph) -> String {
    let mut buffer: Vec<u8> = Vec::new();
    // Writing to a vector cannot fail.
    let _ = write_nodes(nodes, graph, &mut buffer);
    buffer.into_iter().map(char::from).collect()
}

/// Writes the sequence spelled by the walk to the output.
///
/// See [`nodes_to_string`] for details.
pub fn write_nodes<T: Write>(nodes: &[DbNode], graph: &DeBruijnGraph, output: &mut T) -> io::Result<()> {
    if nodes.is_empty() {
        return Ok(());
    }
    let kmer_size = graph.kmer_size();
    let first = graph.oriented_bkmer(nodes[0]);
    output.write_all(&first.to_bases(kmer_size))?;
    let tail: Vec<u8> = nodes[1..].iter().map(|node| kmer::decode_base(graph.node_last_nuc(*node))).collect();
    output.write_all(&tail)?;
    Ok(())
}

/// Writes one line per node with the stored k-mer, the orientation, and the oriented k-mer.
///
/// The format is `"{index:>3}: {kmer}:{orientation} {oriented_kmer}"`, where the orientation is `0` (forward) or `1` (reverse).
pub fn write_nodes_verbose<T: Write>(nodes: &[DbNode], graph: &DeBruijnGraph, output: &mut T) -> io::Result<()> {
    let kmer_size = graph.kmer_size();
    for (i, node) in nodes.iter().enumerate() {
        let stored = graph.bkmer(node.key);
        let oriented = graph.oriented_bkmer(*node);
        writeln!(
            output, "{:>3}: {}:{} {}",
            i, stored.display(kmer_size), orientation_code(node.orient), oriented.display(kmer_size)
        )?;
    }
    Ok(())
}

/// Writes one symbol per node describing its indegree and outdegree in the union of all colours.
///
/// Degrees of two or more are reported as two:
///
/// | in \ out | 0 | 1 | 2 |
/// |---|---|---|---|
/// | 0 | `!` | `+` | `{` |
/// | 1 | `-` | `=` | `<` |
/// | 2 | `}` | `>` | `*` |
pub fn write_node_degrees<T: Write>(nodes: &[DbNode], graph: &DeBruijnGraph, output: &mut T) -> io::Result<()> {
    const SYMBOLS: [&[u8; 3]; 3] = [b"!+{", b"-=<", b"}>*"];
    let symbols: Vec<u8> = nodes.iter().map(|node| {
        let edges = graph.edges_union(node.key);
        let indegree = edges::indegree(edges, node.orient).min(2);
        let outdegree = edges::outdegree(edges, node.orient).min(2);
        SYMBOLS[indegree][outdegree]
    }).collect();
    output.write_all(&symbols)
}

/// Returns the integer code of an orientation used in text output.
#[inline]
pub fn orientation_code(orientation: Orientation) -> usize {
    match orientation {
        Orientation::Forward => 0,
        Orientation::Reverse => 1,
    }
}

//-----------------------------------------------------------------------------

/// Returns `true` if the nodes form a walk in the graph.
///
/// For each pair of adjacent nodes, shifting the oriented k-mer of the first node left by one base and appending the last base of the second node must give the oriented k-mer of the second node.
/// Edges are not checked.
pub fn check_contiguous(nodes: &[DbNode], graph: &DeBruijnGraph) -> bool {
    if nodes.is_empty() {
        return true;
    }
    let kmer_size = graph.kmer_size();
    let mut prev: BinaryKmer = graph.oriented_bkmer(nodes[0]);
    for node in nodes[1..].iter() {
        let next = graph.oriented_bkmer(*node);
        if prev.left_shift_add(kmer_size, next.last_nuc()) != next {
            return false;
        }
        prev = next;
    }
    true
}

//-----------------------------------------------------------------------------
