//! Alignments of reads to node chains in the graph.
//!
//! A [`DbAlignment`] maps a read or a read pair to an ordered list of graph nodes.
//! Each clean contig of the read (see [`ContigIter`]) is split into k-mers.
//! Every k-mer found in the graph becomes a node in the alignment, and k-mers that are not found are skipped.
//!
//! Each node has a gap value: the number of k-mers skipped before it.
//! A gap of 0 means that the node directly follows the previous node in the read.
//! The gap of the first node of a read is the number of k-mers skipped at the start of the read.
//! Gaps are measured in read offsets, so bases excluded from the clean contigs count as skipped k-mers.
//!
//! The nodes of the second read of a pair start at [`DbAlignment::r2start_index`].
//! The two reads are never assumed to be adjacent in the genome.

use crate::contigs::ContigIter;
use crate::graph::DeBruijnGraph;
use crate::kmer::{self, BinaryKmer};
use crate::nodes::{self, DbNode};
use crate::reads::Read;

use std::io::{self, Write};
use std::ops::Range;


//-----------------------------------------------------------------------------

/// An alignment of a read or a read pair to the graph.
///
/// The alignment can be reused for multiple reads to avoid reallocating the buffers.
///
/// # Examples
///
/// ```
/// use ctx_graph::{DbAlignment, DeBruijnGraph, ColourLayout};
/// use ctx_graph::kmer::BinaryKmer;
/// use ctx_graph::reads::Read;
///
/// let mut graph = DeBruijnGraph::new(3, 1, ColourLayout::PerColour).unwrap();
/// for kmer in [b"GAT", b"ATT", b"TTA"] {
///     graph.add_kmer(&BinaryKmer::from_bases(kmer, 3));
/// }
///
/// // GAT ATT TTA are found, TAC ACA are not.
/// let read = Read::new("read", b"GATTACA");
/// let mut alignment = DbAlignment::new();
/// alignment.from_reads(&read, None, 0, 0, 0, &graph);
/// assert_eq!(alignment.nodes.len(), 3);
/// assert_eq!(alignment.gaps, vec![0, 0, 0]);
/// assert!(alignment.seq_gaps);
/// assert_eq!(alignment.r1_trailing_loss, 0);
/// assert!(alignment.used_r1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DbAlignment {
    /// Nodes found in the graph, in read order.
    pub nodes: Vec<DbNode>,
    /// Number of k-mers skipped before each node.
    pub gaps: Vec<u32>,
    /// `true` if any k-mer of a clean contig was not found in the graph.
    pub seq_gaps: bool,
    /// Index of the first node from the second read.
    pub r2start_index: usize,
    /// Number of bases at the end of the first read after the last clean contig.
    pub r1_trailing_loss: usize,
    /// Number of bases at the end of the second read after the last clean contig.
    pub r2_trailing_loss: usize,
    /// `true` if the first read has at least one clean contig.
    pub used_r1: bool,
    /// `true` if the second read was given and has at least one clean contig.
    pub used_r2: bool,
    /// `true` if the second read was given.
    pub passed_r2: bool,
}

impl DbAlignment {
    /// Creates an empty alignment.
    pub fn new() -> Self {
        DbAlignment::default()
    }

    /// Returns the number of nodes in the alignment.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the alignment has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the nodes from the first read.
    pub fn r1_nodes(&self) -> &[DbNode] {
        &self.nodes[..self.r2start_index]
    }

    /// Returns the nodes from the second read.
    pub fn r2_nodes(&self) -> &[DbNode] {
        &self.nodes[self.r2start_index..]
    }

    // Appends the nodes of the read to the alignment.
    // Returns the number of bases after the last clean contig.
    fn from_read(&mut self, read: &Read, qcutoff: u8, hp_cutoff: usize, graph: &DeBruijnGraph) -> usize {
        let kmer_size = graph.kmer_size();
        let mut contig_end = 0;
        // Offset of the next k-mer if there have been no misses since the last hit.
        let mut expected_offset = 0;

        self.nodes.reserve(read.len());
        self.gaps.reserve(read.len());
        for contig in ContigIter::new(read, kmer_size, qcutoff, hp_cutoff) {
            contig_end = contig.end;
            // Start with the first k - 1 bases; each step appends the next base.
            let mut bkmer = BinaryKmer::from_bases(&read.seq[contig.start..contig.end], kmer_size).right_shift_one_base();
            for next_base in contig.start + kmer_size - 1..contig.end {
                // Clean contigs only contain ACGT.
                let nuc = kmer::encode_base(read.seq[next_base]).unwrap_or(0);
                bkmer = bkmer.left_shift_add(kmer_size, nuc);
                let offset = next_base + 1 - kmer_size;
                match graph.find_node(&bkmer) {
                    Some(node) => {
                        self.nodes.push(node);
                        self.gaps.push((offset - expected_offset) as u32);
                        expected_offset = offset + 1;
                    },
                    None => self.seq_gaps = true,
                }
            }
        }

        read.len() - contig_end
    }

    /// Replaces the contents of the alignment with the alignment of a read or a read pair.
    ///
    /// # Arguments
    ///
    /// * `r1`: The first read.
    /// * `r2`: The second read, if any.
    /// * `qcutoff1`, `qcutoff2`: Quality cutoffs for the reads; see [`ContigIter::new`].
    /// * `hp_cutoff`: Homopolymer cutoff for both reads; see [`ContigIter::new`].
    /// * `graph`: The graph.
    pub fn from_reads(
        &mut self, r1: &Read, r2: Option<&Read>,
        qcutoff1: u8, qcutoff2: u8, hp_cutoff: usize,
        graph: &DeBruijnGraph
    ) {
        self.nodes.clear();
        self.gaps.clear();
        self.seq_gaps = false;
        self.r2_trailing_loss = 0;
        self.passed_r2 = r2.is_some();

        self.r1_trailing_loss = self.from_read(r1, qcutoff1, hp_cutoff, graph);
        self.r2start_index = self.nodes.len();
        if let Some(r2) = r2 {
            self.r2_trailing_loss = self.from_read(r2, qcutoff2, hp_cutoff, graph);
        }

        self.used_r1 = self.r1_trailing_loss < r1.len();
        self.used_r2 = match r2 {
            Some(r2) => self.r2_trailing_loss < r2.len(),
            None => false,
        };
    }

    /// Returns the index of the first node after `start` with a nonzero gap, or the number of nodes if there is none.
    ///
    /// If both reads were used and `start` is in the first read, the result is at most [`DbAlignment::r2start_index`].
    pub fn next_gap(&self, start: usize) -> usize {
        let mut end = self.nodes.len();
        if self.used_r1 && self.used_r2 && start < self.r2start_index {
            end = self.r2start_index;
        }
        let mut i = start + 1;
        while i < end && self.gaps[i] == 0 {
            i += 1;
        }
        i
    }

    /// Returns an iterator over the gap-free runs of nodes.
    ///
    /// Each run is a range of node indexes forming a walk in the graph.
    /// The runs are consecutive and cover all nodes.
    pub fn runs(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let mut start = 0;
        std::iter::from_fn(move || {
            if start >= self.nodes.len() {
                return None;
            }
            let end = self.next_gap(start).min(self.nodes.len());
            let result = start..end;
            start = end;
            Some(result)
        })
    }

    /// Writes a human-readable description of the alignment.
    ///
    /// The output starts with line `dBAlignment:`.
    /// For each gap-free run, there is a line describing the gap before the run, a line with the number of nodes, and a line listing the nodes (`handle:orientation`) followed by the sequence they spell.
    /// The last line describes the end of the alignment.
    pub fn write_alignment<T: Write>(&self, graph: &DeBruijnGraph, output: &mut T) -> io::Result<()> {
        writeln!(output, "dBAlignment:")?;
        for run in self.runs() {
            let gap = self.gaps[run.start];
            if run.start == self.r2start_index {
                writeln!(output, "    gap: {} -[ins]- {}", self.r1_trailing_loss, gap)?;
            } else if run.start == 0 {
                writeln!(output, "    start gap: {}", gap)?;
            } else {
                writeln!(output, "    gap: {}", gap)?;
            }
            writeln!(output, "  {} nodes", run.len())?;
            for node in self.nodes[run.clone()].iter() {
                write!(output, " {}:{}", node.key, nodes::orientation_code(node.orient))?;
            }
            write!(output, ": ")?;
            nodes::write_nodes(&self.nodes[run], graph, output)?;
            writeln!(output)?;
        }
        if self.passed_r2 {
            if !self.used_r2 {
                writeln!(output, "    [ins] unused r2: {}", self.r2_trailing_loss)?;
            } else {
                writeln!(output, " end gap: {}", self.r2_trailing_loss)?;
            }
        } else {
            writeln!(output, " end gap: {}", self.r1_trailing_loss)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
