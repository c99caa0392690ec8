//! Loading sequencing reads into a graph.
//!
//! Each read is split into clean contigs (see [`ContigIter`]).
//! Every k-mer of a clean contig is added to the graph, its coverage in the colour is incremented, and it is marked as belonging to the colour.
//! Consecutive k-mers of a contig are connected with an edge in the colour.
//!
//! Read pairs can be filtered for PCR duplicates.
//! A pair is a duplicate if both reads start with the same oriented k-mer as the reads of an earlier pair.
//!
//! Colours of an existing graph can be merged into the graph under construction with [`GraphBuilder::load_graph`].

use crate::contigs::ContigIter;
use crate::graph::{ColourLayout, DeBruijnGraph};
use crate::edges::Edges;
use crate::kmer::{self, BinaryKmer};
use crate::nodes::DbNode;
use crate::reads::{Read, SequenceReader};

use gbz::Orientation;

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Graph construction parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildParams {
    /// K-mer size.
    pub kmer_size: usize,
    /// Colour layout of the graph.
    pub layout: ColourLayout,
    /// Minimum quality value as a raw byte, or 0 to ignore qualities.
    pub qcutoff: u8,
    /// Homopolymer runs of at least this length are excluded, or 0 to keep all runs.
    pub hp_cutoff: usize,
    /// Skip read pairs that are PCR duplicates of earlier pairs.
    pub remove_pcr: bool,
    /// Print progress information to stderr.
    pub verbose: bool,
}

impl BuildParams {
    /// Default k-mer size.
    pub const KMER_SIZE: usize = 31;
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            kmer_size: Self::KMER_SIZE,
            layout: ColourLayout::PerColour,
            qcutoff: 0,
            hp_cutoff: 0,
            remove_pcr: false,
            verbose: false,
        }
    }
}

/// Statistics for the reads loaded into a colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of reads, including the reads in skipped pairs.
    pub reads: usize,
    /// Number of read pairs skipped as PCR duplicates.
    pub duplicates: usize,
    /// Number of clean contigs loaded.
    pub contigs: usize,
    /// Total length of the clean contigs.
    pub bases: usize,
    /// Number of k-mers loaded.
    pub kmers: usize,
    /// Number of k-mers that created new nodes.
    pub novel_kmers: usize,
}

impl BuildStats {
    // Adds the counts loaded from another graph, except for novel k-mers.
    fn merge(&mut self, other: &BuildStats) {
        self.reads += other.reads;
        self.duplicates += other.duplicates;
        self.contigs += other.contigs;
        self.bases += other.bases;
        self.kmers += other.kmers;
    }
}

//-----------------------------------------------------------------------------

/// A builder that loads reads into a [`DeBruijnGraph`].
///
/// # Examples
///
/// ```
/// use ctx_graph::{BuildParams, GraphBuilder};
/// use ctx_graph::reads::Read;
///
/// let params = BuildParams { kmer_size: 3, ..BuildParams::default() };
/// let mut builder = GraphBuilder::new(params, 1).unwrap();
/// builder.load_read(0, &Read::new("read", b"GATTACA"));
/// assert_eq!(builder.stats(0).kmers, 5);
///
/// let graph = builder.into_graph();
/// assert_eq!(graph.nodes(), 5);
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    graph: DeBruijnGraph,
    params: BuildParams,
    stats: Vec<BuildStats>,
    // First nodes of the reads in the loaded pairs.
    read_starts: HashSet<DbNode>,
}

impl GraphBuilder {
    /// Creates a builder for an empty graph with the given number of colours.
    ///
    /// Returns an error if the parameters are invalid.
    pub fn new(params: BuildParams, num_of_cols: usize) -> Result<Self, String> {
        let graph = DeBruijnGraph::new(params.kmer_size, num_of_cols, params.layout)?;
        Ok(GraphBuilder {
            graph,
            params,
            stats: vec![BuildStats::default(); num_of_cols],
            read_starts: HashSet::new(),
        })
    }

    /// Returns the construction parameters.
    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    /// Returns the graph built so far.
    pub fn graph(&self) -> &DeBruijnGraph {
        &self.graph
    }

    /// Returns the statistics for the colour.
    ///
    /// # Panics
    ///
    /// Panics if the colour is out of range.
    pub fn stats(&self, colour: usize) -> &BuildStats {
        &self.stats[colour]
    }

    /// Enables or disables PCR duplicate removal for the pairs loaded after this call.
    pub fn set_remove_pcr(&mut self, remove_pcr: bool) {
        self.params.remove_pcr = remove_pcr;
    }

    /// Consumes the builder and returns the graph.
    pub fn into_graph(self) -> DeBruijnGraph {
        self.graph
    }

    // Returns the first k-mer of the first clean contig.
    fn first_kmer(&self, read: &Read) -> Option<BinaryKmer> {
        let kmer_size = self.graph.kmer_size();
        let mut contigs = ContigIter::new(read, kmer_size, self.params.qcutoff, self.params.hp_cutoff);
        let contig = contigs.next()?;
        Some(BinaryKmer::from_bases(&read.seq[contig.start..contig.end], kmer_size))
    }

    fn load_contigs(&mut self, colour: usize, read: &Read) {
        let kmer_size = self.graph.kmer_size();
        let stats = &mut self.stats[colour];
        stats.reads += 1;
        for contig in ContigIter::new(read, kmer_size, self.params.qcutoff, self.params.hp_cutoff) {
            stats.contigs += 1;
            stats.bases += contig.len();
            let mut bkmer = BinaryKmer::from_bases(&read.seq[contig.start..contig.end], kmer_size).right_shift_one_base();
            let mut prev: Option<DbNode> = None;
            for next_base in contig.start + kmer_size - 1..contig.end {
                // Clean contigs only contain ACGT.
                let nuc = kmer::encode_base(read.seq[next_base]).unwrap_or(0);
                bkmer = bkmer.left_shift_add(kmer_size, nuc);
                let (node, found) = self.graph.add_kmer(&bkmer);
                stats.kmers += 1;
                if !found {
                    stats.novel_kmers += 1;
                }
                self.graph.increment_coverage(node.key, colour);
                self.graph.set_colour(node.key, colour);
                if let Some(prev) = prev {
                    self.graph.add_edge(colour, prev, node);
                }
                prev = Some(node);
            }
        }
    }

    /// Loads a single read into the colour.
    ///
    /// # Panics
    ///
    /// Panics if the colour is out of range.
    pub fn load_read(&mut self, colour: usize, read: &Read) {
        self.load_contigs(colour, read);
    }

    /// Loads a read pair into the colour.
    ///
    /// Returns `false` if the pair was skipped as a PCR duplicate.
    /// Duplicates are only detected when [`BuildParams::remove_pcr`] is set, and only among pairs loaded with the option set.
    ///
    /// # Panics
    ///
    /// Panics if the colour is out of range.
    pub fn load_pair(&mut self, colour: usize, r1: &Read, r2: &Read) -> bool {
        if !self.params.remove_pcr {
            self.load_contigs(colour, r1);
            self.load_contigs(colour, r2);
            return true;
        }

        let first1 = self.first_kmer(r1);
        let first2 = self.first_kmer(r2);
        if let (Some(first1), Some(first2)) = (first1, first2) {
            let seen = |kmer: &BinaryKmer| -> bool {
                self.graph.find_node(kmer).map_or(false, |node| self.read_starts.contains(&node))
            };
            if seen(&first1) && seen(&first2) {
                self.stats[colour].reads += 2;
                self.stats[colour].duplicates += 1;
                return false;
            }
        }

        self.load_contigs(colour, r1);
        self.load_contigs(colour, r2);
        for first in [first1, first2].into_iter().flatten() {
            if let Some(node) = self.graph.find_node(&first) {
                self.read_starts.insert(node);
            }
        }
        true
    }

    /// Loads all reads from a FASTA or FASTQ file into the colour.
    ///
    /// The file may be gzip-compressed.
    /// Passes through any errors from reading the file.
    pub fn load_file<P: AsRef<Path>>(&mut self, colour: usize, filename: P) -> Result<(), String> {
        let start = Instant::now();
        let before = self.stats[colour];
        let reader = SequenceReader::open(&filename)?;
        for read in reader {
            let read = read?;
            self.load_read(colour, &read);
        }
        if self.params.verbose {
            self.report(colour, &before, filename.as_ref(), None, start);
        }
        Ok(())
    }

    /// Loads read pairs from two FASTA or FASTQ files into the colour.
    ///
    /// Read `i` of the first file is paired with read `i` of the second file.
    /// Returns an error if the files contain a different number of reads.
    /// Passes through any errors from reading the files.
    pub fn load_paired_files<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, colour: usize, file1: P, file2: Q) -> Result<(), String> {
        let start = Instant::now();
        let before = self.stats[colour];
        let mut reader1 = SequenceReader::open(&file1)?;
        let mut reader2 = SequenceReader::open(&file2)?;
        loop {
            match (reader1.read_next()?, reader2.read_next()?) {
                (Some(r1), Some(r2)) => {
                    self.load_pair(colour, &r1, &r2);
                },
                (None, None) => break,
                _ => {
                    return Err(format!(
                        "Files {} and {} contain a different number of reads",
                        file1.as_ref().display(), file2.as_ref().display()
                    ));
                },
            }
        }
        if self.params.verbose {
            self.report(colour, &before, file1.as_ref(), Some(file2.as_ref()), start);
        }
        Ok(())
    }

    /// Merges colours of an existing graph into the graph under construction.
    ///
    /// Each pair `(source, target)` in `colours` copies the nodes, edges, coverage, and presence of colour `source` in `graph` into colour `target`.
    /// Only nodes that belong to at least one of the source colours are added.
    /// The statistics in `stats` (one per colour of `graph`) are added to the statistics of the target colours, and nodes created by the merge are counted as novel k-mers of the first target colour using them.
    ///
    /// Returns an error if the k-mer sizes differ or if a colour is out of range.
    pub fn load_graph(&mut self, graph: &DeBruijnGraph, stats: &[BuildStats], colours: &[(usize, usize)]) -> Result<(), String> {
        if graph.kmer_size() != self.graph.kmer_size() {
            return Err(format!("Cannot merge a graph with k = {} into a graph with k = {}", graph.kmer_size(), self.graph.kmer_size()));
        }
        if stats.len() != graph.num_of_cols() {
            return Err(format!("Got statistics for {} colours in a graph with {} colours", stats.len(), graph.num_of_cols()));
        }
        for &(source, target) in colours {
            if source >= graph.num_of_cols() {
                return Err(format!("Source colour {} is out of range (the graph has {} colours)", source, graph.num_of_cols()));
            }
            if target >= self.graph.num_of_cols() {
                return Err(format!("Target colour {} is out of range (the graph has {} colours)", target, self.graph.num_of_cols()));
            }
        }

        let start = Instant::now();
        for handle in 0..graph.nodes() {
            let first = colours.iter().find(|(source, _)| {
                graph.has_colour(handle, *source) || graph.coverage(handle, *source) > 0
            });
            let first_target = match first {
                Some((_, target)) => *target,
                None => continue,
            };
            // The source k-mer is canonical, so the new node is in forward orientation.
            let (node, found) = self.graph.add_kmer(&graph.bkmer(handle));
            if !found {
                self.stats[first_target].novel_kmers += 1;
            }
            for &(source, target) in colours {
                let coverage = graph.coverage(handle, source);
                let in_colour = graph.has_colour(handle, source);
                if !in_colour && coverage == 0 {
                    continue;
                }
                self.graph.add_coverage(node.key, target, coverage);
                if in_colour {
                    self.graph.set_colour(node.key, target);
                }
                let edges: Edges = graph.edges_in_colour(DbNode::new(handle, Orientation::Forward), source)
                    | graph.edges_in_colour(DbNode::new(handle, Orientation::Reverse), source);
                let merged = self.graph.edges(node.key, target) | edges;
                self.graph.set_edges(node.key, target, merged);
            }
        }
        for &(source, target) in colours {
            self.stats[target].merge(&stats[source]);
        }

        if self.params.verbose {
            eprintln!(
                "Merged {} colours from a graph with {} nodes; {} nodes in the graph; {:.3} seconds",
                colours.len(), graph.nodes(), self.graph.nodes(), start.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    fn report(&self, colour: usize, before: &BuildStats, file1: &Path, file2: Option<&Path>, start: Instant) {
        let after = &self.stats[colour];
        match file2 {
            Some(file2) => eprintln!("Loaded {} and {} into colour {}", file1.display(), file2.display(), colour),
            None => eprintln!("Loaded {} into colour {}", file1.display(), colour),
        }
        eprintln!(
            "  {} reads, {} contigs, {} bases, {} k-mers ({} novel)",
            after.reads - before.reads, after.contigs - before.contigs,
            after.bases - before.bases, after.kmers - before.kmers,
            after.novel_kmers - before.novel_kmers
        );
        if self.params.remove_pcr {
            eprintln!("  {} PCR duplicate pairs skipped", after.duplicates - before.duplicates);
        }
        eprintln!("  {} nodes in the graph; {:.3} seconds", self.graph.nodes(), start.elapsed().as_secs_f64());
    }
}

//-----------------------------------------------------------------------------
