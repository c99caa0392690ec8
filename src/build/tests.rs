use super::*;

use crate::alignment::DbAlignment;
use crate::nodes::{self, DbNode};

use gbz::Orientation;

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simple_sds::serialize;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;

//-----------------------------------------------------------------------------

const LAYOUTS: [ColourLayout; 3] = [ColourLayout::PerColour, ColourLayout::MergedWithPresence, ColourLayout::MergedWithCoverage];

fn params(kmer_size: usize, layout: ColourLayout, remove_pcr: bool) -> BuildParams {
    BuildParams { kmer_size, layout, remove_pcr, ..BuildParams::default() }
}

fn random_sequence(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| kmer::decode_base(rng.gen_range(0..4))).collect()
}

// Counts the occurrences of each canonical k-mer in the sequences.
fn kmer_counts(sequences: &[Vec<u8>], kmer_size: usize) -> HashMap<BinaryKmer, u32> {
    let mut result: HashMap<BinaryKmer, u32> = HashMap::new();
    for sequence in sequences {
        for start in 0..=sequence.len() - kmer_size {
            let key = BinaryKmer::from_bases(&sequence[start..], kmer_size).get_key(kmer_size);
            *result.entry(key).or_insert(0) += 1;
        }
    }
    result
}

//-----------------------------------------------------------------------------

#[test]
fn default_params() {
    let params = BuildParams::default();
    assert_eq!(params.kmer_size, BuildParams::KMER_SIZE, "Wrong default k-mer size");
    assert_eq!(params.layout, ColourLayout::PerColour, "Wrong default layout");
    assert!(!params.remove_pcr, "PCR duplicates should be kept by default");
    assert!(GraphBuilder::new(params, 0).is_err(), "A graph without colours should be rejected");
    let params = BuildParams { kmer_size: 64, ..BuildParams::default() };
    assert!(GraphBuilder::new(params, 1).is_err(), "An invalid k-mer size should be rejected");
}

#[test]
fn contiguous_chains() {
    let mut rng = StdRng::seed_from_u64(0xb011d);
    let sequence = random_sequence(&mut rng, 200);
    for layout in LAYOUTS {
        let mut builder = GraphBuilder::new(params(21, layout, false), 2).unwrap();
        let read = Read::new("read", &sequence);
        builder.load_read(1, &read);
        let graph = builder.graph();

        let mut alignment = DbAlignment::new();
        alignment.from_reads(&read, None, 0, 0, 0, graph);
        assert_eq!(alignment.len(), sequence.len() - 20, "Wrong number of nodes with layout {}", layout);
        assert!(!alignment.seq_gaps, "All k-mers should be in the graph with layout {}", layout);
        assert!(nodes::check_contiguous(&alignment.nodes, graph), "The nodes should form a walk with layout {}", layout);

        // Each node has an edge to the next node in the colour.
        for pair in alignment.nodes.windows(2) {
            let next = graph.next_nodes(pair[0], graph.edges_in_colour(pair[0], 1));
            assert!(next.iter().any(|next| next.node == pair[1]), "Missing edge from {:?} to {:?} with layout {}", pair[0], pair[1], layout);
        }
        for node in alignment.nodes.iter() {
            assert!(graph.has_colour(node.key, 1), "Node {} should be in colour 1 with layout {}", node.key, layout);
            assert!(!graph.has_colour(node.key, 0), "Node {} should not be in colour 0 with layout {}", node.key, layout);
        }
    }
}

#[test]
fn coverage_is_multiplicity() {
    let mut rng = StdRng::seed_from_u64(0xc0e6);
    let kmer_size = 5;
    let sequences: Vec<Vec<u8>> = (0..20).map(|_| {
        let len = rng.gen_range(kmer_size..60);
        random_sequence(&mut rng, len)
    }).collect();
    let counts = kmer_counts(&sequences, kmer_size);

    let mut builder = GraphBuilder::new(params(kmer_size, ColourLayout::PerColour, false), 1).unwrap();
    for sequence in sequences.iter() {
        builder.load_read(0, &Read::new("read", sequence));
    }
    let stats = *builder.stats(0);
    let graph = builder.into_graph();

    assert_eq!(graph.nodes(), counts.len(), "Wrong number of nodes");
    assert_eq!(stats.novel_kmers, counts.len(), "Wrong number of novel k-mers");
    assert_eq!(stats.kmers, counts.values().sum::<u32>() as usize, "Wrong number of k-mers");
    assert_eq!(stats.reads, sequences.len(), "Wrong number of reads");
    assert_eq!(stats.contigs, sequences.len(), "Each read should be a single contig");
    for (key, count) in counts.iter() {
        let handle = graph.table().find(key);
        assert!(handle.is_some(), "Missing k-mer {}", key.to_string(kmer_size));
        assert_eq!(graph.coverage(handle.unwrap(), 0), *count, "Wrong coverage for {}", key.to_string(kmer_size));
    }
}

#[test]
fn unclean_bases_break_chains() {
    let params = BuildParams { kmer_size: 3, hp_cutoff: 4, ..BuildParams::default() };
    let mut builder = GraphBuilder::new(params, 1).unwrap();
    builder.load_read(0, &Read::new("read", b"GATNACAGAAAAT"));
    let stats = *builder.stats(0);
    assert_eq!(stats.contigs, 2, "Wrong number of contigs");
    assert_eq!(stats.bases, 7, "Wrong number of bases");
    assert_eq!(stats.kmers, 3, "Wrong number of k-mers");

    // No edge across the N.
    let graph = builder.graph();
    let gat = graph.find_node(&BinaryKmer::from_bases(b"GAT", 3)).unwrap();
    assert_eq!(graph.edges_in_colour(gat, 0), 0, "GAT should have no outgoing edges");
    assert!(graph.find_node(&BinaryKmer::from_bases(b"CAA", 3)).is_none(), "CAA is part of a homopolymer run");
}

//-----------------------------------------------------------------------------

#[test]
fn pcr_duplicates() {
    let r1 = Read::new("r1", b"GATTACAGATTACA");
    let r2 = Read::new("r2", b"CCTGAACCTGAA");
    let other = Read::new("r2", b"TTTCCCGGGAAA");

    let mut builder = GraphBuilder::new(params(5, ColourLayout::PerColour, true), 1).unwrap();
    assert!(builder.load_pair(0, &r1, &r2), "The first pair should be loaded");
    let first = builder.graph().find_node(&BinaryKmer::from_bases(b"GATTA", 5)).unwrap();
    assert_eq!(builder.graph().coverage(first.key, 0), 2, "Wrong coverage after the first pair");

    assert!(!builder.load_pair(0, &r1, &r2), "A duplicate pair should be skipped");
    assert_eq!(builder.graph().coverage(first.key, 0), 2, "A skipped pair should not add coverage");
    assert!(builder.load_pair(0, &r1, &other), "A pair with a different second read should be loaded");
    assert_eq!(builder.graph().coverage(first.key, 0), 4, "Wrong coverage after the third pair");
    assert!(!builder.load_pair(0, &r1, &other), "The third pair should now be a duplicate");

    let stats = builder.stats(0);
    assert_eq!(stats.duplicates, 2, "Wrong number of duplicates");
    assert_eq!(stats.reads, 8, "Skipped reads should be counted");
}

#[test]
fn keep_pcr_duplicates() {
    let r1 = Read::new("r1", b"GATTACAGATTACA");
    let r2 = Read::new("r2", b"CCTGAACCTGAA");
    let mut builder = GraphBuilder::new(params(5, ColourLayout::PerColour, false), 1).unwrap();
    assert!(builder.load_pair(0, &r1, &r2), "The first pair should be loaded");
    assert!(builder.load_pair(0, &r1, &r2), "Duplicates should be loaded");
    let first = builder.graph().find_node(&BinaryKmer::from_bases(b"GATTA", 5)).unwrap();
    assert_eq!(builder.graph().coverage(first.key, 0), 4, "Wrong coverage");
    assert_eq!(builder.stats(0).duplicates, 0, "There should be no duplicates");
}

#[test]
fn toggle_pcr_removal() {
    let r1 = Read::new("r1", b"GATTACAGATTACA");
    let r2 = Read::new("r2", b"CCTGAACCTGAA");
    let mut builder = GraphBuilder::new(params(5, ColourLayout::PerColour, false), 1).unwrap();

    // Pairs loaded without the filter are not remembered.
    assert!(builder.load_pair(0, &r1, &r2), "The first pair should be loaded");
    builder.set_remove_pcr(true);
    assert!(builder.params().remove_pcr, "The filter should be enabled");
    assert!(builder.load_pair(0, &r1, &r2), "The pair was not seen with the filter enabled");
    assert!(!builder.load_pair(0, &r1, &r2), "The pair should now be a duplicate");

    builder.set_remove_pcr(false);
    assert!(builder.load_pair(0, &r1, &r2), "Duplicates should be loaded after disabling the filter");
    assert_eq!(builder.stats(0).duplicates, 1, "Wrong number of duplicates");
    let first = builder.graph().find_node(&BinaryKmer::from_bases(b"GATTA", 5)).unwrap();
    assert_eq!(builder.graph().coverage(first.key, 0), 6, "Wrong coverage");
}

//-----------------------------------------------------------------------------

fn source_graph(layout: ColourLayout) -> (DeBruijnGraph, Vec<BuildStats>) {
    let mut builder = GraphBuilder::new(params(5, layout, false), 2).unwrap();
    builder.load_read(0, &Read::new("r1", b"GATTACAGATTACA"));
    builder.load_read(1, &Read::new("r2", b"GATTACACCTGAA"));
    let stats = vec![*builder.stats(0), *builder.stats(1)];
    (builder.into_graph(), stats)
}

#[test]
fn merge_colours() {
    for layout in LAYOUTS {
        let (source, stats) = source_graph(layout);

        // Both source colours go to colour 1 of a graph that already has reads.
        let mut builder = GraphBuilder::new(params(5, ColourLayout::PerColour, false), 2).unwrap();
        builder.load_read(1, &Read::new("r3", b"GATTACA"));
        let result = builder.load_graph(&source, &stats, &[(0, 1), (1, 1)]);
        assert!(result.is_ok(), "Failed to merge with layout {}: {}", layout, result.unwrap_err());
        assert_eq!(builder.graph().nodes(), source.nodes(), "Wrong number of nodes with layout {}", layout);

        let merged_stats = builder.stats(1);
        assert_eq!(merged_stats.reads, 3, "Wrong number of reads with layout {}", layout);
        assert_eq!(merged_stats.contigs, 3, "Wrong number of contigs with layout {}", layout);
        assert_eq!(merged_stats.bases, 34, "Wrong number of bases with layout {}", layout);
        assert_eq!(merged_stats.novel_kmers, source.nodes() - 3, "Wrong number of novel k-mers with layout {}", layout);
        assert_eq!(*builder.stats(0), BuildStats::default(), "Colour 0 should be empty with layout {}", layout);

        // The k-mers of r3 have one more occurrence in the merged colour.
        let r3_kmers: Vec<BinaryKmer> = [b"GATTA", b"ATTAC", b"TTACA"].iter().map(|kmer| {
            BinaryKmer::from_bases(*kmer, 5).get_key(5)
        }).collect();
        let graph = builder.graph();
        for handle in 0..source.nodes() {
            let node = graph.find_node(&source.bkmer(handle)).unwrap();
            let extra = if r3_kmers.contains(&source.bkmer(handle)) { 1 } else { 0 };
            let expected = source.coverage(handle, 0) + source.coverage(handle, 1) + extra;
            assert_eq!(graph.coverage(node.key, 1), expected, "Wrong coverage for node {} with layout {}", handle, layout);
            assert_eq!(graph.coverage(node.key, 0), 0, "Node {} should not be in colour 0 with layout {}", handle, layout);
            for orient in [Orientation::Forward, Orientation::Reverse] {
                let source_edges = source.edges_in_colour(DbNode::new(handle, orient), 0) | source.edges_in_colour(DbNode::new(handle, orient), 1);
                let edges = graph.edges_in_colour(DbNode::new(node.key, orient), 1);
                assert_eq!(edges, source_edges, "Wrong edges for node {} ({:?}) with layout {}", handle, orient, layout);
            }
        }
    }
}

#[test]
fn merge_errors() {
    let (source, stats) = source_graph(ColourLayout::PerColour);
    let mut builder = GraphBuilder::new(params(7, ColourLayout::PerColour, false), 2).unwrap();
    assert!(builder.load_graph(&source, &stats, &[(0, 0)]).is_err(), "Merging a graph with a different k-mer size should fail");

    let mut builder = GraphBuilder::new(params(5, ColourLayout::PerColour, false), 2).unwrap();
    assert!(builder.load_graph(&source, &stats, &[(2, 0)]).is_err(), "A source colour out of range should be rejected");
    assert!(builder.load_graph(&source, &stats, &[(0, 2)]).is_err(), "A target colour out of range should be rejected");
    assert!(builder.load_graph(&source, &stats[..1], &[(0, 0)]).is_err(), "Missing statistics should be rejected");
    assert_eq!(builder.graph().nodes(), 0, "Failed merges should not add nodes");
}

//-----------------------------------------------------------------------------

#[test]
fn load_files() {
    let file1 = serialize::temp_file_name("ctx-graph-build");
    let file2 = serialize::temp_file_name("ctx-graph-build");
    let mut output = File::create(&file1).unwrap();
    output.write_all(b">r1\nGATTACA\n>r2\nGATTACAGATTACA\n").unwrap();
    drop(output);
    let mut output = File::create(&file2).unwrap();
    output.write_all(b"@r1\nTGTAATC\n+\nIIIIIII\n@r2\nCCTGAACCTGAA\n+\nIIIIIIIIIIII\n").unwrap();
    drop(output);

    let mut builder = GraphBuilder::new(params(5, ColourLayout::MergedWithPresence, true), 2).unwrap();
    assert!(builder.load_file(0, &file1).is_ok(), "Failed to load a single file");
    assert_eq!(builder.stats(0).reads, 2, "Wrong number of reads in colour 0");
    assert!(builder.load_paired_files(1, &file1, &file2).is_ok(), "Failed to load paired files");
    assert_eq!(builder.stats(1).reads, 4, "Wrong number of reads in colour 1");
    assert_eq!(builder.stats(1).duplicates, 0, "There should be no duplicates");

    let graph = builder.graph();
    let node = graph.find_node(&BinaryKmer::from_bases(b"CCTGA", 5)).unwrap();
    assert!(graph.has_colour(node.key, 1) && !graph.has_colour(node.key, 0), "CCTGA should only be in colour 1");

    // Files with a different number of reads.
    let mut output = File::create(&file2).unwrap();
    output.write_all(b">r1\nTGTAATC\n").unwrap();
    drop(output);
    assert!(builder.load_paired_files(1, &file1, &file2).is_err(), "Files with different read counts should fail");
    assert!(builder.load_file(0, "no-such-file.fq").is_err(), "Loading a missing file should fail");

    fs::remove_file(&file1).unwrap();
    fs::remove_file(&file2).unwrap();
}

//-----------------------------------------------------------------------------
