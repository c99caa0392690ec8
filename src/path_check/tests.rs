use super::*;

use crate::graph::ColourLayout;
use crate::kmer::BinaryKmer;
use crate::path_store::PathStore;

use gbz::Orientation;

//-----------------------------------------------------------------------------

const KMER_SIZE: usize = 5;

// Two sequences joining at ACCAT, which then forks into CCATC and CCATG.
const SEQUENCES: [&[u8]; 3] = [b"GACCATC", b"TACCAT", b"ACCATG"];

fn node(graph: &DeBruijnGraph, kmer: &[u8]) -> DbNode {
    graph.find_node(&BinaryKmer::from_bases(kmer, KMER_SIZE)).unwrap()
}

// Adds the k-mers and edges of the sequence to the colour.
fn add_sequence(graph: &mut DeBruijnGraph, sequence: &[u8], colour: usize) {
    let mut prev: Option<DbNode> = None;
    for start in 0..=sequence.len() - KMER_SIZE {
        let (curr, _) = graph.add_kmer(&BinaryKmer::from_bases(&sequence[start..], KMER_SIZE));
        graph.increment_coverage(curr.key, colour);
        graph.set_colour(curr.key, colour);
        if let Some(prev) = prev {
            graph.add_edge(colour, prev, curr);
        }
        prev = Some(curr);
    }
}

fn create_graph(layout: ColourLayout, num_of_cols: usize) -> DeBruijnGraph {
    let mut graph = DeBruijnGraph::new(KMER_SIZE, num_of_cols, layout).unwrap();
    for sequence in SEQUENCES.iter() {
        add_sequence(&mut graph, sequence, 0);
    }
    graph
}

const LAYOUTS: [ColourLayout; 3] = [ColourLayout::PerColour, ColourLayout::MergedWithPresence, ColourLayout::MergedWithCoverage];

//-----------------------------------------------------------------------------

#[test]
fn fork_selects_branch() {
    for layout in LAYOUTS {
        let graph = create_graph(layout, 1);
        let start = node(&graph, b"GACCA");
        assert!(graph.check_path(start, 0, &[1]).is_ok(), "Path to CCATC should be valid with {}", layout);
        assert!(graph.check_path(start, 0, &[2]).is_ok(), "Path to CCATG should be valid with {}", layout);
        assert!(graph.check_path(start, 0, &[0]).is_err(), "Path to CCATA should be invalid with {}", layout);
        assert!(graph.check_path(start, 0, &[3]).is_err(), "Path to CCATT should be invalid with {}", layout);
        let other = node(&graph, b"TACCA");
        assert!(graph.check_path(other, 0, &[2]).is_ok(), "Path from TACCA should be valid with {}", layout);
        assert!(graph.check_path(start, 0, &[]).is_ok(), "An empty path should be valid with {}", layout);
    }
}

#[test]
fn removed_branch() {
    for layout in LAYOUTS {
        let mut graph = create_graph(layout, 1);
        let start = node(&graph, b"GACCA");
        assert!(graph.check_path(start, 0, &[2]).is_ok(), "Path to CCATG should be valid with {}", layout);
        let fork = node(&graph, b"ACCAT");
        let branch = node(&graph, b"CCATG");
        graph.del_edge(0, fork, branch);
        assert!(graph.check_path(start, 0, &[2]).is_err(), "Path to CCATG should be invalid after removing the edge with {}", layout);
        graph.add_edge(0, fork, branch);
        assert!(graph.check_path(start, 0, &[2]).is_ok(), "Path to CCATG should be valid again with {}", layout);
    }
}

#[test]
fn reverse_orientation() {
    let graph = create_graph(ColourLayout::PerColour, 1);
    // CATGG is the reverse complement of CCATG.
    let start = node(&graph, b"CATGG");
    assert_eq!(start.orient, Orientation::Forward, "CATGG should be a canonical k-mer");
    // CATGG -> ATGGT, which forks into TGGTA and TGGTC.
    assert!(graph.check_path(start, 0, &[0]).is_ok(), "Path to TGGTA should be valid");
    assert!(graph.check_path(start, 0, &[1]).is_ok(), "Path to TGGTC should be valid");
    assert!(graph.check_path(start, 0, &[2]).is_err(), "Path to TGGTG should be invalid");
    // Same path from the other orientation of the start node.
    let reverse = node(&graph, b"CCATG");
    assert_eq!(reverse, start.reverse(), "CCATG should be the reverse of CATGG");
}

#[test]
fn path_must_start_at_junction() {
    let graph = create_graph(ColourLayout::PerColour, 1);
    // ACCAT -> CCATG, which has only one incoming edge.
    let start = node(&graph, b"ACCAT");
    let result = graph.check_path(start, 0, &[2, 0]);
    assert!(result.is_err(), "A path that does not start at a junction should be invalid");
}

#[test]
fn dead_end() {
    let graph = create_graph(ColourLayout::PerColour, 1);
    // The walk reaches CCATG and needs another base.
    let start = node(&graph, b"GACCA");
    let result = graph.check_path(start, 0, &[2, 1]);
    assert!(result.is_err(), "A path past a dead end should be invalid");
}

#[test]
fn node_not_in_colour() {
    for layout in LAYOUTS {
        let mut graph = create_graph(layout, 2);
        let start = node(&graph, b"GACCA");
        assert!(graph.check_path(start, 0, &[2]).is_ok(), "Path should be valid in colour 0 with {}", layout);
        assert!(graph.check_path(start, 1, &[2]).is_err(), "Path should be invalid in colour 1 with {}", layout);

        for sequence in SEQUENCES.iter() {
            add_sequence(&mut graph, sequence, 1);
        }
        assert!(graph.check_path(start, 1, &[1]).is_ok(), "Path to CCATC should be valid in colour 1 with {}", layout);
        assert!(graph.check_path(start, 1, &[2]).is_ok(), "Path to CCATG should be valid in colour 1 with {}", layout);
    }
}

#[test]
fn fork_in_one_colour() {
    for layout in LAYOUTS {
        let mut graph = create_graph(layout, 2);
        add_sequence(&mut graph, SEQUENCES[0], 1);
        add_sequence(&mut graph, SEQUENCES[1], 1);
        let start = node(&graph, b"GACCA");
        assert!(graph.check_path(start, 0, &[1]).is_ok(), "Path to CCATC should be valid in colour 0 with {}", layout);
        // There is no fork in colour 1, so the walk continues past CCATC and reaches a dead end.
        assert!(graph.check_path(start, 1, &[1]).is_err(), "Path to CCATC should be invalid in colour 1 with {}", layout);
        let fork = node(&graph, b"ACCAT");
        assert_eq!(
            edges::outdegree(graph.edges_in_colour(fork, 1), Orientation::Forward), 1,
            "ACCAT should not be a fork in colour 1 with {}", layout
        );
    }
}

#[test]
fn cycle_without_forks() {
    // GAACC enters the cycle AACCTGAGTC at AACCT.
    let mut graph = DeBruijnGraph::new(KMER_SIZE, 1, ColourLayout::PerColour).unwrap();
    add_sequence(&mut graph, b"AACCTGAGTCAACCT", 0);
    add_sequence(&mut graph, b"GAACCT", 0);
    let start = node(&graph, b"GAACC");
    let result = graph.check_path(start, 0, &[0]);
    assert!(result.is_err(), "A path through a cycle without forks should be invalid");
}

//-----------------------------------------------------------------------------

#[test]
fn check_records() {
    let mut graph = create_graph(ColourLayout::PerColour, 2);
    for sequence in SEQUENCES.iter() {
        add_sequence(&mut graph, sequence, 1);
    }
    // ACCAT only forks in colour 1.
    let branch = node(&graph, b"ACCAT");
    let other = node(&graph, b"CCATG");
    graph.del_edge(0, branch, other);
    let start = node(&graph, b"GACCA");

    let mut store = PathStore::new(2);
    let both = store.add_path(start.key, start.orient, &[0, 1], &[1]).unwrap();
    let second = store.add_path(start.key, start.orient, &[1], &[2]).unwrap();
    let invalid = store.add_path(start.key, start.orient, &[0, 1], &[2]).unwrap();

    assert!(graph.check_record(start.key, &store.record(both).unwrap()).is_err(), "Path to CCATC should be invalid in colour 0 without the fork");
    assert!(graph.check_record(start.key, &store.record(second).unwrap()).is_ok(), "Path to CCATG should be valid in colour 1");
    assert!(graph.check_record(start.key, &store.record(invalid).unwrap()).is_err(), "Path to CCATG should be invalid in colour 0");
}

#[test]
fn check_all_paths() {
    let mut graph = create_graph(ColourLayout::MergedWithPresence, 1);
    let start = node(&graph, b"GACCA");
    let other = node(&graph, b"TACCA");
    let reverse = node(&graph, b"CATGG");
    {
        let store = graph.paths_mut();
        store.add_path(start.key, start.orient, &[0], &[1]).unwrap();
        store.add_path(start.key, start.orient, &[0], &[2]).unwrap();
        store.add_path(other.key, other.orient, &[0], &[2]).unwrap();
        store.add_path(reverse.key, reverse.orient, &[0], &[1]).unwrap();
    }
    let stats = graph.check_all_paths();
    assert!(stats.is_ok(), "Path check failed: {}", stats.as_ref().unwrap_err());
    let stats = stats.unwrap();
    assert_eq!(stats.num_of_paths, 4, "Wrong number of paths");
    assert_eq!(stats.num_kmers_with_paths, 3, "Wrong number of nodes with paths");
    assert_eq!(stats.num_of_walks, 4, "Wrong number of walks");
    assert_eq!(stats.num_of_bases, 4, "Wrong number of bases");

    // Invalidate one of the paths.
    let fork = node(&graph, b"ACCAT");
    let branch = node(&graph, b"CCATG");
    graph.del_edge(0, fork, branch);
    assert!(graph.check_all_paths().is_err(), "Path check should fail after removing an edge");
}

#[test]
fn counter_mismatch() {
    let mut graph = create_graph(ColourLayout::PerColour, 1);
    let start = node(&graph, b"GACCA");
    let mut store = PathStore::new(1);
    store.add_path(start.key, start.orient, &[0], &[1]).unwrap();
    store.add_path(start.key, start.orient, &[0], &[2]).unwrap();

    let wrong_paths = PathStore::from_parts(1, store.arena().to_vec(), store.heads().to_vec(), 3, 1);
    graph.set_paths(wrong_paths).unwrap();
    assert!(graph.check_all_paths().is_err(), "Wrong path count should be detected");

    let wrong_kmers = PathStore::from_parts(1, store.arena().to_vec(), store.heads().to_vec(), 2, 2);
    graph.set_paths(wrong_kmers).unwrap();
    assert!(graph.check_all_paths().is_err(), "Wrong node count should be detected");

    graph.set_paths(store).unwrap();
    assert!(graph.check_all_paths().is_ok(), "The original store should be valid");
}

#[test]
fn corrupted_store() {
    let mut graph = create_graph(ColourLayout::PerColour, 1);
    let start = node(&graph, b"GACCA");
    let mut store = PathStore::new(1);
    store.add_path(start.key, start.orient, &[0], &[1]).unwrap();

    // Clear the colour set.
    let mut arena = store.arena().to_vec();
    arena[8] = 0;
    graph.set_paths(PathStore::from_parts(1, arena, store.heads().to_vec(), 1, 1)).unwrap();
    assert!(graph.check_all_paths().is_err(), "Empty colour set should be detected");

    // Truncate the record.
    let arena = store.arena()[..store.end() - 1].to_vec();
    graph.set_paths(PathStore::from_parts(1, arena, store.heads().to_vec(), 1, 1)).unwrap();
    assert!(graph.check_all_paths().is_err(), "Truncated record should be detected");

    // Paths for a node that does not exist.
    let mut heads = vec![PATH_NULL; graph.nodes() + 1];
    heads[graph.nodes()] = 0;
    graph.set_paths(PathStore::from_parts(1, store.arena().to_vec(), heads, 1, 1)).unwrap();
    assert!(graph.check_all_paths().is_err(), "Paths for a missing node should be detected");

    assert!(graph.set_paths(PathStore::new(2)).is_err(), "Path store with a wrong number of colours should be rejected");
}

//-----------------------------------------------------------------------------
