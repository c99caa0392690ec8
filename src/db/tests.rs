use super::*;

use crate::build::{BuildParams, BuildStats, GraphBuilder};
use crate::nodes::DbNode;
use crate::reads::Read;

use gbz::Orientation;
use simple_sds::serialize;

use std::fs;
use std::path::PathBuf;

//-----------------------------------------------------------------------------

const LAYOUTS: [ColourLayout; 3] = [ColourLayout::PerColour, ColourLayout::MergedWithPresence, ColourLayout::MergedWithCoverage];

fn sample_names(num_of_cols: usize) -> Vec<String> {
    (0..num_of_cols).map(|colour| format!("sample{}", colour)).collect()
}

fn build_graph(layout: ColourLayout) -> (DeBruijnGraph, Vec<BuildStats>) {
    let params = BuildParams { kmer_size: 7, layout, ..BuildParams::default() };
    let mut builder = GraphBuilder::new(params, 3).unwrap();
    builder.load_read(0, &Read::new("r1", b"GATTACAGATTACAGGCATTAC"));
    builder.load_read(0, &Read::new("r2", b"GATTACAGATTACAGG"));
    builder.load_read(2, &Read::new("r3", b"CCTGAACCTGAATTTGACAGATTACA"));
    let stats: Vec<BuildStats> = (0..3).map(|colour| *builder.stats(colour)).collect();
    let mut graph = builder.into_graph();

    // Paths do not need to be valid walks for storage.
    let paths = graph.paths_mut();
    paths.add_path(1, Orientation::Forward, &[0], &[0, 1, 2, 3, 2]).unwrap();
    paths.add_path(1, Orientation::Reverse, &[0, 2], &[3]).unwrap();
    paths.add_path(4, Orientation::Forward, &[2], &[]).unwrap();
    (graph, stats)
}

fn create_database(graph: &DeBruijnGraph, stats: &[BuildStats]) -> PathBuf {
    let db_file = serialize::temp_file_name("graph-base");
    assert!(!utils::file_exists(&db_file), "Database {} already exists", db_file.display());
    let result = GraphBase::create(graph, &sample_names(graph.num_of_cols()), stats, &db_file);
    assert!(result.is_ok(), "Failed to create database: {}", result.unwrap_err());
    db_file
}

fn open_database(filename: &PathBuf) -> GraphBase {
    let database = GraphBase::open(filename);
    assert!(database.is_ok(), "Failed to open database: {}", database.unwrap_err());
    database.unwrap()
}

fn check_graph(loaded: &DeBruijnGraph, graph: &DeBruijnGraph) {
    let layout = graph.layout();
    assert_eq!(loaded.kmer_size(), graph.kmer_size(), "Wrong k-mer size with layout {}", layout);
    assert_eq!(loaded.num_of_cols(), graph.num_of_cols(), "Wrong number of colours with layout {}", layout);
    assert_eq!(loaded.layout(), layout, "Wrong layout");
    assert_eq!(loaded.nodes(), graph.nodes(), "Wrong number of nodes with layout {}", layout);
    for handle in 0..graph.nodes() {
        assert_eq!(loaded.bkmer(handle), graph.bkmer(handle), "Wrong k-mer for node {} with layout {}", handle, layout);
        for colour in 0..graph.num_edge_cols() {
            assert_eq!(loaded.edges(handle, colour), graph.edges(handle, colour), "Wrong edges for node {} in colour {} with layout {}", handle, colour, layout);
        }
        for colour in 0..graph.num_of_cols() {
            assert_eq!(loaded.coverage(handle, colour), graph.coverage(handle, colour), "Wrong coverage for node {} in colour {} with layout {}", handle, colour, layout);
            assert_eq!(loaded.has_colour(handle, colour), graph.has_colour(handle, colour), "Wrong presence for node {} in colour {} with layout {}", handle, colour, layout);
        }
    }
    assert_eq!(loaded.paths(), graph.paths(), "Wrong path store with layout {}", layout);
}

//-----------------------------------------------------------------------------

#[test]
fn round_trip() {
    for layout in LAYOUTS {
        let (graph, stats) = build_graph(layout);
        let db_file = create_database(&graph, &stats);
        let database = open_database(&db_file);

        assert_eq!(database.version(), GraphBase::VERSION, "Wrong version");
        assert_eq!(database.kmer_size(), graph.kmer_size(), "Wrong k-mer size");
        assert_eq!(database.num_of_cols(), graph.num_of_cols(), "Wrong number of colours");
        assert_eq!(database.layout(), layout, "Wrong layout");
        assert_eq!(database.nodes(), graph.nodes(), "Wrong number of nodes");
        assert_eq!(database.samples(), sample_names(graph.num_of_cols()).as_slice(), "Wrong sample names");
        assert_eq!(database.stats(), stats.as_slice(), "Wrong statistics");
        assert_eq!(database.stats()[0].contigs, 2, "Wrong number of contigs in colour 0");
        assert_eq!(database.stats()[0].bases, 38, "Wrong number of bases in colour 0");
        assert_eq!(database.stats()[1], BuildStats::default(), "Colour 1 should be empty");
        assert_eq!(database.num_of_paths(), 3, "Wrong number of paths");
        assert_eq!(database.num_kmers_with_paths(), 2, "Wrong number of nodes with paths");
        assert!(database.file_size().is_some(), "The database should have a size");

        let loaded = database.load();
        assert!(loaded.is_ok(), "Failed to load the graph: {}", loaded.unwrap_err());
        check_graph(&loaded.unwrap(), &graph);

        drop(database);
        fs::remove_file(&db_file).unwrap();
    }
}

#[test]
fn loaded_graph_is_usable() {
    let (graph, stats) = build_graph(ColourLayout::MergedWithPresence);
    let db_file = create_database(&graph, &stats);
    let database = open_database(&db_file);
    let mut loaded = database.load().unwrap();

    // New k-mers get new handles after the loaded ones.
    let bkmer = BinaryKmer::from_bases(b"TTTTTTT", 7);
    let (node, found) = loaded.add_kmer(&bkmer);
    assert!(!found, "TTTTTTT should not be in the graph");
    assert_eq!(node.key, graph.nodes(), "Wrong handle for a new node");

    // Lookups find the same nodes.
    let bkmer = BinaryKmer::from_bases(b"GATTACA", 7);
    assert_eq!(loaded.find_node(&bkmer), graph.find_node(&bkmer), "Wrong node for GATTACA");
    let missing = BinaryKmer::from_bases(b"AAAAAAA", 7);
    assert!(loaded.find_node(&missing).is_none(), "AAAAAAA should not be in the graph");

    drop(database);
    fs::remove_file(&db_file).unwrap();
}

#[test]
fn empty_graph() {
    let graph = DeBruijnGraph::new(31, 2, ColourLayout::PerColour).unwrap();
    let db_file = create_database(&graph, &[BuildStats::default(); 2]);
    let database = open_database(&db_file);
    assert_eq!(database.nodes(), 0, "The graph should be empty");
    let loaded = database.load().unwrap();
    check_graph(&loaded, &graph);
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

#[test]
fn merge_into_new_build() {
    let (graph, stats) = build_graph(ColourLayout::PerColour);
    let db_file = create_database(&graph, &stats);
    let database = open_database(&db_file);
    let source = database.load().unwrap();

    for layout in LAYOUTS {
        // Colour 0 gets new reads, colour 1 gets colour 2 of the database.
        let params = BuildParams { kmer_size: 7, layout, ..BuildParams::default() };
        let mut builder = GraphBuilder::new(params, 2).unwrap();
        builder.load_read(0, &Read::new("r4", b"AAAAAAAAAA"));
        let result = builder.load_graph(&source, database.stats(), &[(2, 1)]);
        assert!(result.is_ok(), "Failed to merge the graph with layout {}: {}", layout, result.unwrap_err());
        let merged_stats = vec![*builder.stats(0), *builder.stats(1)];
        let merged = builder.into_graph();

        let mut in_colour = 0;
        for handle in 0..source.nodes() {
            let node = merged.find_node(&source.bkmer(handle));
            if !source.has_colour(handle, 2) {
                assert!(node.is_none(), "Node {} is not in the merged colour with layout {}", handle, layout);
                continue;
            }
            in_colour += 1;
            let node = node.unwrap();
            assert_eq!(node.orient, Orientation::Forward, "Wrong orientation for node {} with layout {}", handle, layout);
            assert_eq!(merged.coverage(node.key, 1), source.coverage(handle, 2), "Wrong coverage for node {} with layout {}", handle, layout);
            assert_eq!(merged.coverage(node.key, 0), 0, "Node {} should have no coverage in colour 0 with layout {}", handle, layout);
            assert!(merged.has_colour(node.key, 1), "Node {} should be in colour 1 with layout {}", handle, layout);
            for orient in [Orientation::Forward, Orientation::Reverse] {
                assert_eq!(
                    merged.edges_in_colour(DbNode::new(node.key, orient), 1),
                    source.edges_in_colour(DbNode::new(handle, orient), 2),
                    "Wrong edges for node {} ({:?}) with layout {}", handle, orient, layout
                );
            }
        }
        assert_eq!(merged.nodes(), in_colour + 1, "Wrong number of nodes with layout {}", layout);
        assert_eq!(merged_stats[1].reads, stats[2].reads, "Wrong number of reads with layout {}", layout);
        assert_eq!(merged_stats[1].contigs, stats[2].contigs, "Wrong number of contigs with layout {}", layout);
        assert_eq!(merged_stats[1].bases, stats[2].bases, "Wrong number of bases with layout {}", layout);
        assert_eq!(merged_stats[1].novel_kmers, in_colour, "Wrong number of novel k-mers with layout {}", layout);

        // The statistics of the merged colour survive another round trip.
        let merged_file = create_database(&merged, &merged_stats);
        let merged_db = open_database(&merged_file);
        assert_eq!(merged_db.stats(), merged_stats.as_slice(), "Wrong statistics in the merged database with layout {}", layout);
        assert_eq!(merged_db.stats()[1].bases, 26, "Wrong number of bases in colour 1 with layout {}", layout);
        drop(merged_db);
        fs::remove_file(&merged_file).unwrap();
    }

    drop(database);
    fs::remove_file(&db_file).unwrap();
}

//-----------------------------------------------------------------------------

#[test]
fn create_errors() {
    let (graph, stats) = build_graph(ColourLayout::PerColour);
    let db_file = create_database(&graph, &stats);
    let result = GraphBase::create(&graph, &sample_names(3), &stats, &db_file);
    assert!(result.is_err(), "Creating an existing database should fail");
    fs::remove_file(&db_file).unwrap();

    let db_file = serialize::temp_file_name("graph-base");
    let result = GraphBase::create(&graph, &sample_names(2), &stats, &db_file);
    assert!(result.is_err(), "Creating a database with the wrong number of samples should fail");
    assert!(!utils::file_exists(&db_file), "The database should not have been created");
    let result = GraphBase::create(&graph, &sample_names(3), &stats[..2], &db_file);
    assert!(result.is_err(), "Creating a database with the wrong number of statistics should fail");
    assert!(!utils::file_exists(&db_file), "The database should not have been created");
}

#[test]
fn open_errors() {
    let db_file = serialize::temp_file_name("graph-base");
    assert!(GraphBase::open(&db_file).is_err(), "Opening a missing database should fail");

    let (graph, stats) = build_graph(ColourLayout::PerColour);
    let db_file = create_database(&graph, &stats);
    let connection = Connection::open(&db_file).unwrap();
    connection.execute("UPDATE Tags SET value = ?1 WHERE key = ?2", ("ctx-graph v0.0.0", "version")).unwrap();
    drop(connection);
    assert!(GraphBase::open(&db_file).is_err(), "Opening a database with the wrong version should fail");
    fs::remove_file(&db_file).unwrap();
}

#[test]
fn corrupted_nodes() {
    let (graph, stats) = build_graph(ColourLayout::PerColour);
    let db_file = create_database(&graph, &stats);
    let connection = Connection::open(&db_file).unwrap();
    connection.execute("DELETE FROM Nodes WHERE handle = ?1", (3,)).unwrap();
    drop(connection);
    let database = open_database(&db_file);
    assert!(database.load().is_err(), "Loading a graph with a missing node should fail");
    drop(database);
    fs::remove_file(&db_file).unwrap();
}

//-----------------------------------------------------------------------------

#[test]
fn blob_encodings() {
    let values: Vec<u64> = vec![0, 1, u64::MAX, 0x0123_4567_89AB_CDEF];
    assert_eq!(decode_u64s(&encode_u64s(&values)), values, "Wrong u64 values");
    let values: Vec<u32> = vec![0, 7, u32::MAX];
    let bytes = encode_u32s(&values);
    assert_eq!(bytes[4..8], [7u8, 0, 0, 0], "Values should be little-endian");
    assert_eq!(decode_u32s(&bytes), values, "Wrong u32 values");
    assert_eq!(encode_bits(&[true, false, true, false, false, false, false, false, true]), vec![0x05, 0x01], "Wrong bit encoding");

    let bkmer = BinaryKmer::from_bases(b"GATTACAGATTACAGATTACAGATTACAGATTACA", 35);
    assert_eq!(decode_kmer(&encode_kmer(&bkmer), 35), Some(bkmer), "Wrong k-mer");
    assert!(decode_kmer(&[0; 8], 35).is_none(), "A truncated k-mer should be rejected");
}

//-----------------------------------------------------------------------------
