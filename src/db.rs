//! Graph-base: a SQLite snapshot of a colored de Bruijn graph.
//!
//! The database contains three tables:
//!
//! * `Tags` stores the header as key-value pairs, including the sample names and the loading statistics for the colours.
//! * `Nodes` stores one row per node, with the node handle as its primary key.
//!   Each row contains the canonical k-mer, the edge bytes for each edge track, the coverage in each colour, and the colour membership bits.
//! * `PathStore` stores the path arena and the list heads for each node as a single row.
//!
//! Integers inside blobs are stored in little-endian byte order.
//! Loading the database recreates the graph with the same node handles.

use crate::build::BuildStats;
use crate::edges::{Covg, Edges};
use crate::graph::{ColourLayout, DeBruijnGraph};
use crate::kmer::{BinaryKmer, NUM_BKMER_WORDS};
use crate::path_store::{PathIndex, PathStore};
use crate::utils;

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use gbz::support::Tags;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A database connection to a Graph-base database.
///
/// This structure stores a database connection and the header information.
/// Use [`GraphBase::load`] to recreate the graph.
///
/// # Examples
///
/// ```
/// use ctx_graph::{BuildParams, BuildStats, GraphBase, GraphBuilder};
/// use ctx_graph::reads::Read;
/// use simple_sds::serialize;
/// use std::fs;
///
/// // Build a small graph.
/// let params = BuildParams { kmer_size: 5, ..BuildParams::default() };
/// let mut builder = GraphBuilder::new(params, 1).unwrap();
/// builder.load_read(0, &Read::new("read", b"GATTACAGATTACA"));
/// let stats: Vec<BuildStats> = vec![*builder.stats(0)];
/// let graph = builder.into_graph();
///
/// // Store it in a database.
/// let db_file = serialize::temp_file_name("graph-base");
/// let samples = vec![String::from("sample")];
/// assert!(GraphBase::create(&graph, &samples, &stats, &db_file).is_ok());
///
/// // Open the database and load the graph.
/// let database = GraphBase::open(&db_file).unwrap();
/// assert_eq!(database.kmer_size(), 5);
/// assert_eq!(database.nodes(), graph.nodes());
/// assert_eq!(database.samples(), &samples);
/// assert_eq!(database.stats(), &stats);
/// let loaded = database.load().unwrap();
/// assert_eq!(loaded.nodes(), graph.nodes());
///
/// // Clean up.
/// drop(database);
/// fs::remove_file(&db_file).unwrap();
/// ```
#[derive(Debug)]
pub struct GraphBase {
    connection: Connection,
    version: String,
    kmer_size: usize,
    num_of_cols: usize,
    layout: ColourLayout,
    nodes: usize,
    samples: Vec<String>,
    stats: Vec<BuildStats>,
    num_of_paths: usize,
    num_kmers_with_paths: usize,
}

/// Using the database.
impl GraphBase {
    // Key for database version.
    const KEY_VERSION: &'static str = "version";

    /// Current database version.
    pub const VERSION: &'static str = "ctx-graph v0.1.0";

    // Key for k-mer size.
    const KEY_KMER_SIZE: &'static str = "kmer_size";

    // Key for the number of colours.
    const KEY_COLOURS: &'static str = "colours";

    // Key for the colour layout.
    const KEY_LAYOUT: &'static str = "layout";

    // Key for node count.
    const KEY_NODES: &'static str = "nodes";

    // Key for the number of stored paths.
    const KEY_PATHS: &'static str = "paths";

    // Key for the number of nodes with paths.
    const KEY_KMERS_WITH_PATHS: &'static str = "kmers_with_paths";

    // Prefix for sample names; the suffix is the colour.
    const KEY_SAMPLE: &'static str = "sample_";

    // Prefixes for loading statistics; the suffix is the colour.
    const KEY_STATS: [&'static str; 6] = ["reads_", "duplicates_", "contigs_", "bases_", "kmers_", "novel_kmers_"];

    fn stats_to_values(stats: &BuildStats) -> [usize; 6] {
        [stats.reads, stats.duplicates, stats.contigs, stats.bases, stats.kmers, stats.novel_kmers]
    }

    fn stats_from_values(values: [usize; 6]) -> BuildStats {
        BuildStats {
            reads: values[0],
            duplicates: values[1],
            contigs: values[2],
            bases: values[3],
            kmers: values[4],
            novel_kmers: values[5],
        }
    }

    fn get_string_value(tags: &Tags, key: &str) -> String {
        tags.get(key).cloned().unwrap_or_default()
    }

    fn get_numeric_value(tags: &Tags, key: &str) -> Result<usize, String> {
        let value = Self::get_string_value(tags, key);
        value.parse::<usize>().map_err(|x| format!("Invalid numeric value for key {}: {}", key, x))
    }

    /// Opens a connection to the database in the given file.
    ///
    /// Reads the header information and passes through any database errors.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, String> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(filename, flags).map_err(|x| x.to_string())?;

        // Read all tags from the database.
        let mut get_tags = connection.prepare(
            "SELECT key, value FROM Tags"
        ).map_err(|x| x.to_string())?;
        let mut tags = Tags::new();
        let mut rows = get_tags.query(()).map_err(|x| x.to_string())?;
        while let Some(row) = rows.next().map_err(|x| x.to_string())? {
            let key: String = row.get(0).map_err(|x| x.to_string())?;
            let value: String = row.get(1).map_err(|x| x.to_string())?;
            tags.insert(&key, &value);
        }
        drop(rows);
        drop(get_tags);

        let version = Self::get_string_value(&tags, Self::KEY_VERSION);
        if version != Self::VERSION {
            return Err(format!("Unsupported database version: {} (expected {})", version, Self::VERSION));
        }
        let kmer_size = Self::get_numeric_value(&tags, Self::KEY_KMER_SIZE)?;
        let num_of_cols = Self::get_numeric_value(&tags, Self::KEY_COLOURS)?;
        let layout = ColourLayout::from_name(&Self::get_string_value(&tags, Self::KEY_LAYOUT))?;
        let nodes = Self::get_numeric_value(&tags, Self::KEY_NODES)?;
        let num_of_paths = Self::get_numeric_value(&tags, Self::KEY_PATHS)?;
        let num_kmers_with_paths = Self::get_numeric_value(&tags, Self::KEY_KMERS_WITH_PATHS)?;
        let samples: Vec<String> = (0..num_of_cols).map(|colour| {
            Self::get_string_value(&tags, &format!("{}{}", Self::KEY_SAMPLE, colour))
        }).collect();
        let mut stats: Vec<BuildStats> = Vec::with_capacity(num_of_cols);
        for colour in 0..num_of_cols {
            let mut values = [0; 6];
            for (value, prefix) in values.iter_mut().zip(Self::KEY_STATS) {
                *value = Self::get_numeric_value(&tags, &format!("{}{}", prefix, colour))?;
            }
            stats.push(Self::stats_from_values(values));
        }

        Ok(GraphBase {
            connection,
            version,
            kmer_size, num_of_cols, layout, nodes,
            samples, stats,
            num_of_paths, num_kmers_with_paths,
        })
    }

    /// Returns the filename of the database or an error if there is no filename.
    pub fn filename(&self) -> Option<&str> {
        self.connection.path()
    }

    /// Returns the size of the database file in a human-readable format.
    pub fn file_size(&self) -> Option<String> {
        let filename = self.filename()?;
        utils::file_size(filename)
    }

    /// Returns the version of the database.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the k-mer size.
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Returns the number of colours.
    pub fn num_of_cols(&self) -> usize {
        self.num_of_cols
    }

    /// Returns the colour layout.
    pub fn layout(&self) -> ColourLayout {
        self.layout
    }

    /// Returns the number of nodes in the graph.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Returns the sample names for the colours.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Returns the loading statistics for the colours.
    pub fn stats(&self) -> &[BuildStats] {
        &self.stats
    }

    /// Returns the number of stored paths.
    pub fn num_of_paths(&self) -> usize {
        self.num_of_paths
    }

    /// Returns the number of nodes with at least one path.
    pub fn num_kmers_with_paths(&self) -> usize {
        self.num_kmers_with_paths
    }
}

//-----------------------------------------------------------------------------

/// Creating the database.
impl GraphBase {
    /// Creates a new database from the graph.
    ///
    /// # Arguments
    ///
    /// * `graph`: The graph.
    /// * `samples`: Sample name for each colour.
    /// * `stats`: Loading statistics for each colour.
    /// * `filename`: Name of the database file to be created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already exists or if the number of sample names or statistics does not match the number of colours.
    /// Passes through any database errors.
    pub fn create<P: AsRef<Path>>(graph: &DeBruijnGraph, samples: &[String], stats: &[BuildStats], filename: P) -> Result<(), String> {
        eprintln!("Creating database {}", filename.as_ref().display());
        if utils::file_exists(&filename) {
            return Err(format!("Database {} already exists", filename.as_ref().display()));
        }
        if samples.len() != graph.num_of_cols() {
            return Err(format!("Got {} sample names for {} colours", samples.len(), graph.num_of_cols()));
        }
        if stats.len() != graph.num_of_cols() {
            return Err(format!("Got statistics for {} colours in a graph with {} colours", stats.len(), graph.num_of_cols()));
        }

        let mut connection = Connection::open(filename).map_err(|x| x.to_string())?;
        Self::insert_tags(graph, samples, stats, &mut connection).map_err(|x| x.to_string())?;
        Self::insert_nodes(graph, &mut connection).map_err(|x| x.to_string())?;
        Self::insert_paths(graph, &mut connection).map_err(|x| x.to_string())?;
        Ok(())
    }

    fn insert_tags(graph: &DeBruijnGraph, samples: &[String], stats: &[BuildStats], connection: &mut Connection) -> rusqlite::Result<()> {
        eprintln!("Inserting header and tags");

        // Create the tags table.
        connection.execute(
            "CREATE TABLE Tags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT",
            (),
        )?;

        // Insert header, sample names, and statistics.
        let mut inserted = 0;
        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Tags(key, value) VALUES (?1, ?2)"
            )?;

            let paths = graph.paths();
            insert.execute((Self::KEY_VERSION, Self::VERSION))?;
            insert.execute((Self::KEY_KMER_SIZE, graph.kmer_size().to_string()))?;
            insert.execute((Self::KEY_COLOURS, graph.num_of_cols().to_string()))?;
            insert.execute((Self::KEY_LAYOUT, graph.layout().name()))?;
            insert.execute((Self::KEY_NODES, graph.nodes().to_string()))?;
            insert.execute((Self::KEY_PATHS, paths.num_of_paths().to_string()))?;
            insert.execute((Self::KEY_KMERS_WITH_PATHS, paths.num_kmers_with_paths().to_string()))?;
            inserted += 7;

            for (colour, name) in samples.iter().enumerate() {
                let key = format!("{}{}", Self::KEY_SAMPLE, colour);
                insert.execute((key, name))?;
                inserted += 1;
            }
            for (colour, colour_stats) in stats.iter().enumerate() {
                for (prefix, value) in Self::KEY_STATS.iter().zip(Self::stats_to_values(colour_stats)) {
                    let key = format!("{}{}", prefix, colour);
                    insert.execute((key, value.to_string()))?;
                    inserted += 1;
                }
            }
        }
        transaction.commit()?;

        eprintln!("Inserted {} key-value pairs", inserted);
        Ok(())
    }

    fn insert_nodes(graph: &DeBruijnGraph, connection: &mut Connection) -> rusqlite::Result<()> {
        eprintln!("Inserting nodes");

        // Create the nodes table.
        connection.execute(
            "CREATE TABLE Nodes (
                handle INTEGER PRIMARY KEY,
                kmer BLOB NOT NULL,
                edges BLOB NOT NULL,
                coverage BLOB NOT NULL,
                colours BLOB NOT NULL
            ) STRICT",
            (),
        )?;

        // Insert the nodes.
        let mut inserted = 0;
        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Nodes(handle, kmer, edges, coverage, colours) VALUES (?1, ?2, ?3, ?4, ?5)"
            )?;
            for handle in 0..graph.nodes() {
                let kmer = encode_kmer(&graph.bkmer(handle));
                let edges: Vec<Edges> = (0..graph.num_edge_cols()).map(|colour| graph.edges(handle, colour)).collect();
                let coverage: Vec<Covg> = (0..graph.num_of_cols()).map(|colour| graph.coverage(handle, colour)).collect();
                let colours: Vec<bool> = (0..graph.num_of_cols()).map(|colour| graph.has_colour(handle, colour)).collect();
                insert.execute((handle, kmer, edges, encode_u32s(&coverage), encode_bits(&colours)))?;
                inserted += 1;
            }
        }
        transaction.commit()?;

        eprintln!("Inserted {} node records", inserted);
        Ok(())
    }

    fn insert_paths(graph: &DeBruijnGraph, connection: &mut Connection) -> rusqlite::Result<()> {
        eprintln!("Inserting the path store");

        // Create the path store table.
        connection.execute(
            "CREATE TABLE PathStore (
                id INTEGER PRIMARY KEY,
                arena BLOB NOT NULL,
                heads BLOB NOT NULL
            ) STRICT",
            (),
        )?;

        let paths = graph.paths();
        connection.execute(
            "INSERT INTO PathStore(id, arena, heads) VALUES (?1, ?2, ?3)",
            (0, paths.arena(), encode_u64s(paths.heads())),
        )?;

        eprintln!("Inserted {} paths in {} bytes", paths.num_of_paths(), paths.end());
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Loading the graph.
impl GraphBase {
    /// Recreates the graph stored in the database.
    ///
    /// Node handles are the same as in the original graph.
    /// The path store is loaded as is; use [`DeBruijnGraph::check_all_paths`] to validate it.
    /// Returns an error if the records are inconsistent with the header.
    /// Passes through any database errors.
    pub fn load(&self) -> Result<DeBruijnGraph, String> {
        let mut graph = DeBruijnGraph::new(self.kmer_size, self.num_of_cols, self.layout)?;
        let edge_cols = graph.num_edge_cols();
        let colset_len = self.num_of_cols.div_ceil(8);

        let mut get_nodes = self.connection.prepare(
            "SELECT handle, kmer, edges, coverage, colours FROM Nodes ORDER BY handle"
        ).map_err(|x| x.to_string())?;
        let mut rows = get_nodes.query(()).map_err(|x| x.to_string())?;
        while let Some(row) = rows.next().map_err(|x| x.to_string())? {
            let handle: usize = row.get(0).map_err(|x| x.to_string())?;
            let kmer: Vec<u8> = row.get(1).map_err(|x| x.to_string())?;
            let edges: Vec<u8> = row.get(2).map_err(|x| x.to_string())?;
            let coverage: Vec<u8> = row.get(3).map_err(|x| x.to_string())?;
            let colours: Vec<u8> = row.get(4).map_err(|x| x.to_string())?;

            if handle != graph.nodes() {
                return Err(format!("Expected node {}, found node {}", graph.nodes(), handle));
            }
            let bkmer = decode_kmer(&kmer, self.kmer_size).ok_or(format!("Invalid k-mer for node {}", handle))?;
            if edges.len() != edge_cols || coverage.len() != 4 * self.num_of_cols || colours.len() != colset_len {
                return Err(format!("Invalid record for node {}", handle));
            }
            let (node, found) = graph.add_kmer(&bkmer);
            if found || node.key != handle {
                return Err(format!("Duplicate k-mer for node {}", handle));
            }
            for (colour, value) in edges.iter().enumerate() {
                graph.set_edges(handle, colour, *value);
            }
            for (colour, value) in decode_u32s(&coverage).into_iter().enumerate() {
                graph.add_coverage(handle, colour, value);
            }
            for colour in 0..self.num_of_cols {
                if colours[colour / 8] & (1 << (colour % 8)) != 0 {
                    graph.set_colour(handle, colour);
                }
            }
        }
        drop(rows);
        drop(get_nodes);
        if graph.nodes() != self.nodes {
            return Err(format!("Expected {} nodes, found {}", self.nodes, graph.nodes()));
        }

        let mut get_paths = self.connection.prepare(
            "SELECT arena, heads FROM PathStore WHERE id = 0"
        ).map_err(|x| x.to_string())?;
        let parts: Option<(Vec<u8>, Vec<u8>)> = get_paths.query_row((), |row| {
            Ok((row.get(0)?, row.get(1)?))
        }).optional().map_err(|x| x.to_string())?;
        let (arena, heads) = parts.ok_or(String::from("Missing path store"))?;
        if heads.len() % 8 != 0 {
            return Err(format!("Invalid path store heads of {} bytes", heads.len()));
        }
        let heads: Vec<PathIndex> = decode_u64s(&heads);
        let paths = PathStore::from_parts(self.num_of_cols, arena, heads, self.num_of_paths, self.num_kmers_with_paths);
        graph.set_paths(paths)?;

        Ok(graph)
    }
}

//-----------------------------------------------------------------------------

// Encodings for integers inside blobs.

fn encode_kmer(bkmer: &BinaryKmer) -> Vec<u8> {
    encode_u64s(bkmer.words())
}

fn decode_kmer(bytes: &[u8], kmer_size: usize) -> Option<BinaryKmer> {
    if bytes.len() != 8 * NUM_BKMER_WORDS {
        return None;
    }
    let mut words = [0u64; NUM_BKMER_WORDS];
    for (word, value) in words.iter_mut().zip(decode_u64s(bytes)) {
        *word = value;
    }
    Some(BinaryKmer::from_words(words, kmer_size))
}

fn encode_u64s(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

// Trailing bytes that do not form a full value are ignored.
fn decode_u64s(bytes: &[u8]) -> Vec<u64> {
    bytes.chunks_exact(8).map(|chunk| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        u64::from_le_bytes(buf)
    }).collect()
}

fn encode_u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn decode_u32s(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|chunk| {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(chunk);
        u32::from_le_bytes(buf)
    }).collect()
}

fn encode_bits(values: &[bool]) -> Vec<u8> {
    let mut result = vec![0u8; values.len().div_ceil(8)];
    for (i, _) in values.iter().enumerate().filter(|(_, value)| **value) {
        result[i / 8] |= 1 << (i % 8);
    }
    result
}

//-----------------------------------------------------------------------------
