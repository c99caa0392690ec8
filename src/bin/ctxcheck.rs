use std::io::{self, BufWriter, Write};
use std::time::Instant;
use std::{env, process};

use ctx_graph::{DeBruijnGraph, GraphBase};
use ctx_graph::edges;
use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new()?;

    // Load the graph.
    let database = GraphBase::open(&config.db_file)?;
    eprintln!("Database {} ({})", config.db_file, database.version());
    if let Some(size) = database.file_size() {
        eprintln!("File size: {}", size);
    }
    let graph = database.load()?;
    eprintln!(
        "The graph contains {} nodes with k = {} ({} edges)",
        graph.nodes(), graph.kmer_size(), graph.layout()
    );

    // Colour statistics.
    for (colour, (sample, stats)) in database.samples().iter().zip(database.stats()).enumerate() {
        let (nodes, coverage) = colour_stats(&graph, colour);
        eprintln!("Colour {} ({}): {} nodes, total coverage {}", colour, sample, nodes, coverage);
        eprintln!(
            "  Loaded {} reads, {} contigs, {} bases, {} k-mers ({} PCR duplicate pairs)",
            stats.reads, stats.contigs, stats.bases, stats.kmers, stats.duplicates
        );
    }

    // Paths.
    let stats = graph.check_all_paths()?;
    eprintln!(
        "Validated {} paths for {} nodes: {} walks, {} bases",
        stats.num_of_paths, stats.num_kmers_with_paths, stats.num_of_walks, stats.num_of_bases
    );

    if config.dump {
        let mut output = BufWriter::new(io::stdout().lock());
        dump_nodes(&graph, &mut output).map_err(|x| x.to_string())?;
        output.flush().map_err(|x| x.to_string())?;
    }

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

fn colour_stats(graph: &DeBruijnGraph, colour: usize) -> (usize, u64) {
    let mut nodes = 0;
    let mut coverage: u64 = 0;
    for handle in 0..graph.nodes() {
        if graph.has_colour(handle, colour) {
            nodes += 1;
        }
        coverage += graph.coverage(handle, colour) as u64;
    }
    (nodes, coverage)
}

// One line per node: handle, k-mer, edges for each track, and coverage for each colour.
fn dump_nodes<T: Write>(graph: &DeBruijnGraph, output: &mut T) -> io::Result<()> {
    for handle in 0..graph.nodes() {
        write!(output, "{}\t{}", handle, graph.bkmer(handle).display(graph.kmer_size()))?;
        for colour in 0..graph.num_edge_cols() {
            write!(output, "\t{}", edges::to_display_string(graph.edges(handle, colour)))?;
        }
        for colour in 0..graph.num_of_cols() {
            write!(output, "\t{}", graph.coverage(handle, colour))?;
        }
        writeln!(output)?;
    }
    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: String,
    pub dump: bool,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optflag("d", "dump", "write the nodes to stdout");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] graph.db", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }

        let db_file = if let Some(s) = matches.free.first() {
            s.clone()
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        Ok(Config {
            db_file,
            dump: matches.opt_present("d"),
        })
    }
}

//-----------------------------------------------------------------------------
