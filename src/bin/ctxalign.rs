use std::io::{self, BufWriter, Write};
use std::time::Instant;
use std::{env, process};

use ctx_graph::{DbAlignment, DeBruijnGraph, GraphBase, Read};
use ctx_graph::reads::SequenceReader;
use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new()?;

    // Load the graph.
    eprintln!("Loading graph {}", config.db_file);
    let database = GraphBase::open(&config.db_file)?;
    let graph = database.load()?;
    eprintln!(
        "The graph contains {} nodes with k = {} in {} colours",
        graph.nodes(), graph.kmer_size(), graph.num_of_cols()
    );

    // Align the reads.
    let mut output = BufWriter::new(io::stdout().lock());
    let mut stats = AlignmentStats::default();
    let mut alignment = DbAlignment::new();
    match &config.file2 {
        Some(file2) => {
            let mut reader1 = SequenceReader::open(&config.file1)?;
            let mut reader2 = SequenceReader::open(file2)?;
            loop {
                match (reader1.read_next()?, reader2.read_next()?) {
                    (Some(r1), Some(r2)) => {
                        align_and_write(&mut alignment, &r1, Some(&r2), &config, &graph, &mut output, &mut stats)?;
                    },
                    (None, None) => break,
                    _ => return Err(format!("Files {} and {} contain a different number of reads", config.file1, file2)),
                }
            }
        },
        None => {
            let reader = SequenceReader::open(&config.file1)?;
            for read in reader {
                let read = read?;
                align_and_write(&mut alignment, &read, None, &config, &graph, &mut output, &mut stats)?;
            }
        },
    }
    output.flush().map_err(|x| x.to_string())?;

    // Statistics.
    eprintln!(
        "Aligned {} reads: {} nodes, {} alignments with sequence gaps, {} unused reads",
        stats.reads, stats.nodes, stats.with_gaps, stats.unused
    );

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AlignmentStats {
    reads: usize,
    nodes: usize,
    with_gaps: usize,
    unused: usize,
}

fn align_and_write<T: Write>(
    alignment: &mut DbAlignment, r1: &Read, r2: Option<&Read>,
    config: &Config, graph: &DeBruijnGraph,
    output: &mut T, stats: &mut AlignmentStats
) -> Result<(), String> {
    alignment.from_reads(r1, r2, config.qcutoff, config.qcutoff, config.hp_cutoff, graph);
    stats.reads += if r2.is_some() { 2 } else { 1 };
    stats.nodes += alignment.len();
    if alignment.seq_gaps {
        stats.with_gaps += 1;
    }
    if !alignment.used_r1 {
        stats.unused += 1;
    }
    if alignment.passed_r2 && !alignment.used_r2 {
        stats.unused += 1;
    }

    let header = match r2 {
        Some(r2) => writeln!(output, ">{} {}", r1.name, r2.name),
        None => writeln!(output, ">{}", r1.name),
    };
    header.map_err(|x| x.to_string())?;
    alignment.write_alignment(graph, output).map_err(|x| x.to_string())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: String,
    pub file1: String,
    pub file2: Option<String>,
    pub qcutoff: u8,
    pub hp_cutoff: usize,
}

impl Config {
    const DEFAULT_FQ_OFFSET: usize = 33;

    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("", "fq_threshold", "filter bases with quality below this (default: 0 = off)", "INT");
        opts.optopt("", "fq_offset", &format!("FASTQ quality offset (default: {})", Self::DEFAULT_FQ_OFFSET), "INT");
        opts.optopt("", "cut_hp", "break reads at homopolymers of at least this length (default: 0 = off)", "INT");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] graph.db reads1 [reads2]", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }

        let mut threshold: usize = 0;
        let mut offset: usize = Self::DEFAULT_FQ_OFFSET;
        let mut hp_cutoff: usize = 0;
        if let Some(s) = matches.opt_str("fq_threshold") {
            threshold = s.parse::<usize>().map_err(|x| format!("--fq_threshold: {}", x))?;
        }
        if let Some(s) = matches.opt_str("fq_offset") {
            offset = s.parse::<usize>().map_err(|x| format!("--fq_offset: {}", x))?;
        }
        if let Some(s) = matches.opt_str("cut_hp") {
            hp_cutoff = s.parse::<usize>().map_err(|x| format!("--cut_hp: {}", x))?;
        }
        let qcutoff = if threshold > 0 {
            u8::try_from(threshold + offset).map_err(|_| format!("Quality cutoff {} + {} is too large", threshold, offset))?
        } else {
            0
        };

        if matches.free.len() < 2 || matches.free.len() > 3 {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        }

        Ok(Config {
            db_file: matches.free[0].clone(),
            file1: matches.free[1].clone(),
            file2: matches.free.get(2).cloned(),
            qcutoff,
            hp_cutoff,
        })
    }
}

//-----------------------------------------------------------------------------
