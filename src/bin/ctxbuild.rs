use std::time::Instant;
use std::{env, fs, process};

use ctx_graph::{BuildParams, BuildStats, ColourLayout, GraphBase, GraphBuilder};
use ctx_graph::utils;
use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();

    // Check if the database already exists.
    if utils::file_exists(&config.db_file) {
        if config.overwrite {
            eprintln!("Overwriting database {}", config.db_file);
            fs::remove_file(&config.db_file).map_err(|x| x.to_string())?;
        } else {
            return Err(format!("Database {} already exists", config.db_file));
        }
    }

    // Determine the colours.
    let sources = resolve_sources(&config)?;
    let names: Vec<String> = sources.iter().flat_map(|source| source.names.iter().cloned()).collect();
    eprintln!(
        "Building a {}-colour graph with k = {} ({} edges)",
        names.len(), config.params.kmer_size, config.params.layout
    );

    // Load the colours.
    let mut builder = GraphBuilder::new(config.params.clone(), names.len())?;
    let mut colour = 0;
    for source in sources.iter() {
        match &source.kind {
            SourceKind::Reads(inputs) => {
                eprintln!("Loading sample {} into colour {}", source.names[0], colour);
                for input in inputs.iter() {
                    match input {
                        Input::Single(filename) => builder.load_file(colour, filename)?,
                        Input::Paired { file1, file2, remove_pcr } => {
                            builder.set_remove_pcr(*remove_pcr);
                            builder.load_paired_files(colour, file1, file2)?;
                        },
                    }
                }
                let stats = builder.stats(colour);
                eprintln!(
                    "Sample {}: {} reads, {} k-mers, {} PCR duplicate pairs",
                    source.names[0], stats.reads, stats.kmers, stats.duplicates
                );
                if stats.reads == 0 {
                    eprintln!("Warning: colour {} is empty", colour);
                }
                colour += 1;
            },
            SourceKind::Graph(database, colours) => {
                eprintln!(
                    "Loading {} colours from {} into colours {}..{}",
                    colours.len(), source.filename, colour, colour + colours.len()
                );
                let graph = database.load()?;
                let pairs: Vec<(usize, usize)> = colours.iter().enumerate().map(|(i, from)| (*from, colour + i)).collect();
                builder.load_graph(&graph, database.stats(), &pairs)?;
                colour += colours.len();
            },
        }
    }
    let stats: Vec<BuildStats> = (0..names.len()).map(|colour| *builder.stats(colour)).collect();
    let graph = builder.into_graph();
    eprintln!("The graph contains {} nodes", graph.nodes());

    // Create the database.
    GraphBase::create(&graph, &names, &stats, &config.db_file)?;
    let database = GraphBase::open(&config.db_file)?;
    if let Some(size) = database.file_size() {
        eprintln!("Database size: {}", size);
    }

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

enum SourceKind {
    Reads(Vec<Input>),
    // An existing database and the colours loaded from it.
    Graph(GraphBase, Vec<usize>),
}

// A source for one or more consecutive colours.
struct Source {
    pub filename: String,
    pub names: Vec<String>,
    pub kind: SourceKind,
}

// Opens the existing databases and determines the colours they provide.
fn resolve_sources(config: &Config) -> Result<Vec<Source>, String> {
    let mut result = Vec::new();
    for colour in config.colours.iter() {
        match colour {
            ColourArg::Sample(sample) => {
                result.push(Source {
                    filename: String::new(),
                    names: vec![sample.name.clone()],
                    kind: SourceKind::Reads(sample.inputs.clone()),
                });
            },
            ColourArg::Binary(filename, colours) => {
                let database = GraphBase::open(filename).map_err(|x| format!("{}: {}", filename, x))?;
                if database.kmer_size() != config.params.kmer_size {
                    return Err(format!(
                        "Database {} has k = {}, expected {}",
                        filename, database.kmer_size(), config.params.kmer_size
                    ));
                }
                let colours = colours.clone().unwrap_or_else(|| (0..database.num_of_cols()).collect());
                if let Some(colour) = colours.iter().find(|colour| **colour >= database.num_of_cols()) {
                    return Err(format!("Database {} has no colour {}", filename, colour));
                }
                let names = colours.iter().map(|colour| database.samples()[*colour].clone()).collect();
                result.push(Source {
                    filename: filename.clone(),
                    names,
                    kind: SourceKind::Graph(database, colours),
                });
            },
        }
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

#[derive(Clone)]
enum Input {
    Single(String),
    Paired { file1: String, file2: String, remove_pcr: bool },
}

struct Sample {
    pub name: String,
    pub inputs: Vec<Input>,
}

enum ColourArg {
    Sample(Sample),
    Binary(String, Option<Vec<usize>>),
}

struct Config {
    pub params: BuildParams,
    pub colours: Vec<ColourArg>,
    pub db_file: String,
    pub overwrite: bool,
}

impl Config {
    const DEFAULT_FQ_OFFSET: usize = 33;

    fn usage_and_exit(program: &str, opts: &Options, code: i32) -> ! {
        let header = format!("Usage: {} [options] --sample NAME --seq FILE [--sample NAME --seq2 FILE1,FILE2 ...]", program);
        eprint!("{}", opts.usage(&header));
        eprintln!();
        eprintln!("Sequence files are loaded into the colour of the last --sample before them.");
        eprintln!("Files may be FASTA or FASTQ, optionally gzip-compressed.");
        eprintln!("--remove_pcr and --keep_pcr apply to the --seq2 options after them.");
        eprintln!("--load_binary graph.db:0,6-8 loads colours 0, 6, 7, and 8 of graph.db as new colours.");
        process::exit(code);
    }

    fn parse_number(matches: &getopts::Matches, name: &str, default: usize) -> usize {
        match matches.opt_str(name) {
            Some(s) => match s.parse::<usize>() {
                Ok(n) => n,
                Err(f) => {
                    eprintln!("--{}: {}", name, f);
                    process::exit(1);
                },
            },
            None => default,
        }
    }

    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("k", "kmer-size", &format!("k-mer size (default: {})", BuildParams::KMER_SIZE), "INT");
        opts.optopt("", "layout", "edge layout: per-colour, merged-presence, merged-coverage (default: per-colour)", "NAME");
        opts.optopt("", "fq_threshold", "filter bases with quality below this (default: 0 = off)", "INT");
        opts.optopt("", "fq_offset", &format!("FASTQ quality offset (default: {})", Self::DEFAULT_FQ_OFFSET), "INT");
        opts.optopt("", "cut_hp", "break reads at homopolymers of at least this length (default: 0 = off)", "INT");
        opts.optflagmulti("", "remove_pcr", "skip read pairs where both reads start at the same k-mers as an earlier pair");
        opts.optflagmulti("", "keep_pcr", "keep PCR duplicate pairs (default)");
        opts.optmulti("", "sample", "start a new colour with this sample name", "NAME");
        opts.optmulti("", "seq", "load reads from this file", "FILE");
        opts.optmulti("", "seq2", "load read pairs from these files", "FILE1,FILE2");
        opts.optmulti("", "load_binary", "load colours from an existing database as new colours", "DB[:COLS]");
        opts.optopt("o", "output", "output file name (required)", "FILE");
        opts.optflag("", "overwrite", "overwrite the database file if it exists");
        opts.optflag("v", "verbose", "print statistics for each input file");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            Self::usage_and_exit(&program, &opts, 0);
        }

        let mut params = BuildParams::default();
        params.kmer_size = Self::parse_number(&matches, "k", BuildParams::KMER_SIZE);
        if let Some(s) = matches.opt_str("layout") {
            params.layout = match ColourLayout::from_name(&s) {
                Ok(layout) => layout,
                Err(f) => {
                    eprintln!("{}", f);
                    process::exit(1);
                },
            };
        }
        let threshold = Self::parse_number(&matches, "fq_threshold", 0);
        let offset = Self::parse_number(&matches, "fq_offset", Self::DEFAULT_FQ_OFFSET);
        if threshold > 0 {
            if threshold + offset > u8::MAX as usize {
                eprintln!("Quality cutoff {} + {} is too large", threshold, offset);
                process::exit(1);
            }
            params.qcutoff = (threshold + offset) as u8;
        }
        params.hp_cutoff = Self::parse_number(&matches, "cut_hp", 0);
        params.verbose = matches.opt_present("v");

        // Process the colour and input options in command line order.
        let mut events: Vec<(usize, &str, String)> = Vec::new();
        for name in ["sample", "seq", "seq2", "load_binary"] {
            for (pos, value) in matches.opt_strs_pos(name) {
                events.push((pos, name, value));
            }
        }
        for name in ["remove_pcr", "keep_pcr"] {
            for pos in matches.opt_positions(name) {
                events.push((pos, name, String::new()));
            }
        }
        events.sort_by_key(|(pos, _, _)| *pos);

        let mut colours: Vec<ColourArg> = Vec::new();
        let mut remove_pcr = false;
        for (_, name, value) in events {
            match name {
                "sample" => {
                    colours.push(ColourArg::Sample(Sample { name: value, inputs: Vec::new() }));
                    continue;
                },
                "load_binary" => {
                    match utils::parse_graph_arg(&value) {
                        Ok((filename, list)) => colours.push(ColourArg::Binary(filename.to_string(), list)),
                        Err(f) => {
                            eprintln!("--load_binary: {}", f);
                            process::exit(1);
                        },
                    }
                    continue;
                },
                "remove_pcr" => {
                    remove_pcr = true;
                    continue;
                },
                "keep_pcr" => {
                    remove_pcr = false;
                    continue;
                },
                _ => {},
            }

            let sample = match colours.last_mut() {
                Some(ColourArg::Sample(sample)) => sample,
                _ => {
                    eprintln!("Please use --sample NAME before giving sequence files");
                    process::exit(1);
                },
            };
            if name == "seq" {
                sample.inputs.push(Input::Single(value));
            } else {
                match value.split_once(',') {
                    Some((file1, file2)) => sample.inputs.push(Input::Paired {
                        file1: file1.to_string(),
                        file2: file2.to_string(),
                        remove_pcr,
                    }),
                    None => {
                        eprintln!("--seq2 requires two comma-separated files: {}", value);
                        process::exit(1);
                    },
                }
            }
        }
        if colours.is_empty() {
            Self::usage_and_exit(&program, &opts, 1);
        }

        let db_file = match matches.opt_str("o") {
            Some(s) => s,
            None => Self::usage_and_exit(&program, &opts, 1),
        };
        let overwrite = matches.opt_present("overwrite");

        Config {
            params,
            colours,
            db_file,
            overwrite,
        }
    }
}

//-----------------------------------------------------------------------------
