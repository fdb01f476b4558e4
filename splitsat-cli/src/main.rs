use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context as _, Error};
use clap::{App, Arg, ArgGroup, ArgMatches};
use env_logger::{Builder, Target};
use log::{error, info, Level, LevelFilter};

use splitsat::factor::{Factorizer, Multiplier};
use splitsat::solver::{Outcome, Solver};
use splitsat::{NormalForm, SolverConfig, SplitPolicy};
use splitsat_dimacs::oneline::parse_oneline;
use splitsat_formula::Set;

/// Exit code for failed solves and rejected input data.
const EXIT_FAILURE: i32 = 1;
/// Exit code for command line usage errors.
const EXIT_USAGE: i32 = 3;

const NORMAL_FORMS: [&str; 5] = ["flo", "flop", "lo", "lou", "normal"];

/// Multi-character single-dash spellings kept from the original front-end.
///
/// clap 2 short flags are single characters, so these are rewritten onto their long options
/// before parsing; `-sm lou`, `--sm lou` and `--start-mode lou` all mean the same thing.
const SHORT_SPELLINGS: [(&str, &str); 9] = [
    ("-lf", "--line-input-file"),
    ("-sm", "--start-mode"),
    ("-rdb", "--use-runtime-db"),
    ("-gdb", "--use-global-db"),
    ("-gnm", "--gdb-no-mem"),
    ("-ns", "--no-stats"),
    ("-thief", "--thief-method"),
    ("-fact", "--factorize"),
    ("-mult", "--multiply"),
];

/// The process arguments with the spellings of [`SHORT_SPELLINGS`] replaced by their long form.
///
/// Both `-sm lou` and `-sm=lou` are rewritten; anything else is passed through untouched.
fn normalized_args() -> Vec<OsString> {
    env::args_os()
        .enumerate()
        .map(|(position, arg)| {
            if position == 0 {
                return arg;
            }
            let text = match arg.to_str() {
                Some(text) => text,
                None => return arg,
            };
            for &(short, long) in SHORT_SPELLINGS.iter() {
                if text == short {
                    return long.into();
                }
                if text.starts_with(short) && text[short.len()..].starts_with('=') {
                    return format!("{}{}", long, &text[short.len()..]).into();
                }
            }
            arg
        })
        .collect()
}

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{:#}", err);
            EXIT_FAILURE
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging(level: LevelFilter) {
    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(|buf, record| {
            if record.level() == Level::Info {
                writeln!(buf, "c {}", record.args())
            } else {
                writeln!(buf, "c {}: {}", record.level(), record.args())
            }
        })
        .filter(None, level);

    if let Ok(ref env_var) = env::var("SPLITSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is splitsat {}", env!("SPLITSAT_VERSION"));
    info!(
        "  {} build - {}",
        env!("SPLITSAT_PROFILE"),
        env!("SPLITSAT_RUSTC_VERSION")
    );
}

fn app() -> App<'static, 'static> {
    App::new("splitsat")
        .version(env!("SPLITSAT_VERSION"))
        .about("A parallel, memoizing splitting SAT solver")
        .arg(
            Arg::with_name("line-input")
                .short("l")
                .long("line-input")
                .value_name("SET")
                .help("Input set on one line. Format: 1|-2|3&-1|2"),
        )
        .arg(
            Arg::with_name("line-input-file")
                .long("line-input-file")
                .visible_alias("lf")
                .value_name("FILE")
                .help("File containing the set in one-line format"),
        )
        .arg(
            Arg::with_name("dimacs")
                .short("d")
                .long("dimacs")
                .value_name("FILE")
                .help("File containing the set in DIMACS CNF format"),
        )
        .arg(
            Arg::with_name("factorize")
                .long("factorize")
                .visible_alias("fact")
                .value_name("N")
                .help("Factorize the given number if it is not prime"),
        )
        .arg(
            Arg::with_name("multiply")
                .long("multiply")
                .visible_alias("mult")
                .value_names(&["A", "B"])
                .number_of_values(2)
                .help("Multiply two numbers through the multiplier circuit"),
        )
        .group(
            ArgGroup::with_name("input")
                .args(&[
                    "line-input",
                    "line-input-file",
                    "dimacs",
                    "factorize",
                    "multiply",
                ])
                .required(true),
        )
        .arg(
            Arg::with_name("mode")
                .short("m")
                .long("mode")
                .possible_values(&NORMAL_FORMS)
                .case_insensitive(true)
                .help(
                    "Normal form applied to every node: flo (fixed-point L.O., default), flop \
                     (flo with short clauses first), lo, lou (renamed, unsorted), normal",
                ),
        )
        .arg(
            Arg::with_name("start-mode")
                .long("start-mode")
                .visible_alias("sm")
                .possible_values(&NORMAL_FORMS)
                .case_insensitive(true)
                .help("Normal form used while preparing sub-problems (defaults to --mode)"),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .value_name("W")
                .validator(|value| {
                    value
                        .parse::<usize>()
                        .map(|_| ())
                        .map_err(|_| "must be a non-negative number".to_string())
                })
                .help("Number of worker threads. 0 = all CPUs, 1 = no multithreading"),
        )
        .arg(
            Arg::with_name("exit-upon-solving")
                .short("e")
                .long("exit-upon-solving")
                .help("Exit as soon as a solution is found"),
        )
        .arg(
            Arg::with_name("verify")
                .long("verify")
                .help("Verify the solution at the end, if any"),
        )
        .arg(
            Arg::with_name("use-runtime-db")
                .long("use-runtime-db")
                .visible_alias("rdb")
                .help("Memoize nodes for the current solve (enabled by default)"),
        )
        .arg(
            Arg::with_name("no-runtime-db")
                .long("no-runtime-db")
                .conflicts_with("use-runtime-db")
                .help("Disable node memoization; the DAG degenerates into a tree"),
        )
        .arg(
            Arg::with_name("use-global-db")
                .long("use-global-db")
                .visible_alias("gdb")
                .help("Use the persistent fingerprint store across solves"),
        )
        .arg(
            Arg::with_name("global-db-path")
                .long("global-db-path")
                .value_name("FILE")
                .requires("use-global-db")
                .help("Location of the persistent fingerprint store"),
        )
        .arg(
            Arg::with_name("gdb-no-mem")
                .long("gdb-no-mem")
                .visible_alias("gnm")
                .requires("use-global-db")
                .help("Don't mirror the persistent store's keys in memory (slower)"),
        )
        .arg(
            Arg::with_name("sort-by-size")
                .short("z")
                .long("sort-by-size")
                .help("Always sort clauses by size in ascending order"),
        )
        .arg(
            Arg::with_name("thief-method")
                .long("thief-method")
                .visible_alias("thief")
                .help("Split on the most frequent variable; effective on factorization inputs"),
        )
        .arg(
            Arg::with_name("output-solution-file")
                .short("s")
                .long("output-solution-file")
                .help("Write a solution file next to the input"),
        )
        .arg(
            Arg::with_name("output-graph-file")
                .short("g")
                .long("output-graph-file")
                .value_name("FILE")
                .help("Write the node DAG in Graphviz format"),
        )
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .value_name("FILE")
                .help("Read solver options from a TOML file; flags override it"),
        )
        .arg(
            Arg::with_name("no-stats")
                .long("no-stats")
                .visible_alias("ns")
                .help("Short concise output without statistics"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .conflicts_with("quiet")
                .help("Verbose output; twice for debug output"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Quiet mode"),
        )
}

fn main_with_err() -> Result<i32, Error> {
    let matches = match app().get_matches_from_safe(normalized_args()) {
        Ok(matches) => matches,
        Err(err) => {
            return match err.kind {
                clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => {
                    println!("{}", err.message);
                    Ok(0)
                }
                _ => {
                    eprintln!("{}", err.message);
                    Ok(EXIT_USAGE)
                }
            };
        }
    };

    let level = if matches.is_present("quiet") {
        LevelFilter::Error
    } else {
        match matches.occurrences_of("verbose") {
            0 => {
                if matches.is_present("no-stats") {
                    LevelFilter::Warn
                } else {
                    LevelFilter::Info
                }
            }
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };
    init_logging(level);
    banner();

    let config = match build_config(&matches)? {
        Ok(config) => config,
        Err(usage) => {
            eprintln!("error: {}", usage);
            return Ok(EXIT_USAGE);
        }
    };

    if let Some(values) = matches.values_of("multiply") {
        let operands: Vec<&str> = values.collect();
        return run_multiply(&matches, config, operands[0], operands[1]);
    }
    if let Some(n) = matches.value_of("factorize") {
        return run_factorize(&matches, config, n);
    }

    let (set, input_stem) = read_input(&matches)?;
    run_solve(&matches, config, set, input_stem)
}

/// Merge the defaults, the optional config file and the command line flags.
///
/// The inner `Err` is a usage problem (exit 3), the outer one a real failure.
fn build_config(matches: &ArgMatches) -> Result<Result<SolverConfig, String>, Error> {
    let mut config = match matches.value_of("config-file") {
        Some(path) => {
            let mut contents = String::new();
            fs::File::open(path)
                .and_then(|mut file| file.read_to_string(&mut contents))
                .with_context(|| format!("cannot read config file '{}'", path))?;
            toml::from_str(&contents)
                .with_context(|| format!("cannot parse config file '{}'", path))?
        }
        None => SolverConfig::default(),
    };

    if let Some(mode) = matches.value_of("mode") {
        config.mode = match mode.to_ascii_lowercase().parse::<NormalForm>() {
            Ok(mode) => mode,
            Err(err) => return Ok(Err(err)),
        };
    }
    if let Some(mode) = matches.value_of("start-mode") {
        config.start_mode = match mode.to_ascii_lowercase().parse::<NormalForm>() {
            Ok(mode) => Some(mode),
            Err(err) => return Ok(Err(err)),
        };
    }
    if let Some(threads) = matches.value_of("threads") {
        config.threads = match threads.parse() {
            Ok(threads) => threads,
            Err(_) => return Ok(Err("option -t must be a non-negative number".to_string())),
        };
    }
    if matches.is_present("exit-upon-solving") {
        config.exit_upon_solving = true;
    }
    if matches.is_present("verify") {
        config.verify = true;
    }
    if matches.is_present("no-runtime-db") {
        config.use_runtime_db = false;
    }
    if matches.is_present("use-global-db") {
        config.use_global_db = true;
    }
    if let Some(path) = matches.value_of("global-db-path") {
        config.global_db_path = path.into();
    }
    if matches.is_present("gdb-no-mem") {
        config.gdb_no_mem = true;
    }
    if matches.is_present("sort-by-size") {
        config.sort_by_size = true;
    }
    if matches.is_present("thief-method") {
        config.split_policy = SplitPolicy::Thief;
    }

    Ok(Ok(config))
}

/// Read the formula from whichever input option was given.
fn read_input(matches: &ArgMatches) -> Result<(Set, Option<String>), Error> {
    if let Some(line) = matches.value_of("line-input") {
        let set = parse_oneline(line)?;
        return Ok((set, None));
    }
    if let Some(path) = matches.value_of("line-input-file") {
        let contents =
            fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path))?;
        let line = contents
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| anyhow!("'{}' contains no formula", path))?;
        let set = parse_oneline(line).with_context(|| format!("in '{}'", path))?;
        return Ok((set, file_stem(path)));
    }
    if let Some(path) = matches.value_of("dimacs") {
        info!("reading file '{}'", path);
        let file = fs::File::open(path).with_context(|| format!("cannot open '{}'", path))?;
        let set = splitsat_dimacs::DimacsParser::parse(file)
            .with_context(|| format!("in '{}'", path))?;
        return Ok((set, file_stem(path)));
    }
    Err(anyhow!("no input provided"))
}

fn file_stem(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

fn run_solve(
    matches: &ArgMatches,
    config: SolverConfig,
    set: Set,
    input_stem: Option<String>,
) -> Result<i32, Error> {
    let mode = config.mode;
    let mut solver = Solver::with_config(config);
    solver.add_formula(&set);

    let outcome = solver.solve()?;
    print_verdict(&solver, &outcome);

    if matches.is_present("output-solution-file") {
        let stem = input_stem
            .or_else(|| solver.problem_id().map(|id| id.to_string()))
            .unwrap_or_else(|| "splitsat".to_string());
        let file_name = format!("{}_{}.sol", stem, mode.name());
        let mut file = fs::File::create(&file_name)
            .with_context(|| format!("cannot create '{}'", file_name))?;
        solver.write_solution(&mut file)?;
        info!("solution written to: {}", file_name);
    }

    write_graph_file(matches, &solver)?;
    Ok(0)
}

fn run_factorize(matches: &ArgMatches, mut config: SolverConfig, n: &str) -> Result<i32, Error> {
    let n: u64 = match n.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("error: --factorize expects a non-negative number");
            return Ok(EXIT_USAGE);
        }
    };

    // the first factorization is as good as any
    config.exit_upon_solving = true;

    let (set, factorizer) = Factorizer::encode(n);
    let mut solver = Solver::with_config(config);
    solver.add_formula(&set);

    match solver.solve()? {
        Outcome::Sat(assignment) => {
            let factors = factorizer.decode(&assignment);
            println!("{} = {} x {}", n, factors.a, factors.b);
        }
        Outcome::Unsat => {
            println!("{} has no nontrivial factorization", n);
        }
    }

    write_graph_file(matches, &solver)?;
    Ok(0)
}

fn run_multiply(
    matches: &ArgMatches,
    mut config: SolverConfig,
    a: &str,
    b: &str,
) -> Result<i32, Error> {
    let (a, b): (u64, u64) = match (a.parse(), b.parse()) {
        (Ok(a), Ok(b)) if a > 1 && b > 1 => (a, b),
        _ => {
            eprintln!("error: --multiply expects two integers greater than 1");
            return Ok(EXIT_USAGE);
        }
    };

    config.exit_upon_solving = true;

    let (set, multiplier) = Multiplier::encode(a, b);
    if set.value() == Some(false) {
        // a contradiction during operand substitution is a valid (negative) answer
        info!("the input set is not satisfiable with the given factors");
        println!("{} and {} cannot be multiplied on the multiplier circuit", a, b);
        return Ok(0);
    }

    let mut solver = Solver::with_config(config);
    solver.add_formula(&set);

    match solver.solve()? {
        Outcome::Sat(assignment) => {
            let product = multiplier.decode(&assignment);
            println!("{} x {} = {}", a, b, product);
        }
        Outcome::Unsat => {
            info!("the input set is not satisfiable with the given factors");
            println!("{} and {} cannot be multiplied on the multiplier circuit", a, b);
        }
    }

    write_graph_file(matches, &solver)?;
    Ok(0)
}

fn print_verdict(solver: &Solver, outcome: &Outcome) {
    match outcome {
        Outcome::Sat(assignment) => {
            println!("s SATISFIABLE");
            print!("v");
            for (var, value) in assignment.iter() {
                print!(" {}", if value { var.to_dimacs() } else { -var.to_dimacs() });
            }
            println!(" 0");
        }
        Outcome::Unsat => {
            println!("s UNSATISFIABLE");
        }
    }
    if let Some(id) = solver.problem_id() {
        info!("problem id: {}", id);
    }
}

fn write_graph_file(matches: &ArgMatches, solver: &Solver) -> Result<(), Error> {
    if let Some(path) = matches.value_of("output-graph-file") {
        let mut file =
            fs::File::create(path).with_context(|| format!("cannot create '{}'", path))?;
        solver.write_dot(&mut file)?;
        info!("graph written to: {}", path);
    }
    Ok(())
}
