use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use biql::{
    output::format_rows, parse_query, DatasetStats, Engine, OutputFormat, QueryError,
};
use clap::Parser as ClapParser;

const EXIT_SYNTAX: i32 = 1;
const EXIT_DATASET: i32 = 2;
const EXIT_OUTPUT: i32 = 3;
const EXIT_ARGUMENT: i32 = 4;

#[derive(ClapParser)]
#[command(name = "biql")]
#[command(about = "BIQL - query BIDS datasets with a SQL-like language")]
#[command(version)]
struct Cli {
    /// The BIQL query to run
    query: Option<String>,

    /// Dataset root (default: $BIQL_DATASET_PATH, then the current directory)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Output format: json, table, csv, tsv, or paths
    /// (default: $BIQL_OUTPUT_FORMAT, then json)
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check query syntax and report the verdict
    #[arg(short = 'v', long)]
    validate: bool,

    /// Check query syntax; only the exit status reports the verdict
    #[arg(long)]
    validate_only: bool,

    /// Append dataset statistics to the output
    #[arg(long)]
    show_stats: bool,

    /// List available entities and their distinct values
    #[arg(long)]
    show_entities: bool,

    /// Print the parsed query and collected warnings on stderr
    #[arg(long)]
    debug: bool,

    /// Print timing information on stderr
    #[arg(long)]
    profile: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => EXIT_ARGUMENT,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    // Validation modes need no dataset
    if cli.validate || cli.validate_only {
        let query = match &cli.query {
            Some(query) => query,
            None => {
                eprintln!("error: a query argument is required for validation");
                return EXIT_ARGUMENT;
            }
        };
        return match parse_query(query) {
            Ok(_) => {
                if cli.validate {
                    println!("Query syntax is valid");
                }
                0
            }
            Err(e) => {
                if cli.validate {
                    eprintln!("syntax error: {}", e);
                }
                EXIT_SYNTAX
            }
        };
    }

    if cli.query.is_none() && !cli.show_stats && !cli.show_entities {
        eprintln!("error: no query given (try --help)");
        return EXIT_ARGUMENT;
    }

    let default_format = match resolve_format(cli.format.as_deref()) {
        Ok(format) => format,
        Err(name) => {
            eprintln!(
                "error: unknown format '{}' (expected json, table, csv, tsv, or paths)",
                name
            );
            return EXIT_ARGUMENT;
        }
    };

    let root = cli
        .dataset
        .clone()
        .or_else(|| std::env::var("BIQL_DATASET_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let index_start = Instant::now();
    let engine = match Engine::build(&root) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_DATASET;
        }
    };
    if cli.profile {
        eprintln!(
            "indexed {} files in {:.1?}",
            engine.dataset_stats().total_files,
            index_start.elapsed()
        );
    }
    if cli.debug {
        for warning in engine.index_warnings() {
            eprintln!("warning: {}", warning);
        }
    }

    let mut sections: Vec<String> = Vec::new();

    if let Some(query_text) = &cli.query {
        let query = match engine.parse(query_text) {
            Ok(query) => query,
            Err(e) => {
                eprintln!("syntax error: {}", e);
                return EXIT_SYNTAX;
            }
        };
        if cli.debug {
            eprintln!("{:#?}", query);
        }

        let format = query.format.unwrap_or(default_format);
        let query_start = Instant::now();
        let rendered = if format == OutputFormat::Paths {
            Ok(engine.matching_paths(&query).join("\n"))
        } else {
            let result = engine.evaluate(&query);
            if cli.debug {
                for warning in &result.warnings {
                    eprintln!("warning: {}", warning);
                }
            }
            format_rows(&result.rows, format).map_err(QueryError::from)
        };
        if cli.profile {
            eprintln!("query ran in {:.1?}", query_start.elapsed());
        }

        match rendered {
            Ok(text) => sections.push(text),
            Err(e) => {
                eprintln!("error: {}", e);
                return EXIT_OUTPUT;
            }
        }
    }

    if cli.show_stats {
        sections.push(render_stats(&engine.dataset_stats()));
    }

    if cli.show_entities {
        let mut lines = vec!["Entities:".to_string()];
        for (entity, values) in engine.entity_values() {
            lines.push(format!("  {}: {}", entity, values.join(", ")));
        }
        sections.push(lines.join("\n"));
    }

    let text = sections.join("\n\n");
    if let Err(e) = write_output(&text, cli.output.as_deref()) {
        eprintln!("error: writing output failed: {}", e);
        return EXIT_OUTPUT;
    }
    0
}

fn resolve_format(arg: Option<&str>) -> Result<OutputFormat, String> {
    let name = match arg {
        Some(name) => name.to_string(),
        None => match std::env::var("BIQL_OUTPUT_FORMAT") {
            Ok(name) => name,
            Err(_) => return Ok(OutputFormat::Json),
        },
    };
    OutputFormat::from_name(&name).ok_or(name)
}

fn render_stats(stats: &DatasetStats) -> String {
    let mut lines = Vec::new();
    lines.push("Dataset statistics:".to_string());
    lines.push(format!("  Total files: {}", stats.total_files));
    lines.push(format!("  Total subjects: {}", stats.total_subjects));
    lines.push(format!("  Subjects: {}", stats.subjects.join(", ")));
    lines.push(format!("  Datatypes: {}", stats.datatypes.join(", ")));
    lines.push("  Files by datatype:".to_string());
    for (datatype, count) in &stats.files_by_datatype {
        lines.push(format!("    {}: {}", datatype, count));
    }
    lines.join("\n")
}

fn write_output(text: &str, target: Option<&std::path::Path>) -> std::io::Result<()> {
    match target {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            writeln!(file, "{}", text)
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text)
        }
    }
}
