use std::path::PathBuf;
use std::process;

use siderfreq::{run, LabelPolicy, PipelineConfig, TermType, DEFAULT_LOG_FILTER};
use tracing_subscriber::EnvFilter;

/// Command-line flags. Values given here override the config file.
#[derive(Default)]
struct Args {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    term_type: Option<TermType>,
    strict_labels: bool,
    no_indications: bool,
}

fn usage_error(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("run `siderfreq --help` for usage");
    process::exit(2);
}

fn print_help() {
    println!("siderfreq - SIDER side-effect frequency reconciliation");
    println!();
    println!("USAGE:");
    println!("    siderfreq [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       JSON pipeline configuration");
    println!("    -d, --data-dir <DIR>      Directory holding the SIDER dumps");
    println!("    -o, --output-dir <DIR>    Directory receiving the JSON outputs");
    println!("    -t, --term-type <TYPE>    MedDRA term type, PT or LLT [default: PT]");
    println!("        --strict-labels       Fail on unrecognized frequency labels");
    println!("        --no-indications      Skip indications.json");
    println!("    -h, --help                Print help information");
    println!();
    println!("Logging is controlled by RUST_LOG [default: {DEFAULT_LOG_FILTER}].");
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .unwrap_or_else(|| usage_error(&format!("{flag} requires a value")))
        };
        match flag {
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value())),
            "--data-dir" | "-d" => parsed.data_dir = Some(PathBuf::from(value())),
            "--output-dir" | "-o" => parsed.output_dir = Some(PathBuf::from(value())),
            "--term-type" | "-t" => {
                let raw = value();
                let term_type = raw
                    .parse()
                    .unwrap_or_else(|err| usage_error(&format!("{err}")));
                parsed.term_type = Some(term_type);
            }
            "--strict-labels" => parsed.strict_labels = true,
            "--no-indications" => parsed.no_indications = true,
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            arg => usage_error(&format!("unknown argument: {arg}")),
        }
        i += 1;
    }

    parsed
}

fn build_config(args: Args) -> Result<PipelineConfig, siderfreq::SiderError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(term_type) = args.term_type {
        config.term_type = term_type;
    }
    if args.strict_labels {
        config.label_policy = LabelPolicy::Strict;
    }
    if args.no_indications {
        config.include_indications = false;
    }
    Ok(config.validate()?)
}

fn main() {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = build_config(args).and_then(|config| run(&config));
    match outcome {
        Ok(report) => println!("{}", report.summary()),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}
