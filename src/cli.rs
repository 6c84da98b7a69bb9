use crate::mapping::MapScoring;
use crate::utils::Result;
use chrono::Datelike;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="varprobe",
          version=&**FULL_VERSION,
          about="Evaluates variant calls by mapping allele probes onto a truth assembly",
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) 2020-{}     varprobe contributors.
This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Annotate variant calls against a truth assembly")]
    Annotate(AnnotateArgs),
    #[clap(about = "Summarize an annotated VCF")]
    Stats(StatsArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("annotate")))]
#[command(arg_required_else_help(true))]
pub struct AnnotateArgs {
    #[clap(required = true)]
    #[clap(short = 'v')]
    #[clap(long = "vcf")]
    #[clap(help = "Single-sample VCF/BCF with the calls to evaluate")]
    #[clap(value_name = "VCF")]
    #[arg(value_parser = check_file_exists)]
    pub vcf_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "vcf-ref")]
    #[clap(help = "Reference FASTA the calls were made against")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub vcf_ref_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "truth")]
    #[clap(help = "Truth assembly FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub truth_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output VCF path (.vcf, .vcf.gz, .bcf)")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: String,

    #[clap(long = "flank-len")]
    #[clap(value_name = "FLANK_LEN")]
    #[clap(help = "Length of reference sequence added on each side of an allele")]
    #[clap(default_value = "100")]
    pub flank_len: usize,

    #[clap(short = 'm')]
    #[clap(long = "truth-mask")]
    #[clap(value_name = "BED")]
    #[clap(help = "BED file (optionally gzipped) of truth positions to exclude from edit distances")]
    #[arg(value_parser = check_file_exists)]
    pub truth_mask_path: Option<PathBuf>,

    #[clap(long = "use-fail-conflict")]
    #[clap(help = "Also evaluate records filtered as FAIL_CONFLICT")]
    pub use_fail_conflict: bool,

    #[clap(long = "use-ref-calls")]
    #[clap(help = "Evaluate homozygous reference calls")]
    pub use_ref_calls: bool,

    #[clap(long = "output-probes")]
    #[clap(help = "Write probe sequences and allele intervals to the output")]
    pub output_probes: bool,

    #[clap(long = "map-log")]
    #[clap(value_name = "LOG")]
    #[clap(help = "Write per-record probe hits to this file")]
    #[arg(value_parser = check_prefix_path)]
    pub map_log_path: Option<String>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "batch-size")]
    #[clap(value_name = "BATCH_SIZE")]
    #[clap(help = "Number of records classified together")]
    #[clap(default_value = "1000")]
    #[arg(value_parser = batch_size_in_range)]
    pub batch_size: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "map-scoring")]
    #[clap(value_name = "SCORING")]
    #[clap(help = "Scoring function to align probes (non-negative values): MATCH,MISM,GAPO,GAPE")]
    #[clap(default_value = "1,1,5,3")]
    #[arg(value_parser = scoring_from_string)]
    pub map_scoring: MapScoring,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "kmer-len")]
    #[clap(value_name = "KMER_LEN")]
    #[clap(help = "Minimizer k-mer length")]
    #[clap(default_value = "15")]
    #[arg(value_parser = kmer_len_in_range)]
    pub kmer_len: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "minimizer-window")]
    #[clap(value_name = "WINDOW")]
    #[clap(help = "Number of consecutive k-mers per minimizer window")]
    #[clap(default_value = "10")]
    pub minimizer_window: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "bandwidth")]
    #[clap(value_name = "BANDWIDTH")]
    #[clap(help = "Band width around seed diagonals for probe alignment")]
    #[clap(default_value = "10")]
    pub bandwidth: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-map-score")]
    #[clap(value_name = "SCORE")]
    #[clap(help = "Minimum alignment score for a probe hit")]
    #[clap(default_value = "30")]
    pub min_map_score: i32,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("stats")))]
#[command(arg_required_else_help(true))]
pub struct StatsArgs {
    #[clap(required = true)]
    #[clap(short = 'v')]
    #[clap(long = "vcf")]
    #[clap(help = "VCF annotated by varprobe")]
    #[clap(value_name = "VCF")]
    #[arg(value_parser = check_file_exists)]
    pub vcf_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn batch_size_in_range(s: &str) -> Result<usize> {
    let size: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid batch size", s))?;
    if size >= 1 {
        Ok(size)
    } else {
        Err("Batch size must be at least 1".into())
    }
}

fn kmer_len_in_range(s: &str) -> Result<usize> {
    let k: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid k-mer length", s))?;
    if (1..=31).contains(&k) {
        Ok(k)
    } else {
        Err(format!("k-mer length must be between 1 and 31, got: {}", k))
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn scoring_from_string(s: &str) -> Result<MapScoring> {
    const NUM_EXPECTED_VALUES: usize = 4;
    let values: Vec<i32> = s.split(',').filter_map(|x| x.parse().ok()).collect();
    if values.len() != NUM_EXPECTED_VALUES {
        return Err(format!(
            "Expected {} comma-separated values in scoring. Got {} -> {}",
            NUM_EXPECTED_VALUES,
            values.len(),
            s
        ));
    }

    if values.iter().any(|&val| val < 0) {
        return Err(format!(
            "Negative values are not allowed in scoring. Got {}.",
            s
        ));
    }

    Ok(MapScoring {
        match_scr: values[0],
        mism_scr: values[1],
        gapo_scr: values[2],
        gape_scr: values[3],
    })
}
