//! mailmerge CLI - fill a PDF template once per data record

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mailmerge::{
    extract_placeholders, Batch, CommitMode, Config, FillOptions, LogDiagnostics, NameOrder, Page,
    PdfTemplate, Template,
};

#[derive(Parser)]
#[command(name = "mailmerge")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Fill a PDF template with spreadsheet records", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Clone, Default)]
struct RunArgs {
    /// Fill records in parallel
    #[arg(long)]
    parallel: bool,

    /// Redact and redraw each occurrence immediately instead of once per page
    #[arg(long)]
    per_occurrence: bool,

    /// Order in which a page's placeholder names are processed
    #[arg(long, value_enum, default_value = "reverse")]
    name_order: Order,

    /// Show a progress bar and only log warnings
    #[arg(long)]
    progress: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one document per record of the configured data source
    Run {
        /// JSON configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List the placeholders of a template, page by page
    Placeholders {
        /// PDF template
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
enum Order {
    /// Last distinct name first
    #[default]
    Reverse,
    /// Order of first appearance
    Forward,
}

impl From<Order> for NameOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Reverse => NameOrder::Reverse,
            Order::Forward => NameOrder::Forward,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let quiet = match &cli.command {
        Some(Commands::Run { run, .. }) => run.progress,
        _ => cli.run.progress,
    };
    init_logging(quiet);

    let result = match cli.command {
        Some(Commands::Run { config, run }) => cmd_run(&config, &run),
        Some(Commands::Placeholders { input }) => cmd_placeholders(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            if let Some(config) = cli.config {
                cmd_run(&config, &cli.run)
            } else {
                println!("{}", "Usage: mailmerge <CONFIG>".yellow());
                println!("       mailmerge --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn cmd_run(config_path: &Path, args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    log::debug!("loaded configuration from {}", config_path.display());

    let mut options = FillOptions::new().with_name_order(args.name_order.into());
    if args.per_occurrence {
        options = options.with_commit_mode(CommitMode::PerOccurrence);
    }
    let batch = Batch::from_config(&config)?
        .with_fill_options(options)
        .with_parallel(args.parallel);

    let pb = if args.progress {
        let pb = ProgressBar::new(batch.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message("Filling templates...");
        pb
    } else {
        ProgressBar::hidden()
    };

    let report = batch.run_with_progress(&LogDiagnostics, |_| pb.inc(1))?;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for document in &report.outputs {
            println!("{} {}", "Saved".green(), document.path.display());
            if !document.report.defaulted.is_empty() {
                println!(
                    "      {} {}",
                    "left blank:".yellow(),
                    document.report.defaulted.join(", ")
                );
            }
        }
        for failure in &report.failures {
            println!(
                "{} record {}: {}",
                "Failed".red(),
                failure.index,
                failure.error
            );
        }
        println!(
            "\n{} {} of {} documents generated in {}",
            "Done!".green().bold(),
            report.outputs.len(),
            report.total(),
            config.output_dir.display()
        );
    }

    if !report.is_success() {
        return Err(format!("{} records failed", report.failures.len()).into());
    }
    Ok(())
}

fn cmd_placeholders(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut template = PdfTemplate::open(input)?;

    println!("{}", "Template Placeholders".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), template.page_count());
    println!();

    let mut total = 0;
    for index in 0..template.page_count() {
        let text = template.page_mut(index)?.extract_text()?;
        let names = extract_placeholders(&text);
        total += names.len();
        if names.is_empty() {
            println!("{} {}: {}", "Page".bold(), index + 1, "none".dimmed());
        } else {
            println!("{} {}: {}", "Page".bold(), index + 1, names.join(", "));
        }
    }

    println!("\n{} {} placeholders", "Total:".bold(), total);
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "mailmerge".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF template mail-merge tool");
    println!();
    println!("License: MIT");
}
