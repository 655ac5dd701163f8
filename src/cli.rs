//! CLI argument parsing for the page pipeline.
use crate::config::{BackendKind, Overrides};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "pforge",
    version,
    about = "LM-driven product page pipeline",
    after_help = "Commands:\n  run     Generate FAQ, product and comparison pages from product facts\n  parse   Validate product facts and print the parsed product\n\nExamples:\n  pforge run --input data/product_data.json --out-dir output\n  pforge run --lm \"llm -m gpt-4o-mini\" --record output/record.json\n  pforge parse --input data/product_data.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Parse(ParseArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Run the full pipeline once and write the pages")]
pub struct RunArgs {
    /// Product facts JSON (default: data/product_data.json)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Directory for faq.json, product_page.json and comparison_page.json
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Config file (default: ./pforge.json, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LM command reading the prompt on stdin (selects the command backend)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// LM backend to use
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Dump the final record as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Append one JSON line per LM call to this path
    #[arg(long, value_name = "PATH")]
    pub lm_log: Option<PathBuf>,

    /// Emit debug logs
    #[arg(long)]
    pub verbose: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            backend: self.backend,
            lm_command: self.lm.clone(),
            input_path: self.input.clone(),
            output_dir: self.out_dir.clone(),
            lm_log: self.lm_log.clone(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Parse product facts and print the result as JSON")]
pub struct ParseArgs {
    /// Product facts JSON (default: data/product_data.json)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Emit debug logs
    #[arg(long)]
    pub verbose: bool,
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::Parse(args) => args.verbose,
        }
    }
}
