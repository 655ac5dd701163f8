//! `pforge`: turns product facts into FAQ, product and comparison pages by
//! driving a fixed sequence of language-model stages.
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod engine;
mod error;
mod gateway;
mod lm_log;
mod model;
mod output;
mod prompts;
mod record;
mod stages;
#[cfg(test)]
mod testing;
mod util;

use cli::{Command, ParseArgs, RootArgs, RunArgs};
use config::Overrides;
use engine::Engine;
use prompts::PromptLibrary;
use stages::StageContext;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = RootArgs::parse();
    init_tracing(args.command.verbose())?;

    match args.command {
        Command::Run(args) => cmd_run(&args),
        Command::Parse(args) => cmd_parse(&args),
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if verbose {
        filter = filter.add_directive("pforge=debug".parse().context("parse log directive")?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let settings = config::load_settings(&args.overrides())?;
    let raw_input = output::load_raw_input(&settings.input_path)?;
    let gateway = gateway::build(&settings)?;
    let prompts = match &settings.prompts_dir {
        Some(dir) => PromptLibrary::with_overrides(dir),
        None => PromptLibrary::builtin(),
    };
    let ctx = StageContext {
        gateway: &gateway,
        prompts: &prompts,
        settings: &settings,
    };

    tracing::info!(
        input = %settings.input_path.display(),
        backend = ?settings.backend,
        "starting workflow"
    );
    let report = Engine::standard()?.run(raw_input, &ctx);

    let written = output::write_pages(&settings.output_dir, &report.record)?;
    if let Some(path) = &args.record {
        output::write_json(path, &report)?;
        tracing::info!(path = %path.display(), "wrote run record");
    }
    for path in &written {
        println!("{}", path.display());
    }

    let populated: Vec<&str> = report
        .record
        .populated()
        .into_iter()
        .map(|stage| stage.field_name())
        .collect();
    tracing::info!(
        shape = ?report.record.shape(),
        succeeded = report.outcomes.iter().filter(|o| o.succeeded()).count(),
        populated = ?populated,
        "run finished"
    );

    match report.record.error() {
        Some(error) => Err(anyhow!("{error}")),
        None => Ok(()),
    }
}

fn cmd_parse(args: &ParseArgs) -> Result<()> {
    let settings = config::resolve_settings(&Overrides {
        input_path: args.input.clone(),
        ..Overrides::default()
    })?;
    let raw_input = output::load_raw_input(&settings.input_path)?;
    let product = stages::parse_product(&raw_input)?;
    let text = serde_json::to_string_pretty(&product).context("serialize product")?;
    println!("{text}");
    Ok(())
}
