use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use siml::utils::run_python;
use siml::{compile, CompilerOptions};

/// compiles a Siml model (.siml) to a Python simulation program
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input filename
    input: String,

    /// Output filename, defaults to the input with extension .py
    #[arg(short, long)]
    outfile: Option<String>,

    /// Run the generated program: the number of a simulation, or "all"
    #[arg(short, long, value_name = "N|all", value_parser = parse_run)]
    run: Option<String>,

    /// Leave graphs out of the generated program
    #[arg(long)]
    no_graphs: bool,

    /// Comma separated list of compiler stages to log in detail
    #[arg(long, value_enum, value_delimiter = ',')]
    debug_areas: Vec<DebugArea>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DebugArea {
    Parse,
    Resolve,
    Analyze,
    Codegen,
    All,
}

impl DebugArea {
    fn modules(&self) -> &'static [&'static str] {
        match self {
            DebugArea::Parse => &["siml::parser", "siml::compiler"],
            DebugArea::Resolve => &["siml::semantic::symbols", "siml::semantic::flatten"],
            DebugArea::Analyze => &["siml::semantic::dependency"],
            DebugArea::Codegen => &["siml::codegen"],
            DebugArea::All => &["siml"],
        }
    }
}

fn parse_run(value: &str) -> Result<String, String> {
    if value == "all" || value.parse::<usize>().is_ok() {
        Ok(value.to_string())
    } else {
        Err(format!("expected a simulation number or \"all\", got {}", value))
    }
}

fn init_logging(areas: &[DebugArea]) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    for area in areas {
        for module in area.modules() {
            builder.filter_module(module, LevelFilter::Debug);
        }
    }
    builder.format_timestamp(None);
    builder.parse_default_env();
    builder.init();
}

fn main() -> Result<ExitCode> {
    let cli = Args::parse();
    init_logging(&cli.debug_areas);

    let options = CompilerOptions {
        emit_graphs: !cli.no_graphs,
        source_name: cli.input.clone(),
    };
    let compilation = compile(&cli.input, cli.outfile.as_deref(), options)?;
    let unit = &compilation.unit;
    eprint!("{}", unit.as_error_message(&compilation.source));

    if unit.outcomes.is_empty() {
        error!("no process class found in {}", cli.input);
    }
    if unit.program.is_none() {
        return Ok(ExitCode::FAILURE);
    }
    info!("program written to {}", compilation.outfile.display());

    let mut code = if unit.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };
    if let Some(run) = &cli.run {
        let mut args = vec!["-r".to_string(), run.clone()];
        if cli.no_graphs {
            args.push("--no-graphs".to_string());
        }
        if run_python(&compilation.outfile, &args)? != 0 {
            code = ExitCode::FAILURE;
        }
    }
    Ok(code)
}
