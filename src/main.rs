use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use macrolens::analysis::analyze_source;
use macrolens::FsLoader;

/// Analyze the macro invocations of a C translation unit and report, for
/// each top-level expansion, whether and how it aligns with the AST.
#[derive(Parser, Debug)]
#[command(name = "macrolens", version, about)]
struct Cli {
    /// C source file to analyze.
    input: PathBuf,

    /// Additional include search directories.
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Command-line macro definitions (name or name=value).
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let content = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let real_path = std::fs::canonicalize(&cli.input)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| cli.input.to_string_lossy().into_owned());

    let loader = FsLoader::new(cli.include_dirs);
    let output = analyze_source(
        &cli.input.to_string_lossy(),
        Some(&real_path),
        &content,
        &loader,
        &cli.defines,
    )?;

    print!("{}", output.render());
    Ok(())
}
