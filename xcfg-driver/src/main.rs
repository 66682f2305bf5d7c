//! x86 to SSA CFG converter driver
//!
//! Reads assembly text (or a JSON parse tree), converts it into an SSA
//! control-flow graph and writes the textual IR or its JSON form.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use xcfg_asm::ParserOptions;
use xcfg_common::Tree;
use xcfg_ir::{convert_tree, LoweringOptions};

#[derive(Parser)]
#[command(name = "xcfg")]
#[command(about = "x86 assembly to SSA control-flow graph converter")]
#[command(version = "0.1.0")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an assembly file into an SSA control-flow graph
    Convert {
        /// Input assembly file
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the graph as JSON instead of textual IR
        #[arg(long)]
        json: bool,

        /// Input is a JSON parse tree rather than assembly text
        #[arg(long)]
        tree: bool,

        /// Check every jump target before lowering any block
        #[arg(long)]
        eager_labels: bool,

        /// Let a redefined label replace the earlier definition
        #[arg(long)]
        allow_duplicate_labels: bool,
    },

    /// Parse an assembly file and dump the parse tree as JSON
    Parse {
        /// Input assembly file
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::init();
    }

    match cli.command {
        Commands::Convert { input, output, json, tree, eager_labels, allow_duplicate_labels } => {
            let mut options = LoweringOptions::default();
            if eager_labels {
                options = options.eager_labels();
            }
            if allow_duplicate_labels {
                options = options.allow_duplicate_labels();
            }
            convert_file(&input, output.as_deref(), json, tree, options)
        }
        Commands::Parse { input, output } => parse_file(&input, output.as_deref()),
    }
}

fn convert_file(
    input: &Path,
    output: Option<&Path>,
    json: bool,
    from_tree: bool,
    options: LoweringOptions,
) -> Result<()> {
    let tree = if from_tree {
        let text = read_input(input)?;
        serde_json::from_str::<Tree>(&text)
            .with_context(|| format!("{} is not a valid JSON parse tree", input.display()))?
    } else {
        read_assembly(input)?
    };

    let program = convert_tree(&tree, options)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    debug!("{} blocks, {} values", program.blocks.len(), program.values.len());

    let text = if json {
        program.to_json()?
    } else {
        program.to_string()
    };
    write_output(output, &text)
}

fn parse_file(input: &Path, output: Option<&Path>) -> Result<()> {
    let tree = read_assembly(input)?;
    let text = serde_json::to_string_pretty(&tree)?;
    write_output(output, &text)
}

fn read_input(input: &Path) -> Result<String> {
    let text = fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    debug!("Read {} bytes from {}", text.len(), input.display());
    Ok(text)
}

fn read_assembly(input: &Path) -> Result<Tree> {
    let source = read_input(input)?;
    let parser = xcfg_asm::Parser::new(ParserOptions::default().with_filename(input.display().to_string()));
    let tree = parser
        .parse_source(&source)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    debug!("Parsed {} statements", tree.children.len());
    Ok(tree)
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Output written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
