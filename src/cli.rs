use crate::compile::{compile_pdf, compile_png};
use crate::config::{Config, load_config};
use crate::layout::compute_layout;
use crate::layout_dump::{export_with_positions, layout_dump_json, write_layout_dump};
use crate::parser::{InputFormat, parse_spec};
use crate::render::{load_template, render_tikz, write_output};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "tkdr", version, about = "Lays out grouped dependency diagrams as TikZ")]
pub struct Args {
    /// Input file (.json or .txt) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for text formats.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "tex")]
    pub output_format: OutputFormat,

    /// LaTeX template with [[nodes]], [[links]] and [[underlines]] placeholders
    #[arg(short = 't', long = "template")]
    pub template: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Conflict resolution iteration budget
    #[arg(long = "max-iterations")]
    pub max_iterations: Option<usize>,

    /// Rightmost x a row may reach before wrapping
    #[arg(long = "max-row-width")]
    pub max_row_width: Option<f32>,

    /// Fail when conflicts remain after resolution
    #[arg(long)]
    pub strict: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tex,
    Json,
    Positions,
    Pdf,
    Png,
}

pub fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);

    let input = read_input(args.input.as_deref())?;
    let format = InputFormat::detect(args.input.as_deref(), &input);
    debug!("reading input as {format:?}");
    let spec = parse_spec(&input, format)?;
    let layout = compute_layout(&spec, &config.layout)?;
    let timeout = Duration::from_secs(config.render.compile_timeout_secs);

    match args.output_format {
        OutputFormat::Tex => {
            let tex = render_document(&layout, args, &config)?;
            write_output(&tex, args.output.as_deref())?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &layout)?,
            None => write_output(&layout_dump_json(&layout)?, None)?,
        },
        OutputFormat::Positions => {
            write_output(&export_with_positions(&spec, &layout), args.output.as_deref())?;
        }
        OutputFormat::Pdf => {
            let output = ensure_output(&args.output, "pdf")?;
            let tex = render_document(&layout, args, &config)?;
            compile_pdf(&tex, &output, timeout)?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let tex = render_document(&layout, args, &config)?;
            compile_png(&tex, &output, timeout)?;
        }
    }

    let residual = layout.diagnostics.residual;
    info!(
        "conflicts: {} before resolution, {} after",
        layout.resolution.initial.total(),
        residual.total()
    );
    if args.strict && residual.total() > 0 {
        return Err(anyhow::anyhow!(
            "{} conflicts remain after resolution ({} overlaps, {} crossings, {} arrows through text)",
            residual.total(),
            residual.text_overlaps,
            residual.arrow_crossings,
            residual.arrow_through_text
        ));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(v) = args.max_iterations {
        config.layout.resolve.max_iterations = v;
    }
    if let Some(v) = args.max_row_width {
        config.layout.max_x_position = v;
    }
}

fn render_document(layout: &crate::layout::Layout, args: &Args, config: &Config) -> Result<String> {
    let template = load_template(args.template.as_deref())?;
    Ok(render_tikz(layout, &template, &config.theme, &config.render))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
