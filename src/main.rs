//! Command-line front end: extract, preview and export slides from an HTML file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use htmlslides::export::ExportPipeline;
use htmlslides::extract::{extract_slides, Extraction};
use htmlslides::preview::Preview;
use htmlslides::ToolConfig;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Turn HTML markup into slides and export them as PNG images or PDF.
#[derive(Parser, Debug)]
#[command(name = "htmlslides")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Class marking slide elements (overrides the config)
    #[arg(long, global = true)]
    marker: Option<String>,

    /// Reject markup with structural parse errors
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the slides found in the input
    Extract {
        /// Input HTML file, or `-` for stdin
        input: PathBuf,
        /// Print slides as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the editable preview document
    Preview {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rasterize every slide and package the result
    Export {
        input: PathBuf,
        #[arg(long, value_enum, default_value = "png")]
        format: Format,
        /// Output file (default: slides.zip or slides.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Png,
    Pdf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = load_config(&args)?;

    match &args.command {
        Command::Extract { input, json } => {
            let extraction = extract(input, &config)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&slides_json(&extraction))?);
            } else {
                for slide in &extraction.slides {
                    let text = slide.text();
                    let summary: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    let summary: String = summary.chars().take(60).collect();
                    println!(
                        "{:>3}  {}  {}{}",
                        slide.index(),
                        &slide.fingerprint()[..12],
                        summary,
                        if slide.is_synthetic() { "  (whole body)" } else { "" }
                    );
                }
            }
        }
        Command::Preview { input, output } => {
            let extraction = extract(input, &config)?;
            let mut preview = Preview::new(config.display);
            preview.render(&extraction.slides);
            std::fs::write(output, preview.to_html())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            eprintln!("Wrote {} slide(s) to {}", preview.len(), output.display());
        }
        Command::Export {
            input,
            format,
            output,
        } => {
            let extraction = extract(input, &config)?;
            let mut preview = Preview::new(config.display);
            preview.render(&extraction.slides);
            preview.set_edit_mode(false);
            let pipeline = ExportPipeline::new(config.clone());
            let (default_name, bytes, count) = match format {
                Format::Png => {
                    let archive = pipeline.export_images(&preview).await?;
                    (archive.file_name, archive.bytes, archive.entries.len())
                }
                Format::Pdf => {
                    let pdf = pipeline.export_pdf(&preview).await?;
                    (pdf.file_name, pdf.bytes, pdf.page_count)
                }
            };
            let path = output.clone().unwrap_or_else(|| PathBuf::from(default_name));
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} slide(s) to {}", count, path.display());
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<ToolConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ToolConfig::from_json(&text)?
        }
        None => ToolConfig::default(),
    };
    if let Some(marker) = &args.marker {
        config.marker_class = marker.clone();
    }
    config.strict_parse |= args.strict;
    config.validate()?;
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn extract(input: &Path, config: &ToolConfig) -> Result<Extraction> {
    let raw = read_input(input)?;
    let extraction = match extract_slides(&raw, &config.extract_options()) {
        Ok(ex) => ex,
        Err(htmlslides::Error::Parse { message, report }) => {
            eprintln!("{}", report.to_json());
            anyhow::bail!("{}: {}", input.display(), message);
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(diagnostic) = &extraction.diagnostic {
        eprintln!("warning: {}", diagnostic);
    }
    if extraction.sanitized.scripts > 0 || extraction.sanitized.attributes > 0 {
        log::info!(
            "removed {} script element(s) and {} unsafe attribute(s)",
            extraction.sanitized.scripts,
            extraction.sanitized.attributes
        );
    }
    Ok(extraction)
}

fn slides_json(extraction: &Extraction) -> serde_json::Value {
    serde_json::Value::Array(
        extraction
            .slides
            .iter()
            .map(|s| {
                serde_json::json!({
                    "index": s.index(),
                    "synthetic": s.is_synthetic(),
                    "fingerprint": s.fingerprint(),
                    "text": s.text(),
                    "html": s.to_html(),
                })
            })
            .collect(),
    )
}
