use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use boxchat::convert::{export, find_sources, output_name};

#[derive(Parser, Debug)]
#[command(name = "md-export")]
#[command(about = "Convert curriculum PDF/DOCX files into the markdown document store")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a single source file
    File {
        /// PDF or DOCX curriculum document
        source: PathBuf,
        /// Markdown file to write
        output: PathBuf,
    },
    /// Convert every PDF/DOCX in a directory (CTDT_AI.pdf -> ai.md)
    Dir {
        #[arg(long, env = "BOXCHAT_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        #[arg(long, env = "BOXCHAT_MD_DIR", default_value = "md")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    boxchat::init_tracing();

    match Args::parse().command {
        Command::File { source, output } => {
            export(&source, &output)?;
            println!("Wrote {}", output.display());
        }
        Command::Dir { data_dir, out_dir } => convert_dir(&data_dir, &out_dir)?,
    }

    Ok(())
}

fn convert_dir(data_dir: &Path, out_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        anyhow::bail!("Directory does not exist: {}", data_dir.display());
    }

    let sources = find_sources(data_dir);
    println!("Found {} curriculum files in {}", sources.len(), data_dir.display());
    if sources.is_empty() {
        return Ok(());
    }

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut failed: Vec<(PathBuf, String)> = Vec::new();
    for (source, _) in &sources {
        pb.set_message(source.file_name().unwrap_or_default().to_string_lossy().to_string());
        let output = out_dir.join(output_name(source));
        if let Err(e) = export(source, &output) {
            tracing::warn!("Failed to convert {}: {:#}", source.display(), e);
            failed.push((source.clone(), format!("{:#}", e)));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("\nConverted {}/{} files into {}", sources.len() - failed.len(), sources.len(), out_dir.display());
    if !failed.is_empty() {
        println!("\nFailed files:");
        for (path, err) in &failed {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}
