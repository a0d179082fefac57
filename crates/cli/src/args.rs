//! Command-line argument parsing for the transcache binary.

use std::path::PathBuf;

use clap::Parser;

/// Acquire, cache, and link video transcripts.
#[derive(Parser, Debug, Clone)]
#[command(name = "transcache", version)]
pub struct Args {
    /// Video identifiers to acquire (11 characters each)
    pub ids: Vec<String>,

    /// Read identifiers from a file, one per line
    #[arg(long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Print registry statistics and exit
    #[arg(long)]
    pub stats: bool,

    /// Run the integrity sweep and exit
    #[arg(long)]
    pub sweep: bool,
}

impl Args {
    /// Merge positional identifiers with any file-supplied ones,
    /// preserving order: file first, then positionals.
    pub fn collect_ids(&self) -> std::io::Result<Vec<String>> {
        let mut ids = Vec::new();

        if let Some(path) = &self.from_file {
            let contents = std::fs::read_to_string(path)?;
            ids.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from),
            );
        }

        ids.extend(self.ids.iter().cloned());
        Ok(ids)
    }
}
