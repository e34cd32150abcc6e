use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use log::info;

/// Reads organism names, one per line, from files or stdin (`-`)
pub struct NameReader {
    files: Vec<PathBuf>
}

impl NameReader {
    /// Create a new NameReader from a list of input files
    pub fn new<P: AsRef<Path>>(files: Vec<P>) -> Self {
        let files = files.into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect();

        NameReader {
            files
        }
    }

    /// Process each name in all input files
    pub fn process_all<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>
    {
        for file in &self.files {
            if file.as_os_str() == "-" {
                let stdin = io::stdin();
                process_lines(stdin.lock(), "stdin", &mut callback)
                    .context("Failed to read names from stdin")?;
            } else {
                let handle = File::open(file)
                    .with_context(|| format!("Failed to open file: {}", file.display()))?;
                process_lines(BufReader::new(handle), &file.display().to_string(), &mut callback)
                    .with_context(|| format!("Failed to process file: {}", file.display()))?;
            }
        }
        Ok(())
    }

    /// Collect every name in input order
    pub fn read_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.process_all(|name| {
            names.push(name.to_string());
            Ok(())
        })?;
        Ok(names)
    }
}

/// Feed non-blank, non-comment lines to `callback`, trimmed
fn process_lines<R, F>(reader: R, source: &str, callback: &mut F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> Result<()>
{
    let mut num_names = 0;

    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }

        callback(name)?;
        num_names += 1;
    }

    info!("Read {} names from {}", num_names, source);
    Ok(())
}
