//! Source discovery and output path mapping for batch commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Every file under `input` with the given extension, sorted. A file input
/// is returned as-is regardless of its extension.
pub fn collect_sources(input: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("input not found: {}", input.display());
    }

    let mut sources = Vec::new();
    walk(input, extension, &mut sources)?;
    sources.sort();
    if sources.is_empty() {
        anyhow::bail!("no .{} files found in {}", extension, input.display());
    }
    Ok(sources)
}

fn walk(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, extension, out)?;
        } else if has_extension(&path, extension) {
            out.push(path);
        }
    }
    Ok(())
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Where the result for `source` goes.
///
/// Without `output` the result sits next to the source. With a directory
/// input, `output` is a directory mirroring the input tree. With a file
/// input, `output` is the file to write, or a directory to write into when
/// it already is one. `extension` replaces the source extension; `None`
/// keeps it.
pub fn output_path(source: &Path, input: &Path, output: Option<&Path>, extension: Option<&str>) -> PathBuf {
    let retarget = |path: PathBuf| match extension {
        Some(ext) => path.with_extension(ext),
        None => path,
    };
    match output {
        None => retarget(source.to_path_buf()),
        Some(output) if input.is_dir() => {
            let relative = source.strip_prefix(input).unwrap_or(source);
            retarget(output.join(relative))
        }
        Some(output) if output.is_dir() => {
            let name = source.file_name().map(PathBuf::from).unwrap_or_default();
            retarget(output.join(name))
        }
        Some(output) => output.to_path_buf(),
    }
}

/// Write `contents`, creating parent directories as needed.
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
