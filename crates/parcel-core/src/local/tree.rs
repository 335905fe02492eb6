//! Content trees: commit ids and subpath-limited copies.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;

/// Deterministic commit id of a content tree.
///
/// # Algorithm
/// - Recursive traversal, entries sorted by name
/// - Directories: `relative_path || 0xFF`, then their children
/// - Files: `relative_path || 0x00 || content`
/// - Output: blake3 hex string
///
/// Symlinks are rejected.
pub fn commit_id(path: &Path) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "")?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir_recursive(hasher: &mut blake3::Hasher, dir: &Path, base: &str) -> anyhow::Result<()> {
    for entry in sorted_entries(dir)? {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]);
            hash_dir_recursive(hasher, &entry.path(), &rel_path)?;
        } else if ty.is_file() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            let content = fs::read(entry.path())
                .with_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            hasher.update(&content);
        } else {
            anyhow::bail!("Unsupported entry in content tree: {}", entry.path().display());
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<fs::DirEntry>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut sorted: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted.sort_by_key(|e| e.file_name());
    Ok(sorted)
}

/// Copy `src` into `dst`, replacing whatever `dst` held.
///
/// With `subpaths`, only those parts of the tree are copied. Subpaths are
/// relative to the tree root; a leading `/` is accepted. Subpaths that do not
/// exist in `src` are skipped.
pub fn copy_tree(src: &Path, dst: &Path, subpaths: &[String]) -> anyhow::Result<()> {
    if dst.exists() {
        fs::remove_dir_all(dst)
            .with_context(|| format!("Failed to remove directory: {}", dst.display()))?;
    }
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    if subpaths.is_empty() {
        return copy_recursive(src, dst);
    }

    for subpath in subpaths {
        let relative = relative_subpath(subpath)?;
        let from = src.join(&relative);
        let to = dst.join(&relative);
        if from.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory: {}", to.display()))?;
            copy_recursive(&from, &to)?;
        } else if from.is_file() {
            copy_file(&from, &to)?;
        } else {
            tracing::debug!(subpath = %subpath, "Subpath not present in content");
        }
    }
    Ok(())
}

fn copy_recursive(src: &Path, dst: &Path) -> anyhow::Result<()> {
    for entry in sorted_entries(src)? {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", from.display()))?;
        if ty.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory: {}", to.display()))?;
            copy_recursive(&from, &to)?;
        } else if ty.is_file() {
            copy_file(&from, &to)?;
        } else {
            anyhow::bail!("Unsupported entry in content tree: {}", from.display());
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Normalize a subpath to a path relative to the tree root, rejecting any
/// `..` component.
pub fn relative_subpath(subpath: &str) -> anyhow::Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(subpath).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                anyhow::bail!("Path traversal is not allowed in subpath: {subpath}");
            }
            Component::Prefix(_) => anyhow::bail!("Invalid subpath: {subpath}"),
        }
    }
    Ok(relative)
}
