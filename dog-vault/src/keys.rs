//! Key → storage path mapping.
//!
//! Objects live under `{root}/{first two characters of key}/{key}` so no single
//! directory (or key prefix) grows unbounded. Keys shorter than two characters
//! sit directly under the root.
//!
//! Legacy content was often stored under a slightly different name than the one
//! clients ask for (`.jpg` vs `.jpeg`, no extension, `.bin`, `.php`), so reads and
//! deletes resolve through an ordered [`candidates`] list and take the first hit.

use crate::{VaultError, VaultResult};

/// Maps client keys onto the sharded layout below a fixed root.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    root: String,
}

impl KeyResolver {
    pub fn new<S: Into<String>>(root: S) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Sharded storage path for `key`
    pub fn sharded_path(&self, key: &str) -> VaultResult<String> {
        sharded_path(key, &self.root)
    }

    /// Ordered lookup candidates for `key`, most specific first
    pub fn candidates_for(&self, key: &str) -> VaultResult<Vec<String>> {
        Ok(candidates(&self.sharded_path(key)?))
    }
}

/// Build the sharded path of `key` below `root`.
///
/// Fails with [`VaultError::InvalidKey`] for empty keys and for keys that could
/// address something outside the root.
pub fn sharded_path(key: &str, root: &str) -> VaultResult<String> {
    validate_key(key)?;

    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) => {
            let shard: String = [a, b].iter().collect();
            Ok(join(root, &[&shard, key]))
        }
        _ => Ok(join(root, &[key])),
    }
}

/// Candidate paths tried in order when resolving `path`.
///
/// Always starts with `path` itself, then the `.jpg`/`.jpeg` sibling (if any),
/// then the extensionless, `.bin` and `.php` variants (if `path` has an extension).
pub fn candidates(path: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(5);
    out.push(path.to_string());

    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpeg") {
        out.push(format!("{}.jpg", &path[..path.len() - ".jpeg".len()]));
    } else if lower.ends_with(".jpg") {
        out.push(format!("{}.jpeg", &path[..path.len() - ".jpg".len()]));
    }

    if let Some(ext) = extension(path) {
        let stem = &path[..path.len() - ext.len()];
        out.push(stem.to_string());
        out.push(format!("{stem}.bin"));
        out.push(format!("{stem}.php"));
    }

    out
}

/// Final component of a storage path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension of the final path component, including the dot.
///
/// A leading dot (`.profile`) does not start an extension.
fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(&name[idx..]),
        _ => None,
    }
}

fn validate_key(key: &str) -> VaultResult<()> {
    let escapes = key == "." || key.starts_with("..");
    let separators = key.contains(['/', '\\', '\0']);
    if key.is_empty() || escapes || separators {
        return Err(VaultError::invalid_key(key));
    }
    Ok(())
}

fn join(root: &str, parts: &[&str]) -> String {
    let absolute = root.starts_with('/');
    let trimmed = root.strip_prefix("./").unwrap_or(root).trim_end_matches('/');

    let mut out = String::new();
    if !trimmed.is_empty() && trimmed != "." {
        out.push_str(trimmed);
    } else if absolute {
        out.push('/');
    }

    for part in parts {
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}
