use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use greatquest::{LoadConfig, ScriptConfig};
use serde::Deserialize;

pub const MANIFEST_NAME: &str = "greatquest.json";

/// A set of container files loaded as one session.
#[derive(Debug, Deserialize)]
pub struct SessionManifest {
    /// Container files in load order. Earlier files win hash lookups.
    pub containers: Vec<PathBuf>,
    #[serde(default)]
    pub config: LoadConfig,
    #[serde(default)]
    pub script: ScriptConfig,
}

/// Find the manifest by walking up from `start` through ancestor directories.
fn find_manifest_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent()?.to_path_buf()
    };
    loop {
        let candidate = dir.join(MANIFEST_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Use `path` if it exists; for the default file name also search ancestors of `cwd`.
pub fn resolve_manifest_path(path: &Path, cwd: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if path.file_name().and_then(|f| f.to_str()) == Some(MANIFEST_NAME) {
        if let Some(found) = find_manifest_upward(cwd) {
            tracing::info!(manifest = %found.display(), "found manifest");
            return Ok(found);
        }
    }
    bail!("manifest not found: {}", path.display())
}

pub fn load_manifest(path: &Path, cwd: &Path) -> Result<SessionManifest> {
    let path = resolve_manifest_path(path, cwd)?;
    let file = File::open(&path).with_context(|| format!("failed to open manifest: {}", path.display()))?;
    let mut manifest: SessionManifest = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

    // Resolve relative paths against the manifest's directory.
    if let Some(base) = path.canonicalize()?.parent() {
        for container in &mut manifest.containers {
            if container.is_relative() {
                *container = base.join(&*container);
            }
        }
    }
    if manifest.containers.is_empty() {
        bail!("manifest {} lists no containers", path.display());
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn relative_paths_resolve_against_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(MANIFEST_NAME);
        fs::write(
            &manifest,
            r#"{ "containers": ["level.gq", "/abs/shared.gq"], "config": { "strict_arity": false } }"#,
        )
        .unwrap();

        let loaded = load_manifest(&manifest, dir.path()).unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(loaded.containers[0], base.join("level.gq"));
        assert_eq!(loaded.containers[1], PathBuf::from("/abs/shared.gq"));
        assert!(!loaded.config.strict_arity);
        assert!(loaded.config.strict_toc);
        assert_eq!(loaded.script.max_cascade, ScriptConfig::default().max_cascade);
    }

    #[test]
    fn default_name_is_found_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_NAME), r#"{ "containers": ["a.gq"] }"#).unwrap();
        let nested = dir.path().join("levels").join("forest");
        fs::create_dir_all(&nested).unwrap();

        let found = resolve_manifest_path(Path::new(MANIFEST_NAME), &nested).unwrap();
        assert_eq!(found, dir.path().join(MANIFEST_NAME));
    }

    #[test]
    fn empty_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("custom.json");
        fs::write(&manifest, r#"{ "containers": [] }"#).unwrap();
        assert!(load_manifest(&manifest, dir.path()).is_err());
    }
}
