use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use anyhow::{Result, Context, anyhow};
use tracing::{info, warn};

use crate::ml::ClassifierConfig;

pub const MODEL_FILE_NAME: &str = "deepfake_detector.onnx";
const MODEL_PATH_KEY: &str = "MODEL_PATH";
const SEARCH_DEPTH: usize = 5;

/// Resolves the classifier weights.
/// Uses an explicit path when given, then `.env`, then searches the filesystem.
pub fn get_model_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let root = std::env::current_dir().context("Failed to read working directory")?;
    resolve_model_path(explicit, Path::new(".env"), &root)
}

fn resolve_model_path(explicit: Option<&Path>, env_path: &Path, root: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if env_path.exists() {
        if let Ok(path) = load_from_env(env_path) {
            info!("Loaded model path from {:?}", env_path);
            return Ok(path);
        }
    }

    info!("No model path in {:?}. Searching filesystem...", env_path);
    let model = find_file(root, MODEL_FILE_NAME, SEARCH_DEPTH)?;
    info!("Found detector model: {:?}", model);

    // Only a cache; the model is usable even when it cannot be written
    match save_to_env(env_path, &model) {
        Ok(()) => info!("Saved model path to {:?}", env_path),
        Err(e) => warn!("Could not cache model path in {:?}: {:#}", env_path, e),
    }

    Ok(model)
}

/// Reads `<model>.json` next to the weights if present.
pub fn load_classifier_config(model_path: &Path) -> Result<ClassifierConfig> {
    let sidecar = model_path.with_extension("json");
    if !sidecar.is_file() {
        return Ok(ClassifierConfig::default());
    }

    let raw = std::fs::read_to_string(&sidecar)
        .with_context(|| format!("Failed to read classifier config {:?}", sidecar))?;
    let config: ClassifierConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid classifier config {:?}", sidecar))?;
    info!("Loaded classifier config from {:?}", sidecar);
    Ok(config)
}

/// Walks `root`, then its parent for runs from a subdirectory of the checkout.
fn find_file(root: &Path, filename: &str, max_depth: usize) -> Result<PathBuf> {
    root.ancestors()
        .take(2)
        .find_map(|dir| {
            WalkDir::new(dir)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| e.file_type().is_file() && e.file_name() == filename)
                .map(|e| e.into_path())
        })
        .ok_or_else(|| anyhow!("Could not find '{}' within {} levels of {:?}", filename, max_depth, root))
}

fn load_from_env(path: &Path) -> Result<PathBuf> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == MODEL_PATH_KEY && !value.trim().is_empty() {
                return Ok(PathBuf::from(value.trim()));
            }
        }
    }

    Err(anyhow!("No {} entry in .env file", MODEL_PATH_KEY))
}

/// Sets `MODEL_PATH` in the env file, keeping every other line as it was.
fn save_to_env(path: &Path, model: &Path) -> Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };

    let mut content: String = existing
        .lines()
        .filter(|line| {
            line.split_once('=')
                .map_or(true, |(key, _)| key.trim() != MODEL_PATH_KEY)
        })
        .flat_map(|line| [line, "\n"])
        .collect();
    content.push_str(&format!("{}={}\n", MODEL_PATH_KEY, model.display()));

    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelLayout;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("luna-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_and_load_env() -> Result<()> {
        let path = scratch("env");
        let model_path = PathBuf::from("/tmp/deepfake_detector.onnx");

        save_to_env(&path, &model_path)?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("MODEL_PATH=/tmp/deepfake_detector.onnx"));

        let loaded = load_from_env(&path)?;
        assert_eq!(loaded, model_path);

        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_save_keeps_other_env_entries() -> Result<()> {
        let path = scratch("env");
        fs::write(&path, "RUST_LOG=debug\nMODEL_PATH=/old/model.onnx\nLUNA_PORT=9000\n")?;

        save_to_env(&path, Path::new("/new/deepfake_detector.onnx"))?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(
            content,
            "RUST_LOG=debug\nLUNA_PORT=9000\nMODEL_PATH=/new/deepfake_detector.onnx\n"
        );
        assert_eq!(load_from_env(&path)?, PathBuf::from("/new/deepfake_detector.onnx"));

        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_search_result_is_cached_without_losing_entries() -> Result<()> {
        let root = scratch("search");
        fs::create_dir_all(root.join("models/weights"))?;
        let model = root.join("models/weights").join(MODEL_FILE_NAME);
        fs::write(&model, b"onnx")?;
        let env_path = root.join(".env");
        fs::write(&env_path, "RUST_LOG=debug\nLUNA_PORT=9000\n")?;

        assert_eq!(resolve_model_path(None, &env_path, &root)?, model);

        let content = fs::read_to_string(&env_path)?;
        assert!(content.starts_with("RUST_LOG=debug\nLUNA_PORT=9000\n"));
        assert_eq!(load_from_env(&env_path)?, model);

        fs::remove_dir_all(root)?;
        Ok(())
    }

    #[test]
    fn test_unwritable_env_does_not_block_found_model() -> Result<()> {
        let root = scratch("search");
        fs::create_dir_all(&root)?;
        let model = root.join(MODEL_FILE_NAME);
        fs::write(&model, b"onnx")?;
        let env_path = root.join("missing-dir").join(".env");

        assert_eq!(resolve_model_path(None, &env_path, &root)?, model);
        assert!(!env_path.exists());

        fs::remove_dir_all(root)?;
        Ok(())
    }

    #[test]
    fn test_env_without_model_entry_is_rejected() -> Result<()> {
        let path = scratch("env");
        fs::write(&path, "RUST_LOG=debug\nMODEL_PATH=\n")?;
        assert!(load_from_env(&path).is_err());
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_explicit_model_path_wins() -> Result<()> {
        let explicit = PathBuf::from("/opt/models/custom.onnx");
        assert_eq!(get_model_path(Some(&explicit))?, explicit);
        Ok(())
    }

    #[test]
    fn test_classifier_config_sidecar() -> Result<()> {
        let dir = scratch("model");
        fs::create_dir_all(&dir)?;
        let model = dir.join(MODEL_FILE_NAME);

        // Without a sidecar the defaults apply
        assert_eq!(load_classifier_config(&model)?, ClassifierConfig::default());

        fs::write(
            dir.join("deepfake_detector.json"),
            r#"{"input_size": 256, "channel_order": "bgr"}"#,
        )?;
        let config = load_classifier_config(&model)?;
        assert_eq!(config.input_size, 256);
        assert_eq!(config.channel_order, PixelLayout::Bgr);
        assert_eq!(config.mean, ClassifierConfig::default().mean);

        fs::remove_dir_all(dir)?;
        Ok(())
    }
}
