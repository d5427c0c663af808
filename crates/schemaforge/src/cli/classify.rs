use std::path::PathBuf;

use anyhow::{Context, Result};
use schemaforge_core::{UploadClassifier, UploadFile};

pub fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes =
                std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(UploadFile::new(name, bytes))
        })
        .collect()
}

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let files = read_files(paths)?;
    let kind = UploadClassifier::new().classify(&files);
    println!("{kind}");
    Ok(())
}
