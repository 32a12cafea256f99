//! Split parameters
//!
//! All values are clamped on the way in, so a `SplitConfig` always describes
//! a runnable split: at least one record per chunk and at least one worker.

use std::path::{Path, PathBuf};

/// Parameters for splitting a file into chunks.
#[derive(Clone, Debug)]
pub struct SplitConfig {
    chunk_size: usize,
    output_dir: PathBuf,
    base_name: Option<String>,
    extension: Option<String>,
    threads: usize,
}

impl SplitConfig {
    /// Default number of records per chunk file.
    pub const DEFAULT_CHUNK_SIZE: usize = 25_000;

    /// Fallback base name for sources without a file stem.
    pub const DEFAULT_BASE_NAME: &'static str = "chunk";

    /// Default number of workers: one per logical CPU.
    #[must_use]
    pub fn default_threads() -> usize {
        num_cpus::get()
    }

    /// Clamps a requested count (possibly zero or negative) to at least one.
    #[must_use]
    pub fn clamp_count(requested: i64) -> usize {
        usize::try_from(requested.max(1)).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn base_name<S: Into<String>>(mut self, base_name: S) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    /// Overrides the extension of the chunk files (without the leading dot).
    #[must_use]
    pub fn extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = Some(extension.into());
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn get_output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn get_threads(&self) -> usize {
        self.threads
    }

    /// Base name of the chunk files: the configured name, else the source stem.
    #[must_use]
    pub fn base_name_for(&self, source: &Path) -> String {
        if let Some(name) = &self.base_name {
            return name.clone();
        }
        source.file_stem().map_or_else(
            || Self::DEFAULT_BASE_NAME.to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        )
    }

    /// Extension of the chunk files: the configured one, else the source
    /// extension, else `fallback`.
    #[must_use]
    pub fn extension_for(&self, source: &Path, fallback: &str) -> String {
        if let Some(ext) = &self.extension {
            return ext.clone();
        }
        source.extension().map_or_else(
            || fallback.to_string(),
            |ext| ext.to_string_lossy().into_owned(),
        )
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            output_dir: PathBuf::from("."),
            base_name: None,
            extension: None,
            threads: Self::default_threads(),
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SplitConfig::default();
        assert_eq!(config.get_chunk_size(), 25_000);
        assert_eq!(config.get_output_dir(), Path::new("."));
        assert!(config.get_threads() >= 1);
    }

    #[test]
    fn test_clamping() {
        let config = SplitConfig::default().chunk_size(0).threads(0);
        assert_eq!(config.get_chunk_size(), 1);
        assert_eq!(config.get_threads(), 1);

        assert_eq!(SplitConfig::clamp_count(-5), 1);
        assert_eq!(SplitConfig::clamp_count(0), 1);
        assert_eq!(SplitConfig::clamp_count(150), 150);
    }

    #[test]
    fn test_naming_defaults_from_source() {
        let config = SplitConfig::default();
        let source = Path::new("/data/fourreads.bq");
        assert_eq!(config.base_name_for(source), "fourreads");
        assert_eq!(config.extension_for(source, "bq"), "bq");
        assert_eq!(config.extension_for(Path::new("reads"), "bq"), "bq");
    }

    #[test]
    fn test_naming_overrides() {
        let config = SplitConfig::default().base_name("unittest").extension("chunk");
        let source = Path::new("fourreads.bq");
        assert_eq!(config.base_name_for(source), "unittest");
        assert_eq!(config.extension_for(source, "bq"), "chunk");
    }
}
