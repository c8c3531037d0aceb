use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

use crate::finalize::{compile_document, CompileOutput};
use crate::options::{CompileError, CompileOptions};

/// In-memory compile cache keyed by a digest of the source and the options
/// that affect output. Compilation is deterministic, so a hit is always valid.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: HashMap<String, CompileOutput>,
    hits: usize,
    misses: usize,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(options.strict.to_string().as_bytes());
        hasher.update(format!("{:?}", options.module_format).as_bytes());
        hasher.update(format!("{:?}", options.default_shadow).as_bytes());
        hasher.update(options.check_output.to_string().as_bytes());
        hasher.update(options.file_path.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, source: &str, options: &CompileOptions) -> Option<&CompileOutput> {
        self.entries.get(&Self::compute_hash(source, options))
    }

    /// Cached output, compiling and storing on a miss. Only error-free
    /// outputs are stored; fatal errors propagate.
    pub fn get_or_compile(
        &mut self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileOutput, CompileError> {
        let hash = Self::compute_hash(source, options);
        if let Some(hit) = self.entries.get(&hash) {
            self.hits += 1;
            debug!(%hash, "compile cache hit");
            return Ok(hit.clone());
        }

        self.misses += 1;
        let output = compile_document(source, options)?;
        if output.has_errors() {
            debug!(%hash, errors = output.errors.len(), "not caching output with errors");
        } else {
            self.entries.insert(hash, output.clone());
        }
        Ok(output)
    }

    pub fn invalidate(&mut self, source: &str, options: &CompileOptions) -> bool {
        self.entries
            .remove(&Self::compute_hash(source, options))
            .is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"<component name="x-hello"><p>hi</p></component>"#;

    #[test]
    fn test_hash_depends_on_options() {
        let strict = CompileOptions::default();
        let lenient = CompileOptions::lenient();
        assert_eq!(
            CompileCache::compute_hash(SRC, &strict),
            CompileCache::compute_hash(SRC, &strict)
        );
        assert_ne!(
            CompileCache::compute_hash(SRC, &strict),
            CompileCache::compute_hash(SRC, &lenient)
        );
    }

    #[test]
    fn test_second_compile_hits() {
        let mut cache = CompileCache::new();
        let options = CompileOptions::default();
        let first = cache.get_or_compile(SRC, &options).unwrap();
        let second = cache.get_or_compile(SRC, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), (1, 1));
        assert!(cache.get(SRC, &options).is_some());
        assert!(cache.invalidate(SRC, &options));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fatal_errors_not_cached() {
        let mut cache = CompileCache::new();
        assert!(cache
            .get_or_compile("<p>no component</p>", &CompileOptions::default())
            .is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_outputs_with_errors_not_cached() {
        let mut cache = CompileCache::new();
        let options = CompileOptions::lenient();
        let src = r#"<component name="x-bad"><bogus></bogus><p>ok</p></component>"#;

        let first = cache.get_or_compile(src, &options).unwrap();
        assert_eq!(first.errors.len(), 1);
        assert!(cache.is_empty());
        assert!(cache.get(src, &options).is_none());

        cache.get_or_compile(src, &options).unwrap();
        assert_eq!(cache.stats(), (0, 2));
    }
}
