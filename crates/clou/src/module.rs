//! Path resolution, source fetch, exports caching, and cycle tolerance.
//!
//! The store itself is a plain key→source map; it deliberately has no
//! opinion on where sources come from, so any key→source store suffices.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::value::Value;

/// A key→source-text store plus the exports cache `require` consults.
#[derive(Default)]
pub struct ModuleStore {
    files: RefCell<HashMap<String, String>>,
    cache: RefCell<HashMap<String, Value>>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `content` under `path`, overwriting any previous content.
    pub fn add_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), content.into());
    }

    pub fn get_file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    /// Resolves `path` against `current_dir` and returns the resolved key and
    /// its source. Resolution order (§4.4): the path as-is, the path with
    /// `.clou` appended, the path joined under `current_dir`, and that joined
    /// path with `.clou` appended. The first candidate present in the store
    /// wins; if none match, raises `ModuleNotFound`.
    pub fn get_module_source(&self, path: &str, current_dir: &str) -> Result<(String, String), RuntimeError> {
        let joined = join(current_dir, path);
        let candidates = [
            path.to_string(),
            format!("{path}.clou"),
            joined.clone(),
            format!("{joined}.clou"),
        ];
        for candidate in &candidates {
            if let Some(content) = self.get_file(candidate) {
                return Ok((candidate.clone(), content));
            }
        }
        Err(RuntimeError::ModuleNotFound { path: path.to_string(), loc: None })
    }

    pub fn get_cached(&self, resolved_path: &str) -> Option<Value> {
        self.cache.borrow().get(resolved_path).cloned()
    }

    pub fn cache(&self, resolved_path: impl Into<String>, value: Value) {
        self.cache.borrow_mut().insert(resolved_path.into(), value);
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Joins a (possibly relative) module path under a directory, the way a
/// `require("./x")` call resolves against the requiring module's directory.
/// Pure string manipulation — there is no real filesystem underneath.
fn join(dir: &str, path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    if dir.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), path)
    }
}

/// The directory portion of a resolved module path, used as `current_dir`
/// when that module itself calls `require`.
pub fn dir_of(resolved_path: &str) -> String {
    match resolved_path.rfind('/') {
        Some(idx) => resolved_path[..idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_name_with_extension() {
        let store = ModuleStore::new();
        store.add_file("math.clou", "exports.x = 1;");
        let (resolved, _) = store.get_module_source("./math.clou", "").unwrap();
        assert_eq!(resolved, "math.clou");
    }

    #[test]
    fn resolves_extensionless_path() {
        let store = ModuleStore::new();
        store.add_file("lib/math.clou", "exports.x = 1;");
        let (resolved, _) = store.get_module_source("./math", "lib").unwrap();
        assert_eq!(resolved, "lib/math.clou");
    }

    #[test]
    fn missing_path_raises() {
        let store = ModuleStore::new();
        let err = store.get_module_source("nope", "").unwrap_err();
        assert!(matches!(err, RuntimeError::ModuleNotFound { .. }));
    }
}
