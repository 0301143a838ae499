// ~/src/data_loaders/yaml.rs

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{LazyLock, RwLock},
    time::{Duration, Instant},
};

use serde_yaml::Value;

/* =========================
   CONFIG CACHE
========================= */

// Per-file cache for YAML data
static YAML_CACHE: LazyLock<RwLock<HashMap<String, (Value, Instant)>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
const CACHE_TTL: Duration = Duration::from_secs(1);
const CACHE_CAPACITY: usize = 16;

/// YAML loader with a short per-file cache.
pub fn load_yaml(path: &Path) -> Option<Value> {
    let now = Instant::now();
    let key = cache_key(path);
    {
        let cache = YAML_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some((v, t)) = cache.get(&key) {
            if now.duration_since(*t) < CACHE_TTL {
                return Some(v.clone());
            }
        }
    }

    let txt = fs::read_to_string(path).ok()?;
    let v: Value = serde_yaml::from_str(&txt).ok()?;
    let mut cache = YAML_CACHE.write().unwrap_or_else(|e| e.into_inner());

    if cache.len() >= CACHE_CAPACITY {
        if let Some(oldest_key) = cache
            .iter()
            .min_by_key(|(_, (_, t))| t)
            .map(|(k, _)| k.clone())
        {
            cache.remove(&oldest_key);
        }
    }

    cache.insert(key, (v.clone(), now));
    Some(v)
}

/// Drops the cached copy of `path` so the next load reads the file again.
pub fn forget(path: &Path) {
    YAML_CACHE
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&cache_key(path));
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forget_forces_a_fresh_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "value: 1").unwrap();
        assert_eq!(load_yaml(&path).unwrap()["value"].as_i64(), Some(1));

        fs::write(&path, "value: 2").unwrap();
        assert_eq!(load_yaml(&path).unwrap()["value"].as_i64(), Some(1));

        forget(&path);
        assert_eq!(load_yaml(&path).unwrap()["value"].as_i64(), Some(2));
    }

    #[test]
    fn unparsable_yaml_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "settings: [unclosed").unwrap();
        assert!(load_yaml(&path).is_none());
        assert!(load_yaml(&dir.path().join("absent.yaml")).is_none());
    }
}
