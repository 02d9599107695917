use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use eyre::Result;
use tracing::warn;

/// On-disk store of entity tags and the response bodies they validate.
///
/// Layout: `<dir>/etags.json` maps cache keys to tags, `<dir>/responses/<key>.json`
/// holds the last 2xx body seen for the key.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn etag_file(&self) -> PathBuf {
        self.dir.join("etags.json")
    }

    fn response_path(&self, key: &str) -> PathBuf {
        self.dir.join("responses").join(format!("{}.json", sanitize_key(key)))
    }

    fn load_etags(&self) -> BTreeMap<String, String> {
        let path = self.etag_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(tags) => tags,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read etag cache, resetting");
                if let Err(e) = write_file(&path, "{}") {
                    warn!(path = %path.display(), error = %e, "Failed to reset etag cache");
                }
                BTreeMap::new()
            }
        }
    }

    pub fn etag(&self, key: &str) -> Option<String> {
        self.load_etags().remove(key)
    }

    pub fn cached_body(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.response_path(key)).ok()
    }

    /// Stores the body and, when present, its tag.
    pub fn store(&self, key: &str, etag: Option<&str>, body: &str) -> Result<()> {
        write_file(&self.response_path(key), body)?;
        if let Some(tag) = etag {
            let mut tags = self.load_etags();
            tags.insert(key.to_string(), tag.to_string());
            write_file(&self.etag_file(), &serde_json::to_string_pretty(&tags)?)?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

// Keys end up in file names. Alphanumerics and '-' pass through, every other
// byte (including '_') becomes `_XX`, so distinct keys never share a file.
fn sanitize_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{byte:02X}"));
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stores_body_and_tag_per_key() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());

        assert_eq!(cache.etag("btc-usd-daily"), None);
        assert_eq!(cache.cached_body("btc-usd-daily"), None);

        cache.store("btc-usd-daily", Some("W/\"abc\""), r#"{"prices":[]}"#).unwrap();
        cache.store("btc-usd-hourly", None, "{}").unwrap();

        assert_eq!(cache.etag("btc-usd-daily").as_deref(), Some("W/\"abc\""));
        assert_eq!(cache.cached_body("btc-usd-daily").as_deref(), Some(r#"{"prices":[]}"#));
        assert_eq!(cache.etag("btc-usd-hourly"), None);
        assert_eq!(cache.cached_body("btc-usd-hourly").as_deref(), Some("{}"));
    }

    #[test]
    fn corrupt_tag_file_is_reset() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("etags.json"), "not json").unwrap();
        let cache = ResponseCache::new(dir.path());

        assert_eq!(cache.etag("anything"), None);
        assert_eq!(fs::read_to_string(dir.path().join("etags.json")).unwrap(), "{}");
    }

    #[test]
    fn keys_are_safe_file_names() {
        assert_eq!(sanitize_key("coingecko-bitcoin-usd-daily"), "coingecko-bitcoin-usd-daily");
        assert_eq!(sanitize_key("coingecko/bitcoin:daily"), "coingecko_2Fbitcoin_3Adaily");
    }

    #[test]
    fn similar_keys_do_not_share_a_response_file() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());

        cache.store("a/b", None, "slash").unwrap();
        cache.store("a_b", None, "underscore").unwrap();
        cache.store("a_2Fb", None, "literal").unwrap();

        assert_eq!(cache.cached_body("a/b").as_deref(), Some("slash"));
        assert_eq!(cache.cached_body("a_b").as_deref(), Some("underscore"));
        assert_eq!(cache.cached_body("a_2Fb").as_deref(), Some("literal"));
    }
}
