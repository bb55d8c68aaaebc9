use serde::{Deserialize, Serialize};

/// Knobs for a verification or extraction run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Leave entries whose raw path had to be repaired out of both passes.
    pub skip_malformed_paths: bool,
    /// Do not extract entries that have not passed checksum verification.
    pub skip_failed_md5: bool,
    /// Run a verification pass over the selected entries before extracting.
    pub should_check_md5: bool,
    /// Fan out over a worker pool; `false` processes entries one by one on the caller's thread.
    pub multi_thread: bool,
    /// Pool size for `multi_thread`; `None` or `0` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            skip_malformed_paths: false,
            skip_failed_md5: false,
            should_check_md5: false,
            multi_thread: true,
            threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let o: DumpOptions = serde_json::from_str(r#"{ "skip_failed_md5": true }"#).unwrap();
        assert!(o.skip_failed_md5);
        assert!(o.multi_thread);
        assert_eq!(o.threads, None);
        assert!(!o.should_check_md5);
    }

    #[test]
    fn serializes_every_field() {
        let v = serde_json::to_value(DumpOptions::default()).unwrap();
        assert_eq!(v["multi_thread"], true);
        assert!(v.get("skip_malformed_paths").is_some());
        assert!(v["threads"].is_null());
    }
}
