//! Canonicalisation of raw pack paths into root-relative virtual paths.
//!
//! Packs store paths the way the exporting tool wrote them: usually with a
//! `res://` scheme, sometimes with backslashes, leading slashes, drive
//! letters or `..` segments. Everything returned here can be joined onto an
//! output directory without leaving it.

use std::path::{Path, PathBuf};

/// Scheme prefix used by well-formed pack paths.
pub const RES_SCHEME: &str = "res://";

const RESERVED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    /// `/`-separated, never absolute, never containing `.` or `..`.
    pub path: String,
    /// Set when the raw path had to be altered in a way that changes where it would land.
    pub malformed: bool,
}

pub fn normalize(raw: &str) -> Normalized {
    let mut malformed = false;

    let unified = raw.strip_prefix(RES_SCHEME).unwrap_or(raw).replace('\\', "/");
    let mut rest = unified.as_str();

    if has_drive_prefix(rest) {
        rest = &rest[2..];
        malformed = true;
    }
    if rest.starts_with('/') {
        rest = rest.trim_start_matches('/');
        malformed = true;
    }

    let mut out: Vec<String> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if out.pop().is_none() {
                    malformed = true;
                }
            }
            name => {
                let (clean, dirty) = clean_component(name);
                if dirty {
                    malformed = true;
                }
                match clean.as_str() {
                    "" | "." | ".." => {}
                    _ => out.push(clean),
                }
            }
        }
    }

    if out.is_empty() {
        malformed = true;
    }

    Normalized {
        path: out.join("/"),
        malformed,
    }
}

/// Joins a normalized virtual path onto `root` component by component.
pub fn join_virtual(root: &Path, virtual_path: &str) -> PathBuf {
    let mut p = root.to_path_buf();
    for part in virtual_path.split('/').filter(|s| !s.is_empty()) {
        p.push(part);
    }
    p
}

fn has_drive_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

fn clean_component(name: &str) -> (String, bool) {
    let mut dirty = false;
    let clean = name
        .chars()
        .filter_map(|c| {
            if c.is_control() {
                dirty = true;
                None
            } else if RESERVED.contains(&c) {
                dirty = true;
                Some('_')
            } else {
                Some(c)
            }
        })
        .collect();
    (clean, dirty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(raw: &str, expected: &str) {
        let n = normalize(raw);
        assert_eq!(n.path, expected, "raw = {raw:?}");
        assert!(!n.malformed, "raw = {raw:?} should be well formed");
    }

    fn bad(raw: &str, expected: &str) {
        let n = normalize(raw);
        assert_eq!(n.path, expected, "raw = {raw:?}");
        assert!(n.malformed, "raw = {raw:?} should be malformed");
    }

    #[test]
    fn res_scheme_is_canonical() {
        ok("res://scenes/main.tscn", "scenes/main.tscn");
        ok("icon.png", "icon.png");
    }

    #[test]
    fn redundant_segments_collapse() {
        ok("res://a//b/./c.txt", "a/b/c.txt");
        ok("res://a/x/../b.txt", "a/b.txt");
        ok(r"res://dir\sub\file.bin", "dir/sub/file.bin");
    }

    #[test]
    fn escaping_root_is_malformed() {
        bad("res://../../etc/passwd", "etc/passwd");
        bad("a/../../b.txt", "b.txt");
    }

    #[test]
    fn absolute_prefixes_are_stripped() {
        bad("/etc/passwd", "etc/passwd");
        bad(r"C:\Windows\win.ini", "Windows/win.ini");
        bad("//server/share/x", "server/share/x");
    }

    #[test]
    fn control_and_reserved_chars() {
        bad("res://a\0b.txt", "ab.txt");
        bad("res://what?.txt", "what_.txt");
        bad("res://dir/\u{7}", "dir");
    }

    #[test]
    fn empty_is_malformed() {
        bad("", "");
        bad("res://", "");
        bad("/", "");
        bad("..", "");
    }

    #[test]
    fn join_stays_under_root() {
        let root = Path::new("/out");
        assert_eq!(
            join_virtual(root, "a/b/c.txt"),
            PathBuf::from("/out").join("a").join("b").join("c.txt")
        );
    }
}
