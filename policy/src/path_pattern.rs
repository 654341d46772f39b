//! Filesystem path pattern classification, glob-to-regex translation, and
//! ancestor enumeration.
//!
//! Ancestor enumeration is what feeds the write-unlink "rename defense": a
//! read-denied path is useless to protect if an attacker can simply rename
//! one of its ancestor directories out from under it, so every builder that
//! consumes [`PathPattern::ancestors`] must deny `file-write-unlink` (or the
//! platform equivalent) on every entry it returns, not just the pattern
//! itself.

use std::path::Path;
use std::path::PathBuf;

/// A single filesystem rule as supplied in policy input: either an absolute
/// literal path or a glob containing `*`, `?`, or `[...]`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathPattern(String);

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

impl PathPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_glob(&self) -> bool {
        is_glob(&self.0)
    }

    /// The deepest directory prefix that contains no glob metacharacters.
    pub fn literal_prefix(&self) -> PathBuf {
        PathBuf::from(literal_prefix(&self.0))
    }

    /// `[literal_prefix, parent(literal_prefix), ..., "/"]`, deepest first.
    pub fn ancestors(&self) -> Vec<PathBuf> {
        ancestors_of(&self.literal_prefix())
    }

    pub fn to_regex(&self) -> Result<regex_lite::Regex, PatternError> {
        glob_to_regex(&self.0)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_glob(pattern: &str) -> bool {
    pattern.chars().any(|c| matches!(c, '*' | '?' | '['))
}

fn literal_prefix(pattern: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in pattern.split('/') {
        if segment.chars().any(|c| matches!(c, '*' | '?' | '[')) {
            break;
        }
        segments.push(segment);
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments.join("/")
    }
}

/// `[path, parent(path), ..., "/"]`. Terminates at the filesystem root or at
/// the first ancestor with no further parent (for non-absolute input).
pub fn ancestors_of(path: &Path) -> Vec<PathBuf> {
    let mut out = vec![path.to_path_buf()];
    let mut current = path.to_path_buf();
    while let Some(parent) = current.parent() {
        out.push(parent.to_path_buf());
        if parent.as_os_str() == "/" {
            break;
        }
        current = parent.to_path_buf();
    }
    out
}

/// Translates a glob into an anchored regex: `**` crosses directory
/// boundaries, `*` and `?` do not, character classes pass through verbatim.
pub fn glob_to_regex(pattern: &str) -> Result<regex_lite::Regex, PatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 2;
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let start = i;
                let mut j = i + 1;
                if matches!(chars.get(j), Some('!') | Some('^')) {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j < chars.len() {
                    let class: String = chars[start..=j].iter().collect();
                    out.push_str(&class.replacen('!', "^", 1));
                    i = j + 1;
                    continue;
                }
                out.push_str("\\[");
            }
            c if is_regex_metachar(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        i += 1;
    }
    out.push('$');
    regex_lite::Regex::new(&out).map_err(|source| PatternError::InvalidGlob {
        pattern: pattern.to_string(),
        source,
    })
}

fn is_regex_metachar(c: char) -> bool {
    matches!(c, '.' | '+' | '(' | ')' | '|' | '^' | '$' | '\\' | '{' | '}')
}
