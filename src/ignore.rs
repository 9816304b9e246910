/// Exclusion rules for the crawler.
///
/// Rules live in a `.semdexignore` file at the crawl root: one glob
/// per line, `#` comments and blank lines skipped, a trailing `/` on
/// directory patterns stripped. A missing file means an empty set.
/// The set is loaded once and shared read-only for the life of a run.
use std::fs;
use std::path::{Component, Path};

use glob::Pattern;
use tracing::warn;

pub const RULES_FILE_NAME: &str = ".semdexignore";

#[derive(Debug, Default, Clone)]
pub struct IgnoreRuleSet {
    patterns: Vec<Pattern>,
}

impl IgnoreRuleSet {
    /// Load the rules file from `root`. A missing file is not an
    /// error; an unparsable line is skipped with a warning.
    pub fn load(root: &Path) -> Self {
        let rules_path = root.join(RULES_FILE_NAME);
        let Ok(content) = fs::read_to_string(&rules_path) else {
            return Self::default();
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.trim_end_matches('/');
            match Pattern::new(line) {
                Ok(p) => patterns.push(p),
                Err(e) => warn!(pattern = line, error = %e, "skipping invalid ignore pattern"),
            }
        }
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when the path, relative to `root`, or any of its ancestor
    /// prefixes matches a rule. Matching is case-sensitive fnmatch:
    /// a bare `build` rule excludes the `build/` tree anywhere it
    /// appears, `*.log` excludes by extension at any depth.
    pub fn should_ignore(&self, path: &Path, root: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        let mut prefix = String::new();
        for component in rel.components() {
            let Component::Normal(part) = component else {
                continue;
            };
            let Some(part) = part.to_str() else {
                continue;
            };
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if self.patterns.iter().any(|p| p.matches(&prefix)) {
                return true;
            }
        }
        false
    }
}
