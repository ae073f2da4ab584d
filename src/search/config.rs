//! Query Configuration
//!
//! Parameters of one search, cloned per backend by the multiplexer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

use super::error::{SearchError, SearchResult};
use super::files::clean_path;

/// Query parameters consumed by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search expression
    pub query: String,
    /// Input files, globs or catalogs
    pub files: Vec<String>,
    /// Search mode hint, empty for the general syntax
    pub mode: Option<String>,
    /// Case sensitive matching
    pub case_sensitive: bool,
    /// Report match records; when false only statistics are produced
    pub report_index: bool,
    /// Report record payloads; when false only locators are produced
    pub report_data: bool,
    /// Bytes of context around each match
    pub surrounding: u32,
    /// Fuzziness distance
    pub fuzziness: u32,
    /// Number of processing nodes, 0 for engine default
    pub nodes: u32,
    /// Maximum number of records, 0 for no limit
    pub limit: u64,
    /// First record to report (used by `show`)
    pub offset: u64,
    /// Keep the engine's data file under this name
    pub keep_data_as: Option<String>,
    /// Keep the engine's index file under this name
    pub keep_index_as: Option<String>,
    /// Delimiter written between records in the data file
    pub delimiter: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            files: Vec::new(),
            mode: None,
            case_sensitive: true,
            report_index: true,
            report_data: true,
            surrounding: 0,
            fuzziness: 0,
            nodes: 0,
            limit: 0,
            offset: 0,
            keep_data_as: None,
            keep_index_as: None,
            delimiter: None,
        }
    }
}

impl SearchConfig {
    /// Create a case-sensitive config reporting records and data
    pub fn new<I, S>(query: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            files: files.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Builder-style limit setter
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Configuration for a statistics-only run
    pub fn count_only(mut self) -> Self {
        self.report_index = false;
        self.report_data = false;
        self
    }

    /// Check that every input and output path stays inside `home`.
    /// Absolute paths are taken relative to `home` too.
    pub fn check_relative_to_home(&self, home: &Path) -> SearchResult<()> {
        let home = clean_path(home);
        let check = |what: &'static str, path: &str| {
            let joined = Path::new(path)
                .components()
                .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
                .fold(home.clone(), |acc, c| acc.join(c));
            if clean_path(&joined).starts_with(&home) {
                Ok(())
            } else {
                Err(SearchError::OutsideHome {
                    what,
                    path: path.to_string(),
                })
            }
        };

        for path in &self.files {
            check("path", path)?;
        }
        if let Some(index) = &self.keep_index_as {
            check("index", index)?;
        }
        if let Some(data) = &self.keep_data_as {
            check("data", data)?;
        }
        Ok(())
    }
}

impl fmt::Display for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut props = Vec::new();

        if !self.query.is_empty() {
            props.push(format!("query:{}", self.query));
        }
        if !self.files.is_empty() {
            props.push(format!("files:{:?}", self.files));
        }
        if let Some(mode) = &self.mode {
            props.push(format!("mode:{:?}", mode));
        }
        if self.surrounding != 0 {
            props.push(format!("surrounding:{}", self.surrounding));
        }
        if self.fuzziness != 0 {
            props.push(format!("fuzziness:{}", self.fuzziness));
        }
        props.push(format!("cs:{}", self.case_sensitive));
        if self.nodes != 0 {
            props.push(format!("nodes:{}", self.nodes));
        }
        if self.offset != 0 {
            props.push(format!("offset:{}", self.offset));
        }
        if self.limit != 0 {
            props.push(format!("limit:{}", self.limit));
        }
        if let Some(data) = &self.keep_data_as {
            props.push(format!("data:{:?}", data));
        }
        if let Some(index) = &self.keep_index_as {
            props.push(format!("index:{:?}", index));
        }
        if let Some(delim) = &self.delimiter {
            props.push(format!("delim:{:?}", delim));
        }
        if self.report_index {
            props.push("I".to_string());
        }
        if self.report_data {
            props.push("D".to_string());
        }

        write!(f, "Config{{{}}}", props.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let cfg = SearchConfig::new("hello", ["a.txt", "b.txt"]);
        assert!(cfg.case_sensitive);
        assert!(cfg.report_index);
        assert_eq!(cfg.files, vec!["a.txt", "b.txt"]);
        assert_eq!(cfg.limit, 0);
    }

    #[test]
    fn test_display() {
        let cfg = SearchConfig::new("hello", ["a.txt"]).limit(10);
        assert_eq!(
            cfg.to_string(),
            r#"Config{query:hello, files:["a.txt"], cs:true, limit:10, I, D}"#
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let cfg = SearchConfig::new("q", ["a"]);
        let mut other = cfg.clone();
        other.files.push("b".to_string());
        assert_eq!(cfg.files.len(), 1);
    }

    #[test]
    fn test_relative_to_home() {
        let home = Path::new("/data/home");

        let ok = SearchConfig::new("q", ["a/b.txt", "./c.txt", "d/../e.txt", "/logs/a.txt"]);
        assert!(ok.check_relative_to_home(home).is_ok());

        let bad = SearchConfig::new("q", ["../../etc/passwd"]);
        let err = bad.check_relative_to_home(home).unwrap_err();
        assert!(matches!(err, SearchError::OutsideHome { what: "path", .. }));
        assert_eq!(err.to_string(), r#"path "../../etc/passwd" is not relative to home"#);

        let rooted = SearchConfig::new("q", ["/../etc/passwd"]);
        assert!(rooted.check_relative_to_home(home).is_err());

        let mut bad_index = SearchConfig::new("q", ["a.txt"]);
        bad_index.keep_index_as = Some("../index.txt".to_string());
        assert!(matches!(
            bad_index.check_relative_to_home(home),
            Err(SearchError::OutsideHome { what: "index", .. })
        ));
    }
}
