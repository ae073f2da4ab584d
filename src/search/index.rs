//! Match Locator
//!
//! An `Index` points at one match inside the source data: which file,
//! where, how long and how fuzzy the match was.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a single match within source data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Source file name
    pub file: String,
    /// Offset of the match within `file`
    pub offset: u64,
    /// Length of the matched data
    pub length: u64,
    /// Edit distance used for the match
    #[serde(default)]
    pub fuzziness: u32,
    /// Node that produced the match, set when the record crossed a peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Position of the payload in the engine's data file
    #[serde(default, rename = "datapos", skip_serializing_if = "is_zero")]
    pub data_pos: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Index {
    /// Create a new locator
    pub fn new(file: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            file: file.into(),
            offset,
            length,
            ..Default::default()
        }
    }

    /// Builder-style fuzziness setter
    pub fn fuzziness(mut self, d: u32) -> Self {
        self.fuzziness = d;
        self
    }

    /// Builder-style data position setter
    pub fn data_pos(mut self, pos: u64) -> Self {
        self.data_pos = pos;
        self
    }

    /// Set the host only if none was recorded yet
    pub fn update_host(&mut self, host: &str) -> &mut Self {
        if self.host.as_deref().map_or(true, str::is_empty) && !host.is_empty() {
            self.host = Some(host.to_string());
        }
        self
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}#{}, len:{}, d:{}}}",
            self.file, self.offset, self.length, self.fuzziness
        )
    }
}
