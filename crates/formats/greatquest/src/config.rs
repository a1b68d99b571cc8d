use serde::{Deserialize, Serialize};

/// Options for loading and saving containers.
///
/// Everything strict is on by default. Relax individual checks by setting
/// their fields, or use `from_skip_list` with check names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Byte written after the terminator of fixed-width names.
    pub name_padding: u8,
    /// Reject containers whose TOC groups disagree with the chunks that follow them.
    pub strict_toc: bool,
    /// Reject script commands carrying non-zero arguments beyond their declared arity.
    /// When off, the extra arguments are kept verbatim and a warning is logged.
    pub strict_arity: bool,
    /// Warn when a TOC group is not in canonical (kind, name) order.
    pub warn_unsorted: bool,
    /// Decode the containers of a session on the rayon pool.
    pub parallel_decode: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            name_padding: 0x00,
            strict_toc: true,
            strict_arity: true,
            warn_unsorted: true,
            parallel_decode: true,
        }
    }
}

impl LoadConfig {
    /// Create a config with all checks enabled except those in the skip list.
    ///
    /// Check names:
    /// - `"strict-toc"`
    /// - `"strict-arity"`
    /// - `"sort-warnings"`
    /// - `"parallel"`
    pub fn from_skip_list(skip: &[&str]) -> Self {
        let mut config = Self::default();
        for name in skip {
            match *name {
                "strict-toc" => config.strict_toc = false,
                "strict-arity" => config.strict_arity = false,
                "sort-warnings" => config.warn_unsorted = false,
                "parallel" => config.parallel_decode = false,
                _ => {}
            }
        }
        config
    }

    pub fn with_padding(mut self, padding: u8) -> Self {
        self.name_padding = padding;
        self
    }
}

/// Options for running triggers through the script engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Upper bound on triggers raised by effects while handling one fired trigger.
    pub max_cascade: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { max_cascade: 64 }
    }
}
