//! Unique name allocation.

use std::collections::HashMap;

/// Hands out names that are unique within one scope.
///
/// A requested name is reduced to its stem by stripping leading and trailing
/// digits and underscores. The first request for a stem returns
/// `prefix + stem`; later requests append a running number. Requests whose
/// stem is empty (or equals the default stem) fall back to the default stem
/// with a counter, e.g. `label1`, `label2`.
#[derive(Debug, Clone)]
pub struct NameTable {
    default_stem: String,
    prefix: String,
    default_used: usize,
    allocated: HashMap<String, usize>,
}

impl NameTable {
    /// Creates a table whose anonymous names look like `{prefix}{default_stem}{n}`.
    #[must_use]
    pub fn new(default_stem: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            default_stem: default_stem.into(),
            prefix: prefix.into(),
            default_used: 0,
            allocated: HashMap::new(),
        }
    }

    /// Returns a unique name derived from `requested`.
    pub fn unique(&mut self, requested: &str) -> String {
        let stem = requested.trim_matches(|c: char| c == '_' || c.is_ascii_digit());
        if stem.is_empty() || stem == self.default_stem {
            return self.fresh();
        }

        let base = format!("{}{}", self.prefix, stem);
        let counter = self.allocated.entry(stem.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        if index == 0 {
            base
        } else {
            format!("{}{}", base, index)
        }
    }

    /// Returns a fresh anonymous name.
    pub fn fresh(&mut self) -> String {
        self.default_used += 1;
        format!("{}{}{}", self.prefix, self.default_stem, self.default_used)
    }
}
