use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

/// Assembly limits and output options.
///
/// Loaded from YAML; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nesting bound for macro invocations inside expansions
    pub max_recursion_depth: usize,
    /// Loop iterations allowed per invocation
    pub max_iterations: usize,
    pub major_version: u16,
    pub minor_version: u16,
    /// Emit `LineNumberTable` for every method
    pub line_numbers: bool,
    /// Emit the `SourceFile` class attribute
    pub source_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_recursion_depth: 32,
            max_iterations: 65536,
            major_version: 49,
            minor_version: 0,
            line_numbers: true,
            source_file: true,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|e| Error::Yaml(path.to_string(), e))
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_yaml::from_str(text).map_err(|e| Error::Yaml("<inline>".to_string(), e))
    }
}
