//! Job configuration handed to a task runner on Start.

/// Source tag of the code input most payloads read from.
pub const PRIMARY_SOURCE: &str = "primary";

/// A named, path-bearing reference to source material a payload reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInput {
    /// Source tag (e.g. "primary").
    pub source: String,

    /// Filesystem paths for this input, in controller order.
    pub paths: Vec<String>,
}

impl CodeInput {
    /// Create a new CodeInput.
    pub fn new<I, S>(source: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single task-specific key/value parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Configuration for one job.
///
/// Immutable once received: the coordinator holds it only until it is moved
/// into the task runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfig {
    /// Code inputs, in controller order.
    pub code_inputs: Vec<CodeInput>,

    /// Directory where SPDX documents are written.
    pub spdx_output_dir: String,

    /// Directory where retrieved source code is written.
    pub code_output_dir: String,

    /// Task-specific parameters, in controller order.
    pub kvs: Vec<KeyValue>,
}

impl JobConfig {
    /// Create an empty JobConfig.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a code input.
    pub fn with_code_input(mut self, input: CodeInput) -> Self {
        self.code_inputs.push(input);
        self
    }

    /// Builder method to set the SPDX output directory.
    pub fn with_spdx_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.spdx_output_dir = dir.into();
        self
    }

    /// Builder method to set the code output directory.
    pub fn with_code_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.code_output_dir = dir.into();
        self
    }

    /// Builder method to add a key/value parameter.
    pub fn with_kv(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kvs.push(KeyValue {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Look up a key/value parameter. The last occurrence of a key wins.
    pub fn kv(&self, key: &str) -> Option<&str> {
        self.kvs
            .iter()
            .rev()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_lookup_last_wins() {
        let config = JobConfig::new()
            .with_kv("org", "one")
            .with_kv("org", "two");

        assert_eq!(config.kv("org"), Some("two"));
        assert_eq!(config.kv("repo"), None);
    }

    #[test]
    fn test_kvs_keep_order() {
        let config = JobConfig::new().with_kv("b", "2").with_kv("a", "1");
        let keys: Vec<&str> = config.kvs.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
