//! Configuration for the compute module.

use serde::{Deserialize, Serialize};

use crate::command::CommandTemplate;

/// Configuration for the external compute tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Program to run.
    pub program: String,

    /// Arguments; `{input}`, `{output}`, `{parameter}` and `{key}` are substituted.
    #[serde(default)]
    pub args: Vec<String>,

    /// Artifact file names the tool writes into `{output}`, in upload order.
    pub artifacts: Vec<String>,

    /// Timeout for one run in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    48 * 3600 // full flow cells on a single GPU
}

impl ComputeConfig {
    /// Creates a config for `program` producing `artifacts`.
    pub fn new<I, S>(program: impl Into<String>, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: Vec::new(),
            artifacts: artifacts.into_iter().map(Into::into).collect(),
            timeout_secs: default_timeout(),
        }
    }

    /// Sets the argument template.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Program and arguments as a single template.
    pub fn template(&self) -> CommandTemplate {
        CommandTemplate::new(std::iter::once(self.program.clone()).chain(self.args.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            program = "basecaller"
            artifacts = ["reads.bam"]
        "#;
        let config: ComputeConfig = toml::from_str(toml).unwrap();
        assert!(config.args.is_empty());
        assert_eq!(config.timeout_secs, 48 * 3600);
    }

    #[test]
    fn test_template_includes_program() {
        let config = ComputeConfig::new("basecaller", ["reads.bam"]).with_args(["{parameter}", "{input}"]);
        let (program, args) = config
            .template()
            .render(&[("parameter", "sup"), ("input", "/in")])
            .unwrap();
        assert_eq!(program, "basecaller");
        assert_eq!(args, vec!["sup", "/in"]);
    }
}
