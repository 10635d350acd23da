use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Nothing to convert: input is empty")]
    EmptyInput,

    #[error("Failed to start converter '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter scratch IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Converter exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Converter succeeded but produced no output file '{0}'")]
    MissingOutput(String),

    #[error("Converter did not finish within {0:?}")]
    Timeout(Duration),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
