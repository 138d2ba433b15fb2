//! Error-message helpers with actionable suggestions for common operator mistakes.

use anyhow::Result;

/// Adds a short numbered list of suggestions to an error's display text.
pub trait EnhancedError<T> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> EnhancedError<T> for Result<T, E> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T> {
        self.map_err(|e| {
            let mut error_msg = format!("{msg}\n\n{e}");
            if !help.is_empty() {
                error_msg.push_str("\n\nPossible solutions:");
                for (i, h) in help.iter().enumerate() {
                    error_msg.push_str(&format!("\n  {}. {h}", i + 1));
                }
            }
            anyhow::anyhow!(error_msg)
        })
    }
}

pub mod helpers {
    pub const STORAGE_CONNECTION_HELP: &[&str] = &[
        "Verify MEMORY_DATABASE_URL is correct",
        "Check network connectivity if using a remote libsql/turso database",
        "Try a local database instead: MEMORY_DATABASE_URL=file:./memory.db",
    ];

    pub const CONFIG_ERROR_HELP: &[&str] = &[
        "Check the required environment variables (MEMORY_DATABASE_URL, MEMORY_REDB_PATH)",
        "Run 'memory-cli health' to validate the current configuration",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_with_help_appends_numbered_suggestions() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let enhanced = result.context_with_help("operation failed", &["try this", "then this"]);
        let message = enhanced.unwrap_err().to_string();
        assert!(message.contains("Possible solutions:"));
        assert!(message.contains("1. try this"));
        assert!(message.contains("2. then this"));
    }

    #[test]
    fn context_with_help_omits_section_when_empty() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let enhanced = result.context_with_help("operation failed", &[]);
        assert!(!enhanced.unwrap_err().to_string().contains("Possible solutions:"));
    }
}
