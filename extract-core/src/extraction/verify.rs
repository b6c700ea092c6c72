//! Re-checking candidate theorems in isolated sessions.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::lean::{has_errors, Session, SessionConfig};

/// Decides whether a candidate theorem stands on its own.
#[async_trait]
pub trait Verify: Send + Sync {
    /// Check `full_formal_statement` under `header`.
    ///
    /// `Ok(false)` rejects the candidate; `Err` means the check itself could
    /// not run.
    async fn verify(&self, header: &str, full_formal_statement: &str) -> Result<bool>;
}

/// Source submitted to check one candidate.
pub fn verification_source(header: &str, full_formal_statement: &str) -> String {
    format!("{}\n{}", header, full_formal_statement)
}

/// Verifies each candidate in a fresh Lean REPL session.
#[derive(Debug, Clone)]
pub struct SessionVerifier {
    config: SessionConfig,
}

impl SessionVerifier {
    /// Create a verifier spawning sessions from `config`.
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Verify for SessionVerifier {
    async fn verify(&self, header: &str, full_formal_statement: &str) -> Result<bool> {
        let mut session = Session::open(self.config.clone()).await?;
        let submitted = session
            .submit(&verification_source(header, full_formal_statement))
            .await;

        // The session is closed before the submission result is inspected.
        let closed = session.close().await;
        let messages = submitted?;
        if let Err(e) = closed {
            warn!("Verification session did not shut down cleanly: {}", e);
        }

        let accepted = !has_errors(&messages);
        debug!(accepted, messages = messages.len(), "Candidate re-checked");
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_source() {
        assert_eq!(
            verification_source("import Mathlib\n", "theorem t : True := trivial"),
            "import Mathlib\n\ntheorem t : True := trivial"
        );
    }

    #[cfg(unix)]
    fn rejecting_sorry() -> SessionVerifier {
        // The request is one JSON line; reject anything mentioning `sorry`.
        let script = r#"read line; case "$line" in
  *sorry*) printf '{"messages": [{"severity": "error", "data": "declaration uses sorry"}]}\n' ;;
  *) printf '{"messages": [{"severity": "info", "data": "ok"}]}\n' ;;
esac"#;
        SessionVerifier::new(SessionConfig::program(
            "sh",
            vec!["-c".to_string(), script.to_string()],
        ))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_verify_accepts_and_rejects() {
        let verifier = rejecting_sorry();
        assert!(verifier
            .verify("import Mathlib", "theorem a : 1 = 1 := rfl")
            .await
            .unwrap());
        assert!(!verifier
            .verify("import Mathlib", "theorem b : 1 = 2 := sorry")
            .await
            .unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let verifier = rejecting_sorry();
        for statement in ["theorem a : 1 = 1 := rfl", "theorem b : 1 = 2 := sorry"] {
            let first = verifier.verify("import Mathlib", statement).await.unwrap();
            let second = verifier.verify("import Mathlib", statement).await.unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_verify_surfaces_spawn_failure() {
        let verifier =
            SessionVerifier::new(SessionConfig::program("/nonexistent/repl", Vec::new()));
        assert!(verifier.verify("import Mathlib", "theorem t : True").await.is_err());
    }
}
