//! Operator confirmation

use async_trait::async_trait;

/// Asks the person running the pipeline to confirm a risky step
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Fixed answer, for `--yes` and non-interactive use
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl OperatorPrompt for FixedAnswer {
    async fn confirm(&self, question: &str) -> bool {
        tracing::info!("{} -> {}", question, if self.0 { "yes" } else { "no" });
        self.0
    }
}
