//! Interactive confirmation for the engine

use async_trait::async_trait;
use dialoguer::{Confirm, theme::ColorfulTheme};
use strata_engine::prompt::OperatorPrompt;

/// Asks on the terminal; anything but an explicit "yes" declines
pub struct TerminalPrompt;

#[async_trait]
impl OperatorPrompt for TerminalPrompt {
    async fn confirm(&self, question: &str) -> bool {
        let question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(yes)) => yes,
            Ok(Err(e)) => {
                tracing::warn!("Confirmation prompt failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("Confirmation prompt panicked: {}", e);
                false
            }
        }
    }
}
