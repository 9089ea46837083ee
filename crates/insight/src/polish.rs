//! Optional prose polishing.
//!
//! The structured [`Response`] is complete on its own; a polisher only
//! rewords it.  Polisher failures and timeouts are logged and swallowed so
//! insight generation never depends on an external collaborator.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::response::Response;

/// Context handed to a polisher alongside the structured response.
#[derive(Debug, Clone, Default)]
pub struct PolishFacts {
    pub user_name: Option<String>,
    pub symptoms: Vec<String>,
}

#[async_trait]
pub trait ResponsePolisher: Send + Sync {
    /// Turn the structured response into user-facing prose.
    async fn polish(&self, response: &Response, facts: &PolishFacts) -> Result<String>;
}

/// Run `polisher` with a deadline.  Returns `None` on timeout or error; the
/// caller falls back to rendering the structured response directly.
pub async fn polish_with_timeout(
    polisher: &dyn ResponsePolisher,
    response: &Response,
    facts: &PolishFacts,
    deadline: Duration,
) -> Option<String> {
    match tokio::time::timeout(deadline, polisher.polish(response, facts)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(error)) => {
            warn!(%error, "response polisher failed; using structured output");
            None
        }
        Err(_) => {
            warn!(deadline_ms = deadline.as_millis() as u64, "response polisher timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    struct Upbeat;

    #[async_trait]
    impl ResponsePolisher for Upbeat {
        async fn polish(&self, _response: &Response, facts: &PolishFacts) -> Result<String> {
            Ok(format!("Hang in there, {}!", facts.user_name.as_deref().unwrap_or("friend")))
        }
    }

    struct Failing;

    #[async_trait]
    impl ResponsePolisher for Failing {
        async fn polish(&self, _response: &Response, _facts: &PolishFacts) -> Result<String> {
            Err(anyhow!("upstream unavailable"))
        }
    }

    struct Stuck;

    #[async_trait]
    impl ResponsePolisher for Stuck {
        async fn polish(&self, _response: &Response, _facts: &PolishFacts) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn successful_polish_returns_prose() {
        let facts = PolishFacts { user_name: Some("Sam".to_string()), symptoms: vec![] };
        let text =
            polish_with_timeout(&Upbeat, &Response::default(), &facts, Duration::from_secs(1))
                .await;
        assert_eq!(text.as_deref(), Some("Hang in there, Sam!"));
    }

    #[tokio::test]
    async fn failure_is_swallowed() {
        let out = polish_with_timeout(
            &Failing,
            &Response::default(),
            &PolishFacts::default(),
            Duration::from_secs(1),
        )
        .await;
        assert!(out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_swallowed() {
        let out = polish_with_timeout(
            &Stuck,
            &Response::default(),
            &PolishFacts::default(),
            Duration::from_millis(50),
        )
        .await;
        assert!(out.is_none());
    }
}
