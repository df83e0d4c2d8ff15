use std::{
    collections::BTreeSet,
    sync::{Arc, LazyLock},
};

use regex::Regex;

use crate::domain::{
    prompt::{PromptBuilder, TemplateError},
    search_query::SearchQuery,
};

use super::{ChatMessage, CompletionClient, CompletionError};

pub const DEFAULT_MAX_PARTS: u32 = 5;

static PART_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpart\s*(\d+)\b").expect("valid part marker regex"));

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationState {
    AwaitingFirstReply,
    AwaitingContinuation { part: u32 },
    Complete,
}

/// Every `Part N` number mentioned in a reply.
pub fn part_markers(reply: &str) -> BTreeSet<u32> {
    PART_MARKER
        .captures_iter(reply)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}

/// Decides what follows the reply to `part`. A reply naming both `part` and
/// the next one is taken as the whole listing; one naming only `part` asks
/// for a continuation; anything else ends the exchange.
///
/// Prose that happens to contain "Part 2" triggers this as well.
pub fn state_after_reply(part: u32, reply: &str) -> OrchestrationState {
    let markers = part_markers(reply);

    match (markers.contains(&part), markers.contains(&(part + 1))) {
        (true, false) => OrchestrationState::AwaitingContinuation { part: part + 1 },
        _ => OrchestrationState::Complete,
    }
}

pub fn continuation_prompt(part: u32) -> String {
    format!(
        "Continue with Part {} of the list. Do not repeat any companies from the previous parts \
        and keep the same numbered format.",
        part
    )
}

pub struct QueryOrchestrator {
    client: Arc<dyn CompletionClient>,
    prompt_builder: PromptBuilder,
    max_parts: u32,
}

impl QueryOrchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompt_builder: PromptBuilder,
        max_parts: u32,
    ) -> Self {
        QueryOrchestrator {
            client,
            prompt_builder,
            max_parts: max_parts.max(1),
        }
    }

    /// Runs the whole exchange for `query` and returns every reply joined by
    /// newlines. Any failure discards the replies gathered so far.
    pub async fn run(&self, query: &SearchQuery) -> Result<String, OrchestrationError> {
        let mut message = self.prompt_builder.build(query)?;
        let mut history: Vec<ChatMessage> = vec![];
        let mut segments: Vec<String> = vec![];
        let mut state = OrchestrationState::AwaitingFirstReply;

        loop {
            let part = match state {
                OrchestrationState::AwaitingFirstReply => 1,
                OrchestrationState::AwaitingContinuation { part } => part,
                OrchestrationState::Complete => break,
            };

            if segments.len() as u32 >= self.max_parts {
                log::warn!(
                    "Stopping {} after {} parts; the listing still asks for part {}",
                    query,
                    segments.len(),
                    part
                );
                break;
            }

            log::info!("Requesting part {} for {}", part, query);
            let reply = self.client.send(&message, &history).await?;

            state = state_after_reply(part, &reply);
            history.push(ChatMessage::user(message.clone()));
            history.push(ChatMessage::assistant(reply.clone()));
            segments.push(reply);

            if let OrchestrationState::AwaitingContinuation { part } = state {
                message = continuation_prompt(part);
            }
        }

        Ok(segments.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        continuation_prompt, part_markers, state_after_reply, OrchestrationError,
        OrchestrationState, QueryOrchestrator,
    };
    use crate::{
        domain::{prompt::PromptBuilder, search_query::SearchQuery},
        services::{testing::ScriptedClient, ChatRole, CompletionError},
    };

    const TEMPLATE: &str = "Find buyers of {keyword} (HS {hs_code}) in {country}.";

    fn orchestrator(client: Arc<ScriptedClient>, max_parts: u32) -> QueryOrchestrator {
        QueryOrchestrator::new(client, PromptBuilder::new(TEMPLATE), max_parts)
    }

    fn query() -> SearchQuery {
        SearchQuery::new("4015", "nitrile gloves", "Malaysia")
    }

    #[test]
    fn markers_are_case_insensitive() {
        let markers = part_markers("**PART 1**: ... see part2 ... Partners ... Part 10");

        assert_eq!(markers.into_iter().collect::<Vec<_>>(), vec![1, 2, 10]);
    }

    #[test]
    fn state_transitions() {
        assert_eq!(
            state_after_reply(1, "1. Acme Gloves"),
            OrchestrationState::Complete
        );
        assert_eq!(
            state_after_reply(1, "Part 1\n1. Acme Gloves"),
            OrchestrationState::AwaitingContinuation { part: 2 }
        );
        assert_eq!(
            state_after_reply(1, "Part 1\n1. Acme\nPart 2\n2. Beta"),
            OrchestrationState::Complete
        );
        assert_eq!(
            state_after_reply(2, "Part 3\n1. Gamma"),
            OrchestrationState::Complete
        );
    }

    #[tokio::test]
    async fn single_reply_without_markers_is_complete() {
        let client = Arc::new(ScriptedClient::replies(["1. Company Name: Acme Gloves"]));
        let answer = orchestrator(client.clone(), 5).run(&query()).await.unwrap();

        assert_eq!(answer, "1. Company Name: Acme Gloves");
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].prompt,
            "Find buyers of nitrile gloves (HS 4015) in Malaysia."
        );
        assert!(calls[0].history.is_empty());
    }

    #[tokio::test]
    async fn parts_are_requested_until_markers_stop() {
        let client = Arc::new(ScriptedClient::replies([
            "Part 1\n1. Company Name: Acme Gloves",
            "Part 2\n1. Company Name: Beta Supplies",
            "1. Company Name: Gamma Health",
        ]));
        let answer = orchestrator(client.clone(), 5).run(&query()).await.unwrap();

        assert_eq!(
            answer,
            "Part 1\n1. Company Name: Acme Gloves\nPart 2\n1. Company Name: Beta Supplies\n1. Company Name: Gamma Health"
        );

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].prompt, continuation_prompt(2));
        assert_eq!(calls[2].prompt, continuation_prompt(3));

        let roles: Vec<ChatRole> = calls[2].history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant
            ]
        );
        assert_eq!(calls[2].history[3].content, "Part 2\n1. Company Name: Beta Supplies");
    }

    #[tokio::test]
    async fn self_contained_listing_needs_one_call() {
        let client = Arc::new(ScriptedClient::replies([
            "Part 1\n1. Acme Gloves\nPart 2\n2. Beta Supplies",
        ]));
        orchestrator(client.clone(), 5).run(&query()).await.unwrap();

        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn endless_parts_stop_at_the_cap() {
        let client = Arc::new(ScriptedClient::from_fn(|call| {
            Ok(format!("Part {}\n1. Company Name: Company {}", call + 1, call + 1))
        }));
        let answer = orchestrator(client.clone(), 3).run(&query()).await.unwrap();

        assert_eq!(client.calls().len(), 3);
        assert!(answer.contains("Company 1"));
        assert!(answer.contains("Company 3"));
        assert!(!answer.contains("Company 4"));
    }

    #[tokio::test]
    async fn failing_continuation_discards_everything() {
        let client = Arc::new(ScriptedClient::from_fn(|call| match call {
            0 => Ok("Part 1\n1. Company Name: Acme Gloves".to_string()),
            _ => Err(CompletionError::Transport("connection reset".to_string())),
        }));
        let result = orchestrator(client.clone(), 5).run(&query()).await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Completion(CompletionError::Transport(_)))
        ));
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn template_error_happens_before_any_call() {
        let client = Arc::new(ScriptedClient::replies(["unused"]));
        let orchestrator =
            QueryOrchestrator::new(client.clone(), PromptBuilder::new("Buyers in {country}"), 5);

        let result = orchestrator.run(&query()).await;

        assert!(matches!(result, Err(OrchestrationError::Template(_))));
        assert!(client.calls().is_empty());
    }
}
