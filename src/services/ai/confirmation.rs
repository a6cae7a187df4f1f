//! Yes/no classification of answers to a confirmation question.

use std::sync::Arc;

use super::{strip_fences, LlmProvider, Message};
use crate::models::{ConfirmationIntent, ConfirmationVerdict, Intent};
use crate::services::dates::fold;
use crate::services::intent::{self, ACT_DIRECTLY};

const SYSTEM_PROMPT: &str = r#"Você classifica a resposta de um cliente a uma pergunta de confirmação (sim ou não).

Responda APENAS com JSON válido, sem markdown, neste formato:
{"intent": "CONFIRMATION|REJECTION|CONFUSION", "confidence": 0.0, "reasoning": "motivo curto"}

- CONFIRMATION: o cliente concorda, aceita ou quer continuar.
- REJECTION: o cliente recusa, desiste ou não quer continuar.
- CONFUSION: a resposta não é um sim nem um não, ou é outro assunto."#;

pub async fn classify_confirmation(
    llm: &dyn LlmProvider,
    question: Option<&str>,
    answer: &str,
) -> anyhow::Result<ConfirmationVerdict> {
    let content = match question {
        Some(q) => format!("Pergunta: {q}\nResposta do cliente: {answer}"),
        None => format!("Resposta do cliente: {answer}"),
    };
    let response = llm.chat(SYSTEM_PROMPT, &[Message::user(content)]).await?;
    parse_verdict(&response)
}

fn parse_verdict(response: &str) -> anyhow::Result<ConfirmationVerdict> {
    if let Ok(verdict) = serde_json::from_str::<ConfirmationVerdict>(response) {
        return Ok(verdict);
    }

    let cleaned = strip_fences(response);
    if let Ok(verdict) = serde_json::from_str::<ConfirmationVerdict>(cleaned) {
        return Ok(verdict);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(verdict) = serde_json::from_str::<ConfirmationVerdict>(&cleaned[start..=end]) {
                return Ok(verdict);
            }
        }
    }

    anyhow::bail!("unparseable confirmation verdict: {response}")
}

/// A bare "sim" or "não", however punctuated.
fn literal_answer(text: &str) -> Option<ConfirmationIntent> {
    let folded = fold(text);
    match folded.trim().trim_matches(|c: char| !c.is_alphanumeric()) {
        "sim" | "s" => Some(ConfirmationIntent::Confirmation),
        "nao" | "n" => Some(ConfirmationIntent::Rejection),
        _ => None,
    }
}

fn keyword_answer(text: &str) -> ConfirmationIntent {
    let classification = intent::classify(text);
    if classification.is(Intent::Confirmation, ACT_DIRECTLY) {
        ConfirmationIntent::Confirmation
    } else if classification.is(Intent::Rejection, ACT_DIRECTLY) {
        ConfirmationIntent::Rejection
    } else {
        ConfirmationIntent::Confusion
    }
}

/// Language model first, keyword rules when it is unavailable.
pub struct ConfirmationResolver {
    llm: Arc<dyn LlmProvider>,
}

impl ConfirmationResolver {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn resolve(&self, question: Option<&str>, answer: &str) -> ConfirmationIntent {
        match classify_confirmation(self.llm.as_ref(), question, answer).await {
            Ok(verdict) => {
                tracing::debug!(intent = ?verdict.main_intent, confidence = verdict.confidence, reasoning = %verdict.reasoning, "confirmation verdict");
                match (verdict.main_intent, literal_answer(answer)) {
                    (ConfirmationIntent::Confusion, Some(literal)) => literal,
                    (intent, _) => intent,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "confirmation classifier failed, using keyword rules");
                keyword_answer(answer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(anyhow::Result<String>);

    #[async_trait]
    impl LlmProvider for Canned {
        async fn chat(&self, _system: &str, _messages: &[Message]) -> anyhow::Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn resolver(response: anyhow::Result<&str>) -> ConfirmationResolver {
        ConfirmationResolver::new(Arc::new(Canned(response.map(str::to_string))))
    }

    #[test]
    fn test_parse_fenced_verdict() {
        let verdict = parse_verdict("```json\n{\"intent\":\"REJECTION\",\"confidence\":0.9,\"reasoning\":\"recusou\"}\n```").unwrap();
        assert_eq!(verdict.main_intent, ConfirmationIntent::Rejection);

        let verdict = parse_verdict("Claro! {\"intent\":\"CONFIRMATION\"}").unwrap();
        assert_eq!(verdict.main_intent, ConfirmationIntent::Confirmation);

        assert!(parse_verdict("não sei").is_err());
    }

    #[tokio::test]
    async fn test_literal_overrides_confusion() {
        let r = resolver(Ok(r#"{"intent":"CONFUSION","confidence":0.4,"reasoning":"curto demais"}"#));
        assert_eq!(r.resolve(None, "Sim!").await, ConfirmationIntent::Confirmation);
        assert_eq!(r.resolve(None, "não").await, ConfirmationIntent::Rejection);
        assert_eq!(r.resolve(None, "talvez amanhã").await, ConfirmationIntent::Confusion);
    }

    #[tokio::test]
    async fn test_keyword_fallback_on_error() {
        let r = resolver(Err(anyhow::anyhow!("offline")));
        assert_eq!(r.resolve(None, "pode ser").await, ConfirmationIntent::Confirmation);
        assert_eq!(r.resolve(None, "melhor não").await, ConfirmationIntent::Rejection);
        assert_eq!(r.resolve(None, "quero mudar o dia").await, ConfirmationIntent::Confusion);
    }
}
