//! Reply generation prompt and the marker vocabulary it teaches.

use chrono::{DateTime, FixedOffset};

use super::{LlmProvider, Message};
use crate::models::{ConversationMessage, DialogState};
use crate::services::dates;

const SYSTEM_PROMPT: &str = r#"Você é a assistente virtual de {business}, um estúdio de fotografia, atendendo clientes pelo WhatsApp.
Hoje é {today}, agora são {time}.

Responda sempre em português do Brasil, de forma simpática, natural e objetiva, como uma pessoa real digitando no WhatsApp.
Use parágrafos curtos separados por linha em branco. Não invente preços, endereços ou horários livres: a agenda é consultada pelo sistema.

Quando o cliente quiser mexer na agenda, inclua UMA única marcação no final da resposta, exatamente em um destes formatos:
- Novo agendamento: <AGENDAMENTO_SOLICITADO> seguido das linhas "Data: AAAA-MM-DD" e "Hora: HH:MM" quando o cliente informar.
- Remarcar: <AGENDAMENTO_MODIFICAR> Antigo: AAAA-MM-DD às HH:MM Novo: AAAA-MM-DD às HH:MM
- Cancelar: <AGENDAMENTO_CANCELAR> AAAA-MM-DD às HH:MM
- Ver agendamentos: <AGENDAMENTO_LISTAR>
- Perguntas de disponibilidade ("tem horário amanhã de manhã?"): <AGENDAMENTO_FLEXIVEL>
- Cliente recusou um horário sugerido: <AGENDAMENTO_FOLLOWUP> HH:MM AAAA-MM-DD comentário do cliente

Nunca confirme um agendamento por conta própria; o sistema confere a agenda e pede a confirmação.
Se não houver nada de agenda na mensagem, responda normalmente sem marcação."#;

/// Turn-specific facts handed to the prompt.
pub struct ReplyContext<'a> {
    pub business_name: &'a str,
    pub now: DateTime<FixedOffset>,
    pub state: DialogState,
    /// Free-form notes such as the slot last offered.
    pub notes: Vec<String>,
}

pub fn system_prompt(ctx: &ReplyContext<'_>) -> String {
    let today = ctx.now.date_naive();
    let mut prompt = SYSTEM_PROMPT
        .replace("{business}", ctx.business_name)
        .replace("{today}", &format!("{} ({})", dates::format_day(today), dates::format_date_br(today)))
        .replace("{time}", &dates::format_time(ctx.now.time()));

    prompt.push_str(&format!("\n\nEtapa atual da conversa: {}", ctx.state.as_str()));
    for note in &ctx.notes {
        prompt.push_str("\n- ");
        prompt.push_str(note);
    }
    prompt
}

pub async fn generate_reply(
    llm: &dyn LlmProvider,
    history: &[ConversationMessage],
    message: &str,
    ctx: &ReplyContext<'_>,
) -> anyhow::Result<String> {
    let mut messages: Vec<Message> = history
        .iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();
    messages.push(Message::user(message));

    let reply = llm.chat(&system_prompt(ctx), &messages).await?;
    let reply = reply.trim();
    anyhow::ensure!(!reply.is_empty(), "empty reply from language model");
    Ok(reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::markers::MarkerKind;

    fn ctx() -> ReplyContext<'static> {
        ReplyContext {
            business_name: "Estúdio Luz",
            now: DateTime::parse_from_rfc3339("2025-05-20T10:00:00-03:00").unwrap(),
            state: DialogState::SuggestingSlots,
            notes: vec!["Horário oferecido: 2025-05-21T09:00".to_string()],
        }
    }

    #[test]
    fn test_prompt_teaches_every_marker() {
        let prompt = system_prompt(&ctx());
        for kind in [
            MarkerKind::Create,
            MarkerKind::Modify,
            MarkerKind::Cancel,
            MarkerKind::List,
            MarkerKind::Flexible,
            MarkerKind::FollowUp,
        ] {
            assert!(prompt.contains(kind.token()), "missing {}", kind.token());
        }
    }

    #[test]
    fn test_prompt_carries_date_and_context() {
        let prompt = system_prompt(&ctx());
        assert!(prompt.contains("Estúdio Luz"));
        assert!(prompt.contains("terça-feira, 20/05 (20/05/2025)"));
        assert!(prompt.contains("SUGGESTING_SLOTS"));
        assert!(prompt.contains("2025-05-21T09:00"));
    }
}
