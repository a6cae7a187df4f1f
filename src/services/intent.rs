//! Keyword intent classifier.
//!
//! An ordered list of rules evaluated with early exit. Whole-message rules
//! (greeting, thanks, farewell, confirmation, rejection) come first, keyword
//! scans for the scheduling intents after. Confidences are fixed per rule.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Classification, Intent};
use crate::services::dates::fold;

/// Callers act on a classification directly at or above this confidence.
pub const ACT_DIRECTLY: f32 = 0.8;
/// At or above this, quick replies skip reply generation entirely.
pub const BYPASS_PIPELINE: f32 = 0.9;

struct Rule {
    name: &'static str,
    intent: Intent,
    confidence: f32,
    pattern: Regex,
}

fn rule(name: &'static str, intent: Intent, confidence: f32, pattern: &str) -> Rule {
    Rule {
        name,
        intent,
        confidence,
        pattern: Regex::new(pattern).unwrap(),
    }
}

// Patterns run against folded (lowercase, accent-free) text.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            "greeting",
            Intent::Greeting,
            0.9,
            r"^(oi+|ola|opa|bom dia|boa tarde|boa noite|e ai|eai|hey|hello|hi|tudo bem|oi,? tudo bem)[\s!.,?]*$",
        ),
        rule(
            "thanks",
            Intent::Thanks,
            0.9,
            r"^(muito )?(obrigad[oa]s?|obg|valeu|vlw|agradeco|grat[oa])( mesmo)?[\s!.,]*$",
        ),
        rule(
            "farewell",
            Intent::Farewell,
            0.9,
            r"^(tchau|ate (logo|mais|breve|amanha)|adeus|falou|flw|bom descanso)[\s!.,]*$",
        ),
        rule(
            "confirmation",
            Intent::Confirmation,
            0.95,
            r"^(sim|s|ss|isso|isso mesmo|ok|okay|certo|claro|pode|pode ser|pode sim|confirmo|confirmado|perfeito|beleza|blz|fechado|combinado|com certeza|quero|yes|uhum|aham)[\s!.,]*$",
        ),
        rule(
            "rejection",
            Intent::Rejection,
            0.95,
            r"^(nao|n|nao quero|nao obrigad[oa]|negativo|melhor nao|nem|no|nope|deixa|deixa pra la)[\s!.,]*$",
        ),
        rule(
            "cancel",
            Intent::Cancel,
            0.85,
            r"\b(cancelar|cancela|cancelamento|desmarcar|desmarca)\b",
        ),
        rule(
            "reschedule",
            Intent::Reschedule,
            0.85,
            r"\b(remarcar|remarca|reagendar|reagenda|mudar (o |a )?(horario|data|dia)|trocar (o |a )?(horario|data|dia)|alterar (o |a |meu |minha )?(horario|data|agendamento|sessao|ensaio))\b",
        ),
        rule(
            "list",
            Intent::List,
            0.8,
            r"\b(meus agendamentos|minhas sessoes|meus ensaios|meus horarios|(o que|oque) (eu )?tenho marcado|quais (sao )?(os )?meus|listar|ver (meus|minhas))\b",
        ),
        rule(
            "schedule",
            Intent::Schedule,
            0.8,
            r"\b(marcar|agendar|agendamento|reservar|ensaio|sessao|horario|horarios|disponivel|disponibilidade|vaga|vagas|agenda)\b",
        ),
        rule(
            "confusion",
            Intent::Confusion,
            0.7,
            r"(\bnao entendi\b|\bcomo assim\b|\bhein\b|^\?+$|\?{2,}|\bque\?)",
        ),
    ]
});

pub fn classify(text: &str) -> Classification {
    let folded = fold(text.trim());
    if folded.is_empty() {
        return Classification::none();
    }

    RULES
        .iter()
        .find(|r| r.pattern.is_match(&folded))
        .map(|r| Classification {
            main_intent: Some(r.intent),
            confidence: r.confidence,
            context: Some(r.name),
        })
        .unwrap_or_else(Classification::none)
}
