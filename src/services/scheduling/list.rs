use chrono::Duration;

use super::{slots, DialogContext, DialogOutcome, SchedulingEngine};
use crate::models::conversation::context_keys;
use crate::models::DialogState;
use crate::services::dates;
use crate::services::scheduling::Effect;

const LOOKAHEAD_DAYS: i64 = 90;

pub(super) async fn handle(engine: &SchedulingEngine, ctx: &DialogContext<'_>) -> anyhow::Result<DialogOutcome> {
    let offset = ctx.offset();
    let day = dates::extract_date(ctx.user_text, ctx.today());

    let (from, to) = match day {
        Some(date) => slots::day_bounds(&offset, date),
        None => (ctx.now, ctx.now + Duration::days(LOOKAHEAD_DAYS)),
    };

    let mut events = engine.calendar.list_events_for_user(ctx.user_id, from, to).await?;
    events.sort_by_key(|e| e.start);

    if events.is_empty() {
        let reply = match day {
            Some(date) => format!(
                "Você não tem nenhum agendamento em {}. Quer marcar um ensaio?",
                dates::format_day(date)
            ),
            None => "Você não tem nenhum agendamento nos próximos dias. Quer marcar um ensaio?".to_string(),
        };
        return Ok(DialogOutcome::reply(reply).with_state(DialogState::ListingAppointments));
    }

    let lines: Vec<String> = events
        .iter()
        .map(|e| {
            format!(
                "• {} às {} - {}",
                dates::format_day(e.start.date_naive()),
                dates::format_time(e.start.time()),
                e.summary
            )
        })
        .collect();
    let header = if events.len() == 1 {
        "Este é o seu agendamento:"
    } else {
        "Estes são os seus agendamentos:"
    };

    let listed: Vec<serde_json::Value> = events
        .iter()
        .map(|e| serde_json::json!({ "id": e.id, "start": e.start.to_rfc3339(), "summary": e.summary }))
        .collect();

    Ok(DialogOutcome::reply(format!("{header}\n{}", lines.join("\n")))
        .with_state(DialogState::ListingAppointments)
        .effect(Effect::SetContext(context_keys::APPOINTMENTS, serde_json::Value::Array(listed))))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::services::markers::Marker;

    #[tokio::test]
    async fn test_lists_in_start_order() {
        let (engine, _) = engine(vec![
            event("ev2", "u1", "Book externo", "2025-06-10T14:00:00-03:00"),
            event("ev1", "u1", "Ensaio gestante", "2025-05-27T15:00:00-03:00"),
            event("ev3", "u2", "Ensaio de outro cliente", "2025-05-28T15:00:00-03:00"),
        ]);
        let outcome = engine.handle(Marker::List, &ctx("quais são meus agendamentos?")).await.unwrap().unwrap();

        let first = outcome.reply.find("Ensaio gestante").unwrap();
        let second = outcome.reply.find("Book externo").unwrap();
        assert!(first < second);
        assert!(!outcome.reply.contains("outro cliente"));
        assert!(outcome.reply.contains("terça-feira, 27/05 às 15:00"));
    }

    #[tokio::test]
    async fn test_restricted_to_named_day() {
        let (engine, _) = engine(vec![
            event("ev1", "u1", "Ensaio gestante", "2025-05-27T15:00:00-03:00"),
            event("ev2", "u1", "Book externo", "2025-06-10T14:00:00-03:00"),
        ]);
        let outcome = engine.handle(Marker::List, &ctx("o que tenho dia 27?")).await.unwrap().unwrap();
        assert!(outcome.reply.contains("Ensaio gestante"));
        assert!(!outcome.reply.contains("Book externo"));
    }

    #[tokio::test]
    async fn test_empty_state() {
        let (engine, _) = engine(vec![event("ev1", "u1", "Antigo", "2025-05-01T15:00:00-03:00")]);
        let outcome = engine.handle(Marker::List, &ctx("meus agendamentos")).await.unwrap().unwrap();
        assert!(outcome.reply.contains("não tem nenhum agendamento"));
    }
}
