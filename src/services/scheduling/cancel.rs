use chrono::NaiveDateTime;

use super::{slots, DialogContext, DialogOutcome, SchedulingEngine};
use crate::models::{DialogState, EventDetails};
use crate::services::dates;

pub(super) async fn handle(
    engine: &SchedulingEngine,
    ctx: &DialogContext<'_>,
    at: NaiveDateTime,
) -> anyhow::Result<DialogOutcome> {
    let offset = ctx.offset();
    let start = slots::local(&offset, at.date(), at.time());

    let found = engine
        .events_for_day(ctx.user_id, at.date(), &offset)
        .await?
        .into_iter()
        .find(|e| e.start == start);

    let Some(event) = found else {
        return Ok(DialogOutcome::reply(format!(
            "Não encontrei nenhum agendamento seu em {} às {}. Quer que eu liste seus horários marcados?",
            dates::format_day(at.date()),
            dates::format_time(at.time())
        ))
        .with_state(DialogState::SelectingAppointmentToCancel));
    };

    let reply = format!(
        "Confirma o cancelamento do seu {} de {} às {}?",
        event.summary.to_lowercase(),
        dates::format_day(at.date()),
        dates::format_time(at.time())
    );

    Ok(DialogOutcome::reply(reply)
        .with_state(DialogState::ConfirmingCancellation)
        .staging(EventDetails::Cancel {
            event_id: event.id,
            summary: event.summary,
            start,
        }))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::services::markers::Marker;

    fn cancel(s: &str) -> Marker {
        Marker::Cancel {
            at: NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_exact_match_is_staged() {
        let (engine, calendar) = engine(vec![event("ev1", "u1", "Ensaio", "2025-05-27T15:00:00-03:00")]);
        let outcome = engine
            .handle(cancel("2025-05-27 15:00"), &ctx("quero cancelar"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.next_state, Some(DialogState::ConfirmingCancellation));
        assert!(matches!(outcome.staged, Some(EventDetails::Cancel { ref event_id, .. }) if event_id == "ev1"));
        // Nothing deleted until confirmed
        assert_eq!(calendar.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_users_event_is_not_found() {
        let (engine, _) = engine(vec![event("ev1", "u2", "Ensaio", "2025-05-27T15:00:00-03:00")]);
        let outcome = engine
            .handle(cancel("2025-05-27 15:00"), &ctx("quero cancelar"))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.staged.is_none());
        assert_eq!(outcome.next_state, Some(DialogState::SelectingAppointmentToCancel));
    }
}
