use chrono::{DateTime, FixedOffset, NaiveDateTime};

use super::{slots, DialogContext, DialogOutcome, SchedulingEngine};
use crate::models::{CalendarEvent, DialogState, EventDetails};
use crate::services::dates;

pub(super) async fn handle(
    engine: &SchedulingEngine,
    ctx: &DialogContext<'_>,
    old: NaiveDateTime,
    new: NaiveDateTime,
) -> anyhow::Result<DialogOutcome> {
    let offset = ctx.offset();
    let old_start = slots::local(&offset, old.date(), old.time());
    let new_start = slots::local(&offset, new.date(), new.time());

    let candidates = engine.events_for_day(ctx.user_id, old.date(), &offset).await?;
    let Some(existing) = candidates.into_iter().find(|e| e.start == old_start) else {
        return Ok(DialogOutcome::reply(format!(
            "Não encontrei nenhum agendamento seu em {} às {}. Pode conferir a data e o horário?",
            dates::format_day(old.date()),
            dates::format_time(old.time())
        ))
        .with_state(DialogState::SelectingAppointmentToModify));
    };

    if new_start <= ctx.now {
        return Ok(DialogOutcome::reply(
            "Esse novo horário já passou. Para quando você gostaria de remarcar?",
        )
        .with_state(DialogState::AwaitingNewDateTime));
    }

    let duration = existing.duration();
    let new_end = new_start + duration;
    let others: Vec<CalendarEvent> = engine
        .events_for_day(ctx.user_id, new.date(), &offset)
        .await?
        .into_iter()
        .filter(|e| e.id != existing.id)
        .collect();

    if others.iter().any(|e| e.overlaps(&new_start, &new_end)) {
        let alternatives = nearby_alternatives(&others, new_start, duration, ctx.now);
        tracing::info!(user = %ctx.user_id, event_id = %existing.id, "modification conflicts with another appointment");
        let reply = if alternatives.is_empty() {
            format!(
                "O horário de {} às {} conflita com outro agendamento seu e não encontrei horários próximos livres. Quer tentar outro dia?",
                dates::format_day(new.date()),
                dates::format_time(new.time())
            )
        } else {
            let times: Vec<String> = alternatives.iter().map(|t| dates::format_time(t.time())).collect();
            format!(
                "O horário de {} às {} conflita com outro agendamento seu. Posso remarcar para {}. Qual prefere?",
                dates::format_day(new.date()),
                dates::format_time(new.time()),
                times.join(" ou ")
            )
        };
        return Ok(DialogOutcome::reply(reply).with_state(DialogState::AwaitingNewDateTime));
    }

    let reply = format!(
        "Confirma a alteração do seu {} de {} às {} para {} às {}?",
        existing.summary.to_lowercase(),
        dates::format_day(old.date()),
        dates::format_time(old.time()),
        dates::format_day(new.date()),
        dates::format_time(new.time()),
    );

    Ok(DialogOutcome::reply(reply)
        .with_state(DialogState::ConfirmingModification)
        .staging(EventDetails::Modify {
            event_id: existing.id,
            summary: existing.summary,
            old_start,
            new_start,
            new_end,
        }))
}

/// One hour before and after `start`, kept when free and in the future.
fn nearby_alternatives(
    others: &[CalendarEvent],
    start: DateTime<FixedOffset>,
    duration: chrono::Duration,
    now: DateTime<FixedOffset>,
) -> Vec<DateTime<FixedOffset>> {
    [start - chrono::Duration::hours(1), start + chrono::Duration::hours(1)]
        .into_iter()
        .filter(|s| *s > now && s.date_naive() == start.date_naive())
        .filter(|s| {
            let end = *s + duration;
            !others.iter().any(|e| e.overlaps(s, &end))
        })
        .collect()
}
