use chrono::{NaiveDate, NaiveTime};

use super::{pick, selection_effects, slots, DialogContext, DialogOutcome, SchedulingEngine, SESSION_SUMMARY};
use crate::models::{DialogState, EventDetails};
use crate::services::dates;

const CONFIRM_TEMPLATES: &[&str] = &[
    "Perfeito! Tenho disponibilidade {day} às {time}. Posso confirmar o seu ensaio?",
    "Ótimo, {day} às {time} está livre! Confirma o agendamento para esse horário?",
    "Consegui um horário para você: {day} às {time}. Quer que eu confirme?",
];

pub(super) async fn handle(
    engine: &SchedulingEngine,
    ctx: &DialogContext<'_>,
    marker_date: Option<NaiveDate>,
    marker_time: Option<NaiveTime>,
) -> anyhow::Result<DialogOutcome> {
    let user_date = dates::extract_date(ctx.user_text, ctx.today());
    if let (Some(user), Some(marker)) = (user_date, marker_date) {
        if user != marker {
            tracing::info!(user = %ctx.user_id, stated = %user, generated = %marker, "user-stated date overrides reply date");
        }
    }
    let date = user_date.or(marker_date);
    let time = marker_time.or_else(|| dates::extract_time(ctx.user_text));

    let (date, time) = match (date, time) {
        (Some(date), Some(time)) => (date, time),
        (None, _) => {
            return Ok(DialogOutcome::reply("Para qual dia você gostaria de agendar o ensaio?")
                .with_state(DialogState::AwaitingDate));
        }
        (Some(date), None) => {
            return Ok(DialogOutcome::reply(format!(
                "Qual horário fica melhor para você {}? Tenho opções de manhã e à tarde.",
                dates::relative_day(date, ctx.today())
            ))
            .with_state(DialogState::AwaitingTime));
        }
    };

    let offset = ctx.offset();
    let start = slots::local(&offset, date, time);
    let end = start + engine.session;

    if start <= ctx.now {
        return Ok(DialogOutcome::reply(
            "Esse horário já passou. Qual outro dia ou horário funciona para você?",
        )
        .with_state(DialogState::AwaitingDate));
    }

    let same_day = engine.events_for_day(ctx.user_id, date, &offset).await?;
    if !same_day.is_empty() {
        let listing: Vec<String> = same_day
            .iter()
            .map(|e| format!("• {} às {}", e.summary, dates::format_time(e.start.time())))
            .collect();
        tracing::info!(user = %ctx.user_id, date = %date, existing = same_day.len(), "create conflicts with existing appointment");
        return Ok(DialogOutcome::reply(format!(
            "Você já tem agendamento em {}:\n{}\n\nQuer remarcar o existente ou prefere escolher outro dia?",
            dates::format_day(date),
            listing.join("\n")
        ))
        .with_state(DialogState::AwaitingDate));
    }

    let (day_start, day_end) = slots::day_bounds(&offset, date);
    let studio_busy = engine
        .calendar
        .list_events_between(day_start, day_end)
        .await?
        .iter()
        .any(|e| e.overlaps(&start, &end));
    if studio_busy {
        return Ok(DialogOutcome::reply(format!(
            "Esse horário de {} às {} já está reservado. Quer que eu veja outro horário nesse dia?",
            dates::format_day(date),
            dates::format_time(time)
        ))
        .with_state(DialogState::AwaitingTime));
    }

    let reply = pick(CONFIRM_TEMPLATES)
        .replace("{day}", &dates::format_day(date))
        .replace("{time}", &dates::format_time(time));
    let [selected_date, selected_time] = selection_effects(&start);

    Ok(DialogOutcome::reply(reply)
        .with_state(DialogState::ConfirmingAppointment)
        .staging(EventDetails::Create {
            summary: SESSION_SUMMARY.to_string(),
            start,
            end,
        })
        .effect(selected_date)
        .effect(selected_time))
}
