use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use super::{pick, slot_effect, slots, DialogContext, DialogOutcome, SchedulingEngine};
use crate::models::DialogState;
use crate::services::dates::{self, Period};

const SEARCH_DAYS: i64 = 7;

const LAST_ONE: &[&str] = &[
    "Olha, só resta um horário {when}: {slots}. Quer garantir?",
    "Para {when} só resta um horário livre, às {slots}. Posso reservar para você?",
];

const GOING_FAST: &[&str] = &[
    "Tenho {slots} {when}, mas os horários estão saindo rápido! Qual prefere?",
    "{when} ainda tenho {slots}. As vagas estão saindo rápido, quer reservar?",
];

pub(super) async fn handle(engine: &SchedulingEngine, ctx: &DialogContext<'_>) -> anyhow::Result<DialogOutcome> {
    let offset = ctx.offset();
    let period = dates::parse_period(ctx.user_text);

    let found = match dates::extract_date(ctx.user_text, ctx.today()) {
        Some(date) => {
            let free = free_on(engine, ctx, date, period, &offset).await?;
            (!free.is_empty()).then_some((date, free))
        }
        None => {
            let mut found = None;
            for day in 0..=SEARCH_DAYS {
                let date = ctx.today() + Duration::days(day);
                let free = free_on(engine, ctx, date, period, &offset).await?;
                if !free.is_empty() {
                    found = Some((date, free));
                    break;
                }
            }
            found
        }
    };

    let Some((date, free)) = found else {
        let when = period.map(|p| format!(" {}", p.label())).unwrap_or_default();
        return Ok(DialogOutcome::reply(format!(
            "Infelizmente não tenho horários livres{when} nesse período. Quer tentar outro dia?"
        ))
        .with_state(DialogState::AwaitingDate));
    };

    let offered = candidates(&free, period);
    let times: Vec<String> = offered.iter().map(|s| dates::format_time(s.time())).collect();
    let when = match period {
        Some(p) => format!("{} {}", dates::relative_day(date, ctx.today()), p.label()),
        None => dates::relative_day(date, ctx.today()),
    };
    let templates = if free.len() == 1 { LAST_ONE } else { GOING_FAST };
    let reply = pick(templates)
        .replace("{when}", &when)
        .replace("{slots}", &times.join(" ou "));

    tracing::debug!(user = %ctx.user_id, date = %date, free = free.len(), offered = offered.len(), "flexible availability");

    // Follow-ups compare against the first offer
    let mut outcome = DialogOutcome::reply(capitalize(&reply)).with_state(DialogState::SuggestingSlots);
    if let Some(first) = offered.first() {
        outcome = outcome.effect(slot_effect(first));
    }
    Ok(outcome)
}

async fn free_on(
    engine: &SchedulingEngine,
    ctx: &DialogContext<'_>,
    date: NaiveDate,
    period: Option<Period>,
    offset: &FixedOffset,
) -> anyhow::Result<Vec<DateTime<FixedOffset>>> {
    let busy = engine.busy_on(ctx.user_id, date, period, offset).await?;
    Ok(slots::free_slots(
        offset,
        date,
        &slots::slot_hours(period),
        engine.session,
        &busy,
        ctx.now,
    ))
}

/// First free slot of the asked period, or the first of each period.
fn candidates(free: &[DateTime<FixedOffset>], period: Option<Period>) -> Vec<DateTime<FixedOffset>> {
    if period.is_some() {
        return free.iter().take(1).copied().collect();
    }
    let morning = free.iter().find(|s| slots::period_of(s.time()) == Period::Morning);
    let afternoon = free.iter().find(|s| slots::period_of(s.time()) == Period::Afternoon);
    morning.into_iter().chain(afternoon).copied().collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
