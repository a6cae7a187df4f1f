use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{slot_effect, slots, DialogContext, DialogOutcome, SchedulingEngine};
use crate::models::DialogState;
use crate::services::dates;

static TOO_LATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(muito tarde|tarde demais|mais cedo|antes)\b").unwrap());
static TOO_EARLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(cedo|mais tarde|depois)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feedback {
    WantsEarlier,
    WantsLater,
    WantsOther,
}

fn classify(feedback: &str) -> Feedback {
    let folded = dates::fold(feedback);
    if TOO_LATE.is_match(&folded) {
        Feedback::WantsEarlier
    } else if TOO_EARLY.is_match(&folded) {
        Feedback::WantsLater
    } else {
        Feedback::WantsOther
    }
}

pub(super) async fn handle(
    engine: &SchedulingEngine,
    ctx: &DialogContext<'_>,
    date: NaiveDate,
    time: NaiveTime,
    feedback: &str,
) -> anyhow::Result<DialogOutcome> {
    let offset = ctx.offset();
    let offered = slots::local(&offset, date, time);
    let busy = engine.busy_on(ctx.user_id, date, None, &offset).await?;
    let free = slots::free_slots(&offset, date, &slots::slot_hours(None), engine.session, &busy, ctx.now);

    let kind = classify(feedback);
    let next = match kind {
        Feedback::WantsEarlier => free.iter().rev().find(|s| **s < offered),
        Feedback::WantsLater => free.iter().find(|s| **s > offered),
        Feedback::WantsOther => free.iter().find(|s| **s != offered),
    };
    tracing::debug!(user = %ctx.user_id, feedback = ?kind, found = next.is_some(), "follow-up on offered slot");

    let Some(next) = next else {
        let direction = match kind {
            Feedback::WantsEarlier => "mais cedo",
            Feedback::WantsLater => "mais tarde",
            Feedback::WantsOther => "diferente",
        };
        return Ok(DialogOutcome::reply(format!(
            "Poxa, não tenho outro horário {direction} {}. Quer que eu veja outro dia?",
            dates::relative_day(date, ctx.today())
        ))
        .with_state(DialogState::AwaitingDate));
    };

    let reply = format!(
        "Sem problemas! Que tal {} às {}? Posso reservar para você?",
        dates::relative_day(date, ctx.today()),
        dates::format_time(next.time())
    );
    Ok(DialogOutcome::reply(reply)
        .with_state(DialogState::SuggestingSlots)
        .effect(slot_effect(next)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::services::markers::Marker;

    fn followup(time: &str, feedback: &str) -> Marker {
        Marker::FollowUp {
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 5, 21).unwrap(),
            feedback: feedback.to_string(),
        }
    }

    #[test]
    fn test_feedback_direction() {
        assert_eq!(classify("muito cedo"), Feedback::WantsLater);
        assert_eq!(classify("Muito tarde pra mim"), Feedback::WantsEarlier);
        assert_eq!(classify("teria mais cedo?"), Feedback::WantsEarlier);
        assert_eq!(classify("não posso nesse"), Feedback::WantsOther);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_early_offers_next_later_slot() {
        let (engine, _) = engine(vec![]);
        let outcome = engine
            .handle(followup("09:00", "muito cedo"), &ctx("muito cedo"))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.reply.contains("10:00"));
        assert!(!outcome.reply.contains("09:00"));
        assert_eq!(outcome.next_state, Some(DialogState::SuggestingSlots));
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_late_offers_closest_earlier() {
        let (engine, _) = engine(vec![event("a", "x", "Ensaio", "2025-05-21T14:00:00-03:00")]);
        let outcome = engine
            .handle(followup("16:00", "tarde demais"), &ctx("tarde demais"))
            .await
            .unwrap()
            .unwrap();
        // 15:00 is free and closest; 14:00 is taken
        assert!(outcome.reply.contains("15:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alternative_declines() {
        let (engine, _) = engine(vec![]);
        let outcome = engine
            .handle(followup("09:00", "mais cedo"), &ctx("mais cedo"))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.reply.contains("não tenho outro horário"));
        assert!(outcome.effects.is_empty());
    }
}
