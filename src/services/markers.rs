//! Structured scheduling markers embedded in generated replies.
//!
//! The reply generator signals a scheduling action by including exactly one
//! marker token, e.g. `<AGENDAMENTO_CANCELAR> 2025-05-27 às 15:00`. All regex
//! extraction of marker payloads happens here; the dialog engine only sees
//! the parsed [`Marker`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Create,
    Modify,
    Cancel,
    List,
    Flexible,
    FollowUp,
}

impl MarkerKind {
    pub fn token(&self) -> &'static str {
        match self {
            MarkerKind::Create => "<AGENDAMENTO_SOLICITADO>",
            MarkerKind::Modify => "<AGENDAMENTO_MODIFICAR>",
            MarkerKind::Cancel => "<AGENDAMENTO_CANCELAR>",
            MarkerKind::List => "<AGENDAMENTO_LISTAR>",
            MarkerKind::Flexible => "<AGENDAMENTO_FLEXIVEL>",
            MarkerKind::FollowUp => "<AGENDAMENTO_FOLLOWUP>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Date/time as stated in the reply, if it carried them.
    Create {
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    Modify {
        old: NaiveDateTime,
        new: NaiveDateTime,
    },
    Cancel {
        at: NaiveDateTime,
    },
    List,
    Flexible,
    FollowUp {
        time: NaiveTime,
        date: NaiveDate,
        feedback: String,
    },
    None,
}

impl Marker {
    pub fn kind(&self) -> Option<MarkerKind> {
        match self {
            Marker::Create { .. } => Some(MarkerKind::Create),
            Marker::Modify { .. } => Some(MarkerKind::Modify),
            Marker::Cancel { .. } => Some(MarkerKind::Cancel),
            Marker::List => Some(MarkerKind::List),
            Marker::Flexible => Some(MarkerKind::Flexible),
            Marker::FollowUp { .. } => Some(MarkerKind::FollowUp),
            Marker::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("could not parse payload of {}", kind.token())]
pub struct MalformedMarker {
    pub kind: MarkerKind,
}

const DATE: &str = r"(\d{4}-\d{2}-\d{2})";
const TIME: &str = r"(\d{1,2}:\d{2})";
const AT: &str = r"\s*(?:às|as|a)?\s*";

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<AGENDAMENTO_(SOLICITADO|MODIFICAR|CANCELAR|LISTAR|FLEXIVEL|FOLLOWUP)>").unwrap()
});
static MODIFY_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)<AGENDAMENTO_MODIFICAR>\s*Antigo:\s*{DATE}{AT}{TIME}\s*,?\s*Novo:\s*{DATE}{AT}{TIME}"
    ))
    .unwrap()
});
static CANCEL_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)<AGENDAMENTO_CANCELAR>\s*{DATE}{AT}{TIME}")).unwrap()
});
static FOLLOWUP_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)<AGENDAMENTO_FOLLOWUP>\s*{TIME}\s+{DATE}\s+([^\n<]+)")).unwrap()
});
static EXPLICIT_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i){DATE}{AT}{TIME}")).unwrap());
static LABELED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bData:\s*(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})").unwrap()
});
static LABELED_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bHora:\s*(\d{1,2})(?:[:h](\d{2}))?").unwrap());
static LABEL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*(Data|Hora):.*$").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn parse_marker(text: &str) -> Result<Marker, MalformedMarker> {
    let Some(caps) = TOKEN.captures(text) else {
        return Ok(Marker::None);
    };

    match caps[1].to_uppercase().as_str() {
        "SOLICITADO" => Ok(parse_create(text)),
        "MODIFICAR" => {
            let malformed = MalformedMarker { kind: MarkerKind::Modify };
            let caps = MODIFY_PAYLOAD.captures(text).ok_or(malformed.clone())?;
            let old = datetime(&caps[1], &caps[2]).ok_or(malformed.clone())?;
            let new = datetime(&caps[3], &caps[4]).ok_or(malformed)?;
            Ok(Marker::Modify { old, new })
        }
        "CANCELAR" => {
            let malformed = MalformedMarker { kind: MarkerKind::Cancel };
            let caps = CANCEL_PAYLOAD.captures(text).ok_or(malformed.clone())?;
            let at = datetime(&caps[1], &caps[2]).ok_or(malformed)?;
            Ok(Marker::Cancel { at })
        }
        "LISTAR" => Ok(Marker::List),
        "FLEXIVEL" => Ok(Marker::Flexible),
        "FOLLOWUP" => {
            let malformed = MalformedMarker { kind: MarkerKind::FollowUp };
            let caps = FOLLOWUP_PAYLOAD.captures(text).ok_or(malformed.clone())?;
            let time = NaiveTime::parse_from_str(&caps[1], "%H:%M").map_err(|_| malformed.clone())?;
            let date = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").map_err(|_| malformed)?;
            Ok(Marker::FollowUp {
                time,
                date,
                feedback: caps[3].trim().to_string(),
            })
        }
        _ => Ok(Marker::None),
    }
}

fn parse_create(text: &str) -> Marker {
    if let Some(caps) = EXPLICIT_DATETIME.captures(text) {
        if let Some(dt) = datetime(&caps[1], &caps[2]) {
            return Marker::Create {
                date: Some(dt.date()),
                time: Some(dt.time()),
            };
        }
    }

    let date = LABELED_DATE.captures(text).and_then(|caps| {
        NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&caps[1], "%d/%m/%Y"))
            .ok()
    });
    let time = LABELED_TIME.captures(text).and_then(|caps| {
        let hour = caps[1].parse().ok()?;
        let minute = caps.get(2).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    });

    Marker::Create { date, time }
}

fn datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    Some(date.and_time(time))
}

/// The reply with marker tokens, their payloads and labeled fields removed.
pub fn strip_markers(text: &str) -> String {
    let had_create = TOKEN
        .captures_iter(text)
        .any(|c| c[1].eq_ignore_ascii_case("SOLICITADO"));

    let mut out = MODIFY_PAYLOAD.replace_all(text, "").into_owned();
    out = CANCEL_PAYLOAD.replace_all(&out, "").into_owned();
    out = FOLLOWUP_PAYLOAD.replace_all(&out, "").into_owned();
    out = TOKEN.replace_all(&out, "").into_owned();
    if had_create {
        out = LABEL_LINE.replace_all(&out, "").into_owned();
    }
    BLANK_RUNS.replace_all(out.trim(), "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(parse_marker("Olá! Como posso ajudar?"), Ok(Marker::None));
    }

    #[test]
    fn test_create_with_labels() {
        let reply = "Vou verificar para você! <AGENDAMENTO_SOLICITADO>\nData: 2025-05-27\nHora: 15:00";
        assert_eq!(
            parse_marker(reply),
            Ok(Marker::Create {
                date: NaiveDate::from_ymd_opt(2025, 5, 27),
                time: NaiveTime::from_hms_opt(15, 0, 0),
            })
        );
    }

    #[test]
    fn test_create_with_explicit_datetime_and_br_labels() {
        let reply = "<agendamento_solicitado> 2025-05-27 às 15:00";
        assert_eq!(
            parse_marker(reply),
            Ok(Marker::Create {
                date: NaiveDate::from_ymd_opt(2025, 5, 27),
                time: NaiveTime::from_hms_opt(15, 0, 0),
            })
        );

        let reply = "<AGENDAMENTO_SOLICITADO> Data: 27/05/2025 Hora: 15h";
        assert_eq!(
            parse_marker(reply),
            Ok(Marker::Create {
                date: NaiveDate::from_ymd_opt(2025, 5, 27),
                time: NaiveTime::from_hms_opt(15, 0, 0),
            })
        );
    }

    #[test]
    fn test_create_without_payload() {
        assert_eq!(
            parse_marker("<AGENDAMENTO_SOLICITADO>"),
            Ok(Marker::Create { date: None, time: None })
        );
    }

    #[test]
    fn test_modify() {
        let reply = "<AGENDAMENTO_MODIFICAR> Antigo: 2025-05-27 às 15:00 Novo: 2025-05-28 às 10:00";
        assert_eq!(
            parse_marker(reply),
            Ok(Marker::Modify {
                old: dt("2025-05-27 15:00"),
                new: dt("2025-05-28 10:00"),
            })
        );
    }

    #[test]
    fn test_cancel_and_malformed_cancel() {
        assert_eq!(
            parse_marker("Claro. <AGENDAMENTO_CANCELAR> 2025-05-27 às 15:00"),
            Ok(Marker::Cancel { at: dt("2025-05-27 15:00") })
        );
        assert_eq!(
            parse_marker("<AGENDAMENTO_CANCELAR> semana que vem"),
            Err(MalformedMarker { kind: MarkerKind::Cancel })
        );
    }

    #[test]
    fn test_modify_with_impossible_date_is_malformed() {
        let reply = "<AGENDAMENTO_MODIFICAR> Antigo: 2025-02-30 às 15:00 Novo: 2025-03-01 às 10:00";
        assert_eq!(parse_marker(reply), Err(MalformedMarker { kind: MarkerKind::Modify }));
    }

    #[test]
    fn test_followup() {
        assert_eq!(
            parse_marker("<AGENDAMENTO_FOLLOWUP> 09:00 2025-05-21 muito cedo"),
            Ok(Marker::FollowUp {
                time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                date: NaiveDate::from_ymd_opt(2025, 5, 21).unwrap(),
                feedback: "muito cedo".to_string(),
            })
        );
    }

    #[test]
    fn test_list_and_flexible() {
        assert_eq!(parse_marker("Um momento <AGENDAMENTO_LISTAR>"), Ok(Marker::List));
        assert_eq!(parse_marker("<Agendamento_Flexivel>"), Ok(Marker::Flexible));
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(
            strip_markers("Vou cancelar para você. <AGENDAMENTO_CANCELAR> 2025-05-27 às 15:00"),
            "Vou cancelar para você."
        );
        assert_eq!(
            strip_markers("Perfeito!\n<AGENDAMENTO_SOLICITADO>\nData: 2025-05-27\nHora: 15:00"),
            "Perfeito!"
        );
        assert_eq!(strip_markers("<AGENDAMENTO_CANCELAR> amanhã"), "amanhã");
        assert_eq!(strip_markers("<AGENDAMENTO_LISTAR>"), "");
    }
}
