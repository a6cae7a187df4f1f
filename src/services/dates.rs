//! Portuguese date/time extraction and formatting.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").unwrap());
static DAY_OF_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bdia\s+(\d{1,2})(?:\s+de\s+(janeiro|fevereiro|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro))?\b").unwrap()
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(segunda|terca|quarta|quinta|sexta|sabado|domingo)\b").unwrap()
});
static TOMORROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bamanha\b").unwrap());
static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})[:h](\d{2})\b").unwrap());
static HOUR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*(?:h|hs|hrs|horas?)\b").unwrap());
static AT_HOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bas\s+(\d{1,2})\b").unwrap());
static MORNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(manha|cedo|cedinho)\b").unwrap());
static AFTERNOON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btarde\b").unwrap());

const MONTHS: [&str; 12] = [
    "janeiro", "fevereiro", "marco", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Morning,
    Afternoon,
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Period::Morning => "de manhã",
            Period::Afternoon => "à tarde",
        }
    }
}

/// Lowercase and strip Portuguese diacritics so patterns stay ASCII.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// First date mentioned in `text`, resolved relative to `today`.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = fold(text);

    if let Some(caps) = ISO_DATE.captures(&text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = SLASH_DATE.captures(&text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return match caps.get(3) {
            Some(year) => {
                let mut year: i32 = year.as_str().parse().ok()?;
                if year < 100 {
                    year += 2000;
                }
                NaiveDate::from_ymd_opt(year, month, day)
            }
            None => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
                if this_year < today {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day)
                } else {
                    Some(this_year)
                }
            }
        };
    }

    if text.contains("depois de amanha") {
        return Some(today + Duration::days(2));
    }
    if TOMORROW.is_match(&text) {
        return Some(today + Duration::days(1));
    }
    if text.contains("hoje") {
        return Some(today);
    }

    if let Some(caps) = DAY_OF_MONTH.captures(&text) {
        let day: u32 = caps[1].parse().ok()?;
        if let Some(month_name) = caps.get(2) {
            let month = MONTHS.iter().position(|m| *m == month_name.as_str())? as u32 + 1;
            let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            return if candidate < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(candidate)
            };
        }
        return next_day_of_month(today, day);
    }

    if let Some(caps) = WEEKDAY.captures(&text) {
        let weekday = parse_weekday(&caps[1])?;
        return Some(next_weekday(today, weekday));
    }

    None
}

/// Next date with the given day of month, today included.
fn next_day_of_month(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) {
        return None;
    }
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..12 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date >= today {
                return Some(date);
            }
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    None
}

/// Next occurrence strictly after `today`.
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current + 7) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "segunda" => Some(Weekday::Mon),
        "terca" => Some(Weekday::Tue),
        "quarta" => Some(Weekday::Wed),
        "quinta" => Some(Weekday::Thu),
        "sexta" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn extract_time(text: &str) -> Option<NaiveTime> {
    let text = fold(text);

    if let Some(caps) = CLOCK_TIME.captures(&text) {
        let hour = caps[1].parse().ok()?;
        let minute = caps[2].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    if let Some(caps) = HOUR_ONLY.captures(&text).or_else(|| AT_HOUR.captures(&text)) {
        let hour = caps[1].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }
    None
}

pub fn parse_period(text: &str) -> Option<Period> {
    let text = fold(text);
    if MORNING.is_match(&text) {
        Some(Period::Morning)
    } else if AFTERNOON.is_match(&text) {
        Some(Period::Afternoon)
    } else {
        None
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

pub fn format_date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// "terça-feira, 27/05"
pub fn format_day(date: NaiveDate) -> String {
    format!("{}, {}", weekday_name(date.weekday()), date.format("%d/%m"))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// "hoje", "amanhã" or the weekday with date.
pub fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "hoje".to_string()
    } else if date == today + Duration::days(1) {
        "amanhã".to_string()
    } else {
        format_day(date)
    }
}
