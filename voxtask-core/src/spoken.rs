//! Spoken-command parsing.
//!
//! Turns a transcript like "remind me to call mom tomorrow at 3pm" into a
//! title and a resolved local datetime. Pure and deterministic given
//! `(transcript, now)`; anything unparsable degrades to a date-less task
//! rather than an error.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::task::ParsedTask;

static COMMAND_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:please\s+)?(?:create|add|make|new|schedule|remind\s+me(?:\s+to)?|set(?:\s+a)?\s+reminder(?:\s+to)?)\b[\s:,-]*",
    )
    .expect("command prefix pattern")
});

static TYPE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(?:a|an|the)\s+)?(?:task|reminder|meeting|appointment|event|note)\b[\s:,-]*")
        .expect("type prefix pattern")
});

static TOMORROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btomorrow\b").unwrap());
static TONIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btonight\b").unwrap());
static TODAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").unwrap());
static NEXT_WEEK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bnext\s+week\b").unwrap());
static NEXT_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bnext\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .unwrap()
});
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bon\s+(january|jan|february|feb|march|mar|april|apr|may|june|jun|july|jul|august|aug|september|sept|sep|october|oct|november|nov|december|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .unwrap()
});
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bon\s+(\d{1,2})/(\d{1,2})\b").unwrap());
static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap());

/// Parse a spoken transcript into a task.
///
/// Leading command phrases ("remind me to", "create", ...) and type words
/// ("task", "meeting", ...) are stripped; the first matching date
/// expression wins; a bare clock time lands today, or tomorrow once that
/// time has already passed. The remainder becomes the title.
pub fn parse_spoken_task(transcript: &str, now: DateTime<Local>) -> ParsedTask {
    let mut text = transcript.trim().to_string();

    if let Some(m) = COMMAND_PREFIX.find(&text) {
        let end = m.end();
        text.replace_range(..end, "");
    }
    if let Some(m) = TYPE_PREFIX.find(&text) {
        let end = m.end();
        text.replace_range(..end, "");
    }

    let (when, leftover) = resolve_when(&text, now);

    let title = tidy_title(&leftover);
    ParsedTask {
        title: if title.is_empty() {
            "Untitled task".to_string()
        } else {
            title
        },
        when,
        raw_transcript: transcript.to_string(),
    }
}

/// Resolve the schedule phrase, returning the datetime (if any) and the
/// text with the matched phrases cut out.
fn resolve_when(text: &str, now: DateTime<Local>) -> (Option<DateTime<Local>>, String) {
    let mut remaining = text.to_string();
    let today = now.date_naive();

    // Pull the clock time out first so date handling knows whether an
    // explicit time exists.
    let mut clock: Option<NaiveTime> = None;
    let clock_match = CLOCK_TIME.captures(&remaining).map(|caps| {
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps
            .get(2)
            .map_or(0, |m| m.as_str().parse().unwrap_or(99));
        let meridiem = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());
        let time = NaiveTime::from_hms_opt(to_24_hour(hour, meridiem.as_deref()), minute, 0);
        (caps.get(0).map(|m| m.range()).unwrap_or(0..0), time)
    });
    if let Some((range, Some(time))) = clock_match {
        clock = Some(time);
        remaining.replace_range(range, " ");
    }

    // First matching date expression wins; later ones stay in the title.
    let matched: Option<(std::ops::Range<usize>, NaiveDate, NaiveTime)> =
        if let Some(m) = TOMORROW.find(&remaining) {
            Some((m.range(), today + Duration::days(1), morning()))
        } else if let Some(m) = TONIGHT.find(&remaining) {
            Some((m.range(), today, evening()))
        } else if let Some(m) = TODAY.find(&remaining) {
            Some((m.range(), today, afternoon()))
        } else if let Some(m) = NEXT_WEEK.find(&remaining) {
            Some((m.range(), today + Duration::days(7), morning()))
        } else if let Some(caps) = NEXT_WEEKDAY.captures(&remaining) {
            let target = weekday_from_name(&caps[1]);
            caps.get(0)
                .map(|m| (m.range(), next_weekday(today, target), morning()))
        } else if let Some(caps) = MONTH_DAY.captures(&remaining) {
            match (caps.get(0), month_day_date(&caps[1], caps[2].parse().ok(), today)) {
                (Some(m), Some(date)) => Some((m.range(), date, morning())),
                _ => None,
            }
        } else if let Some(caps) = NUMERIC_DATE.captures(&remaining) {
            match (
                caps.get(0),
                numeric_date(caps[1].parse().ok(), caps[2].parse().ok(), today),
            ) {
                (Some(m), Some(date)) => Some((m.range(), date, morning())),
                _ => None,
            }
        } else {
            None
        };

    let when = match (matched, clock) {
        (Some((range, date, default_time)), clock) => {
            remaining.replace_range(range, " ");
            local_datetime(date, clock.unwrap_or(default_time))
        }
        (None, Some(time)) => {
            // Bare clock time: today, or tomorrow once it has passed.
            let date = if now.time() > time {
                today + Duration::days(1)
            } else {
                today
            };
            local_datetime(date, time)
        }
        (None, None) => None,
    };

    (when, remaining)
}

fn to_24_hour(hour: u32, meridiem: Option<&str>) -> u32 {
    match meridiem {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        _ => hour,
    }
}

/// Next occurrence of `target`, always in the future: landing on the same
/// weekday means a full week out, never today.
fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let mut days = (target.num_days_from_monday() as i64
        - from.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    from + Duration::days(days)
}

fn weekday_from_name(name: &str) -> Weekday {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// "on <Month> <Day>": this year, or next year once the day has passed.
fn month_day_date(month_name: &str, day: Option<u32>, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = month_name.to_ascii_lowercase();
    let month = match lowered.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    let date = NaiveDate::from_ymd_opt(today.year(), month, day?)?;
    if date < today {
        date.with_year(today.year() + 1)
    } else {
        Some(date)
    }
}

/// "on MM/DD": same year-rollover rule as month names.
fn numeric_date(month: Option<u32>, day: Option<u32>, today: NaiveDate) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(today.year(), month?, day?)?;
    if date < today {
        date.with_year(today.year() + 1)
    } else {
        Some(date)
    }
}

fn local_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(time)).earliest()
}

fn morning() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn afternoon() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap()
}

fn evening() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap()
}

/// Collapse whitespace, trim stray punctuation, capitalize the first letter.
fn tidy_title(text: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = joined
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '.'));
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn naive(task_when: Option<DateTime<Local>>) -> NaiveDateTime {
        task_when.expect("expected a resolved datetime").naive_local()
    }

    #[test]
    fn remind_me_tomorrow_with_time() {
        let now = at(2026, 8, 7, 10, 0);
        let task = parse_spoken_task("remind me to call mom tomorrow at 3pm", now);
        assert_eq!(task.title, "Call mom");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 8).unwrap().and_hms_opt(15, 0, 0).unwrap()
        );
        assert_eq!(task.raw_transcript, "remind me to call mom tomorrow at 3pm");
    }

    #[test]
    fn create_task_with_no_schedule() {
        let task = parse_spoken_task("create task: buy groceries", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Buy groceries");
        assert_eq!(task.when, None);
    }

    #[test]
    fn schedule_on_month_day_with_time() {
        let task = parse_spoken_task(
            "schedule dentist appointment on Oct 5 at 3pm",
            at(2026, 8, 7, 10, 0),
        );
        assert_eq!(task.title, "Dentist appointment");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 10, 5).unwrap().and_hms_opt(15, 0, 0).unwrap()
        );
    }

    #[test]
    fn empty_transcript_gets_the_fallback_title() {
        let task = parse_spoken_task("", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Untitled task");
        assert_eq!(task.when, None);
        assert_eq!(task.raw_transcript, "");
    }

    #[test]
    fn tonight_defaults_to_eight_pm() {
        let task = parse_spoken_task("add task watch the game tonight", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Watch the game");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap().and_hms_opt(20, 0, 0).unwrap()
        );
    }

    #[test]
    fn bare_today_defaults_to_two_pm() {
        let task = parse_spoken_task("new task review notes today", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Review notes");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap().and_hms_opt(14, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_week_is_seven_days_out_at_nine() {
        let task = parse_spoken_task("schedule budget review next week", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Budget review");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 14).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_weekday_is_always_in_the_future() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        // Same weekday: a full week out, never today.
        assert_eq!(next_weekday(d, d.weekday()), d + Duration::days(7));
        // Day after tomorrow's weekday: two days out.
        let target = (d + Duration::days(2)).weekday();
        assert_eq!(next_weekday(d, target), d + Duration::days(2));
    }

    #[test]
    fn next_weekday_phrase_resolves_within_a_week() {
        let now = at(2026, 8, 7, 10, 0);
        let task = parse_spoken_task("remind me to water plants next friday", now);
        assert_eq!(task.title, "Water plants");
        let when = task.when.expect("resolved");
        assert_eq!(when.weekday(), Weekday::Fri);
        let gap = when.date_naive() - now.date_naive();
        assert!(gap > Duration::days(0) && gap <= Duration::days(7));
        assert_eq!(when.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn past_clock_time_rolls_to_tomorrow() {
        let task = parse_spoken_task("remind me to stretch at 9am", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Stretch");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 8).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn future_clock_time_stays_today() {
        let task = parse_spoken_task("remind me to submit the report at 5pm", at(2026, 8, 7, 10, 0));
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap().and_hms_opt(17, 0, 0).unwrap()
        );
    }

    #[test]
    fn twelve_am_maps_to_midnight() {
        // Midnight has passed by 10:00, so it lands tomorrow.
        let task = parse_spoken_task("remind me to check the oven at 12am", at(2026, 8, 7, 10, 0));
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 8).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn numeric_date_resolves_this_year() {
        let task = parse_spoken_task("schedule tax filing on 12/25", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Tax filing");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 12, 25).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn passed_month_day_rolls_to_next_year() {
        let task = parse_spoken_task("schedule checkup on Jan 5", at(2026, 8, 7, 10, 0));
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2027, 1, 5).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn unparsable_schedule_leaves_when_empty() {
        let task = parse_spoken_task("buy milk eventually", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Buy milk eventually");
        assert_eq!(task.when, None);
    }

    #[test]
    fn minutes_are_honored() {
        let task = parse_spoken_task("remind me to join standup at 9:45am tomorrow", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Join standup");
        assert_eq!(
            naive(task.when),
            NaiveDate::from_ymd_opt(2026, 8, 8).unwrap().and_hms_opt(9, 45, 0).unwrap()
        );
    }

    #[test]
    fn type_word_is_only_stripped_at_the_front() {
        let task = parse_spoken_task("note pick up the meeting notes", at(2026, 8, 7, 10, 0));
        assert_eq!(task.title, "Pick up the meeting notes");
    }
}
