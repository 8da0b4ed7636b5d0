use chrono::{DateTime, Datelike, Local};

use super::codec::{parse_rule, ParsedRule};
use crate::models::recurrence::{EndCondition, Frequency};

pub const CUSTOM_LABEL: &str = "Custom…";

/// Short lowercase description of a rule, e.g. "every 2 weeks on Monday".
///
/// Rules that cannot be decoded produce [`CUSTOM_LABEL`].
pub fn summarize(rule: &str, anchor: DateTime<Local>) -> String {
    match parse_rule(rule) {
        Ok(parsed) => summarize_parsed(&parsed, anchor),
        Err(err) => {
            log::debug!("Falling back to custom label for '{}': {}", rule, err);
            CUSTOM_LABEL.to_string()
        }
    }
}

/// Same as [`summarize`] with the first letter capitalized.
pub fn summarize_long(rule: &str, anchor: DateTime<Local>) -> String {
    capitalize(&summarize(rule, anchor))
}

pub fn summarize_parsed(parsed: &ParsedRule, anchor: DateTime<Local>) -> String {
    let rule = &parsed.rule;
    let interval = rule.effective_interval();
    let unit = rule.freq.unit();

    let mut text = if interval == 1 {
        format!("every {}", unit)
    } else {
        format!("every {} {}s", interval, unit)
    };

    let month_day = parsed.by_month_day.unwrap_or(anchor.day() as i32);
    match rule.freq {
        Frequency::Daily => {}
        Frequency::Weekly => {
            if !rule.by_day.is_empty() {
                let names: Vec<&str> = rule.by_day.iter().map(|d| d.as_str()).collect();
                text.push_str(&format!(" on {}", names.join(", ")));
            }
        }
        Frequency::Monthly => {
            text.push_str(&format!(" on day {}", month_day));
        }
        Frequency::Yearly => {
            let month = parsed.by_month.unwrap_or(anchor.month());
            text.push_str(&format!(" on {}/{}", month_day, month));
        }
    }

    match rule.end {
        EndCondition::Never => {}
        EndCondition::Until(date) => {
            text.push_str(&format!(" until {}", date.format("%b %-d, %Y")));
        }
        EndCondition::Count(1) => text.push_str(" for 1 occurrence"),
        EndCondition::Count(count) => {
            text.push_str(&format!(" for {} occurrences", count));
        }
    }

    text
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
