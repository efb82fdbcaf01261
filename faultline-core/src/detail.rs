//! Operator-facing text renderings of a stored record.

use crate::models::ErrorRecord;

pub const SUMMARY_MESSAGE_LIMIT: usize = 400;
pub const SUMMARY_STACK_LIMIT: usize = 500;
pub const DETAIL_STACK_LIMIT: usize = 1500;

/// Cap `value` at `max` chars, marking the cut with `...`.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = value.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Compact lookup view.
pub fn render_summary(record: &ErrorRecord) -> String {
    let message = truncate(&record.message, SUMMARY_MESSAGE_LIMIT);
    let mut lines = vec![
        format!("Error {}", record.id),
        format!("Context: {}", record.context),
        format!("Last seen: {}", record.timestamp.to_rfc2822()),
        format!("Name: {}", record.name.as_deref().unwrap_or("Unknown")),
        format!("Occurrences: {}", record.occurrences),
        format!(
            "Message: {}",
            if message.is_empty() { "None" } else { message.as_str() }
        ),
    ];

    if record.meta.is_some() {
        lines.push(format!(
            "Guild: {}",
            record.meta_str("guildId").unwrap_or("N/A")
        ));
        lines.push(format!(
            "User: {}",
            record
                .meta_str("userId")
                .map(|u| format!("<@{}>", u))
                .unwrap_or_else(|| "N/A".to_string())
        ));
        lines.push(format!(
            "Channel: {}",
            record
                .meta_str("channelId")
                .map(|c| format!("<#{}>", c))
                .unwrap_or_else(|| "N/A".to_string())
        ));
    }

    if let Some(stack) = &record.stack {
        lines.push(format!("Stack: {}", truncate(stack, SUMMARY_STACK_LIMIT)));
    }

    lines.join("\n")
}

/// Full detail view with the stack in a fenced block.
pub fn render_detail(record: &ErrorRecord) -> String {
    let user = record.meta_str("userId").or(record.user_id.as_deref());
    let guild = record.meta_str("guildId").or(record.guild_id.as_deref());

    let mut lines = vec![
        format!("**Context:** {}", record.context),
        format!(
            "**User:** {}",
            user.map(|u| format!("<@{}>", u))
                .unwrap_or_else(|| "Unknown".to_string())
        ),
        format!("**Guild:** {}", guild.unwrap_or("DM/Unknown")),
        format!(
            "**Channel:** {}",
            record
                .meta_str("channelId")
                .map(|c| format!("<#{}>", c))
                .unwrap_or_else(|| "Unknown".to_string())
        ),
        format!("**Message:** {}", record.message),
    ];

    if let Some(stack) = &record.stack {
        lines.push("\n**Stack:**".to_string());
        lines.push("```".to_string());
        lines.push(stack.chars().take(DETAIL_STACK_LIMIT).collect());
        lines.push("```".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::Utc;

    fn record() -> ErrorRecord {
        ErrorRecord {
            id: "0aa4671e".to_string(),
            timestamp: Utc::now(),
            severity: Severity::Error,
            context: "command:pay".to_string(),
            name: None,
            message: "boom".to_string(),
            stack: None,
            guild_id: Some("g-col".to_string()),
            user_id: None,
            command: None,
            meta: None,
            occurrences: 3,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate("abcdefghijk", 10), "abcdefg...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_summary_without_meta_or_stack() {
        let text = render_summary(&record());
        assert!(text.starts_with("Error 0aa4671e\nContext: command:pay"));
        assert!(text.contains("Name: Unknown"));
        assert!(text.contains("Occurrences: 3"));
        assert!(!text.contains("Guild:"));
        assert!(!text.contains("Stack:"));
    }

    #[test]
    fn test_summary_meta_fallbacks_and_stack_truncation() {
        let mut r = record();
        r.meta = Some(serde_json::json!({"userId": "42"}));
        r.stack = Some("x".repeat(800));
        let text = render_summary(&r);
        assert!(text.contains("Guild: N/A"));
        assert!(text.contains("User: <@42>"));
        assert!(text.contains("Channel: N/A"));
        let stack_line = text.lines().find(|l| l.starts_with("Stack: ")).unwrap();
        assert_eq!(stack_line.chars().count(), "Stack: ".len() + SUMMARY_STACK_LIMIT);
    }

    #[test]
    fn test_detail_prefers_meta_then_columns() {
        let mut r = record();
        r.stack = Some("y".repeat(2000));
        let text = render_detail(&r);
        assert!(text.contains("**User:** Unknown"));
        assert!(text.contains("**Guild:** g-col"));
        assert!(text.contains("**Channel:** Unknown"));
        assert!(text.contains(&format!("```\n{}\n```", "y".repeat(DETAIL_STACK_LIMIT))));
    }
}
