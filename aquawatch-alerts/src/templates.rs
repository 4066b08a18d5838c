//! Message rendering for outbound channels.
//!
//! A stored template for (category, channel) wins; otherwise each channel
//! has a fixed default layout. Placeholders are `{name}`; names that are not
//! known are copied through untouched.

use crate::models::{Alert, Channel, GeoScope, Template};

pub const SMS_MAX_CHARS: usize = 160;
const ELLIPSIS: &str = "...";
const UNKNOWN_PLACE: &str = "Unknown";

const EMAIL_SUBJECT: &str = "Health Alert: {title}";
const EMAIL_BODY: &str = "{message}\n\n{description}\n\nVillage: {village}\nSeverity: {severity}\nTime: {triggered_at}\n\nPlease take appropriate action.";
const SMS_BODY: &str = "Health Alert: {title} in {village}. {message}";
const WHATSAPP_BODY: &str = "*Health Alert*\n\n*{title}*\n{message}\n\nVillage: {village}\nSeverity: {severity}\nTime: {triggered_at}";
const PUSH_BODY: &str = "{title}: {message}";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

/// Values available to placeholders for one alert.
pub struct MessageContext<'a> {
    alert: &'a Alert,
    scope: &'a GeoScope,
    triggered_at: String,
}

impl<'a> MessageContext<'a> {
    pub fn new(alert: &'a Alert, scope: &'a GeoScope) -> Self {
        Self {
            alert,
            scope,
            triggered_at: alert.triggered_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => self.alert.title.as_str(),
            "message" => self.alert.message.as_str(),
            "description" => self.alert.description.as_str(),
            "village" => self.scope.village_name().unwrap_or(UNKNOWN_PLACE),
            "district" => self.scope.district_name().unwrap_or(UNKNOWN_PLACE),
            "state" => self.scope.state_name().unwrap_or(UNKNOWN_PLACE),
            "severity" => self.alert.severity.as_str(),
            "category" => self.alert.alert_type.as_str(),
            "triggered_at" => self.triggered_at.as_str(),
            _ => return None,
        };
        Some(value)
    }
}

pub fn render(template: &str, ctx: &MessageContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match tail.find('}') {
            Some(close) => {
                let name = &tail[1..close];
                match ctx.lookup(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..=close]),
                }
                rest = &tail[close + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Cut to at most `max` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn default_layout(channel: Channel) -> (Option<&'static str>, &'static str) {
    match channel {
        Channel::Email => (Some(EMAIL_SUBJECT), EMAIL_BODY),
        Channel::Sms => (None, SMS_BODY),
        Channel::WhatsApp => (None, WHATSAPP_BODY),
        Channel::Push | Channel::Dashboard => (Some("{title}"), PUSH_BODY),
    }
}

pub fn render_for(channel: Channel, ctx: &MessageContext<'_>, template: Option<&Template>) -> RenderedMessage {
    let (subject, body, max_length) = match template {
        Some(t) => (
            t.subject_template.as_deref().or(default_layout(channel).0),
            t.message_template.as_str(),
            t.max_length.and_then(|m| usize::try_from(m).ok()),
        ),
        None => {
            let (subject, body) = default_layout(channel);
            (subject, body, None)
        }
    };

    let limit = match (channel, max_length) {
        (Channel::Sms, Some(m)) => Some(m.min(SMS_MAX_CHARS)),
        (Channel::Sms, None) => Some(SMS_MAX_CHARS),
        (_, m) => m,
    };

    let body = render(body, ctx);
    RenderedMessage {
        subject: subject.map(|s| render(s, ctx)),
        body: match limit {
            Some(max) => truncate(&body, max),
            None => body,
        },
    }
}
