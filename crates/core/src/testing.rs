use crate::entry::{
    AssistantContentBlock, AssistantEntry, AssistantMessage, Message, MessageHeader, Usage,
    UserContent, UserEntry, UserMessage,
};
use chrono::{DateTime, TimeZone, Utc};

/// Fixed base time plus `secs` seconds, so tests order by the number alone.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
        + chrono::Duration::seconds(secs)
}

fn header(uuid: &str, parent: Option<&str>, secs: i64) -> MessageHeader {
    MessageHeader {
        uuid: uuid.to_string(),
        parent_uuid: parent.map(ToString::to_string),
        is_sidechain: false,
        user_type: Some("external".to_string()),
        cwd: Some("/repo".to_string()),
        session_id: Some("test-session".to_string()),
        version: Some("1.0.0".to_string()),
        timestamp: Some(ts(secs)),
        line_number: 0,
    }
}

/// Plain-text user message.
pub fn user(uuid: &str, parent: Option<&str>, secs: i64) -> Message {
    Message::User(UserEntry {
        header: header(uuid, parent, secs),
        message: UserMessage {
            role: "user".to_string(),
            content: UserContent::Text(format!("message {uuid}")),
        },
        is_meta: None,
        tool_use_result: None,
    })
}

/// Assistant message with one text block and no cost, duration or usage.
pub fn assistant(uuid: &str, parent: Option<&str>, secs: i64) -> Message {
    Message::Assistant(AssistantEntry {
        header: header(uuid, parent, secs),
        message: AssistantMessage {
            id: Some(format!("msg_{uuid}")),
            message_type: Some("message".to_string()),
            role: "assistant".to_string(),
            model: None,
            content: vec![AssistantContentBlock::Text {
                text: format!("reply {uuid}"),
            }],
            stop_reason: Some("end_turn".to_string()),
            stop_sequence: None,
            usage: None,
        },
        cost_usd: None,
        duration_ms: None,
    })
}

pub fn sidechain(mut message: Message) -> Message {
    match &mut message {
        Message::User(user) => user.header.is_sidechain = true,
        Message::Assistant(assistant) => assistant.header.is_sidechain = true,
    }
    message
}

/// Set billing fields on an assistant message; user messages pass through.
pub fn billed(
    mut message: Message,
    cost_usd: Option<f64>,
    duration_ms: Option<u64>,
    usage: Option<Usage>,
) -> Message {
    if let Message::Assistant(assistant) = &mut message {
        assistant.cost_usd = cost_usd;
        assistant.duration_ms = duration_ms;
        assistant.message.usage = usage;
    }
    message
}

pub fn with_model(mut message: Message, model: &str) -> Message {
    if let Message::Assistant(assistant) = &mut message {
        assistant.message.model = Some(model.to_string());
    }
    message
}
