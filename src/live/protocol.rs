//! Wire format of the Live bidirectional generate-content protocol.
//!
//! Client messages are built as `serde_json::Value`s by the `*_message`
//! functions.  Server frames are parsed by [`parse_server_message`] into a
//! flat list of [`ServerEvent`]s, since a single frame can carry several
//! things at once (e.g. an audio part and a transcript fragment).
//!
//! ```text
//! client ──setup──────────────▶ server
//! client ◀─setupComplete─────── server
//! client ──realtimeInput.text─▶ server
//! client ──realtimeInput.audio▶ server
//! client ◀─serverContent─────── server   modelTurn / outputTranscription /
//!                                        interrupted / turnComplete
//! client ◀─toolCall──────────── server
//! client ──toolResponse───────▶ server
//! ```

use serde_json::{json, Value};

use crate::audio::AudioFrame;

// ---------------------------------------------------------------------------
// Server events
// ---------------------------------------------------------------------------

/// One function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    /// Raw arguments; may be anything, including missing (`Null`).
    pub args: Value,
}

/// Something the server told us.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The setup message was accepted; the session is open.
    SetupComplete,
    /// The model wants one or more functions executed.
    ToolCall(Vec<FunctionCall>),
    /// A fragment of synthesized speech (base64 PCM).
    Audio { data: String, mime_type: String },
    /// A fragment of the transcript of the model's speech.
    Transcript(String),
    /// The user barged in; queued speech must be discarded.
    Interrupted,
    /// The model finished its turn.
    TurnComplete,
    /// The server will close the connection soon.
    GoAway { time_left: Option<String> },
}

/// Parse one inbound frame.
///
/// Unknown or malformed content yields no events rather than an error, since
/// the remote side may add message kinds at any time.
pub fn parse_server_message(text: &str) -> Vec<ServerEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("session: ignoring non-JSON frame: {e}");
            return Vec::new();
        }
    };

    let mut events = Vec::new();

    if value.get("setupComplete").is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(calls) = value
        .pointer("/toolCall/functionCalls")
        .and_then(Value::as_array)
    {
        let calls: Vec<FunctionCall> = calls.iter().map(parse_function_call).collect();
        if !calls.is_empty() {
            events.push(ServerEvent::ToolCall(calls));
        }
    }

    if let Some(content) = value.get("serverContent") {
        parse_server_content(content, &mut events);
    }

    if let Some(go_away) = value.get("goAway") {
        events.push(ServerEvent::GoAway {
            time_left: go_away
                .get("timeLeft")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    events
}

fn parse_function_call(call: &Value) -> FunctionCall {
    FunctionCall {
        id: call
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: call
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        args: call.get("args").cloned().unwrap_or(Value::Null),
    }
}

fn parse_server_content(content: &Value, events: &mut Vec<ServerEvent>) {
    // Interruption first: stale audio in the same frame must not survive it.
    if content.get("interrupted").and_then(Value::as_bool) == Some(true) {
        events.push(ServerEvent::Interrupted);
    }

    if let Some(parts) = content.pointer("/modelTurn/parts").and_then(Value::as_array) {
        for part in parts {
            let Some(inline) = part.get("inlineData") else {
                continue;
            };
            if let Some(data) = inline.get("data").and_then(Value::as_str) {
                events.push(ServerEvent::Audio {
                    data: data.to_string(),
                    mime_type: inline
                        .get("mimeType")
                        .and_then(Value::as_str)
                        .unwrap_or("audio/pcm;rate=24000")
                        .to_string(),
                });
            }
        }
    }

    if let Some(text) = content
        .pointer("/outputTranscription/text")
        .and_then(Value::as_str)
    {
        if !text.is_empty() {
            events.push(ServerEvent::Transcript(text.to_string()));
        }
    }

    if content.get("turnComplete").and_then(Value::as_bool) == Some(true) {
        events.push(ServerEvent::TurnComplete);
    }
}

// ---------------------------------------------------------------------------
// Client messages
// ---------------------------------------------------------------------------

/// The first message of every session.
pub fn setup_message(model: &str, system_instruction: &str, tools: Value) -> Value {
    json!({
        "setup": {
            "model": model,
            "generationConfig": {
                "responseModalities": ["AUDIO"]
            },
            "systemInstruction": {
                "parts": [{ "text": system_instruction }]
            },
            "outputAudioTranscription": {},
            "tools": [tools]
        }
    })
}

/// A typed (or tapped) user utterance.
pub fn realtime_text_message(text: &str) -> Value {
    json!({ "realtimeInput": { "text": text } })
}

/// One captured microphone frame.
pub fn realtime_audio_message(frame: &AudioFrame) -> Value {
    json!({
        "realtimeInput": {
            "audio": {
                "data": frame.data,
                "mimeType": frame.mime_type
            }
        }
    })
}

/// Acknowledge one function call.
pub fn tool_response_message(id: &str, name: &str, response: Value) -> Value {
    json!({
        "toolResponse": {
            "functionResponses": [{
                "id": id,
                "name": name,
                "response": response
            }]
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
