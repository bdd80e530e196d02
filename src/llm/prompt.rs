//! Single-prompt rendering of a conversation transcript.

use crate::domain::sender::Sender;
use crate::llm::context::{ConversationContext, Turn};

/// Render the windowed transcript plus the new utterance as one prompt.
///
/// The model is expected to continue after the trailing `AI:` line.
#[must_use]
pub fn render_prompt(context: &ConversationContext, utterance: &str, max_chars: usize) -> String {
    let budget = max_chars.saturating_sub(utterance.len());
    let turns = context.window(budget);

    let mut out = String::with_capacity(budget.min(max_chars) + utterance.len() + 64);
    out.push_str("Current conversation:\n");
    for turn in turns {
        render_turn(&mut out, turn);
    }
    out.push_str("Human: ");
    out.push_str(utterance);
    out.push_str("\nAI:");
    out
}

fn render_turn(out: &mut String, turn: &Turn) {
    out.push_str(role_label(turn.sender));
    out.push_str(": ");
    out.push_str(&turn.body);
    out.push('\n');
}

const fn role_label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "Human",
        Sender::Bot => "AI",
    }
}
