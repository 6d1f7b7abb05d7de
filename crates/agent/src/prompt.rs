//! System directive assembly for each LLM call.

use shrimp_core::{Effort, Message};

/// Standing instructions sent at the top of every LLM call.
pub const BASE_PROMPT: &str = "You are a task-execution agent. Work out what the user needs, \
use the available tools to gather facts or act, and finish with a clear final answer. \
Cite the sources you relied on. Use ask_human only when you cannot proceed without the \
user's input, and notify_user for interim updates on long tasks. If a tool result says \
BLOCKED, stop calling that tool and change approach.";

/// Tier-specific guidance appended to the base prompt.
pub fn effort_guidance(effort: Effort) -> &'static str {
    match effort {
        Effort::Quick => {
            "**Effort: QUICK** — Get to the answer fast. 1-2 web searches max. \
             Do NOT ask the user questions. Prefer existing knowledge over searching."
        }
        Effort::Normal => {
            "**Effort: NORMAL** — Balanced approach. Check 2-4 sources. \
             Avoid repeating searches with similar queries. Do not use the same tool more than 5 times."
        }
        Effort::Deep => {
            "**Effort: DEEP** — Research thoroughly. Cross-reference multiple sources. \
             Vary tool usage. Do not use any single tool more than 10 times."
        }
    }
}

/// Rounds used so far: assistant turns that requested at least one tool.
pub fn count_tool_rounds(messages: &[Message]) -> u32 {
    let rounds = messages.iter().filter(|m| m.has_tool_calls()).count();
    u32::try_from(rounds).unwrap_or(u32::MAX)
}

/// The remaining-budget line.
pub fn budget_line(max_rounds: u32, used: u32) -> String {
    let remaining = max_rounds.saturating_sub(used);
    let mut line = format!("\n\nTool budget: {remaining}/{max_rounds} calls remaining.");
    if remaining == 0 {
        line.push_str(" You have NO calls left. Provide your final answer immediately.");
    } else if remaining <= 2 && used > 0 {
        line.push_str(" You are running low. Wrap up and provide your final answer now.");
    }
    line
}

/// Full system directive for the next call given the transcript so far.
pub fn system_prompt(effort: Effort, max_rounds: u32, transcript: &[Message]) -> String {
    let used = count_tool_rounds(transcript);
    format!(
        "{BASE_PROMPT}\n\n{}\nUse at most {max_rounds} tool calls total; then summarize your answer without further tool use.{}",
        effort_guidance(effort),
        budget_line(max_rounds, used),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrimp_core::MessageToolCall;

    fn tool_turn() -> Message {
        let mut msg = Message::assistant("");
        msg.tool_calls.push(MessageToolCall {
            id: "c1".into(),
            name: "web_fetch".into(),
            arguments: "{}".into(),
        });
        msg
    }

    #[test]
    fn counts_only_assistant_turns_with_tools() {
        let transcript = vec![
            Message::user("q"),
            tool_turn(),
            Message::tool_result("c1", "page"),
            tool_turn(),
            Message::assistant("done"),
        ];
        assert_eq!(count_tool_rounds(&transcript), 2);
    }

    #[test]
    fn fresh_budget_has_no_directive() {
        assert_eq!(budget_line(10, 0), "\n\nTool budget: 10/10 calls remaining.");
        assert_eq!(budget_line(2, 0), "\n\nTool budget: 2/2 calls remaining.");
    }

    #[test]
    fn low_budget_asks_to_wrap_up() {
        let line = budget_line(10, 8);
        assert!(line.contains("2/10"));
        assert!(line.ends_with("Wrap up and provide your final answer now."));
    }

    #[test]
    fn exhausted_budget_demands_answer() {
        let line = budget_line(5, 5);
        assert!(line.contains("0/5"));
        assert!(line.contains("NO calls left"));
        // Overspent budgets clamp to zero.
        assert!(budget_line(5, 9).contains("0/5"));
    }

    #[test]
    fn system_prompt_layout() {
        let prompt = system_prompt(Effort::Quick, 5, &[Message::user("q")]);
        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.contains("**Effort: QUICK**"));
        assert!(prompt.contains("\nUse at most 5 tool calls total;"));
        assert!(prompt.ends_with("Tool budget: 5/5 calls remaining."));
    }
}
