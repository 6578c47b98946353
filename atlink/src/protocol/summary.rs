use serde::Serialize;

use super::message::{CliMessage, Usage};

/// Running totals over one CLI session's output.
///
/// Assistant usage is summed turn by turn; a `result` line carries the CLI's
/// own cumulative figures and replaces the running sum when present.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StreamSummary {
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub usage: Usage,
    pub total_cost_usd: f64,
    pub num_turns: u64,
    pub messages: usize,
    pub had_error: bool,
    pub final_result: Option<String>,
}

impl StreamSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a CliMessage>) -> Self {
        let mut summary = Self::new();
        for m in messages {
            summary.observe(m);
        }
        summary
    }

    pub fn observe(&mut self, msg: &CliMessage) {
        self.messages += 1;
        if let Some(id) = msg.session_id() {
            self.session_id = Some(id.to_string());
        }
        match msg {
            CliMessage::System(sys) => {
                if sys.model.is_some() {
                    self.model.clone_from(&sys.model);
                }
            }
            CliMessage::Assistant(conv) => {
                if let Some(u) = &conv.message.usage {
                    self.usage.add(u);
                }
                if self.model.is_none() {
                    self.model.clone_from(&conv.message.model);
                }
            }
            CliMessage::Result(res) => {
                if let Some(u) = &res.usage {
                    self.usage = u.clone();
                }
                if let Some(cost) = res.total_cost_usd {
                    self.total_cost_usd = cost;
                }
                if let Some(turns) = res.num_turns {
                    self.num_turns = turns;
                }
                self.final_result.clone_from(&res.result);
            }
            _ => {}
        }
        if msg.is_error() {
            self.had_error = true;
        }
    }
}
