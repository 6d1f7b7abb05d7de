//! Loop governor: two independent counters per Run.
//!
//! One counts exact repeats (tool name + canonical arguments), the other
//! counts every call to a tool name regardless of arguments. Each has a
//! warn and a block threshold. Counters always increment before the
//! thresholds are checked, so a blocked call still counts.

use serde_json::Value;
use sha2::{Digest, Sha256};
use shrimp_config::GovernorConfig;
use std::collections::HashMap;
use tracing::warn;

/// Which counter tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    IdenticalArgs,
    NameFrequency,
}

impl LoopSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdenticalArgs => "identical arguments",
            Self::NameFrequency => "call frequency",
        }
    }
}

/// The governor's decision for one proposed call.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Run the tool, no annotation.
    Proceed,
    /// Run the tool, then append `suffix` to its observation.
    Warn { signal: LoopSignal, suffix: String },
    /// Do not run the tool; `message` replaces the observation.
    Block {
        signal: LoopSignal,
        count: u32,
        message: String,
    },
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Serialize `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// Stable identity of a call: sha256 hex of `name:canonical_args`.
pub fn call_hash(tool_name: &str, args: &Value) -> String {
    let payload = format!("{tool_name}:{}", canonical_json(args));
    let digest = Sha256::digest(payload.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Run-scoped counters. Create one per Run; never share across Runs.
#[derive(Debug)]
pub struct Governor {
    config: GovernorConfig,
    identical: HashMap<String, u32>,
    by_name: HashMap<String, u32>,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            identical: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Count the call and decide whether it may run.
    pub fn check(&mut self, tool_name: &str, args: &Value) -> Verdict {
        let count = {
            let slot = self.identical.entry(call_hash(tool_name, args)).or_insert(0);
            *slot += 1;
            *slot
        };
        let name_count = {
            let slot = self.by_name.entry(tool_name.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };

        if count >= self.config.identical_block {
            warn!(tool = %tool_name, count, "Tool loop blocked: identical arguments");
            return Verdict::Block {
                signal: LoopSignal::IdenticalArgs,
                count,
                message: format!(
                    "BLOCKED: You have called {tool_name} with identical arguments {count} times. \
                     This looks like an infinite loop. Try a different approach or tool."
                ),
            };
        }
        if name_count >= self.config.name_block_for(tool_name) {
            warn!(tool = %tool_name, count = name_count, "Tool frequency blocked");
            return Verdict::Block {
                signal: LoopSignal::NameFrequency,
                count: name_count,
                message: format!(
                    "BLOCKED: You have called {tool_name} {name_count} times this session. \
                     You are stuck in a loop. Stop using this tool and either: \
                     (1) use a DIFFERENT tool, (2) provide your final answer, or \
                     (3) mark the task as failed with update_task, explaining what you could not do."
                ),
            };
        }

        if count >= self.config.identical_warn {
            warn!(tool = %tool_name, count, "Tool loop warning: identical arguments");
            return Verdict::Warn {
                signal: LoopSignal::IdenticalArgs,
                suffix: format!(
                    "\n\n⚠️ WARNING: You have called {tool_name} with identical arguments \
                     {count} times. Vary your approach or move on."
                ),
            };
        }
        if name_count >= self.config.name_warn_for(tool_name) {
            warn!(tool = %tool_name, count = name_count, "Tool frequency warning");
            return Verdict::Warn {
                signal: LoopSignal::NameFrequency,
                suffix: format!(
                    "\n\n⚠️ WARNING: You have called {tool_name} {name_count} times this session. \
                     Consider whether you are making progress. If not, try a different \
                     approach or wrap up with what you have."
                ),
            };
        }

        Verdict::Proceed
    }

    /// Calls seen so far for `tool_name`.
    pub fn name_count(&self, tool_name: &str) -> u32 {
        self.by_name.get(tool_name).copied().unwrap_or(0)
    }
}
