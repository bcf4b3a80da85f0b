//! Bookkeeping for one round of concurrent tool calls
//!
//! Owned by a single task: tool tasks report through a channel and only the
//! owner records results, so the "all calls answered" transition is observed
//! exactly once.

use crate::llm::{ToolCall, ToolResult};
use std::collections::HashMap;

/// Effect of recording one result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundProgress {
    /// Still waiting for this many calls
    Waiting(usize),
    /// This result was the last one missing
    JustCompleted,
    /// Unknown call id, duplicate result, or round already complete
    Ignored,
}

#[derive(Debug)]
pub struct PendingRound {
    /// Call ids in issue order
    order: Vec<String>,
    calls: HashMap<String, ToolCall>,
    results: HashMap<String, ToolResult>,
}

impl PendingRound {
    /// Start a round. Calls repeating an earlier id are dropped.
    pub fn new(calls: &[ToolCall]) -> Self {
        let mut order = Vec::with_capacity(calls.len());
        let mut by_id = HashMap::with_capacity(calls.len());
        for call in calls {
            if by_id.contains_key(&call.id) {
                tracing::warn!(id = %call.id, tool = %call.name, "Duplicate tool call id dropped");
                continue;
            }
            order.push(call.id.clone());
            by_id.insert(call.id.clone(), call.clone());
        }
        Self {
            order,
            calls: by_id,
            results: HashMap::new(),
        }
    }

    /// Calls to execute, in issue order
    pub fn issued(&self) -> Vec<ToolCall> {
        self.order
            .iter()
            .filter_map(|id| self.calls.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.results.len()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn record(&mut self, result: ToolResult) -> RoundProgress {
        if self.is_complete()
            || !self.calls.contains_key(&result.call_id)
            || self.results.contains_key(&result.call_id)
        {
            tracing::debug!(id = %result.call_id, "Tool result ignored");
            return RoundProgress::Ignored;
        }
        self.results.insert(result.call_id.clone(), result);
        match self.remaining() {
            0 => RoundProgress::JustCompleted,
            n => RoundProgress::Waiting(n),
        }
    }

    /// Results in issue order. Calls that never reported become failures.
    pub fn into_results(mut self) -> Vec<ToolResult> {
        self.order
            .iter()
            .map(|id| {
                self.results.remove(id).unwrap_or_else(|| {
                    tracing::warn!(id = %id, "Tool call ended without a result");
                    ToolResult::failure(id.clone(), "tool ended without reporting a result")
                })
            })
            .collect()
    }
}
