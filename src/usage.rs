//! Token and cost accounting shared across concurrently running tasks.
//!
//! `UsageLedger` holds process-wide totals; it is created once and passed to
//! whoever makes LLM calls. `UsageScope` is the per-task view: every update is
//! recorded locally and forwarded to the ledger, each under a single lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TbloopError};
use crate::llm::Usage;

/// Accumulated usage and cost
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    fn record(&mut self, usage: &Usage, cost: f64) {
        self.prompt_tokens += usage.input_tokens;
        self.completion_tokens += usage.output_tokens;
        self.cost_usd += cost;
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    total: UsageTotals,
    per_model: BTreeMap<String, UsageTotals>,
}

/// Process-wide usage accumulator
#[derive(Debug, Default)]
pub struct UsageLedger {
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one call's usage
    pub fn record(&self, model: &str, usage: &Usage) -> Result<()> {
        let cost = usage.cost_usd(model);
        let mut state = self.state.lock().map_err(|e| TbloopError::Storage(e.to_string()))?;
        state.total.record(usage, cost);
        state.per_model.entry(model.to_string()).or_default().record(usage, cost);
        Ok(())
    }

    pub fn totals(&self) -> UsageTotals {
        self.state.lock().map(|s| s.total.clone()).unwrap_or_default()
    }

    pub fn per_model(&self) -> BTreeMap<String, UsageTotals> {
        self.state.lock().map(|s| s.per_model.clone()).unwrap_or_default()
    }

    /// Open a per-task scope forwarding into this ledger
    pub fn scope(self: &Arc<Self>) -> Arc<UsageScope> {
        Arc::new(UsageScope {
            ledger: Arc::clone(self),
            local: Mutex::new(UsageTotals::default()),
        })
    }
}

/// Per-task usage view
#[derive(Debug)]
pub struct UsageScope {
    ledger: Arc<UsageLedger>,
    local: Mutex<UsageTotals>,
}

impl UsageScope {
    /// A scope not attached to any shared ledger
    pub fn detached() -> Arc<Self> {
        UsageLedger::new().scope()
    }

    pub fn record(&self, model: &str, usage: &Usage) -> Result<()> {
        {
            let mut local = self.local.lock().map_err(|e| TbloopError::Storage(e.to_string()))?;
            local.record(usage, usage.cost_usd(model));
        }
        self.ledger.record(model, usage)
    }

    pub fn totals(&self) -> UsageTotals {
        self.local.lock().map(|t| t.clone()).unwrap_or_default()
    }
}
