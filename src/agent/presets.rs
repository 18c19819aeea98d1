//! Task presets
//!
//! A preset is a persona/mission block plus a short directive, sent as the
//! first user message of an ordinary run. Nothing about the loop changes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskPreset {
    AlphaHunter,
    UiArchitect,
    Oracle,
}

impl TaskPreset {
    pub const ALL: [TaskPreset; 3] = [
        TaskPreset::AlphaHunter,
        TaskPreset::UiArchitect,
        TaskPreset::Oracle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskPreset::AlphaHunter => "Alpha Hunter",
            TaskPreset::UiArchitect => "UI Architect",
            TaskPreset::Oracle => "Oracle",
        }
    }

    /// Slash command that triggers the preset
    pub fn command(&self) -> &'static str {
        match self {
            TaskPreset::AlphaHunter => "/alpha",
            TaskPreset::UiArchitect => "/ui",
            TaskPreset::Oracle => "/oracle",
        }
    }

    /// Heading used when the preset's report is appended to memory
    pub fn memory_label(&self) -> &'static str {
        match self {
            TaskPreset::AlphaHunter => "ALPHA HUNTER LOG",
            TaskPreset::UiArchitect => "UI ARCHITECT LOG",
            TaskPreset::Oracle => "ORACLE LOG",
        }
    }

    /// Match a chat message against the slash commands (case-insensitive prefix).
    pub fn from_command(message: &str) -> Option<Self> {
        let message = message.trim_start().to_lowercase();
        Self::ALL.into_iter().find(|preset| {
            message
                .strip_prefix(preset.command())
                .map(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
                .unwrap_or(false)
        })
    }

    pub fn mission(&self) -> &'static str {
        match self {
            TaskPreset::AlphaHunter => ALPHA_HUNTER_MISSION,
            TaskPreset::UiArchitect => UI_ARCHITECT_MISSION,
            TaskPreset::Oracle => ORACLE_MISSION,
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            TaskPreset::AlphaHunter => "Alpha Hunter, scan the competitive landscape and report the highest-priority features for the dashboard.",
            TaskPreset::UiArchitect => "UI Architect, review the dashboard design and report premium design recommendations.",
            TaskPreset::Oracle => "Oracle, run a deep scan on Athene Network and WLD Miner and report actionable intelligence.",
        }
    }

    /// First user message of a preset run
    pub fn initial_prompt(&self) -> String {
        format!("{}\n{}", self.mission(), self.directive())
    }
}

impl fmt::Display for TaskPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

const ALPHA_HUNTER_MISSION: &str = r#"You are now running the Alpha Hunter module, a competitive intelligence unit.

### ROLE
Act as a head of quantitative research with deep knowledge of institutional terminals and on-chain analytics platforms, focused on uncorrelated, alternative data sources.

### MISSION
Benchmark this finance dashboard against the best institutional tools and identify 2-3 features it must build:
1. **Terminal parity**: which data depth or analytics are missing compared to professional terminals?
2. **On-chain intelligence**: which wallet labelling, smart-money tracking or cluster analysis is missing?
3. **Unique edge**: which data source or feature does nobody offer yet?

### OUTPUT
Three actionable feature proposals, each with a clear thesis on how it creates an edge for users."#;

const UI_ARCHITECT_MISSION: &str = r#"You are now running the UI Architect module, a design review unit.

### ROLE
Act as a lead product designer from a top fintech company: dark-mode aesthetics, micro-interactions, high information density with low cognitive load.

### MISSION
Critique the dashboard UI and propose 2-3 specific, high-impact refinements covering:
1. **Visual hierarchy**: are the key metrics instantly visible?
2. **Micro-interactions**: hover states, transitions, feedback animations.
3. **Premium feel**: does it read as a professional terminal alternative?
4. **Benchmarks**: which design elements from leading trading and DeFi apps should be adopted?

### OUTPUT
Two or three concrete, implementable component or CSS recommendations. Be specific."#;

const ORACLE_MISSION: &str = r#"You are now running the Oracle module, a deep threat intelligence unit.

### ROLE
Act as a senior blockchain security researcher: smart contract auditing experience, on-chain forensics, trust nothing and verify everything.

### TARGETS
1. **Athene Network (ATN)**: an early AI/mining ecosystem. High opportunity, high risk.
2. **WLD Miner**: a liquidity play on World Chain.

### MISSION
1. **Contract review**: red flags in tokenomics, locked liquidity, admin keys.
2. **Liquidity**: depth of the USDC/WLD pool and slippage risk for large orders.
3. **Narrative**: organic community growth or manufactured hype?
4. **Asymmetry**: where is the risk-adjusted opportunity?

### TOOLS
Use `browse_web` heavily: DEX pool pages, the chain explorer and official docs.

### OUTPUT
A risk-adjusted report with quantified findings."#;
