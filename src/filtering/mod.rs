// DANS : src/filtering/mod.rs

// Les portes successives qu'un token doit franchir avant d'être signalé.
pub mod gates;
pub mod name_check;
pub mod risk;

use std::fmt;

pub use gates::{FilterPipeline, FilterThresholds, MarketScreen, Rejection};
pub use name_check::NameCheck;
pub use risk::{RiskAssessment, RiskFailure, RiskGate, RiskPolicy, RiskProvider, RiskRules};

/// Les portes, dans l'ordre où elles sont évaluées.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    NameCheck,
    FdvFloor,
    LiquidityFloor,
    McToLiqFloor,
    RiskGate,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::NameCheck => "name_check",
            Gate::FdvFloor => "fdv_floor",
            Gate::LiquidityFloor => "liquidity_floor",
            Gate::McToLiqFloor => "mc_to_liq_floor",
            Gate::RiskGate => "risk_gate",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
