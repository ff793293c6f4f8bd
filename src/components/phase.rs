//! Per-component load-phase configuration.

use std::collections::HashMap;

/// How a component behaves across load phases.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PhaseConfig {
    /// Active in every phase (no configuration).
    #[default]
    Always,
    /// Active only in the listed phases; forced off elsewhere.
    /// Used by sources and switch-like components.
    Active(Vec<String>),
    /// Phase-specific load value; phases not listed use the sleep value.
    Values(HashMap<String, f64>),
}

static ALWAYS: PhaseConfig = PhaseConfig::Always;

impl PhaseConfig {
    /// Shared reference to [`PhaseConfig::Always`].
    pub fn always() -> &'static PhaseConfig {
        &ALWAYS
    }
}

/// Resolved load value for the current phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadPhase {
    /// No phase configuration applies; use the nominal value.
    Nominal,
    /// The phase has a configured value.
    Value(f64),
    /// The phase is not listed; use the sleep value.
    Sleep,
}

/// The phase a component is being evaluated in, together with its configuration.
#[derive(Debug, Clone, Copy)]
pub struct PhaseCtx<'a> {
    /// Phase name, `None` when the network has no phases.
    pub phase: Option<&'a str>,
    /// The component's phase configuration.
    pub config: &'a PhaseConfig,
}

impl<'a> PhaseCtx<'a> {
    /// Create a context for the given phase and configuration.
    pub fn new(phase: Option<&'a str>, config: &'a PhaseConfig) -> Self {
        Self { phase, config }
    }

    /// Context without phases.
    pub fn nominal() -> PhaseCtx<'static> {
        PhaseCtx {
            phase: None,
            config: &ALWAYS,
        }
    }

    /// Whether a switch-like component is active in this phase.
    pub fn is_active(&self) -> bool {
        match (self.config, self.phase) {
            (PhaseConfig::Active(list), Some(phase)) => list.iter().any(|p| p == phase),
            _ => true,
        }
    }

    /// Resolve the load value selector for this phase.
    pub fn load_phase(&self) -> LoadPhase {
        match (self.config, self.phase) {
            (PhaseConfig::Values(values), Some(phase)) => match values.get(phase) {
                Some(&v) => LoadPhase::Value(v),
                None => LoadPhase::Sleep,
            },
            _ => LoadPhase::Nominal,
        }
    }
}
