//! Engine configuration.
//!
//! Every section has defaults, so a config file only needs the values it
//! overrides. Environment variables use the `REHAB` prefix and `__` as the
//! section separator, e.g. `REHAB__MACHINE__COOLDOWN_MS=500`.

use rehab_core::{Error, Result};
use rehab_motion::{FormConfig, MachineConfig, MotionConfig, ResolverConfig};
use serde::{Deserialize, Serialize};

use crate::summary::SummaryConfig;

const ENV_PREFIX: &str = "REHAB";
const ENV_SEPARATOR: &str = "__";

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-role confidence floors
    pub resolver: ResolverConfig,

    /// Motion-path tracking parameters
    pub motion: MotionConfig,

    /// Cool-down and completion timing
    pub machine: MachineConfig,

    /// Posture check thresholds
    pub form: FormConfig,

    /// Session summary thresholds
    pub summary: SummaryConfig,

    /// Frame gating and reposition hints
    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum visible shoulder/hip/knee/ankle joints; 0 disables the gate
    pub min_visible_body_joints: usize,

    /// Confidence a body joint must exceed to count as visible
    pub visibility_min_confidence: f32,

    /// Consecutive unresolved frames before the reposition hint
    pub reposition_after_frames: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_visible_body_joints: 4,
            visibility_min_confidence: 0.2,
            reposition_after_frames: 2,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, with environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.motion.validate()?;

        for (name, floor) in [
            ("resolver.pivot_min_confidence", self.resolver.pivot_min_confidence),
            ("resolver.reference_min_confidence", self.resolver.reference_min_confidence),
            ("form.min_confidence", self.form.min_confidence),
            ("gate.visibility_min_confidence", self.gate.visibility_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&floor) {
                return Err(Error::Config(format!("{name} must be within [0, 1], got {floor}")));
            }
        }

        if self.gate.min_visible_body_joints > rehab_core::BODY_JOINTS.len() {
            return Err(Error::Config(format!(
                "gate.min_visible_body_joints cannot exceed {}",
                rehab_core::BODY_JOINTS.len()
            )));
        }

        self.summary.validate()
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }
}
