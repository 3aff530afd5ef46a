//! Serializable detection pipeline configuration.
//!
//! A [`PipelineConfig`] describes one detection pass and an optional merge
//! pass. It can be stored as JSON, or as TOML with the `pipeline-config` feature:
//!
//! ```toml
//! name = "dome"
//!
//! [interfaces]
//! nmax = 12
//! amin = 0.01
//!
//! [merge]
//! tol = 1e-5
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assembly::Assembly;
use crate::detection::{detect_interfaces, DetectionStats, InterfaceParams};
use crate::error::{AssemblyError, AssemblyResult};
use crate::merge::{merge_coplanar_interfaces, MergeParams, MergeStats};

/// A detection pass followed by an optional merge pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub interfaces: InterfaceParams,

    /// Merge coplanar interfaces after detection when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeParams>,
}

/// Results of running a [`PipelineConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub detection: DetectionStats,
    pub merge: Option<MergeStats>,
}

impl PipelineConfig {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn interfaces(mut self, params: InterfaceParams) -> Self {
        self.interfaces = params;
        self
    }

    pub fn merge(mut self, params: MergeParams) -> Self {
        self.merge = Some(params);
        self
    }

    /// Detection with default thresholds followed by a default merge.
    pub fn preset_detect_and_merge() -> Self {
        Self::with_name("detect-and-merge").merge(MergeParams::default())
    }

    /// Check all pass parameters.
    pub fn validate(&self) -> AssemblyResult<()> {
        self.interfaces.validate()?;
        if let Some(merge) = &self.merge {
            merge.validate()?;
        }
        Ok(())
    }

    /// Run the pipeline on an assembly.
    ///
    /// All parameters are validated before the assembly is touched.
    pub fn run(&self, assembly: &mut Assembly) -> AssemblyResult<PipelineReport> {
        self.validate()?;

        if let Some(name) = &self.name {
            info!("Running pipeline '{}'", name);
        }

        let detection = detect_interfaces(assembly, &self.interfaces)?;
        let merge = match &self.merge {
            Some(params) => Some(merge_coplanar_interfaces(assembly, params)?),
            None => None,
        };

        Ok(PipelineReport { detection, merge })
    }

    pub fn to_json(&self) -> AssemblyResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AssemblyError::ParseError {
            what: "pipeline config".to_string(),
            details: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> AssemblyResult<Self> {
        serde_json::from_str(json).map_err(|e| AssemblyError::ParseError {
            what: "pipeline config JSON".to_string(),
            details: e.to_string(),
        })
    }

    #[cfg(feature = "pipeline-config")]
    pub fn to_toml(&self) -> AssemblyResult<String> {
        toml::to_string_pretty(self).map_err(|e| AssemblyError::ParseError {
            what: "pipeline config".to_string(),
            details: e.to_string(),
        })
    }

    #[cfg(feature = "pipeline-config")]
    pub fn from_toml(text: &str) -> AssemblyResult<Self> {
        toml::from_str(text).map_err(|e| AssemblyError::ParseError {
            what: "pipeline config TOML".to_string(),
            details: e.to_string(),
        })
    }
}
