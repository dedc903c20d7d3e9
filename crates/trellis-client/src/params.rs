//! Typed processing parameters for a generation job.
//!
//! The backend accepts a free-form parameter dictionary; on this side every
//! field is named, typed, and range-clamped before it goes on the wire, and
//! texture size is a closed enumeration that snaps to the nearest allowed
//! value instead of rejecting input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Texture resolution accepted by the backend.
///
/// Serialized as a plain integer. Deserializing snaps any integer to the
/// nearest allowed value; exact ties break toward the smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub enum TextureSize {
    X512,
    X1024,
    X1536,
    X2048,
}

impl TextureSize {
    pub const ALL: [TextureSize; 4] = [
        TextureSize::X512,
        TextureSize::X1024,
        TextureSize::X1536,
        TextureSize::X2048,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            TextureSize::X512 => 512,
            TextureSize::X1024 => 1024,
            TextureSize::X1536 => 1536,
            TextureSize::X2048 => 2048,
        }
    }

    /// Snap an arbitrary requested size to the nearest allowed value.
    pub fn nearest(value: u32) -> Self {
        let distance = |s: TextureSize| (s.as_u32() as i64 - value as i64).abs();
        let mut best = TextureSize::X512;
        for candidate in [TextureSize::X1024, TextureSize::X1536, TextureSize::X2048] {
            if distance(candidate) < distance(best) {
                best = candidate;
            }
        }
        best
    }
}

impl From<u32> for TextureSize {
    fn from(value: u32) -> Self {
        TextureSize::nearest(value)
    }
}

impl From<TextureSize> for u32 {
    fn from(value: TextureSize) -> u32 {
        value.as_u32()
    }
}

/// Full parameter set sent with a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParams {
    pub seed: u32,
    pub sparse_steps: u32,
    pub sparse_cfg_strength: f64,
    pub slat_steps: u32,
    pub slat_cfg_strength: f64,
    pub simplify: f64,
    pub texture_size: TextureSize,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            seed: 1,
            sparse_steps: 12,
            sparse_cfg_strength: 7.5,
            slat_steps: 12,
            slat_cfg_strength: 3.0,
            simplify: 0.95,
            texture_size: TextureSize::X1024,
        }
    }
}

impl ProcessingParams {
    /// Clamp every field into the range the backend documents. Out-of-range
    /// values are coerced, never rejected.
    pub fn clamped(mut self) -> Self {
        self.seed = self.seed.clamp(1, 2_147_483_647);
        self.sparse_steps = self.sparse_steps.clamp(1, 50);
        self.slat_steps = self.slat_steps.clamp(1, 50);
        self.sparse_cfg_strength = self.sparse_cfg_strength.clamp(0.0, 10.0);
        self.slat_cfg_strength = self.slat_cfg_strength.clamp(0.0, 10.0);
        self.simplify = self.simplify.clamp(0.9, 0.98);
        self
    }
}

/// Partial parameter set: caller-supplied fields win over the defaults they
/// are merged onto. Presets in the config file deserialize into this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_cfg_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slat_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slat_cfg_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplify: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_size: Option<u32>,
}

impl ParamOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ParamOverrides::default()
    }

    /// Merge these overrides onto `base`, clamping the result.
    pub fn apply_to(&self, base: &ProcessingParams) -> ProcessingParams {
        ProcessingParams {
            seed: self.seed.unwrap_or(base.seed),
            sparse_steps: self.sparse_steps.unwrap_or(base.sparse_steps),
            sparse_cfg_strength: self
                .sparse_cfg_strength
                .unwrap_or(base.sparse_cfg_strength),
            slat_steps: self.slat_steps.unwrap_or(base.slat_steps),
            slat_cfg_strength: self.slat_cfg_strength.unwrap_or(base.slat_cfg_strength),
            simplify: self.simplify.unwrap_or(base.simplify),
            texture_size: self
                .texture_size
                .map(TextureSize::nearest)
                .unwrap_or(base.texture_size),
        }
        .clamped()
    }
}

/// Named partial overrides, as stored in the config file.
pub type PresetMap = HashMap<String, ParamOverrides>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let json = serde_json::to_value(ProcessingParams::default()).unwrap();
        assert_eq!(json["seed"], 1);
        assert_eq!(json["sparse_steps"], 12);
        assert_eq!(json["sparse_cfg_strength"], 7.5);
        assert_eq!(json["slat_steps"], 12);
        assert_eq!(json["slat_cfg_strength"], 3.0);
        assert_eq!(json["simplify"], 0.95);
        assert_eq!(json["texture_size"], 1024);
    }

    #[test]
    fn empty_overrides_leave_defaults_untouched() {
        let merged = ParamOverrides::default().apply_to(&ProcessingParams::default());
        assert_eq!(merged, ProcessingParams::default());
    }

    #[test]
    fn texture_size_snaps_to_nearest() {
        assert_eq!(TextureSize::nearest(900), TextureSize::X1024);
        assert_eq!(TextureSize::nearest(512), TextureSize::X512);
        assert_eq!(TextureSize::nearest(2048), TextureSize::X2048);
        assert_eq!(TextureSize::nearest(0), TextureSize::X512);
        assert_eq!(TextureSize::nearest(10_000), TextureSize::X2048);
        // 768 is equidistant from 512 and 1024; ties break toward the smaller.
        assert_eq!(TextureSize::nearest(768), TextureSize::X512);
    }

    #[test]
    fn texture_size_nearest_is_actually_nearest() {
        for input in 0..2600u32 {
            let chosen = TextureSize::nearest(input).as_u32() as i64;
            for other in TextureSize::ALL {
                let other = other.as_u32() as i64;
                assert!(
                    (chosen - input as i64).abs() <= (other - input as i64).abs(),
                    "input {input}: chose {chosen}, but {other} is closer"
                );
            }
        }
    }

    #[test]
    fn overrides_win_and_are_clamped() {
        let overrides = ParamOverrides {
            seed: Some(0),
            sparse_steps: Some(99),
            simplify: Some(0.5),
            texture_size: Some(900),
            ..Default::default()
        };
        let merged = overrides.apply_to(&ProcessingParams::default());
        assert_eq!(merged.seed, 1);
        assert_eq!(merged.sparse_steps, 50);
        assert_eq!(merged.simplify, 0.9);
        assert_eq!(merged.texture_size, TextureSize::X1024);
        // untouched fields come from the defaults
        assert_eq!(merged.slat_steps, 12);
    }

    #[test]
    fn texture_size_round_trips_through_json() {
        let parsed: TextureSize = serde_json::from_str("1536").unwrap();
        assert_eq!(parsed, TextureSize::X1536);
        let coerced: TextureSize = serde_json::from_str("1400").unwrap();
        assert_eq!(coerced, TextureSize::X1536);
        assert_eq!(serde_json::to_string(&TextureSize::X2048).unwrap(), "2048");
    }
}
