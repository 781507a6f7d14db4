//! Tunable simulation parameters.
//!
//! [`SimConfig`] is the single mutable record the pipeline reads its knobs
//! from. External controls (a settings panel, keyboard shortcuts) change it
//! through [`SimConfig::apply`] only, which tells the caller whether the change
//! can be pushed to the running pipeline or needs a full rebuild.
//!
//! # Example
//!
//! ```ignore
//! let mut config = SimConfig::default();
//! let effect = config.apply(ParameterId::BloomIntensity, ParamValue::Number(2.0))?;
//! assert_eq!(effect, ParamEffect::Live);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::palette::{Color, Palette};

/// Highest number of blur scales the merge kernel can be generated for.
pub const MAX_BLUR_SCALES: u32 = 15;

/// Agent steering and movement parameters.
///
/// Angles are stored in degrees, the kernel receives radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentParams {
    /// Pixels per second.
    pub speed: f32,
    /// Degrees per second.
    pub rotation_speed: f32,
    /// Half-angle between the forward sensor and the side sensors, in degrees.
    pub sense_spread: f32,
    /// Distance of the sensors ahead of the agent, in pixels.
    pub sense_length: f32,
    /// Sample window radius; each sensor reads `2 * sense_size + 1` texels.
    pub sense_size: u32,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            speed: 100.0,
            rotation_speed: 180.0,
            sense_spread: 30.0,
            sense_length: 20.0,
            sense_size: 2,
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub agent_params: AgentParams,
    /// Per-frame falloff of the HDR trail buffer.
    pub decay_factor: f32,
    /// Per-frame falloff of the sensing buffer.
    pub sensing_decay_factor: f32,
    pub saturation_threshold: f32,
    pub bloom_intensity: f32,
    pub num_blur_scales: u32,
    pub float_texture_color_factor: f32,
    pub rgb8_texture_color_factor: f32,
    #[serde(rename = "nbAgent")]
    pub population: u32,
    /// Radius of the spawn disc around the canvas centre, in pixels.
    pub init_radius: f32,
    pub background_color: Color,
    pub palette: Palette,
    /// Decay the trail a second time after the bloom merge.
    pub second_decay: bool,
    /// Run with 8-bit trails instead of failing when no float target is blendable.
    pub allow_fixed_point_fallback: bool,
    /// Seed for agent spawning; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            agent_params: AgentParams::default(),
            decay_factor: 0.01,
            sensing_decay_factor: 0.01,
            saturation_threshold: 0.8,
            bloom_intensity: 1.0,
            num_blur_scales: 5,
            float_texture_color_factor: 0.1,
            rgb8_texture_color_factor: 1.0,
            population: 100_000,
            init_radius: 400.0,
            background_color: Color::SLATE,
            palette: Palette::default(),
            second_decay: false,
            allow_fixed_point_fallback: false,
            seed: None,
        }
    }
}

/// Identifier of a tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    Speed,
    RotationSpeed,
    SenseSpread,
    SenseLength,
    SenseSize,
    DecayFactor,
    SensingDecayFactor,
    SaturationThreshold,
    BloomIntensity,
    NumBlurScales,
    FloatColorFactor,
    Rgb8ColorFactor,
    Population,
    InitRadius,
    BackgroundColor,
}

impl ParameterId {
    pub const ALL: [ParameterId; 15] = [
        ParameterId::Speed,
        ParameterId::RotationSpeed,
        ParameterId::SenseSpread,
        ParameterId::SenseLength,
        ParameterId::SenseSize,
        ParameterId::DecayFactor,
        ParameterId::SensingDecayFactor,
        ParameterId::SaturationThreshold,
        ParameterId::BloomIntensity,
        ParameterId::NumBlurScales,
        ParameterId::FloatColorFactor,
        ParameterId::Rgb8ColorFactor,
        ParameterId::Population,
        ParameterId::InitRadius,
        ParameterId::BackgroundColor,
    ];

    /// Wire name used by external controls.
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterId::Speed => "speed",
            ParameterId::RotationSpeed => "rotationSpeed",
            ParameterId::SenseSpread => "senseSpread",
            ParameterId::SenseLength => "senseLength",
            ParameterId::SenseSize => "senseSize",
            ParameterId::DecayFactor => "decayFactor",
            ParameterId::SensingDecayFactor => "sensingDecayFactor",
            ParameterId::SaturationThreshold => "saturationThreshold",
            ParameterId::BloomIntensity => "bloomIntensity",
            ParameterId::NumBlurScales => "numBlurScales",
            ParameterId::FloatColorFactor => "floatTextureColorFactor",
            ParameterId::Rgb8ColorFactor => "rgb8TextureColorFactor",
            ParameterId::Population => "nbAgent",
            ParameterId::InitRadius => "initRadius",
            ParameterId::BackgroundColor => "backgroundColor",
        }
    }

    /// Accepted `[min, max]` for numeric parameters.
    pub fn range(self) -> Option<(f64, f64)> {
        let range = match self {
            ParameterId::Speed => (0.0, 200.0),
            ParameterId::RotationSpeed => (0.0, 720.0),
            ParameterId::SenseSpread => (0.0, 180.0),
            ParameterId::SenseLength => (0.0, 100.0),
            ParameterId::SenseSize => (1.0, 10.0),
            ParameterId::DecayFactor | ParameterId::SensingDecayFactor => (0.0, 1.0),
            ParameterId::SaturationThreshold => (0.0, 2.0),
            ParameterId::BloomIntensity => (0.0, 5.0),
            ParameterId::NumBlurScales => (1.0, MAX_BLUR_SCALES as f64),
            ParameterId::FloatColorFactor => (0.0, 1.0),
            ParameterId::Rgb8ColorFactor => (0.0, 2.0),
            ParameterId::Population => (0.0, 1_000_000.0),
            ParameterId::InitRadius => (0.0, 5000.0),
            ParameterId::BackgroundColor => return None,
        };
        Some(range)
    }

    /// Whether changing this parameter reallocates buffers.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ParameterId::Population | ParameterId::NumBlurScales | ParameterId::InitRadius
        )
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownParameter(s.to_string()))
    }
}

/// A value delivered by a parameter-change event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Color(Color),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<Color> for ParamValue {
    fn from(c: Color) -> Self {
        ParamValue::Color(c)
    }
}

/// What the pipeline has to do after a parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    /// Push the new value to the owning stage; no reallocation.
    Live,
    /// Buffer sizes or counts changed; rebuild the whole pipeline.
    RequiresReset,
}

impl SimConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Blur scales a pipeline allocates: `num_blur_scales` within
    /// `1..=MAX_BLUR_SCALES`.
    pub fn blur_scale_count(&self) -> u32 {
        self.num_blur_scales.clamp(1, MAX_BLUR_SCALES)
    }

    /// Check every numeric parameter against its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for id in ParameterId::ALL {
            if let Some(value) = self.numeric(id) {
                check_range(id, value)?;
            }
        }
        Ok(())
    }

    /// Current value of a numeric parameter.
    pub fn numeric(&self, id: ParameterId) -> Option<f64> {
        let p = &self.agent_params;
        let value = match id {
            ParameterId::Speed => p.speed as f64,
            ParameterId::RotationSpeed => p.rotation_speed as f64,
            ParameterId::SenseSpread => p.sense_spread as f64,
            ParameterId::SenseLength => p.sense_length as f64,
            ParameterId::SenseSize => p.sense_size as f64,
            ParameterId::DecayFactor => self.decay_factor as f64,
            ParameterId::SensingDecayFactor => self.sensing_decay_factor as f64,
            ParameterId::SaturationThreshold => self.saturation_threshold as f64,
            ParameterId::BloomIntensity => self.bloom_intensity as f64,
            ParameterId::NumBlurScales => self.num_blur_scales as f64,
            ParameterId::FloatColorFactor => self.float_texture_color_factor as f64,
            ParameterId::Rgb8ColorFactor => self.rgb8_texture_color_factor as f64,
            ParameterId::Population => self.population as f64,
            ParameterId::InitRadius => self.init_radius as f64,
            ParameterId::BackgroundColor => return None,
        };
        Some(value)
    }

    /// Apply one parameter change.
    ///
    /// The configuration is left untouched when the value is rejected.
    pub fn apply(
        &mut self,
        id: ParameterId,
        value: ParamValue,
    ) -> Result<ParamEffect, ConfigError> {
        match (id, value) {
            (ParameterId::BackgroundColor, ParamValue::Color(color)) => {
                self.background_color = color;
            }
            (ParameterId::BackgroundColor, ParamValue::Number(_)) => {
                return Err(ConfigError::WrongValueKind {
                    id: id.as_str(),
                    expected: "colour",
                });
            }
            (_, ParamValue::Color(_)) => {
                return Err(ConfigError::WrongValueKind {
                    id: id.as_str(),
                    expected: "numeric",
                });
            }
            (_, ParamValue::Number(v)) => {
                check_range(id, v)?;
                self.set_numeric(id, v);
            }
        }

        Ok(if id.is_structural() {
            ParamEffect::RequiresReset
        } else {
            ParamEffect::Live
        })
    }

    fn set_numeric(&mut self, id: ParameterId, v: f64) {
        let p = &mut self.agent_params;
        match id {
            ParameterId::Speed => p.speed = v as f32,
            ParameterId::RotationSpeed => p.rotation_speed = v as f32,
            ParameterId::SenseSpread => p.sense_spread = v as f32,
            ParameterId::SenseLength => p.sense_length = v as f32,
            ParameterId::SenseSize => p.sense_size = v.round() as u32,
            ParameterId::DecayFactor => self.decay_factor = v as f32,
            ParameterId::SensingDecayFactor => self.sensing_decay_factor = v as f32,
            ParameterId::SaturationThreshold => self.saturation_threshold = v as f32,
            ParameterId::BloomIntensity => self.bloom_intensity = v as f32,
            ParameterId::NumBlurScales => self.num_blur_scales = v.round() as u32,
            ParameterId::FloatColorFactor => self.float_texture_color_factor = v as f32,
            ParameterId::Rgb8ColorFactor => self.rgb8_texture_color_factor = v as f32,
            ParameterId::Population => self.population = v.round() as u32,
            ParameterId::InitRadius => self.init_radius = v as f32,
            ParameterId::BackgroundColor => {}
        }
    }
}

fn check_range(id: ParameterId, value: f64) -> Result<(), ConfigError> {
    let Some((min, max)) = id.range() else {
        return Ok(());
    };
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            id: id.as_str(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn blur_scale_count_stays_in_range() {
        let with = |num_blur_scales| SimConfig {
            num_blur_scales,
            ..SimConfig::default()
        };
        assert_eq!(with(0).blur_scale_count(), 1);
        assert_eq!(with(6).blur_scale_count(), 6);
        assert_eq!(with(40).blur_scale_count(), MAX_BLUR_SCALES);
    }

    #[test]
    fn parameter_ids_round_trip_their_names() {
        for id in ParameterId::ALL {
            assert_eq!(id.as_str().parse::<ParameterId>().unwrap(), id);
        }
        assert!(matches!(
            "gravity".parse::<ParameterId>(),
            Err(ConfigError::UnknownParameter(_))
        ));
    }

    #[test]
    fn live_parameters_do_not_require_reset() {
        let mut config = SimConfig::default();
        let effect = config.apply(ParameterId::BloomIntensity, 2.5.into()).unwrap();
        assert_eq!(effect, ParamEffect::Live);
        assert_eq!(config.bloom_intensity, 2.5);
    }

    #[test]
    fn structural_parameters_require_reset() {
        let mut config = SimConfig::default();
        assert_eq!(
            config.apply(ParameterId::Population, 5000.0.into()).unwrap(),
            ParamEffect::RequiresReset
        );
        assert_eq!(config.population, 5000);
        assert_eq!(
            config.apply(ParameterId::NumBlurScales, 3.0.into()).unwrap(),
            ParamEffect::RequiresReset
        );
        assert_eq!(
            config.apply(ParameterId::InitRadius, 800.0.into()).unwrap(),
            ParamEffect::RequiresReset
        );
    }

    #[test]
    fn out_of_range_values_leave_config_unchanged() {
        let mut config = SimConfig::default();
        let before = config.clone();
        assert!(config.apply(ParameterId::NumBlurScales, 16.0.into()).is_err());
        assert!(config.apply(ParameterId::Speed, f64::NAN.into()).is_err());
        assert!(config.apply(ParameterId::DecayFactor, (-0.1).into()).is_err());
        assert_eq!(config, before);
    }

    #[test]
    fn colour_and_numeric_values_are_not_interchangeable() {
        let mut config = SimConfig::default();
        assert!(config.apply(ParameterId::BackgroundColor, 1.0.into()).is_err());
        assert!(config.apply(ParameterId::Speed, Color::RED.into()).is_err());
        config.apply(ParameterId::BackgroundColor, Color::BLACK.into()).unwrap();
        assert_eq!(config.background_color, Color::BLACK);
    }

    #[test]
    fn json_uses_panel_names_and_fills_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "nbAgent": 2000, "agentParams": { "speed": 50 } }"#).unwrap();
        assert_eq!(config.population, 2000);
        assert_eq!(config.agent_params.speed, 50.0);
        assert_eq!(config.agent_params.sense_size, AgentParams::default().sense_size);
        assert_eq!(config.num_blur_scales, 5);

        let text = config.to_json().unwrap();
        assert!(text.contains("\"nbAgent\": 2000"));
        let back: SimConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
