//! Refraction configuration file handling
//!
//! `refraction.toml` tunes the demo effects. Every section is optional;
//! anything left out falls back to the landing page defaults.

use anyhow::{Context, Result};
use refraction_motion::scramble::{DEFAULT_ALPHABET, DEFAULT_TICK_MS, DEFAULT_TOTAL_MS};
use refraction_motion::{extraction_phases, Phase, ScrambleConfig, SpringConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "refraction.toml";

/// Frame rate used when the configured one is unusable
pub const FALLBACK_FPS: u32 = 60;

/// Root of `refraction.toml`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RefractionConfig {
    #[serde(default)]
    pub sequence: SequenceSection,
    #[serde(default)]
    pub scramble: ScrambleSection,
    #[serde(default)]
    pub springs: SpringsSection,
    #[serde(default)]
    pub render: RenderSection,
}

impl RefractionConfig {
    /// Load an explicit config file, or `refraction.toml` from `dir` if present
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let default_path = dir.join(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::load_file(&default_path);
        }

        debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        Ok(Self::default())
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: RefractionConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Frames per second, falling back to 60 for a zero rate
    pub fn fps(&self) -> u32 {
        if self.render.fps == 0 {
            warn!("render.fps must be positive, using {}", FALLBACK_FPS);
            FALLBACK_FPS
        } else {
            self.render.fps
        }
    }
}

// =============================================================================
// [sequence]
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct SequenceSection {
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseEntry {
    pub label: String,
    pub duration_ms: u32,
}

fn default_phases() -> Vec<PhaseEntry> {
    extraction_phases()
        .into_iter()
        .map(|p| PhaseEntry {
            label: p.label,
            duration_ms: p.duration_ms,
        })
        .collect()
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            phases: default_phases(),
        }
    }
}

impl SequenceSection {
    pub fn phases(&self) -> Vec<Phase> {
        self.phases
            .iter()
            .map(|p| Phase::new(p.label.clone(), p.duration_ms))
            .collect()
    }
}

// =============================================================================
// [scramble]
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct ScrambleSection {
    /// Text revealed by `refraction scramble` when none is given
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_scramble_ms")]
    pub duration_ms: u32,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u32,
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
    /// Fixed seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_text() -> String {
    "HYPERSPEED".to_string()
}

fn default_scramble_ms() -> u32 {
    DEFAULT_TOTAL_MS
}

fn default_tick_ms() -> u32 {
    DEFAULT_TICK_MS
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

impl Default for ScrambleSection {
    fn default() -> Self {
        Self {
            text: default_text(),
            duration_ms: default_scramble_ms(),
            tick_ms: default_tick_ms(),
            alphabet: default_alphabet(),
            seed: None,
        }
    }
}

impl ScrambleSection {
    pub fn config(&self) -> Result<ScrambleConfig> {
        ScrambleConfig::new(self.duration_ms, self.tick_ms, &self.alphabet)
            .context("Invalid [scramble] section")
    }
}

// =============================================================================
// [springs]
// =============================================================================

/// Spring constants; omitted fields keep the preset's value
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct SpringEntry {
    #[serde(default)]
    pub stiffness: Option<f32>,
    #[serde(default)]
    pub damping: Option<f32>,
    #[serde(default)]
    pub mass: Option<f32>,
}

impl SpringEntry {
    fn resolve(&self, preset: SpringConfig, name: &str) -> Result<SpringConfig> {
        SpringConfig::new(
            self.stiffness.unwrap_or(preset.stiffness),
            self.damping.unwrap_or(preset.damping),
            self.mass.unwrap_or(preset.mass),
        )
        .with_context(|| format!("Invalid [springs.{}] section", name))
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SpringsSection {
    #[serde(default)]
    pub magnetic: SpringEntry,
    #[serde(default)]
    pub cursor: SpringEntry,
    #[serde(default)]
    pub scroll: SpringEntry,
}

impl SpringsSection {
    pub fn magnetic(&self) -> Result<SpringConfig> {
        self.magnetic.resolve(SpringConfig::magnetic(), "magnetic")
    }

    pub fn cursor(&self) -> Result<SpringConfig> {
        self.cursor.resolve(SpringConfig::cursor(), "cursor")
    }

    pub fn scroll(&self) -> Result<SpringConfig> {
        self.scroll.resolve(SpringConfig::scroll_smoothing(), "scroll")
    }
}

// =============================================================================
// [render]
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RenderSection {
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_fps() -> u32 {
    FALLBACK_FPS
}

impl Default for RenderSection {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = RefractionConfig::parse("").unwrap();
        assert_eq!(config.sequence.phases.len(), extraction_phases().len());
        assert_eq!(config.scramble.duration_ms, 1000);
        assert_eq!(config.scramble.tick_ms, 40);
        assert_eq!(config.render.fps, 60);
        assert_eq!(config.springs.magnetic().unwrap(), SpringConfig::magnetic());
    }

    #[test]
    fn test_partial_sections() {
        let config = RefractionConfig::parse(
            r#"
            [sequence]
            phases = [
                { label = "Fetch", duration_ms = 300 },
                { label = "Parse", duration_ms = 500 },
            ]

            [scramble]
            text = "READY"
            seed = 7

            [springs.cursor]
            damping = 40.0

            [render]
            fps = 30
            "#,
        )
        .unwrap();

        let phases = config.sequence.phases();
        assert_eq!(phases, vec![Phase::new("Fetch", 300), Phase::new("Parse", 500)]);
        assert_eq!(config.scramble.text, "READY");
        assert_eq!(config.scramble.seed, Some(7));
        assert_eq!(config.scramble.tick_ms, 40);

        let cursor = config.springs.cursor().unwrap();
        assert_eq!(cursor.stiffness, SpringConfig::cursor().stiffness);
        assert_eq!(cursor.damping, 40.0);
        assert_eq!(config.fps(), 30);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let config = RefractionConfig::parse(
            r#"
            [scramble]
            alphabet = ""

            [springs.magnetic]
            mass = 0.0

            [render]
            fps = 0
            "#,
        )
        .unwrap();

        assert!(config.scramble.config().is_err());
        assert!(config.springs.magnetic().is_err());
        assert_eq!(config.fps(), FALLBACK_FPS);
    }

    #[test]
    fn test_malformed_file() {
        assert!(RefractionConfig::parse("[render]\nfps = \"fast\"").is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = RefractionConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = RefractionConfig::parse(&text).unwrap();
        assert_eq!(parsed.sequence.phases(), config.sequence.phases());
        assert_eq!(parsed.scramble.alphabet, config.scramble.alphabet);
    }

    #[test]
    fn test_missing_default_file_falls_back() {
        let dir = std::env::temp_dir().join("refraction-config-missing");
        let config = RefractionConfig::load(None, &dir).unwrap();
        assert_eq!(config.render.fps, 60);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = Path::new("/nonexistent/refraction.toml");
        let err = RefractionConfig::load(Some(path), Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
