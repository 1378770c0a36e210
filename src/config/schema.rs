//! Typed viewer configuration and its path table
//!
//! [`ViewerConfig`] is the statically typed description of everything the
//! viewer can tune. The store keeps a dynamic tree; this module maps between
//! the two through a table of per-path accessor functions built once on
//! first use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, error};

use crate::color::HexColor;
use crate::config::path::ConfigPath;
use crate::config::value::{ConfigValue, Group, Snapshot, ValueKind, assign};

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraSettings,
    pub lights: LightRig,
    pub bloom: BloomSettings,
    pub tone_mapping: ToneMapping,
    pub material: MaterialOverrides,
    pub background: Background,
}

/// Camera projection, exposure and color grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    /// Exposure multiplier applied before tone mapping
    pub exposure: f64,
    /// White balance in Kelvin
    pub temperature: f64,
    /// Green/magenta shift, -1.0..=1.0
    pub tint: f64,
    pub auto_rotate: bool,
    /// Degrees per second
    pub auto_rotate_speed: f64,
    pub orbit: OrbitSettings,
}

/// Orbit controls, driven by mouse drag and gamepad sticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    pub yaw: f64,
    pub pitch: f64,
    pub distance: f64,
}

/// Three-point lighting plus ambient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightRig {
    pub key: Light,
    pub fill: Light,
    pub rim: Light,
    pub ambient: AmbientLight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub intensity: f64,
    pub color: HexColor,
    /// Degrees around the vertical axis
    pub azimuth: f64,
    /// Degrees above the horizon
    pub elevation: f64,
    pub cast_shadows: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    pub intensity: f64,
    pub color: HexColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    pub strength: f64,
    pub radius: f64,
    /// Luminance above which pixels bloom
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMapping {
    /// `aces`, `filmic`, `reinhard` or `linear`
    pub mode: String,
    pub contrast: f64,
    pub saturation: f64,
}

/// Viewer-side overrides applied on top of the loaded asset's materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialOverrides {
    pub wireframe: bool,
    pub metalness_scale: f64,
    pub roughness_scale: f64,
    pub env_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Background {
    pub color: HexColor,
    pub show_grid: bool,
    /// Name of the environment map preset
    pub environment: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            exposure: 1.0,
            temperature: 6500.0,
            tint: 0.0,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            orbit: OrbitSettings::default(),
        }
    }
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 15.0,
            distance: 5.0,
        }
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            key: Light {
                intensity: 2.5,
                color: HexColor::rgb(0xFF, 0xF4, 0xE5),
                azimuth: 45.0,
                elevation: 35.0,
                cast_shadows: true,
            },
            fill: Light {
                intensity: 0.8,
                color: HexColor::rgb(0xDF, 0xE8, 0xFF),
                azimuth: -60.0,
                elevation: 20.0,
                cast_shadows: false,
            },
            rim: Light {
                intensity: 1.5,
                color: HexColor::WHITE,
                azimuth: 180.0,
                elevation: 40.0,
                cast_shadows: false,
            },
            ambient: AmbientLight::default(),
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            color: HexColor::WHITE,
            azimuth: 0.0,
            elevation: 45.0,
            cast_shadows: false,
        }
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            intensity: 0.3,
            color: HexColor::WHITE,
        }
    }
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 0.4,
            radius: 0.6,
            threshold: 0.85,
        }
    }
}

impl Default for ToneMapping {
    fn default() -> Self {
        Self {
            mode: "aces".to_string(),
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl Default for MaterialOverrides {
    fn default() -> Self {
        Self {
            wireframe: false,
            metalness_scale: 1.0,
            roughness_scale: 1.0,
            env_intensity: 1.0,
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: HexColor::rgb(0x1E, 0x1E, 0x24),
            show_grid: true,
            environment: "studio".to_string(),
        }
    }
}

/// Typed accessors for one leaf of [`ViewerConfig`]
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub path: &'static str,
    pub kind: ValueKind,
    read: fn(&ViewerConfig) -> ConfigValue,
    write: fn(&mut ViewerConfig, &ConfigValue) -> bool,
}

impl FieldSpec {
    pub fn read(&self, config: &ViewerConfig) -> ConfigValue {
        (self.read)(config)
    }

    /// Store `value` into `config`; `false` (and no change) on a kind mismatch
    pub fn write(&self, config: &mut ViewerConfig, value: &ConfigValue) -> bool {
        (self.write)(config, value)
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

macro_rules! field {
    ($path:expr, $kind:ident, $as:ident => $($field:ident).+) => {
        FieldSpec {
            path: $path,
            kind: ValueKind::$kind,
            read: |config| ConfigValue::from(config.$($field).+.clone()),
            write: |config, value| match value.$as() {
                Some(v) => {
                    config.$($field).+ = v.into();
                    true
                }
                None => false,
            },
        }
    };
}

macro_rules! light_fields {
    ($name:literal, $light:ident) => {
        [
            field!(concat!("lights.", $name, ".intensity"), Number, as_number => lights.$light.intensity),
            field!(concat!("lights.", $name, ".color"), Color, as_color => lights.$light.color),
            field!(concat!("lights.", $name, ".azimuth"), Number, as_number => lights.$light.azimuth),
            field!(concat!("lights.", $name, ".elevation"), Number, as_number => lights.$light.elevation),
            field!(concat!("lights.", $name, ".cast_shadows"), Bool, as_bool => lights.$light.cast_shadows),
        ]
    };
}

fn field_list() -> Vec<FieldSpec> {
    let mut fields = vec![
        field!("camera.fov", Number, as_number => camera.fov),
        field!("camera.near", Number, as_number => camera.near),
        field!("camera.far", Number, as_number => camera.far),
        field!("camera.exposure", Number, as_number => camera.exposure),
        field!("camera.temperature", Number, as_number => camera.temperature),
        field!("camera.tint", Number, as_number => camera.tint),
        field!("camera.auto_rotate", Bool, as_bool => camera.auto_rotate),
        field!("camera.auto_rotate_speed", Number, as_number => camera.auto_rotate_speed),
        field!("camera.orbit.yaw", Number, as_number => camera.orbit.yaw),
        field!("camera.orbit.pitch", Number, as_number => camera.orbit.pitch),
        field!("camera.orbit.distance", Number, as_number => camera.orbit.distance),
        field!("lights.ambient.intensity", Number, as_number => lights.ambient.intensity),
        field!("lights.ambient.color", Color, as_color => lights.ambient.color),
        field!("bloom.enabled", Bool, as_bool => bloom.enabled),
        field!("bloom.strength", Number, as_number => bloom.strength),
        field!("bloom.radius", Number, as_number => bloom.radius),
        field!("bloom.threshold", Number, as_number => bloom.threshold),
        field!("tone_mapping.mode", Text, as_text => tone_mapping.mode),
        field!("tone_mapping.contrast", Number, as_number => tone_mapping.contrast),
        field!("tone_mapping.saturation", Number, as_number => tone_mapping.saturation),
        field!("material.wireframe", Bool, as_bool => material.wireframe),
        field!("material.metalness_scale", Number, as_number => material.metalness_scale),
        field!("material.roughness_scale", Number, as_number => material.roughness_scale),
        field!("material.env_intensity", Number, as_number => material.env_intensity),
        field!("background.color", Color, as_color => background.color),
        field!("background.show_grid", Bool, as_bool => background.show_grid),
        field!("background.environment", Text, as_text => background.environment),
    ];
    fields.extend(light_fields!("key", key));
    fields.extend(light_fields!("fill", fill));
    fields.extend(light_fields!("rim", rim));
    fields
}

static FIELDS: LazyLock<BTreeMap<&'static str, FieldSpec>> = LazyLock::new(|| {
    field_list()
        .into_iter()
        .map(|entry| (entry.path, entry))
        .collect()
});

/// Schema entry for a leaf path, if the typed config knows it
pub fn field(path: &str) -> Option<&'static FieldSpec> {
    FIELDS.get(path)
}

/// Every known leaf, ordered by path
pub fn fields() -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.values()
}

impl ViewerConfig {
    /// Dynamic tree holding every field of `self`
    pub fn to_tree(&self) -> Group {
        let mut root = Group::new();
        for entry in fields() {
            let placed = ConfigPath::parse(entry.path)
                .and_then(|path| assign(&mut root, &path, entry.read(self)));
            if let Err(err) = placed {
                error!(path = entry.path, error = %err, "schema field could not be placed in tree");
            }
        }
        root
    }

    /// Typed view of a snapshot.
    ///
    /// Fields that are missing from the snapshot or hold the wrong kind of
    /// value keep their default.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut config = ViewerConfig::default();
        for entry in fields() {
            match snapshot.get(entry.path) {
                Some(value) => {
                    if !entry.write(&mut config, value) {
                        debug!(
                            path = entry.path,
                            expected = %entry.kind,
                            found = %value.kind(),
                            "config value has unexpected kind, keeping default"
                        );
                    }
                }
                None => debug!(path = entry.path, "config value missing, keeping default"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_path_is_valid_and_unique() {
        let list = field_list();
        assert_eq!(list.len(), FIELDS.len());
        for entry in &list {
            assert!(ConfigPath::parse(entry.path).is_ok(), "{}", entry.path);
        }
    }

    #[test]
    fn test_to_tree_places_every_field() {
        let snapshot = Snapshot::new(ViewerConfig::default().to_tree());
        for entry in fields() {
            let value = snapshot
                .get(entry.path)
                .unwrap_or_else(|| panic!("{} missing", entry.path));
            assert_eq!(value.kind(), entry.kind, "{}", entry.path);
        }
        assert_eq!(snapshot.number("lights.key.intensity"), Some(2.5));
        assert_eq!(snapshot.number("camera.temperature"), Some(6500.0));
        assert_eq!(snapshot.text("tone_mapping.mode"), Some("aces"));
        assert_eq!(snapshot.color("lights.rim.color"), Some(HexColor::WHITE));
    }

    #[test]
    fn test_from_snapshot_round_trips_defaults() {
        let config = ViewerConfig::default();
        let snapshot = Snapshot::new(config.to_tree());
        assert_eq!(ViewerConfig::from_snapshot(&snapshot), config);
    }

    #[test]
    fn test_from_snapshot_reads_edits() {
        let mut snapshot = Snapshot::new(ViewerConfig::default().to_tree());
        snapshot.set("bloom.strength", 1.25).unwrap();
        snapshot.set("lights.fill.color", HexColor::rgb(0x10, 0x20, 0x30)).unwrap();
        snapshot.set("tone_mapping.mode", "filmic").unwrap();

        let config = ViewerConfig::from_snapshot(&snapshot);
        assert_eq!(config.bloom.strength, 1.25);
        assert_eq!(config.lights.fill.color, HexColor::rgb(0x10, 0x20, 0x30));
        assert_eq!(config.tone_mapping.mode, "filmic");
    }

    #[test]
    fn test_from_snapshot_tolerates_wrong_kinds_and_gaps() {
        let mut snapshot = Snapshot::new(ViewerConfig::default().to_tree());
        snapshot.set("camera.fov", "wide").unwrap();
        snapshot.set("bloom", false).unwrap();

        let config = ViewerConfig::from_snapshot(&snapshot);
        assert_eq!(config.camera.fov, CameraSettings::default().fov);
        assert_eq!(config.bloom, BloomSettings::default());
    }

    #[test]
    fn test_field_lookup() {
        let entry = field("lights.key.color").unwrap();
        assert_eq!(entry.kind, ValueKind::Color);
        assert!(field("lights.key").is_none());
        assert!(field("nope").is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r##"{"bloom": {"strength": 2.0}, "background": {"color": "#000000"}}"##;
        let config: ViewerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bloom.strength, 2.0);
        assert!(config.bloom.enabled);
        assert_eq!(config.background.color, HexColor::BLACK);
        assert_eq!(config.camera, CameraSettings::default());
    }
}
