use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::displacement::DisplacementConfig;
use crate::render::LightParams;

/// Viewer description loaded from a scene file.
///
/// The browser variants wired the camera, light and tuning constants straight
/// into each script; here they live in a small XML document so one binary
/// serves every model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerScene {
    /// Path of the OBJ model, relative to the scene file.
    pub model: String,
    pub displacement: DisplacementConfig,
    /// Root position of the model in world space.
    pub position: Vec3,
    pub scale: Vec3,
    /// Radians added to the model's Y rotation every frame.
    pub spin: f32,
    pub camera: CameraConfig,
    pub light: LightParams,
    pub parallax: Option<ParallaxConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub position: Vec3,
    pub fov: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 8.0),
            fov: 45.0,
        }
    }
}

/// Pointer-linked model tilt and camera drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParallaxConfig {
    /// Scales the pointer NDC into tilt/offset targets.
    pub strength: f32,
    /// Per-frame lerp fraction toward those targets.
    pub smoothing: f32,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            strength: 0.4,
            smoothing: 0.1,
        }
    }
}

impl Default for ViewerScene {
    fn default() -> Self {
        Self {
            model: String::new(),
            displacement: DisplacementConfig::crystal(),
            position: Vec3::new(0.0, -1.0, 0.0),
            scale: Vec3::ONE,
            spin: 0.002,
            camera: CameraConfig::default(),
            light: default_light(),
            parallax: None,
        }
    }
}

fn default_light() -> LightParams {
    LightParams {
        position: Vec3::new(5.0, 10.0, 5.0),
        color: Vec3::ONE,
        intensity: 4.0,
    }
}

impl ViewerScene {
    /// Parses a viewer scene document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        if !root.has_tag_name("viewer") {
            return Err(anyhow!("scene root must be <viewer>"));
        }

        let mut scene = ViewerScene::default();
        scene.model = required_text(&root, "model")?;

        if let Some(preset) = optional_text(&root, "preset") {
            scene.displacement = DisplacementConfig::preset(&preset)
                .ok_or_else(|| anyhow!("unknown displacement preset {preset:?}"))?;
        }
        if let Some(node) = child(&root, "displacement") {
            apply_displacement_overrides(&node, &mut scene.displacement)?;
        }

        scene.position = parse_vec3(optional_text(&root, "position"), scene.position)?;
        scene.scale = parse_vec3(optional_text(&root, "scale"), scene.scale)?;
        scene.spin = parse_f32(optional_text(&root, "spin"), scene.spin)?;

        if let Some(camera) = child(&root, "camera") {
            scene.camera.position =
                parse_vec3(optional_text(&camera, "position"), scene.camera.position)?;
            scene.camera.fov = parse_f32(optional_text(&camera, "fov"), scene.camera.fov)?;
        }

        if let Some(light) = child(&root, "light") {
            scene.light.position =
                parse_vec3(optional_text(&light, "position"), scene.light.position)?;
            scene.light.color = parse_color(optional_text(&light, "color"), scene.light.color)?;
            scene.light.intensity =
                parse_f32(optional_text(&light, "intensity"), scene.light.intensity)?;
        }

        if let Some(parallax) = child(&root, "parallax") {
            let mut config = ParallaxConfig::default();
            config.strength = parse_f32(optional_text(&parallax, "strength"), config.strength)?;
            config.smoothing = parse_f32(optional_text(&parallax, "smoothing"), config.smoothing)?;
            scene.parallax = Some(config);
        }

        Ok(scene)
    }
}

fn apply_displacement_overrides(
    node: &Node<'_, '_>,
    config: &mut DisplacementConfig,
) -> Result<()> {
    config.radius = parse_f32(optional_text(node, "radius"), config.radius)?;
    config.gain = parse_f32(optional_text(node, "gain"), config.gain)?;
    config.smoothing = parse_f32(optional_text(node, "smoothing"), config.smoothing)?;
    config.velocity_scale =
        parse_f32(optional_text(node, "velocity_scale"), config.velocity_scale)?;
    config.decay_factor = parse_f32(optional_text(node, "decay_factor"), config.decay_factor)?;
    config.epsilon = parse_f32(optional_text(node, "epsilon"), config.epsilon)?;
    Ok(())
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let rgb = parse_vec3(value, default * 255.0)?;
    Ok(rgb / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <viewer>
        <model>crystal.obj</model>
        <preset>crystal</preset>
        <position>0 -1 0</position>
        <spin>0.002</spin>
        <camera>
            <position>0 2 8</position>
            <fov>45</fov>
        </camera>
        <light>
            <position>5 10 5</position>
            <color>255 128 0</color>
            <intensity>4</intensity>
        </light>
        <displacement>
            <gain>0.02</gain>
        </displacement>
        <parallax>
            <strength>0.8</strength>
        </parallax>
    </viewer>
    "#;

    #[test]
    fn parses_full_scene() {
        let scene = ViewerScene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.model, "crystal.obj");
        assert_eq!(scene.position, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(scene.camera.fov, 45.0);
        assert_eq!(scene.light.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        // Preset values survive except for the overridden gain.
        assert_eq!(scene.displacement.radius, 1.5);
        assert!((scene.displacement.gain - 0.02).abs() < f32::EPSILON);
        let parallax = scene.parallax.unwrap();
        assert!((parallax.strength - 0.8).abs() < f32::EPSILON);
        assert!((parallax.smoothing - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn minimal_scene_uses_defaults() {
        let scene = ViewerScene::from_xml("<viewer><model>m.obj</model></viewer>").unwrap();
        assert_eq!(scene.displacement, DisplacementConfig::crystal());
        assert_eq!(scene.camera, CameraConfig::default());
        assert!(scene.parallax.is_none());
        assert_eq!(scene.scale, Vec3::ONE);
    }

    #[test]
    fn missing_model_is_an_error() {
        assert!(ViewerScene::from_xml("<viewer></viewer>").is_err());
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let xml = "<viewer><model>m.obj</model><preset>granite</preset></viewer>";
        assert!(ViewerScene::from_xml(xml).is_err());
    }

    #[test]
    fn soldier_preset_is_selectable() {
        let xml = "<viewer><model>m.obj</model><preset>soldier</preset></viewer>";
        let scene = ViewerScene::from_xml(xml).unwrap();
        assert_eq!(scene.displacement, DisplacementConfig::soldier());
    }
}
