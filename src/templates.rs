use std::collections::HashMap;
use std::path::Path;

use glam::{Quat, Vec3};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::math::rotation_from_euler_degrees;

fn default_scale() -> f32 {
    1.0
}

fn default_half_extents() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_true() -> bool {
    true
}

/// Static definition a critter is built from.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Opaque handle the scene host resolves to a mesh/prefab.
    pub asset_ref: String,
    #[serde(default = "default_scale")]
    pub default_scale: f32,
    /// Euler angles in degrees.
    #[serde(default)]
    pub base_rotation: [f32; 3],
    /// Marker name that spawns this template when detected.
    #[serde(default)]
    pub image_target: Option<String>,
    /// Keep the entity glued to its marker while tracked.
    #[serde(default)]
    pub follow_anchor: bool,
    /// Runs the idle/walk/eat/sleep loop.
    #[serde(default = "default_true")]
    pub autonomous: bool,
    /// Selectable and movable by gestures. Off for static scenery.
    #[serde(default = "default_true")]
    pub draggable: bool,
    /// Responds to pinch and scroll scaling.
    #[serde(default = "default_true")]
    pub scalable: bool,
    /// Half size of the pick volume at scale 1.
    #[serde(default = "default_half_extents")]
    pub half_extents: [f32; 3],
}

impl Template {
    pub fn new(id: impl Into<String>, asset_ref: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            asset_ref: asset_ref.into(),
            default_scale: default_scale(),
            base_rotation: [0.0; 3],
            image_target: None,
            follow_anchor: false,
            autonomous: true,
            draggable: true,
            scalable: true,
            half_extents: default_half_extents(),
        }
    }

    pub fn with_image_target(mut self, name: impl Into<String>) -> Self {
        self.image_target = Some(name.into());
        self
    }

    pub fn base_rotation_quat(&self) -> Quat {
        rotation_from_euler_degrees(self.base_rotation)
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::from_array(self.half_extents)
    }
}

/// Read-only template lookup handed to the spawn paths at construction.
pub trait TemplateTable {
    fn lookup_template(&self, id: &str) -> Option<&Template>;
    fn lookup_by_image_target(&self, name: &str) -> Option<&Template>;
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    templates: Vec<Template>,
}

/// In-memory template table with id and marker-name indices.
#[derive(Debug, Default)]
pub struct TemplateDatabase {
    templates: Vec<Template>,
    by_id: HashMap<String, usize>,
    by_target: HashMap<String, usize>,
}

impl TemplateDatabase {
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut db = Self::default();
        for template in templates {
            db.insert(template);
        }
        log::info!("Template table ready with {} entries", db.templates.len());
        db
    }

    /// Parse `{ "templates": [ ... ] }`.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: TemplateFile = serde_json::from_str(text)?;
        Ok(Self::new(file.templates))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Insert a template. A duplicate id keeps the first entry.
    pub fn insert(&mut self, template: Template) -> bool {
        if self.by_id.contains_key(&template.id) {
            log::warn!("Duplicate template id: {}", template.id);
            return false;
        }
        let idx = self.templates.len();
        self.by_id.insert(template.id.clone(), idx);
        if let Some(target) = template.image_target.as_ref().filter(|t| !t.is_empty()) {
            self.by_target.entry(target.clone()).or_insert(idx);
        }
        self.templates.push(template);
        true
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateTable for TemplateDatabase {
    fn lookup_template(&self, id: &str) -> Option<&Template> {
        self.by_id.get(id).map(|&i| &self.templates[i])
    }

    fn lookup_by_image_target(&self, name: &str) -> Option<&Template> {
        self.by_target.get(name).map(|&i| &self.templates[i])
    }
}
