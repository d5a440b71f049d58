//! In-memory scene model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("object name must not be empty")]
    EmptyName,
}

/// A named object placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: String,
    pub location: [f64; 3],
}

/// Objects keyed by name, listed in name order
#[derive(Debug, Default, Serialize)]
pub struct Scene {
    objects: BTreeMap<String, SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default startup scene, matching what a fresh application document shows
    pub fn with_defaults() -> Self {
        let mut scene = Self::new();
        for (name, kind) in [("Camera", "camera"), ("Cube", "mesh"), ("Light", "light")] {
            scene.objects.insert(
                name.to_string(),
                SceneObject {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    location: [0.0, 0.0, 0.0],
                },
            );
        }
        scene
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn add(&mut self, object: SceneObject) -> Result<&SceneObject, SceneError> {
        if object.name.trim().is_empty() {
            return Err(SceneError::EmptyName);
        }
        if self.objects.contains_key(&object.name) {
            return Err(SceneError::AlreadyExists(object.name));
        }
        let name = object.name.clone();
        Ok(self.objects.entry(name).or_insert(object))
    }

    pub fn remove(&mut self, name: &str) -> Result<SceneObject, SceneError> {
        self.objects
            .remove(name)
            .ok_or_else(|| SceneError::NotFound(name.to_string()))
    }
}
