//! Recipe configuration: named field lists loaded from JSON.
//!
//! ```json
//! {"recipes": [{"key": "state", "fields": [{"name": "actual_q", "type": "VECTOR6D"}]}]}
//! ```

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecipeError, Result};
use crate::types::FieldType;

/// Yields the ordered field list of a recipe by key.
pub trait RecipeSource {
    fn fields(&self, key: &str) -> Result<Vec<FieldSpec>>;

    /// Field names of a recipe, in order.
    fn field_names(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.fields(key)?.into_iter().map(|field| field.name).collect())
    }

    /// Field types of a recipe, in order.
    fn field_types(&self, key: &str) -> Result<Vec<FieldType>> {
        Ok(self.fields(key)?.into_iter().map(|field| field.ty).collect())
    }
}

/// One field of a configured recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

/// A recipe under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSpec {
    pub key: String,
    pub fields: Vec<FieldSpec>,
}

/// Limits applied when loading a recipe book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeBookConfig {
    /// Maximum size of a recipe file in bytes.
    pub max_file_size: usize,
}

impl Default for RecipeBookConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
        }
    }
}

/// A set of recipes keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBook {
    recipes: Vec<RecipeSpec>,
}

impl RecipeBook {
    /// Build a book from recipe specs, rejecting duplicate keys or fields.
    pub fn new(recipes: Vec<RecipeSpec>) -> Result<Self> {
        let book = Self { recipes };
        book.validate()?;
        Ok(book)
    }

    /// Parse a book from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let book: Self = serde_json::from_str(json)?;
        book.validate()?;
        Ok(book)
    }

    /// Load a book from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_path_with_config(path, RecipeBookConfig::default())
    }

    /// Load a book from a JSON file with explicit limits.
    pub fn from_path_with_config(path: &Path, config: RecipeBookConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| RecipeError::LoadFailed(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| RecipeError::LoadFailed(format!("{}: {err}", path.display())))?;
        if !metadata.is_file() {
            return Err(RecipeError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > config.max_file_size as u64 {
            return Err(RecipeError::LoadFailed(format!(
                "recipe file too large ({} bytes): {}",
                metadata.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| RecipeError::LoadFailed(format!("{}: {err}", path.display())))?;
        if content.len() > config.max_file_size {
            return Err(RecipeError::LoadFailed(format!(
                "recipe file grew past {} bytes while reading: {}",
                config.max_file_size,
                path.display()
            )));
        }

        let book = Self::from_json_str(&content)?;
        debug!(path = %path.display(), recipes = book.len(), "loaded recipe book");
        Ok(book)
    }

    /// The recipe stored under `key`.
    pub fn recipe(&self, key: &str) -> Result<&RecipeSpec> {
        self.recipes
            .iter()
            .find(|recipe| recipe.key == key)
            .ok_or_else(|| RecipeError::MissingRecipe(key.to_string()))
    }

    /// All recipe keys, in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(|recipe| recipe.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for recipe in &self.recipes {
            if !keys.insert(recipe.key.as_str()) {
                return Err(RecipeError::LoadFailed(format!(
                    "duplicate recipe key '{}'",
                    recipe.key
                )));
            }

            let mut names = HashSet::new();
            for field in &recipe.fields {
                if field.name.is_empty() || field.name.contains(',') {
                    return Err(RecipeError::LoadFailed(format!(
                        "recipe '{}' has invalid field name '{}'",
                        recipe.key, field.name
                    )));
                }
                if !names.insert(field.name.as_str()) {
                    return Err(RecipeError::LoadFailed(format!(
                        "recipe '{}' lists field '{}' twice",
                        recipe.key, field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl RecipeSource for RecipeBook {
    fn fields(&self, key: &str) -> Result<Vec<FieldSpec>> {
        Ok(self.recipe(key)?.fields.clone())
    }
}
