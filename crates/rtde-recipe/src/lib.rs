//! Recipes: ordered, typed field layouts negotiated with the controller.
//!
//! A [`Recipe`] turns a flat big-endian buffer into a [`Record`] (and back)
//! using the fixed encoding of each [`FieldType`]. Recipes are normally
//! declared in a [`RecipeBook`] and sent to the controller during setup, which
//! answers with the recipe id and the type of every field.

pub mod config;
pub mod error;
pub mod recipe;
pub mod record;
pub mod types;
pub mod value;

pub use config::{FieldSpec, RecipeBook, RecipeBookConfig, RecipeSource, RecipeSpec};
pub use error::{RecipeError, Result};
pub use recipe::{Field, Recipe};
pub use record::Record;
pub use types::FieldType;
pub use value::FieldValue;
