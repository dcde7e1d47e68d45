use crate::types::FieldType;

/// Errors that can occur while building, packing or unpacking recipes.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// A type name is not in the type registry.
    #[error("unknown field type '{0}'")]
    UnknownType(String),

    /// A field name is not part of the recipe.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A value does not have the type the recipe declares for its field.
    #[error("field '{field}' expects {expected}, got {actual}")]
    FieldTypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    /// Field names and type names differ in length.
    #[error("{names} field names but {types} field types")]
    FieldCountMismatch { names: usize, types: usize },

    /// A record does not belong to the recipe it is packed with.
    #[error("record does not match recipe: {0}")]
    RecordMismatch(String),

    /// A payload does not have the layout of the recipe.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A string value does not fit its one-byte length prefix.
    #[error("string field '{field}' is {len} bytes (max 255)")]
    StringTooLong { field: String, len: usize },

    /// A textual value could not be parsed as the field's type.
    #[error("invalid {ty} value '{value}'")]
    InvalidValue { ty: FieldType, value: String },

    /// The recipe configuration has no recipe under this key.
    #[error("no recipe named '{0}'")]
    MissingRecipe(String),

    /// The recipe configuration could not be loaded.
    #[error("failed to load recipes: {0}")]
    LoadFailed(String),

    /// The recipe configuration is not valid JSON.
    #[error("recipe configuration is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecipeError>;
