use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{RecipeError, Result};
use crate::value::FieldValue;

/// Field values of one recipe, in recipe order.
///
/// A record is created from its recipe (see [`crate::Recipe::empty_record`]
/// and [`crate::Recipe::unpack`]), so its field names and types always follow
/// the recipe's layout. [`Record::set`] preserves that: it only replaces values
/// of existing fields with values of the same type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    recipe_id: u8,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub(crate) fn new(recipe_id: u8, fields: Vec<(String, FieldValue)>) -> Self {
        Self { recipe_id, fields }
    }

    /// Id of the recipe this record belongs to.
    pub fn recipe_id(&self) -> u8 {
        self.recipe_id
    }

    /// Value of a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Replace the value of a field.
    ///
    /// Fails with `UnknownField` when the recipe has no such field and with
    /// `FieldTypeMismatch` when `value` has a different type than the field.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let slot = self
            .fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, slot)| slot)
            .ok_or_else(|| RecipeError::UnknownField(name.to_string()))?;

        let expected = slot.field_type();
        if value.field_type() != expected {
            return Err(RecipeError::FieldTypeMismatch {
                field: name.to_string(),
                expected,
                actual: value.field_type(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Iterate over `(name, value)` pairs in recipe order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    fn sample() -> Record {
        Record::new(
            2,
            vec![
                ("speed_slider_mask".to_string(), FieldValue::UInt32(0)),
                ("speed_slider_fraction".to_string(), FieldValue::Double(0.0)),
            ],
        )
    }

    #[test]
    fn set_replaces_value_of_same_type() {
        let mut record = sample();
        record.set("speed_slider_fraction", 0.5).unwrap();
        assert_eq!(
            record.get("speed_slider_fraction"),
            Some(&FieldValue::Double(0.5))
        );
        assert_eq!(record.recipe_id(), 2);
    }

    #[test]
    fn set_rejects_unknown_field() {
        let mut record = sample();
        let err = record.set("payload_mass", 1.0).unwrap_err();
        assert!(matches!(err, RecipeError::UnknownField(name) if name == "payload_mass"));
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut record = sample();
        let err = record.set("speed_slider_mask", 1.0).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::FieldTypeMismatch {
                expected: FieldType::UInt32,
                actual: FieldType::Double,
                ..
            }
        ));
        assert_eq!(record.get("speed_slider_mask"), Some(&FieldValue::UInt32(0)));
    }

    #[test]
    fn iterates_in_recipe_order() {
        let record = sample();
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["speed_slider_mask", "speed_slider_fraction"]);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"speed_slider_mask":0,"speed_slider_fraction":0.0}"#
        );
    }
}
