use bytes::{Bytes, BytesMut};

use crate::error::{RecipeError, Result};
use crate::record::Record;
use crate::types::FieldType;
use crate::value::FieldValue;

/// One named, typed field of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// An ordered list of fields registered with the controller under an id.
///
/// The field order is the wire order: [`pack`](Self::pack) writes the
/// values back to back and [`unpack`](Self::unpack) reads them in the same
/// order, with no padding or separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    id: u8,
    fields: Vec<Field>,
}

impl Recipe {
    pub fn new(id: u8, fields: Vec<Field>) -> Self {
        Self { id, fields }
    }

    /// Build a recipe from parallel lists of field names and wire type names.
    pub fn from_names<N, T>(id: u8, names: &[N], type_names: &[T]) -> Result<Self>
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        if names.len() != type_names.len() {
            return Err(RecipeError::FieldCountMismatch {
                names: names.len(),
                types: type_names.len(),
            });
        }

        let fields = names
            .iter()
            .zip(type_names)
            .map(|(name, ty)| {
                Ok(Field {
                    name: name.as_ref().to_string(),
                    ty: FieldType::from_name(ty.as_ref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(id, fields))
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn field_types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.fields.iter().map(|field| field.ty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encoded size of a record, or `None` when the recipe holds strings.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fields
            .iter()
            .try_fold(0usize, |total, field| Some(total + field.ty.size()?))
    }

    /// A record for this recipe with every field at its zero value.
    pub fn empty_record(&self) -> Record {
        Record::new(
            self.id,
            self.fields
                .iter()
                .map(|field| (field.name.clone(), FieldValue::zero(field.ty)))
                .collect(),
        )
    }

    /// Encode a record as the concatenation of its field values.
    ///
    /// The record must belong to this recipe: same id, same field names and
    /// types in the same order.
    pub fn pack(&self, record: &Record) -> Result<Bytes> {
        if !self.matches(record) {
            return Err(RecipeError::RecordMismatch(self.mismatch(record)));
        }

        let mut buf = BytesMut::with_capacity(self.fixed_size().unwrap_or(64));
        for (name, value) in record.iter() {
            value.encode(name, &mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Decode field data into a record.
    ///
    /// `data` must be exactly one record long; short or trailing bytes are
    /// reported as `MalformedPayload`.
    pub fn unpack(&self, data: &[u8]) -> Result<Record> {
        if let Some(expected) = self.fixed_size() {
            if data.len() != expected {
                return Err(RecipeError::MalformedPayload(format!(
                    "recipe {} expects {expected} bytes, got {}",
                    self.id,
                    data.len()
                )));
            }
        }

        let mut src = data;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = FieldValue::decode(field.ty, &field.name, &mut src)?;
            values.push((field.name.clone(), value));
        }
        if !src.is_empty() {
            return Err(RecipeError::MalformedPayload(format!(
                "{} trailing bytes after recipe {}",
                src.len(),
                self.id
            )));
        }
        Ok(Record::new(self.id, values))
    }

    /// Check that `record` could be packed with this recipe.
    pub fn matches(&self, record: &Record) -> bool {
        record.recipe_id() == self.id
            && record.len() == self.fields.len()
            && self
                .fields
                .iter()
                .zip(record.iter())
                .all(|(field, (name, value))| field.name == name && field.ty == value.field_type())
    }

    /// First difference between this recipe and `record`.
    fn mismatch(&self, record: &Record) -> String {
        if record.recipe_id() != self.id {
            return format!(
                "record has recipe id {}, recipe has {}",
                record.recipe_id(),
                self.id
            );
        }
        if record.len() != self.fields.len() {
            return format!(
                "record has {} fields, recipe has {}",
                record.len(),
                self.fields.len()
            );
        }
        self.fields
            .iter()
            .zip(record.iter())
            .find(|(field, (name, value))| field.name != *name || field.ty != value.field_type())
            .map(|(field, (name, value))| {
                format!(
                    "record field '{name}' ({}) does not match recipe field '{}' ({})",
                    value.field_type(),
                    field.name,
                    field.ty
                )
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_types_recipe() -> Recipe {
        let names: Vec<String> = FieldType::all()
            .map(|ty| ty.name().to_lowercase())
            .collect();
        let types: Vec<&str> = FieldType::all().map(FieldType::name).collect();
        Recipe::from_names(4, &names, &types).unwrap()
    }

    #[test]
    fn from_names_resolves_types() {
        let recipe = Recipe::from_names(1, &["timestamp", "actual_q"], &["DOUBLE", "VECTOR6D"]).unwrap();
        assert_eq!(recipe.id(), 1);
        assert_eq!(
            recipe.field_types().collect::<Vec<_>>(),
            vec![FieldType::Double, FieldType::Vector6d]
        );
        assert_eq!(recipe.fixed_size(), Some(56));
    }

    #[test]
    fn from_names_rejects_length_mismatch() {
        let err = Recipe::from_names(1, &["a", "b"], &["DOUBLE"]).unwrap_err();
        assert!(matches!(err, RecipeError::FieldCountMismatch { names: 2, types: 1 }));
    }

    #[test]
    fn from_names_rejects_unknown_type() {
        let err = Recipe::from_names(1, &["a"], &["QUATERNION"]).unwrap_err();
        assert!(matches!(err, RecipeError::UnknownType(_)));
    }

    #[test]
    fn pack_single_vector6d_is_48_bytes() {
        let recipe = Recipe::from_names(1, &["actual_q"], &["VECTOR6D"]).unwrap();
        let mut record = recipe.empty_record();
        record
            .set("actual_q", [0.0, -1.57, 1.57, 0.0, 1.57, 0.0])
            .unwrap();

        let packed = recipe.pack(&record).unwrap();
        assert_eq!(packed.len(), 48);
        assert_eq!(&packed[8..16], &(-1.57f64).to_be_bytes());
        assert_eq!(recipe.unpack(&packed).unwrap(), record);
    }

    #[test]
    fn pack_uses_big_endian() {
        let recipe =
            Recipe::from_names(2, &["mask", "fraction"], &["UINT32", "DOUBLE"]).unwrap();
        let mut record = recipe.empty_record();
        record.set("mask", 1u32).unwrap();
        record.set("fraction", 0.5).unwrap();

        let packed = recipe.pack(&record).unwrap();
        assert_eq!(&packed[..4], &[0u8, 0, 0, 1]);
        assert_eq!(&packed[4..], &0.5f64.to_be_bytes());
    }

    #[test]
    fn every_type_round_trips_extreme_values() {
        let recipe = all_types_recipe();
        let mut record = recipe.empty_record();
        record.set("bool", true).unwrap();
        record.set("uint8", u8::MAX).unwrap();
        record.set("uint32", u32::MAX).unwrap();
        record.set("uint64", u64::MAX).unwrap();
        record.set("int32", i32::MIN).unwrap();
        record.set("double", -f64::MAX).unwrap();
        record.set("vector3d", [f64::MIN_POSITIVE, -0.0, 1e300]).unwrap();
        record
            .set("vector6d", [1.0, -2.0, 3.5, -4.25, 0.0, f64::EPSILON])
            .unwrap();
        record
            .set("vector6int32", [i32::MIN, -1, 0, 1, 2, i32::MAX])
            .unwrap();
        record
            .set("vector6uint32", [0u32, 1, 2, 3, 4, u32::MAX])
            .unwrap();
        record.set("string", "PROGRAM_RUNNING").unwrap();

        let packed = recipe.pack(&record).unwrap();
        assert_eq!(packed.len(), 1 + 1 + 4 + 8 + 4 + 8 + 24 + 48 + 24 + 24 + 16);
        assert_eq!(recipe.unpack(&packed).unwrap(), record);
    }

    #[test]
    fn zero_record_round_trips() {
        let recipe = all_types_recipe();
        let record = recipe.empty_record();
        let packed = recipe.pack(&record).unwrap();
        assert_eq!(recipe.unpack(&packed).unwrap(), record);
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        let recipe = Recipe::from_names(1, &["actual_q"], &["VECTOR6D"]).unwrap();
        let err = recipe.unpack(&[0u8; 47]).unwrap_err();
        assert!(matches!(err, RecipeError::MalformedPayload(_)));
        let err = recipe.unpack(&[0u8; 49]).unwrap_err();
        assert!(matches!(err, RecipeError::MalformedPayload(_)));
    }

    #[test]
    fn unpack_string_recipe_rejects_truncation_and_trailing_bytes() {
        let recipe = Recipe::from_names(3, &["label", "count"], &["STRING", "UINT8"]).unwrap();
        let good = [3u8, b'a', b'b', b'c', 9];
        let record = recipe.unpack(&good).unwrap();
        assert_eq!(record.get("label"), Some(&FieldValue::from("abc")));
        assert_eq!(record.get("count"), Some(&FieldValue::UInt8(9)));

        assert!(matches!(
            recipe.unpack(&good[..3]).unwrap_err(),
            RecipeError::MalformedPayload(_)
        ));
        assert!(matches!(
            recipe.unpack(&[3u8, b'a', b'b', b'c', 9, 0]).unwrap_err(),
            RecipeError::MalformedPayload(_)
        ));
    }

    #[test]
    fn pack_rejects_record_from_other_recipe() {
        let first = Recipe::from_names(1, &["a"], &["DOUBLE"]).unwrap();
        let second = Recipe::from_names(2, &["a"], &["DOUBLE"]).unwrap();
        let record = second.empty_record();
        assert!(!first.matches(&record));
        assert!(matches!(
            first.pack(&record).unwrap_err(),
            RecipeError::RecordMismatch(_)
        ));
    }

    #[test]
    fn pack_rejects_same_id_different_layout() {
        let first = Recipe::from_names(1, &["a"], &["DOUBLE"]).unwrap();
        let second = Recipe::from_names(1, &["a"], &["INT32"]).unwrap();
        let record = second.empty_record();
        assert!(!first.matches(&record));
        assert!(matches!(
            first.pack(&record).unwrap_err(),
            RecipeError::RecordMismatch(msg) if msg.contains("INT32") && msg.contains("DOUBLE")
        ));
    }

    #[test]
    fn pack_accepts_exactly_the_matching_records() {
        let recipe = Recipe::from_names(4, &["a", "b"], &["DOUBLE", "BOOL"]).unwrap();
        let record = recipe.empty_record();
        assert!(recipe.matches(&record));
        assert_eq!(recipe.pack(&record).unwrap().len(), 9);

        let shorter = Recipe::from_names(4, &["a"], &["DOUBLE"]).unwrap().empty_record();
        assert!(!recipe.matches(&shorter));
        assert!(matches!(
            recipe.pack(&shorter).unwrap_err(),
            RecipeError::RecordMismatch(msg) if msg.contains("1 fields")
        ));
    }

    #[test]
    fn empty_recipe_packs_to_nothing() {
        let recipe = Recipe::new(5, Vec::new());
        let record = recipe.empty_record();
        assert!(recipe.pack(&record).unwrap().is_empty());
        assert!(recipe.unpack(&[]).unwrap().is_empty());
    }
}
