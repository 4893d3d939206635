use std::fmt;

/// Name of the id column in the destination table.
pub const ID_FIELD_NAME: &str = "id";

/// Name of the payload column in the destination table.
pub const PAYLOAD_FIELD_NAME: &str = "payload";

/// Data type of a destination table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 64-bit integer.
    Integer,
    /// Raw bytes.
    Bytes,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Integer => f.write_str("INTEGER"),
            FieldType::Bytes => f.write_str("BYTES"),
        }
    }
}

/// Nullability mode of a destination table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// The field must always hold a value.
    Required,
    /// The field may be null.
    Nullable,
}

/// Schema of a single destination table field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub typ: FieldType,
    /// Field nullability.
    pub mode: FieldMode,
}

impl FieldSchema {
    /// Creates a new field schema.
    pub fn new(name: impl Into<String>, typ: FieldType, mode: FieldMode) -> Self {
        Self {
            name: name.into(),
            typ,
            mode,
        }
    }
}

/// Declared shape of the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Creates a table schema from its fields.
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    /// Returns the fields of this schema in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks whether an existing table satisfies this declared schema.
    ///
    /// Only field presence and type compatibility matter, field order does not.
    /// A field declared REQUIRED must not be NULLABLE in the actual table, since
    /// appends would then be allowed to violate the declared invariant. Extra
    /// fields in the actual table are tolerated as long as they are nullable,
    /// otherwise appends that omit them would be rejected by the destination.
    pub fn is_satisfied_by(&self, actual: &TableSchema) -> bool {
        for declared in &self.fields {
            let Some(found) = actual.field(&declared.name) else {
                return false;
            };

            if found.typ != declared.typ {
                return false;
            }

            if declared.mode == FieldMode::Required && found.mode != FieldMode::Required {
                return false;
            }
        }

        for extra in &actual.fields {
            if self.field(&extra.name).is_none() && extra.mode == FieldMode::Required {
                return false;
            }
        }

        true
    }
}

/// Returns the declared schema of the signal rows written to the destination.
///
/// Exactly two required fields, regardless of configuration: `id: INTEGER` and
/// `payload: BYTES`. This schema is used both to auto-create the destination
/// table and to document the row converter's output shape.
pub fn signal_row_schema() -> TableSchema {
    TableSchema::new(vec![
        FieldSchema::new(ID_FIELD_NAME, FieldType::Integer, FieldMode::Required),
        FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_row_schema_has_two_required_fields() {
        let schema = signal_row_schema();

        assert_eq!(schema.fields().len(), 2);

        let id = schema.field(ID_FIELD_NAME).unwrap();
        assert_eq!(id.typ, FieldType::Integer);
        assert_eq!(id.mode, FieldMode::Required);

        let payload = schema.field(PAYLOAD_FIELD_NAME).unwrap();
        assert_eq!(payload.typ, FieldType::Bytes);
        assert_eq!(payload.mode, FieldMode::Required);
    }

    #[test]
    fn compatibility_ignores_field_order() {
        let declared = signal_row_schema();
        let reordered = TableSchema::new(vec![
            FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
            FieldSchema::new(ID_FIELD_NAME, FieldType::Integer, FieldMode::Required),
        ]);

        assert!(declared.is_satisfied_by(&reordered));
    }

    #[test]
    fn compatibility_rejects_missing_field() {
        let declared = signal_row_schema();
        let actual = TableSchema::new(vec![FieldSchema::new(
            ID_FIELD_NAME,
            FieldType::Integer,
            FieldMode::Required,
        )]);

        assert!(!declared.is_satisfied_by(&actual));
    }

    #[test]
    fn compatibility_rejects_type_mismatch() {
        let declared = signal_row_schema();
        let actual = TableSchema::new(vec![
            FieldSchema::new(ID_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
            FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
        ]);

        assert!(!declared.is_satisfied_by(&actual));
    }

    #[test]
    fn compatibility_rejects_nullable_weakening() {
        let declared = signal_row_schema();
        let actual = TableSchema::new(vec![
            FieldSchema::new(ID_FIELD_NAME, FieldType::Integer, FieldMode::Nullable),
            FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
        ]);

        assert!(!declared.is_satisfied_by(&actual));
    }

    #[test]
    fn compatibility_tolerates_extra_nullable_fields() {
        let declared = signal_row_schema();
        let actual = TableSchema::new(vec![
            FieldSchema::new(ID_FIELD_NAME, FieldType::Integer, FieldMode::Required),
            FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
            FieldSchema::new("ingested_at", FieldType::Integer, FieldMode::Nullable),
        ]);

        assert!(declared.is_satisfied_by(&actual));
    }

    #[test]
    fn compatibility_rejects_extra_required_fields() {
        let declared = signal_row_schema();
        let actual = TableSchema::new(vec![
            FieldSchema::new(ID_FIELD_NAME, FieldType::Integer, FieldMode::Required),
            FieldSchema::new(PAYLOAD_FIELD_NAME, FieldType::Bytes, FieldMode::Required),
            FieldSchema::new("tenant", FieldType::Integer, FieldMode::Required),
        ]);

        assert!(!declared.is_satisfied_by(&actual));
    }
}
