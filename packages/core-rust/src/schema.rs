//! Declarative collection schema model.
//!
//! A schema catalog document maps collection names to [`CollectionSchema`]s.
//! Field types form the closed [`FieldKind`] enum: container kinds carry their
//! nested structure inline, so a descriptor is always exactly one of a primitive,
//! an object with nested fields, or an array with an item type.
//!
//! All types deserialize from the camelCase JSON catalog format and are
//! immutable once the catalog has been parsed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compile::WidgetKind;
use crate::query::SortKey;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field name. Empty for array item descriptors.
    #[serde(default)]
    pub name: String,
    /// Field type, including nested structure for containers.
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Validation, reference, and editor-hint bag.
    #[serde(default)]
    pub params: FieldParams,
}

/// Closed set of schema field types.
///
/// Serialized as the `type` tag of the enclosing descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    /// Reference to a record of another collection (see [`FieldParams::reference`]).
    #[serde(alias = "objectid", alias = "objectId")]
    Id,
    Object {
        fields: Vec<FieldDescriptor>,
    },
    Array {
        items: Box<FieldDescriptor>,
    },
    Buffer,
    Mixed,
}

/// Payload-free discriminant of [`FieldKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Id,
    Object,
    Array,
    Buffer,
    Mixed,
}

impl FieldKind {
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String => FieldType::String,
            Self::Number => FieldType::Number,
            Self::Boolean => FieldType::Boolean,
            Self::Date => FieldType::Date,
            Self::Id => FieldType::Id,
            Self::Object { .. } => FieldType::Object,
            Self::Array { .. } => FieldType::Array,
            Self::Buffer => FieldType::Buffer,
            Self::Mixed => FieldType::Mixed,
        }
    }
}

impl FieldDescriptor {
    /// Creates a descriptor with empty params.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: FieldParams::default(),
        }
    }

    /// Replaces the params bag.
    #[must_use]
    pub fn with_params(mut self, params: FieldParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// The descriptor reached by unwrapping every array layer.
    #[must_use]
    pub fn leaf(&self) -> &FieldDescriptor {
        match &self.kind {
            FieldKind::Array { items } => items.leaf(),
            _ => self,
        }
    }

    /// Whether the field carries an enumeration of allowed values.
    #[must_use]
    pub fn has_enum(&self) -> bool {
        self.params
            .enum_values
            .as_ref()
            .is_some_and(|values| !values.is_empty())
    }

    /// Editor hints declared on the field itself.
    #[must_use]
    pub fn hints(&self) -> Option<&FieldHints> {
        self.params.editor.as_ref()
    }
}

/// Validation, reference, and editor-hint parameters of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldParams {
    #[serde(skip_serializing_if = "is_false", default)]
    pub required: bool,
    /// Allowed values for the field.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none", default)]
    pub enum_values: Option<Vec<EnumOption>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_length: Option<u64>,
    /// Name of the referenced collection for `id` fields.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<String>,
    /// File-type marker for references into the attachment collection.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_type: Option<FileType>,
    /// Explicit schema default value.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub index: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub unique: bool,
    /// Per-field editor hints.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub editor: Option<FieldHints>,
}

/// One allowed value of an enumeration, optionally with a display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumOption {
    Labeled { value: Value, text: String },
    Plain(Value),
}

impl EnumOption {
    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Labeled { value, .. } | Self::Plain(value) => value,
        }
    }

    /// Display label: the explicit text, or the value itself.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Labeled { text, .. } => text.clone(),
            Self::Plain(value) => value_label(value),
        }
    }
}

/// Renders a scalar JSON value as plain text (strings without quotes).
#[must_use]
pub fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Kind of file stored in the attachment collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    File,
}

/// Editor hints attached to a field or overridden per editor variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldHints {
    /// Display text for the column and input label.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub hidden: bool,
    /// `Some(false)` excludes the field from search. Defaults to searchable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub searchable: Option<bool>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub read_only: bool,
    /// Explicit widget override.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub widget: Option<WidgetKind>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub multiline: bool,
    /// Render an enumeration as a list picker regardless of its size.
    #[serde(skip_serializing_if = "is_false", default)]
    pub list: bool,
    /// Multi-select for reference pickers.
    #[serde(skip_serializing_if = "is_false", default)]
    pub multiple: bool,
    /// Include the field in the default header set.
    #[serde(skip_serializing_if = "is_false", default)]
    pub header: bool,
    /// Sub-fields of an object projected into a composite column.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub name_fields: Vec<NameFieldHint>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flex: Option<u32>,
    /// Maximum number of values shown in a multi-valued cell.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
    /// Collapse duplicate values in a multi-valued cell.
    #[serde(skip_serializing_if = "is_false", default)]
    pub unique: bool,
    /// Whether the value is carried over when a record is cloned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clone: Option<bool>,
    /// Opaque widget properties passed through to rendering.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub props: Map<String, Value>,
}

impl FieldHints {
    /// A field that is hidden and also excluded from search has nothing to offer.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.hidden && self.searchable == Some(false)
    }
}

/// Projection of one object sub-field into a composite column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameFieldHint {
    /// Path relative to the object.
    pub path: String,
    /// Column key to publish the sub-field under. Defaults to `path`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
}

// ---------------------------------------------------------------------------
// Collections and editor variants
// ---------------------------------------------------------------------------

/// Schema description of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name. Filled from the catalog key when omitted.
    #[serde(default)]
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Primary editor variant.
    #[serde(default)]
    pub editor: EditorVariant,
    /// Additional named editor variants.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub variants: BTreeMap<String, EditorVariant>,
    #[serde(default)]
    pub services: ServiceSection,
}

impl CollectionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
            editor: EditorVariant::default(),
            variants: BTreeMap::new(),
            services: ServiceSection::default(),
        }
    }

    /// Top-level field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Collection path the loader queries. Defaults to the collection name.
    #[must_use]
    pub fn service_path(&self) -> &str {
        self.services.path.as_deref().unwrap_or(&self.name)
    }
}

/// Names the remote collection endpoint backing a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSection {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

/// One named presentation of a collection: headers, search, CRUD flags, navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorVariant {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub root_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<i32>,
    /// Explicit header paths. `None` selects the default header set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub headers: Option<Vec<String>>,
    /// Restricts and orders the search fields.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub search: Option<Vec<String>>,
    /// Per-path hint overrides. Replace the field's own hints entirely.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub field_hints: BTreeMap<String, FieldHints>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name_fields: Option<Vec<String>>,
    /// Fields shown when this collection is referenced from another one.
    /// `None` falls back to the display fields; `Some([])` renders flat text.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reference_headers: Option<Vec<String>>,
    /// Server-side base filter always applied to queries.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub filter: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub default_sort: Vec<SortKey>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paginate: Option<bool>,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

/// CRUD capability flags of an editor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    #[serde(default = "default_true")]
    pub create: bool,
    #[serde(default = "default_true")]
    pub patch: bool,
    #[serde(default = "default_true")]
    pub remove: bool,
    #[serde(default = "default_true")]
    pub clone: bool,
    #[serde(default)]
    pub import: bool,
    #[serde(default)]
    pub export: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            create: true,
            patch: true,
            remove: true,
            clone: true,
            import: false,
            export: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_descriptor() {
        let field: FieldDescriptor = serde_json::from_value(json!({
            "name": "comments",
            "type": "array",
            "items": {
                "type": "object",
                "fields": [
                    { "name": "body", "type": "string", "params": { "required": true } },
                    { "name": "author", "type": "id", "params": { "ref": "users" } }
                ]
            }
        }))
        .unwrap();

        let FieldKind::Array { items } = &field.kind else {
            panic!("expected array, got {:?}", field.kind);
        };
        let FieldKind::Object { fields } = &items.kind else {
            panic!("expected object item");
        };
        assert_eq!(fields.len(), 2);
        assert!(fields[0].params.required);
        assert_eq!(fields[1].params.reference.as_deref(), Some("users"));
        assert_eq!(field.leaf().field_type(), FieldType::Object);
    }

    #[test]
    fn parses_enum_options_plain_and_labeled() {
        let params: FieldParams = serde_json::from_value(json!({
            "enum": ["draft", { "value": "live", "text": "Published" }, 3]
        }))
        .unwrap();
        let values = params.enum_values.unwrap();
        assert_eq!(values[0].label(), "draft");
        assert_eq!(values[1].label(), "Published");
        assert_eq!(values[1].value(), &json!("live"));
        assert_eq!(values[2].label(), "3");
    }

    #[test]
    fn objectid_alias_maps_to_id() {
        let field: FieldDescriptor =
            serde_json::from_value(json!({ "name": "owner", "type": "objectid" })).unwrap();
        assert_eq!(field.field_type(), FieldType::Id);
    }

    #[test]
    fn capabilities_default_when_absent() {
        let variant: EditorVariant = serde_json::from_value(json!({ "export": true })).unwrap();
        assert!(variant.capabilities.create);
        assert!(variant.capabilities.clone);
        assert!(!variant.capabilities.import);
        assert!(variant.capabilities.export);
    }

    #[test]
    fn service_path_defaults_to_name() {
        let mut schema = CollectionSchema::new("posts", Vec::new());
        assert_eq!(schema.service_path(), "posts");
        schema.services.path = Some("api/posts".to_string());
        assert_eq!(schema.service_path(), "api/posts");
    }

    #[test]
    fn suppressed_requires_hidden_and_not_searchable() {
        let mut hints = FieldHints {
            hidden: true,
            ..FieldHints::default()
        };
        assert!(!hints.is_suppressed());
        hints.searchable = Some(false);
        assert!(hints.is_suppressed());
    }
}
