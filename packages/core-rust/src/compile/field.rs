//! Input widget compilation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::ReferenceCatalog;
use crate::compile::header::display_text;
use crate::path::WILDCARD;
use crate::schema::{FieldDescriptor, FieldHints, FieldKind, FieldParams, FileType};

/// Closed set of input widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    Checkbox,
    Text,
    MultilineText,
    Number,
    Date,
    EnumPickerList,
    EnumPickerInline,
    ReferencePicker,
    FilePicker,
    ImagePicker,
    NestedGroup,
    NestedList,
    TagList,
    MultiImagePicker,
    MultiFilePicker,
    DateList,
    NumberList,
}

impl WidgetKind {
    /// The widget used for an array of this widget's values.
    ///
    /// Widgets that already handle several values map to themselves.
    #[must_use]
    pub fn multiple(self) -> Self {
        match self {
            Self::ImagePicker => Self::MultiImagePicker,
            Self::FilePicker => Self::MultiFilePicker,
            Self::Text | Self::MultilineText => Self::TagList,
            Self::Number => Self::NumberList,
            Self::Date => Self::DateList,
            Self::Checkbox
            | Self::EnumPickerList
            | Self::EnumPickerInline
            | Self::ReferencePicker
            | Self::NestedGroup
            | Self::NestedList
            | Self::TagList
            | Self::MultiImagePicker
            | Self::MultiFilePicker
            | Self::DateList
            | Self::NumberList => self,
        }
    }
}

/// Validation constraints carried over from the schema params.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_length: Option<u64>,
}

impl From<&FieldParams> for Validation {
    fn from(params: &FieldParams) -> Self {
        Self {
            required: params.required,
            min: params.min,
            max: params.max,
            min_length: params.min_length,
            max_length: params.max_length,
        }
    }
}

/// A compiled input descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorField {
    /// Value path. Full for nested groups, relative to the item for nested lists.
    pub path: String,
    /// Label text.
    pub name: String,
    pub widget: WidgetKind,
    pub default_value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub inner_fields: Vec<EditorField>,
    pub validation: Validation,
    /// Opaque properties passed through to the widget.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub props: Map<String, Value>,
    pub read_only: bool,
    pub hidden: bool,
    pub searchable: bool,
}

impl EditorField {
    fn new(path: &str, widget: WidgetKind, default_value: Value, params: &FieldParams) -> Self {
        Self {
            path: path.to_string(),
            name: String::new(),
            widget,
            default_value,
            inner_fields: Vec::new(),
            validation: Validation::from(params),
            props: Map::new(),
            read_only: false,
            hidden: false,
            searchable: true,
        }
    }

    /// Last segment of the path, the key this field occupies in its parent object.
    #[must_use]
    pub fn key(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }
}

/// Object of `key -> default value` for a set of sibling fields.
fn defaults_object(fields: &[EditorField]) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|f| (f.key().to_string(), f.default_value.clone()))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// FieldCompiler
// ---------------------------------------------------------------------------

/// Compiles schema fields into editor input descriptors.
pub struct FieldCompiler<'r, 'a> {
    refs: &'r ReferenceCatalog<'a>,
    /// Hints keyed by absolute value path, overriding a nested field's own.
    overrides: Option<&'r BTreeMap<String, FieldHints>>,
    /// Absolute path prefix of the fields being compiled, for override lookup.
    scope: String,
}

impl<'r, 'a> FieldCompiler<'r, 'a> {
    #[must_use]
    pub fn new(refs: &'r ReferenceCatalog<'a>) -> Self {
        Self {
            refs,
            overrides: None,
            scope: String::new(),
        }
    }

    /// Applies `overrides` to nested fields, keyed by value path
    /// (`address.city`, `lines.*.sku`).
    #[must_use]
    pub fn with_overrides(mut self, overrides: &'r BTreeMap<String, FieldHints>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    fn nested_hints<'s>(&'s self, path: &str, field: &'s FieldDescriptor) -> Option<&'s FieldHints> {
        self.overrides
            .and_then(|overrides| overrides.get(&format!("{}{path}", self.scope)))
            .or(field.hints())
    }

    /// Compiles `field` at value path `path`.
    ///
    /// Returns `None` for fields that are hidden and not searchable, for buffers,
    /// and for nested lists without any editable inner field.
    #[must_use]
    pub fn compile(
        &self,
        path: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
    ) -> Option<EditorField> {
        if hints.is_some_and(FieldHints::is_suppressed) {
            debug!(path, "field hidden and not searchable, skipped");
            return None;
        }
        let mut editor = self.widget_for(path, field, hints)?;

        if let Some(default) = &field.params.default {
            editor.default_value = default.clone();
        }
        editor.name = display_text(path, hints);
        let options = self.refs.options();
        editor.read_only = hints.is_some_and(|h| h.read_only) || options.is_read_only(editor.key());
        if let Some(hints) = hints {
            if let Some(widget) = hints.widget {
                editor.widget = widget;
            }
            editor.hidden = hints.hidden;
            editor.searchable = hints.searchable.unwrap_or(true);
            editor
                .props
                .extend(hints.props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(editor)
    }

    /// Widget selection with the type's zero value as default.
    fn widget_for(
        &self,
        path: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
    ) -> Option<EditorField> {
        let params = &field.params;
        let options = self.refs.options();
        let editor = match &field.kind {
            FieldKind::String | FieldKind::Number if field.has_enum() => {
                let values = params.enum_values.as_deref().unwrap_or_default();
                let list = hints.is_some_and(|h| h.list) || values.len() > options.enum_list_threshold;
                let widget = if list {
                    WidgetKind::EnumPickerList
                } else {
                    WidgetKind::EnumPickerInline
                };
                let items: Vec<Value> = values
                    .iter()
                    .map(|v| serde_json::json!({ "value": v.value(), "text": v.label() }))
                    .collect();
                EditorField::new(path, widget, Value::Null, params).with_prop("items", items)
            }
            FieldKind::String => {
                let multiline = hints.is_some_and(|h| h.multiline)
                    || params
                        .max_length
                        .is_some_and(|len| len > options.multiline_threshold);
                let widget = if multiline {
                    WidgetKind::MultilineText
                } else {
                    WidgetKind::Text
                };
                EditorField::new(path, widget, Value::from(""), params)
            }
            FieldKind::Number => EditorField::new(path, WidgetKind::Number, Value::from(0), params),
            FieldKind::Boolean => {
                EditorField::new(path, WidgetKind::Checkbox, Value::Bool(false), params)
            }
            FieldKind::Date => EditorField::new(path, WidgetKind::Date, Value::Null, params),
            FieldKind::Id => self.reference_widget(path, field, hints),
            FieldKind::Object { fields } => {
                let inner: Vec<EditorField> = fields
                    .iter()
                    .filter_map(|f| {
                        let child = format!("{path}.{}", f.name);
                        self.compile(&child, f, self.nested_hints(&child, f))
                    })
                    .collect();
                let mut editor =
                    EditorField::new(path, WidgetKind::NestedGroup, defaults_object(&inner), params);
                editor.inner_fields = inner;
                editor
            }
            FieldKind::Array { items } => return self.array_widget(path, field, items, hints),
            FieldKind::Buffer => {
                debug!(path, "buffer fields are not editable");
                return None;
            }
            FieldKind::Mixed => {
                EditorField::new(path, WidgetKind::MultilineText, Value::Null, params)
                    .with_prop("json", true)
            }
        };
        Some(editor)
    }

    fn reference_widget(
        &self,
        path: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
    ) -> EditorField {
        let params = &field.params;
        let options = self.refs.options();
        if let Some(collection) = params.reference.as_deref() {
            if options.is_attachment(collection) {
                let widget = match params.file_type {
                    Some(FileType::Image) => WidgetKind::ImagePicker,
                    _ => WidgetKind::FilePicker,
                };
                return EditorField::new(path, widget, Value::Null, params)
                    .with_prop("source", collection);
            }
        }

        let multiple = hints.is_some_and(|h| h.multiple);
        let default = if multiple {
            Value::Array(Vec::new())
        } else {
            Value::Null
        };
        let mut editor = EditorField::new(path, WidgetKind::ReferencePicker, default, params)
            .with_prop("multiple", multiple);
        match self.refs.lookup_reference_collection(field) {
            Ok(target) => {
                editor = editor
                    .with_prop("source", target.path)
                    .with_prop("nameFields", target.display_fields);
                if let Some(route) = target.route {
                    editor = editor.with_prop("route", route);
                }
            }
            Err(err) => warn!(path, %err, "reference picker without target collection"),
        }
        editor
    }

    fn array_widget(
        &self,
        path: &str,
        field: &FieldDescriptor,
        items: &FieldDescriptor,
        hints: Option<&FieldHints>,
    ) -> Option<EditorField> {
        if let FieldKind::Object { fields } = &items.kind {
            let item_compiler = FieldCompiler {
                refs: self.refs,
                overrides: self.overrides,
                scope: format!("{}{path}.{WILDCARD}.", self.scope),
            };
            let inner: Vec<EditorField> = fields
                .iter()
                .filter_map(|f| item_compiler.compile(&f.name, f, item_compiler.nested_hints(&f.name, f)))
                .collect();
            if inner.is_empty() {
                debug!(path, "nested list has no editable fields, skipped");
                return None;
            }
            let item_default = defaults_object(&inner);
            let mut editor = EditorField::new(
                path,
                WidgetKind::NestedList,
                Value::Array(Vec::new()),
                &field.params,
            )
            .with_prop("itemDefault", item_default);
            editor.inner_fields = inner;
            return Some(editor);
        }

        let item = self.widget_for(path, items, hints.or(items.hints()))?;
        let item_default = items
            .params
            .default
            .clone()
            .unwrap_or_else(|| item.default_value.clone());
        let mut validation = item.validation;
        validation.required |= field.params.required;
        let mut props = item.props;
        props.insert("multiple".to_string(), Value::Bool(true));
        props.insert("itemDefault".to_string(), item_default);
        Some(EditorField {
            path: path.to_string(),
            name: String::new(),
            widget: item.widget.multiple(),
            default_value: Value::Array(Vec::new()),
            inner_fields: item.inner_fields,
            validation,
            props,
            read_only: false,
            hidden: false,
            searchable: true,
        })
    }
}
