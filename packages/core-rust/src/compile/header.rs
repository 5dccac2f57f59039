//! Table column compilation.
//!
//! [`HeaderCompiler`] turns a field descriptor into a [`DataTableHeader`] by
//! exhaustive dispatch over [`FieldKind`]. Reference columns are expanded into
//! the referenced collection's header fields; the expansion tracks the
//! `(collection, path)` pairs currently being compiled and degrades a revisited
//! pair to a raw-id column, so self-referential schema graphs terminate.

use std::collections::BTreeMap;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{reference_name, ReferenceCatalog};
use crate::path::{resolve, FieldPath, WILDCARD};
use crate::schema::{value_label, FieldDescriptor, FieldHints, FieldKind, FieldType, FileType};

/// Scalar types whose columns can be sorted.
pub const SORTABLE_TYPES: [FieldType; 4] = [
    FieldType::String,
    FieldType::Number,
    FieldType::Date,
    FieldType::Boolean,
];

fn is_sortable(field: &FieldDescriptor) -> bool {
    SORTABLE_TYPES.contains(&field.field_type())
}

/// How a column renders its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderKind {
    Text,
    Number,
    Boolean,
    Date,
    Enum,
    Reference,
    Thumbnail,
    Object,
    Mixed,
}

impl HeaderKind {
    /// Whether a column of this kind displays fields of the given type.
    ///
    /// Array-valued fields are judged by their item type.
    #[must_use]
    pub fn accepts(self, field_type: FieldType) -> bool {
        match self {
            Self::Text => field_type == FieldType::String,
            Self::Number => field_type == FieldType::Number,
            Self::Boolean => field_type == FieldType::Boolean,
            Self::Date => field_type == FieldType::Date,
            Self::Enum => matches!(field_type, FieldType::String | FieldType::Number),
            Self::Reference | Self::Thumbnail => field_type == FieldType::Id,
            Self::Object => field_type == FieldType::Object,
            Self::Mixed => field_type == FieldType::Mixed,
        }
    }
}

/// A compiled display column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTableHeader {
    /// Value path of the column. Relative to the parent for inner headers.
    pub key: String,
    pub text: String,
    pub kind: HeaderKind,
    pub sortable: bool,
    pub flex: u32,
    /// Service path of the referenced collection.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
    /// Display fields of the referenced record.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub name_field_paths: Vec<String>,
    /// Flat rendering path of a non-composite reference, `a/b` for several fields.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
    /// Editor route of the referenced collection for deep links.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route: Option<String>,
    /// Enumeration value to label.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enum_labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub inner_headers: Vec<DataTableHeader>,
    /// Composite column whose cell is built from `inner_headers`.
    pub multi: bool,
    /// Array-valued column.
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
    pub unique: bool,
}

impl DataTableHeader {
    fn new(key: &str, kind: HeaderKind, sortable: bool, hints: Option<&FieldHints>) -> Self {
        Self {
            key: key.to_string(),
            text: display_text(key, hints),
            kind,
            sortable,
            flex: hints.and_then(|h| h.flex).unwrap_or(1),
            source: None,
            name_field_paths: Vec::new(),
            path: None,
            route: None,
            enum_labels: None,
            inner_headers: Vec::new(),
            multi: false,
            multiple: false,
            limit: hints.and_then(|h| h.limit),
            unique: hints.is_some_and(|h| h.unique),
        }
    }

    /// Renders a reference cell.
    ///
    /// `target` is the referenced record as looked up by the caller. A present id
    /// without a target is a deleted reference and always renders as
    /// [`ReferenceCell::Deleted`]; columns without display fields show the raw id.
    #[must_use]
    pub fn render_reference(&self, id: Option<&Value>, target: Option<&Value>) -> ReferenceCell {
        let id = match id {
            None | Some(Value::Null) => return ReferenceCell::Empty,
            Some(id) => id,
        };
        if self.name_field_paths.is_empty() {
            return ReferenceCell::RawId(value_label(id));
        }
        let Some(target) = target else {
            return ReferenceCell::Deleted;
        };
        let parts: Vec<String> = self
            .name_field_paths
            .iter()
            .map(|p| {
                FieldPath::parse(p)
                    .get(target)
                    .map(value_label)
                    .unwrap_or_default()
            })
            .collect();
        ReferenceCell::Label(parts.join("/"))
    }
}

/// Rendering state of a reference cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum ReferenceCell {
    /// No id stored.
    Empty,
    /// Id shown verbatim; the referenced collection has no display field.
    RawId(String),
    /// Display fields of the referenced record joined by `/`.
    Label(String),
    /// The id points at a record that no longer exists.
    Deleted,
}

/// Column text: the hint's `text`, else the humanized last path segment.
#[must_use]
pub fn display_text(key: &str, hints: Option<&FieldHints>) -> String {
    if let Some(text) = hints.and_then(|h| h.text.as_ref()) {
        return text.clone();
    }
    let last = key
        .rsplit('.')
        .find(|s| *s != WILDCARD && !s.is_empty())
        .unwrap_or(key);
    humanize(last)
}

/// `createdAt` / `created_at` -> `Created At`. Leading underscores are dropped.
#[must_use]
pub fn humanize(name: &str) -> String {
    name.trim_start_matches('_').to_case(Case::Title)
}

// ---------------------------------------------------------------------------
// HeaderCompiler
// ---------------------------------------------------------------------------

/// `(collection, path)` pairs whose reference expansion is in progress.
type ExpansionStack = Vec<(String, String)>;

/// Compiles field descriptors of one collection into table columns.
pub struct HeaderCompiler<'r, 'a> {
    refs: &'r ReferenceCatalog<'a>,
    collection: &'r str,
}

impl<'r, 'a> HeaderCompiler<'r, 'a> {
    #[must_use]
    pub fn new(refs: &'r ReferenceCatalog<'a>, collection: &'r str) -> Self {
        Self { refs, collection }
    }

    /// Compiles the column for `field` at value path `key`.
    ///
    /// Returns `None` when the field cannot be displayed (buffers, non-image
    /// attachments, objects without displayable sub-fields).
    #[must_use]
    pub fn compile(
        &self,
        key: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
    ) -> Option<DataTableHeader> {
        let mut stack = ExpansionStack::new();
        self.compile_in(self.collection, key, field, hints, &mut stack)
    }

    fn compile_in(
        &self,
        owner: &str,
        key: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
        stack: &mut ExpansionStack,
    ) -> Option<DataTableHeader> {
        let sortable = is_sortable(field);
        match &field.kind {
            FieldKind::String | FieldKind::Number if field.has_enum() => {
                let mut header = DataTableHeader::new(key, HeaderKind::Enum, sortable, hints);
                header.enum_labels = field.params.enum_values.as_ref().map(|values| {
                    values
                        .iter()
                        .map(|v| (value_label(v.value()), v.label()))
                        .collect()
                });
                Some(header)
            }
            FieldKind::String => Some(DataTableHeader::new(key, HeaderKind::Text, sortable, hints)),
            FieldKind::Number => Some(DataTableHeader::new(key, HeaderKind::Number, sortable, hints)),
            FieldKind::Boolean => Some(DataTableHeader::new(key, HeaderKind::Boolean, sortable, hints)),
            FieldKind::Date => Some(DataTableHeader::new(key, HeaderKind::Date, sortable, hints)),
            FieldKind::Id => self.reference_header(owner, key, field, hints, stack),
            FieldKind::Object { fields } => self.object_header(owner, key, fields, hints, stack),
            FieldKind::Array { items } => {
                let mut header =
                    self.compile_in(owner, key, items, hints.or(items.hints()), stack)?;
                header.multiple = true;
                header.sortable = false;
                Some(header)
            }
            FieldKind::Buffer => None,
            FieldKind::Mixed => Some(DataTableHeader::new(key, HeaderKind::Mixed, sortable, hints)),
        }
    }

    fn reference_header(
        &self,
        owner: &str,
        key: &str,
        field: &FieldDescriptor,
        hints: Option<&FieldHints>,
        stack: &mut ExpansionStack,
    ) -> Option<DataTableHeader> {
        if let Some(name) = reference_name(field) {
            if self.refs.options().is_attachment(name) {
                return match field.params.file_type {
                    Some(FileType::Image) => {
                        Some(DataTableHeader::new(key, HeaderKind::Thumbnail, is_sortable(field), hints))
                    }
                    _ => {
                        debug!(collection = owner, key, "non-image attachment column omitted");
                        None
                    }
                };
            }
        }

        let mut header = DataTableHeader::new(key, HeaderKind::Reference, is_sortable(field), hints);
        let target = match self.refs.lookup_reference_collection(field) {
            Ok(target) => target,
            Err(err) => {
                warn!(collection = owner, key, %err, "reference column degraded to raw id");
                return Some(header);
            }
        };
        header.source = Some(target.path.clone());
        header.route.clone_from(&target.route);

        let frame = (owner.to_string(), key.to_string());
        if stack.contains(&frame) {
            warn!(collection = owner, key, "cyclic reference, column degraded to raw id");
            return Some(header);
        }
        header.name_field_paths = target.display_fields;

        let Some(schema) = self.refs.catalog().get(&target.collection) else {
            return Some(header);
        };
        let reference_headers = ReferenceCatalog::reference_headers(schema);
        if !reference_headers.is_empty() {
            stack.push(frame);
            let inner: Vec<DataTableHeader> = reference_headers
                .iter()
                .filter_map(|path| match resolve(&schema.fields, path, true) {
                    Ok(resolved) => self.compile_in(
                        &schema.name,
                        &resolved.path.to_string(),
                        resolved.field,
                        resolved.field.hints(),
                        stack,
                    ),
                    Err(err) => {
                        warn!(collection = %schema.name, path = %path, %err, "skipping reference header");
                        None
                    }
                })
                .collect();
            stack.pop();
            if !inner.is_empty() {
                header.inner_headers = inner;
                header.multi = true;
            }
        }

        if !header.multi && !header.name_field_paths.is_empty() {
            header.path = Some(header.name_field_paths.join("/"));
        }
        Some(header)
    }

    fn object_header(
        &self,
        owner: &str,
        key: &str,
        fields: &[FieldDescriptor],
        hints: Option<&FieldHints>,
        stack: &mut ExpansionStack,
    ) -> Option<DataTableHeader> {
        let projections = hints.map(|h| h.name_fields.as_slice()).unwrap_or_default();

        let inner: Vec<DataTableHeader> = if projections.is_empty() {
            fields
                .iter()
                .filter_map(|f| {
                    let child_key = format!("{key}.{}", f.name);
                    let mut header = self.compile_in(owner, &child_key, f, f.hints(), stack)?;
                    header.key.clone_from(&f.name);
                    Some(header)
                })
                .collect()
        } else {
            projections
                .iter()
                .filter_map(|projection| match resolve(fields, &projection.path, true) {
                    Ok(resolved) => {
                        let child_key = format!("{key}.{}", resolved.path);
                        let mut header = self.compile_in(
                            owner,
                            &child_key,
                            resolved.field,
                            resolved.field.hints(),
                            stack,
                        )?;
                        header.key = projection
                            .key
                            .clone()
                            .unwrap_or_else(|| projection.path.clone());
                        Some(header)
                    }
                    Err(err) => {
                        warn!(collection = owner, key, %err, "skipping name field projection");
                        None
                    }
                })
                .collect()
        };

        if inner.is_empty() {
            debug!(collection = owner, key, "object column has no displayable fields");
            return None;
        }
        let mut header = DataTableHeader::new(key, HeaderKind::Object, false, hints);
        header.inner_headers = inner;
        header.multi = true;
        Some(header)
    }
}
