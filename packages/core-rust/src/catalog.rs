//! Schema catalog and cross-collection reference lookup.
//!
//! [`SchemaCatalog`] owns every parsed [`CollectionSchema`]. It is read-only after
//! construction, so a [`ReferenceCatalog`] borrowed from it can be shared by any
//! number of compilers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compile::CompilerOptions;
use crate::schema::{CollectionSchema, EditorVariant, FieldDescriptor, FieldKind};

/// Errors from loading a schema catalog document.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid schema catalog document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// All collection schemas of one application, keyed by collection name.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCatalog {
    collections: BTreeMap<String, CollectionSchema>,
    options: CompilerOptions,
}

impl SchemaCatalog {
    /// Builds a catalog from schemas keyed by their `name`.
    #[must_use]
    pub fn new(collections: impl IntoIterator<Item = CollectionSchema>) -> Self {
        Self {
            collections: collections
                .into_iter()
                .map(|schema| (schema.name.clone(), schema))
                .collect(),
            options: CompilerOptions::default(),
        }
    }

    /// Parses a catalog document: a JSON object of collection name to schema.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the document is not a valid catalog.
    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, CollectionSchema> = serde_json::from_str(document)?;
        Ok(Self::from_named(raw))
    }

    /// Like [`from_json`](Self::from_json) for an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the value is not a valid catalog.
    pub fn from_value(document: serde_json::Value) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, CollectionSchema> = serde_json::from_value(document)?;
        Ok(Self::from_named(raw))
    }

    fn from_named(raw: BTreeMap<String, CollectionSchema>) -> Self {
        let collections = raw
            .into_iter()
            .map(|(key, mut schema)| {
                if schema.name.is_empty() {
                    schema.name.clone_from(&key);
                }
                (key, schema)
            })
            .collect();
        Self {
            collections,
            options: CompilerOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.collections.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Builds the reference lookup, registering each collection's primary
    /// editor route under its service path.
    #[must_use]
    pub fn references(&self) -> ReferenceCatalog<'_> {
        let routes = self
            .collections
            .values()
            .map(|schema| {
                (
                    schema.service_path().to_string(),
                    variant_root_path(&schema.name, None, &schema.editor),
                )
            })
            .collect();
        ReferenceCatalog {
            catalog: self,
            routes,
        }
    }
}

/// Route of an editor variant: explicit `rootPath`, else `/<collection>` for the
/// primary variant and `/<collection>/<variant>` for named ones.
#[must_use]
pub fn variant_root_path(
    collection: &str,
    variant_name: Option<&str>,
    variant: &EditorVariant,
) -> String {
    if let Some(root) = &variant.root_path {
        return root.clone();
    }
    match variant_name {
        Some(name) => format!("/{collection}/{name}"),
        None => format!("/{collection}"),
    }
}

/// Display fields of a collection, by precedence: the configured name-field
/// list, a single configured name field, the first string field literally
/// named `name`, then the first non-enumerated string field.
///
/// Empty when none applies; callers degrade to showing the raw id.
#[must_use]
pub fn select_display_fields(variant: &EditorVariant, fields: &[FieldDescriptor]) -> Vec<String> {
    if let Some(list) = variant.name_fields.as_ref().filter(|l| !l.is_empty()) {
        return list.clone();
    }
    if let Some(single) = &variant.name_field {
        return vec![single.clone()];
    }
    let is_string = |f: &&FieldDescriptor| matches!(f.kind, FieldKind::String);
    if let Some(named) = fields.iter().filter(is_string).find(|f| f.name == "name") {
        return vec![named.name.clone()];
    }
    fields
        .iter()
        .filter(is_string)
        .find(|f| !f.has_enum())
        .map(|f| vec![f.name.clone()])
        .unwrap_or_default()
}

/// Name of the collection a field references, looking through array layers.
#[must_use]
pub fn reference_name(field: &FieldDescriptor) -> Option<&str> {
    field
        .leaf()
        .params
        .reference
        .as_deref()
        .or(field.params.reference.as_deref())
}

// ---------------------------------------------------------------------------
// ReferenceCatalog
// ---------------------------------------------------------------------------

/// Reasons a reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("field `{field}` does not reference a collection")]
    NotAReference { field: String },
    #[error("field `{field}` references unknown collection `{collection}`")]
    UnknownCollection { field: String, collection: String },
}

/// Resolved target of a reference field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTarget {
    /// Referenced collection name.
    pub collection: String,
    /// Service path of the referenced collection.
    pub path: String,
    /// Fields rendered as the referenced record's name.
    pub display_fields: Vec<String>,
    /// Editor route for deep links, when one is registered.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route: Option<String>,
}

/// Read-only view over the catalog used to resolve reference fields.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog<'a> {
    catalog: &'a SchemaCatalog,
    routes: BTreeMap<String, String>,
}

impl<'a> ReferenceCatalog<'a> {
    #[must_use]
    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    #[must_use]
    pub fn options(&self) -> &'a CompilerOptions {
        &self.catalog.options
    }

    /// Schema of the collection a reference field points at.
    ///
    /// # Errors
    ///
    /// Fails when the field carries no `ref` or the collection is unknown.
    pub fn target_schema(
        &self,
        field: &FieldDescriptor,
    ) -> Result<&'a CollectionSchema, ReferenceError> {
        let collection = reference_name(field).ok_or_else(|| ReferenceError::NotAReference {
            field: field.name.clone(),
        })?;
        self.catalog
            .get(collection)
            .ok_or_else(|| ReferenceError::UnknownCollection {
                field: field.name.clone(),
                collection: collection.to_string(),
            })
    }

    /// Looks up the referenced collection's service path, display fields, and
    /// editor route.
    ///
    /// # Errors
    ///
    /// Fails when the field carries no `ref` or the collection is unknown.
    pub fn lookup_reference_collection(
        &self,
        field: &FieldDescriptor,
    ) -> Result<ReferenceTarget, ReferenceError> {
        let schema = self.target_schema(field)?;
        let path = schema.service_path().to_string();
        let display_fields = Self::display_fields(schema);
        if display_fields.is_empty() {
            debug!(
                collection = %schema.name,
                "no display field, references render as raw ids"
            );
        }
        Ok(ReferenceTarget {
            collection: schema.name.clone(),
            route: self.lookup_editor_route(&path).map(str::to_string),
            path,
            display_fields,
        })
    }

    /// Editor route registered for a service path. `None` suppresses links.
    #[must_use]
    pub fn lookup_editor_route(&self, path: &str) -> Option<&str> {
        self.routes.get(path).map(String::as_str)
    }

    /// Display fields of a collection per its primary editor variant.
    #[must_use]
    pub fn display_fields(schema: &CollectionSchema) -> Vec<String> {
        select_display_fields(&schema.editor, &schema.fields)
    }

    /// Header fields a collection exposes when referenced from elsewhere.
    #[must_use]
    pub fn reference_headers(schema: &CollectionSchema) -> Vec<String> {
        schema
            .editor
            .reference_headers
            .clone()
            .unwrap_or_else(|| Self::display_fields(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumOption, FieldParams};
    use serde_json::json;

    fn string(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, FieldKind::String)
    }

    fn reference(name: &str, target: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, FieldKind::Id).with_params(FieldParams {
            reference: Some(target.to_string()),
            ..FieldParams::default()
        })
    }

    #[test]
    fn parses_catalog_document_and_fills_names() {
        let catalog = SchemaCatalog::from_value(json!({
            "tags": { "fields": [ { "name": "name", "type": "string" } ] },
            "posts": {
                "fields": [ { "name": "tag", "type": "id", "params": { "ref": "tags" } } ],
                "services": { "path": "api/posts" }
            }
        }))
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("tags").unwrap().name, "tags");
        assert_eq!(catalog.get("posts").unwrap().service_path(), "api/posts");
    }

    #[test]
    fn rejects_malformed_document() {
        let err = SchemaCatalog::from_json(r#"{ "posts": { "fields": 3 } }"#).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn display_field_precedence() {
        let fields = vec![string("title"), string("name")];

        let mut variant = EditorVariant {
            name_fields: Some(vec!["first".into(), "last".into()]),
            name_field: Some("title".into()),
            ..EditorVariant::default()
        };
        assert_eq!(select_display_fields(&variant, &fields), vec!["first", "last"]);

        variant.name_fields = None;
        assert_eq!(select_display_fields(&variant, &fields), vec!["title"]);

        variant.name_field = None;
        assert_eq!(select_display_fields(&variant, &fields), vec!["name"]);
    }

    #[test]
    fn display_field_skips_enumerations() {
        let status = string("status").with_params(FieldParams {
            enum_values: Some(vec![EnumOption::Plain(json!("a"))]),
            ..FieldParams::default()
        });
        let fields = vec![FieldDescriptor::new("count", FieldKind::Number), status, string("label")];
        assert_eq!(
            select_display_fields(&EditorVariant::default(), &fields),
            vec!["label"]
        );
        assert!(select_display_fields(&EditorVariant::default(), &fields[..2]).is_empty());
    }

    #[test]
    fn lookup_reference_collection_resolves_route_and_display() {
        let tags = CollectionSchema::new("tags", vec![string("name")]);
        let catalog = SchemaCatalog::new([tags]);
        let refs = catalog.references();

        let target = refs
            .lookup_reference_collection(&reference("tag", "tags"))
            .unwrap();
        assert_eq!(target.collection, "tags");
        assert_eq!(target.path, "tags");
        assert_eq!(target.display_fields, vec!["name"]);
        assert_eq!(target.route.as_deref(), Some("/tags"));
    }

    #[test]
    fn lookup_through_array_layer() {
        let catalog = SchemaCatalog::new([CollectionSchema::new("tags", vec![string("name")])]);
        let refs = catalog.references();
        let field = FieldDescriptor::new(
            "tags",
            FieldKind::Array {
                items: Box::new(reference("", "tags")),
            },
        );
        assert_eq!(refs.lookup_reference_collection(&field).unwrap().collection, "tags");
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let catalog = SchemaCatalog::new(Vec::new());
        let refs = catalog.references();
        let err = refs
            .lookup_reference_collection(&reference("owner", "ghosts"))
            .unwrap_err();
        assert_eq!(
            err,
            ReferenceError::UnknownCollection {
                field: "owner".into(),
                collection: "ghosts".into(),
            }
        );
        assert!(matches!(
            refs.lookup_reference_collection(&string("plain")),
            Err(ReferenceError::NotAReference { .. })
        ));
    }

    #[test]
    fn editor_route_missing_suppresses_links() {
        let catalog = SchemaCatalog::new([CollectionSchema::new("tags", vec![])]);
        let refs = catalog.references();
        assert_eq!(refs.lookup_editor_route("tags"), Some("/tags"));
        assert_eq!(refs.lookup_editor_route("users"), None);
    }

    #[test]
    fn reference_headers_default_to_display_fields() {
        let mut tags = CollectionSchema::new("tags", vec![string("name")]);
        assert_eq!(ReferenceCatalog::reference_headers(&tags), vec!["name"]);
        tags.editor.reference_headers = Some(Vec::new());
        assert!(ReferenceCatalog::reference_headers(&tags).is_empty());
    }

    #[test]
    fn variant_root_paths() {
        let variant = EditorVariant::default();
        assert_eq!(variant_root_path("posts", None, &variant), "/posts");
        assert_eq!(variant_root_path("posts", Some("drafts"), &variant), "/posts/drafts");
        let explicit = EditorVariant {
            root_path: Some("/blog".into()),
            ..EditorVariant::default()
        };
        assert_eq!(variant_root_path("posts", None, &explicit), "/blog");
    }
}
