//! Editor configuration assembly.
//!
//! [`ConfigCompiler`] runs the header, field, and search compilers over one
//! `(collection, editor variant)` pair and bundles the results into an
//! [`EditorConfig`]. Compilation never fails: unresolvable paths and broken
//! references are logged and skipped, so one bad hint cannot take down a page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::{select_display_fields, variant_root_path, ReferenceCatalog, SchemaCatalog};
use crate::compile::field::{EditorField, FieldCompiler};
use crate::compile::header::{humanize, DataTableHeader, HeaderCompiler};
use crate::compile::search::{SearchCompiler, SearchField};
use crate::path::resolve;
use crate::query::SortKey;
use crate::schema::{
    Capabilities, CollectionSchema, EditorVariant, FieldDescriptor, FieldHints, FieldKind,
};

/// The compiled unit for one `(collection, editor variant)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub name: String,
    pub collection: String,
    /// Service path the loader queries.
    pub service: String,
    pub root_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<i32>,
    pub capabilities: Capabilities,
    pub id_field: String,
    /// Display fields of this collection's records.
    pub name_fields: Vec<String>,
    pub headers: Vec<DataTableHeader>,
    /// Columns of editor fields outside `headers`, available on demand.
    pub extra_headers: Vec<DataTableHeader>,
    pub fields: Vec<EditorField>,
    pub search_fields: Vec<SearchField>,
    /// Seed for new records, keyed by field path.
    pub default_value: Map<String, Value>,
    /// Base filter applied to every query.
    pub filter: Map<String, Value>,
    pub default_sort: Vec<SortKey>,
    pub paginate: bool,
    /// Top-level keys removed when a record is cloned.
    pub clone_omitted: Vec<String>,
}

impl EditorConfig {
    /// A fresh record populated with every field's default value.
    #[must_use]
    pub fn new_record(&self) -> Value {
        Value::Object(self.default_value.clone())
    }

    /// Copy of `record` suitable as the seed of a cloned record.
    ///
    /// The id field is always dropped; other fields follow `clone_omitted`.
    #[must_use]
    pub fn clone_seed(&self, record: &Value) -> Value {
        let Value::Object(source) = record else {
            return self.new_record();
        };
        let seed: Map<String, Value> = source
            .iter()
            .filter(|(key, _)| **key != self.id_field && !self.clone_omitted.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(seed)
    }

    /// Column by key among headers and extra headers.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&DataTableHeader> {
        self.headers
            .iter()
            .chain(&self.extra_headers)
            .find(|h| h.key == key)
    }

    #[must_use]
    pub fn field(&self, path: &str) -> Option<&EditorField> {
        self.fields.iter().find(|f| f.path == path)
    }
}

/// Hints for `path`: a variant override replaces the field's own hints.
fn hints_for<'v>(
    variant: &'v EditorVariant,
    path: &str,
    field: &'v FieldDescriptor,
) -> Option<&'v FieldHints> {
    variant.field_hints.get(path).or(field.hints())
}

// ---------------------------------------------------------------------------
// ConfigCompiler
// ---------------------------------------------------------------------------

/// Compiles editor variants against a shared reference catalog.
pub struct ConfigCompiler<'r, 'a> {
    refs: &'r ReferenceCatalog<'a>,
}

impl<'r, 'a> ConfigCompiler<'r, 'a> {
    #[must_use]
    pub fn new(refs: &'r ReferenceCatalog<'a>) -> Self {
        Self { refs }
    }

    /// Compiles `variant` of `schema`. `variant_name` is `None` for the primary
    /// variant and drives the default root path.
    #[must_use]
    pub fn compile(
        &self,
        schema: &CollectionSchema,
        variant_name: Option<&str>,
        variant: &EditorVariant,
    ) -> EditorConfig {
        let options = self.refs.options();
        let root_path = variant_root_path(&schema.name, variant_name, variant);
        debug!(collection = %schema.name, root_path = %root_path, "compiling editor");

        let header_compiler = HeaderCompiler::new(self.refs, &schema.name);
        let headers = self.headers(&header_compiler, schema, variant);

        let field_compiler = FieldCompiler::new(self.refs).with_overrides(&variant.field_hints);
        let fields: Vec<EditorField> = schema
            .fields
            .iter()
            .filter_map(|f| field_compiler.compile(&f.name, f, hints_for(variant, &f.name, f)))
            .collect();

        let extra_headers: Vec<DataTableHeader> = fields
            .iter()
            .filter(|ef| !headers.iter().any(|h| h.key == ef.path))
            .filter_map(|ef| {
                let field = schema.field(&ef.path)?;
                header_compiler.compile(&ef.path, field, hints_for(variant, &ef.path, field))
            })
            .collect();

        let default_value: Map<String, Value> = fields
            .iter()
            .map(|f| (f.path.clone(), f.default_value.clone()))
            .collect();

        let search_fields = Self::order_search(SearchCompiler.compile(&fields), variant);

        let mut clone_omitted = vec![options.id_field.clone()];
        for name in &options.clone_omitted_fields {
            let keep = schema
                .field(name)
                .and_then(|f| hints_for(variant, name, f))
                .and_then(|h| h.clone)
                == Some(true);
            if !keep && !clone_omitted.contains(name) {
                clone_omitted.push(name.clone());
            }
        }
        for field in &schema.fields {
            let drop = hints_for(variant, &field.name, field).and_then(|h| h.clone) == Some(false);
            if drop && !clone_omitted.contains(&field.name) {
                clone_omitted.push(field.name.clone());
            }
        }

        EditorConfig {
            name: variant
                .name
                .clone()
                .unwrap_or_else(|| humanize(variant_name.unwrap_or(&schema.name))),
            collection: schema.name.clone(),
            service: schema.service_path().to_string(),
            root_path,
            icon: variant.icon.clone(),
            group: variant.group.clone(),
            order: variant.order,
            capabilities: variant.capabilities,
            id_field: options.id_field.clone(),
            name_fields: select_display_fields(variant, &schema.fields),
            headers,
            extra_headers,
            fields,
            search_fields,
            default_value,
            filter: variant.filter.clone(),
            default_sort: variant.default_sort.clone(),
            paginate: variant.paginate.unwrap_or(true),
            clone_omitted,
        }
    }

    fn headers(
        &self,
        compiler: &HeaderCompiler<'_, '_>,
        schema: &CollectionSchema,
        variant: &EditorVariant,
    ) -> Vec<DataTableHeader> {
        if let Some(paths) = &variant.headers {
            return paths
                .iter()
                .filter_map(|path| match resolve(&schema.fields, path, true) {
                    Ok(resolved) => {
                        let key = resolved.path.to_string();
                        let hints = variant
                            .field_hints
                            .get(path)
                            .or_else(|| variant.field_hints.get(&key))
                            .or(resolved.field.hints());
                        compiler.compile(&key, resolved.field, hints)
                    }
                    Err(err) => {
                        warn!(collection = %schema.name, path = %path, %err, "skipping header");
                        None
                    }
                })
                .collect();
        }

        let display = select_display_fields(variant, &schema.fields);
        schema
            .fields
            .iter()
            .filter(|f| !matches!(f.kind, FieldKind::Object { .. }))
            .filter(|f| {
                let flagged = hints_for(variant, &f.name, f).is_some_and(|h| h.header);
                display.contains(&f.name) || f.params.index || f.params.unique || flagged
            })
            .filter_map(|f| compiler.compile(&f.name, f, hints_for(variant, &f.name, f)))
            .collect()
    }

    /// Applies the variant's search list as a restriction and ordering.
    fn order_search(all: Vec<SearchField>, variant: &EditorVariant) -> Vec<SearchField> {
        let Some(order) = &variant.search else {
            return all;
        };
        order
            .iter()
            .filter_map(|path| {
                let found = all.iter().find(|s| s.path == *path).cloned();
                if found.is_none() {
                    debug!(path = %path, "search path has no searchable field");
                }
                found
            })
            .collect()
    }
}

impl SchemaCatalog {
    /// Compiles every editor variant of every collection, keyed by root path.
    ///
    /// When two variants claim the same root path the first one compiled wins.
    #[must_use]
    pub fn compile_all(&self) -> BTreeMap<String, EditorConfig> {
        let refs = self.references();
        let compiler = ConfigCompiler::new(&refs);
        let mut routes = BTreeMap::new();
        for schema in self.collections() {
            let variants = std::iter::once((None, &schema.editor))
                .chain(schema.variants.iter().map(|(name, v)| (Some(name.as_str()), v)));
            for (name, variant) in variants {
                let config = compiler.compile(schema, name, variant);
                if routes.contains_key(&config.root_path) {
                    warn!(root_path = %config.root_path, collection = %schema.name, "duplicate editor route ignored");
                    continue;
                }
                routes.insert(config.root_path.clone(), config);
            }
        }
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::header::HeaderKind;
    use crate::compile::search::SearchOperator;
    use crate::compile::WidgetKind;
    use crate::schema::FieldParams;
    use proptest::prelude::*;
    use serde_json::json;

    fn scenario_catalog() -> SchemaCatalog {
        SchemaCatalog::from_value(json!({
            "tags": {
                "fields": [ { "name": "name", "type": "string" } ]
            },
            "articles": {
                "fields": [
                    { "name": "name", "type": "string", "params": { "required": true } },
                    { "name": "tags", "type": "array", "items": { "type": "id", "params": { "ref": "tags" } } },
                    { "name": "views", "type": "number" }
                ]
            }
        }))
        .unwrap()
    }

    fn compile_primary(catalog: &SchemaCatalog, collection: &str) -> EditorConfig {
        let refs = catalog.references();
        let schema = catalog.get(collection).unwrap();
        ConfigCompiler::new(&refs).compile(schema, None, &schema.editor)
    }

    #[test]
    fn scenario_default_headers_extra_headers_and_search() {
        let catalog = scenario_catalog();
        let config = compile_primary(&catalog, "articles");

        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers[0].key, "name");
        assert!(config.headers[0].sortable);

        let tags = config.header("tags").unwrap();
        assert_eq!(tags.kind, HeaderKind::Reference);
        assert!(tags.multi);
        assert!(tags.multiple);
        assert_eq!(tags.source.as_deref(), Some("tags"));
        assert_eq!(tags.inner_headers[0].key, "name");

        let views = config.header("views").unwrap();
        assert_eq!(views.kind, HeaderKind::Number);
        assert!(views.sortable);
        let extra: Vec<&str> = config.extra_headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(extra, vec!["tags", "views"]);

        let ops = |path: &str| {
            config
                .search_fields
                .iter()
                .find(|s| s.path == path)
                .map(|s| s.operators.clone())
                .unwrap()
        };
        assert_eq!(
            ops("name"),
            vec![SearchOperator::Contains, SearchOperator::NotContains]
        );
        assert_eq!(ops("views")[0], SearchOperator::Less);
        assert_eq!(ops("views").len(), 7);
        assert_eq!(
            ops("tags"),
            vec![SearchOperator::InSet, SearchOperator::NotInSet]
        );
    }

    #[test]
    fn defaults_and_metadata() {
        let catalog = scenario_catalog();
        let config = compile_primary(&catalog, "articles");
        assert_eq!(config.root_path, "/articles");
        assert_eq!(config.service, "articles");
        assert_eq!(config.name, "Articles");
        assert!(config.paginate);
        assert_eq!(config.name_fields, vec!["name"]);
        assert_eq!(
            config.new_record(),
            json!({ "name": "", "tags": [], "views": 0 })
        );
        assert_eq!(config.field("tags").unwrap().widget, WidgetKind::ReferencePicker);
    }

    #[test]
    fn explicit_headers_resolve_and_skip_unknown_paths() {
        let mut catalog_doc = json!({
            "users": { "fields": [ { "name": "email", "type": "string" } ] },
            "posts": {
                "fields": [
                    { "name": "title", "type": "string" },
                    { "name": "comments", "type": "array", "items": {
                        "type": "object",
                        "fields": [ { "name": "author", "type": "id", "params": { "ref": "users" } } ]
                    } }
                ],
                "editor": { "headers": ["title", "nope", "comments.author"] }
            }
        });
        catalog_doc["posts"]["editor"]["fieldHints"] = json!({ "title": { "flex": 2 } });
        let catalog = SchemaCatalog::from_value(catalog_doc).unwrap();
        let config = compile_primary(&catalog, "posts");

        let keys: Vec<&str> = config.headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["title", "comments.*.author"]);
        assert_eq!(config.headers[0].flex, 2);
        assert_eq!(config.headers[1].kind, HeaderKind::Reference);
    }

    #[test]
    fn variant_hints_reach_nested_fields() {
        let catalog = SchemaCatalog::from_value(json!({
            "orders": {
                "fields": [
                    { "name": "address", "type": "object", "fields": [
                        { "name": "city", "type": "string" },
                        { "name": "zip", "type": "string" }
                    ] },
                    { "name": "lines", "type": "array", "items": { "type": "object", "fields": [
                        { "name": "sku", "type": "string" },
                        { "name": "qty", "type": "number" }
                    ] } }
                ],
                "editor": {
                    "fieldHints": {
                        "address.city": { "hidden": true, "searchable": false },
                        "lines.*.sku": { "text": "SKU", "readOnly": true }
                    }
                }
            }
        }))
        .unwrap();
        let config = compile_primary(&catalog, "orders");

        let address = config.fields.iter().find(|f| f.path == "address").unwrap();
        let paths: Vec<&str> = address.inner_fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["address.zip"]);
        assert!(config.search_fields.iter().all(|s| s.path != "address.city"));

        let lines = config.fields.iter().find(|f| f.path == "lines").unwrap();
        assert_eq!(lines.inner_fields[0].name, "SKU");
        assert!(lines.inner_fields[0].read_only);
        assert!(!lines.inner_fields[1].read_only);
    }

    #[test]
    fn search_list_restricts_and_orders() {
        let mut schema = scenario_catalog().get("articles").unwrap().clone();
        schema.editor.search = Some(vec!["views".into(), "name".into()]);
        let catalog = SchemaCatalog::new([schema]);
        let config = compile_primary(&catalog, "articles");
        let paths: Vec<&str> = config.search_fields.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["views", "name"]);
    }

    #[test]
    fn clone_seed_strips_id_and_audit_fields_per_hint() {
        let catalog = SchemaCatalog::from_value(json!({
            "notes": {
                "fields": [
                    { "name": "title", "type": "string" },
                    { "name": "secret", "type": "string", "params": { "editor": { "clone": false } } },
                    { "name": "createdAt", "type": "date", "params": { "editor": { "clone": true } } },
                    { "name": "updatedAt", "type": "date" }
                ]
            }
        }))
        .unwrap();
        let config = compile_primary(&catalog, "notes");
        let seed = config.clone_seed(&json!({
            "_id": "n1",
            "title": "hello",
            "secret": "s",
            "createdAt": "2024-01-01",
            "updatedAt": "2024-02-01"
        }));
        assert_eq!(seed, json!({ "title": "hello", "createdAt": "2024-01-01" }));
    }

    #[test]
    fn compile_all_registers_every_variant() {
        let catalog = SchemaCatalog::from_value(json!({
            "tags": { "fields": [ { "name": "name", "type": "string" } ] },
            "posts": {
                "fields": [ { "name": "title", "type": "string" }, { "name": "draft", "type": "boolean" } ],
                "variants": { "drafts": { "filter": { "draft": true }, "create": false } }
            }
        }))
        .unwrap();
        let routes = catalog.compile_all();
        let keys: Vec<&str> = routes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["/posts", "/posts/drafts", "/tags"]);
        let drafts = &routes["/posts/drafts"];
        assert_eq!(drafts.filter["draft"], json!(true));
        assert!(!drafts.capabilities.create);
        assert_eq!(drafts.collection, "posts");
    }

    #[test]
    fn broken_reference_does_not_abort_compile() {
        let catalog = SchemaCatalog::from_value(json!({
            "posts": {
                "fields": [
                    { "name": "title", "type": "string" },
                    { "name": "owner", "type": "id", "params": { "ref": "ghosts", "index": true } }
                ]
            }
        }))
        .unwrap();
        let config = compile_primary(&catalog, "posts");
        let owner = config.header("owner").unwrap();
        assert!(owner.name_field_paths.is_empty());
        assert_eq!(config.fields.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn named(fields: BTreeMap<String, FieldDescriptor>) -> Vec<FieldDescriptor> {
        fields
            .into_iter()
            .map(|(name, mut field)| {
                field.name = name;
                field
            })
            .collect()
    }

    fn reference_to(target: &str) -> FieldDescriptor {
        FieldDescriptor::new("", FieldKind::Id).with_params(FieldParams {
            reference: Some(target.to_string()),
            ..FieldParams::default()
        })
    }

    /// Scalars, references (to itself, to a collection pointing back, to an
    /// unknown collection), and nested objects and arrays of those.
    fn field_tree() -> impl Strategy<Value = FieldDescriptor> {
        let leaf = prop_oneof![
            Just(FieldDescriptor::new("", FieldKind::String)),
            Just(FieldDescriptor::new("", FieldKind::Number)),
            Just(FieldDescriptor::new("", FieldKind::Boolean)),
            Just(FieldDescriptor::new("", FieldKind::Date)),
            Just(FieldDescriptor::new("", FieldKind::Mixed)),
            Just(FieldDescriptor::new("", FieldKind::Buffer)),
            Just(reference_to("things")),
            Just(reference_to("nodes")),
            Just(reference_to("missing")),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 1..4).prop_map(|fields| {
                    FieldDescriptor::new(
                        "",
                        FieldKind::Object {
                            fields: named(fields),
                        },
                    )
                }),
                inner.prop_map(|item| FieldDescriptor::new(
                    "",
                    FieldKind::Array {
                        items: Box::new(item)
                    }
                )),
            ]
        })
    }

    fn schema_strategy() -> impl Strategy<Value = (CollectionSchema, bool)> {
        (
            prop::collection::btree_map("[a-z]{1,6}", field_tree(), 1..6),
            any::<bool>(),
        )
            .prop_map(|(fields, explicit)| {
                let mut schema = CollectionSchema::new("things", named(fields));
                for field in &mut schema.fields {
                    field.params.index = true;
                }
                let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
                schema.editor.reference_headers = Some(names.clone());
                if explicit {
                    schema.editor.headers = Some(names);
                }
                (schema, explicit)
            })
    }

    /// `things` plus `nodes`, whose `owner` points back at `things`.
    fn property_catalog(things: CollectionSchema) -> SchemaCatalog {
        let mut nodes = CollectionSchema::new(
            "nodes",
            vec![FieldDescriptor::new("label", FieldKind::String), {
                let mut owner = reference_to("things");
                owner.name = "owner".to_string();
                owner
            }],
        );
        nodes.editor.reference_headers = Some(vec!["label".into(), "owner".into()]);
        SchemaCatalog::new([things, nodes])
    }

    proptest! {
        #[test]
        fn compilation_is_idempotent((schema, _explicit) in schema_strategy()) {
            let catalog = property_catalog(schema);
            let first = catalog.compile_all();
            let second = catalog.compile_all();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn header_keys_resolve_to_accepted_types((schema, _explicit) in schema_strategy()) {
            let catalog = property_catalog(schema);
            let config = compile_primary(&catalog, "things");
            let schema = catalog.get("things").unwrap();
            for header in config.headers.iter().chain(&config.extra_headers) {
                let resolved = resolve(&schema.fields, &header.key, true);
                prop_assert!(resolved.is_ok(), "unresolvable key {}", header.key);
                let field_type = resolved.unwrap().field.leaf().field_type();
                prop_assert!(
                    header.kind.accepts(field_type),
                    "{:?} column for {:?} field at {}", header.kind, field_type, header.key
                );
            }
        }
    }
}
