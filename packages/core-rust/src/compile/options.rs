/// Knobs shared by all configuration compilers.
///
/// Controls attachment detection, widget thresholds, and the read-only and
/// clone policies applied regardless of per-field hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Collection holding uploaded files. References into it become file or
    /// image pickers and thumbnail columns.
    pub attachment_collection: String,
    /// Field carrying a record's identity.
    pub id_field: String,
    /// String fields whose `maxLength` exceeds this are edited as multiline text.
    pub multiline_threshold: u64,
    /// Enumerations with more options than this use the list picker.
    pub enum_list_threshold: usize,
    /// Field names forced read-only (identity, audit timestamps, audit actors).
    pub read_only_fields: Vec<String>,
    /// Field names dropped from a cloned record unless a field's `clone` hint
    /// says otherwise. The id field is always dropped.
    pub clone_omitted_fields: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        let audit: Vec<String> = ["_id", "id", "createdAt", "updatedAt", "createdBy", "updatedBy"]
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            attachment_collection: "attachments".to_string(),
            id_field: "_id".to_string(),
            multiline_threshold: 200,
            enum_list_threshold: 6,
            clone_omitted_fields: audit.clone(),
            read_only_fields: audit,
        }
    }
}

impl CompilerOptions {
    #[must_use]
    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only_fields.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn is_attachment(&self, collection: &str) -> bool {
        self.attachment_collection == collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_options_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.attachment_collection, "attachments");
        assert_eq!(options.id_field, "_id");
        assert_eq!(options.multiline_threshold, 200);
        assert_eq!(options.enum_list_threshold, 6);
        assert!(options.is_read_only("updatedAt"));
        assert!(!options.is_read_only("title"));
        assert_eq!(options.read_only_fields, options.clone_omitted_fields);
    }
}
