//! Runtime configuration types.

use std::time::Duration;

use panelgen_core::EditorConfig;

/// Paging behavior of an incremental loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Records requested per `find` call.
    pub page_size: u64,
    /// When false, one unbounded `find` loads everything and the loader is
    /// exhausted afterwards.
    pub paginate: bool,
    /// Dotted path of the record id used to match optimistic updates.
    pub id_path: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            paginate: true,
            id_path: "_id".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Default paging with the editor's id field and pagination flag.
    #[must_use]
    pub fn for_editor(editor: &EditorConfig) -> Self {
        Self {
            paginate: editor.paginate,
            id_path: editor.id_field.clone(),
            ..Self::default()
        }
    }
}

/// HTTP listener settings for the editor configuration endpoint.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any.
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_config_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.page_size, 50);
        assert!(config.paginate);
        assert_eq!(config.id_path, "_id");
    }

    #[test]
    fn http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
