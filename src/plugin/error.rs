//! Plugin Error Types
//!
//! Error handling for discovery, registration, boot and lifecycle operations.

use thiserror::Error;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Error types for plugin operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// Plugin boot hook failed
    #[error("Plugin boot failed: {message}")]
    BootFailed { message: String },

    /// Install, uninstall or upgrade hook failed
    #[error("Plugin lifecycle hook failed: {message}")]
    LifecycleFailed { message: String },

    /// Plugin not found in the registry
    #[error("Plugin not found: {plugin_id}")]
    PluginNotFound { plugin_id: String },

    /// Metadata declaration is malformed
    #[error("Invalid plugin metadata: {message}")]
    InvalidMetadata { message: String },

    /// Plugin dependency error
    #[error("Plugin dependency error: {message}")]
    DependencyError { message: String },

    /// Configuration error
    #[error("Plugin configuration error: {message}")]
    ConfigurationError { message: String },

    /// Class map could not be produced
    #[error("Plugin discovery error: {message}")]
    DiscoveryFailed { message: String },

    /// Manifest or class map parsing error
    #[error("Descriptor parse error: {message}")]
    DescriptorParseError { message: String },

    /// Plugin factory failed to build an instance
    #[error("Plugin loading error: {message}")]
    LoadingFailed { message: String },

    /// Generic plugin error
    #[error("Plugin error: {message}")]
    Generic { message: String },
}

impl PluginError {
    /// Create a boot failure error
    pub fn boot_failed<S: Into<String>>(message: S) -> Self {
        Self::BootFailed { message: message.into() }
    }

    /// Create a lifecycle hook error
    pub fn lifecycle_failed<S: Into<String>>(message: S) -> Self {
        Self::LifecycleFailed { message: message.into() }
    }

    /// Create a plugin not found error
    pub fn plugin_not_found<S: Into<String>>(plugin_id: S) -> Self {
        Self::PluginNotFound { plugin_id: plugin_id.into() }
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata<S: Into<String>>(message: S) -> Self {
        Self::InvalidMetadata { message: message.into() }
    }

    /// Create a dependency error
    pub fn dependency_error<S: Into<String>>(message: S) -> Self {
        Self::DependencyError { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Create a discovery failed error
    pub fn discovery_failed<S: Into<String>>(message: S) -> Self {
        Self::DiscoveryFailed { message: message.into() }
    }

    /// Create a descriptor parse error
    pub fn descriptor_parse_error<S: Into<String>>(message: S) -> Self {
        Self::DescriptorParseError { message: message.into() }
    }

    /// Create a loading failed error
    pub fn loading_failed<S: Into<String>>(message: S) -> Self {
        Self::LoadingFailed { message: message.into() }
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic { message: message.into() }
    }

    /// Errors a plugin author can fix in their declaration
    pub fn is_declaration_error(&self) -> bool {
        matches!(self,
            PluginError::InvalidMetadata { .. } |
            PluginError::DescriptorParseError { .. } |
            PluginError::DependencyError { .. }
        )
    }

    /// Errors raised by plugin code while running a hook
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self,
            PluginError::BootFailed { .. } |
            PluginError::LifecycleFailed { .. } |
            PluginError::LoadingFailed { .. }
        )
    }
}

impl From<std::io::Error> for PluginError {
    fn from(err: std::io::Error) -> Self {
        PluginError::generic(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::descriptor_parse_error(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for PluginError {
    fn from(err: serde_yaml::Error) -> Self {
        PluginError::descriptor_parse_error(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for PluginError {
    fn from(err: toml::de::Error) -> Self {
        PluginError::descriptor_parse_error(format!("TOML error: {}", err))
    }
}
