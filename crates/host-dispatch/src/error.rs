use host_registry::HookError;

/// Errors that can occur during hook discovery and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry-level failure (unknown extension, load failure, ...).
    #[error(transparent)]
    Registry(#[from] host_registry::Error),

    /// An alter pass promoted an extension into a hook's implementation
    /// record, but the extension registers no matching handler. This means a
    /// broken extension rather than cache drift, so it is fatal.
    #[error("invalid implementation of hook '{hook}' added for extension '{extension}'")]
    FabricatedImplementation { extension: String, hook: String },

    /// An alter pass left a hook's implementation record in a shape that
    /// cannot be read back.
    #[error("implementation record for hook '{hook}' was altered into an invalid shape: {reason}")]
    InvalidAlteredRecord { hook: String, reason: String },

    /// The persisted or freshly built hook metadata blob does not parse.
    #[error("invalid hook metadata: {reason}")]
    InvalidHookInfo { reason: String },

    /// A hook implementation failed; carried through unchanged.
    #[error("hook '{hook}' implementation in extension '{extension}' failed")]
    Callee {
        extension: String,
        hook: String,
        #[source]
        source: HookError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
