//! Engine binary resolution.
//!
//! The binary is resolved through a short fallback chain:
//!
//! 1. Configured path (CLI `--binary`, config file, or `TFHARNESS_BINARY_PATH`)
//! 2. `TF_BINARY` environment variable
//! 3. `terraform`, looked up on `PATH`

/// Environment variable that overrides the engine binary.
pub const BINARY_ENV_VAR: &str = "TF_BINARY";

/// Binary used when nothing else is configured.
const DEFAULT_BINARY: &str = "terraform";

/// Resolves the engine binary from configuration and the environment.
///
/// # Example
///
/// ```
/// use mockable::DefaultEnv;
/// use tfharness::engine::BinaryResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = BinaryResolver::new(&env);
/// let binary = resolver.resolve(Some("/opt/engine/bin/terraform"));
/// assert_eq!(binary, "/opt/engine/bin/terraform");
/// ```
pub struct BinaryResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> BinaryResolver<'a, E> {
    /// Creates a resolver reading from the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Reads `TF_BINARY`, ignoring an empty value.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        self.env
            .string(BINARY_ENV_VAR)
            .filter(|value| !value.is_empty())
    }

    /// The binary used when neither configuration nor environment names one.
    #[must_use]
    pub const fn default_binary() -> &'static str {
        DEFAULT_BINARY
    }

    /// Resolve the binary, preferring a non-empty configured value.
    #[must_use]
    pub fn resolve(&self, configured: Option<&str>) -> String {
        configured
            .filter(|value| !value.is_empty())
            .map(String::from)
            .or_else(|| self.resolve_from_env())
            .unwrap_or_else(|| Self::default_binary().to_owned())
    }
}
