//! Configuration surface for the streaming parser.

/// Configuration options for [`crate::Parser`].
///
/// # Examples
///
/// ```rust
/// use protojson_stream::ParserOptions;
///
/// let options = ParserOptions {
///     ignore_unknown_fields: true,
///     ..Default::default()
/// };
/// assert_eq!(options.max_depth, 64);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Maximum nesting depth of open JSON objects/arrays/string-value
    /// subframes. The spec fixes this at 64; it is exposed here so callers
    /// embedding the parser in a constrained environment can lower it, but
    /// raising it changes the stack-overflow/memory tradeoff the design
    /// assumed, so do so deliberately.
    ///
    /// # Default
    ///
    /// `64`
    pub max_depth: usize,

    /// Whether an unrecognized JSON member name is silently skipped instead
    /// of being a fatal error.
    ///
    /// The core spec hardcodes unknown fields as fatal; this flag is the
    /// "ignore unknown" mode the design anticipates but does not specify
    /// (see Design Notes). When enabled, the *value* of an unknown member is
    /// still fully scanned (so the lexer stays in sync) but produces no sink
    /// calls.
    ///
    /// # Default
    ///
    /// `false`
    pub ignore_unknown_fields: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            ignore_unknown_fields: false,
        }
    }
}
