use std::borrow::Cow;

/// Why a measurement failed.
///
/// A failed measurement never yields a partial sum.
#[derive(thiserror::Error, Debug)]
pub enum MeasureError {
    #[error("no size oracle installed; call `re_memory_meter::install_oracle` at startup")]
    UninitializedOracle,

    #[error("cannot measure a null root")]
    NullRoot,

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

/// A [`crate::Measurable`] implementation could not read one of its references.
///
/// This is an internal error of that implementation, not an expected outcome:
/// skipping the reference would silently undercount.
#[derive(thiserror::Error, Debug)]
#[error("failed to read field `{field}` of `{type_name}`")]
pub struct IntrospectionError {
    type_name: &'static str,
    field: Cow<'static, str>,

    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl IntrospectionError {
    pub fn new(
        type_name: &'static str,
        field: impl Into<Cow<'static, str>>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            type_name,
            field: field.into(),
            source: source.into(),
        }
    }

    /// Name of the type whose field could not be read.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Name of the field that could not be read.
    pub fn field(&self) -> &str {
        &self.field
    }
}

/// The process-wide size oracle can only be installed once.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    #[error("a size oracle is already installed")]
    AlreadyInstalled,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown buffer policy {0:?} (expected `ignore`, `ignore_overhead` or `include`)")]
pub struct BufferPolicyParseError(pub String);

#[test]
fn test_introspection_error_chain() {
    let err = MeasureError::from(IntrospectionError::new(
        "my_crate::Node",
        "children",
        "lock poisoned",
    ));

    assert_eq!(err.to_string(), "failed to read field `children` of `my_crate::Node`");

    // `transparent` forwards straight to the underlying cause:
    let source = std::error::Error::source(&err);
    assert_eq!(source.map(ToString::to_string).as_deref(), Some("lock poisoned"));
}
