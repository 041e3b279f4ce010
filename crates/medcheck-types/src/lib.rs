//! Validated text types shared across the MedCheck crates.
//!
//! Each type normalises its input once at construction so comparisons elsewhere can be plain
//! string equality.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input contained a line break
    #[error("Text cannot contain line breaks")]
    LineBreak,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A procedure billing code (CBHPM/TUSS), trimmed.
///
/// Codes are compared exactly after trimming; no case folding is applied because the reference
/// table is matched on the literal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcedureCode(NonEmptyText);

impl ProcedureCode {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = NonEmptyText::new(input)?;
        if text.as_str().contains(['\n', '\r']) {
            return Err(TextError::LineBreak);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A billing guide number, normalised for deduplication.
///
/// Guide numbers are trimmed and upper-cased so `" g123 "` and `"G123"` identify the same guide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuideNumber(String);

impl GuideNumber {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = NonEmptyText::new(input)?;
        Ok(Self(text.as_str().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A physician registration (CRM) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crm(NonEmptyText);

impl Crm {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        Ok(Self(NonEmptyText::new(input)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether a raw CRM string taken from a document refers to this physician.
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim() == self.as_str()
    }
}

macro_rules! text_impls {
    ($($ty:ident),+) => {$(
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    )+};
}

text_impls!(NonEmptyText, ProcedureCode, GuideNumber, Crm);
