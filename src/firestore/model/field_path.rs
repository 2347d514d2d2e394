use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::firestore::constants::DOCUMENT_KEY_NAME;
use crate::firestore::error::{invalid_argument, FirestoreResult};

const RESERVED_CHARACTERS: [char; 5] = ['~', '*', '/', '[', ']'];

/// A path to a field inside a document, e.g. `address.city`.
///
/// Field paths are never empty and never contain an empty segment. The reserved
/// path returned by [`FieldPath::document_id`] addresses the document's own key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<S, I>(segments: I) -> FirestoreResult<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(invalid_argument(
                "FieldPath must contain at least one segment",
            ));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid_argument(
                "Invalid field name. Field names must not be empty",
            ));
        }
        Ok(Self { segments })
    }

    /// Parses a user supplied dotted path such as `"a.b.c"`.
    pub fn from_dot_separated(path: &str) -> FirestoreResult<Self> {
        if path.trim().is_empty() {
            return Err(invalid_argument("FieldPath string cannot be empty"));
        }
        if path.contains(RESERVED_CHARACTERS) {
            return Err(invalid_argument(format!(
                "Invalid field path ({path}). Paths must not contain '~', '*', '/', '[', or ']'"
            )));
        }
        FieldPath::new(path.split('.')).map_err(|_| {
            invalid_argument(format!(
                "Invalid field path ({path}). Paths must not be empty, begin with '.', end with '.', or contain '..'"
            ))
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Dotted form used on the wire. Segments that are not plain identifiers are
    /// wrapped in backticks, with `\` and `` ` `` escaped.
    pub fn canonical_string(&self) -> String {
        self.segments
            .iter()
            .map(|segment| escape_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// The reserved path that sorts and filters on the document key.
    pub fn document_id() -> Self {
        Self {
            segments: vec![DOCUMENT_KEY_NAME.to_string()],
        }
    }

    pub fn is_document_id(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == DOCUMENT_KEY_NAME
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_segment(segment: &str) -> String {
    if is_identifier(segment) {
        return segment.to_string();
    }
    let mut escaped = String::with_capacity(segment.len() + 2);
    escaped.push('`');
    for c in segment.chars() {
        if c == '\\' || c == '`' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('`');
    escaped
}

impl PartialOrd for FieldPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldPath {
    fn cmp(&self, other: &Self) -> Ordering {
        for (left, right) in self.segments.iter().zip(other.segments.iter()) {
            match left.cmp(right) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

/// Trait that converts common user inputs into a validated [`FieldPath`].
pub trait IntoFieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        Ok(self)
    }
}

impl<'a> IntoFieldPath for &'a FieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for String {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        FieldPath::from_dot_separated(&self)
    }
}

impl<'a> IntoFieldPath for &'a str {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        FieldPath::from_dot_separated(self)
    }
}
