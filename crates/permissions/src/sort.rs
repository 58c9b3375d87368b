//! Sort keys and sort spec validation.
//!
//! Permission results can only be ordered by a closed set of attributes.
//! Requests are validated here, before anything reaches the engine.

use crate::error::{Error, Result};
use core::fmt;
use grantview_engine::SortColumn;

/// Sort by the server path of the realm the permission applies to.
pub const SORT_PATH: &str = "path";
/// Sort by the identity of the user the permission applies to.
pub const SORT_USER_ID: &str = "userId";
/// Sort by the date the permission was last updated.
pub const SORT_UPDATED_AT: &str = "updatedAt";

/// An attribute permission results may be sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortKey {
    Path,
    UserId,
    UpdatedAt,
}

impl SortKey {
    /// The allow-list.
    pub const ALL: [SortKey; 3] = [SortKey::Path, SortKey::UserId, SortKey::UpdatedAt];

    /// Key path of the attribute; also its column name.
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Path => SORT_PATH,
            SortKey::UserId => SORT_USER_ID,
            SortKey::UpdatedAt => SORT_UPDATED_AT,
        }
    }

    /// Looks up a key path in [`SortKey::ALL`].
    pub fn parse(key_path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == key_path)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's request to order by one key path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortDescriptor {
    pub key_path: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn new(key_path: impl Into<String>, ascending: bool) -> Self {
        Self {
            key_path: key_path.into(),
            ascending,
        }
    }

    pub fn by(key: SortKey, ascending: bool) -> Self {
        Self::new(key.as_str(), ascending)
    }
}

/// Validates every key path against `allow_list`, in order.
///
/// Fails on the first key that is not allowed.
pub fn validate<'a, I>(key_paths: I, allow_list: &[SortKey]) -> Result<Vec<SortKey>>
where
    I: IntoIterator<Item = &'a str>,
{
    key_paths
        .into_iter()
        .map(|key_path| {
            SortKey::parse(key_path)
                .filter(|key| allow_list.contains(key))
                .ok_or_else(|| Error::invalid_sort_key(key_path))
        })
        .collect()
}

/// A validated, ordered sequence of sort keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(SortKey, bool)>,
}

impl SortSpec {
    /// Validates `descriptors` against [`SortKey::ALL`].
    pub fn from_descriptors(descriptors: &[SortDescriptor]) -> Result<Self> {
        let keys = validate(
            descriptors.iter().map(|d| d.key_path.as_str()),
            &SortKey::ALL,
        )?;
        Ok(Self {
            keys: keys
                .into_iter()
                .zip(descriptors.iter().map(|d| d.ascending))
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(SortKey, bool)] {
        &self.keys
    }

    /// Engine sort columns for these keys.
    pub fn to_columns(&self) -> Vec<SortColumn> {
        self.keys
            .iter()
            .map(|(key, ascending)| SortColumn::new(key.as_str(), *ascending))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allow_list() {
        assert_eq!(SortKey::parse("path"), Some(SortKey::Path));
        assert_eq!(SortKey::parse("userId"), Some(SortKey::UserId));
        assert_eq!(SortKey::parse("updatedAt"), Some(SortKey::UpdatedAt));
        assert_eq!(SortKey::parse("accessLevel"), None);
        assert_eq!(SortKey::parse("Path"), None);
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            validate(["updatedAt", "path"], &SortKey::ALL).unwrap(),
            vec![SortKey::UpdatedAt, SortKey::Path]
        );
        assert_eq!(
            validate(["path", "bogus", "other"], &SortKey::ALL).unwrap_err(),
            Error::invalid_sort_key("bogus")
        );
        assert_eq!(
            validate(["userId"], &[SortKey::Path]).unwrap_err(),
            Error::invalid_sort_key("userId")
        );
        assert!(validate(Vec::<&str>::new(), &SortKey::ALL).unwrap().is_empty());
    }

    #[test]
    fn test_spec_from_descriptors() {
        let spec = SortSpec::from_descriptors(&[
            SortDescriptor::by(SortKey::UserId, true),
            SortDescriptor::new("updatedAt", false),
        ])
        .unwrap();
        assert_eq!(
            spec.keys(),
            &[(SortKey::UserId, true), (SortKey::UpdatedAt, false)]
        );
        assert_eq!(
            spec.to_columns(),
            vec![
                SortColumn::new("userId", true),
                SortColumn::new("updatedAt", false)
            ]
        );
    }

    #[test]
    fn test_spec_rejects_unknown_key() {
        let err = SortSpec::from_descriptors(&[SortDescriptor::new("realm", true)]).unwrap_err();
        assert_eq!(err, Error::invalid_sort_key("realm"));
    }
}
