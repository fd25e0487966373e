//! Namespaced cache keys.
//!
//! Every key written by the scaling cache starts with its namespace, so the
//! whole cache can be dropped with one prefix delete. Keys can only be built
//! through the constructors below.

use std::fmt;
use wodsmith_core::GroupId;

/// Separator between key segments.
const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyKind {
    Group(GroupId),
    GlobalDefault,
}

/// A cache key inside a namespace.
///
/// Encodes as `{namespace}:group:{uuid}` or `{namespace}:global_default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKeyInner {
    namespace: String,
    kind: KeyKind,
}

impl CacheKey {
    /// Key of one scaling group and its levels.
    pub fn group(namespace: &str, group_id: GroupId) -> Self {
        Self {
            inner: CacheKeyInner {
                namespace: namespace.to_string(),
                kind: KeyKind::Group(group_id),
            },
        }
    }

    /// Key of the system-wide default group.
    pub fn global_default(namespace: &str) -> Self {
        Self {
            inner: CacheKeyInner {
                namespace: namespace.to_string(),
                kind: KeyKind::GlobalDefault,
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// The group this key refers to, if any.
    pub fn group_id(&self) -> Option<GroupId> {
        match self.inner.kind {
            KeyKind::Group(id) => Some(id),
            KeyKind::GlobalDefault => None,
        }
    }

    /// Encode to the string stored in the edge tier.
    pub fn encode(&self) -> String {
        match &self.inner.kind {
            KeyKind::Group(id) => format!(
                "{}{sep}group{sep}{}",
                self.inner.namespace,
                id,
                sep = SEPARATOR
            ),
            KeyKind::GlobalDefault => {
                format!("{}{}global_default", self.inner.namespace, SEPARATOR)
            }
        }
    }

    /// Prefix shared by every key in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}{}", namespace, SEPARATOR)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wodsmith_core::EntityIdType;

    #[test]
    fn test_group_key_format() {
        let id = GroupId::now_v7();
        let key = CacheKey::group("scaling", id);
        assert_eq!(key.encode(), format!("scaling:group:{}", id));
        assert_eq!(key.group_id(), Some(id));
    }

    #[test]
    fn test_keys_share_namespace_prefix() {
        let prefix = CacheKey::namespace_prefix("scaling");
        assert!(CacheKey::group("scaling", GroupId::now_v7())
            .encode()
            .starts_with(&prefix));
        assert!(CacheKey::global_default("scaling")
            .encode()
            .starts_with(&prefix));
        assert!(!CacheKey::group("scaling2", GroupId::now_v7())
            .encode()
            .starts_with(&prefix));
    }
}
