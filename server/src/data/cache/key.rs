//! Cache key composition
//!
//! Keys join parts with `:`. A resource-type tag renders as its name, an
//! identifier as its value, scalars as their text. A key ending in `*` is a
//! pattern that matches every key sharing its concrete prefix plus at least
//! one more part.

use std::fmt;

use crate::data::types::{ID_SEPARATOR, Id, ResourceType};

pub const KEY_SEPARATOR: char = ID_SEPARATOR;
pub const WILDCARD: &str = "*";

/// Anything that can be rendered as one segment of a cache key
///
/// `Sync` so a key composed in place can be held across an `.await` in a
/// `Send` future.
pub trait KeyPart: Sync {
    fn to_key_part(&self) -> String;
}

/// Trailing wildcard segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wildcard;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '*' => out.push_str("%2A"),
            _ => out.push(c),
        }
    }
    out
}

impl KeyPart for ResourceType {
    fn to_key_part(&self) -> String {
        self.as_str().to_string()
    }
}

impl KeyPart for Id {
    fn to_key_part(&self) -> String {
        escape(self.value())
    }
}

impl KeyPart for str {
    fn to_key_part(&self) -> String {
        escape(self)
    }
}

impl KeyPart for String {
    fn to_key_part(&self) -> String {
        escape(self)
    }
}

impl KeyPart for Wildcard {
    fn to_key_part(&self) -> String {
        WILDCARD.to_string()
    }
}

macro_rules! integer_key_part {
    ($($t:ty),+) => {
        $(
            impl KeyPart for $t {
                fn to_key_part(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

integer_key_part!(i32, i64, u32, u64, usize);

impl<T: KeyPart + ?Sized> KeyPart for &T {
    fn to_key_part(&self) -> String {
        (**self).to_key_part()
    }
}

/// Composed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compose(parts: &[&dyn KeyPart]) -> Self {
        let joined = parts
            .iter()
            .map(|p| p.to_key_part())
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string());
        Self(joined)
    }

    /// Wrap an already composed key, e.g. one returned by a backend scan
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_pattern(&self) -> bool {
        self.0 == WILDCARD || self.0.ends_with(&format!("{}{}", KEY_SEPARATOR, WILDCARD))
    }

    /// Whether `key` is covered by this pattern
    ///
    /// A trailing `*` stands for one or more parts, any other `*` segment for
    /// exactly one. An exact key only matches itself.
    pub fn matches(&self, key: &str) -> bool {
        let pattern: Vec<&str> = self.0.split(KEY_SEPARATOR).collect();
        let candidate: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let last = pattern.len() - 1;

        for (i, segment) in pattern.iter().enumerate() {
            if i == last && *segment == WILDCARD {
                return candidate.len() > i;
            }
            match candidate.get(i) {
                Some(part) if *segment == WILDCARD || part == segment => {}
                _ => return false,
            }
        }
        candidate.len() == pattern.len()
    }

    /// Redis `SCAN MATCH` form of this key
    ///
    /// Wildcard segments stay `*`; glob metacharacters in concrete segments
    /// are escaped.
    pub fn to_glob(&self) -> String {
        self.0
            .split(KEY_SEPARATOR)
            .map(|segment| {
                if segment == WILDCARD {
                    return segment.to_string();
                }
                let mut out = String::with_capacity(segment.len());
                for c in segment.chars() {
                    if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out
            })
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compose a [`CacheKey`] from heterogeneous parts
///
/// ```ignore
/// let key = cache_key!(ResourceType::Assignment, "GetByUser", &user, offset, limit);
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),+ $(,)?) => {
        $crate::data::cache::CacheKey::compose(&[
            $(&$part as &dyn $crate::data::cache::KeyPart),+
        ])
    };
}
