//! Identity resolution for requested ids
//!
//! A requested id may carry a group after the group separator
//! (`"post_3#fence"` is instance `post_3` in group `fence`). Names that are
//! already taken get a suffix, once. Suffixes count up per resolver, so each
//! stage numbers its own collisions starting at 1.

use std::cell::Cell;

use crate::error::RequestError;

/// A requested id after splitting and collision checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Unique name the instance will be registered under
    pub display_name: String,
    /// Group tag; the display name unless one was given explicitly
    pub group: String,
    /// True if the requested name was taken and a suffix was appended
    pub renamed: bool,
}

/// Splits requested ids and keeps display names unique
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    group_separator: char,
    suffix_separator: char,
    /// Next collision suffix
    next_suffix: Cell<u64>,
}

impl IdentityResolver {
    /// Create a resolver with the given separators
    #[must_use]
    pub const fn new(group_separator: char, suffix_separator: char) -> Self {
        Self {
            group_separator,
            suffix_separator,
            next_suffix: Cell::new(1),
        }
    }

    fn next_suffix(&self) -> u64 {
        let suffix = self.next_suffix.get();
        self.next_suffix.set(suffix + 1);
        suffix
    }

    /// Split a requested id into display name and explicit group, if any.
    #[must_use]
    pub fn split<'a>(&self, requested: &'a str) -> (&'a str, Option<&'a str>) {
        match requested.split_once(self.group_separator) {
            Some((name, group)) if !group.is_empty() => (name, Some(group)),
            Some((name, _)) => (name, None),
            None => (requested, None),
        }
    }

    /// Resolve a requested id against the names `is_taken` reports as used.
    ///
    /// Nothing is reserved here; the caller must insert the name before it
    /// yields to anything else.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Naming` if the suffixed name is taken as well.
    pub fn resolve(
        &self,
        requested: &str,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<ResolvedId, RequestError> {
        let (name, explicit_group) = self.split(requested);

        let (display_name, renamed) = if is_taken(name) {
            let candidate = format!("{name}{}{}", self.suffix_separator, self.next_suffix());
            if is_taken(&candidate) {
                return Err(RequestError::Naming {
                    requested: name.to_string(),
                    candidate,
                });
            }
            log::debug!("`{name}` is taken, using `{candidate}`");
            (candidate, true)
        } else {
            (name.to_string(), false)
        };

        let group = explicit_group.map_or_else(|| display_name.clone(), str::to_string);
        Ok(ResolvedId {
            display_name,
            group,
            renamed,
        })
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new('#', '_')
    }
}
