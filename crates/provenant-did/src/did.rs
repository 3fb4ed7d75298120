//! DID syntax parsing.
//!
//! `did:<method>:<method-specific-id>`, where the method-specific id may
//! contain `:`-separated path segments (used by `did:web`) and an optional
//! `#fragment` selecting a verification key.

use crate::error::ResolveError;

/// A parsed DID with its optional key fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Did {
    /// Method name, e.g. `key` or `web`.
    pub method: String,

    /// Method-specific id with the fragment stripped.
    pub id: String,

    /// Fragment after `#`, if any.
    pub fragment: Option<String>,
}

impl Did {
    /// Parses DID text.
    ///
    /// # Example
    ///
    /// ```rust
    /// use provenant_did::Did;
    ///
    /// let did = Did::parse("did:web:example.com:user:alice#key-1").unwrap();
    /// assert_eq!(did.method, "web");
    /// assert_eq!(did.id, "example.com:user:alice");
    /// assert_eq!(did.fragment.as_deref(), Some("key-1"));
    /// ```
    ///
    /// # Errors
    ///
    /// [`ResolveError::Malformed`] when the scheme is not `did`, the method
    /// is empty or not lowercase alphanumeric, or the id is empty.
    pub fn parse(text: &str) -> Result<Did, ResolveError> {
        let rest = text
            .strip_prefix("did:")
            .ok_or_else(|| ResolveError::Malformed(text.to_string()))?;

        let (method, id) = rest
            .split_once(':')
            .ok_or_else(|| ResolveError::Malformed(text.to_string()))?;

        if method.is_empty()
            || !method.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(ResolveError::Malformed(text.to_string()));
        }

        let (id, fragment) = match id.split_once('#') {
            Some((id, fragment)) => (id, Some(fragment.to_string())),
            None => (id, None),
        };

        if id.is_empty() {
            return Err(ResolveError::Malformed(text.to_string()));
        }

        Ok(Did {
            method: method.to_string(),
            id: id.to_string(),
            fragment,
        })
    }

    /// `:`-separated segments of the method-specific id.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.id.split(':')
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}
