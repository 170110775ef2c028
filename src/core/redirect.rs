//! Redirect resolution for streamget

use std::fmt;

use crate::core::options::Scheme;

/// Authority of the exchange that produced a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

/// Resolve a `Location` header against the exchange that returned it
///
/// A path-absolute location (`/file`) is joined to the original scheme, host
/// and port. Anything else is returned unchanged and validated when the next
/// hop is prepared.
pub fn resolve_location(original: &Origin, location: &str) -> String {
    if location.starts_with('/') {
        format!("{original}{location}")
    } else {
        location.to_string()
    }
}
