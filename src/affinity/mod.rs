//! Affinity token extraction.
//!
//! A request carries its session identity either in a cookie or, for
//! cookieless clients, embedded in the request line (servlet style
//! `;jsessionid=...`). The resolver pulls that token out of the raw
//! header and URI text; matching the token against peer routes is
//! [`route_matches`].

use crate::config::{AffinityConfig, MatchMode};
use thiserror::Error;

/// The affinity-relevant slice of an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct SessionRequest<'a> {
    /// Raw `Cookie:` header value, if the request carried one.
    pub cookie_header: Option<&'a str>,
    /// Request line URI, unparsed.
    pub uri: &'a str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The parameter name was found in the URI but the URI ended before
    /// any `=` introduced a value.
    #[error("affinity parameter {param:?} in the request URI has no value")]
    UnterminatedField { param: String },
}

/// Extract the affinity token from a request.
///
/// The cookie field is consulted first; a missing or empty cookie value
/// falls through to a case-insensitive scan of the URI for the
/// parameter name (`url_param`, defaulting to the cookie name).
/// `Ok(None)` means the request has no token and the caller should
/// select by weight alone.
pub fn resolve_token<'a>(
    request: &SessionRequest<'a>,
    affinity: &AffinityConfig,
) -> Result<Option<&'a str>, ResolveError> {
    if let Some(header) = request.cookie_header {
        if let Some(value) = cookie_value(header, &affinity.cookie) {
            if !value.is_empty() {
                return Ok(Some(value));
            }
        }
    }

    let param = affinity.url_param.as_deref().unwrap_or(&affinity.cookie);
    uri_token(request.uri, param)
}

/// Find `name` in a `Cookie:` header value.
///
/// Fields are `;`-separated `name=value` pairs with optional whitespace.
/// Cookie names compare exactly.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|field| {
        let (k, v) = field.split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}

/// Scan `uri` for `param` and return the value that follows its `=`.
///
/// The name search is ASCII case-insensitive. From the end of the name,
/// the scan skips forward to the first `=`; running out of URI before
/// one appears is an [`ResolveError::UnterminatedField`]. The value
/// ends at the first `?`, `&`, `;` or the end of the URI.
fn uri_token<'a>(uri: &'a str, param: &str) -> Result<Option<&'a str>, ResolveError> {
    if param.is_empty() {
        return Ok(None);
    }

    let haystack = uri.as_bytes();
    let needle = param.as_bytes();

    let Some(at) = haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
    else {
        return Ok(None);
    };

    let after_name = at + needle.len();
    let Some(eq_offset) = haystack[after_name..].iter().position(|&b| b == b'=') else {
        return Err(ResolveError::UnterminatedField {
            param: param.to_string(),
        });
    };

    let value_start = after_name + eq_offset + 1;
    let rest = &uri[value_start..];
    let value_end = rest.find(['?', '&', ';']).unwrap_or(rest.len());
    let value = &rest[..value_end];

    if value.is_empty() { Ok(None) } else { Ok(Some(value)) }
}

/// Does `token` identify the peer carrying `route`?
///
/// Prefix mode: the token starts with the route. Suffix mode: the
/// trailing bytes agree over the length of the shorter string. Empty
/// tokens and empty routes never match.
pub fn route_matches(token: &str, route: &str, mode: MatchMode) -> bool {
    if token.is_empty() || route.is_empty() {
        return false;
    }
    match mode {
        MatchMode::Prefix => token.starts_with(route),
        MatchMode::Suffix => {
            let t = token.as_bytes();
            let r = route.as_bytes();
            let len = t.len().min(r.len());
            t[t.len() - len..] == r[r.len() - len..]
        }
    }
}
