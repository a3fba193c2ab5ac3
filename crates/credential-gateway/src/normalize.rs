//! Login identifier normalization.
//!
//! Operators hand out plain usernames; the identity backend only knows
//! email-shaped addresses. A username without a domain separator is mapped
//! onto the fixed pseudo-domain, anything containing `@` is used verbatim.

use crate::{GatewayError, GatewayResult};

/// Pseudo-domain appended to bare usernames.
pub const PSEUDO_DOMAIN: &str = "render.ai";

const DOMAIN_SEPARATOR: char = '@';

/// Map an operator-supplied identifier to the address used against the gateway.
///
/// Surrounding whitespace is trimmed first, as the login and admin forms do.
pub fn to_address(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.contains(DOMAIN_SEPARATOR) {
        identifier.to_string()
    } else {
        format!("{identifier}{DOMAIN_SEPARATOR}{PSEUDO_DOMAIN}")
    }
}

/// Inverse of [`to_address`] for display: strips the pseudo-domain suffix.
pub fn display_username(address: &str) -> &str {
    address
        .strip_suffix(PSEUDO_DOMAIN)
        .and_then(|rest| rest.strip_suffix(DOMAIN_SEPARATOR))
        .filter(|username| !username.is_empty())
        .unwrap_or(address)
}

/// Basic shape check applied before provisioning: exactly one `@`, a
/// non-empty local part and domain, no whitespace.
pub fn validate_address(address: &str) -> GatewayResult<()> {
    let invalid = || GatewayError::InvalidAddress(address.to_string());

    if address.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = address.split_once(DOMAIN_SEPARATOR).ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains(DOMAIN_SEPARATOR) {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}
