//! User-Agent string for SP and IdP requests.

/// Default User-Agent identifying the tool and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("ecpcert/{version} (saml-ecp-client)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("ecpcert/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
            "UA must contain crate version"
        );
        assert!(ua.contains("saml-ecp-client"), "UA must identify the client: {ua}");
    }
}
