pub const APP_NAME: &str = "Cabsync";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// Sent to geocoders and the Beckn gateway. Nominatim's usage policy requires
/// an identifying agent.
pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME.to_lowercase(), version_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_package_version() {
        let label = version_label();
        match GIT_TAG {
            Some(tag) => assert_eq!(label, tag),
            None => assert_eq!(label, format!("v{APP_VERSION}")),
        }
        assert!(user_agent().starts_with("cabsync/"));
    }
}
