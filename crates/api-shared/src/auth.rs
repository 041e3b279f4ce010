/// Validates the provided API key against the expected key.
///
/// The expected key is resolved at startup and passed in; `None` means the server was started
/// without `API_KEY` and every call is refused.
#[allow(clippy::result_large_err)]
pub fn validate_api_key(provided_key: &str, expected_key: Option<&str>) -> Result<(), tonic::Status> {
    let expected_key =
        expected_key.ok_or_else(|| tonic::Status::internal("API_KEY not set in environment"))?;

    if !expected_key.is_empty() && provided_key == expected_key {
        Ok(())
    } else {
        Err(tonic::Status::unauthenticated("Invalid API key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_key() {
        assert!(validate_api_key("secret", Some("secret")).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_key() {
        let wrong = validate_api_key("guess", Some("secret")).unwrap_err();
        assert_eq!(wrong.code(), tonic::Code::Unauthenticated);

        let unset = validate_api_key("secret", None).unwrap_err();
        assert_eq!(unset.code(), tonic::Code::Internal);

        assert!(validate_api_key("", Some("")).is_err());
    }
}
