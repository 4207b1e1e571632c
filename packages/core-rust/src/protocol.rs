//! Wire-level constants and HTTP status classification shared by client and server.

/// Default path of the endpoint that dispatches without a session.
pub const DEFAULT_PUBLIC_PATH: &str = "/pws";
/// Default path of the endpoint that requires an authenticated session.
pub const DEFAULT_AUTHENTICATED_PATH: &str = "/aws";
/// Default path of the credential exchange endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/login";
/// Default path that ends the current session.
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";

/// Request parameter carrying the module name.
pub const MODULE_PARAM: &str = "module";
/// Request parameter carrying the operation name.
pub const OPERATION_PARAM: &str = "op";
/// Marker asking the login endpoint to answer with a bare status code.
pub const ONLY_SEND_HTTP_RESPONSE_PARAM: &str = "only-send-http-response";
/// Multipart field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "data";

/// Login form field holding the username.
pub const USERNAME_PARAM: &str = "tfUsername";
/// Login form field holding the password.
pub const PASSWORD_PARAM: &str = "tfPassword";
/// Maximum accepted length of a login field.
pub const MAX_CREDENTIAL_LENGTH: usize = 45;

/// Content type of form-encoded calls.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
/// Content type of successful operation responses.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// How a response status is interpreted by the calling side.
///
/// The mapping is total: every status code falls in exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 200: the body carries the result.
    Success,
    /// 401: no valid session, authenticate first.
    AuthorizationRequired,
    /// 403: the session may not run this operation.
    Forbidden,
    /// 412: the request parameters were rejected.
    InvalidParams,
    /// Anything else.
    Unexpected,
}

impl StatusClass {
    /// Classifies a numeric HTTP status code.
    #[must_use]
    pub fn of(status: u16) -> Self {
        match status {
            200 => Self::Success,
            401 => Self::AuthorizationRequired,
            403 => Self::Forbidden,
            412 => Self::InvalidParams,
            _ => Self::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(401), StatusClass::AuthorizationRequired);
        assert_eq!(StatusClass::of(403), StatusClass::Forbidden);
        assert_eq!(StatusClass::of(412), StatusClass::InvalidParams);
        assert_eq!(StatusClass::of(201), StatusClass::Unexpected);
        assert_eq!(StatusClass::of(500), StatusClass::Unexpected);
    }

    proptest! {
        #[test]
        fn everything_else_is_unexpected(status in 100u16..600) {
            prop_assume!(![200, 401, 403, 412].contains(&status));
            prop_assert_eq!(StatusClass::of(status), StatusClass::Unexpected);
        }

        #[test]
        fn classification_is_deterministic(status in any::<u16>()) {
            prop_assert_eq!(StatusClass::of(status), StatusClass::of(status));
        }
    }
}
