use serde::{Deserialize, Serialize};

/// The signed-in user, as returned by `GET /auth/me` and persisted under `userInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

impl UserInfo {
    /// Name to show for the user: the username, else the email.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Response of login and register
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl AuthResponse {
    /// User info carried by the auth response.
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            is_active: true,
            created_at: None,
        }
    }
}

/// Response of `POST /auth/refresh`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_user_info() {
        let json = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "bearer",
            "user_id": "u1",
            "email": "a@example.com",
            "username": null
        }"#;
        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        let user = resp.user_info();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.display_name(), "a@example.com");
        assert!(user.is_active);
    }

    #[test]
    fn test_display_name_prefers_username() {
        let user = UserInfo {
            user_id: "u1".into(),
            email: "a@example.com".into(),
            username: Some("ann".into()),
            is_active: true,
            created_at: None,
        };
        assert_eq!(user.display_name(), "ann");
    }

    #[test]
    fn test_user_info_from_me_endpoint() {
        let json = r#"{"user_id":"u2","email":"b@example.com","is_active":false,"created_at":"2025-01-01T00:00:00"}"#;
        let user: UserInfo = serde_json::from_str(json).unwrap();
        assert!(!user.is_active);
        assert_eq!(user.created_at.as_deref(), Some("2025-01-01T00:00:00"));
    }
}
