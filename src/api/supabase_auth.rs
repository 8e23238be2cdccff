use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{app_error::AppError, config::SupabaseConfig};

#[derive(Debug, Error)]
pub enum SupabaseAuthError {
    #[error("Supabase URL and key must be configured")]
    NotConfigured,

    #[error("Supabase Auth request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl From<SupabaseAuthError> for AppError {
    fn from(err: SupabaseAuthError) -> Self {
        match err {
            SupabaseAuthError::NotConfigured | SupabaseAuthError::Transport(_) => {
                tracing::error!("{}", err);
                AppError::ServiceUnreachable("Supabase Auth".into())
            }
            SupabaseAuthError::Rejected { message, .. } => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// A GoTrue user together with its session, when one was issued.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AuthSession {
    #[schema(value_type = Object)]
    pub user: Value,
    #[schema(value_type = Option<Object>)]
    pub session: Option<Value>,
}

impl AuthSession {
    /// GoTrue answers with a session object (which embeds the user) when it
    /// can sign the user in right away, and with a bare user otherwise.
    pub fn from_gotrue(body: Value) -> Self {
        if body.get("access_token").is_some() {
            let user = body.get("user").cloned().unwrap_or(Value::Null);
            Self {
                user,
                session: Some(body),
            }
        } else {
            Self {
                user: body,
                session: None,
            }
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Client for the Supabase Auth (GoTrue) REST API.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http_client: Client,
    config: SupabaseConfig,
}

impl SupabaseAuthClient {
    pub fn new(http_client: Client, config: SupabaseConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    fn endpoint(&self, path: &str) -> Result<(String, &str), SupabaseAuthError> {
        match (&self.config.url, &self.config.key) {
            (Some(url), Some(key)) => Ok((
                format!("{}/auth/v1/{}", url.trim_end_matches('/'), path),
                key.as_str(),
            )),
            _ => Err(SupabaseAuthError::NotConfigured),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, SupabaseAuthError> {
        let (url, key) = self.endpoint("signup")?;
        let response = self
            .http_client
            .post(url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = Self::json_or_rejection(response).await?;
        Ok(AuthSession::from_gotrue(body))
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseAuthError> {
        let (url, key) = self.endpoint("token")?;
        let response = self
            .http_client
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", key)
            .bearer_auth(key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = Self::json_or_rejection(response).await?;
        Ok(AuthSession::from_gotrue(body))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseAuthError> {
        let (url, key) = self.endpoint("logout")?;
        let response = self
            .http_client
            .post(url)
            .header("apikey", key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(SupabaseAuthError::Rejected {
                status,
                message: rejection_message(&body),
            });
        }
        Ok(())
    }

    async fn json_or_rejection(response: Response) -> Result<Value, SupabaseAuthError> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(SupabaseAuthError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }
        Ok(body)
    }
}

/// GoTrue is not consistent about where it puts the error text.
fn rejection_message(body: &Value) -> String {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("Authentication request was rejected")
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn session_response_is_split_into_user_and_session() {
        let id = Uuid::new_v4();
        let auth = AuthSession::from_gotrue(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "user": { "id": id.to_string(), "email": "a@campus.edu" }
        }));

        assert_eq!(auth.user_id(), Some(id));
        assert_eq!(auth.session.unwrap()["access_token"], "jwt");
    }

    #[test]
    fn bare_user_response_has_no_session() {
        let id = Uuid::new_v4();
        let auth = AuthSession::from_gotrue(json!({ "id": id.to_string() }));

        assert_eq!(auth.user_id(), Some(id));
        assert!(auth.session.is_none());
    }

    #[test]
    fn rejection_message_prefers_known_keys() {
        assert_eq!(
            rejection_message(&json!({"code": 400, "msg": "User already registered"})),
            "User already registered"
        );
        assert_eq!(
            rejection_message(
                &json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})
            ),
            "Invalid login credentials"
        );
        assert_eq!(
            rejection_message(&Value::Null),
            "Authentication request was rejected"
        );
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let client = SupabaseAuthClient::new(Client::new(), SupabaseConfig::default());
        let err = client.sign_up("a@campus.edu", "pw").await.unwrap_err();
        assert!(matches!(err, SupabaseAuthError::NotConfigured));
    }
}
