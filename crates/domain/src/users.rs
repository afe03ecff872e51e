//! Account registration and credential checks.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use store::{NewUser, Role, Store, StoreError, User};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{Result, ShopError, validate_request};
use crate::events::{EventPublisher, UserRegistered};
use crate::rules::{email_format, not_blank, rule_error};

const BAD_CREDENTIALS: &str = "Email o password non corretti";

fn required_email(value: &str) -> std::result::Result<(), ValidationError> {
    if not_blank(value).is_err() {
        return Err(rule_error("required", "Email è obbligatoria"));
    }
    email_format(value).map_err(|_| rule_error("email", "Formato email non valido"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "required_email"))]
    pub email: String,

    #[serde(default)]
    #[validate(
        custom(function = "not_blank", message = "Password è obbligatoria"),
        length(min = 8, message = "Password deve essere di almeno 8 caratteri")
    )]
    pub password: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome è obbligatorio"))]
    pub first_name: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Cognome è obbligatorio"))]
    pub last_name: String,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "required_email"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Password è obbligatoria"))]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Account data safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            address: user.address,
            city: user.city,
            zip_code: user.zip_code,
            role: user.role,
            enabled: user.enabled,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    publisher: Arc<dyn EventPublisher>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Creates an enabled USER account and publishes [`UserRegistered`]
    /// once the row is committed.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserView> {
        validate_request(&request)?;
        let email = request.email.trim().to_string();
        let password_hash = hash_password(&request.password)?;

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_email(&email).await?.is_some() {
            return Err(ShopError::invalid_input("Email già registrata"));
        }

        let user = tx
            .insert_user(NewUser {
                email,
                password_hash,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: request.phone,
                address: request.address,
                city: request.city,
                zip_code: request.zip_code,
                role: Role::User,
                enabled: true,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => ShopError::invalid_input("Email già registrata"),
                other => other.into(),
            })?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user registered");
        self.publisher.publish(
            UserRegistered {
                user_id: user.id,
                email: user.email.clone(),
                first_name: user.first_name.clone(),
            }
            .into(),
        );
        Ok(user.into())
    }

    /// Checks credentials. Unknown emails and wrong passwords are
    /// indistinguishable to the caller.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<UserView> {
        validate_request(&request)?;
        let user = self
            .find_by_email(request.email.trim())
            .await?
            .ok_or_else(|| ShopError::invalid_input(BAD_CREDENTIALS))?;

        if !verify_password(&request.password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(ShopError::invalid_input(BAD_CREDENTIALS));
        }
        if !user.enabled {
            return Err(ShopError::invalid_input("Account disabilitato"));
        }
        Ok(user.into())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut tx = self.store.begin().await?;
        let user = tx.find_user_by_email(email).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<Option<UserView>> {
        let mut tx = self.store.begin().await?;
        let user = tx.find_user(id).await?;
        tx.commit().await?;
        Ok(user.map(UserView::from))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ShopError::Internal(format!("salt encoding failed: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ShopError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;
    use crate::events::{InMemoryEventPublisher, ShopEvent};

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "segreta123".into(),
            first_name: "Giulia".into(),
            last_name: "Bianchi".into(),
            city: Some("Torino".into()),
            ..RegisterRequest::default()
        }
    }

    fn service() -> (UserService, Arc<InMemoryEventPublisher>) {
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let service = UserService::new(Arc::new(InMemoryStore::new()), publisher.clone());
        (service, publisher)
    }

    #[test]
    fn hashes_verify_and_differ_per_call() {
        let a = hash_password("segreta123").unwrap();
        let b = hash_password("segreta123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("segreta123", &a));
        assert!(!verify_password("sbagliata", &a));
        assert!(!verify_password("segreta123", "not-a-hash"));
    }

    #[test]
    fn email_messages() {
        let blank = register_request(" ").validate().unwrap_err();
        let invalid = register_request("nope").validate().unwrap_err();
        let message = |e: &validator::ValidationErrors| {
            e.field_errors()["email"][0]
                .message
                .as_ref()
                .map(|m| m.to_string())
        };
        assert_eq!(message(&blank).as_deref(), Some("Email è obbligatoria"));
        assert_eq!(message(&invalid).as_deref(), Some("Formato email non valido"));
    }

    #[tokio::test]
    async fn register_then_login() {
        let (service, publisher) = service();
        let user = service
            .register(register_request("giulia@example.com"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.enabled);
        assert_eq!(
            publisher.published(),
            vec![ShopEvent::UserRegistered(UserRegistered {
                user_id: user.id,
                email: "giulia@example.com".into(),
                first_name: "Giulia".into(),
            })]
        );

        let logged_in = service
            .login(LoginRequest::new("giulia@example.com", "segreta123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let json = serde_json::to_value(&logged_in).unwrap();
        assert_eq!(json["role"], "USER");
        assert!(json.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (service, publisher) = service();
        service
            .register(register_request("dup@example.com"))
            .await
            .unwrap();
        let err = service
            .register(register_request("dup@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email già registrata");
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn bad_credentials_share_one_message() {
        let (service, _) = service();
        service
            .register(register_request("mario@example.com"))
            .await
            .unwrap();

        for request in [
            LoginRequest::new("mario@example.com", "sbagliata"),
            LoginRequest::new("ghost@example.com", "segreta123"),
        ] {
            let err = service.login(request).await.unwrap_err();
            assert_eq!(err.to_string(), BAD_CREDENTIALS);
        }
    }

    #[tokio::test]
    async fn short_password_fails_validation() {
        let (service, _) = service();
        let err = service
            .register(RegisterRequest {
                password: "corta".into(),
                ..register_request("x@example.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShopError::Validation(ref m) if m == &["Password deve essere di almeno 8 caratteri"]
        ));
    }
}
