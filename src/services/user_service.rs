use crate::auth::password;
use crate::models::profile::is_valid_phone;
use crate::models::user::{Role, User};
use crate::repositories::user_repository::{NewUser, RepositoryError, UserFilter, UserRepository};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,64}$").expect("valid username regex"));

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Username must be 3-64 letters, digits, '.', '-' or '_'")]
    InvalidUsername,
    #[error("Invalid phone number")]
    InvalidPhone,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Wrong password")]
    WrongPassword,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct ChangePasswordRequest {
    pub user_id: i64,
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Creates the user together with its profile and location rows.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let username = request.username.trim();
        let email = request.email.trim();

        self.validate_username(username)?;
        self.validate_email(email)?;

        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            self.validate_phone(phone)?;
        }

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.password)?;

        let password_hash = self.hash_password(&request.password)?;

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: request.role,
            phone: phone.map(str::to_string),
        };

        match self.repository.create_user(&new_user).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, role = %request.role, "Created user");
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists("username")) => Err(UserServiceError::UsernameTaken),
            Err(RepositoryError::AlreadyExists(_)) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email.trim()).await?)
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_username(username.trim()).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(filter).await?)
    }

    pub async fn count_users(&self) -> Result<i64, UserServiceError> {
        Ok(self.repository.count_users().await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => {
                tracing::info!(user_id = id, "Deleted user and owned rows");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.new_password)?;

        let password_hash = self.hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Password change from the account page: the old password must match.
    pub async fn change_password(
        &self,
        request: ChangePasswordRequest,
    ) -> Result<(), UserServiceError> {
        let user = self
            .repository
            .find_by_id(request.user_id)
            .await?
            .ok_or(UserServiceError::UserNotFound)?;

        if !user.check_password(&request.old_password) {
            return Err(UserServiceError::WrongPassword);
        }

        self.update_password(UpdatePasswordRequest {
            user_id: request.user_id,
            new_password: request.new_password,
            new_password_confirm: Some(request.new_password_confirm),
        })
        .await
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if !email.contains('@') || email.len() > 64 || email.is_empty() {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_username(&self, username: &str) -> Result<(), UserServiceError> {
        if !USERNAME_RE.is_match(username) {
            return Err(UserServiceError::InvalidUsername);
        }
        Ok(())
    }

    fn validate_phone(&self, phone: &str) -> Result<(), UserServiceError> {
        if !is_valid_phone(phone) {
            return Err(UserServiceError::InvalidPhone);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        password::hash_password(password).map_err(|e| UserServiceError::HashingError(e.to_string()))
    }
}
