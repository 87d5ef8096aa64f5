//! Sign-in

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ServiceError, ServiceResult};
use crate::password::verify_password;
use crate::repository::UsuarioRepository;
use crate::session::Session;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

const MIN_LOGIN_PASSWORD_LEN: usize = 3;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Check the shape of the login form before touching the database
pub fn validate_credentials(email: &str, password: &str) -> ServiceResult<()> {
    if email.trim().is_empty() {
        return Err(ServiceError::validation("email is required"));
    }
    if !is_valid_email(email.trim()) {
        return Err(ServiceError::validation("email format is invalid"));
    }
    if password.is_empty() {
        return Err(ServiceError::validation("password is required"));
    }
    if password.chars().count() < MIN_LOGIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at least {} characters",
            MIN_LOGIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Authenticates users against the `usuarios` table
#[derive(Clone, Debug)]
pub struct AuthService {
    usuarios: UsuarioRepository,
}

impl AuthService {
    pub fn new(usuarios: UsuarioRepository) -> Self {
        Self { usuarios }
    }

    /// Open a session for an active user with matching credentials
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        validate_credentials(email, password)?;

        let usuario = self
            .usuarios
            .find_by_email(email.trim())
            .await?
            .filter(|u| verify_password(password, &u.password_hash))
            .ok_or_else(|| {
                tracing::warn!("login rejected");
                ServiceError::InvalidCredentials
            })?;

        if !usuario.activo {
            tracing::warn!(id_usuario = usuario.id_usuario, "login by inactive user");
            return Err(ServiceError::InactiveUser);
        }

        tracing::info!(id_usuario = usuario.id_usuario, rol = %usuario.rol, "user signed in");
        Ok(Session::new(usuario))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("admin@finimpact.com"));
        assert!(is_valid_email("juan.perez+test@sub.example.co"));
        assert!(!is_valid_email("admin@finimpact"));
        assert!(!is_valid_email("admin finimpact.com"));
        assert!(!is_valid_email("@finimpact.com"));
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("admin@finimpact.com", "abc").is_ok());
        assert!(matches!(
            validate_credentials("", "abc"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            validate_credentials("admin@finimpact.com", "ab"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            validate_credentials("not-an-email", "abcdef"),
            Err(ServiceError::Validation(_))
        ));
    }
}
