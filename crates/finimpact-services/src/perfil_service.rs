//! Profile management for the signed-in user

use crate::error::{ServiceError, ServiceResult};
use crate::password::verify_password;
use crate::repository::UsuarioRepository;
use crate::session::Session;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug)]
pub struct PerfilService {
    usuarios: UsuarioRepository,
}

impl PerfilService {
    pub fn new(usuarios: UsuarioRepository) -> Self {
        Self { usuarios }
    }

    /// Change the session user's password.
    ///
    /// All three fields are required, the new password needs at least six
    /// characters and must match its confirmation, and the current password
    /// must verify against the stored hash.
    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario()))]
    pub async fn change_password(
        &self,
        session: &mut Session,
        actual: &str,
        nueva: &str,
        confirmacion: &str,
    ) -> ServiceResult<()> {
        let (actual, nueva, confirmacion) = (actual.trim(), nueva.trim(), confirmacion.trim());

        if actual.is_empty() {
            return Err(ServiceError::validation("current password is required"));
        }
        if nueva.is_empty() {
            return Err(ServiceError::validation("new password is required"));
        }
        if nueva.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::validation(format!(
                "new password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if nueva != confirmacion {
            return Err(ServiceError::validation(
                "password confirmation does not match",
            ));
        }

        let usuario = self
            .usuarios
            .find_by_id(session.id_usuario())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", session.id_usuario())))?;
        if !verify_password(actual, &usuario.password_hash) {
            return Err(ServiceError::validation("current password is incorrect"));
        }

        self.usuarios
            .update_password(usuario.id_usuario, nueva)
            .await?;
        if let Some(updated) = self.usuarios.find_by_id(usuario.id_usuario).await? {
            session.refresh(updated);
        }
        tracing::info!("password changed");
        Ok(())
    }
}
