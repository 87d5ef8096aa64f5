//! User administration, available to admins only

use crate::auth_service::is_valid_email;
use crate::error::{ServiceError, ServiceResult};
use crate::iniciativa_service::contains_ignore_case;
use crate::models::{NuevoUsuario, Rol, Usuario};
use crate::repository::UsuarioRepository;
use crate::session::Session;

/// In-memory filter over a loaded user list; `None` means any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsuarioFilter {
    pub rol: Option<Rol>,
    /// Case-insensitive substring of the name or the email
    pub texto: Option<String>,
}

impl UsuarioFilter {
    pub fn matches(&self, usuario: &Usuario) -> bool {
        let texto = self.texto.as_deref();
        self.rol.is_none_or(|r| usuario.rol == r)
            && (contains_ignore_case(&usuario.nombre_completo, texto)
                || contains_ignore_case(&usuario.email, texto))
    }

    pub fn apply(&self, usuarios: &[Usuario]) -> Vec<Usuario> {
        usuarios
            .iter()
            .filter(|u| self.matches(u))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct UsuarioService {
    usuarios: UsuarioRepository,
}

impl UsuarioService {
    pub fn new(usuarios: UsuarioRepository) -> Self {
        Self { usuarios }
    }

    /// Active users ordered by name
    pub async fn list(&self, session: &Session) -> ServiceResult<Vec<Usuario>> {
        ensure_admin(session)?;
        Ok(self.usuarios.find_all().await?)
    }

    #[tracing::instrument(skip_all, fields(email = %nuevo.email))]
    pub async fn create(&self, session: &Session, nuevo: NuevoUsuario) -> ServiceResult<i64> {
        ensure_admin(session)?;
        let nuevo = NuevoUsuario {
            nombre_completo: nuevo.nombre_completo.trim().to_string(),
            email: nuevo.email.trim().to_string(),
            password: nuevo.password.trim().to_string(),
            rol: nuevo.rol,
        };
        validate_profile(&nuevo.nombre_completo, &nuevo.email)?;
        if nuevo.password.is_empty() {
            return Err(ServiceError::validation(
                "a password is required for new users",
            ));
        }
        self.ensure_email_free(&nuevo.email, None).await?;
        Ok(self.usuarios.save(&nuevo).await?)
    }

    /// Update a user; a blank `password` keeps the current one
    pub async fn update(
        &self,
        session: &Session,
        usuario: &Usuario,
        password: Option<&str>,
    ) -> ServiceResult<()> {
        ensure_admin(session)?;
        let mut usuario = usuario.clone();
        usuario.nombre_completo = usuario.nombre_completo.trim().to_string();
        usuario.email = usuario.email.trim().to_string();
        validate_profile(&usuario.nombre_completo, &usuario.email)?;
        self.ensure_email_free(&usuario.email, Some(usuario.id_usuario))
            .await?;

        let password = password.map(str::trim).filter(|p| !p.is_empty());
        if !self.usuarios.update(&usuario, password).await? {
            return Err(ServiceError::NotFound(format!("user {}", usuario.id_usuario)));
        }
        Ok(())
    }

    /// Mark a user inactive; the row is kept
    #[tracing::instrument(skip(self, session))]
    pub async fn deactivate(&self, session: &Session, id_usuario: i64) -> ServiceResult<()> {
        ensure_admin(session)?;
        if !self.usuarios.delete(id_usuario).await? {
            return Err(ServiceError::NotFound(format!("user {}", id_usuario)));
        }
        tracing::info!("user deactivated");
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, except: Option<i64>) -> ServiceResult<()> {
        match self.usuarios.find_by_email(email).await? {
            Some(existing) if Some(existing.id_usuario) != except => Err(
                ServiceError::validation(format!("email {} is already registered", email)),
            ),
            _ => Ok(()),
        }
    }
}

fn ensure_admin(session: &Session) -> ServiceResult<()> {
    if session.can_manage_users() {
        Ok(())
    } else {
        Err(ServiceError::denied("only administrators can manage users"))
    }
}

fn validate_profile(nombre_completo: &str, email: &str) -> ServiceResult<()> {
    if nombre_completo.is_empty() {
        return Err(ServiceError::validation("full name is required"));
    }
    if email.is_empty() {
        return Err(ServiceError::validation("email is required"));
    }
    if !is_valid_email(email) {
        return Err(ServiceError::validation("email format is invalid"));
    }
    Ok(())
}
