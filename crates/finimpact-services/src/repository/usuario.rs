use finimpact_connection::ConnectionPool;
use finimpact_core::{Result, Value};

use super::{execute, fetch_all, fetch_one, insert};
use crate::models::{NuevoUsuario, Rol, Usuario};
use crate::password::{hash_password, verify_password};

const COLUMNS: &str = "id_usuario, nombre_completo, email, password, rol, estado";

/// Access to the `usuarios` table
#[derive(Clone, Debug)]
pub struct UsuarioRepository {
    pool: ConnectionPool,
}

impl UsuarioRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Usuario>> {
        let sql = format!("SELECT {} FROM usuarios WHERE email = ?", COLUMNS);
        fetch_one(&self.pool, &sql, &[email.into()]).await
    }

    /// The active user with this email and password, if any
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Usuario>> {
        Ok(self
            .find_by_email(email)
            .await?
            .filter(|u| u.activo && verify_password(password, &u.password_hash)))
    }

    /// Active users ordered by name
    pub async fn find_all(&self) -> Result<Vec<Usuario>> {
        let sql = format!(
            "SELECT {} FROM usuarios WHERE estado = 1 ORDER BY nombre_completo",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[]).await
    }

    pub async fn find_by_id(&self, id_usuario: i64) -> Result<Option<Usuario>> {
        let sql = format!("SELECT {} FROM usuarios WHERE id_usuario = ?", COLUMNS);
        fetch_one(&self.pool, &sql, &[id_usuario.into()]).await
    }

    /// Insert an active user, hashing the clear-text password
    #[tracing::instrument(skip(self, nuevo), fields(email = %nuevo.email))]
    pub async fn save(&self, nuevo: &NuevoUsuario) -> Result<i64> {
        let id = insert(
            &self.pool,
            "INSERT INTO usuarios (nombre_completo, email, password, rol, estado) VALUES (?, ?, ?, ?, ?)",
            &[
                nuevo.nombre_completo.as_str().into(),
                nuevo.email.as_str().into(),
                hash_password(&nuevo.password).into(),
                nuevo.rol.as_ref().into(),
                true.into(),
            ],
        )
        .await?;
        tracing::info!(id_usuario = id, "user created");
        Ok(id)
    }

    /// Update profile fields; the password changes only when one is supplied
    pub async fn update(&self, usuario: &Usuario, password: Option<&str>) -> Result<bool> {
        let mut params: Vec<Value> = vec![
            usuario.nombre_completo.as_str().into(),
            usuario.email.as_str().into(),
        ];
        let sql = match password {
            Some(password) => {
                params.push(hash_password(password).into());
                "UPDATE usuarios SET nombre_completo = ?, email = ?, password = ?, rol = ?, estado = ? WHERE id_usuario = ?"
            }
            None => {
                "UPDATE usuarios SET nombre_completo = ?, email = ?, rol = ?, estado = ? WHERE id_usuario = ?"
            }
        };
        params.push(usuario.rol.as_ref().into());
        params.push(usuario.activo.into());
        params.push(usuario.id_usuario.into());

        Ok(execute(&self.pool, sql, &params).await?.affected_rows > 0)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn update_password(&self, id_usuario: i64, password: &str) -> Result<bool> {
        let result = execute(
            &self.pool,
            "UPDATE usuarios SET password = ? WHERE id_usuario = ?",
            &[hash_password(password).into(), id_usuario.into()],
        )
        .await?;
        Ok(result.affected_rows > 0)
    }

    /// Soft delete: the row stays, marked inactive
    pub async fn delete(&self, id_usuario: i64) -> Result<bool> {
        self.update_estado(id_usuario, false).await
    }

    pub async fn find_by_rol_and_estado(&self, rol: Rol, activo: bool) -> Result<Vec<Usuario>> {
        let sql = format!(
            "SELECT {} FROM usuarios WHERE rol = ? AND estado = ? ORDER BY nombre_completo",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[rol.as_ref().into(), activo.into()]).await
    }

    pub async fn update_estado(&self, id_usuario: i64, activo: bool) -> Result<bool> {
        let result = execute(
            &self.pool,
            "UPDATE usuarios SET estado = ? WHERE id_usuario = ?",
            &[activo.into(), id_usuario.into()],
        )
        .await?;
        Ok(result.affected_rows > 0)
    }
}
