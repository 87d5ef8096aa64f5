//! Initial data for a fresh database

use crate::error::{ServiceError, ServiceResult};
use crate::models::{NuevoUsuario, Rol};
use crate::repository::{IniciativaRepository, UsuarioRepository};

/// Initiatives handed to the demo analyst by [`assign_initiatives`]
pub const DEFAULT_ANALYST_INITIATIVES: &[&str] = &[
    "Expansión Mercado Internacional",
    "Optimización Procesos Logísticos",
    "Optimización Línea A",
];

fn default_users() -> Vec<NuevoUsuario> {
    [
        ("Administrador", "admin@finimpact.com", "admin123", Rol::Admin),
        (
            "Juan Analista",
            "analista@finimpact.com",
            "analista123",
            Rol::Analista,
        ),
        ("Maria Viewer", "viewer@finimpact.com", "viewer123", Rol::Viewer),
    ]
    .into_iter()
    .map(|(nombre, email, password, rol)| NuevoUsuario {
        nombre_completo: nombre.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        rol,
    })
    .collect()
}

/// Create the admin, analyst and viewer demo accounts.
///
/// Accounts whose email already exists are left untouched. Returns the
/// emails that were created.
#[tracing::instrument(skip(usuarios))]
pub async fn seed_default_users(usuarios: &UsuarioRepository) -> ServiceResult<Vec<String>> {
    let mut created = Vec::new();
    for nuevo in default_users() {
        if usuarios.find_by_email(&nuevo.email).await?.is_some() {
            tracing::debug!(email = %nuevo.email, "user already exists, skipping");
            continue;
        }
        usuarios.save(&nuevo).await?;
        created.push(nuevo.email);
    }
    tracing::info!(created = created.len(), "default users seeded");
    Ok(created)
}

/// Make the analyst with `analyst_email` the owner of the named initiatives.
///
/// Returns the names that matched at least one initiative.
#[tracing::instrument(skip(usuarios, iniciativas, nombres))]
pub async fn assign_initiatives(
    usuarios: &UsuarioRepository,
    iniciativas: &IniciativaRepository,
    analyst_email: &str,
    nombres: &[&str],
) -> ServiceResult<Vec<String>> {
    let analista = usuarios
        .find_by_email(analyst_email)
        .await?
        .filter(|u| u.activo && u.rol == Rol::Analista)
        .ok_or_else(|| ServiceError::NotFound(format!("active analyst {}", analyst_email)))?;

    let mut assigned = Vec::new();
    for nombre in nombres {
        let updated = iniciativas
            .assign_owner_by_name(analista.id_usuario, nombre)
            .await?;
        if updated > 0 {
            assigned.push(nombre.to_string());
        } else {
            tracing::warn!(nombre = %nombre, "no initiative with this name");
        }
    }
    tracing::info!(
        id_usuario = analista.id_usuario,
        assigned = assigned.len(),
        "initiatives assigned"
    );
    Ok(assigned)
}
