//! Initiative management scoped by role

use crate::error::{ServiceError, ServiceResult};
use crate::models::{EstadoIniciativa, Iniciativa, Riesgo};
use crate::repository::IniciativaRepository;
use crate::session::{Scope, Session};

/// In-memory filter over a loaded initiative list; `None` means any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniciativaFilter {
    pub estado: Option<EstadoIniciativa>,
    pub riesgo: Option<Riesgo>,
    /// Case-insensitive substring of the name
    pub nombre: Option<String>,
}

impl IniciativaFilter {
    pub fn matches(&self, iniciativa: &Iniciativa) -> bool {
        self.estado.is_none_or(|e| iniciativa.estado == e)
            && self.riesgo.is_none_or(|r| iniciativa.riesgo == r)
            && contains_ignore_case(&iniciativa.nombre, self.nombre.as_deref())
    }

    pub fn apply(&self, iniciativas: &[Iniciativa]) -> Vec<Iniciativa> {
        iniciativas
            .iter()
            .filter(|i| self.matches(i))
            .cloned()
            .collect()
    }
}

/// True when `needle` is blank or occurs in `haystack`, ignoring case
pub(crate) fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

#[derive(Clone, Debug)]
pub struct IniciativaService {
    iniciativas: IniciativaRepository,
}

impl IniciativaService {
    pub fn new(iniciativas: IniciativaRepository) -> Self {
        Self { iniciativas }
    }

    /// Initiatives visible to the session: analysts see their own
    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario()))]
    pub async fn list(&self, session: &Session) -> ServiceResult<Vec<Iniciativa>> {
        let iniciativas = match session.scope() {
            Scope::All => self.iniciativas.find_all().await?,
            Scope::Owner(id) => self.iniciativas.find_by_owner(id).await?,
        };
        tracing::debug!(count = iniciativas.len(), "initiatives loaded");
        Ok(iniciativas)
    }

    pub async fn get(&self, session: &Session, id_iniciativa: i64) -> ServiceResult<Iniciativa> {
        let iniciativa = self.find(id_iniciativa).await?;
        if !session.may_access(iniciativa.id_owner) {
            return Err(ServiceError::denied(format!(
                "initiative {} belongs to another user",
                id_iniciativa
            )));
        }
        Ok(iniciativa)
    }

    /// Create an initiative; an analyst always becomes its owner
    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario(), nombre = %iniciativa.nombre))]
    pub async fn create(&self, session: &Session, mut iniciativa: Iniciativa) -> ServiceResult<i64> {
        ensure_can_modify(session, "create initiatives")?;
        validate(&iniciativa)?;
        normalize(&mut iniciativa);
        if let Scope::Owner(id) = session.scope() {
            iniciativa.id_owner = Some(id);
        }
        Ok(self.iniciativas.save(&iniciativa).await?)
    }

    pub async fn update(&self, session: &Session, iniciativa: &Iniciativa) -> ServiceResult<()> {
        ensure_can_modify(session, "edit initiatives")?;
        validate(iniciativa)?;
        self.get(session, iniciativa.id_iniciativa).await?;

        let mut iniciativa = iniciativa.clone();
        normalize(&mut iniciativa);
        if let Scope::Owner(id) = session.scope() {
            iniciativa.id_owner = Some(id);
        }
        if !self.iniciativas.update(&iniciativa).await? {
            return Err(ServiceError::NotFound(format!(
                "initiative {}",
                iniciativa.id_iniciativa
            )));
        }
        Ok(())
    }

    /// Delete an initiative together with its impacts
    #[tracing::instrument(skip(self, session), fields(id_usuario = session.id_usuario()))]
    pub async fn delete(&self, session: &Session, id_iniciativa: i64) -> ServiceResult<()> {
        ensure_can_modify(session, "delete initiatives")?;
        self.get(session, id_iniciativa).await?;
        self.iniciativas.delete(id_iniciativa).await?;
        tracing::info!("initiative deleted");
        Ok(())
    }

    async fn find(&self, id_iniciativa: i64) -> ServiceResult<Iniciativa> {
        self.iniciativas
            .find_by_id(id_iniciativa)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("initiative {}", id_iniciativa)))
    }
}

pub(crate) fn ensure_can_modify(session: &Session, action: &str) -> ServiceResult<()> {
    if session.can_modify() {
        Ok(())
    } else {
        Err(ServiceError::denied(format!(
            "role '{}' cannot {}",
            session.rol(),
            action
        )))
    }
}

fn validate(iniciativa: &Iniciativa) -> ServiceResult<()> {
    if iniciativa.nombre.trim().is_empty() {
        return Err(ServiceError::validation("initiative name is required"));
    }
    if iniciativa.tipo.trim().is_empty() {
        return Err(ServiceError::validation("initiative type is required"));
    }
    if let (Some(inicio), Some(fin)) = (iniciativa.fecha_inicio, iniciativa.fecha_fin)
        && fin < inicio
    {
        return Err(ServiceError::validation(
            "end date must not be before start date",
        ));
    }
    Ok(())
}

fn normalize(iniciativa: &mut Iniciativa) {
    iniciativa.nombre = iniciativa.nombre.trim().to_string();
    iniciativa.descripcion = iniciativa.descripcion.trim().to_string();
    iniciativa.tipo = iniciativa.tipo.trim().to_string();
}
