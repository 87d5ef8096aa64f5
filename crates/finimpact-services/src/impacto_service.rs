//! Impact management; permissions follow the owning initiative

use crate::error::{ServiceError, ServiceResult};
use crate::iniciativa_service::{contains_ignore_case, ensure_can_modify};
use crate::models::{AtributoImpacto, Impacto, TipoImpacto};
use crate::repository::{ImpactoRepository, IniciativaRepository};
use crate::session::{Scope, Session};

/// In-memory filter over a loaded impact list; `None` means any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactoFilter {
    pub tipo: Option<TipoImpacto>,
    pub atributo: Option<AtributoImpacto>,
    /// Case-insensitive substring of the impact type name
    pub texto: Option<String>,
}

impl ImpactoFilter {
    pub fn matches(&self, impacto: &Impacto) -> bool {
        self.tipo.is_none_or(|t| impacto.tipo_impacto == t)
            && self.atributo.is_none_or(|a| impacto.atributo_impacto == a)
            && contains_ignore_case(impacto.tipo_impacto.as_ref(), self.texto.as_deref())
    }

    pub fn apply(&self, impactos: &[Impacto]) -> Vec<Impacto> {
        impactos
            .iter()
            .filter(|i| self.matches(i))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct ImpactoService {
    impactos: ImpactoRepository,
    iniciativas: IniciativaRepository,
}

impl ImpactoService {
    pub fn new(impactos: ImpactoRepository, iniciativas: IniciativaRepository) -> Self {
        Self {
            impactos,
            iniciativas,
        }
    }

    /// Impacts visible to the session: analysts see those of their initiatives
    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario()))]
    pub async fn list(&self, session: &Session) -> ServiceResult<Vec<Impacto>> {
        let impactos = match session.scope() {
            Scope::All => self.impactos.find_all().await?,
            Scope::Owner(id) => self.impactos.find_by_owner(id).await?,
        };
        tracing::debug!(count = impactos.len(), "impacts loaded");
        Ok(impactos)
    }

    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario(), id_iniciativa = impacto.id_iniciativa))]
    pub async fn create(&self, session: &Session, impacto: &Impacto) -> ServiceResult<i64> {
        ensure_can_modify(session, "create impacts")?;
        self.check_iniciativa(session, impacto.id_iniciativa).await?;
        Ok(self.impactos.save(impacto).await?)
    }

    pub async fn update(&self, session: &Session, impacto: &Impacto) -> ServiceResult<()> {
        ensure_can_modify(session, "edit impacts")?;
        let existing = self.find(impacto.id_impacto).await?;
        self.check_iniciativa(session, existing.id_iniciativa).await?;
        if impacto.id_iniciativa != existing.id_iniciativa {
            self.check_iniciativa(session, impacto.id_iniciativa).await?;
        }
        if !self.impactos.update(impacto).await? {
            return Err(ServiceError::NotFound(format!("impact {}", impacto.id_impacto)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, session), fields(id_usuario = session.id_usuario()))]
    pub async fn delete(&self, session: &Session, id_impacto: i64) -> ServiceResult<()> {
        ensure_can_modify(session, "delete impacts")?;
        let existing = self.find(id_impacto).await?;
        self.check_iniciativa(session, existing.id_iniciativa).await?;
        self.impactos.delete(id_impacto).await?;
        tracing::info!("impact deleted");
        Ok(())
    }

    async fn find(&self, id_impacto: i64) -> ServiceResult<Impacto> {
        self.impactos
            .find_by_id(id_impacto)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("impact {}", id_impacto)))
    }

    /// The initiative must exist and be within the session's scope
    async fn check_iniciativa(&self, session: &Session, id_iniciativa: i64) -> ServiceResult<()> {
        let iniciativa = self
            .iniciativas
            .find_by_id(id_iniciativa)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("initiative {}", id_iniciativa)))?;
        if !session.may_access(iniciativa.id_owner) {
            return Err(ServiceError::denied(format!(
                "initiative {} belongs to another user",
                id_iniciativa
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Multiplicador;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn impacto(tipo: TipoImpacto, atributo: AtributoImpacto) -> Impacto {
        Impacto::nuevo(
            1,
            tipo,
            atributo,
            Multiplicador::Positivo,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Decimal::from(100),
        )
    }

    #[test]
    fn test_filter() {
        let items = vec![
            impacto(TipoImpacto::Maquinaria, AtributoImpacto::Real),
            impacto(TipoImpacto::Generacion, AtributoImpacto::Estimado),
            impacto(TipoImpacto::Optimizacion, AtributoImpacto::Real),
        ];

        let filter = ImpactoFilter {
            atributo: Some(AtributoImpacto::Real),
            ..Default::default()
        };
        assert_eq!(filter.apply(&items).len(), 2);

        let filter = ImpactoFilter {
            texto: Some("GENERACIÓN".into()),
            ..Default::default()
        };
        let found = filter.apply(&items);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tipo_impacto, TipoImpacto::Generacion);

        let filter = ImpactoFilter {
            tipo: Some(TipoImpacto::Maquinaria),
            atributo: Some(AtributoImpacto::Estimado),
            texto: None,
        };
        assert!(filter.apply(&items).is_empty());
    }
}
