//! Dashboard: filtered data loading and KPI aggregation

use std::collections::{BTreeMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::ServiceResult;
use crate::models::{EstadoIniciativa, Impacto, Iniciativa, Riesgo};
use crate::repository::{ImpactoRepository, IniciativaRepository};
use crate::session::{Scope, Session};

/// Dashboard selection. Blank values mean "all".
///
/// `id_owner` is ignored for analysts, who always see their own initiatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardFilter {
    pub id_owner: Option<i64>,
    pub nombre_iniciativa: Option<String>,
}

impl DashboardFilter {
    fn nombre(&self) -> Option<&str> {
        self.nombre_iniciativa
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Key figures and chart series for a set of initiatives and impacts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total_iniciativas: usize,
    pub activas: usize,
    pub finalizadas: usize,
    pub riesgo_alto: usize,
    pub impacto_total: Decimal,
    /// Mean signed impact, two decimals, half-up
    pub impacto_promedio: Decimal,
    /// Share of finished initiatives in percent, one decimal
    pub eficiencia: Decimal,
    pub por_estado: BTreeMap<String, usize>,
    pub por_riesgo: BTreeMap<String, usize>,
    pub impacto_por_tipo: BTreeMap<String, Decimal>,
    /// Signed impact per `yyyy-MM` month of `fecha_impacto`, ascending
    pub impacto_mensual: BTreeMap<String, Decimal>,
}

impl DashboardMetrics {
    pub fn compute(iniciativas: &[Iniciativa], impactos: &[Impacto]) -> Self {
        let total_iniciativas = iniciativas.len();
        let count_estado = |estado: EstadoIniciativa| {
            iniciativas.iter().filter(|i| i.estado == estado).count()
        };
        let activas = count_estado(EstadoIniciativa::EnCurso);
        let finalizadas = count_estado(EstadoIniciativa::Finalizado);
        let riesgo_alto = iniciativas
            .iter()
            .filter(|i| i.riesgo == Riesgo::Alto)
            .count();

        let impacto_total: Decimal = impactos.iter().map(Impacto::impacto_calculado).sum();
        let impacto_promedio = if impactos.is_empty() {
            Decimal::ZERO
        } else {
            (impacto_total / Decimal::from(impactos.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        let eficiencia = if total_iniciativas == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(finalizadas * 100) / Decimal::from(total_iniciativas))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };

        let mut por_estado = BTreeMap::new();
        let mut por_riesgo = BTreeMap::new();
        for iniciativa in iniciativas {
            *por_estado.entry(iniciativa.estado.to_string()).or_insert(0) += 1;
            *por_riesgo.entry(iniciativa.riesgo.to_string()).or_insert(0) += 1;
        }

        let mut impacto_por_tipo = BTreeMap::new();
        let mut impacto_mensual = BTreeMap::new();
        for impacto in impactos {
            let calculado = impacto.impacto_calculado();
            *impacto_por_tipo
                .entry(impacto.tipo_impacto.to_string())
                .or_insert(Decimal::ZERO) += calculado;
            *impacto_mensual
                .entry(impacto.fecha_impacto.format("%Y-%m").to_string())
                .or_insert(Decimal::ZERO) += calculado;
        }

        Self {
            total_iniciativas,
            activas,
            finalizadas,
            riesgo_alto,
            impacto_total,
            impacto_promedio,
            eficiencia,
            por_estado,
            por_riesgo,
            impacto_por_tipo,
            impacto_mensual,
        }
    }
}

/// Everything the dashboard shows for one selection
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub iniciativas: Vec<Iniciativa>,
    pub impactos: Vec<Impacto>,
    pub metrics: DashboardMetrics,
}

#[derive(Clone, Debug)]
pub struct DashboardService {
    iniciativas: IniciativaRepository,
    impactos: ImpactoRepository,
}

impl DashboardService {
    pub fn new(iniciativas: IniciativaRepository, impactos: ImpactoRepository) -> Self {
        Self {
            iniciativas,
            impactos,
        }
    }

    /// Load the initiatives and impacts selected by `filter` and aggregate them
    #[tracing::instrument(skip_all, fields(id_usuario = session.id_usuario()))]
    pub async fn load(
        &self,
        session: &Session,
        filter: &DashboardFilter,
    ) -> ServiceResult<DashboardData> {
        let iniciativas = self.load_iniciativas(session, filter).await?;
        let impactos = self.load_impactos(session, filter, &iniciativas).await?;
        let metrics = DashboardMetrics::compute(&iniciativas, &impactos);
        tracing::debug!(
            iniciativas = iniciativas.len(),
            impactos = impactos.len(),
            "dashboard loaded"
        );
        Ok(DashboardData {
            iniciativas,
            impactos,
            metrics,
        })
    }

    async fn load_iniciativas(
        &self,
        session: &Session,
        filter: &DashboardFilter,
    ) -> ServiceResult<Vec<Iniciativa>> {
        let owner = match session.scope() {
            Scope::Owner(id) => Some(id),
            Scope::All => filter.id_owner,
        };
        let iniciativas = match (owner, filter.nombre()) {
            (Some(owner), Some(nombre)) => {
                self.iniciativas.find_by_owner_and_name(owner, nombre).await?
            }
            (Some(owner), None) => self.iniciativas.find_by_owner(owner).await?,
            (None, Some(nombre)) => self.iniciativas.find_by_name(nombre).await?,
            (None, None) => self.iniciativas.find_all().await?,
        };
        Ok(iniciativas)
    }

    async fn load_impactos(
        &self,
        session: &Session,
        filter: &DashboardFilter,
        iniciativas: &[Iniciativa],
    ) -> ServiceResult<Vec<Impacto>> {
        if iniciativas.is_empty() {
            return Ok(Vec::new());
        }
        let impactos = match session.scope() {
            Scope::Owner(id) => {
                let impactos = self.impactos.find_by_owner(id).await?;
                if filter.nombre().is_some() {
                    let selected: HashSet<i64> =
                        iniciativas.iter().map(|i| i.id_iniciativa).collect();
                    impactos
                        .into_iter()
                        .filter(|i| selected.contains(&i.id_iniciativa))
                        .collect()
                } else {
                    impactos
                }
            }
            Scope::All => {
                let ids: Vec<i64> = iniciativas.iter().map(|i| i.id_iniciativa).collect();
                self.impactos.find_by_iniciativa_ids(&ids).await?
            }
        };
        Ok(impactos)
    }
}
