use chrono::NaiveDate;
use finimpact_connection::ConnectionPool;
use finimpact_core::{FinImpactError, Result, Row, Value};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{execute, fetch_all, fetch_one, fetch_scalar, insert, placeholders};
use crate::models::{AtributoImpacto, Impacto, TipoImpacto};
use crate::rows::{FromRow, decimal, to_decimal};

const COLUMNS: &str = "id_impacto, id_iniciativa, fecha_creacion, tipo_impacto, multiplicador, atributo_impacto, fecha_impacto, impacto";

/// Count and signed total of the impacts of one type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstadisticaTipo {
    pub tipo_impacto: TipoImpacto,
    pub cantidad: i64,
    pub total: Decimal,
}

impl FromRow for EstadisticaTipo {
    fn from_row(row: &Row) -> Result<Self> {
        let tipo = row
            .get_by_name("tipo_impacto")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(EstadisticaTipo {
            tipo_impacto: tipo.parse().map_err(|_| {
                FinImpactError::Query(format!("unknown tipo_impacto '{}'", tipo))
            })?,
            cantidad: row
                .get_by_name("cantidad")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            total: decimal(row, "total")?,
        })
    }
}

/// Access to the `impactos` table
#[derive(Clone, Debug)]
pub struct ImpactoRepository {
    pool: ConnectionPool,
}

impl ImpactoRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// All impacts, most recently created first
    pub async fn find_all(&self) -> Result<Vec<Impacto>> {
        let sql = format!(
            "SELECT {} FROM impactos ORDER BY fecha_creacion DESC",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[]).await
    }

    pub async fn find_by_id(&self, id_impacto: i64) -> Result<Option<Impacto>> {
        let sql = format!("SELECT {} FROM impactos WHERE id_impacto = ?", COLUMNS);
        fetch_one(&self.pool, &sql, &[id_impacto.into()]).await
    }

    pub async fn find_by_iniciativa(&self, id_iniciativa: i64) -> Result<Vec<Impacto>> {
        let sql = format!(
            "SELECT {} FROM impactos WHERE id_iniciativa = ? ORDER BY fecha_impacto DESC",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[id_iniciativa.into()]).await
    }

    /// Impacts of any of the given initiatives; no ids means no impacts
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn find_by_iniciativa_ids(&self, ids: &[i64]) -> Result<Vec<Impacto>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM impactos WHERE id_iniciativa IN ({}) ORDER BY fecha_impacto DESC",
            COLUMNS,
            placeholders(ids.len())
        );
        let params: Vec<Value> = ids.iter().map(|id| (*id).into()).collect();
        fetch_all(&self.pool, &sql, &params).await
    }

    /// Impacts of the initiatives owned by a user
    #[tracing::instrument(skip(self))]
    pub async fn find_by_owner(&self, id_owner: i64) -> Result<Vec<Impacto>> {
        let columns = COLUMNS
            .split(", ")
            .map(|c| format!("im.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM impactos im INNER JOIN iniciativas ini ON im.id_iniciativa = ini.id_iniciativa WHERE ini.id_owner = ? ORDER BY im.fecha_impacto DESC",
            columns
        );
        fetch_all(&self.pool, &sql, &[id_owner.into()]).await
    }

    pub async fn find_by_tipo_impacto(&self, tipo: TipoImpacto) -> Result<Vec<Impacto>> {
        let sql = format!(
            "SELECT {} FROM impactos WHERE tipo_impacto = ? ORDER BY fecha_impacto DESC",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[tipo.as_ref().into()]).await
    }

    pub async fn find_by_atributo_impacto(
        &self,
        atributo: AtributoImpacto,
    ) -> Result<Vec<Impacto>> {
        let sql = format!(
            "SELECT {} FROM impactos WHERE atributo_impacto = ? ORDER BY fecha_impacto DESC",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[atributo.as_ref().into()]).await
    }

    /// Impacts dated within `[desde, hasta]`
    pub async fn find_by_fecha_range(
        &self,
        desde: NaiveDate,
        hasta: NaiveDate,
    ) -> Result<Vec<Impacto>> {
        let sql = format!(
            "SELECT {} FROM impactos WHERE fecha_impacto BETWEEN ? AND ? ORDER BY fecha_impacto DESC",
            COLUMNS
        );
        fetch_all(&self.pool, &sql, &[desde.into(), hasta.into()]).await
    }

    /// Conjunction of the given criteria; `None` is ignored
    #[tracing::instrument(skip(self))]
    pub async fn find_by_filters(
        &self,
        tipo: Option<TipoImpacto>,
        atributo: Option<AtributoImpacto>,
        id_iniciativa: Option<i64>,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
    ) -> Result<Vec<Impacto>> {
        let mut sql = format!("SELECT {} FROM impactos WHERE 1=1", COLUMNS);
        let mut params: Vec<Value> = Vec::new();

        if let Some(tipo) = tipo {
            sql.push_str(" AND tipo_impacto = ?");
            params.push(tipo.as_ref().into());
        }
        if let Some(atributo) = atributo {
            sql.push_str(" AND atributo_impacto = ?");
            params.push(atributo.as_ref().into());
        }
        if let Some(id) = id_iniciativa {
            sql.push_str(" AND id_iniciativa = ?");
            params.push(id.into());
        }
        if let Some(desde) = desde {
            sql.push_str(" AND fecha_impacto >= ?");
            params.push(desde.into());
        }
        if let Some(hasta) = hasta {
            sql.push_str(" AND fecha_impacto <= ?");
            params.push(hasta.into());
        }
        sql.push_str(" ORDER BY fecha_impacto DESC");

        fetch_all(&self.pool, &sql, &params).await
    }

    #[tracing::instrument(skip(self, impacto), fields(id_iniciativa = impacto.id_iniciativa))]
    pub async fn save(&self, impacto: &Impacto) -> Result<i64> {
        let id = insert(
            &self.pool,
            "INSERT INTO impactos (id_iniciativa, fecha_creacion, tipo_impacto, multiplicador, atributo_impacto, fecha_impacto, impacto) VALUES (?, ?, ?, ?, ?, ?, ?)",
            &Self::field_params(impacto),
        )
        .await?;
        tracing::info!(id_impacto = id, "impact created");
        Ok(id)
    }

    pub async fn update(&self, impacto: &Impacto) -> Result<bool> {
        let mut params = Self::field_params(impacto);
        params.push(impacto.id_impacto.into());
        let result = execute(
            &self.pool,
            "UPDATE impactos SET id_iniciativa = ?, fecha_creacion = ?, tipo_impacto = ?, multiplicador = ?, atributo_impacto = ?, fecha_impacto = ?, impacto = ? WHERE id_impacto = ?",
            &params,
        )
        .await?;
        Ok(result.affected_rows > 0)
    }

    pub async fn delete(&self, id_impacto: i64) -> Result<bool> {
        let result = execute(
            &self.pool,
            "DELETE FROM impactos WHERE id_impacto = ?",
            &[id_impacto.into()],
        )
        .await?;
        Ok(result.affected_rows > 0)
    }

    /// Signed total of one attribute within `[desde, hasta]`, zero when empty
    pub async fn sum_by_atributo_and_fecha(
        &self,
        atributo: AtributoImpacto,
        desde: NaiveDate,
        hasta: NaiveDate,
    ) -> Result<Decimal> {
        let value = fetch_scalar(
            &self.pool,
            "SELECT COALESCE(SUM(impacto * multiplicador), 0) FROM impactos WHERE atributo_impacto = ? AND fecha_impacto BETWEEN ? AND ?",
            &[atributo.as_ref().into(), desde.into(), hasta.into()],
        )
        .await?;
        Ok(to_decimal(&value).unwrap_or(Decimal::ZERO))
    }

    /// Count and signed total per type, largest total first
    pub async fn estadisticas_por_tipo(&self) -> Result<Vec<EstadisticaTipo>> {
        fetch_all(
            &self.pool,
            "SELECT tipo_impacto, COUNT(*) AS cantidad, SUM(impacto * multiplicador) AS total FROM impactos GROUP BY tipo_impacto ORDER BY total DESC",
            &[],
        )
        .await
    }

    fn field_params(impacto: &Impacto) -> Vec<Value> {
        vec![
            impacto.id_iniciativa.into(),
            impacto.fecha_creacion.into(),
            impacto.tipo_impacto.as_ref().into(),
            impacto.multiplicador.value().into(),
            impacto.atributo_impacto.as_ref().into(),
            impacto.fecha_impacto.into(),
            Value::Decimal(impacto.impacto.to_string()),
        ]
    }
}
