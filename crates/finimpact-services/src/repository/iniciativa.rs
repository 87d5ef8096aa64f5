use finimpact_connection::ConnectionPool;
use finimpact_core::{Result, Value};

use super::{execute, fetch_all, fetch_one, fetch_scalar, insert};
use crate::models::{EstadoIniciativa, Iniciativa, Riesgo};

const SELECT: &str = "SELECT id_iniciativa, nombre, descripcion, fecha_inicio, fecha_fin, tipo, estado, riesgo, id_owner, fecha_registro FROM iniciativas";

/// Access to the `iniciativas` table
#[derive(Clone, Debug)]
pub struct IniciativaRepository {
    pool: ConnectionPool,
}

impl IniciativaRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// All initiatives, newest first
    pub async fn find_all(&self) -> Result<Vec<Iniciativa>> {
        let sql = format!("{} ORDER BY fecha_registro DESC", SELECT);
        fetch_all(&self.pool, &sql, &[]).await
    }

    pub async fn find_by_id(&self, id_iniciativa: i64) -> Result<Option<Iniciativa>> {
        let sql = format!("{} WHERE id_iniciativa = ?", SELECT);
        fetch_one(&self.pool, &sql, &[id_iniciativa.into()]).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_owner(&self, id_owner: i64) -> Result<Vec<Iniciativa>> {
        let sql = format!("{} WHERE id_owner = ? ORDER BY fecha_registro DESC", SELECT);
        fetch_all(&self.pool, &sql, &[id_owner.into()]).await
    }

    pub async fn find_by_estado(&self, estado: EstadoIniciativa) -> Result<Vec<Iniciativa>> {
        let sql = format!("{} WHERE estado = ? ORDER BY fecha_registro DESC", SELECT);
        fetch_all(&self.pool, &sql, &[estado.as_ref().into()]).await
    }

    /// Initiatives whose name matches exactly
    pub async fn find_by_name(&self, nombre: &str) -> Result<Vec<Iniciativa>> {
        let sql = format!("{} WHERE nombre = ? ORDER BY fecha_registro DESC", SELECT);
        fetch_all(&self.pool, &sql, &[nombre.into()]).await
    }

    pub async fn find_by_owner_and_name(
        &self,
        id_owner: i64,
        nombre: &str,
    ) -> Result<Vec<Iniciativa>> {
        let sql = format!(
            "{} WHERE id_owner = ? AND nombre = ? ORDER BY fecha_registro DESC",
            SELECT
        );
        fetch_all(&self.pool, &sql, &[id_owner.into(), nombre.into()]).await
    }

    /// Conjunction of the given criteria; `None` and blank values are ignored
    #[tracing::instrument(skip(self))]
    pub async fn find_by_filters(
        &self,
        estado: Option<EstadoIniciativa>,
        tipo: Option<&str>,
        riesgo: Option<Riesgo>,
        id_owner: Option<i64>,
    ) -> Result<Vec<Iniciativa>> {
        let mut sql = format!("{} WHERE 1=1", SELECT);
        let mut params: Vec<Value> = Vec::new();

        if let Some(estado) = estado {
            sql.push_str(" AND estado = ?");
            params.push(estado.as_ref().into());
        }
        if let Some(tipo) = tipo.map(str::trim).filter(|t| !t.is_empty()) {
            sql.push_str(" AND tipo = ?");
            params.push(tipo.into());
        }
        if let Some(riesgo) = riesgo {
            sql.push_str(" AND riesgo = ?");
            params.push(riesgo.as_ref().into());
        }
        if let Some(id_owner) = id_owner {
            sql.push_str(" AND id_owner = ?");
            params.push(id_owner.into());
        }
        sql.push_str(" ORDER BY fecha_registro DESC");

        fetch_all(&self.pool, &sql, &params).await
    }

    /// Insert and return the new id; `fecha_registro` is set by the database
    #[tracing::instrument(skip(self, iniciativa), fields(nombre = %iniciativa.nombre))]
    pub async fn save(&self, iniciativa: &Iniciativa) -> Result<i64> {
        let id = insert(
            &self.pool,
            "INSERT INTO iniciativas (nombre, descripcion, fecha_inicio, fecha_fin, tipo, estado, riesgo, id_owner) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            &Self::field_params(iniciativa),
        )
        .await?;
        tracing::info!(id_iniciativa = id, "initiative created");
        Ok(id)
    }

    pub async fn update(&self, iniciativa: &Iniciativa) -> Result<bool> {
        let mut params = Self::field_params(iniciativa);
        params.push(iniciativa.id_iniciativa.into());
        let result = execute(
            &self.pool,
            "UPDATE iniciativas SET nombre = ?, descripcion = ?, fecha_inicio = ?, fecha_fin = ?, tipo = ?, estado = ?, riesgo = ?, id_owner = ? WHERE id_iniciativa = ?",
            &params,
        )
        .await?;
        Ok(result.affected_rows > 0)
    }

    pub async fn delete(&self, id_iniciativa: i64) -> Result<bool> {
        let result = execute(
            &self.pool,
            "DELETE FROM iniciativas WHERE id_iniciativa = ?",
            &[id_iniciativa.into()],
        )
        .await?;
        Ok(result.affected_rows > 0)
    }

    /// Number of initiatives in state `en curso`
    pub async fn count_activas(&self) -> Result<i64> {
        let value = fetch_scalar(
            &self.pool,
            "SELECT COUNT(*) FROM iniciativas WHERE estado = 'en curso'",
            &[],
        )
        .await?;
        Ok(value.as_i64().unwrap_or(0))
    }

    /// Set the owner of every initiative with this exact name
    pub async fn assign_owner_by_name(&self, id_owner: i64, nombre: &str) -> Result<u64> {
        let result = execute(
            &self.pool,
            "UPDATE iniciativas SET id_owner = ? WHERE nombre = ?",
            &[id_owner.into(), nombre.into()],
        )
        .await?;
        Ok(result.affected_rows)
    }

    fn field_params(iniciativa: &Iniciativa) -> Vec<Value> {
        vec![
            iniciativa.nombre.as_str().into(),
            iniciativa.descripcion.as_str().into(),
            iniciativa.fecha_inicio.into(),
            iniciativa.fecha_fin.into(),
            iniciativa.tipo.as_str().into(),
            iniciativa.estado.as_ref().into(),
            iniciativa.riesgo.as_ref().into(),
            iniciativa.id_owner.into(),
        ]
    }
}
