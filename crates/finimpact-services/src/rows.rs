//! Decoding of result rows into domain records

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use finimpact_core::{FinImpactError, QueryResult, Result, Row, Value};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Impacto, Iniciativa, Usuario};

/// Records that can be built from a result row
pub(crate) trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

pub(crate) fn decode_all<T: FromRow>(result: &QueryResult) -> Result<Vec<T>> {
    result.rows.iter().map(T::from_row).collect()
}

pub(crate) fn decode_first<T: FromRow>(result: &QueryResult) -> Result<Option<T>> {
    result.rows.first().map(T::from_row).transpose()
}

fn column<'a>(row: &'a Row, name: &str) -> Result<&'a Value> {
    row.get_by_name(name)
        .ok_or_else(|| FinImpactError::Query(format!("column '{}' missing from result", name)))
}

fn mismatch(name: &str, value: &Value, expected: &str) -> FinImpactError {
    FinImpactError::Query(format!(
        "column '{}' holds {:?}, expected {}",
        name, value, expected
    ))
}

fn int(row: &Row, name: &str) -> Result<i64> {
    let value = column(row, name)?;
    value.as_i64().ok_or_else(|| mismatch(name, value, "an integer"))
}

fn opt_int(row: &Row, name: &str) -> Result<Option<i64>> {
    match column(row, name)? {
        Value::Null => Ok(None),
        value => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| mismatch(name, value, "an integer")),
    }
}

fn text(row: &Row, name: &str) -> Result<String> {
    match column(row, name)? {
        Value::Null => Ok(String::new()),
        value => value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(name, value, "text")),
    }
}

fn boolean(row: &Row, name: &str) -> Result<bool> {
    let value = column(row, name)?;
    value.as_bool().ok_or_else(|| mismatch(name, value, "a boolean"))
}

fn parsed<T: FromStr>(row: &Row, name: &str) -> Result<T> {
    let raw = text(row, name)?;
    raw.trim()
        .parse()
        .map_err(|_| FinImpactError::Query(format!("column '{}' has unknown value '{}'", name, raw)))
}

fn date(row: &Row, name: &str) -> Result<NaiveDate> {
    let value = column(row, name)?;
    value.as_date().ok_or_else(|| mismatch(name, value, "a date"))
}

fn opt_date(row: &Row, name: &str) -> Result<Option<NaiveDate>> {
    match column(row, name)? {
        Value::Null => Ok(None),
        value => value
            .as_date()
            .map(Some)
            .ok_or_else(|| mismatch(name, value, "a date")),
    }
}

fn datetime(row: &Row, name: &str) -> Result<NaiveDateTime> {
    let value = column(row, name)?;
    value
        .as_datetime()
        .ok_or_else(|| mismatch(name, value, "a timestamp"))
}

/// Convert a numeric column value into a two-decimal amount
///
/// SQL Server returns DECIMAL columns as exact text. SQLite stores them with
/// numeric affinity and hands back integers or floats.
pub(crate) fn to_decimal(value: &Value) -> Option<Decimal> {
    let decimal = match value {
        Value::Null => Some(Decimal::ZERO),
        Value::Decimal(s) | Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Float32(f) => Decimal::try_from(*f as f64).ok(),
        Value::Float64(f) => Decimal::try_from(*f).ok(),
        other => other.as_i64().map(Decimal::from),
    }?;
    Some(decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

pub(crate) fn decimal(row: &Row, name: &str) -> Result<Decimal> {
    let value = column(row, name)?;
    to_decimal(value).ok_or_else(|| mismatch(name, value, "a decimal"))
}

impl FromRow for Usuario {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Usuario {
            id_usuario: int(row, "id_usuario")?,
            nombre_completo: text(row, "nombre_completo")?,
            email: text(row, "email")?,
            password_hash: text(row, "password")?,
            rol: parsed(row, "rol")?,
            activo: boolean(row, "estado")?,
        })
    }
}

impl FromRow for Iniciativa {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Iniciativa {
            id_iniciativa: int(row, "id_iniciativa")?,
            nombre: text(row, "nombre")?,
            descripcion: text(row, "descripcion")?,
            fecha_inicio: opt_date(row, "fecha_inicio")?,
            fecha_fin: opt_date(row, "fecha_fin")?,
            tipo: text(row, "tipo")?,
            estado: parsed(row, "estado")?,
            riesgo: parsed(row, "riesgo")?,
            id_owner: opt_int(row, "id_owner")?,
            fecha_registro: datetime(row, "fecha_registro")?,
        })
    }
}

impl FromRow for Impacto {
    fn from_row(row: &Row) -> Result<Self> {
        let multiplicador = int(row, "multiplicador")?;
        Ok(Impacto {
            id_impacto: int(row, "id_impacto")?,
            id_iniciativa: int(row, "id_iniciativa")?,
            fecha_creacion: date(row, "fecha_creacion")?,
            tipo_impacto: parsed(row, "tipo_impacto")?,
            multiplicador: multiplicador.try_into().map_err(FinImpactError::Query)?,
            atributo_impacto: parsed(row, "atributo_impacto")?,
            fecha_impacto: date(row, "fecha_impacto")?,
            impacto: decimal(row, "impacto")?,
        })
    }
}
