//! Domain records stored in the `usuarios`, `iniciativas` and `impactos` tables
//!
//! Enumerations render to (and parse from) exactly the strings kept in the
//! database columns.

use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Role of a user account
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Rol {
    Admin,
    Analista,
    Viewer,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usuario {
    pub id_usuario: i64,
    pub nombre_completo: String,
    pub email: String,
    /// Base64 SHA-256 digest, see [`crate::password`]
    #[serde(skip)]
    pub password_hash: String,
    pub rol: Rol,
    pub activo: bool,
}

/// Data needed to create a user; the password is given in clear text and
/// hashed by the repository
#[derive(Debug, Clone)]
pub struct NuevoUsuario {
    pub nombre_completo: String,
    pub email: String,
    pub password: String,
    pub rol: Rol,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum EstadoIniciativa {
    #[strum(serialize = "planeado")]
    #[serde(rename = "planeado")]
    Planeado,
    #[strum(serialize = "en curso")]
    #[serde(rename = "en curso")]
    EnCurso,
    #[strum(serialize = "finalizado")]
    #[serde(rename = "finalizado")]
    Finalizado,
    #[strum(serialize = "cancelado")]
    #[serde(rename = "cancelado")]
    Cancelado,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Riesgo {
    Alto,
    Medio,
    Bajo,
}

/// A tracked business initiative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iniciativa {
    pub id_iniciativa: i64,
    pub nombre: String,
    pub descripcion: String,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub tipo: String,
    pub estado: EstadoIniciativa,
    pub riesgo: Riesgo,
    pub id_owner: Option<i64>,
    pub fecha_registro: NaiveDateTime,
}

impl Iniciativa {
    /// A new, unsaved initiative in state `planeado` with medium risk
    pub fn nueva(nombre: impl Into<String>, tipo: impl Into<String>) -> Self {
        Self {
            id_iniciativa: 0,
            nombre: nombre.into(),
            descripcion: String::new(),
            fecha_inicio: None,
            fecha_fin: None,
            tipo: tipo.into(),
            estado: EstadoIniciativa::Planeado,
            riesgo: Riesgo::Medio,
            id_owner: None,
            fecha_registro: Local::now().naive_local(),
        }
    }

    pub fn is_owned_by(&self, id_usuario: i64) -> bool {
        self.id_owner == Some(id_usuario)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum TipoImpacto {
    Maquinaria,
    #[strum(to_string = "Generación", serialize = "Generacion")]
    #[serde(rename = "Generación")]
    Generacion,
    #[strum(to_string = "Optimización", serialize = "Optimizacion")]
    #[serde(rename = "Optimización")]
    Optimizacion,
    #[strum(to_string = "Transformación", serialize = "Transformacion")]
    #[serde(rename = "Transformación")]
    Transformacion,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum AtributoImpacto {
    Planeado,
    Estimado,
    Real,
}

/// Sign applied to an impact amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i64")]
pub enum Multiplicador {
    Positivo,
    Negativo,
}

impl Multiplicador {
    pub fn value(self) -> i32 {
        match self {
            Multiplicador::Positivo => 1,
            Multiplicador::Negativo => -1,
        }
    }
}

impl From<Multiplicador> for i32 {
    fn from(m: Multiplicador) -> Self {
        m.value()
    }
}

impl TryFrom<i64> for Multiplicador {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Multiplicador::Positivo),
            -1 => Ok(Multiplicador::Negativo),
            other => Err(format!("multiplicador must be 1 or -1, got {}", other)),
        }
    }
}

impl std::fmt::Display for Multiplicador {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Multiplicador::Positivo => f.write_str("+1"),
            Multiplicador::Negativo => f.write_str("-1"),
        }
    }
}

impl std::str::FromStr for Multiplicador {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s
            .trim()
            .trim_start_matches('+')
            .parse()
            .map_err(|_| format!("invalid multiplicador '{}'", s))?;
        Self::try_from(n)
    }
}

/// A financial impact recorded against an initiative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impacto {
    pub id_impacto: i64,
    pub id_iniciativa: i64,
    pub fecha_creacion: NaiveDate,
    pub tipo_impacto: TipoImpacto,
    pub multiplicador: Multiplicador,
    pub atributo_impacto: AtributoImpacto,
    pub fecha_impacto: NaiveDate,
    pub impacto: Decimal,
}

impl Impacto {
    /// A new, unsaved impact created today
    pub fn nuevo(
        id_iniciativa: i64,
        tipo_impacto: TipoImpacto,
        atributo_impacto: AtributoImpacto,
        multiplicador: Multiplicador,
        fecha_impacto: NaiveDate,
        impacto: Decimal,
    ) -> Self {
        Self {
            id_impacto: 0,
            id_iniciativa,
            fecha_creacion: Local::now().date_naive(),
            tipo_impacto,
            multiplicador,
            atributo_impacto,
            fecha_impacto,
            impacto,
        }
    }

    /// The amount with its sign applied
    pub fn impacto_calculado(&self) -> Decimal {
        self.impacto * Decimal::from(self.multiplicador.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stored_strings() {
        assert_eq!(EstadoIniciativa::EnCurso.to_string(), "en curso");
        assert_eq!(
            EstadoIniciativa::from_str("EN CURSO").unwrap(),
            EstadoIniciativa::EnCurso
        );
        assert_eq!(Rol::Analista.as_ref(), "analista");
        assert_eq!(Riesgo::from_str("alto").unwrap(), Riesgo::Alto);
        assert_eq!(TipoImpacto::Generacion.to_string(), "Generación");
        assert_eq!(
            TipoImpacto::from_str("optimizacion").unwrap(),
            TipoImpacto::Optimizacion
        );
        assert_eq!(AtributoImpacto::Real.to_string(), "Real");
        assert!(Rol::from_str("superuser").is_err());
    }

    #[test]
    fn test_multiplicador() {
        assert_eq!(Multiplicador::try_from(-1).unwrap(), Multiplicador::Negativo);
        assert!(Multiplicador::try_from(0).is_err());
        assert_eq!("+1".parse::<Multiplicador>().unwrap(), Multiplicador::Positivo);
        assert_eq!(Multiplicador::Negativo.to_string(), "-1");
    }

    #[test]
    fn test_impacto_calculado_applies_sign() {
        let fecha = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut impacto = Impacto::nuevo(
            1,
            TipoImpacto::Maquinaria,
            AtributoImpacto::Real,
            Multiplicador::Negativo,
            fecha,
            Decimal::new(150_050, 2),
        );
        assert_eq!(impacto.impacto_calculado(), Decimal::new(-150_050, 2));

        impacto.multiplicador = Multiplicador::Positivo;
        assert_eq!(impacto.impacto_calculado(), Decimal::new(150_050, 2));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let usuario = Usuario {
            id_usuario: 1,
            nombre_completo: "Administrador".into(),
            email: "admin@finimpact.com".into(),
            password_hash: "secret-hash".into(),
            rol: Rol::Admin,
            activo: true,
        };
        let json = serde_json::to_string(&usuario).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"rol\":\"admin\""));
    }
}
