//! FinImpact Services Layer
//!
//! Business operations over the pooled database: repositories for the three
//! application tables and role-aware services on top of them.
//!
//! # Architecture
//!
//! ```text
//! Front end (finimpact-cli)
//!     ↓
//! Service Layer (finimpact-services) ← This crate
//!     ↓
//! Repositories (finimpact-services::repository)
//!     ↓
//! Pool + drivers (finimpact-connection, finimpact-drivers)
//! ```
//!
//! # Services
//!
//! - [`AuthService`] - email/password sign-in producing a [`Session`]
//! - [`PerfilService`] - password change for the signed-in user
//! - [`IniciativaService`] - initiatives, scoped by role
//! - [`ImpactoService`] - impacts, scoped through their initiative
//! - [`UsuarioService`] - user administration (admin only)
//! - [`DashboardService`] - filtered loading and [`DashboardMetrics`]
//!
//! Every service call takes the [`Session`] explicitly; there is no global
//! "current user".

mod auth_service;
mod dashboard;
mod error;
mod impacto_service;
mod iniciativa_service;
pub mod models;
pub mod password;
mod perfil_service;
pub mod repository;
mod rows;
pub mod schema;
pub mod seed;
mod session;
mod usuario_service;

pub use auth_service::{AuthService, is_valid_email, validate_credentials};
pub use dashboard::{DashboardData, DashboardFilter, DashboardMetrics, DashboardService};
pub use error::{ServiceError, ServiceResult};
pub use impacto_service::{ImpactoFilter, ImpactoService};
pub use iniciativa_service::{IniciativaFilter, IniciativaService};
pub use models::{
    AtributoImpacto, EstadoIniciativa, Impacto, Iniciativa, Multiplicador, NuevoUsuario, Riesgo,
    Rol, TipoImpacto, Usuario,
};
pub use perfil_service::PerfilService;
pub use repository::{EstadisticaTipo, ImpactoRepository, IniciativaRepository, UsuarioRepository};
pub use session::{Scope, Session};
pub use usuario_service::{UsuarioFilter, UsuarioService};

use finimpact_connection::ConnectionPool;

/// All repositories and services wired to one pool
#[derive(Clone, Debug)]
pub struct Services {
    pub usuarios: UsuarioRepository,
    pub iniciativas: IniciativaRepository,
    pub impactos: ImpactoRepository,
    pub auth: AuthService,
    pub perfil: PerfilService,
    pub iniciativa: IniciativaService,
    pub impacto: ImpactoService,
    pub usuario: UsuarioService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(pool: ConnectionPool) -> Self {
        let usuarios = UsuarioRepository::new(pool.clone());
        let iniciativas = IniciativaRepository::new(pool.clone());
        let impactos = ImpactoRepository::new(pool);
        Self {
            auth: AuthService::new(usuarios.clone()),
            perfil: PerfilService::new(usuarios.clone()),
            iniciativa: IniciativaService::new(iniciativas.clone()),
            impacto: ImpactoService::new(impactos.clone(), iniciativas.clone()),
            usuario: UsuarioService::new(usuarios.clone()),
            dashboard: DashboardService::new(iniciativas.clone(), impactos.clone()),
            usuarios,
            iniciativas,
            impactos,
        }
    }
}
