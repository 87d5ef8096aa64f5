//! The signed-in user and what their role allows

use crate::models::{Rol, Usuario};

/// Which initiatives a session may see and change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Only initiatives owned by this user id
    Owner(i64),
}

/// An authenticated user, passed explicitly to every service call
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    usuario: Usuario,
}

impl Session {
    pub fn new(usuario: Usuario) -> Self {
        Self { usuario }
    }

    pub fn usuario(&self) -> &Usuario {
        &self.usuario
    }

    pub fn id_usuario(&self) -> i64 {
        self.usuario.id_usuario
    }

    pub fn rol(&self) -> Rol {
        self.usuario.rol
    }

    pub fn is_admin(&self) -> bool {
        self.usuario.rol == Rol::Admin
    }

    pub fn is_analista(&self) -> bool {
        self.usuario.rol == Rol::Analista
    }

    pub fn is_viewer(&self) -> bool {
        self.usuario.rol == Rol::Viewer
    }

    /// Viewers are read-only
    pub fn can_modify(&self) -> bool {
        !self.is_viewer()
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_admin()
    }

    /// Analysts work on their own initiatives, everyone else sees all
    pub fn scope(&self) -> Scope {
        if self.is_analista() {
            Scope::Owner(self.usuario.id_usuario)
        } else {
            Scope::All
        }
    }

    /// Whether the session may see or change an initiative with this owner
    pub fn may_access(&self, id_owner: Option<i64>) -> bool {
        match self.scope() {
            Scope::All => true,
            Scope::Owner(id) => id_owner == Some(id),
        }
    }

    /// Replace the cached user record, e.g. after a password change
    pub(crate) fn refresh(&mut self, usuario: Usuario) {
        self.usuario = usuario;
    }
}
