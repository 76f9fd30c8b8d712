//! Role-based access policy.
//!
//! One table decides both which paths a role may open and which links its
//! navigation menu shows, so the menu can never offer a page the guard would
//! refuse.

use crate::auth::{Claims, Role};

pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub path: String,
}

impl NavEntry {
    pub fn new(label: &str, path: &str) -> Self {
        Self {
            label: label.to_string(),
            path: path.to_string(),
        }
    }
}

/// Paths under `section` belong to `role`.
#[derive(Debug, Clone)]
pub struct RoleArea {
    pub role: Role,
    pub section: String,
    pub entries: Vec<NavEntry>,
}

impl RoleArea {
    fn contains(&self, path: &str) -> bool {
        path == self.section
            || path
                .strip_prefix(self.section.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Rendered header and sidebar for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub greeting: String,
    pub entries: Vec<NavEntry>,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    common: Vec<NavEntry>,
    areas: Vec<RoleArea>,
}

impl AccessPolicy {
    pub fn new(common: Vec<NavEntry>, areas: Vec<RoleArea>) -> Self {
        Self { common, areas }
    }

    /// Areas and links of the school portal. Teachers have no dedicated area
    /// yet and only see the home hub.
    pub fn portal_default() -> Self {
        Self::new(
            vec![NavEntry::new("Início", HOME_PATH)],
            vec![
                RoleArea {
                    role: Role::Student,
                    section: "/aluno".to_string(),
                    entries: vec![
                        NavEntry::new("Meu Dashboard", "/aluno/dashboard"),
                        NavEntry::new("Minhas Notas", "/aluno/notas"),
                        NavEntry::new("Minhas Faltas", "/aluno/faltas"),
                    ],
                },
                RoleArea {
                    role: Role::Coordinator,
                    section: "/coordenador".to_string(),
                    entries: vec![
                        NavEntry::new("Dashboard Coordenação", "/coordenador/dashboard"),
                        NavEntry::new("Gerenciar Alunos", "/coordenador/alunos"),
                        NavEntry::new("Gerenciar Turmas", "/coordenador/turmas"),
                    ],
                },
            ],
        )
    }

    pub fn areas(&self) -> &[RoleArea] {
        &self.areas
    }

    /// Roles allowed to open `path`; `None` when any signed-in user may.
    pub fn required_roles(&self, path: &str) -> Option<Vec<Role>> {
        let roles: Vec<Role> = self
            .areas
            .iter()
            .filter(|area| area.contains(path))
            .map(|area| area.role.clone())
            .collect();

        if roles.is_empty() {
            None
        } else {
            Some(roles)
        }
    }

    pub fn can_access(&self, role: &Role, path: &str) -> bool {
        self.required_roles(path)
            .map_or(true, |roles| roles.contains(role))
    }

    /// Links for `role`: the shared entries first, then the role's own.
    pub fn nav_entries(&self, role: &Role) -> Vec<NavEntry> {
        let mut entries = self.common.clone();
        for area in self.areas.iter().filter(|area| &area.role == role) {
            entries.extend(area.entries.iter().cloned());
        }
        entries
    }

    pub fn menu(&self, claims: &Claims) -> Menu {
        Menu {
            greeting: format!("Olá, {}", claims.display_name),
            entries: self.nav_entries(&claims.role),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::portal_default()
    }
}
