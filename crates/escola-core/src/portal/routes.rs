//! Portal route table.
//!
//! Every route carries the guards of the elements that wrap it: the
//! authenticated layout contributes a login check and each role area adds a
//! role check taken from the `AccessPolicy`.

use tracing::debug;

use super::access::{AccessPolicy, HOME_PATH};
use super::guard::{authorize_chain, Decision, Guard};
use crate::auth::Session;

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/nao-autorizado";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Home,
    StudentDashboard,
    StudentGrades,
    StudentAbsences,
    CoordinatorDashboard,
    CoordinatorStudents,
    CoordinatorClasses,
    Unauthorized,
    NotFound,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Login => "Portal Escolar",
            View::Home => "Início",
            View::StudentDashboard => "Dashboard do Aluno",
            View::StudentGrades => "Minhas Notas",
            View::StudentAbsences => "Minhas Faltas",
            View::CoordinatorDashboard => "Dashboard da Coordenação",
            View::CoordinatorStudents => "Gerenciar Alunos",
            View::CoordinatorClasses => "Gerenciar Turmas",
            View::Unauthorized => "Acesso não autorizado",
            View::NotFound => "404 - Página Não Encontrada",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(View),
    Redirect { to: String, remember: Option<String> },
}

#[derive(Debug, Clone)]
struct Route {
    path: &'static str,
    view: View,
    guards: Vec<Guard>,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    policy: AccessPolicy,
}

const PAGES: &[(&str, View)] = &[
    (HOME_PATH, View::Home),
    (UNAUTHORIZED_PATH, View::Unauthorized),
    ("/aluno/dashboard", View::StudentDashboard),
    ("/aluno/notas", View::StudentGrades),
    ("/aluno/faltas", View::StudentAbsences),
    ("/coordenador/dashboard", View::CoordinatorDashboard),
    ("/coordenador/alunos", View::CoordinatorStudents),
    ("/coordenador/turmas", View::CoordinatorClasses),
];

impl RouteTable {
    pub fn portal(policy: AccessPolicy) -> Self {
        let mut routes = vec![Route {
            path: LOGIN_PATH,
            view: View::Login,
            guards: Vec::new(),
        }];

        for &(path, view) in PAGES {
            let mut guards = vec![Guard::authenticated()];
            if let Some(roles) = policy.required_roles(path) {
                guards.push(Guard::roles(roles));
            }
            routes.push(Route { path, view, guards });
        }

        Self { routes, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Resolve `requested` for the given session.
    pub fn navigate(&self, session: &Session, requested: &str) -> Navigation {
        let path = normalize(requested);

        let route = match self.routes.iter().find(|route| route.path == path) {
            Some(route) => route,
            None => {
                debug!(path = %path, "No route matched");
                return Navigation::Render(View::NotFound);
            }
        };

        match authorize_chain(&route.guards, session, &path) {
            Decision::Render => Navigation::Render(route.view),
            Decision::RedirectToLogin { remember } => {
                debug!(path = %path, "Not signed in, redirecting to login");
                Navigation::Redirect {
                    to: LOGIN_PATH.to_string(),
                    remember: Some(remember),
                }
            }
            Decision::RedirectToUnauthorized => {
                debug!(path = %path, role = ?session.role(), "Role not allowed");
                Navigation::Redirect {
                    to: UNAUTHORIZED_PATH.to_string(),
                    remember: None,
                }
            }
        }
    }

    /// Follow redirects until a view renders.
    pub fn resolve(&self, session: &Session, requested: &str) -> (View, Option<String>) {
        match self.navigate(session, requested) {
            Navigation::Render(view) => (view, None),
            Navigation::Redirect { to, remember } => match self.navigate(session, &to) {
                Navigation::Render(view) => (view, remember),
                // Redirect targets are login (public) and the unauthorized
                // page (any signed-in user), so a second hop cannot redirect.
                Navigation::Redirect { .. } => (View::Login, remember),
            },
        }
    }
}

/// Where to go once login succeeds.
pub fn after_login_target(remember: Option<&str>) -> String {
    match remember.map(normalize) {
        Some(path) if path != LOGIN_PATH => path,
        _ => HOME_PATH.to_string(),
    }
}

/// Strip query and fragment, force a leading slash, drop trailing slashes.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::{Claims, Role};

    fn signed_in(role: Role) -> Session {
        Session::Authenticated(Claims {
            subject_id: "1".to_string(),
            username: "user".to_string(),
            role,
            display_name: "User".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    fn table() -> RouteTable {
        RouteTable::portal(AccessPolicy::portal_default())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/aluno/dashboard/"), "/aluno/dashboard");
        assert_eq!(normalize("aluno/dashboard"), "/aluno/dashboard");
        assert_eq!(normalize("/coordenador/alunos?page=2#top"), "/coordenador/alunos");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_login_is_public() {
        assert_eq!(
            table().navigate(&Session::Unauthenticated, "/login"),
            Navigation::Render(View::Login)
        );
    }

    #[test]
    fn test_home_requires_login() {
        assert_eq!(
            table().navigate(&Session::Unauthenticated, "/"),
            Navigation::Redirect {
                to: LOGIN_PATH.to_string(),
                remember: Some("/".to_string())
            }
        );
        assert_eq!(table().navigate(&signed_in(Role::Teacher), "/"), Navigation::Render(View::Home));
    }

    #[test]
    fn test_role_areas() {
        let routes = table();
        assert_eq!(
            routes.navigate(&signed_in(Role::Coordinator), "/coordenador/dashboard"),
            Navigation::Render(View::CoordinatorDashboard)
        );
        assert_eq!(
            routes.navigate(&signed_in(Role::Student), "/coordenador/dashboard"),
            Navigation::Redirect {
                to: UNAUTHORIZED_PATH.to_string(),
                remember: None
            }
        );
        assert_eq!(
            routes.navigate(&signed_in(Role::Student), "/aluno/notas/"),
            Navigation::Render(View::StudentGrades)
        );
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        assert_eq!(
            table().navigate(&Session::Unauthenticated, "/secretaria"),
            Navigation::Render(View::NotFound)
        );
    }

    #[test]
    fn test_resolve_follows_redirects() {
        let routes = table();
        assert_eq!(
            routes.resolve(&Session::Unauthenticated, "/aluno/dashboard"),
            (View::Login, Some("/aluno/dashboard".to_string()))
        );
        assert_eq!(
            routes.resolve(&signed_in(Role::Teacher), "/aluno/dashboard"),
            (View::Unauthorized, None)
        );
    }

    #[test]
    fn test_every_menu_entry_has_a_route() {
        let routes = table();
        for area in routes.policy().areas() {
            let session = signed_in(area.role.clone());
            for entry in routes.policy().nav_entries(&area.role) {
                assert!(
                    matches!(routes.navigate(&session, &entry.path), Navigation::Render(v) if v != View::NotFound),
                    "{} cannot open {}",
                    area.role,
                    entry.path
                );
            }
        }
    }

    #[test]
    fn test_after_login_target() {
        assert_eq!(after_login_target(Some("/coordenador/dashboard")), "/coordenador/dashboard");
        assert_eq!(after_login_target(Some("/login")), "/");
        assert_eq!(after_login_target(None), "/");
    }
}
