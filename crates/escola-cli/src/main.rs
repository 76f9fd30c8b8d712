//! Portal Escolar - terminal client for the school portal.
//!
//! Logs in against the portal API, keeps the access token between runs, and
//! shows which page a path resolves to for the signed-in user.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use escola_core::auth::AuthManager;
use escola_core::portal::{LoginForm, SubmitError};
use escola_core::{ApiClient, ApiError, Config, RouteTable, AccessPolicy, Navigation, Session};

const USAGE: &str = "\
Usage: escola <command> [args]

Commands:
  login [username]   Sign in (password is prompted, or read from ESCOLA_PASSWORD)
  logout             Sign out and forget the stored token
  whoami             Show the signed-in user
  menu               Show the navigation menu for the signed-in user
  open <path>        Show what the portal renders for <path>
  get <api-path>     Authenticated GET against the API, printed as JSON";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

struct Portal {
    config: Config,
    api: ApiClient,
    auth: AuthManager,
    routes: RouteTable,
}

impl Portal {
    fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api = ApiClient::new(&config.api_base_url(), config.request_timeout_secs())
            .context("Failed to build HTTP client")?;
        let store = config.open_store()?;

        let mut auth = AuthManager::new(store, Arc::new(api.clone()));
        auth.initialize();

        Ok(Self {
            config,
            api,
            auth,
            routes: RouteTable::portal(AccessPolicy::portal_default()),
        })
    }

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username
            .or_else(|| std::env::var("ESCOLA_USERNAME").ok())
            .or_else(|| self.config.last_username.clone())
        {
            Some(name) => name,
            None => prompt_username()?,
        };

        let password = match std::env::var("ESCOLA_PASSWORD") {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Senha: ")?,
        };

        let mut form = LoginForm::new(None);
        form.username = username.clone();
        form.password = password;

        match form.submit(&mut self.auth).await {
            Ok(target) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                if let Some(user) = self.auth.current_user() {
                    println!("Bem-vindo, {} ({})", user.display_name, user.role);
                }
                self.print_navigation(&target);
                Ok(())
            }
            Err(SubmitError::Failed(message)) => Err(anyhow::anyhow!(message)),
            Err(e) => Err(e.into()),
        }
    }

    fn whoami(&self) {
        match self.auth.session() {
            Session::Authenticated(user) => {
                println!("{} <{}>", user.display_name, user.username);
                println!("  id:     {}", user.subject_id);
                println!("  cargo:  {}", user.role);
                println!("  expira: {}", user.expires_at.to_rfc3339());
            }
            Session::Unauthenticated => println!("Não autenticado."),
        }
    }

    fn menu(&self) {
        match self.auth.current_user() {
            Some(user) => {
                let menu = self.routes.policy().menu(&user);
                println!("{}", menu.greeting);
                for entry in menu.entries {
                    println!("  {:<24} {}", entry.label, entry.path);
                }
            }
            None => println!("Não autenticado."),
        }
    }

    fn print_navigation(&self, path: &str) {
        let session = self.auth.session();
        match self.routes.navigate(&session, path) {
            Navigation::Render(view) => println!("{} -> {}", path, view.title()),
            Navigation::Redirect { to, remember } => {
                let (view, _) = self.routes.resolve(&session, path);
                match remember {
                    Some(from) => println!("{} -> redirect {} (return to {}) -> {}", path, to, from, view.title()),
                    None => println!("{} -> redirect {} -> {}", path, to, view.title()),
                }
            }
        }
    }

    async fn get(&mut self, path: &str) -> Result<()> {
        let authorizer = self.auth.authorizer();
        match self.api.get_json::<serde_json::Value>(path, &authorizer).await {
            Ok(value) => {
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Err(ApiError::Unauthorized) => {
                // The server no longer accepts the token.
                self.auth.logout();
                Err(anyhow::anyhow!("Sessão expirada. Faça login novamente."))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn prompt_username() -> Result<String> {
    print!("Usuário (Matrícula/CPF): ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let mut portal = Portal::new()?;
    portal.auth.revalidate();
    info!(command = command, authenticated = portal.auth.is_authenticated(), "Portal client starting");

    match command {
        "login" => portal.login(args.get(1).cloned()).await?,
        "logout" => {
            portal.auth.logout();
            println!("Sessão encerrada.");
        }
        "whoami" => portal.whoami(),
        "menu" => portal.menu(),
        "open" => {
            let path = args.get(1).map(String::as_str).unwrap_or("/");
            portal.print_navigation(path);
        }
        "get" => {
            let path = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("get requires an API path, e.g. /api/boletim/"))?;
            portal.get(path).await?;
        }
        "-h" | "--help" | "help" => println!("{}", USAGE),
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
