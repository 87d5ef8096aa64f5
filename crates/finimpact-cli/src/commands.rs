//! Command handlers
//!
//! Each handler signs in when it acts on behalf of a user, calls one service
//! operation and renders the result. The pool is opened once per run and
//! shut down before the process exits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use finimpact_connection::{ConnectionPool, DatabaseSettings, DriverConnectionFactory};
use finimpact_drivers::{DriverRegistry, TaskRunner};
use finimpact_services::seed::{DEFAULT_ANALYST_INITIATIVES, assign_initiatives, seed_default_users};
use finimpact_services::{
    DashboardData, DashboardFilter, DashboardService, Impacto, ImpactoFilter, Iniciativa,
    IniciativaFilter, Multiplicador, NuevoUsuario, Services, Session, UsuarioFilter, schema,
};
use serde_json::json;

use crate::output;
use crate::{
    Cli, Command, Credentials, ImpactCommand, InitiativeCommand, NewImpact, NewInitiative,
    UserCommand,
};

pub async fn run(cli: Cli, runner: &TaskRunner) -> Result<()> {
    let Cli {
        config,
        credentials,
        json,
        command,
        ..
    } = cli;

    let settings = load_settings(config)?;
    let pool = open_pool(&settings).await?;
    let services = Services::new(pool.clone());
    let ctx = RunContext {
        services,
        credentials,
        json,
    };

    let result = dispatch(&ctx, &pool, runner, command).await;
    pool.shutdown().await;
    result
}

/// State shared by the handlers of one run
struct RunContext {
    services: Services,
    credentials: Credentials,
    json: bool,
}

impl RunContext {
    async fn sign_in(&self) -> Result<Session> {
        let email = self
            .credentials
            .email
            .as_deref()
            .context("--email (or FINIMPACT_EMAIL) is required for this command")?;
        let password = self
            .credentials
            .password
            .as_deref()
            .context("--password (or FINIMPACT_PASSWORD) is required for this command")?;
        Ok(self.services.auth.login(email, password).await?)
    }

    fn created(&self, what: &str, id: i64) -> Result<()> {
        if self.json {
            println!("{}", json!({ "id": id }));
        } else {
            println!("Created {} {}", what, id);
        }
        Ok(())
    }
}

fn load_settings(config: Option<PathBuf>) -> Result<DatabaseSettings> {
    let path = match config {
        Some(path) => path,
        None => DatabaseSettings::default_path()
            .context("no config directory on this platform; pass --config")?,
    };
    load_settings_from(&path)
}

fn load_settings_from(path: &Path) -> Result<DatabaseSettings> {
    DatabaseSettings::load(path)
        .with_context(|| format!("failed to load database settings from {}", path.display()))
}

async fn open_pool(settings: &DatabaseSettings) -> Result<ConnectionPool> {
    let registry = DriverRegistry::with_defaults();
    let factory = DriverConnectionFactory::from_settings(&registry, settings)?;
    let target = factory.describe();

    let pool = ConnectionPool::new(settings.pool_config(), factory);
    pool.initialize()
        .await
        .with_context(|| format!("failed to open the connection pool for {}", target))?;
    tracing::info!(%target, size = pool.config().size(), "connection pool ready");
    Ok(pool)
}

async fn dispatch(
    ctx: &RunContext,
    pool: &ConnectionPool,
    runner: &TaskRunner,
    command: Command,
) -> Result<()> {
    match command {
        Command::InitDb => init_db(pool).await,
        Command::SeedUsers => seed_users(ctx).await,
        Command::Assign { analyst, names } => assign(ctx, &analyst, &names).await,
        Command::Login => login(ctx).await,
        Command::Password {
            nueva,
            confirmacion,
        } => change_password(ctx, &nueva, &confirmacion).await,
        Command::Users { action } => users(ctx, action).await,
        Command::Initiatives { action } => initiatives(ctx, action).await,
        Command::Impacts { action } => impacts(ctx, action).await,
        Command::Dashboard { owner, name } => dashboard(ctx, runner, owner, name).await,
        Command::PoolCheck => pool_check(ctx, pool).await,
    }
}

async fn init_db(pool: &ConnectionPool) -> Result<()> {
    let conn = pool.acquire().await?;
    schema::ensure_schema(&*conn)
        .await
        .context("failed to create the schema")?;
    println!("Schema ready ({})", conn.driver_name());
    Ok(())
}

async fn seed_users(ctx: &RunContext) -> Result<()> {
    let created = seed_default_users(&ctx.services.usuarios).await?;
    if ctx.json {
        println!("{}", json!({ "created": created }));
    } else if created.is_empty() {
        println!("Default users already exist");
    } else {
        for email in created {
            println!("Created {}", email);
        }
    }
    Ok(())
}

async fn assign(ctx: &RunContext, analyst: &str, names: &[String]) -> Result<()> {
    let names: Vec<&str> = if names.is_empty() {
        DEFAULT_ANALYST_INITIATIVES.to_vec()
    } else {
        names.iter().map(String::as_str).collect()
    };
    let assigned = assign_initiatives(
        &ctx.services.usuarios,
        &ctx.services.iniciativas,
        analyst,
        &names,
    )
    .await?;

    if ctx.json {
        println!("{}", json!({ "assigned": assigned }));
    } else {
        println!(
            "Assigned {} of {} initiatives to {}",
            assigned.len(),
            names.len(),
            analyst
        );
    }
    Ok(())
}

async fn login(ctx: &RunContext) -> Result<()> {
    let session = ctx.sign_in().await?;
    output::emit(
        ctx.json,
        std::slice::from_ref(session.usuario()),
        output::usuarios,
    )
}

async fn change_password(ctx: &RunContext, nueva: &str, confirmacion: &str) -> Result<()> {
    let mut session = ctx.sign_in().await?;
    let actual = ctx.credentials.password.as_deref().unwrap_or_default();
    ctx.services
        .perfil
        .change_password(&mut session, actual, nueva, confirmacion)
        .await?;
    println!("Password updated");
    Ok(())
}

async fn users(ctx: &RunContext, action: UserCommand) -> Result<()> {
    let session = ctx.sign_in().await?;
    let service = &ctx.services.usuario;
    match action {
        UserCommand::List { role, search } => {
            let filter = UsuarioFilter { rol: role, texto: search };
            let usuarios = filter.apply(&service.list(&session).await?);
            output::emit(ctx.json, usuarios.as_slice(), output::usuarios)
        }
        UserCommand::Create {
            name,
            user_email,
            user_password,
            role,
        } => {
            let nuevo = NuevoUsuario {
                nombre_completo: name,
                email: user_email,
                password: user_password,
                rol: role,
            };
            let id = service.create(&session, nuevo).await?;
            ctx.created("user", id)
        }
        UserCommand::Deactivate { id } => {
            service.deactivate(&session, id).await?;
            println!("User {} deactivated", id);
            Ok(())
        }
    }
}

async fn initiatives(ctx: &RunContext, action: InitiativeCommand) -> Result<()> {
    let session = ctx.sign_in().await?;
    let service = &ctx.services.iniciativa;
    match action {
        InitiativeCommand::List {
            state,
            risk,
            search,
        } => {
            let filter = IniciativaFilter {
                estado: state,
                riesgo: risk,
                nombre: search,
            };
            let iniciativas = filter.apply(&service.list(&session).await?);
            output::emit(ctx.json, iniciativas.as_slice(), output::iniciativas)
        }
        InitiativeCommand::Create(args) => {
            let id = service.create(&session, new_initiative(args)).await?;
            ctx.created("initiative", id)
        }
        InitiativeCommand::Delete { id } => {
            service.delete(&session, id).await?;
            println!("Initiative {} deleted", id);
            Ok(())
        }
    }
}

fn new_initiative(args: NewInitiative) -> Iniciativa {
    let mut iniciativa = Iniciativa::nueva(args.name, args.tipo);
    iniciativa.descripcion = args.description;
    iniciativa.fecha_inicio = args.start;
    iniciativa.fecha_fin = args.end;
    iniciativa.estado = args.state;
    iniciativa.riesgo = args.risk;
    iniciativa.id_owner = args.owner;
    iniciativa
}

async fn impacts(ctx: &RunContext, action: ImpactCommand) -> Result<()> {
    let session = ctx.sign_in().await?;
    let service = &ctx.services.impacto;
    match action {
        ImpactCommand::List {
            tipo,
            attribute,
            search,
        } => {
            let filter = ImpactoFilter {
                tipo,
                atributo: attribute,
                texto: search,
            };
            let impactos = filter.apply(&service.list(&session).await?);
            output::emit(ctx.json, impactos.as_slice(), output::impactos)
        }
        ImpactCommand::Create(args) => {
            let id = service.create(&session, &new_impact(args)).await?;
            ctx.created("impact", id)
        }
        ImpactCommand::Delete { id } => {
            service.delete(&session, id).await?;
            println!("Impact {} deleted", id);
            Ok(())
        }
        ImpactCommand::Stats => {
            let stats = ctx.services.impactos.estadisticas_por_tipo().await?;
            output::emit(ctx.json, stats.as_slice(), output::estadisticas)
        }
    }
}

fn new_impact(args: NewImpact) -> Impacto {
    let multiplicador = if args.negative {
        Multiplicador::Negativo
    } else {
        Multiplicador::Positivo
    };
    Impacto::nuevo(
        args.initiative,
        args.tipo,
        args.attribute,
        multiplicador,
        args.date,
        args.amount,
    )
}

async fn dashboard(
    ctx: &RunContext,
    runner: &TaskRunner,
    owner: Option<i64>,
    name: Option<String>,
) -> Result<()> {
    let session = ctx.sign_in().await?;
    let filter = DashboardFilter {
        id_owner: owner,
        nombre_iniciativa: name,
    };
    let data = load_dashboard(runner, ctx.services.dashboard.clone(), session, filter).await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", output::metrics(&data.metrics));
        println!("{}", output::iniciativas(&data.iniciativas));
    }
    Ok(())
}

/// Load the dashboard on a worker thread and wait for its callback.
///
/// A failed load keeps its `ServiceError`, reachable through `downcast_ref`.
async fn load_dashboard(
    runner: &TaskRunner,
    service: DashboardService,
    session: Session,
    filter: DashboardFilter,
) -> Result<DashboardData> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let err_tx = tx.clone();
    runner.execute(
        async move { service.load(&session, &filter).await },
        move |data| {
            let _ = tx.send(Ok(data));
        },
        move |e| {
            let _ = err_tx.send(Err(e));
        },
    );
    let data = rx
        .recv()
        .await
        .context("dashboard task ended without reporting")??;
    Ok(data)
}

/// Hold every pooled connection at once, ping each and report the pool state
async fn pool_check(ctx: &RunContext, pool: &ConnectionPool) -> Result<()> {
    let size = pool.config().size();
    let mut held = Vec::with_capacity(size);
    for _ in 0..size {
        let conn = pool.acquire().await?;
        conn.ping().await.context("ping failed")?;
        held.push(conn);
    }
    let busy = pool.stats();
    drop(held);
    let idle = pool.stats();

    if ctx.json {
        println!("{}", json!({ "all_checked_out": busy, "after_release": idle }));
    } else {
        println!("All connections checked out:");
        println!("{}", output::pool_stats(&busy));
        println!("After release:");
        println!("{}", output::pool_stats(&idle));
    }
    Ok(())
}
