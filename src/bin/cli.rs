use sqlx::Row;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use scope_authz::authz::{PermissionEngine, PermissionEvaluator, StaticPermissionTable};
use scope_authz::config::AuthzConfig;
use scope_authz::models::permission::PermissionCheckRequest;
use scope_authz::models::scope::{ScopeKind, ScopeRef};
use scope_authz::store::{MembershipStore, SqliteMembershipStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "scope-authz maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Load the static permission table and report what it contains
    ValidateTable {
        /// Defaults to PERMISSION_DIR
        dir: Option<PathBuf>,
    },
    /// Decide a single permission check against the current database
    Check {
        #[arg(long)]
        user: String,
        #[arg(long)]
        scope: ScopeKind,
        #[arg(long, default_value_t = 0)]
        scope_id: u64,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        resource_role: Option<String>,
    },
    /// Print the permission list of a user at a scope
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        scope: ScopeKind,
        #[arg(long, default_value_t = 0)]
        scope_id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::ValidateTable { dir } => {
            let config = AuthzConfig::from_env()?;
            let dir = dir.unwrap_or(config.permission_dir);
            let table = StaticPermissionTable::load(&dir)
                .with_context(|| format!("invalid permission table at {}", dir.display()))?;
            println!("{}: {} rules", dir.display(), table.len());
        }
        Commands::Check { user, scope, scope_id, resource, action, resource_role } => {
            let engine = build_engine().await?;
            let mut req = PermissionCheckRequest::new(user, ScopeRef::new(scope, scope_id), resource, action);
            if let Some(resource_role) = resource_role {
                req = req.with_resource_role(resource_role);
            }
            let access = engine.check_permission(&req).await?;
            println!("{}", if access { "allow" } else { "deny" });
        }
        Commands::List { user, scope, scope_id } => {
            let engine = build_engine().await?;
            let list = engine.permission_list(&user, ScopeRef::new(scope, scope_id)).await?;
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
    }

    Ok(())
}

async fn build_engine() -> anyhow::Result<PermissionEngine> {
    let config = AuthzConfig::from_env()?;
    let table = StaticPermissionTable::load(&config.permission_dir)?;
    let store: Arc<dyn MembershipStore> = Arc::new(SqliteMembershipStore::new(get_pool().await?));
    Ok(PermissionEngine::new(store, Arc::new(table), &config))
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let applied = applied_versions.contains(&migration.version);
        let status = if applied { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root). If that
    // doesn't exist (common in containers where CWD differs), fall back to
    // the crate-local migrations folder determined by CARGO_MANIFEST_DIR.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
