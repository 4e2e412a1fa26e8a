use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use civic_portal::authz::PermissionKey;
use civic_portal::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "civic-portal maintenance tool", long_about = None)]
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
    /// Roll back the last applied migration
    MigrateRollback,
    /// Create an administrator account, or reset its password if the email exists
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Replace a user's permission keys
    Grant {
        #[arg(long)]
        email: String,
        /// Comma separated keys, e.g. news,trash
        #[arg(long, value_delimiter = ',')]
        permissions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
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
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::CreateAdmin { name, email, password } => {
            let pool = get_pool().await?;
            create_admin(&pool, &name, &email, &password).await?;
            println!("Administrator {} is ready", email);
        }
        Commands::Grant { email, permissions } => {
            let pool = get_pool().await?;
            grant(&pool, &email, &permissions).await?;
            println!("Permissions for {} replaced", email);
        }
    }

    Ok(())
}

async fn create_admin(pool: &SqlitePool, name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    if password.len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }
    let email = email.trim().to_lowercase();
    let password_hash = hash_password(password)?;
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (name, email, password_hash, role, permissions, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, 'admin', '[]', 1, ?, ?) \
         ON CONFLICT(email) DO UPDATE SET password_hash = excluded.password_hash, role = 'admin', is_active = 1, updated_at = excluded.updated_at",
    )
    .bind(name)
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("failed to write administrator")?;

    Ok(())
}

async fn grant(pool: &SqlitePool, email: &str, permissions: &[String]) -> anyhow::Result<()> {
    let mut keys = Vec::new();
    for raw in permissions {
        let key = PermissionKey::parse(raw.trim()).with_context(|| format!("unknown permission key: {raw}"))?;
        if !keys.contains(&key.as_str()) {
            keys.push(key.as_str());
        }
    }
    keys.sort_unstable();

    let updated = sqlx::query("UPDATE users SET permissions = ?, updated_at = ? WHERE email = ? COLLATE NOCASE")
        .bind(serde_json::to_string(&keys)?)
        .bind(Utc::now())
        .bind(email.trim())
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        anyhow::bail!("no user with email {email}");
    }
    Ok(())
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
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
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
    // Prefer ./migrations when running from the repo root, else the crate-local folder.
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
