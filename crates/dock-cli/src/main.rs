use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dock_db::orgs::{self, BillingOverride};

#[derive(Parser)]
#[command(name = "dock")]
#[command(about = "DockOps operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Platform administration
    Admin {
        #[command(subcommand)]
        cmd: AdminCmd,
    },

    /// Billing overrides and entitlement inspection
    Billing {
        #[command(subcommand)]
        cmd: BillingCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,

    /// Create the development organization, user and ADMIN membership.
    /// Safe to run repeatedly.
    Seed,
}

#[derive(Subcommand)]
enum AdminCmd {
    /// Grant (or with --revoke, remove) the super-admin flag.
    SetSuperAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, default_value_t = false)]
        revoke: bool,
    },
}

#[derive(Subcommand)]
enum BillingCmd {
    /// Enable a billing override for an organization.
    OverrideSet {
        #[arg(long)]
        org_id: i64,

        /// Vessel limit while the override is active. Omit for unlimited.
        #[arg(long)]
        vessel_limit: Option<i64>,

        /// RFC3339 expiry. Omit for no expiry.
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Disable the billing override and clear its fields.
    OverrideClear {
        #[arg(long)]
        org_id: i64,
    },

    /// Print the effective entitlement and vessel usage.
    Entitlement {
        #[arg(long)]
        org_id: i64,
    },
}

fn limit_str(limit: Option<i64>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = dock_db::connect_from_env(2).await?;
            match cmd {
                DbCmd::Status => {
                    let s = dock_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_schema={} organizations={} vessels={}",
                        s.ok, s.has_schema, s.organizations, s.vessels
                    );
                }
                DbCmd::Migrate => {
                    dock_db::migrate(&pool).await?;
                    tracing::info!("migrations applied");
                    println!("migrations_applied=true");
                }
                DbCmd::Seed => {
                    let mut tx = pool.begin().await?;
                    let r = dock_db::seed::seed_dev(&mut tx).await?;
                    tx.commit().await?;
                    tracing::info!(org_id = r.org_id, created_org = r.created_org, "dev seed applied");
                    println!("org_id={}", r.org_id);
                    println!("user_id={}", r.user_id);
                    println!("created_org={}", r.created_org);
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = dock_config::load_layered_yaml(&path_refs)?;
            // Reject documents the daemon would refuse at boot.
            dock_config::AppConfig::from_loaded(&loaded)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Admin { cmd } => match cmd {
            AdminCmd::SetSuperAdmin { email, revoke } => {
                let pool = dock_db::connect_from_env(2).await?;
                let mut conn = pool.acquire().await?;
                let user = dock_db::users::set_super_admin(&mut conn, &email, !revoke)
                    .await
                    .with_context(|| format!("set super admin for {email}"))?;
                tracing::info!(user_id = user.id, granted = !revoke, "super admin flag updated");
                println!("user_id={}", user.id);
                println!("is_super_admin={}", user.is_super_admin);
            }
        },

        Commands::Billing { cmd } => {
            let pool = dock_db::connect_from_env(2).await?;
            let mut conn = pool.acquire().await?;
            match cmd {
                BillingCmd::OverrideSet {
                    org_id,
                    vessel_limit,
                    expires_at,
                    reason,
                } => {
                    if vessel_limit.is_some_and(|n| n < 0) {
                        anyhow::bail!("--vessel-limit must be >= 0");
                    }
                    let org = orgs::set_billing_override(
                        &mut conn,
                        org_id,
                        &BillingOverride {
                            vessel_limit,
                            expires_at,
                            reason,
                        },
                    )
                    .await?;
                    tracing::info!(
                        org_id = org.id,
                        vessel_limit = ?org.billing_override_vessel_limit,
                        "billing override set"
                    );
                    println!("org_id={}", org.id);
                    println!("override_enabled={}", org.billing_override_enabled);
                    println!(
                        "override_vessel_limit={}",
                        limit_str(org.billing_override_vessel_limit)
                    );
                    println!(
                        "override_expires_at={}",
                        org.billing_override_expires_at
                            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
                    );
                }
                BillingCmd::OverrideClear { org_id } => {
                    let org = orgs::clear_billing_override(&mut conn, org_id).await?;
                    tracing::info!(org_id = org.id, "billing override cleared");
                    println!("org_id={}", org.id);
                    println!("override_enabled={}", org.billing_override_enabled);
                }
                BillingCmd::Entitlement { org_id } => {
                    let s = dock_db::billing::billing_status(&mut conn, org_id, Utc::now()).await?;
                    println!("org_id={}", s.org_id);
                    println!("is_active={}", s.entitlement.is_active);
                    println!("source={}", s.entitlement.source.as_str());
                    println!("vessel_limit={}", limit_str(s.entitlement.vessel_limit));
                    println!("vessels={}", s.vessel_usage.current);
                    println!("override_active={}", s.billing_override.active);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
