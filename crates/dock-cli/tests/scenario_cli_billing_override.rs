use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// Operators grant and revoke access through the override; `entitlement`
/// reflects each change.
///
/// This test is DB-backed and is skipped if DOCK_DATABASE_URL is not set.
#[tokio::test]
async fn override_set_and_clear_drive_entitlement() -> anyhow::Result<()> {
    let url = match std::env::var(dock_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: DOCK_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    dock_db::migrate(&pool).await?;

    let name = format!("cli-org-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let org = {
        let mut conn = pool.acquire().await?;
        dock_db::orgs::create_org(&mut conn, &name).await?
    };
    let org_id = org.id.to_string();

    Command::cargo_bin("dock")?
        .args(["billing", "entitlement", "--org-id", &org_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is_active=false"))
        .stdout(predicate::str::contains("source=none"));

    Command::cargo_bin("dock")?
        .args([
            "billing",
            "override-set",
            "--org-id",
            &org_id,
            "--vessel-limit",
            "3",
            "--reason",
            "pilot",
        ])
        .env("RUST_LOG", "info")
        .assert()
        .success()
        .stderr(predicate::str::contains("billing override set"))
        .stdout(predicate::str::contains("override_enabled=true"))
        .stdout(predicate::str::contains("override_vessel_limit=3"))
        .stdout(predicate::str::contains("override_expires_at=never"));

    Command::cargo_bin("dock")?
        .args(["billing", "entitlement", "--org-id", &org_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is_active=true"))
        .stdout(predicate::str::contains("source=override"))
        .stdout(predicate::str::contains("vessel_limit=3"))
        .stdout(predicate::str::contains("vessels=0"));

    Command::cargo_bin("dock")?
        .args(["billing", "override-clear", "--org-id", &org_id])
        .env("RUST_LOG", "info")
        .assert()
        .success()
        .stderr(predicate::str::contains("billing override cleared"))
        .stdout(predicate::str::contains("override_enabled=false"));

    Command::cargo_bin("dock")?
        .args(["billing", "entitlement", "--org-id", &org_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is_active=false"));

    Command::cargo_bin("dock")?
        .args(["billing", "override-set", "--org-id", &org_id, "--vessel-limit", "-1"])
        .assert()
        .failure();

    Ok(())
}

#[tokio::test]
async fn seed_is_idempotent() -> anyhow::Result<()> {
    if std::env::var(dock_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: DOCK_DATABASE_URL not set");
        return Ok(());
    }

    Command::cargo_bin("dock")?.args(["db", "migrate"]).assert().success();
    Command::cargo_bin("dock")?.args(["db", "seed"]).assert().success();
    Command::cargo_bin("dock")?
        .args(["db", "seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created_org=false"));
    Command::cargo_bin("dock")?
        .args(["db", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true has_schema=true"));
    Ok(())
}
