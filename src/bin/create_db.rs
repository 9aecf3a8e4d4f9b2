//! Creates the directory database ahead of the first server start.

use tokio_postgres::NoTls;

const DEFAULT_ADMIN_CONN: &str = "host=127.0.0.1 user=postgres dbname=postgres";
const DEFAULT_DB_NAME: &str = "trusthub";

fn is_valid_db_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let conn_str = std::env::var("PG_ADMIN_CONN").unwrap_or_else(|_| DEFAULT_ADMIN_CONN.into());
    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.into());

    if !is_valid_db_name(&db_name) {
        log::error!("Refusing to create database: invalid name '{}'", db_name);
        return Ok(());
    }

    log::info!("Connecting to Postgres as administrator");
    let (client, connection) = tokio_postgres::connect(&conn_str, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("Admin connection error: {}", e);
        }
    });

    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?
        .is_some();
    if exists {
        log::info!("Database '{}' already exists", db_name);
        return Ok(());
    }

    client
        .batch_execute(&format!("CREATE DATABASE \"{}\"", db_name))
        .await?;
    log::info!("Database '{}' created; migrations run on server start", db_name);

    Ok(())
}
