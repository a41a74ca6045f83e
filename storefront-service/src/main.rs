use std::net::SocketAddr;
use std::sync::Arc;
use std::{env, net::IpAddr};

use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;

use storefront_service::app::AppState;
use storefront_service::gateway::HttpGateway;
use storefront_service::invoice::HttpInvoiceStore;
use storefront_service::{build_router, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = PgPool::connect(&database_url).await?;
    db::ensure_schema(&db).await?;
    info!("database schema ready");

    let gateway = HttpGateway::from_env().context("payment gateway configuration")?;
    let invoices = HttpInvoiceStore::from_env();

    let state = AppState {
        db,
        gateway: Arc::new(gateway),
        invoices: Arc::new(invoices),
    };
    let app = build_router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8088);
    let ip: IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));
    println!("starting storefront-service on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
