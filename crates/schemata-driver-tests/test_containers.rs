//! Docker containers for the server dialects.
//!
//! Used only when `SCHEMATA_TEST_CONTAINERS=1`. Each container starts on first
//! request and is shared by every later test in the process. Ports are assigned
//! by Docker, so the returned [`ContainerInfo`] is the only way to reach them.

use schemata_core::ConnectionConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use testcontainers_modules::{mssql_server::MssqlServer, mysql::Mysql, postgres::Postgres};
use tokio::sync::Mutex;

const MSSQL_SA_PASSWORD: &str = "Schemata!Test1";

/// Where a running test container can be reached
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Driver id for [`ConnectionConfig`]
    pub driver: &'static str,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

impl ContainerInfo {
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.driver);
        config.host = self.host.clone();
        config.port = self.port;
        config.database = Some(self.database.clone());
        config.username = Some(self.username.clone());
        config.password = self.password.clone();
        if self.driver == "mssql" {
            config = config.with_param("trust_cert", "true");
        }
        config
    }
}

struct Running<I: Image> {
    #[allow(dead_code)]
    inner: ContainerAsync<I>,
    info: ContainerInfo,
}

static POSTGRES_CONTAINER: Mutex<Option<Running<Postgres>>> = Mutex::const_new(None);
static MYSQL_CONTAINER: Mutex<Option<Running<Mysql>>> = Mutex::const_new(None);
static MSSQL_CONTAINER: Mutex<Option<Running<MssqlServer>>> = Mutex::const_new(None);

/// Get or start the PostgreSQL container
pub async fn postgres_container() -> anyhow::Result<ContainerInfo> {
    let mut guard = POSTGRES_CONTAINER.lock().await;
    if let Some(running) = guard.as_ref() {
        return Ok(running.info.clone());
    }

    tracing::info!("starting PostgreSQL test container");
    let container = Postgres::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start postgres container: {}", e))?;
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get postgres port: {}", e))?;

    // module defaults: postgres/postgres on database "postgres"
    let info = ContainerInfo {
        driver: "postgres",
        host: "127.0.0.1".to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: Some("postgres".to_string()),
    };
    tracing::info!(port, "PostgreSQL test container started");

    *guard = Some(Running {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}

/// Get or start the MySQL container
pub async fn mysql_container() -> anyhow::Result<ContainerInfo> {
    let mut guard = MYSQL_CONTAINER.lock().await;
    if let Some(running) = guard.as_ref() {
        return Ok(running.info.clone());
    }

    tracing::info!("starting MySQL test container");
    let container = Mysql::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start mysql container: {}", e))?;
    let port = container
        .get_host_port_ipv4(3306)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get mysql port: {}", e))?;

    // module defaults: root without a password on database "test"
    let info = ContainerInfo {
        driver: "mysql",
        host: "127.0.0.1".to_string(),
        port,
        database: "test".to_string(),
        username: "root".to_string(),
        password: None,
    };
    tracing::info!(port, "MySQL test container started");

    *guard = Some(Running {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}

/// Get or start the SQL Server container. Starting it accepts the image EULA.
pub async fn mssql_container() -> anyhow::Result<ContainerInfo> {
    let mut guard = MSSQL_CONTAINER.lock().await;
    if let Some(running) = guard.as_ref() {
        return Ok(running.info.clone());
    }

    tracing::info!("starting SQL Server test container");
    let container = MssqlServer::default()
        .with_accept_eula()
        .with_sa_password(MSSQL_SA_PASSWORD)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start mssql container: {}", e))?;
    let port = container
        .get_host_port_ipv4(1433)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get mssql port: {}", e))?;

    let info = ContainerInfo {
        driver: "mssql",
        host: "127.0.0.1".to_string(),
        port,
        database: "master".to_string(),
        username: "sa".to_string(),
        password: Some(MSSQL_SA_PASSWORD.to_string()),
    };
    tracing::info!(port, "SQL Server test container started");

    *guard = Some(Running {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}
