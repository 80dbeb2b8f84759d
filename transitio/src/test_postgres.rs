//! Shared infrastructure for PostgreSQL integration tests: one
//! testcontainers-managed server per test binary, with a fresh uniquely
//! named database per test.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Once;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use crate::postgres::ConnectParams;

/// Host port of the shared container, set once it is started.
static POSTGRES_PORT: AtomicU16 = AtomicU16::new(0);

static POSTGRES_INIT: Once = Once::new();

/// Default credentials for the testcontainers-modules postgres image.
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

fn ensure_postgres_started() {
    POSTGRES_INIT.call_once(|| {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

        let port = rt.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");
            // Keep the container alive for the whole test run.
            std::mem::forget(container);
            port
        });

        POSTGRES_PORT.store(port, Ordering::SeqCst);

        // The runtime must outlive the forgotten container's driver tasks.
        std::mem::forget(rt);
    });
}

fn get_postgres_port() -> u16 {
    ensure_postgres_started();
    POSTGRES_PORT.load(Ordering::SeqCst)
}

/// Connection parameters for a freshly created, uniquely named database on
/// the shared container. Each test gets its own database for isolation.
pub fn fresh_connect_params() -> ConnectParams {
    let port = get_postgres_port();
    let admin_url = format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER, PG_PASSWORD, port, PG_DB
    );
    let mut admin = Client::connect(&admin_url, NoTls).expect("failed to connect as admin");

    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .execute(&format!("CREATE DATABASE \"{}\"", db_name), &[])
        .expect("failed to create test database");
    drop(admin);

    ConnectParams {
        host: "127.0.0.1".to_string(),
        port,
        user: PG_USER.to_string(),
        password: PG_PASSWORD.to_string(),
        database: db_name,
    }
}
