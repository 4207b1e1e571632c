//! Demo server exposing a `users` and a `files` module over the public and
//! authenticated dispatch endpoints. Users are kept in memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use opcall_core::{OperationValue, ParamDescriptor};
use opcall_server::network::TlsConfig;
use opcall_server::{
    FnOperation, InMemoryCredentials, NetworkConfig, NetworkModule, ServiceDispatcher,
    ServiceModule,
};
use parking_lot::Mutex;
use serde_json::json;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "test-server", about = "Demo opcall server with in-memory users")]
struct Args {
    /// Bind address.
    #[arg(long, env = "OPCALL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port; 0 picks a free one.
    #[arg(long, env = "OPCALL_PORT", default_value_t = 8080)]
    port: u16,

    /// Login accounts as `name:password[:role+role]`, repeatable.
    #[arg(long = "user", env = "OPCALL_USERS", value_delimiter = ',')]
    users: Vec<String>,

    /// Idle time after which a session expires.
    #[arg(long, env = "OPCALL_SESSION_IDLE_SECS", default_value_t = 1800)]
    session_idle_secs: u64,

    /// PEM certificate chain; enables HTTPS together with `--tls-key`.
    #[arg(long, env = "OPCALL_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long, env = "OPCALL_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "OPCALL_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("opcall_server=info,test_server=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Parses `name:password[:role+role]`.
fn parse_account(account: &str) -> anyhow::Result<(String, String, Vec<String>)> {
    let mut parts = account.splitn(3, ':');
    let name = parts.next().filter(|s| !s.is_empty());
    let password = parts.next().filter(|s| !s.is_empty());
    let (Some(name), Some(password)) = (name, password) else {
        anyhow::bail!("account '{account}' must look like name:password[:role+role]");
    };
    let roles = parts
        .next()
        .map(|r| r.split('+').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    Ok((name.to_string(), password.to_string(), roles))
}

fn users_module() -> anyhow::Result<ServiceModule> {
    let directory = Arc::new(Mutex::new(Vec::<String>::new()));
    let added = Arc::clone(&directory);

    let module = ServiceModule::new("users")
        .with_operation(
            FnOperation::new("op-add-user", move |req| {
                let username = req.params.get("username")?.to_string();
                added.lock().push(username.clone());
                OperationValue::object(&json!({ "username": username })).ok()
            })
            .with_parameters([
                ParamDescriptor::mandatory("username"),
                ParamDescriptor::mandatory("password"),
                ParamDescriptor::optional("age").integer(),
            ]),
        )?
        .with_operation(FnOperation::new("op-list-users", move |_| {
            OperationValue::list(directory.lock().as_slice()).ok()
        }))?
        .with_operation(FnOperation::new("op-whoami", |req| {
            OperationValue::object(req.user.as_ref()?).ok()
        }))?;
    Ok(module)
}

fn files_module() -> anyhow::Result<ServiceModule> {
    let module = ServiceModule::new("files").with_operation(FnOperation::new("op-upload", |req| {
        let upload = req.upload.as_ref()?;
        OperationValue::object(&json!({
            "fileName": upload.file_name,
            "size": upload.data.len(),
            "uploadedBy": req.user.as_ref().map(|u| u.username.as_str()),
        }))
        .ok()
    }))?;
    Ok(module)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut credentials = InMemoryCredentials::new();
    for account in &args.users {
        let (name, password, roles) = parse_account(account)?;
        credentials.add_user(name, &password, roles);
    }
    if credentials.is_empty() {
        info!("no accounts configured; logins will be rejected");
    }

    let dispatcher = Arc::new(ServiceDispatcher::new("test-server"));
    dispatcher.add_module(users_module()?)?;
    dispatcher.add_module(files_module()?)?;

    let tls = match (args.tls_cert, args.tls_key) {
        (Some(cert_path), Some(key_path)) => Some(TlsConfig {
            cert_path,
            key_path,
        }),
        _ => None,
    };
    let config = NetworkConfig {
        host: args.host,
        port: args.port,
        tls,
        session_idle_timeout: Duration::from_secs(args.session_idle_secs),
        ..NetworkConfig::default()
    };

    let mut server = NetworkModule::new(config, dispatcher, Arc::new(credentials));
    let port = server.start().await.context("failed to bind listener")?;
    info!(port, modules = ?server.dispatcher().module_names(), "test server ready");

    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_spec_parsing() {
        let (name, password, roles) = parse_account("teo:secret:admin+user").unwrap();
        assert_eq!(name, "teo");
        assert_eq!(password, "secret");
        assert_eq!(roles, vec!["admin", "user"]);

        let (_, _, roles) = parse_account("ana:pwd").unwrap();
        assert!(roles.is_empty());

        assert!(parse_account("nopassword").is_err());
        assert!(parse_account(":pwd").is_err());
    }

    #[test]
    fn demo_modules_build() {
        assert_eq!(
            users_module().unwrap().operation_names(),
            vec!["op-add-user", "op-list-users", "op-whoami"]
        );
        assert_eq!(files_module().unwrap().len(), 1);
    }
}
