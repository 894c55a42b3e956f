//! `python-runner`: run one Python submission over a line-delimited JSON
//! protocol on stdin/stdout.
//!
//! Usage: `python-runner <session_id>`
//!
//! Code is read from stdin until a `__END_OF_CODE__` line. Diagnostics go to
//! stderr; stdout carries protocol records only.

use std::{process::ExitCode, sync::Arc};

use pyrunner_core::{ProtocolPeer, RunnerConfig};
use pyrunner_python::PythonEngine;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_VAR: &str = "PYRUNNER_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let Some(session_id) = std::env::args().nth(1) else {
        eprintln!("Usage: python-runner <session_id>");
        return ExitCode::FAILURE;
    };

    match run(session_id).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Runner failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(session_id: String) -> anyhow::Result<bool> {
    let config = RunnerConfig::from_env();
    tracing::debug!(%session_id, ?config, "starting runner");

    let engine = PythonEngine::new().with_source_name(config.source_name.clone());
    let status = pyrunner_core::run(&config, session_id, ProtocolPeer::stdio(), Arc::new(engine)).await?;
    Ok(status.is_success())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "warn".into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
