use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

use dicta_app::controller::RunOutcome;
use dicta_app::runtime::{self, RuntimeOptions};
use dicta_foundation::TerminalPolicy;

/// The stdout transport carries protocol lines only, so diagnostics go to a
/// rotating log file. `CT_VERBOSE=1` mirrors everything to stdout and
/// `CT_LOG_WHITELIST` mirrors selected tracing targets.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "dicta.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let policy = TerminalPolicy::from_env();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::EnvFilter::new(log_level.clone()));

    let stdout_filter = if policy.verbose {
        Some(Targets::new().with_default(tracing::Level::DEBUG))
    } else if !policy.whitelist.is_empty() {
        let mut targets = Targets::new();
        for label in &policy.whitelist {
            targets = targets.with_target(label.to_lowercase(), tracing::Level::TRACE);
        }
        Some(targets)
    } else {
        None
    };

    let stdout_layer = stdout_filter.map(|filter| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    // Keep the file writer alive for the entire program.
    std::mem::forget(guard);
    Ok(())
}

/// Panics must reach the log file: the terminal is protocol-bearing and
/// usually silent, so a default panic message would vanish with it.
fn install_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        eprintln!("dicta panicked: {panic_info}");
        original(panic_info);
    }));
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("failed to initialise logging: {e}");
        std::process::exit(1);
    }
    install_panic_hook();

    tracing::info!("dicta core starting");
    let outcome = runtime::run(RuntimeOptions::default()).await;

    match outcome {
        RunOutcome::Shutdown => {
            tracing::info!("clean shutdown");
            std::process::exit(0);
        }
        RunOutcome::Restart => {
            tracing::info!("restarting");
            restart_self();
        }
    }
}

/// Replace this process with a fresh instance.
fn restart_self() -> ! {
    let exe = std::env::current_exe().unwrap_or_else(|e| {
        tracing::error!("cannot locate executable for restart: {}", e);
        std::process::exit(1);
    });

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(&exe)
            .args(std::env::args().skip(1))
            .exec();
        tracing::error!("restart exec failed: {}", err);
        std::process::exit(1);
    }

    #[cfg(not(unix))]
    {
        match std::process::Command::new(&exe)
            .args(std::env::args().skip(1))
            .spawn()
        {
            Ok(_) => std::process::exit(0),
            Err(e) => {
                tracing::error!("restart spawn failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
