//! The `runserver` command.

use accounts_core::{AccountsError, Settings};
use accounts_web::AccountsApp;
use async_trait::async_trait;

use crate::command::ManagementCommand;

/// Serves the application until interrupted.
///
/// Binds to `127.0.0.1:8000` unless `--host`/`--port` say otherwise. The
/// database is migrated before the listener opens.
pub struct RunserverCommand;

/// Joins host and port, bracketing bare IPv6 addresses.
pub fn bind_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[async_trait]
impl ManagementCommand for RunserverCommand {
    fn name(&self) -> &'static str {
        "runserver"
    }

    fn help(&self) -> &'static str {
        "Starts the web server"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("host")
                .long("host")
                .default_value("127.0.0.1")
                .help("Host to bind to"),
        )
        .arg(
            clap::Arg::new("port")
                .long("port")
                .default_value("8000")
                .value_parser(clap::value_parser!(u16))
                .help("Port to bind to"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        let host = matches
            .get_one::<String>("host")
            .map_or("127.0.0.1", String::as_str);
        let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);
        let addr = bind_address(host, port);

        for problem in settings.check() {
            tracing::warn!("settings: {problem}");
        }

        let app = AccountsApp::from_settings(settings.clone()).await?;
        app.run(&addr).await
    }
}
