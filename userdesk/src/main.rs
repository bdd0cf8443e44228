// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::http::header::LOCATION;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::rt::System;
use actix_web::{App, HttpResponse, HttpServer, web};
use log::{LevelFilter, info};
use std::io::Write;
use std::sync::Arc;

use userdesk::app_state::AppState;
use userdesk::bootstrap::{self, BootstrapResult};
use userdesk::config::ValidatedConfig;
use userdesk::error_page::render_error_page;
use userdesk::login::{self, Authenticator};
use userdesk::runtime_paths::RuntimePaths;
use userdesk::session::{SessionMiddleware, SessionStore};
use userdesk::users::{self, FileUserStore, UserCoordinator, UserDirectory};
use userdesk::util;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the runtime directory.");
            return 1;
        }
    };

    if matches!(parsed_args.mode, RunMode::Help) {
        print!("{}", help_text());
        return 0;
    }

    let bootstrap = match bootstrap::bootstrap_runtime(&parsed_args.runtime_root) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("❌ Bootstrap error: {}", error);
            eprintln!("❌ Application cannot start with invalid configuration.");
            return 1;
        }
    };

    match System::new().block_on(run_server(bootstrap)) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("❌ Server failed to start: {}", error);
            1
        }
    }
}

async fn run_server(bootstrap: BootstrapResult) -> std::io::Result<()> {
    let validated_config = Arc::new(bootstrap.validated_config);
    let runtime_paths = bootstrap.runtime_paths;

    let logger = env_logger::Builder::from_default_env()
        .filter_level(log_level(&validated_config.logging.level))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .build();

    util::init_logger(util::default_rules(), logger).map_err(|error| {
        eprintln!("❌ Failed to initialize logger: {}", error);
        std::io::Error::other(error.to_string())
    })?;

    log_startup_info(&validated_config, &runtime_paths);

    let store = FileUserStore::new(runtime_paths.users_file.clone())
        .map_err(|error| std::io::Error::other(error.to_string()))?;
    let directory = match UserDirectory::new(Arc::new(store)) {
        Ok(directory) => directory,
        Err(error) => {
            eprintln!("❌ Failed to load users: {}", error);
            eprintln!("❌ Application cannot start without the user directory.");
            return Err(std::io::Error::other(error.to_string()));
        }
    };
    info!("✅ User directory initialized successfully");

    if directory.is_empty().unwrap_or(false) {
        info!(
            "No users yet; create the first account at {}",
            validated_config.users.setup_path
        );
    }

    let sessions = SessionStore::new(&validated_config.sessions);
    info!("✅ Session store initialized successfully");

    let authenticator = Authenticator::new(directory.clone(), &validated_config.password)
        .map_err(|error| std::io::Error::other(error.to_string()))?;

    let app_state = web::Data::new(AppState::new(validated_config.clone(), sessions.clone()));
    let coordinator = web::Data::new(UserCoordinator::new(
        directory.clone(),
        sessions.clone(),
        validated_config.clone(),
    ));
    let directory_data = web::Data::new(directory.clone());
    let authenticator = web::Data::new(authenticator);
    info!(
        "✅ App state initialized with app name: {}",
        validated_config.app.name
    );

    let workers = validated_config.server.workers;
    let address = (
        validated_config.server.host.clone(),
        validated_config.server.port,
    );

    let factory = {
        let config_for_app = validated_config.clone();
        move || {
            let config_for_routes = config_for_app.clone();
            let list_path = config_for_app.users.list_path();

            App::new()
                .app_data(app_state.clone())
                .app_data(coordinator.clone())
                .app_data(directory_data.clone())
                .app_data(authenticator.clone())
                .wrap(ErrorHandlers::new().default_handler(render_error_page))
                .wrap(SessionMiddleware::new(
                    sessions.clone(),
                    directory.clone(),
                    &config_for_app.sessions.cookie_name,
                ))
                .wrap(Logger::new(
                    r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
                ))
                .configure(move |cfg| users::configure(cfg, &config_for_routes))
                .configure(login::configure)
                .route(
                    "/",
                    web::get().to(move || {
                        let list_path = list_path.clone();
                        async move {
                            HttpResponse::Found()
                                .insert_header((LOCATION, list_path))
                                .finish()
                        }
                    }),
                )
        }
    };

    HttpServer::new(factory)
        .workers(workers)
        .bind(address)?
        .run()
        .await
}

fn log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

fn log_startup_info(config: &ValidatedConfig, runtime_paths: &RuntimePaths) {
    info!("Starting {} - {}", config.app.name, config.app.description);
    info!("Workers: {}", config.server.workers);
    info!(
        "Listening on http://{}:{}",
        config.server.host, config.server.port
    );
    info!(
        "User management available at: http://{}:{}{}",
        config.server.host,
        config.server.port,
        config.users.list_path()
    );
    info!("Config file: {}", runtime_paths.config_file.display());
    info!("Users file: {}", runtime_paths.users_file.display());
    info!("Runtime root: {}", runtime_paths.root.display());

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {}", current_dir.display());
    }
}

#[derive(Debug)]
enum RunMode {
    Serve,
    Help,
}

struct ParsedArgs {
    runtime_root: std::path::PathBuf,
    mode: RunMode,
}

fn help_text() -> &'static str {
    "Usage: userdesk [-C <root>]\n\n  -C <root>   runtime directory holding config.yaml and users.yaml (default: .)\n  -h, --help  print this help\n"
}

fn parse_args() -> Result<ParsedArgs, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ParsedArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    if args.iter().any(|arg| is_help_flag(arg)) {
        return Ok(ParsedArgs {
            runtime_root: std::path::PathBuf::from("."),
            mode: RunMode::Help,
        });
    }

    let mut args = args.into_iter();
    let mut runtime_root = std::path::PathBuf::from(".");

    while let Some(arg) = args.next() {
        if arg == "--" {
            continue;
        } else if arg == "-C" {
            let value = args
                .next()
                .ok_or_else(|| "Missing value for -C".to_string())?;
            runtime_root = std::path::PathBuf::from(value);
        } else {
            return Err(format!("Unexpected argument '{}'", arg));
        }
    }

    let runtime_root = make_runtime_root_absolute(runtime_root)?;

    Ok(ParsedArgs {
        runtime_root,
        mode: RunMode::Serve,
    })
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help" || arg == "help"
}

fn make_runtime_root_absolute(
    runtime_root: std::path::PathBuf,
) -> Result<std::path::PathBuf, String> {
    if runtime_root.is_absolute() {
        return Ok(runtime_root);
    }

    let current_dir = std::env::current_dir()
        .map_err(|error| format!("Failed to resolve current directory: {}", error))?;
    Ok(current_dir.join(runtime_root))
}
