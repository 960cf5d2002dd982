use pingora_core::apps::HttpServerOptions;
use pingora_core::listeners::tls::TlsSettings;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use pingora_proxy::http_proxy_service_with_name;

use pingcompose::config::{Config, Tls};
use pingcompose::core::status;
use pingcompose::logging::Logger;
use pingcompose::service::{http::build_http_service, status::StatusHttpApp};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // Initialize logging, into the configured file when there is one
    let logger = config.log.clone().map(Logger::new);
    match &logger {
        Some(logger) => logger.init_env_logger(),
        None => env_logger::init(),
    }

    // Load routers from configuration
    log::info!("Loading routers...");
    let http_service = build_http_service(&config).expect("Failed to initialize proxy service");
    let routes = config.routers.len();

    // Create Pingora server with optional configuration
    let mut pingcompose_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    // Create HTTP proxy service with name
    let mut http_service =
        http_proxy_service_with_name(&pingcompose_server.configuration, http_service, "pingcompose");

    // Add listeners from configuration
    log::info!("Adding listeners...");
    for list_cfg in config.listeners {
        match list_cfg.tls {
            Some(Tls {
                cert_path,
                key_path,
            }) => {
                let mut settings = TlsSettings::intermediate(&cert_path, &key_path)
                    .expect("Adding TLS listener shouldn't fail");
                if list_cfg.offer_h2 {
                    settings.enable_h2();
                }
                http_service.add_tls_with_settings(&list_cfg.address.to_string(), None, settings);
            }
            None => {
                if list_cfg.offer_h2c {
                    if let Some(http_logic) = http_service.app_logic_mut() {
                        let mut http_server_options = HttpServerOptions::default();
                        http_server_options.h2c = true;
                        http_logic.server_options = Some(http_server_options);
                    }
                }
                http_service.add_tcp(&list_cfg.address.to_string());
            }
        }
    }

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    pingcompose_server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    pingcompose_server.add_service(http_service);

    if let Some(status_cfg) = &config.status {
        log::info!("Serving readiness endpoint on {}", status_cfg.address);
        pingcompose_server.add_service(StatusHttpApp::status_http_service(status_cfg));
    }

    if let Some(logger) = logger {
        pingcompose_server.add_service(logger);
    }

    status::mark_ready(routes);

    log::info!("Starting Server...");
    pingcompose_server.run_forever();
}
