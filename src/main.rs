//! urlthumb - On-demand image thumbnails addressed by URL.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use urlthumb::{
    backend::ImageBackend,
    config::{CanonicalConfig, CheckConfig, Cli, Command, ServeConfig},
    pipeline::{LosslessOptimizer, Pngout, Thumber},
    route::RequestContext,
    server::{create_router, RouterConfig},
    settings::{DebugLevel, GroupConfig, Settings},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Canonical(config) => run_canonical(config),
        Command::Check(config) => run_check(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // Print startup banner and info
    print_banner();

    let settings = match Settings::load(&config.config) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load {}: {}", config.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Groups file: {}", config.config.display());
    info!(
        "  Transforms: {} concurrent",
        config.max_concurrent_transforms
    );
    if let Some(ref script_name) = config.script_name {
        info!("  Script name: {}", script_name);
    }

    for group in settings.groups() {
        log_group(group);
    }

    let thumber = Thumber::new(Arc::new(settings));

    // Build router configuration
    let router_config = build_router_config(&config);

    // Create router
    let router = create_router(thumber, router_config);

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl -o thumb.jpg http://{}/thumb/<group>/<name>,w_100.jpg", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██╗   ██╗██████╗ ██╗  ████████╗██╗  ██╗██╗   ██╗███╗   ███╗██████╗ ");
    info!("██║   ██║██╔══██╗██║  ╚══██╔══╝██║  ██║██║   ██║████╗ ████║██╔══██╗");
    info!("██║   ██║██████╔╝██║     ██║   ███████║██║   ██║██╔████╔██║██████╔╝");
    info!("██║   ██║██╔══██╗██║     ██║   ██╔══██║██║   ██║██║╚██╔╝██║██╔══██╗");
    info!("╚██████╔╝██║  ██║███████╗██║   ██║  ██║╚██████╔╝██║ ╚═╝ ██║██████╔╝");
    info!(" ╚═════╝ ╚═╝  ╚═╝╚══════╝╚═╝   ╚═╝  ╚═╝ ╚═════╝ ╚═╝     ╚═╝╚═════╝ ");
    info!("");
    info!("                              v{}", version);
}

/// Log a one-line summary of a group, with warnings for risky settings.
fn log_group(group: &GroupConfig) {
    let bounds = match (group.max_width, group.max_height) {
        (Some(w), Some(h)) => format!("{}x{}", w, h),
        (Some(w), None) => format!("{}x-", w),
        (None, Some(h)) => format!("-x{}", h),
        (None, None) => "unbounded".to_string(),
    };

    info!(
        "  Group '{}': source={} adapter={} max={} cache={}",
        group.key,
        group.source_path.display(),
        group.adapter.name(),
        bounds,
        if group.cache { "on" } else { "off" }
    );

    if group.debug == DebugLevel::Raise {
        warn!(
            "    Group '{}' runs at debug level 2; errors are returned to clients",
            group.key
        );
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "urlthumb=debug,tower_http=debug"
    } else {
        "urlthumb=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_max_concurrent_transforms(config.max_concurrent_transforms);

    // Apply CORS origins
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    if let Some(ref script_name) = config.script_name {
        router_config = router_config.with_script_name(script_name.clone());
    }

    // Apply tracing setting
    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Canonical Command
// =============================================================================

fn run_canonical(config: CanonicalConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = match Settings::load(&config.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = match RequestContext::from_url(&config.url, config.script_name.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let thumber = Thumber::new(Arc::new(settings));
    match thumber.canonical_url(ctx) {
        Ok(url) => {
            println!("{}", url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    // Initialize minimal logging for check command
    if config.verbose {
        init_logging(true);
    }

    println!("urlthumb Configuration Check");
    println!("════════════════════════════");
    println!();

    let settings = match Settings::load(&config.config) {
        Ok(settings) => {
            println!("✓ Config: {}", config.config.display());
            settings
        }
        Err(e) => {
            println!("✗ Config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut failures = 0usize;
    for group in settings.groups() {
        println!();
        println!("Group '{}':", group.key);
        failures += check_group(group, config.deep);
    }

    if let Some(ref error_url) = settings.fallback().error_url {
        println!();
        failures += check_file("Default error image", error_url);
    }

    println!();
    println!("════════════════════════════");
    if failures > 0 {
        println!("✗ {} check(s) failed", failures);
        return ExitCode::FAILURE;
    }
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

/// Check one group's paths. Returns the number of failed checks.
fn check_group(group: &GroupConfig, deep: bool) -> usize {
    let mut failures = 0;

    if group.source_path.is_dir() {
        println!("  ✓ Source: {}", group.source_path.display());
    } else {
        println!(
            "  ✗ Source: {} is not a directory",
            group.source_path.display()
        );
        failures += 1;
    }

    match group.thumb_cache_path.as_deref().filter(|_| group.cache) {
        Some(path) => match std::fs::create_dir_all(path) {
            Ok(()) => println!("  ✓ Cache: {}", path.display()),
            Err(e) => {
                println!("  ✗ Cache: {} ({})", path.display(), e);
                failures += 1;
            }
        },
        None => println!("  - Cache: disabled"),
    }

    if let Some(ref error_url) = group.error_url {
        failures += check_file("  Error image", error_url);
    }

    if !deep {
        return failures;
    }

    let backend = group.adapter.backend();
    let watermark = &group.watermark;
    let layer = watermark.layer_file.as_ref().filter(|_| watermark.enable);
    let text = watermark.text_layer().filter(|_| watermark.enable);
    if let Some(layer) = layer {
        match backend.open(layer) {
            Ok(image) => {
                let (w, h) = image.size();
                println!("  ✓ Watermark layer: {} ({}x{})", layer.display(), w, h);
            }
            Err(e) => {
                println!("  ✗ Watermark layer: {}", e);
                failures += 1;
            }
        }
    } else if let Some(text) = text {
        match backend.load_font(text.font_file, text.font_size, text.font_color) {
            Ok(_) => println!("  ✓ Watermark font: {}", text.font_file.display()),
            Err(e) => {
                println!("  ✗ Watermark font: {}", e);
                failures += 1;
            }
        }
    }

    if group.png_optimize.enable {
        let pngout = Pngout::new(group.png_optimize.pngout_bin.clone());
        if pngout.is_supported() {
            println!("  ✓ PNG optimizer: {}", pngout.bin().display());
        } else {
            println!("  ✗ PNG optimizer: cannot run {}", pngout.bin().display());
            failures += 1;
        }
    }

    failures
}

fn check_file(label: &str, path: &std::path::Path) -> usize {
    if path.is_file() {
        println!("✓ {}: {}", label, path.display());
        0
    } else {
        println!("✗ {}: {} not found", label, path.display());
        1
    }
}
