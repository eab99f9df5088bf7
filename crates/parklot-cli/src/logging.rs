use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Map `PARKLOT_LOG` to a base level. Status lines go to stdout, so the
/// default keeps stderr quiet.
fn base_level(value: Option<&str>) -> &'static str {
    match value {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("error") => "error",
        _ => "warn",
    }
}

fn filter_directives(level: &str) -> String {
    format!("parklot={level},parklot_cli={level}")
}

/// Initialize tracing with PARKLOT_LOG and LOG_FORMAT support.
///
/// `RUST_LOG` takes precedence over `PARKLOT_LOG` when set.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = base_level(std::env::var("PARKLOT_LOG").ok().as_deref());
        EnvFilter::new(filter_directives(level))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    let _ = tracing_subscriber::registry()
        .with(stderr_layer(filter, use_json))
        .try_init();
}

/// Filtered stderr output, as JSON lines or human-readable text.
fn stderr_layer(filter: EnvFilter, json: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_writer(std::io::stderr);
    if json {
        layer.json().with_filter(filter).boxed()
    } else {
        layer.with_filter(filter).boxed()
    }
}
