mod output;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spectql::cli::Cli;
use spectql::spectql::{convert, parse_query, Interpreter};
use spectql::storage::{Catalog, TableManager};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    let catalog = Catalog::load(&cli.catalog)?;
    init_logging(&catalog.logging().level);

    if cli.list {
        for path in catalog.paths() {
            println!("{}", path);
        }
        return Ok(());
    }

    let manager = TableManager::new(catalog);
    let interpreter = Interpreter::new(&manager);

    if let Some(query) = &cli.query {
        run_query(&interpreter, query, cli.format.as_deref())?;
    }

    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("spectql={}", level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_query(
    interpreter: &Interpreter<'_>,
    query: &str,
    format: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = parse_query(query)?;
    let result = interpreter.interpret(&query)?;

    if !result.diagnostics.is_empty() {
        tracing::info!("{} source row(s) dropped", result.diagnostics.len());
    }

    let format = format
        .or(query.format.as_deref())
        .unwrap_or(output::DEFAULT_FORMAT);
    let rendered = output::render(format, &convert(result))?;
    print!("{}", rendered);
    if !rendered.ends_with('\n') {
        println!();
    }

    Ok(())
}
