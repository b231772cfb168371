use std::io::{self, BufRead, Write};
use std::sync::Arc;

use helpline_agent::{standard_registry, HttpEmbedder, HttpOracle, ToolRouter};
use helpline_core::config::{AppConfig, LoadOptions};
use helpline_core::{CustomerId, Session};
use helpline_store::{CatalogStore, OrderLedger, VectorIndex};

use super::CommandResult;

/// Terminal REPL against the same router the server runs. `quit` or
/// `exit` ends the session; `/reset` clears history.
pub fn run(customer_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("chat", "runtime", error.to_string(), 1),
    };

    let router = match build_router(&config) {
        Ok(router) => router,
        Err(error) => return CommandResult::failure("chat", "bootstrap", error.to_string(), 1),
    };

    let mut session = Session::new(CustomerId(customer_id.to_string()));
    match runtime.block_on(repl(&router, &mut session)) {
        Ok(()) => CommandResult::success("chat", "chat session ended"),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 1),
    }
}

fn build_router(config: &AppConfig) -> anyhow::Result<ToolRouter> {
    let catalog = Arc::new(CatalogStore::load(&config.data.catalog_path).unwrap_or_else(|error| {
        eprintln!("warning: catalog unavailable: {error}");
        CatalogStore::empty()
    }));
    let ledger = Arc::new(
        OrderLedger::open(&config.data.orders_path, &config.data.orders_working_copy)
            .unwrap_or_else(|error| {
                eprintln!("warning: order ledger unavailable: {error}");
                OrderLedger::in_memory(Vec::new())
            }),
    );
    let general_index =
        Arc::new(VectorIndex::load(&config.data.general_index_path).unwrap_or_else(|error| {
            eprintln!("warning: general index unavailable: {error}");
            VectorIndex::empty()
        }));
    let product_index =
        Arc::new(VectorIndex::load(&config.data.product_index_path).unwrap_or_else(|error| {
            eprintln!("warning: product index unavailable: {error}");
            VectorIndex::empty()
        }));

    let oracle = HttpOracle::new(&config.oracle)?;
    let embedder = HttpEmbedder::new(&config.embedding)?;
    let registry = standard_registry(
        catalog,
        ledger,
        general_index,
        product_index,
        Arc::new(embedder),
        config.data.fuzzy_threshold,
    );
    Ok(ToolRouter::new(Arc::new(oracle), registry))
}

async fn repl(router: &ToolRouter, session: &mut Session) -> io::Result<()> {
    println!(
        "Support agent active for customer {} (type 'quit' to exit, '/reset' to clear history)",
        session.customer_id().0
    );

    let stdin = io::stdin();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        if input == "/reset" {
            router.reset_session(session);
            println!("(history cleared)");
            continue;
        }

        let envelope = router.process_turn(session, input).await;
        println!("AI: {}", envelope.text);
        if !envelope.items.is_empty() {
            if let Ok(items) = serde_json::to_string_pretty(&envelope.items) {
                println!("{items}");
            }
        }
    }
    Ok(())
}
