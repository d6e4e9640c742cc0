// ==========================================
// Planilha Import Engine - Binary Entry Point
// ==========================================
// One-shot batch job: read configuration from the
// environment, run the import, emit the summary and
// exit. Exit code: 0 success, 1 partial failure,
// 2 fatal setup failure.
// ==========================================

use import_planilhas::config::{RunConfig, SchemaCatalog};
use import_planilhas::importer::{
    ChangeMapperImpl, FolderImporter, ImportEngine, RowValidatorImpl,
};
use import_planilhas::repository::{BatchLoader, MySqlTargetRepository, RetryPolicy};
use import_planilhas::{db, logging, reporter};
use import_planilhas::domain::record::RunOutcome;

#[tokio::main]
async fn main() {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", import_planilhas::APP_NAME, import_planilhas::VERSION);
    tracing::info!("==================================================");

    let outcome = run().await;
    reporter::emit(&outcome);
    std::process::exit(outcome.status.exit_code());
}

/// Setup (config, schema contract, database pool) and the engine run.
/// Setup failures produce a Fatal outcome with zero files processed.
async fn run() -> RunOutcome {
    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => return fatal_outcome(e.to_string()),
    };

    let catalog = match SchemaCatalog::load(&config.schema_file) {
        Ok(catalog) => catalog,
        Err(e) => return fatal_outcome(e.to_string()),
    };

    let pool = match db::connect_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => return fatal_outcome(e.to_string()),
    };

    let repo = MySqlTargetRepository::new(pool.clone());
    let loader = BatchLoader::new(
        repo,
        RetryPolicy::new(
            config.max_retries,
            config.retry_base_delay,
            config.retry_max_delay,
        ),
        config.batch_size,
    );
    let validator = Box::new(RowValidatorImpl::new(config.locale));
    let mapper = Box::new(ChangeMapperImpl::new());

    let mut engine = ImportEngine::new(config, catalog, validator, mapper, loader);
    let outcome = engine.run().await;

    // Release the pool on every exit path before reporting
    pool.close().await;

    outcome
}

fn fatal_outcome(message: String) -> RunOutcome {
    tracing::error!(error = %message, "setup failed, aborting with zero files processed");
    let mut outcome = RunOutcome::new(uuid::Uuid::new_v4().to_string());
    outcome.fatal_error = Some(message);
    outcome.finalize();
    outcome
}
