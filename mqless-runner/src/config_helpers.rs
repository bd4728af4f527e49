use mqless_config::Config;
use mqless_store_sql::DbConnectionConfig;
use mqless_worker::WorkerConfig;

/// Build the worker settings from application config.
pub fn worker_config_from_config(cfg: &Config) -> WorkerConfig {
    WorkerConfig::new(cfg.worker.app_id.clone(), cfg.worker.worker_count)
        .with_queue_capacity(cfg.worker.queue_capacity)
        .with_require_error_handler(cfg.worker.require_error_handler)
}

/// Build database connection config from application config.
pub fn database_config_from_config(cfg: &Config) -> DbConnectionConfig {
    let mut db = DbConnectionConfig::new(cfg.database.url.trim());
    db.max_connections = cfg.database.max_connections;
    db.min_connections = cfg.database.min_connections;
    db.connect_timeout_secs = cfg.database.connect_timeout_secs;
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqless_worker::MissingErrorHandlerPolicy;

    #[test]
    fn worker_settings_are_carried_over() {
        let mut cfg = Config::default();
        cfg.worker.app_id = "billing".into();
        cfg.worker.worker_count = 4;
        cfg.worker.queue_capacity = 16;
        cfg.worker.require_error_handler = false;

        let worker = worker_config_from_config(&cfg);
        assert_eq!(worker.app_id, "billing");
        assert_eq!(worker.worker_count, 4);
        assert_eq!(worker.queue_capacity, 16);
        assert_eq!(
            worker.missing_error_handler_policy(),
            MissingErrorHandlerPolicy::Ignore
        );
        assert!(worker.validate().is_ok());
    }

    #[test]
    fn database_settings_are_carried_over() {
        let mut cfg = Config::default();
        cfg.database.url = " sqlite::memory: ".into();
        cfg.database.max_connections = 3;

        let db = database_config_from_config(&cfg);
        assert_eq!(db.url, "sqlite::memory:");
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.connect_timeout_secs, 30);
    }
}
