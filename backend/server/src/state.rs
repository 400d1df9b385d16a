use std::sync::Arc;

use store::RecordStore;

use super::{
    config::Config,
    database::init_store,
    namespace::Namespace,
    notifier::Notifier,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub notifier: Notifier,
    pub tasks: Namespace,
    pub chat: Namespace,
    pub trips: Namespace,
}

impl AppState {
    pub fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;

        let store = init_store(&config)?;
        let notifier = Notifier::new(config.webhook_url.clone(), config.notify_timeout)?;

        Ok(Self::with_store(config, store, notifier))
    }

    pub fn with_store(config: Config, store: Arc<dyn RecordStore>, notifier: Notifier) -> Arc<Self> {
        Arc::new(Self {
            tasks: Namespace::tasks(&config.tasks_namespace, config.key_mode),
            chat: Namespace::chat(config.key_mode),
            trips: Namespace::trips(config.key_mode),
            config,
            store,
            notifier,
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }
}
