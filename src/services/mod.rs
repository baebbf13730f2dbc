//! Business logic services

pub mod catalog;
pub mod email;
pub mod loans;
pub mod members;
pub mod notifications;

use std::sync::Arc;

use crate::{
    config::{AppConfig, NotifierBackend},
    repository::Repository,
};

use notifications::{LogNotifier, NotificationDispatcher};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let dispatcher = if !config.notifications.enabled {
            NotificationDispatcher::disabled()
        } else {
            match config.notifications.backend {
                NotifierBackend::Log => NotificationDispatcher::new(Arc::new(LogNotifier)),
                NotifierBackend::Email => NotificationDispatcher::new(Arc::new(
                    email::EmailService::new(config.email.clone(), repository.clone()),
                )),
            }
        };

        Self::with_dispatcher(repository, config, dispatcher)
    }

    /// Create all services around an explicit notification dispatcher
    pub fn with_dispatcher(
        repository: Repository,
        config: &AppConfig,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), config.pagination.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(
                repository.clone(),
                dispatcher,
                config.loans.default_duration_days,
            ),
            repository,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }
}
