pub mod categories;
pub mod clients;
pub mod common;
pub mod crud;
pub mod orders;
pub mod products;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    cache::CacheService,
    config::AppConfig,
    db::DbPool,
    notifications::OrderNotifier,
    repositories::Repositories,
    services::{
        categories::CategoryService, clients::ClientService, orders::OrderService,
        products::ProductService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
    pub clients: Arc<ClientService>,
    pub auth: Arc<AuthService>,
    pub repositories: Repositories,
    pub cache: CacheService,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        cache: CacheService,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let repositories = Repositories::new(db_pool.clone(), config.api_max_limit);

        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            repositories.orders.clone(),
            repositories.clients.clone(),
            repositories.bills.clone(),
            notifier,
        ));
        let products = Arc::new(ProductService::new(
            db_pool.clone(),
            repositories.products.clone(),
            repositories.categories.clone(),
            cache.clone(),
        ));
        let categories = Arc::new(CategoryService::new(
            repositories.categories.clone(),
            cache.clone(),
        ));
        let clients = Arc::new(ClientService::new(repositories.clients.clone()));
        let auth = Arc::new(AuthService::from_config(db_pool, config));

        Self {
            orders,
            products,
            categories,
            clients,
            auth,
            repositories,
            cache,
        }
    }
}
