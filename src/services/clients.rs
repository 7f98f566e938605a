use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    entities::{client, UserRole},
    errors::ServiceError,
    repositories::ClientRepository,
};

/// Client as exposed over HTTP; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientView {
    pub id: i32,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub telephone: Option<String>,
    pub role: UserRole,
    /// True for clients created at checkout that never registered
    pub guest: bool,
}

impl From<client::Model> for ClientView {
    fn from(model: client::Model) -> Self {
        let guest = model.is_guest();
        Self {
            id: model.id,
            name: model.name,
            lastname: model.lastname,
            email: model.email,
            telephone: model.telephone,
            role: model.role,
            guest,
        }
    }
}

/// Read and update access to clients. Creation goes through registration or checkout.
#[derive(Clone)]
pub struct ClientService {
    clients: ClientRepository,
}

impl ClientService {
    pub fn new(clients: ClientRepository) -> Self {
        Self { clients }
    }

    pub async fn get_client(&self, id: i32) -> Result<ClientView, ServiceError> {
        Ok(self.clients.find(id).await?.into())
    }

    pub async fn list_clients(&self, skip: i64, limit: i64) -> Result<Vec<ClientView>, ServiceError> {
        Ok(self
            .clients
            .find_all(skip, limit)
            .await?
            .into_iter()
            .map(ClientView::from)
            .collect())
    }

    /// `password_hash` and `role` are protected and rejected like unknown fields
    #[instrument(skip(self, changes))]
    pub async fn update_client(
        &self,
        id: i32,
        mut changes: Map<String, Value>,
    ) -> Result<ClientView, ServiceError> {
        if let Some(Value::String(email)) = changes.get_mut("email") {
            *email = email.trim().to_lowercase();
        }
        let updated = self.clients.update(id, changes).await?;
        info!(client_id = id, "Client updated");
        Ok(updated.into())
    }
}
