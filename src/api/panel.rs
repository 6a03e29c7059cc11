//! Typed panel endpoints

use super::client::{ApiRequest, PagedApiClient};
use super::error::ApiError;
use super::models::{Backup, Server};
use crate::config::ApiConfig;
use tracing::debug;

/// Status the panel uses to throttle backup creation
const TOO_MANY_REQUESTS: u16 = 429;

/// Server and backup operations over [`PagedApiClient`]
pub struct PanelApi {
    client: PagedApiClient,
    servers_url: String,
    backups_url: String,
}

impl PanelApi {
    pub fn new(client: PagedApiClient, config: &ApiConfig) -> Self {
        Self {
            client,
            servers_url: config.servers_url.clone(),
            backups_url: config.backups_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &PagedApiClient {
        &self.client
    }

    fn backups_endpoint(&self, server_id: &str) -> String {
        format!("{}/{}/backups", self.backups_url, server_id)
    }

    fn backup_endpoint(&self, server_id: &str, uuid: &str) -> String {
        format!("{}/{}/backups/{}", self.backups_url, server_id, uuid)
    }

    /// Every server visible to the API key, across all pages
    pub fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let value = self.client.get_all(&self.servers_url)?;
        let page = Server::page_from_json(&value)?;
        debug!("Listed {} servers", page.items.len());
        Ok(page.items)
    }

    /// Every backup of a server, in the order the panel returned them
    pub fn list_backups(&self, server_id: &str) -> Result<Vec<Backup>, ApiError> {
        let value = self.client.get_all(&self.backups_endpoint(server_id))?;
        let page = Backup::page_from_json(&value)?;
        debug!("Listed {} backups for server {}", page.items.len(), server_id);
        Ok(page.items)
    }

    pub fn create_backup(&self, server_id: &str) -> Result<Backup, ApiError> {
        let request = ApiRequest::post(self.backups_endpoint(server_id), None)
            .retry_on_status(TOO_MANY_REQUESTS);
        let value = self.client.request(&request)?;
        Backup::from_json(&value)
    }

    pub fn get_backup(&self, server_id: &str, uuid: &str) -> Result<Backup, ApiError> {
        let value = self
            .client
            .request(&ApiRequest::get(self.backup_endpoint(server_id, uuid)))?;
        Backup::from_json(&value)
    }

    pub fn delete_backup(&self, server_id: &str, uuid: &str) -> Result<(), ApiError> {
        self.client
            .request(&ApiRequest::delete(self.backup_endpoint(server_id, uuid)))?;
        Ok(())
    }
}
