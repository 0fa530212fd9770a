//! Subdomain API client

use openapi_models::SubdomainCheckResponse;

use crate::errors::DeckError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Ask whether a subdomain is free. A suggestion comes back when it is taken.
    pub async fn check_subdomain(&self, name: &str) -> Result<SubdomainCheckResponse, DeckError> {
        self.get_with_query("/subdomains/check", &[("name", name)])
            .await
    }
}
