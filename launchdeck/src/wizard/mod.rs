//! Deployment creation wizard

pub mod draft;
pub mod store;

use openapi_models::{CreateDeploymentResponse, Validate};
use tracing::info;

use crate::errors::DeckError;
use crate::http::client::HttpClient;
use crate::wizard::draft::Draft;
use crate::wizard::store::DraftStore;

/// Submit the draft as a new deployment.
///
/// Nothing is sent when the draft cannot be mapped to a valid request. The
/// stored draft is cleared only once the platform accepted it.
pub async fn submit(
    draft: &Draft,
    client: &HttpClient,
    store: &DraftStore,
) -> Result<CreateDeploymentResponse, DeckError> {
    let request = draft.to_request()?;
    request.validate()?;

    let created = client.create_deployment(&request).await?;
    info!(
        "Submitted app {} as deployment {}",
        created.app.id, created.deployment.id
    );

    store.clear().await?;
    Ok(created)
}
