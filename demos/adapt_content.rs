use std::sync::Arc;

use serde::Deserialize;
use storyframe_client::{ApiClient, FileTokenStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Adapted {
    adapted_content: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api = ApiClient::from_env()
        .map_err(anyhow::Error::msg)?
        .with_token_store(Arc::new(FileTokenStore::new("token.json")))
        .with_bearer_auth();

    let response = api
        .post::<Adapted, _>(
            "/ai/adapt-content",
            &serde_json::json!({
                "content": "Three hooks that stop the scroll",
                "tone": "energetic",
                "filter": "short-form",
            }),
        )
        .await?;

    match (response.data, response.error) {
        (Some(adapted), _) => println!("{}", adapted.adapted_content),
        (None, error) => eprintln!(
            "request {} failed ({}): {}",
            response.request_id,
            response.status,
            error.unwrap_or_default()
        ),
    }

    Ok(())
}
