use super::{ProviderError, ResponseObject, ResponsesProvider, ResponsesRequest};
use crate::config::Settings;
use async_trait::async_trait;
use reqwest::Client;

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let key = settings.openai_api_key.clone().ok_or_else(|| {
            ProviderError::Config(
                "no OpenAI API key (set OPENAI_API_KEY or [openai].api_key)".into(),
            )
        })?;
        Self::new(settings.openai_base_url.clone(), key)
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ResponsesProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn create_response(&self, req: ResponsesRequest) -> Result<ResponseObject, ProviderError> {
        let url = self.endpoint();
        tracing::debug!(%url, model = %req.model, tools = req.tools.len(), "creating response");
        let body = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let resp: ResponseObject = serde_json::from_slice(&body)?;
        resp.into_result()
    }
}
