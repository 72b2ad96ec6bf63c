//! HTTP client for the Konsol payments API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{
    BankMember, ContractorCreated, ContractorProfile, CreatePaymentRequest, GatewayError,
    GatewayPayment, PayoutGateway,
};

/// Bearer-authenticated Konsol client
#[derive(Debug, Clone)]
pub struct KonsolClient {
    client: Client,
    base_url: String,
    token: String,
}

impl KonsolClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::error!(endpoint, status = status.as_u16(), body = %body, "Konsol API error");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(endpoint, status = status.as_u16(), "Konsol API request succeeded");
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}: {body}")))
    }
}

/// Bank list comes either bare or wrapped in `items`
#[derive(Deserialize)]
#[serde(untagged)]
enum BankMembersResponse {
    List(Vec<BankMember>),
    Wrapped { items: Vec<BankMember> },
}

#[async_trait]
impl PayoutGateway for KonsolClient {
    async fn register_contractor(&self, profile: &ContractorProfile) -> Result<String, GatewayError> {
        let request = self.client.post(self.url("api/contractors")).json(profile);
        let created: ContractorCreated = self.send(request, "POST /api/contractors").await?;
        Ok(created.id)
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        let builder = self.client.post(self.url("api/payments")).json(request);
        self.send(builder, "POST /api/payments").await
    }

    async fn get_payment(&self, konsol_id: &str) -> Result<GatewayPayment, GatewayError> {
        let request = self.client.get(self.url(&format!("api/payments/{konsol_id}")));
        self.send(request, "GET /api/payments/{id}").await
    }

    async fn list_bank_members(&self) -> Result<Vec<BankMember>, GatewayError> {
        let request = self.client.get(self.url("api/fps_bank_members"));
        let members: BankMembersResponse = self.send(request, "GET /api/fps_bank_members").await?;
        Ok(match members {
            BankMembersResponse::List(items) | BankMembersResponse::Wrapped { items } => items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client =
            KonsolClient::new("https://konsol.example/", "token", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("/api/payments/pay_1"),
            "https://konsol.example/api/payments/pay_1"
        );
        assert_eq!(client.url("api/contractors"), "https://konsol.example/api/contractors");
    }

    #[test]
    fn test_bank_members_both_shapes() {
        let bare: BankMembersResponse =
            serde_json::from_str(r#"[{"id":"100000000011","name":"Sber","bic":"044525225"}]"#)
                .unwrap();
        let wrapped: BankMembersResponse =
            serde_json::from_str(r#"{"items":[{"id":"100000000011","name":"Sber"}]}"#).unwrap();

        for response in [bare, wrapped] {
            let items = match response {
                BankMembersResponse::List(items) | BankMembersResponse::Wrapped { items } => items,
            };
            assert_eq!(items[0].name, "Sber");
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client =
            KonsolClient::new("http://127.0.0.1:9", "token", Duration::from_secs(2)).unwrap();
        let err = client.get_payment("pay_1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_) | GatewayError::Timeout));
        assert_eq!(err.status(), None);
    }
}
