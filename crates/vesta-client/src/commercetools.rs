use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;
use vesta_core::error::AppError;
use vesta_core::{
    CatalogApi, CatalogEntity, Category, HttpConfig, LocalizedString, ProductType, Variant,
};

use crate::http::{endpoint, parse_base_url, send_error, status_error};

/// Tokens are refreshed this long before the expiry announced by the auth server.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Client credentials and endpoints of a commercetools project.
#[derive(Clone)]
pub struct CommercetoolsCredentials {
    pub project_key: String,
    pub client_id: String,
    pub client_secret: String,
    /// Space-separated scopes; the auth server's default scopes are used when `None`.
    pub scope: Option<String>,
    pub auth_url: String,
    pub api_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reference to another catalog resource (`{"typeId": "category", "id": "..."}`).
#[derive(Deserialize, Debug, Clone)]
pub struct Reference {
    pub id: String,
}

/// Data Transfer Object for a commercetools product.
///
/// Only the `current` projection of the master data is read; staged changes are ignored.
///
/// # Examples
///
/// ```
/// use vesta_client::commercetools::CtProduct;
///
/// let json = r#"{
///     "id": "p1",
///     "version": 7,
///     "productType": {"typeId": "product-type", "id": "t1"},
///     "masterData": {
///         "published": true,
///         "current": {
///             "name": {"en-US": "Shirt"},
///             "categories": [{"typeId": "category", "id": "c1"}],
///             "masterVariant": {"id": 1, "sku": "SHIRT-1"},
///             "variants": []
///         }
///     }
/// }"#;
///
/// let product: CtProduct = serde_json::from_str(json).unwrap();
/// let entity = product.into_catalog_entity();
/// assert_eq!(entity.type_id, "t1");
/// assert_eq!(entity.category_ids, vec!["c1".to_string()]);
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CtProduct {
    pub id: String,
    pub key: Option<String>,
    pub product_type: Reference,
    pub master_data: MasterData,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MasterData {
    pub current: ProductData,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    pub name: LocalizedString,
    pub description: Option<LocalizedString>,
    #[serde(default)]
    pub categories: Vec<Reference>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub master_variant: Variant,
}

impl CtProduct {
    /// Flattens the product into the catalog snapshot the sync pipeline works on.
    pub fn into_catalog_entity(self) -> CatalogEntity {
        let current = self.master_data.current;
        CatalogEntity {
            id: self.id,
            key: self.key,
            type_id: self.product_type.id,
            name: current.name,
            description: current.description,
            category_ids: current.categories.into_iter().map(|c| c.id).collect(),
            variants: current.variants,
            master_variant: current.master_variant,
        }
    }
}

/// HTTP client for the commercetools HTTP API.
///
/// Authenticates with the OAuth2 client-credentials flow and caches the access token until
/// shortly before it expires. Clones share the token cache.
///
/// # Examples
///
/// ```no_run
/// use vesta_client::{CommercetoolsClient, CommercetoolsCredentials};
/// use vesta_core::{CatalogApi, HttpConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CommercetoolsClient::new(
///     CommercetoolsCredentials {
///         project_key: "my-shop".to_string(),
///         client_id: "id".to_string(),
///         client_secret: "secret".to_string(),
///         scope: None,
///         auth_url: "https://auth.europe-west1.gcp.commercetools.com".to_string(),
///         api_url: "https://api.europe-west1.gcp.commercetools.com".to_string(),
///     },
///     HttpConfig::default(),
/// )?;
/// let product = client.get_product("p1").await?;
/// println!("{:?}", product.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CommercetoolsClient {
    client: Client,
    auth_url: Url,
    api_url: Url,
    project_key: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    http: HttpConfig,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl CommercetoolsClient {
    /// Creates a new client for one commercetools project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the auth or API URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(credentials: CommercetoolsCredentials, http: HttpConfig) -> Result<Self, AppError> {
        let auth_url = parse_base_url(&credentials.auth_url)?;
        let api_url = parse_base_url(&credentials.api_url)?;

        let client = Client::builder()
            .user_agent("Vesta/0.1 (catalog-sync)")
            .timeout(http.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            auth_url,
            api_url,
            project_key: credentials.project_key,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            scope: credentials.scope,
            http,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns a valid access token, fetching a new one when the cached one is stale.
    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let url = endpoint(&self.auth_url, &["oauth", "token"])?;
        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }

        let resp = self
            .client
            .post(url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| send_error(e, self.http.timeout.as_secs()))?;

        if !resp.status().is_success() {
            return Err(status_error(resp, "oauth/token").await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::InvalidResponse(format!("token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "Fetched commercetools access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Fetches `{api_url}/{project_key}/{segments...}` and parses the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, AppError> {
        let mut path = vec![self.project_key.as_str()];
        path.extend_from_slice(segments);
        let url = endpoint(&self.api_url, &path)?;

        let what = segments.join("/");
        let resp = self.request_with_retry(&url, &what).await?;

        resp.json()
            .await
            .map_err(|e| AppError::InvalidResponse(format!("{}: {}", what, e)))
    }

    /// Makes an authenticated GET request with automatic retry on transient failures.
    ///
    /// Retries with backoff on:
    /// - Network errors and timeouts
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    ///
    /// A rejected token (401) is dropped and the request repeated once with a fresh one,
    /// within the same attempt.
    async fn request_with_retry(
        &self,
        url: &Url,
        what: &str,
    ) -> Result<reqwest::Response, AppError> {
        let max_retries = self.http.max_retries.max(1);
        let base_delay = self.http.retry_base_delay;
        let mut attempt: u32 = 1;
        let mut token_refreshed = false;

        loop {
            let token = self.access_token().await?;

            match self.client.get(url.clone()).bearer_auth(token).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::UNAUTHORIZED && !token_refreshed {
                        warn!(resource = what, "Access token rejected, fetching a new one");
                        self.invalidate_token().await;
                        token_refreshed = true;
                        continue;
                    }

                    // Rate limited - retry with exponential backoff
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt < max_retries {
                            sleep(base_delay * 2_u32.pow(attempt)).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(AppError::RateLimitExceeded);
                    }

                    // Server error - retry
                    if status.is_server_error() && attempt < max_retries {
                        sleep(base_delay * attempt).await;
                        attempt += 1;
                        continue;
                    }

                    // Client error, or server error on the last attempt - give up
                    return Err(status_error(resp, what).await);
                }
                Err(e) => {
                    let retry = e.is_timeout() || e.is_connect();
                    if retry && attempt < max_retries {
                        sleep(base_delay * attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(send_error(e, self.http.timeout.as_secs()));
                }
            }
        }
    }
}

#[async_trait]
impl CatalogApi for CommercetoolsClient {
    async fn get_product(&self, id: &str) -> Result<CatalogEntity, AppError> {
        let product: CtProduct = self.get_json(&["products", id]).await?;
        Ok(product.into_catalog_entity())
    }

    async fn get_product_type(&self, id: &str) -> Result<ProductType, AppError> {
        self.get_json(&["product-types", id]).await
    }

    async fn get_category(&self, id: &str) -> Result<Category, AppError> {
        self.get_json(&["categories", id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN_BODY: &str = r#"{"access_token": "tok-1", "token_type": "Bearer", "expires_in": 172800, "scope": "view_products:shop"}"#;

    const PRODUCT_BODY: &str = r#"{
        "id": "p1",
        "key": "linen-shirt",
        "productType": {"typeId": "product-type", "id": "t1"},
        "masterData": {
            "published": true,
            "current": {
                "name": {"en-US": "Linen Shirt", "de": "Leinenhemd"},
                "categories": [{"typeId": "category", "id": "c1"}, {"typeId": "category", "id": "c2"}],
                "masterVariant": {"id": 1, "sku": "LS-1", "prices": [], "attributes": [{"name": "size", "value": "M"}]},
                "variants": [
                    {"id": 2, "sku": "LS-2", "prices": [{"value": {"centAmount": 4900, "currencyCode": "EUR"}}], "attributes": []},
                    {"id": 3, "sku": "LS-3"}
                ]
            },
            "staged": {"name": {"en-US": "ignored"}, "masterVariant": {"id": 1}}
        }
    }"#;

    fn http_config() -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    fn client_for(server: &ServerGuard) -> CommercetoolsClient {
        client_with(server, http_config())
    }

    fn client_with(server: &ServerGuard, http: HttpConfig) -> CommercetoolsClient {
        CommercetoolsClient::new(
            CommercetoolsCredentials {
                project_key: "shop".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                scope: Some("view_products:shop".to_string()),
                auth_url: server.url(),
                api_url: server.url(),
            },
            http,
        )
        .unwrap()
    }

    async fn mock_token(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("scope".into(), "view_products:shop".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(hits)
            .create_async()
            .await
    }

    #[test]
    fn test_new_with_invalid_url() {
        let result = CommercetoolsClient::new(
            CommercetoolsCredentials {
                project_key: "shop".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                scope: None,
                auth_url: "not-a-valid-url".to_string(),
                api_url: "https://api.example.com".to_string(),
            },
            HttpConfig::default(),
        );
        assert!(matches!(result, Err(AppError::InvalidUrl(_))));
    }

    #[test]
    fn test_product_conversion_reads_current_projection() {
        let product: CtProduct = serde_json::from_str(PRODUCT_BODY).unwrap();
        let entity = product.into_catalog_entity();

        assert_eq!(entity.id, "p1");
        assert_eq!(entity.key.as_deref(), Some("linen-shirt"));
        assert_eq!(entity.name["en-US"], "Linen Shirt");
        assert!(entity.description.is_none());
        assert_eq!(entity.category_ids, vec!["c1", "c2"]);
        assert_eq!(entity.variants.len(), 2);
        assert!(entity.variants[1].prices.is_empty());
        assert_eq!(entity.master_variant.sku.as_deref(), Some("LS-1"));
    }

    #[tokio::test]
    async fn test_get_product_authenticates_and_parses() {
        let mut server = Server::new_async().await;
        let token = mock_token(&mut server, 1).await;
        let product = server
            .mock("GET", "/shop/products/p1")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PRODUCT_BODY)
            .create_async()
            .await;

        let entity = client_for(&server).get_product("p1").await.unwrap();

        assert_eq!(entity.type_id, "t1");
        assert_eq!(entity.variants.len(), 2);
        token.assert_async().await;
        product.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_is_cached_across_requests() {
        let mut server = Server::new_async().await;
        let token = mock_token(&mut server, 1).await;
        server
            .mock("GET", "/shop/categories/c1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "c1", "version": 2, "name": {"en-US": "Shirts"}, "slug": {"en-US": "shirts"}}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.get_category("c1").await.unwrap();
        let second = client.clone().get_category("c1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name["en-US"], "Shirts");
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_product_type() {
        let mut server = Server::new_async().await;
        mock_token(&mut server, 1).await;
        server
            .mock("GET", "/shop/product-types/t1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "t1", "key": "apparel", "name": "Apparel", "description": "", "attributes": []}"#)
            .create_async()
            .await;

        let product_type = client_for(&server).get_product_type("t1").await.unwrap();
        assert_eq!(product_type.name, "Apparel");
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let mut server = Server::new_async().await;
        mock_token(&mut server, 1).await;
        let missing = server
            .mock("GET", "/shop/products/ghost")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode": 404, "message": "The Resource with ID 'ghost' was not found."}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server).get_product("ghost").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = Server::new_async().await;
        mock_token(&mut server, 1).await;
        let failing = server
            .mock("GET", "/shop/products/p1")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let err = client_for(&server).get_product("p1").await.unwrap_err();

        assert!(matches!(err, AppError::ClientError(ref msg) if msg.contains("HTTP 503")));
        assert!(err.is_retryable());
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode": 401, "message": "Please provide valid client credentials."}"#)
            .create_async()
            .await;

        let err = client_for(&server).get_product("p1").await.unwrap_err();

        match err {
            AppError::Unauthorized(msg) => assert!(msg.contains("valid client credentials")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_replaced_within_one_attempt() {
        let mut server = Server::new_async().await;
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = issued.clone();
        let token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!(r#"{{"access_token": "tok-{n}", "expires_in": 172800}}"#).into_bytes()
            })
            .expect(2)
            .create_async()
            .await;
        let revoked = server
            .mock("GET", "/shop/product-types/t1")
            .match_header("authorization", "Bearer tok-1")
            .with_status(401)
            .with_body(r#"{"statusCode": 401, "message": "invalid_token"}"#)
            .expect(1)
            .create_async()
            .await;
        let fresh = server
            .mock("GET", "/shop/product-types/t1")
            .match_header("authorization", "Bearer tok-2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "t1", "name": "Apparel"}"#)
            .expect(1)
            .create_async()
            .await;

        let single_attempt = HttpConfig {
            max_retries: 1,
            ..http_config()
        };
        let product_type = client_with(&server, single_attempt)
            .get_product_type("t1")
            .await
            .unwrap();

        assert_eq!(product_type.name, "Apparel");
        assert_eq!(issued.load(Ordering::SeqCst), 2);
        token.assert_async().await;
        revoked.assert_async().await;
        fresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_fetched_again() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok-1", "expires_in": 30}"#)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/shop/categories/c1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "c1", "name": {"en-US": "Shirts"}}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        client.get_category("c1").await.unwrap();
        client.get_category("c1").await.unwrap();

        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_request_is_rejected_without_retry() {
        let mut server = Server::new_async().await;
        mock_token(&mut server, 1).await;
        let bad = server
            .mock("GET", "/shop/products/p1")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode": 400, "message": "Malformed parameter: id"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server).get_product("p1").await.unwrap_err();

        assert!(matches!(err, AppError::Rejected(ref msg) if msg.contains("Malformed parameter")));
        assert!(!err.is_retryable());
        bad.assert_async().await;
    }
}
