//! The connected client facade.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::cache::{CacheStats, DifferentialCache, EndpointIdentity, Generation};
use crate::config::ClientConfig;
use crate::error::{AcumaticaError, ConfigError, ModelError, ValidationError};
use crate::inquiry::Inquiries;
use crate::model::{ModelInstance, ModelRegistry, materialize};
use crate::service::{Service, ServiceRegistry};
use crate::transport::Transport;

/// A client whose models and services were generated from the live
/// schema of one endpoint.
///
/// ## Examples
///
/// ```rust,no_run
/// use acumatica_client::{AcumaticaClient, ClientConfig};
///
/// # async fn run() -> Result<(), acumatica_client::AcumaticaError> {
/// let config = ClientConfig::builder("https://erp.example.com", "admin", "secret", "Company")
///     .build()?;
/// let client = AcumaticaClient::connect(config).await?;
///
/// let mut contact = client.models().instantiate("Contact")?;
/// contact.set("DisplayName", "Jane Doe")?;
/// client.service("Contact")?.put_entity(contact, None, None).await?;
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AcumaticaClient {
    config: ClientConfig,
    transport: Arc<Transport>,
    endpoint_version: String,
    models: ModelRegistry,
    services: ServiceRegistry,
    inquiries: Inquiries,
    cache_stats: CacheStats,
}

impl AcumaticaClient {
    /// Logs in, discovers the endpoint version, fetches the schema (and
    /// the inquiry metadata when enabled) and generates everything.
    ///
    /// Either every model and service is available or this fails; the
    /// session is closed again on failure.
    ///
    /// ## Errors
    ///
    /// Returns transport errors, [`ConfigError::UnknownEndpointVersion`]
    /// when the server does not advertise the endpoint, and schema errors
    /// from generation. Cache failures are logged, never returned.
    #[instrument(skip(config), fields(base_url = %config.base_url, endpoint = %config.endpoint_name))]
    pub async fn connect(config: ClientConfig) -> Result<Self, AcumaticaError> {
        let transport = Arc::new(Transport::new(&config)?);
        if config.persistent_login {
            transport.login().await?;
        }

        match Self::generate(&config, &transport).await {
            Ok((version, generation)) => Self::assemble(config, transport, version, generation),
            Err(e) => {
                if let Err(logout) = transport.logout().await {
                    warn!(error = %logout, "logout after failed connect");
                }
                Err(e)
            }
        }
    }

    async fn generate(
        config: &ClientConfig,
        transport: &Transport,
    ) -> Result<(String, Generation), AcumaticaError> {
        let version = match &config.endpoint_version {
            Some(version) => version.clone(),
            None => transport
                .endpoints()
                .await?
                .remove(&config.endpoint_name)
                .ok_or_else(|| ConfigError::UnknownEndpointVersion {
                    endpoint: config.endpoint_name.clone(),
                })?,
        };

        let schema = transport
            .fetch_schema(&config.endpoint_name, &version)
            .await?;
        let metadata = if config.inquiries {
            Some(transport.fetch_inquiry_metadata().await?)
        } else {
            None
        };

        let identity = EndpointIdentity::new(
            config.base_url.as_str(),
            &config.tenant,
            &config.endpoint_name,
            &version,
        );
        let generation = DifferentialCache::new(config.cache.clone()).generate(
            &identity,
            &schema,
            metadata.as_deref(),
        )?;
        Ok((version, generation))
    }

    fn assemble(
        config: ClientConfig,
        transport: Arc<Transport>,
        endpoint_version: String,
        generation: Generation,
    ) -> Result<Self, AcumaticaError> {
        let models = materialize(generation.models.values())?;
        let services = ServiceRegistry::bind(
            generation.services.values(),
            &transport,
            &config.endpoint_name,
            &endpoint_version,
        );
        let inquiries = Inquiries::bind(generation.inquiries.values(), &transport);

        info!(
            version = %endpoint_version,
            models = models.len(),
            services = services.len(),
            inquiries = inquiries.len(),
            cache = %generation.stats.state,
            "client ready"
        );

        Ok(Self {
            config,
            transport,
            endpoint_version,
            models,
            services,
            inquiries,
            cache_stats: generation.stats,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The service for one schema tag.
    pub fn service(&self, tag: &str) -> Result<&Service, ModelError> {
        self.services.service(tag)
    }

    pub fn inquiries(&self) -> &Inquiries {
        &self.inquiries
    }

    pub fn list_models(&self) -> Vec<&str> {
        self.models.names().collect()
    }

    pub fn list_services(&self) -> Vec<&str> {
        self.services.names().collect()
    }

    /// How the cache contributed to this client's generation.
    pub fn cache_stats(&self) -> &CacheStats {
        &self.cache_stats
    }

    pub fn endpoint_name(&self) -> &str {
        &self.config.endpoint_name
    }

    pub fn endpoint_version(&self) -> &str {
        &self.endpoint_version
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Decodes an entity from a response body into a model instance.
    pub fn decode(&self, model: &str, body: &Value) -> Result<ModelInstance, AcumaticaError> {
        let model_type = self
            .models
            .get(model)
            .ok_or_else(|| ModelError::UnknownModel {
                name: model.to_string(),
            })?;
        let payload = body.as_object().ok_or_else(|| {
            ValidationError::UnexpectedShape(format!("expected a {model} object"))
        })?;
        Ok(ModelInstance::from_payload(Arc::clone(model_type), payload))
    }

    /// Ends the session.
    pub async fn close(self) -> Result<(), AcumaticaError> {
        self.transport.logout().await?;
        Ok(())
    }
}
