use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use super::metadata::InquirySpec;
use crate::error::{AcumaticaError, ModelError};
use crate::method::HttpMethod;
use crate::odata::QueryOptions;
use crate::transport::{Request, Transport};

/// Service name reported for inquiry lookups.
const SERVICE_NAME: &str = "Inquiries";

/// The generic inquiries service: one method per published inquiry.
#[derive(Debug, Clone)]
pub struct Inquiries {
    methods: BTreeMap<String, InquirySpec>,
    transport: Arc<Transport>,
}

impl Inquiries {
    pub fn bind<'a>(
        specs: impl IntoIterator<Item = &'a InquirySpec>,
        transport: &Arc<Transport>,
    ) -> Self {
        let methods = specs
            .into_iter()
            .map(|spec| (spec.method_name.clone(), spec.clone()))
            .collect();
        Self {
            methods,
            transport: Arc::clone(transport),
        }
    }

    /// Looks up an inquiry by method name.
    pub fn get(&self, method: &str) -> Option<&InquirySpec> {
        self.methods.get(method)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InquirySpec> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Builds the GET request for an inquiry.
    pub fn request(
        &self,
        method: &str,
        options: Option<&QueryOptions>,
    ) -> Result<Request, AcumaticaError> {
        let spec = self.get(method).ok_or_else(|| ModelError::UnknownMethod {
            service: SERVICE_NAME.to_string(),
            method: method.to_string(),
        })?;
        let url = self.transport.inquiry_url(&spec.name)?;
        let params = options.map(QueryOptions::to_params).unwrap_or_default();
        Ok(Request::new(HttpMethod::Get, url).query(params))
    }

    /// Runs an inquiry and returns the OData response body.
    #[instrument(skip(self, options))]
    pub async fn call(
        &self,
        method: &str,
        options: Option<QueryOptions>,
    ) -> Result<Option<Value>, AcumaticaError> {
        let request = self.request(method, options.as_ref())?;
        self.transport.send(&request).await
    }
}
