//! Terminology provider integration
//!
//! Real terminology services are remote; the provider trait is async. The
//! evaluator itself is synchronous, so [`TerminologyAdapter`] bridges the
//! two by blocking on the current Tokio runtime for each call.

use crate::{Coding, ConceptSubsumptionOutcome, TerminologyService, ValidationOutcome};
use async_trait::async_trait;
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Asynchronous terminology provider, typically HTTP-backed
#[async_trait]
pub trait TerminologyProvider: Send + Sync {
    /// Expand a value set
    async fn expand(&self, value_set_url: &str) -> Result<JsonValue>;

    /// Look up a coding
    async fn lookup(&self, coding: &Coding) -> Result<JsonValue>;

    /// Validate a coding against a value set
    async fn validate_vs(&self, value_set_url: &str, coding: &Coding)
    -> Result<ValidationOutcome>;

    /// Validate a coding against a code system
    async fn validate_cs(
        &self,
        code_system_url: &str,
        coding: &Coding,
    ) -> Result<ValidationOutcome>;

    /// Translate a coding through a concept map
    async fn translate(&self, concept_map_url: &str, coding: &Coding) -> Result<JsonValue>;

    /// Test subsumption between two codings
    async fn subsumes(&self, a: &Coding, b: &Coding) -> Result<ConceptSubsumptionOutcome>;
}

/// Adapter exposing an async provider to the synchronous evaluator
pub struct TerminologyAdapter {
    provider: Arc<dyn TerminologyProvider>,
}

impl TerminologyAdapter {
    /// Wrap an async provider
    pub fn new(provider: Arc<dyn TerminologyProvider>) -> Self {
        Self { provider }
    }

    /// The underlying provider
    pub fn inner(&self) -> &Arc<dyn TerminologyProvider> {
        &self.provider
    }

    fn block_on<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
            Err(_) => Err(FhirPathError::terminology(
                "Terminology provider requires a Tokio runtime",
            )),
        }
    }
}

impl TerminologyService for TerminologyAdapter {
    fn expand(&self, value_set_url: &str) -> Result<JsonValue> {
        self.block_on(self.provider.expand(value_set_url))
    }

    fn lookup(&self, coding: &Coding) -> Result<JsonValue> {
        self.block_on(self.provider.lookup(coding))
    }

    fn validate_vs(&self, value_set_url: &str, coding: &Coding) -> Result<ValidationOutcome> {
        self.block_on(self.provider.validate_vs(value_set_url, coding))
    }

    fn validate_cs(&self, code_system_url: &str, coding: &Coding) -> Result<ValidationOutcome> {
        self.block_on(self.provider.validate_cs(code_system_url, coding))
    }

    fn translate(&self, concept_map_url: &str, coding: &Coding) -> Result<JsonValue> {
        self.block_on(self.provider.translate(concept_map_url, coding))
    }

    fn subsumes(&self, a: &Coding, b: &Coding) -> Result<ConceptSubsumptionOutcome> {
        self.block_on(self.provider.subsumes(a, b))
    }
}
