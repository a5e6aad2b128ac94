//! `service:connect`: service-to-service calls over the private network.

use super::{COMPUTE_SOURCES, config_port, matrix};
use crate::error::BindingError;
use crate::strategy::{
    BinderStrategy, BindingContext, BindingResult, CompatibilityEntry, supported_access,
};
use stratum_core::AccessLevel;

const CAPABILITY: &str = "service:connect";
const DEFAULT_PORT: u16 = 8080;

pub struct ServiceConnectBinder;

impl BinderStrategy for ServiceConnectBinder {
    fn name(&self) -> &'static str {
        "service-connect"
    }

    fn capability(&self) -> &'static str {
        CAPABILITY
    }

    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        matrix(
            CAPABILITY,
            &COMPUTE_SOURCES,
            &[AccessLevel::Read, AccessLevel::Write, AccessLevel::Readwrite],
            "Service endpoint and ingress on the service port",
        )
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        ctx.require_access(&supported_access(&self.compatibility_matrix(), ctx.source_type))?;

        let port = config_port(ctx.target_config, "port", DEFAULT_PORT);
        let mut result = ctx.result(self.name());
        result
            .env(ctx, "SERVICE_ENDPOINT", ctx.attribute("endpoint"))
            .allow(port, "tcp", format!("{} to {}", ctx.source, ctx.target))
            .meta("port", port);

        Ok(result)
    }
}
