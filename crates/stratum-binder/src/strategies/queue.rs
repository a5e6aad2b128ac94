//! `queue:sqs`: send to or consume from a queue.

use super::{COMPUTE_SOURCES, matrix};
use crate::error::BindingError;
use crate::strategy::{
    BinderStrategy, BindingContext, BindingResult, CompatibilityEntry, supported_access,
};
use serde_json::Value;
use stratum_core::AccessLevel;

const CAPABILITY: &str = "queue:sqs";

const CONSUME_ACTIONS: &[&str] = &[
    "sqs:ReceiveMessage",
    "sqs:DeleteMessage",
    "sqs:ChangeMessageVisibility",
    "sqs:GetQueueAttributes",
];
const SEND_ACTIONS: &[&str] = &["sqs:SendMessage", "sqs:GetQueueAttributes"];

pub struct SqsBinder;

impl BinderStrategy for SqsBinder {
    fn name(&self) -> &'static str {
        "sqs"
    }

    fn capability(&self) -> &'static str {
        CAPABILITY
    }

    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        matrix(
            CAPABILITY,
            &COMPUTE_SOURCES,
            &[AccessLevel::Read, AccessLevel::Write, AccessLevel::Readwrite],
            "Queue URL and send/consume grants",
        )
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        ctx.require_access(&supported_access(&self.compatibility_matrix(), ctx.source_type))?;

        let arn = ctx.attribute("queueArn");
        let mut result = ctx.result(self.name());
        result
            .env(ctx, "QUEUE_URL", ctx.attribute("queueUrl"))
            .env(ctx, "QUEUE_ARN", arn.clone());

        let access = ctx.access();
        if access.allows_read() {
            result.grant(CONSUME_ACTIONS, arn.clone());
        }
        if access.allows_write() {
            result.grant(SEND_ACTIONS, arn);
        }

        let fifo = ctx
            .target_config
            .get("fifo")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        result.meta("fifo", fifo);
        if access.allows_read() && ctx.source_type == "lambda-api" {
            result.meta("eventSource", true);
        }

        Ok(result)
    }
}
