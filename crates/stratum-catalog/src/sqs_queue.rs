//! `sqs-queue`: a message queue, standard or FIFO.

use crate::fields::{bool_field, fill_default, str_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "sqs-queue";

const FIFO_SUFFIX: &str = ".fifo";
const MAX_QUEUE_NAME: usize = 80;

pub struct SqsQueue;

impl ComponentDefinition for SqsQueue {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "Message queue"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/sqs-queue.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "fifo": false,
            "visibilityTimeoutSeconds": 30,
            "messageRetentionSeconds": 345600,
            "encryption": "SQS_MANAGED",
            "deadLetterQueue": { "enabled": false, "maxReceiveCount": 3 }
        })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate => json!({
                "deadLetterQueue": { "enabled": true }
            }),
            ComplianceFramework::FedrampHigh => json!({
                "deadLetterQueue": { "enabled": true },
                "messageRetentionSeconds": 1209600
            }),
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::FedrampHigh => json!({ "encryption": "KMS" }),
            _ => json!({}),
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new(
            "queue:sqs",
            &["queueUrl", "queueArn", "queueName"],
        )]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        let fifo = bool_field(config, "fifo");
        fill_default(config, "queueName", ctx.default_resource_name());

        let name = str_field(config, "queueName").unwrap_or_default().to_string();
        let name = match (fifo, name.ends_with(FIFO_SUFFIX)) {
            (true, false) => format!("{}{}", name, FIFO_SUFFIX),
            (false, true) => {
                return Err(NormalizeError::new(
                    "queueName",
                    format!("queue name '{}' ends with .fifo but fifo is false", name),
                )
                .with_suggestion("Set `fifo: true` or drop the .fifo suffix"));
            }
            _ => name,
        };

        if name.len() > MAX_QUEUE_NAME {
            return Err(NormalizeError::new(
                "queueName",
                format!("queue name '{}' exceeds {} characters", name, MAX_QUEUE_NAME),
            ));
        }
        config.insert("queueName".to_string(), Value::String(name));

        if bool_field(config, "contentBasedDeduplication") && !fifo {
            return Err(NormalizeError::new(
                "contentBasedDeduplication",
                "content-based deduplication is only available on FIFO queues",
            )
            .with_suggestion("Set `fifo: true` or remove `contentBasedDeduplication`"));
        }

        Ok(())
    }
}
