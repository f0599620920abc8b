use serde::Serialize;
use tidewire_application::{InboundDisposition, InboundReceipt};
use ts_rs::TS;

/// Acknowledgement returned to the calling integration.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "inbound-receipt-response.ts")]
pub struct InboundReceiptResponse {
    pub id: String,
    pub integration_id: String,
    pub event_type: String,
    pub received_at: String,
    pub duplicate: bool,
}

impl From<&InboundReceipt> for InboundReceiptResponse {
    fn from(value: &InboundReceipt) -> Self {
        Self {
            id: value.event.id.to_string(),
            integration_id: value.event.integration_id.to_string(),
            event_type: value.event.event_type.clone(),
            received_at: value.event.received_at.to_rfc3339(),
            duplicate: value.disposition == InboundDisposition::Duplicate,
        }
    }
}
