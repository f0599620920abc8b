use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use tidewire_core::{AppError, AppResult};

use crate::AuditEventId;

/// Position of one record in the ledger total order.
///
/// Ledger order is `(occurred_at desc, id desc)`; the derived ordering here is
/// the ascending counterpart, so "older" means `Less`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerPosition {
    /// Commit timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Tie-breaking record identifier.
    pub id: AuditEventId,
}

/// Opaque history pagination token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor(LedgerPosition);

impl HistoryCursor {
    /// Creates a cursor pointing just after `position` in ledger order.
    #[must_use]
    pub fn after(position: LedgerPosition) -> Self {
        Self(position)
    }

    /// Returns the last position already seen by the caller.
    #[must_use]
    pub fn position(&self) -> LedgerPosition {
        self.0
    }

    /// Encodes the cursor as a URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.0
                .occurred_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.0.id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decodes a token produced by [`HistoryCursor::encode`].
    pub fn decode(token: &str) -> AppResult<Self> {
        let invalid = || AppError::Validation(format!("invalid history cursor '{token}'"));

        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().as_bytes())
            .map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (occurred_at, id) = raw.split_once('|').ok_or_else(invalid)?;

        let occurred_at = DateTime::parse_from_rfc3339(occurred_at)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        let id = id.parse::<AuditEventId>().map_err(|_| invalid())?;

        Ok(Self(LedgerPosition { occurred_at, id }))
    }
}
