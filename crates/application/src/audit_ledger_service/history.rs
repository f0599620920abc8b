use super::*;

impl AuditLedgerService {
    pub(super) async fn history_page(
        &self,
        tenant_id: TenantId,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> AppResult<HistoryPage> {
        if limit == 0 {
            return Err(AppError::Validation(
                "history limit must be greater than zero".to_owned(),
            ));
        }
        let limit = limit.min(self.max_page_size);

        // One extra row tells whether another page exists.
        let mut items = self
            .repository
            .list_before(
                tenant_id,
                cursor.map(|cursor| cursor.position()),
                limit.saturating_add(1),
            )
            .await?;

        let has_more = items.len() > limit;
        items.truncate(limit);

        let next_cursor = if has_more {
            items
                .last()
                .map(|event| HistoryCursor::after(event.position()))
        } else {
            None
        };

        Ok(HistoryPage { items, next_cursor })
    }
}
