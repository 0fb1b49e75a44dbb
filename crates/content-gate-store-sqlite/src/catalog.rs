// content-gate-store-sqlite/src/catalog.rs
// ============================================================================
// Module: SQLite Content Catalog
// Description: ContentCatalog over the `content_items` table.
// Purpose: Resolve publishable content for the publish queue.
// Dependencies: content-gate-core, rusqlite
// ============================================================================

use content_gate_core::ContentCatalog;
use content_gate_core::ContentId;
use content_gate_core::ContentState;
use content_gate_core::ContentType;
use content_gate_core::PublishableContent;
use content_gate_core::StoreError;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::store::SqliteStore;
use crate::store::db_error;

impl ContentCatalog for SqliteStore {
    fn resolve(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<Option<PublishableContent>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT title, summary, url, media_url, state FROM content_items
                 WHERE content_type = ?1 AND content_id = ?2",
                params![content_type.as_str(), content_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let Some((title, summary, url, media_url, state)) = row else {
            return Ok(None);
        };
        let state = ContentState::parse(&state)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown content state: {state}")))?;
        Ok(Some(PublishableContent {
            content_type,
            content_id: content_id.clone(),
            title,
            summary,
            url,
            media_url,
            state,
        }))
    }

    fn upsert(&self, content: &PublishableContent) -> Result<(), StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO content_items (content_type, content_id, title, summary, url, media_url, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (content_type, content_id) DO UPDATE SET
                     title = excluded.title,
                     summary = excluded.summary,
                     url = excluded.url,
                     media_url = excluded.media_url,
                     state = excluded.state",
                params![
                    content.content_type.as_str(),
                    content.content_id.as_str(),
                    content.title,
                    content.summary,
                    content.url,
                    content.media_url,
                    content.state.as_str(),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }
}
