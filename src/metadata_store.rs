use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};

/// One generated code: the submitted text, the object key of the stored
/// image, and when it was generated. Records are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrRecord {
    /// Original user-submitted text
    pub dato: String,
    /// Object key of the stored image
    pub filename: String,
    /// Generation time, the sole sort key for history display
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB-backed store for the generation history
pub struct MetadataStore {
    client: Client,
    records: Collection<QrRecord>,
}

impl MetadataStore {
    /// Create a new metadata store
    ///
    /// The client handle is long-lived and shared across requests; the
    /// driver connects lazily, so an unreachable database surfaces on first
    /// use rather than here.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.connection_uri())
            .await
            .map_err(|e| AppError::Config(format!("invalid MongoDB URI: {e}")))?;
        options.server_selection_timeout = Some(config.server_selection_timeout());

        let client = Client::with_options(options)
            .map_err(|e| AppError::Config(format!("failed to build MongoDB client: {e}")))?;
        let records = client
            .database(&config.database)
            .collection(&config.collection);

        info!(
            database = %config.database,
            collection = %config.collection,
            "Metadata store initialized"
        );

        Ok(Self { client, records })
    }

    /// Append one record
    #[instrument(skip(self, record), fields(filename = %record.filename))]
    pub async fn insert(&self, record: QrRecord) -> Result<()> {
        self.records
            .insert_one(&record, None)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("record insert failed: {e}")))?;

        metrics::counter!("qr.records.inserted").increment(1);
        debug!("Record inserted");
        Ok(())
    }

    /// All records, newest first
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<QrRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .records
            .find(doc! {}, options)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("history query failed: {e}")))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("history read failed: {e}")))
    }

    /// Connectivity probe backing the history view's status flag
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("ping failed: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn test_record_serializes_created_at_as_bson_datetime() {
        let record = QrRecord {
            dato: "https://example.com".to_string(),
            filename: "qr_codes/20240115_103045_ab12cd34.png".to_string(),
            created_at: Utc::now(),
        };

        let document = bson::to_document(&record).unwrap();
        assert!(matches!(
            document.get("created_at"),
            Some(bson::Bson::DateTime(_))
        ));
        assert_eq!(
            document.get_str("dato").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_record_round_trips_through_bson() {
        let record = QrRecord {
            dato: "hello".to_string(),
            filename: "qr_codes/20240115_103045_ab12cd34.png".to_string(),
            created_at: Utc::now(),
        };

        let document = bson::to_document(&record).unwrap();
        let decoded: QrRecord = bson::from_document(document).unwrap();

        assert_eq!(decoded.dato, record.dato);
        assert_eq!(decoded.filename, record.filename);
        // BSON datetimes carry millisecond precision
        assert_eq!(
            decoded.created_at.timestamp_millis(),
            record.created_at.timestamp_millis()
        );
    }
}
