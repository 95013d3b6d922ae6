use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ReserveAlert, ResultEngine, alerts};

use super::Engine;

impl Engine {
    /// Persist an alert unless an unacknowledged one of the same type already
    /// exists. Returns whether a row was written.
    ///
    /// Dedup keeps a flapping monitor from burying operators: the first
    /// drift alert stays open until someone acknowledges it, repeats are
    /// dropped.
    pub(crate) async fn insert_alert_deduped(&self, alert: ReserveAlert) -> ResultEngine<bool> {
        let open = alerts::Entity::find()
            .filter(alerts::Column::AlertType.eq(alert.alert_type.as_str()))
            .filter(alerts::Column::AcknowledgedAt.is_null())
            .one(&self.database)
            .await?;

        if open.is_some() {
            tracing::debug!(
                alert_type = alert.alert_type.as_str(),
                "suppressing duplicate alert"
            );
            return Ok(false);
        }

        self.insert_alert(alert).await?;
        Ok(true)
    }

    pub(crate) async fn insert_alert(&self, alert: ReserveAlert) -> ResultEngine<()> {
        alerts::ActiveModel::from(&alert)
            .insert(&self.database)
            .await?;
        Ok(())
    }

    /// Open alerts, newest first. Consumed by the notification collaborator
    /// and the admin screens.
    pub async fn unacknowledged_alerts(&self, limit: u64) -> ResultEngine<Vec<ReserveAlert>> {
        let models = alerts::Entity::find()
            .filter(alerts::Column::AcknowledgedAt.is_null())
            .order_by_desc(alerts::Column::CreatedAt)
            .limit(limit)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(ReserveAlert::try_from(model)?);
        }
        Ok(out)
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        acknowledged_by: &str,
        notes: Option<&str>,
    ) -> ResultEngine<()> {
        let model = alerts::Entity::find_by_id(alert_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("alert not exists".to_string()))?;

        let update = alerts::ActiveModel {
            id: ActiveValue::Set(model.id),
            acknowledged_at: ActiveValue::Set(Some(Utc::now())),
            acknowledged_by: ActiveValue::Set(Some(acknowledged_by.to_string())),
            resolution_notes: ActiveValue::Set(notes.map(|s| s.to_string())),
            ..Default::default()
        };
        update.update(&self.database).await?;
        Ok(())
    }
}
