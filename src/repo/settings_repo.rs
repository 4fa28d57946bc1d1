use crate::domain::settings::CodGuardSettings;
use anyhow::{anyhow, Result};
use sqlx::{PgPool, Row};

/// Key/value settings store kept apart from the host shop's own settings.
#[derive(Clone)]
pub struct SettingsRepo {
    pub pool: PgPool,
}

impl SettingsRepo {
    pub async fn load(&self) -> Result<CodGuardSettings> {
        let rows = sqlx::query("SELECT key, value FROM codguard_settings")
            .fetch_all(&self.pool)
            .await?;

        let pairs = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("key"), row.get::<serde_json::Value, _>("value")));
        merge_over_defaults(pairs)
    }

    pub async fn save(&self, settings: &CodGuardSettings) -> Result<()> {
        let serde_json::Value::Object(fields) = serde_json::to_value(settings)? else {
            return Err(anyhow!("settings did not serialize to an object"));
        };

        let mut tx = self.pool.begin().await?;
        for (key, value) in fields {
            sqlx::query(
                r#"
                INSERT INTO codguard_settings (key, value, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(tx.as_mut())
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM codguard_settings")
            .fetch_one(&self.pool)
            .await?;
        Ok(total == 0)
    }
}

/// Stored keys override defaults; unknown keys are ignored.
pub fn merge_over_defaults(
    pairs: impl IntoIterator<Item = (String, serde_json::Value)>,
) -> Result<CodGuardSettings> {
    let mut merged = serde_json::to_value(CodGuardSettings::default())?;
    if let serde_json::Value::Object(fields) = &mut merged {
        for (key, value) in pairs {
            if fields.contains_key(&key) {
                fields.insert(key, value);
            }
        }
    }
    Ok(serde_json::from_value(merged)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_keys_override_defaults() {
        let settings = merge_over_defaults(vec![
            ("shop_id".to_string(), json!("1042")),
            ("rating_tolerance".to_string(), json!(40.0)),
            ("legacy_key".to_string(), json!(true)),
        ])
        .unwrap();
        assert_eq!(settings.shop_id, "1042");
        assert_eq!(settings.rating_tolerance, 40.0);
        assert_eq!(settings.refused_status, 8);
    }
}
