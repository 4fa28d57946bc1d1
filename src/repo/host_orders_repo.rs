use crate::domain::order::OrderSnapshot;
use anyhow::{bail, Result};
use sqlx::{PgPool, Row};

/// Read access to the host shop's orders.
#[async_trait::async_trait]
pub trait OrderSource: Send + Sync {
    async fn find_order(&self, order_id: i64) -> Result<Option<OrderSnapshot>>;

    async fn status_name(&self, status_id: i64) -> Result<Option<String>>;
}

/// Reads the host shop's own tables (`{prefix}order`, `{prefix}country`, `{prefix}order_status`).
#[derive(Clone)]
pub struct HostOrdersRepo {
    pool: PgPool,
    table_prefix: String,
}

impl HostOrdersRepo {
    pub fn new(pool: PgPool, table_prefix: &str) -> Result<Self> {
        if !table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("invalid host table prefix '{}'", table_prefix);
        }
        Ok(Self {
            pool,
            table_prefix: table_prefix.to_string(),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("\"{}{}\"", self.table_prefix, name)
    }
}

#[async_trait::async_trait]
impl OrderSource for HostOrdersRepo {
    async fn find_order(&self, order_id: i64) -> Result<Option<OrderSnapshot>> {
        let sql = format!(
            r#"
            SELECT CAST(o.order_id AS BIGINT) AS order_id, o.email, o.telephone,
                   o.payment_address_1, o.payment_address_2, o.payment_city, o.payment_zone,
                   o.payment_postcode, c.iso_code_2
            FROM {} o
            LEFT JOIN {} c ON c.country_id = o.payment_country_id
            WHERE o.order_id = $1
            "#,
            self.table("order"),
            self.table("country"),
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| OrderSnapshot {
            order_id: row.get("order_id"),
            email: row.get::<Option<String>, _>("email").unwrap_or_default(),
            telephone: row.get("telephone"),
            address_1: row.get("payment_address_1"),
            address_2: row.get("payment_address_2"),
            city: row.get("payment_city"),
            zone: row.get("payment_zone"),
            postcode: row.get("payment_postcode"),
            country_iso_code: row.get("iso_code_2"),
        }))
    }

    async fn status_name(&self, status_id: i64) -> Result<Option<String>> {
        let sql = format!(
            "SELECT name FROM {} WHERE order_status_id = $1 AND language_id = 1",
            self.table("order_status")
        );
        let name: Option<String> = sqlx::query_scalar(&sql)
            .bind(status_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }
}
