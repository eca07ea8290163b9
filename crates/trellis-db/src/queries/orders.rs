//! Order attribution query functions.
//!
//! `processed_orders` enforces at-most-once commission creation per
//! order; `linked_customers` backs lifetime attribution.

use rusqlite::{Connection, OptionalExtension};
use trellis_types::AffiliateId;

use crate::Result;

/// Whether commissions were already created for this order.
pub fn is_processed(conn: &Connection, order_ref: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM processed_orders WHERE order_ref = ?1",
        [order_ref],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Record that an order has been commissioned.
pub fn mark_processed(
    conn: &Connection,
    order_ref: &str,
    affiliate_id: AffiliateId,
    processed_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO processed_orders (order_ref, affiliate_id, processed_at)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![order_ref, affiliate_id, processed_at],
    )?;
    Ok(())
}

/// Link a customer to an affiliate for lifetime attribution. A repeat
/// link overwrites the previous affiliate.
pub fn link_customer(
    conn: &Connection,
    customer_ref: &str,
    affiliate_id: AffiliateId,
    linked_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO linked_customers (customer_ref, affiliate_id, linked_at)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![customer_ref, affiliate_id, linked_at],
    )?;
    Ok(())
}

/// The affiliate lifetime-linked to a customer, if any.
pub fn linked_affiliate(conn: &Connection, customer_ref: &str) -> Result<Option<AffiliateId>> {
    let id = conn
        .query_row(
            "SELECT affiliate_id FROM linked_customers WHERE customer_ref = ?1",
            [customer_ref],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::affiliates;
    use trellis_types::AffiliateStatus;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn seed_affiliate(conn: &Connection, n: i64) -> AffiliateId {
        affiliates::insert(
            conn,
            &format!("user_{n}"),
            &format!("code_{n}"),
            None,
            AffiliateStatus::Active,
            0,
        )
        .expect("insert affiliate")
    }

    #[test]
    fn test_mark_and_check_processed() {
        let conn = test_db();
        let aff = seed_affiliate(&conn, 1);

        assert!(!is_processed(&conn, "order_1").expect("check"));
        mark_processed(&conn, "order_1", aff, 100).expect("mark");
        assert!(is_processed(&conn, "order_1").expect("check"));

        // Second mark hits the primary key.
        assert!(mark_processed(&conn, "order_1", aff, 101).is_err());
    }

    #[test]
    fn test_link_customer_overwrites() {
        let conn = test_db();
        let a = seed_affiliate(&conn, 1);
        let b = seed_affiliate(&conn, 2);

        assert_eq!(linked_affiliate(&conn, "cust_1").expect("lookup"), None);

        link_customer(&conn, "cust_1", a, 100).expect("link");
        assert_eq!(linked_affiliate(&conn, "cust_1").expect("lookup"), Some(a));

        link_customer(&conn, "cust_1", b, 200).expect("relink");
        assert_eq!(linked_affiliate(&conn, "cust_1").expect("lookup"), Some(b));
    }
}
