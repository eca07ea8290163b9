//! Balance creation, debit, grant, advisory check, and journal audit.

use rusqlite::{Connection, TransactionBehavior};
use trellis_db::queries::{balances, journal};
use trellis_types::{unix_now, Cents};

use crate::{token, LedgerError, Result};

/// Balance standing after a committed movement:
/// `remaining = total - consumed` at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditBalance {
    pub remaining: Cents,
    pub consumed: Cents,
    pub total: Cents,
}

/// Create a balance record with an opening allotment.
///
/// Writes the balance row plus an `opening` journal entry in one
/// transaction, so the journal replays from zero for every balance.
///
/// # Errors
///
/// - [`LedgerError::InvalidAmount`] if `total` is negative
/// - [`LedgerError::BalanceExists`] if the owner already has a balance
pub fn create_balance(
    conn: &mut Connection,
    owner_key: &str,
    total: Cents,
    request_token: Option<&str>,
) -> Result<CreditBalance> {
    if total < 0 {
        return Err(LedgerError::InvalidAmount(total));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if balances::get_by_owner(&tx, owner_key)?.is_some() {
        return Err(LedgerError::BalanceExists(owner_key.to_string()));
    }

    let now = unix_now();
    let id = balances::insert(&tx, owner_key, total, now)?;
    let token = resolve_token(request_token);
    journal::append(&tx, id, total, total, "opening", &token, now)?;
    tx.commit()?;

    tracing::info!(owner = owner_key, total, "balance created");
    Ok(CreditBalance {
        remaining: total,
        consumed: 0,
        total,
    })
}

/// Atomically debit a balance and append one journal entry.
///
/// The read-check-write runs under an immediate transaction: a racing
/// debit waits on the write lock, then sees the updated balance. On any
/// failure nothing is committed and no journal row exists.
///
/// # Errors
///
/// - [`LedgerError::InvalidAmount`] if `amount <= 0`
/// - [`LedgerError::BalanceNotFound`] if the owner has no balance
/// - [`LedgerError::InsufficientCredits`] if the debit would go negative
/// - [`LedgerError::Storage`] if the transaction could not commit; the
///   caller may retry, no state was changed
pub fn debit(
    conn: &mut Connection,
    owner_key: &str,
    amount: Cents,
    action: &str,
    request_token: Option<&str>,
) -> Result<CreditBalance> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let row = balances::get_by_owner(&tx, owner_key)?
        .ok_or_else(|| LedgerError::BalanceNotFound(owner_key.to_string()))?;

    let new_consumed = row.credits_consumed + amount;
    let remaining = row.credits_total - new_consumed;
    if remaining < 0 {
        return Err(LedgerError::InsufficientCredits {
            available: row.remaining(),
            required: amount,
        });
    }

    balances::set_consumed(&tx, row.id, new_consumed)?;
    let token = resolve_token(request_token);
    journal::append(&tx, row.id, -amount, remaining, action, &token, unix_now())?;
    tx.commit()?;

    tracing::info!(owner = owner_key, action, amount, balance = remaining, "credits debited");
    Ok(CreditBalance {
        remaining,
        consumed: new_consumed,
        total: row.credits_total,
    })
}

/// Raise a balance's total allotment (top-up / reset refill).
///
/// Same transaction discipline as [`debit`]: the allotment update and
/// the positive journal entry commit together or not at all.
pub fn grant(
    conn: &mut Connection,
    owner_key: &str,
    amount: Cents,
    action: &str,
    request_token: Option<&str>,
) -> Result<CreditBalance> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let row = balances::get_by_owner(&tx, owner_key)?
        .ok_or_else(|| LedgerError::BalanceNotFound(owner_key.to_string()))?;

    let new_total = row.credits_total + amount;
    let remaining = new_total - row.credits_consumed;
    balances::add_total(&tx, row.id, amount)?;
    let token = resolve_token(request_token);
    journal::append(&tx, row.id, amount, remaining, action, &token, unix_now())?;
    tx.commit()?;

    tracing::info!(owner = owner_key, action, amount, balance = remaining, "credits granted");
    Ok(CreditBalance {
        remaining,
        consumed: row.credits_consumed,
        total: new_total,
    })
}

/// Advisory check: does the owner have at least `needed` credits?
///
/// Plain read, no lock, no reservation. A [`debit`] immediately after a
/// `true` answer can still fail if another debit raced ahead; callers
/// must not treat this as a substitute for attempting the debit.
pub fn has_sufficient(conn: &Connection, owner_key: &str, needed: Cents) -> Result<bool> {
    match balances::get_by_owner(conn, owner_key)? {
        Some(row) => Ok(row.remaining() >= needed),
        None => Ok(false),
    }
}

/// Current standing of a balance.
pub fn balance(conn: &Connection, owner_key: &str) -> Result<CreditBalance> {
    let row = balances::get_by_owner(conn, owner_key)?
        .ok_or_else(|| LedgerError::BalanceNotFound(owner_key.to_string()))?;
    Ok(CreditBalance {
        remaining: row.remaining(),
        consumed: row.credits_consumed,
        total: row.credits_total,
    })
}

/// Audit a balance's journal.
///
/// Replays every entry in insertion order: each running sum of signed
/// amounts must equal that entry's `balance_after`, and the final sum
/// must equal the stored `total - consumed`.
pub fn verify_journal(conn: &Connection, owner_key: &str) -> Result<()> {
    let row = balances::get_by_owner(conn, owner_key)?
        .ok_or_else(|| LedgerError::BalanceNotFound(owner_key.to_string()))?;

    let mut running: Cents = 0;
    for entry in journal::entries_for_balance(conn, row.id)? {
        running += entry.amount;
        if entry.balance_after != running {
            return Err(LedgerError::JournalInconsistent(format!(
                "entry {} records balance {} but replay gives {}",
                entry.id, entry.balance_after, running
            )));
        }
    }

    if running != row.remaining() {
        return Err(LedgerError::JournalInconsistent(format!(
            "journal replays to {} but stored balance is {}",
            running,
            row.remaining()
        )));
    }

    Ok(())
}

fn resolve_token(request_token: Option<&str>) -> String {
    match request_token {
        Some(t) => t.to_string(),
        None => token::generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        trellis_db::open_memory().expect("open test db")
    }

    #[test]
    fn test_debit_sequence_worked_example() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");

        let after = debit(&mut conn, "lic_1", 30, "usage", None).expect("debit 30");
        assert_eq!(after, CreditBalance { remaining: 70, consumed: 30, total: 100 });

        let err = debit(&mut conn, "lic_1", 80, "usage", None).expect_err("over-debit");
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits { available: 70, required: 80 }
        ));
        assert_eq!(balance(&conn, "lic_1").expect("balance").remaining, 70);

        let after = debit(&mut conn, "lic_1", 70, "usage", None).expect("debit 70");
        assert_eq!(after.remaining, 0);

        // Journal: opening +100, then exactly the two successful debits.
        let row = trellis_db::queries::balances::get_by_owner(&conn, "lic_1")
            .expect("get")
            .expect("row");
        let entries = trellis_db::queries::journal::entries_for_balance(&conn, row.id)
            .expect("entries");
        assert_eq!(
            entries.iter().map(|e| e.amount).collect::<Vec<_>>(),
            vec![100, -30, -70]
        );
        assert_eq!(
            entries.iter().map(|e| e.balance_after).collect::<Vec<_>>(),
            vec![100, 70, 0]
        );

        verify_journal(&conn, "lic_1").expect("journal consistent");
    }

    #[test]
    fn test_debit_missing_balance() {
        let mut conn = test_db();
        let err = debit(&mut conn, "ghost", 1, "usage", None).expect_err("missing");
        assert!(matches!(err, LedgerError::BalanceNotFound(_)));
    }

    #[test]
    fn test_debit_rejects_non_positive_amounts() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        assert!(matches!(
            debit(&mut conn, "lic_1", 0, "usage", None),
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            debit(&mut conn, "lic_1", -5, "usage", None),
            Err(LedgerError::InvalidAmount(-5))
        ));
    }

    #[test]
    fn test_failed_debit_writes_no_journal_entry() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 10, None).expect("create");
        let _ = debit(&mut conn, "lic_1", 20, "usage", None).expect_err("over");

        let row = trellis_db::queries::balances::get_by_owner(&conn, "lic_1")
            .expect("get")
            .expect("row");
        let entries = trellis_db::queries::journal::entries_for_balance(&conn, row.id)
            .expect("entries");
        assert_eq!(entries.len(), 1, "only the opening entry");
    }

    #[test]
    fn test_create_balance_duplicate() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        assert!(matches!(
            create_balance(&mut conn, "lic_1", 50, None),
            Err(LedgerError::BalanceExists(_))
        ));
    }

    #[test]
    fn test_grant_raises_total_and_journals() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        debit(&mut conn, "lic_1", 90, "usage", None).expect("debit");

        let after = grant(&mut conn, "lic_1", 50, "monthly_refill", None).expect("grant");
        assert_eq!(after, CreditBalance { remaining: 60, consumed: 90, total: 150 });

        verify_journal(&conn, "lic_1").expect("journal consistent");
    }

    #[test]
    fn test_has_sufficient_is_advisory() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        assert!(has_sufficient(&conn, "lic_1", 100).expect("check"));
        assert!(!has_sufficient(&conn, "lic_1", 101).expect("check"));
        assert!(!has_sufficient(&conn, "ghost", 1).expect("check"));
    }

    #[test]
    fn test_caller_supplied_request_token_is_stored() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        debit(&mut conn, "lic_1", 10, "usage", Some("req_custom42")).expect("debit");

        let row = trellis_db::queries::balances::get_by_owner(&conn, "lic_1")
            .expect("get")
            .expect("row");
        let entries = trellis_db::queries::journal::entries_for_balance(&conn, row.id)
            .expect("entries");
        assert_eq!(entries[1].request_token, "req_custom42");
    }

    #[test]
    fn test_verify_journal_detects_tampering() {
        let mut conn = test_db();
        create_balance(&mut conn, "lic_1", 100, None).expect("create");
        debit(&mut conn, "lic_1", 40, "usage", None).expect("debit");

        // Corrupt a snapshot behind the ledger's back.
        conn.execute(
            "UPDATE credit_journal SET balance_after = 999 WHERE amount = -40",
            [],
        )
        .expect("corrupt");

        assert!(matches!(
            verify_journal(&conn, "lic_1"),
            Err(LedgerError::JournalInconsistent(_))
        ));
    }
}
