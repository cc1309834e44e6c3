//! # Accountant Repository
//!
//! Payee sub-ledgers in `accountant/{payee}` plus the reserved documents
//! (`BankNames`, `AssignBank`, `AssignLocker`) that share the collection.

use tracing::debug;

use banquet_core::{AccountantDoc, BankNames, Transaction, RESERVED_ACCOUNTANT_DOCS};

use crate::documents::{collection, DocumentStore, WriteTx};
use crate::error::DbResult;

const BANK_NAMES_DOC: &str = "BankNames";

fn is_payee_doc(doc_id: &str) -> bool {
    !RESERVED_ACCOUNTANT_DOCS.contains(&doc_id)
}

/// Repository for `accountant`.
#[derive(Debug, Clone)]
pub struct AccountantRepository {
    store: DocumentStore,
}

impl AccountantRepository {
    pub fn new(store: DocumentStore) -> Self {
        AccountantRepository { store }
    }

    pub async fn get(&self, payee: &str) -> DbResult<Option<AccountantDoc>> {
        if !is_payee_doc(payee) {
            return Ok(None);
        }
        self.store.load(collection::ACCOUNTANT, payee).await
    }

    /// Every payee sub-ledger, reserved documents excluded.
    pub async fn list_payees(&self) -> DbResult<Vec<AccountantDoc>> {
        let docs: Vec<(String, AccountantDoc)> = self.store.list(collection::ACCOUNTANT).await?;
        Ok(docs
            .into_iter()
            .filter(|(id, _)| is_payee_doc(id))
            .map(|(id, mut doc)| {
                if doc.name.is_empty() {
                    doc.name = id;
                }
                doc
            })
            .collect())
    }

    /// Bank account names offered as payment modes.
    pub async fn bank_names(&self) -> DbResult<BankNames> {
        Ok(self
            .store
            .load(collection::ACCOUNTANT, BANK_NAMES_DOC)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_bank_names(&self, names: &BankNames) -> DbResult<()> {
        self.store.store(collection::ACCOUNTANT, BANK_NAMES_DOC, names).await
    }

    pub async fn get_in(&self, tx: &mut WriteTx, payee: &str) -> DbResult<Option<AccountantDoc>> {
        tx.load(collection::ACCOUNTANT, payee).await
    }

    /// Inserts or replaces a transaction in the payee's sub-ledger, creating
    /// the sub-ledger (type inferred from the name) on first use.
    ///
    /// Returns true when an existing transaction was replaced.
    pub async fn upsert_transaction_in(
        &self,
        tx: &mut WriteTx,
        payee: &str,
        transaction: Transaction,
    ) -> DbResult<bool> {
        let mut doc = self
            .get_in(tx, payee)
            .await?
            .unwrap_or_else(|| AccountantDoc::for_payee(payee));
        if doc.name.is_empty() {
            doc.name = payee.to_string();
        }

        let sl_no = transaction.sl_no.clone();
        let replaced = doc.upsert_transaction(transaction);
        tx.store(collection::ACCOUNTANT, payee, &doc).await?;
        debug!(payee = %payee, sl_no = %sl_no, replaced, "Sub-ledger updated");
        Ok(replaced)
    }

    /// Removes a transaction from a payee's sub-ledger. False when absent.
    pub async fn remove_transaction_in(&self, tx: &mut WriteTx, payee: &str, sl_no: &str) -> DbResult<bool> {
        let Some(mut doc) = self.get_in(tx, payee).await? else {
            return Ok(false);
        };
        if doc.remove_transaction(sl_no).is_none() {
            return Ok(false);
        }
        tx.store(collection::ACCOUNTANT, payee, &doc).await?;
        Ok(true)
    }

    /// Payee whose sub-ledger holds this serial.
    pub async fn find_transaction_in(&self, tx: &mut WriteTx, sl_no: &str) -> DbResult<Option<String>> {
        let docs: Vec<(String, AccountantDoc)> = tx.list(collection::ACCOUNTANT).await?;
        Ok(docs
            .into_iter()
            .filter(|(id, _)| is_payee_doc(id))
            .find(|(_, doc)| doc.transactions.iter().any(|t| t.sl_no == sl_no))
            .map(|(id, _)| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use banquet_core::{Money, PayeeKind, PaymentFor};
    use serde_json::json;

    fn transaction(sl_no: &str, rupees: i64) -> Transaction {
        Transaction {
            sl_no: sl_no.to_string(),
            amount: Money::from_rupees(rupees),
            kind: PaymentFor::Credit,
            receiver: "Ravi".to_string(),
            date: None,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sub_ledger_created_with_inferred_type() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accountant = db.accountant();

        let mut tx = db.begin_write().await.unwrap();
        accountant
            .upsert_transaction_in(&mut tx, "Main-Locker", transaction("C1", 5000))
            .await
            .unwrap();
        accountant
            .upsert_transaction_in(&mut tx, "Abhishek-Bank", transaction("C2", 700))
            .await
            .unwrap();
        assert!(accountant
            .upsert_transaction_in(&mut tx, "Main-Locker", transaction("C1", 5000))
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let locker = accountant.get("Main-Locker").await.unwrap().unwrap();
        assert_eq!(locker.kind, PayeeKind::Locker);
        assert_eq!(locker.transactions.len(), 1);
        assert_eq!(accountant.get("Abhishek-Bank").await.unwrap().unwrap().kind, PayeeKind::Bank);
    }

    #[tokio::test]
    async fn test_reserved_docs_are_not_payees() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accountant = db.accountant();
        accountant
            .save_bank_names(&BankNames {
                banks: vec!["HDFC".to_string()],
            })
            .await
            .unwrap();
        db.documents()
            .store(collection::ACCOUNTANT, "AssignBank", &json!({"users": []}))
            .await
            .unwrap();

        let mut tx = db.begin_write().await.unwrap();
        accountant
            .upsert_transaction_in(&mut tx, "Main-Locker", transaction("C1", 5000))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let payees = accountant.list_payees().await.unwrap();
        assert_eq!(payees.len(), 1);
        assert_eq!(payees[0].name, "Main-Locker");
        assert_eq!(accountant.bank_names().await.unwrap().banks, vec!["HDFC"]);
        assert!(accountant.get("BankNames").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_move_transaction_between_payees() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accountant = db.accountant();

        let mut tx = db.begin_write().await.unwrap();
        accountant
            .upsert_transaction_in(&mut tx, "Main-Locker", transaction("C1", 5000))
            .await
            .unwrap();
        assert_eq!(
            accountant.find_transaction_in(&mut tx, "C1").await.unwrap().as_deref(),
            Some("Main-Locker")
        );
        assert!(accountant.remove_transaction_in(&mut tx, "Main-Locker", "C1").await.unwrap());
        assert!(!accountant.remove_transaction_in(&mut tx, "Main-Locker", "C1").await.unwrap());
        assert!(accountant.find_transaction_in(&mut tx, "C1").await.unwrap().is_none());
        tx.commit().await.unwrap();
    }
}
