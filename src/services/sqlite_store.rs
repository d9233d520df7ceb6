//! SQLite persistence layer for prices, accounts and the trade ledger.
//!
//! All access goes through one connection behind a mutex. Reads use
//! [`SqliteStore::read`]; multi-step mutations use [`SqliteStore::atomically`],
//! which runs the closure inside a single SQLite transaction that rolls back
//! when the closure returns an error.

use crate::types::{
    CopyTrade, Holding, PortfolioHistoryEntry, StockPrice, Transaction, TransactionType,
    UserAccount,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// SQLite store for persistent game state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.lock();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stock_prices (
                symbol TEXT PRIMARY KEY,
                price_gbp REAL NOT NULL,
                price_usd REAL NOT NULL,
                daily_change_percent REAL NOT NULL DEFAULT 0,
                dividend_yield_hourly REAL NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS accounts (
                owner TEXT PRIMARY KEY,
                cash_balance REAL NOT NULL,
                initial_balance REAL NOT NULL,
                free_stocks_available INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS holdings (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                symbol TEXT NOT NULL,
                shares REAL NOT NULL,
                average_buy_price REAL NOT NULL,
                total_dividends_earned REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(owner, symbol)
            );
            CREATE INDEX IF NOT EXISTS idx_holdings_symbol ON holdings(symbol);

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                symbol TEXT NOT NULL,
                type TEXT NOT NULL,
                shares REAL NOT NULL,
                price_per_share REAL NOT NULL,
                total_amount REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_owner
                ON transactions(owner, created_at DESC);

            CREATE TABLE IF NOT EXISTS copy_trades (
                id TEXT PRIMARY KEY,
                follower_owner TEXT NOT NULL,
                leader_owner TEXT NOT NULL,
                investment_amount REAL NOT NULL,
                is_active INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                closed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_copy_trades_follower ON copy_trades(follower_owner);

            CREATE TABLE IF NOT EXISTS portfolio_history (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                shares REAL NOT NULL,
                price_per_share REAL NOT NULL,
                total_amount REAL NOT NULL,
                cash_balance_after REAL NOT NULL,
                portfolio_value_after REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_owner
                ON portfolio_history(owner, created_at DESC);

            CREATE TABLE IF NOT EXISTS simulator_state (
                symbol TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    /// Run read-only queries against the current state.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Tables<'_>) -> Result<T, rusqlite::Error>,
    ) -> Result<T, rusqlite::Error> {
        let conn = self.lock();
        f(&Tables { conn: &conn })
    }

    /// Run `f` inside one transaction. Any error rolls back every write `f` made.
    pub fn atomically<T, E>(&self, f: impl FnOnce(&Tables<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&Tables { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

/// Table accessors bound to a connection or an open transaction.
pub struct Tables<'c> {
    conn: &'c Connection,
}

impl Tables<'_> {
    // ========== Prices ==========

    pub fn list_prices(&self) -> Result<Vec<StockPrice>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, price_gbp, price_usd, daily_change_percent, dividend_yield_hourly, updated_at
             FROM stock_prices ORDER BY symbol",
        )?;
        let rows = stmt.query_map([], price_from_row)?;
        rows.collect()
    }

    pub fn get_price(&self, symbol: &str) -> Result<Option<StockPrice>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT symbol, price_gbp, price_usd, daily_change_percent, dividend_yield_hourly, updated_at
                 FROM stock_prices WHERE symbol = ?1",
                params![symbol],
                price_from_row,
            )
            .optional()
    }

    pub fn upsert_price(&self, price: &StockPrice) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO stock_prices
             (symbol, price_gbp, price_usd, daily_change_percent, dividend_yield_hourly, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(symbol) DO UPDATE SET
                price_gbp = excluded.price_gbp,
                price_usd = excluded.price_usd,
                daily_change_percent = excluded.daily_change_percent,
                dividend_yield_hourly = excluded.dividend_yield_hourly,
                updated_at = excluded.updated_at",
            params![
                price.symbol,
                price.price_gbp,
                price.price_usd,
                price.daily_change_percent,
                price.dividend_yield_hourly,
                price.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn price_count(&self) -> Result<usize, rusqlite::Error> {
        self.conn
            .query_row("SELECT COUNT(*) FROM stock_prices", [], |row| row.get(0))
    }

    // ========== Accounts ==========

    pub fn get_account(&self, owner: &str) -> Result<Option<UserAccount>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT owner, cash_balance, initial_balance, free_stocks_available, created_at, updated_at
                 FROM accounts WHERE owner = ?1",
                params![owner],
                account_from_row,
            )
            .optional()
    }

    pub fn list_accounts(&self) -> Result<Vec<UserAccount>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT owner, cash_balance, initial_balance, free_stocks_available, created_at, updated_at
             FROM accounts ORDER BY owner",
        )?;
        let rows = stmt.query_map([], account_from_row)?;
        rows.collect()
    }

    pub fn insert_account(&self, account: &UserAccount) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO accounts
             (owner, cash_balance, initial_balance, free_stocks_available, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                account.owner,
                account.cash_balance,
                account.initial_balance,
                account.free_stocks_available,
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Set the cash balance of an account.
    pub fn set_cash(&self, owner: &str, cash_balance: f64) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn.execute(
            "UPDATE accounts SET cash_balance = ?1, updated_at = ?2 WHERE owner = ?3",
            params![cash_balance, now, owner],
        )?;
        if changed == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows);
        }
        Ok(())
    }

    /// Put every account back on its initial balance.
    pub fn reset_all_cash(&self) -> Result<usize, rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "UPDATE accounts SET cash_balance = initial_balance, updated_at = ?1",
            params![now],
        )
    }

    // ========== Holdings ==========

    pub fn get_holding(&self, owner: &str, symbol: &str) -> Result<Option<Holding>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, owner, symbol, shares, average_buy_price, total_dividends_earned, created_at, updated_at
                 FROM holdings WHERE owner = ?1 AND symbol = ?2",
                params![owner, symbol],
                holding_from_row,
            )
            .optional()
    }

    pub fn list_holdings(&self, owner: &str) -> Result<Vec<Holding>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, symbol, shares, average_buy_price, total_dividends_earned, created_at, updated_at
             FROM holdings WHERE owner = ?1 ORDER BY symbol",
        )?;
        let rows = stmt.query_map(params![owner], holding_from_row)?;
        rows.collect()
    }

    pub fn list_all_holdings(&self) -> Result<Vec<Holding>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, symbol, shares, average_buy_price, total_dividends_earned, created_at, updated_at
             FROM holdings ORDER BY owner, symbol",
        )?;
        let rows = stmt.query_map([], holding_from_row)?;
        rows.collect()
    }

    /// Distinct symbols that at least one account holds.
    pub fn held_symbols(&self) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT symbol FROM holdings ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    /// Insert or replace the row for (owner, symbol).
    pub fn save_holding(&self, holding: &Holding) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO holdings
             (id, owner, symbol, shares, average_buy_price, total_dividends_earned, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(owner, symbol) DO UPDATE SET
                shares = excluded.shares,
                average_buy_price = excluded.average_buy_price,
                total_dividends_earned = excluded.total_dividends_earned,
                updated_at = excluded.updated_at",
            params![
                holding.id,
                holding.owner,
                holding.symbol,
                holding.shares,
                holding.average_buy_price,
                holding.total_dividends_earned,
                holding.created_at,
                holding.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete_holding(&self, id: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM holdings WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn add_holding_dividend(&self, id: &str, amount: f64) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE holdings SET total_dividends_earned = total_dividends_earned + ?1 WHERE id = ?2",
            params![amount, id],
        )?;
        Ok(())
    }

    // ========== Transactions ==========

    pub fn insert_transaction(&self, tx: &Transaction) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO transactions
             (id, owner, symbol, type, shares, price_per_share, total_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tx.id,
                tx.owner,
                tx.symbol,
                tx.transaction_type.as_str(),
                tx.shares,
                tx.price_per_share,
                tx.total_amount,
                tx.created_at,
            ],
        )?;
        Ok(())
    }

    /// Most recent transactions first.
    pub fn list_transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, symbol, type, shares, price_per_share, total_amount, created_at
             FROM transactions WHERE owner = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner, limit as i64], transaction_from_row)?;
        rows.collect()
    }

    // ========== Copy Trades ==========

    pub fn insert_copy_trade(&self, ct: &CopyTrade) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO copy_trades
             (id, follower_owner, leader_owner, investment_amount, is_active, created_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ct.id,
                ct.follower_owner,
                ct.leader_owner,
                ct.investment_amount,
                ct.is_active,
                ct.created_at,
                ct.closed_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_copy_trades(&self, follower: &str) -> Result<Vec<CopyTrade>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, follower_owner, leader_owner, investment_amount, is_active, created_at, closed_at
             FROM copy_trades WHERE follower_owner = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![follower], copy_trade_from_row)?;
        rows.collect()
    }

    pub fn close_copy_trade(&self, id: &str, closed_at: i64) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE copy_trades SET is_active = 0, closed_at = ?1 WHERE id = ?2",
            params![closed_at, id],
        )?;
        Ok(())
    }

    // ========== Portfolio History ==========

    pub fn insert_history(&self, entry: &PortfolioHistoryEntry) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO portfolio_history
             (id, owner, symbol, action, shares, price_per_share, total_amount,
              cash_balance_after, portfolio_value_after, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.owner,
                entry.symbol,
                entry.action.as_str(),
                entry.shares,
                entry.price_per_share,
                entry.total_amount,
                entry.cash_balance_after,
                entry.portfolio_value_after,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// Oldest first, so the result plots directly as a time series.
    pub fn list_history(&self, owner: &str, limit: usize) -> Result<Vec<PortfolioHistoryEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, symbol, action, shares, price_per_share, total_amount,
                    cash_balance_after, portfolio_value_after, created_at
             FROM (SELECT rowid AS rid, * FROM portfolio_history WHERE owner = ?1
                   ORDER BY created_at DESC, rid DESC LIMIT ?2)
             ORDER BY created_at, rid",
        )?;
        let rows = stmt.query_map(params![owner, limit as i64], history_from_row)?;
        rows.collect()
    }

    // ========== Simulator State ==========

    pub fn load_simulator_state(&self, symbol: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT state_json FROM simulator_state WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn save_simulator_state(&self, symbol: &str, state_json: &str) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO simulator_state (symbol, state_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            params![symbol, state_json, now],
        )?;
        Ok(())
    }

    // ========== Admin ==========

    /// Delete every holding, transaction, copy trade and history row.
    pub fn clear_ledger(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "DELETE FROM holdings;
             DELETE FROM transactions;
             DELETE FROM copy_trades;
             DELETE FROM portfolio_history;",
        )
    }
}

// ========== Row Mapping ==========

fn price_from_row(row: &Row<'_>) -> Result<StockPrice, rusqlite::Error> {
    Ok(StockPrice {
        symbol: row.get(0)?,
        price_gbp: row.get(1)?,
        price_usd: row.get(2)?,
        daily_change_percent: row.get(3)?,
        dividend_yield_hourly: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn account_from_row(row: &Row<'_>) -> Result<UserAccount, rusqlite::Error> {
    Ok(UserAccount {
        owner: row.get(0)?,
        cash_balance: row.get(1)?,
        initial_balance: row.get(2)?,
        free_stocks_available: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn holding_from_row(row: &Row<'_>) -> Result<Holding, rusqlite::Error> {
    Ok(Holding {
        id: row.get(0)?,
        owner: row.get(1)?,
        symbol: row.get(2)?,
        shares: row.get(3)?,
        average_buy_price: row.get(4)?,
        total_dividends_earned: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> Result<Transaction, rusqlite::Error> {
    let kind: String = row.get(3)?;
    Ok(Transaction {
        id: row.get(0)?,
        owner: row.get(1)?,
        symbol: row.get(2)?,
        transaction_type: parse_transaction_type(&kind),
        shares: row.get(4)?,
        price_per_share: row.get(5)?,
        total_amount: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn copy_trade_from_row(row: &Row<'_>) -> Result<CopyTrade, rusqlite::Error> {
    Ok(CopyTrade {
        id: row.get(0)?,
        follower_owner: row.get(1)?,
        leader_owner: row.get(2)?,
        investment_amount: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        closed_at: row.get(6)?,
    })
}

fn history_from_row(row: &Row<'_>) -> Result<PortfolioHistoryEntry, rusqlite::Error> {
    let action: String = row.get(3)?;
    Ok(PortfolioHistoryEntry {
        id: row.get(0)?,
        owner: row.get(1)?,
        symbol: row.get(2)?,
        action: parse_transaction_type(&action),
        shares: row.get(4)?,
        price_per_share: row.get(5)?,
        total_amount: row.get(6)?,
        cash_balance_after: row.get(7)?,
        portfolio_value_after: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn parse_transaction_type(s: &str) -> TransactionType {
    TransactionType::parse(s).unwrap_or_else(|| {
        warn!("Unknown transaction type '{}' in ledger, reading as buy", s);
        TransactionType::Buy
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_upsert_and_list() {
        let store = SqliteStore::new_in_memory().unwrap();

        store
            .read(|t| {
                t.upsert_price(&StockPrice::new("AAPL", 150.0, 1.27))?;
                t.upsert_price(&StockPrice::new("MSFT", 320.0, 1.27))?;
                Ok(())
            })
            .unwrap();

        let mut price = store.read(|t| t.get_price("AAPL")).unwrap().unwrap();
        price.daily_change_percent = 1.5;
        store.read(|t| t.upsert_price(&price)).unwrap();

        let prices = store.read(|t| t.list_prices()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].symbol, "AAPL");
        assert_eq!(prices[0].daily_change_percent, 1.5);
        assert_eq!(store.read(|t| t.price_count()).unwrap(), 2);
    }

    #[test]
    fn test_account_crud() {
        let store = SqliteStore::new_in_memory().unwrap();
        let account = UserAccount::new("alice", 10_000.0);
        store.read(|t| t.insert_account(&account)).unwrap();

        store.read(|t| t.set_cash("alice", 42.0)).unwrap();
        let loaded = store.read(|t| t.get_account("alice")).unwrap().unwrap();
        assert_eq!(loaded.cash_balance, 42.0);
        assert_eq!(loaded.initial_balance, 10_000.0);

        assert!(store.read(|t| t.set_cash("nobody", 1.0)).is_err());
        assert!(store.read(|t| t.get_account("nobody")).unwrap().is_none());
    }

    #[test]
    fn test_holding_unique_per_owner_symbol() {
        let store = SqliteStore::new_in_memory().unwrap();
        let mut holding = Holding::new("alice", "AAPL", 10.0, 150.0);
        store.read(|t| t.save_holding(&holding)).unwrap();

        holding.add_purchase(5.0, 180.0);
        store.read(|t| t.save_holding(&holding)).unwrap();

        let holdings = store.read(|t| t.list_holdings("alice")).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].shares, 15.0);

        store.read(|t| t.delete_holding(&holding.id)).unwrap();
        assert!(store.read(|t| t.get_holding("alice", "AAPL")).unwrap().is_none());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .read(|t| t.insert_account(&UserAccount::new("alice", 100.0)))
            .unwrap();

        let result: Result<(), rusqlite::Error> = store.atomically(|t| {
            t.set_cash("alice", 0.0)?;
            t.set_cash("missing", 0.0)?;
            Ok(())
        });
        assert!(result.is_err());

        let account = store.read(|t| t.get_account("alice")).unwrap().unwrap();
        assert_eq!(account.cash_balance, 100.0);
    }

    #[test]
    fn test_transactions_newest_first_and_history_oldest_first() {
        let store = SqliteStore::new_in_memory().unwrap();
        for i in 0..3 {
            let mut tx = Transaction::new("bob", "AAPL", TransactionType::Buy, 1.0, 10.0, 10.0);
            tx.created_at = 1_000 + i;
            store.read(|t| t.insert_transaction(&tx)).unwrap();

            let entry = PortfolioHistoryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                owner: "bob".into(),
                symbol: "AAPL".into(),
                action: TransactionType::Buy,
                shares: 1.0,
                price_per_share: 10.0,
                total_amount: 10.0,
                cash_balance_after: 100.0 - i as f64,
                portfolio_value_after: 100.0,
                created_at: 1_000 + i,
            };
            store.read(|t| t.insert_history(&entry)).unwrap();
        }

        let txs = store.read(|t| t.list_transactions("bob", 2)).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].created_at, 1_002);

        let history = store.read(|t| t.list_history("bob", 2)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].created_at, 1_001);
        assert_eq!(history[1].created_at, 1_002);
    }

    #[test]
    fn test_simulator_state_round_trip() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.read(|t| t.load_simulator_state("ABPF")).unwrap().is_none());
        store
            .read(|t| t.save_simulator_state("ABPF", "{\"momentum\":0.1}"))
            .unwrap();
        let json = store.read(|t| t.load_simulator_state("ABPF")).unwrap().unwrap();
        assert!(json.contains("momentum"));
    }
}
