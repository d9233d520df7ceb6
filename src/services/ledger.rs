//! Ledger Service
//!
//! Applies every cash and holding mutation in the game:
//! - buys and sells with weighted-average cost basis
//! - cash transfers between accounts
//! - copy trades (start, value on read, stop)
//! - the hourly dividend sweep
//! - leaderboard and portfolio views
//!
//! Each operation runs inside one store transaction. Preconditions are
//! checked against rows read in that transaction, so a rejected or failed
//! operation leaves no partial writes behind.

use crate::config::GameRules;
use crate::services::sqlite_store::{SqliteStore, Tables};
use crate::types::{
    is_zero, round2, CopyTrade, CopyTradeView, DividendPayout, DividendSweep, Holding,
    HoldingView, LeaderboardEntry, LedgerEvent, PortfolioHistoryEntry, Transaction,
    TransactionType, UserAccount, COPY_SYMBOL, EPSILON, TRANSFER_SYMBOL,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Ledger errors. Everything except `DatabaseError` is a client error.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: f64, held: f64 },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No holding in {0}")]
    HoldingNotFound(String),

    #[error("Leader not found: {0}")]
    LeaderNotFound(String),

    #[error("Copy trade not found: {0}")]
    CopyTradeNotFound(String),

    #[error("No price data available for {0}")]
    NoPriceData(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

type Result<T> = std::result::Result<T, LedgerError>;

/// Result of a buy.
#[derive(Debug, Clone)]
pub struct BuyReceipt {
    pub transaction: Transaction,
    pub holding: Holding,
    pub account: UserAccount,
}

/// Result of a sell. `holding` is `None` when the position was closed.
#[derive(Debug, Clone)]
pub struct SellReceipt {
    pub transaction: Transaction,
    pub holding: Option<Holding>,
    pub account: UserAccount,
    pub profit_loss: f64,
}

/// Balances of both parties after a transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub sender: UserAccount,
    pub recipient: UserAccount,
}

/// Copy trades closed by one stop request and the cash they returned.
#[derive(Debug, Clone)]
pub struct StopReceipt {
    pub stopped: Vec<CopyTradeView>,
    pub credited: f64,
}

/// Ledger engine over the SQLite store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<SqliteStore>,
    rules: GameRules,
    /// Best-effort notifications for local consumers
    event_tx: broadcast::Sender<LedgerEvent>,
}

impl LedgerService {
    pub fn new(store: Arc<SqliteStore>, rules: GameRules) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            store,
            rules,
            event_tx,
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Subscribe to ledger notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: LedgerEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Fetch the caller's account, creating it on first use.
    pub fn account(&self, owner: &str) -> Result<UserAccount> {
        let owner = normalize_owner(owner)?;
        self.store
            .atomically(|t| ensure_account(t, &owner, self.rules.initial_balance))
    }

    // =========================================================================
    // Trading
    // =========================================================================

    /// Buy `shares` of `symbol`. The stored price wins over `client_price`.
    pub fn buy(
        &self,
        owner: &str,
        symbol: &str,
        shares: f64,
        client_price: Option<f64>,
    ) -> Result<BuyReceipt> {
        let owner = normalize_owner(owner)?;
        let symbol = normalize_symbol(symbol)?;
        require_positive("shares", shares)?;

        let receipt = self.store.atomically(|t| -> Result<BuyReceipt> {
            let price = resolve_price(t, &symbol, client_price)?;
            let mut account = ensure_account(t, &owner, self.rules.initial_balance)?;

            let cost = shares * price;
            if cost > account.cash_balance + EPSILON {
                return Err(LedgerError::InsufficientFunds {
                    needed: cost,
                    available: account.cash_balance,
                });
            }

            account.cash_balance -= cost;
            t.set_cash(&owner, account.cash_balance)?;

            let holding = match t.get_holding(&owner, &symbol)? {
                Some(mut existing) => {
                    existing.add_purchase(shares, price);
                    existing
                }
                None => Holding::new(owner.as_str(), symbol.as_str(), shares, price),
            };
            t.save_holding(&holding)?;

            let transaction =
                Transaction::new(owner.as_str(), symbol.as_str(), TransactionType::Buy, shares, price, cost);
            t.insert_transaction(&transaction)?;
            record_history(t, &transaction, account.cash_balance)?;

            Ok(BuyReceipt {
                transaction,
                holding,
                account,
            })
        })?;

        info!(
            "{} bought {} {} @ {:.2}",
            owner, shares, symbol, receipt.transaction.price_per_share
        );
        self.emit(LedgerEvent::BuyConfirmed {
            owner,
            symbol,
            shares,
            price: receipt.transaction.price_per_share,
        });
        Ok(receipt)
    }

    /// Sell `shares` of `symbol`. Closing the full position deletes the holding.
    pub fn sell(
        &self,
        owner: &str,
        symbol: &str,
        shares: f64,
        client_price: Option<f64>,
    ) -> Result<SellReceipt> {
        let owner = normalize_owner(owner)?;
        let symbol = normalize_symbol(symbol)?;
        require_positive("shares", shares)?;

        let receipt = self.store.atomically(|t| -> Result<SellReceipt> {
            let mut holding = t
                .get_holding(&owner, &symbol)?
                .ok_or_else(|| LedgerError::HoldingNotFound(symbol.clone()))?;
            if shares > holding.shares + EPSILON {
                return Err(LedgerError::InsufficientShares {
                    requested: shares,
                    held: holding.shares,
                });
            }

            let price = resolve_price(t, &symbol, client_price)?;
            let mut account = t
                .get_account(&owner)?
                .ok_or_else(|| LedgerError::AccountNotFound(owner.clone()))?;

            let proceeds = shares * price;
            let profit_loss = shares * (price - holding.average_buy_price);

            account.cash_balance += proceeds;
            t.set_cash(&owner, account.cash_balance)?;

            let remaining = holding.shares - shares;
            let holding = if is_zero(remaining) || remaining < 0.0 {
                t.delete_holding(&holding.id)?;
                None
            } else {
                holding.shares = remaining;
                holding.updated_at = chrono::Utc::now().timestamp_millis();
                t.save_holding(&holding)?;
                Some(holding)
            };

            let transaction = Transaction::new(
                owner.as_str(),
                symbol.as_str(),
                TransactionType::Sell,
                shares,
                price,
                proceeds,
            );
            t.insert_transaction(&transaction)?;
            record_history(t, &transaction, account.cash_balance)?;

            Ok(SellReceipt {
                transaction,
                holding,
                account,
                profit_loss,
            })
        })?;

        info!(
            "{} sold {} {} @ {:.2} (P/L {:.2})",
            owner, shares, symbol, receipt.transaction.price_per_share, receipt.profit_loss
        );
        self.emit(LedgerEvent::SaleConfirmed {
            owner,
            symbol,
            shares,
            price: receipt.transaction.price_per_share,
            profit_loss: receipt.profit_loss,
        });
        Ok(receipt)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Move cash from `sender` to an existing `recipient` account.
    pub fn transfer(&self, sender: &str, recipient: &str, amount: f64) -> Result<TransferReceipt> {
        let sender = normalize_owner(sender)?;
        let recipient = normalize_owner(recipient)?;
        require_positive("amount", amount)?;
        if sender == recipient {
            return Err(LedgerError::InvalidRequest(
                "Cannot transfer to yourself".to_string(),
            ));
        }

        let receipt = self.store.atomically(|t| -> Result<TransferReceipt> {
            let mut to = t
                .get_account(&recipient)?
                .ok_or_else(|| LedgerError::AccountNotFound(recipient.clone()))?;
            let mut from = ensure_account(t, &sender, self.rules.initial_balance)?;

            if amount > from.cash_balance + EPSILON {
                return Err(LedgerError::InsufficientFunds {
                    needed: amount,
                    available: from.cash_balance,
                });
            }

            from.cash_balance -= amount;
            to.cash_balance += amount;
            t.set_cash(&sender, from.cash_balance)?;
            t.set_cash(&recipient, to.cash_balance)?;

            t.insert_transaction(&Transaction::cash_movement(
                sender.as_str(),
                TRANSFER_SYMBOL,
                TransactionType::Sell,
                amount,
            ))?;
            t.insert_transaction(&Transaction::cash_movement(
                recipient.as_str(),
                TRANSFER_SYMBOL,
                TransactionType::Buy,
                amount,
            ))?;

            Ok(TransferReceipt {
                sender: from,
                recipient: to,
            })
        })?;

        info!("{} transferred {:.2} to {}", sender, amount, recipient);
        self.emit(LedgerEvent::TransferCompleted {
            sender,
            recipient,
            amount,
        });
        Ok(receipt)
    }

    // =========================================================================
    // Copy Trading
    // =========================================================================

    /// Stake `amount` on `leader`. The leader is paid the commission up front.
    pub fn start_copy_trade(&self, follower: &str, leader: &str, amount: f64) -> Result<CopyTrade> {
        let follower = normalize_owner(follower)?;
        let leader = normalize_owner(leader)?;
        require_positive("amount", amount)?;
        if follower == leader {
            return Err(LedgerError::InvalidRequest(
                "Cannot copy your own trades".to_string(),
            ));
        }

        let commission_rate = self.rules.copy_trade_commission;
        let (copy_trade, commission) = self.store.atomically(|t| -> Result<_> {
            let mut leader_account = t
                .get_account(&leader)?
                .ok_or_else(|| LedgerError::LeaderNotFound(leader.clone()))?;
            let mut account = ensure_account(t, &follower, self.rules.initial_balance)?;

            if amount > account.cash_balance + EPSILON {
                return Err(LedgerError::InsufficientFunds {
                    needed: amount,
                    available: account.cash_balance,
                });
            }

            let commission = amount * commission_rate;
            account.cash_balance -= amount;
            leader_account.cash_balance += commission;
            t.set_cash(&follower, account.cash_balance)?;
            t.set_cash(&leader, leader_account.cash_balance)?;

            let copy_trade = CopyTrade::new(follower.as_str(), leader.as_str(), amount - commission);
            t.insert_copy_trade(&copy_trade)?;
            t.insert_transaction(&Transaction::cash_movement(
                follower.as_str(),
                COPY_SYMBOL,
                TransactionType::Buy,
                amount,
            ))?;

            Ok((copy_trade, commission))
        })?;

        info!(
            "{} started copying {} with {:.2} (commission {:.2})",
            follower, leader, amount, commission
        );
        self.emit(LedgerEvent::CopyTradeStarted {
            follower,
            leader,
            commission,
        });
        Ok(copy_trade)
    }

    /// Value a copy trade against the leader's current return.
    pub fn copy_trade_value(&self, copy_trade: &CopyTrade) -> Result<CopyTradeView> {
        Ok(self.store.read(|t| value_copy_trade(t, copy_trade))?)
    }

    /// All of a follower's copy trades, valued now.
    pub fn copy_trades(&self, follower: &str) -> Result<Vec<CopyTradeView>> {
        let follower = normalize_owner(follower)?;
        Ok(self.store.read(|t| {
            t.list_copy_trades(&follower)?
                .iter()
                .map(|ct| value_copy_trade(t, ct))
                .collect()
        })?)
    }

    /// Stop one active copy trade, or every active one when `id` is `None`,
    /// crediting the follower with their current value.
    pub fn stop_copy_trade(&self, follower: &str, id: Option<&str>) -> Result<StopReceipt> {
        let follower = normalize_owner(follower)?;

        let receipt = self.store.atomically(|t| -> Result<StopReceipt> {
            let active: Vec<CopyTrade> = t
                .list_copy_trades(&follower)?
                .into_iter()
                .filter(|ct| ct.is_active)
                .collect();

            let targets: Vec<CopyTrade> = match id {
                Some(id) => {
                    let found = active
                        .into_iter()
                        .find(|ct| ct.id == id)
                        .ok_or_else(|| LedgerError::CopyTradeNotFound(id.to_string()))?;
                    vec![found]
                }
                None => active,
            };

            if targets.is_empty() {
                return Ok(StopReceipt {
                    stopped: Vec::new(),
                    credited: 0.0,
                });
            }

            let mut account = t
                .get_account(&follower)?
                .ok_or_else(|| LedgerError::AccountNotFound(follower.clone()))?;

            let now = chrono::Utc::now().timestamp_millis();
            let mut credited = 0.0;
            let mut stopped = Vec::with_capacity(targets.len());
            for ct in targets {
                let mut view = value_copy_trade(t, &ct)?;
                t.close_copy_trade(&ct.id, now)?;
                t.insert_transaction(&Transaction::cash_movement(
                    follower.as_str(),
                    COPY_SYMBOL,
                    TransactionType::Sell,
                    view.current_value,
                ))?;
                credited += view.current_value;
                view.copy_trade.is_active = false;
                view.copy_trade.closed_at = Some(now);
                stopped.push(view);
            }

            account.cash_balance += credited;
            t.set_cash(&follower, account.cash_balance)?;

            Ok(StopReceipt { stopped, credited })
        })?;

        info!(
            "{} stopped {} copy trade(s), credited {:.2}",
            follower,
            receipt.stopped.len(),
            receipt.credited
        );
        Ok(receipt)
    }

    // =========================================================================
    // Dividends
    // =========================================================================

    /// Pay every holding its hourly dividend.
    ///
    /// Per-holding amounts are `shares × price × yield / 100`, summed per
    /// account and credited once. Accounts are credited in batches of
    /// `dividend_batch_size`, one transaction per batch, pausing
    /// `dividend_batch_delay` between batches.
    pub async fn pay_dividends(&self) -> Result<DividendSweep> {
        let owed = self.store.read(|t| {
            let prices: HashMap<String, (f64, f64)> = t
                .list_prices()?
                .into_iter()
                .filter(|p| !p.is_degenerate())
                .map(|p| (p.symbol, (p.price_gbp, p.dividend_yield_hourly)))
                .collect();

            // owner -> (total, [(holding id, amount)])
            let mut owed: BTreeMap<String, (f64, Vec<(String, f64)>)> = BTreeMap::new();
            for holding in t.list_all_holdings()? {
                let Some(&(price, hourly_yield)) = prices.get(&holding.symbol) else {
                    continue;
                };
                if !hourly_yield.is_finite() || hourly_yield <= 0.0 {
                    continue;
                }
                let amount = holding.shares * price * (hourly_yield / 100.0);
                if !amount.is_finite() || amount <= 0.0 {
                    continue;
                }
                let entry = owed.entry(holding.owner).or_insert((0.0, Vec::new()));
                entry.0 += amount;
                entry.1.push((holding.id, amount));
            }
            Ok(owed)
        })?;

        let owners: Vec<(String, (f64, Vec<(String, f64)>))> = owed.into_iter().collect();
        let batch_size = self.rules.dividend_batch_size.max(1);
        let batch_count = owners.len().div_ceil(batch_size);
        let mut sweep = DividendSweep::default();

        for (index, batch) in owners.chunks(batch_size).enumerate() {
            let payouts = self.store.atomically(|t| -> Result<Vec<DividendPayout>> {
                let mut payouts = Vec::with_capacity(batch.len());
                for (owner, (total, holdings)) in batch {
                    let Some(mut account) = t.get_account(owner)? else {
                        warn!("Skipping dividends for missing account {}", owner);
                        continue;
                    };
                    account.cash_balance += total;
                    t.set_cash(owner, account.cash_balance)?;
                    for (holding_id, amount) in holdings {
                        t.add_holding_dividend(holding_id, *amount)?;
                    }
                    payouts.push(DividendPayout {
                        owner: owner.clone(),
                        amount: *total,
                        new_balance: account.cash_balance,
                    });
                }
                Ok(payouts)
            })?;

            for payout in payouts {
                sweep.total_payouts += payout.amount;
                sweep.payouts_count += 1;
                sweep.updates.push(payout);
            }

            if index + 1 < batch_count && !self.rules.dividend_batch_delay.is_zero() {
                tokio::time::sleep(self.rules.dividend_batch_delay).await;
            }
        }

        info!(
            "Dividend sweep paid {:.4} to {} accounts",
            sweep.total_payouts, sweep.payouts_count
        );
        Ok(sweep)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Every account ranked by total value, highest first.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut entries = self.store.read(|t| {
            let prices = price_map(t)?;
            let mut holdings_value: HashMap<String, f64> = HashMap::new();
            for holding in t.list_all_holdings()? {
                let price = prices
                    .get(&holding.symbol)
                    .copied()
                    .unwrap_or(holding.average_buy_price);
                *holdings_value.entry(holding.owner.clone()).or_insert(0.0) +=
                    holding.market_value(price);
            }

            Ok(t.list_accounts()?
                .into_iter()
                .map(|account| {
                    let total = account.cash_balance
                        + holdings_value.get(&account.owner).copied().unwrap_or(0.0);
                    LeaderboardEntry {
                        percentage_return: round2(percentage_return(total, account.initial_balance)),
                        total_value: round2(total),
                        owner: account.owner,
                        rank: 0,
                    }
                })
                .collect::<Vec<_>>())
        })?;

        entries.sort_by(|a, b| {
            b.total_value
                .total_cmp(&a.total_value)
                .then_with(|| a.owner.cmp(&b.owner))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
        Ok(entries)
    }

    /// Holdings with current valuation.
    pub fn holdings_view(&self, owner: &str) -> Result<Vec<HoldingView>> {
        let owner = normalize_owner(owner)?;
        Ok(self.store.read(|t| {
            let prices = price_map(t)?;
            Ok(t.list_holdings(&owner)?
                .into_iter()
                .map(|holding| {
                    let current_price = prices
                        .get(&holding.symbol)
                        .copied()
                        .unwrap_or(holding.average_buy_price);
                    let market_value = holding.market_value(current_price);
                    HoldingView {
                        unrealized_pnl: round2(market_value - holding.cost_basis()),
                        market_value: round2(market_value),
                        current_price,
                        holding,
                    }
                })
                .collect())
        })?)
    }

    pub fn transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>> {
        let owner = normalize_owner(owner)?;
        Ok(self.store.read(|t| t.list_transactions(&owner, limit))?)
    }

    pub fn history(&self, owner: &str, limit: usize) -> Result<Vec<PortfolioHistoryEntry>> {
        let owner = normalize_owner(owner)?;
        Ok(self.store.read(|t| t.list_history(&owner, limit))?)
    }

    /// Wipe the ledger and put every account back on its initial balance.
    pub fn reset_all(&self) -> Result<usize> {
        let reset = self.store.atomically(|t| -> Result<usize> {
            t.clear_ledger()?;
            Ok(t.reset_all_cash()?)
        })?;
        info!("Reset {} accounts", reset);
        Ok(reset)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn normalize_owner(owner: &str) -> Result<String> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(LedgerError::InvalidRequest("Owner is required".to_string()));
    }
    Ok(owner.to_string())
}

fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::InvalidRequest("Symbol is required".to_string()));
    }
    if symbol == TRANSFER_SYMBOL || symbol == COPY_SYMBOL {
        return Err(LedgerError::InvalidRequest(format!("{} is not tradable", symbol)));
    }
    Ok(symbol)
}

fn require_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LedgerError::InvalidRequest(format!(
            "{} must be a positive number",
            field
        )));
    }
    Ok(())
}

fn ensure_account(t: &Tables<'_>, owner: &str, initial_balance: f64) -> Result<UserAccount> {
    if let Some(account) = t.get_account(owner)? {
        return Ok(account);
    }
    let account = UserAccount::new(owner, initial_balance);
    t.insert_account(&account)?;
    debug!("Created account for {}", owner);
    Ok(account)
}

/// Stored price first, then a positive client quote.
fn resolve_price(t: &Tables<'_>, symbol: &str, client_price: Option<f64>) -> Result<f64> {
    if let Some(stored) = t.get_price(symbol)?.filter(|p| !p.is_degenerate()) {
        return Ok(stored.price_gbp);
    }
    client_price
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| LedgerError::NoPriceData(symbol.to_string()))
}

fn price_map(t: &Tables<'_>) -> std::result::Result<HashMap<String, f64>, rusqlite::Error> {
    Ok(t.list_prices()?
        .into_iter()
        .filter(|p| !p.is_degenerate())
        .map(|p| (p.symbol, p.price_gbp))
        .collect())
}

fn percentage_return(total_value: f64, initial_balance: f64) -> f64 {
    if initial_balance > 0.0 {
        (total_value - initial_balance) / initial_balance * 100.0
    } else {
        0.0
    }
}

/// Cash plus holdings at current prices. Unpriced holdings count at cost.
fn portfolio_value(
    t: &Tables<'_>,
    owner: &str,
    cash_balance: f64,
) -> std::result::Result<f64, rusqlite::Error> {
    let prices = price_map(t)?;
    let holdings: f64 = t
        .list_holdings(owner)?
        .iter()
        .map(|h| {
            let price = prices.get(&h.symbol).copied().unwrap_or(h.average_buy_price);
            h.market_value(price)
        })
        .sum();
    Ok(cash_balance + holdings)
}

fn record_history(t: &Tables<'_>, tx: &Transaction, cash_balance_after: f64) -> Result<()> {
    let entry = PortfolioHistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        owner: tx.owner.clone(),
        symbol: tx.symbol.clone(),
        action: tx.transaction_type,
        shares: tx.shares,
        price_per_share: tx.price_per_share,
        total_amount: tx.total_amount,
        cash_balance_after,
        portfolio_value_after: portfolio_value(t, &tx.owner, cash_balance_after)?,
        created_at: tx.created_at,
    };
    t.insert_history(&entry)?;
    Ok(())
}

fn value_copy_trade(
    t: &Tables<'_>,
    copy_trade: &CopyTrade,
) -> std::result::Result<CopyTradeView, rusqlite::Error> {
    let leader_return = match t.get_account(&copy_trade.leader_owner)? {
        Some(leader) if leader.initial_balance > 0.0 => {
            let total = portfolio_value(t, &leader.owner, leader.cash_balance)?;
            (total - leader.initial_balance) / leader.initial_balance
        }
        _ => 0.0,
    };
    let current_value = (copy_trade.investment_amount * (1.0 + leader_return)).max(0.0);

    Ok(CopyTradeView {
        copy_trade: copy_trade.clone(),
        leader_return,
        current_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StockPrice;
    use std::time::Duration;

    fn create_test_service() -> LedgerService {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let rules = GameRules {
            dividend_batch_delay: Duration::ZERO,
            ..GameRules::default()
        };
        LedgerService::new(store, rules)
    }

    fn set_price(service: &LedgerService, symbol: &str, price: f64, hourly_yield: f64) {
        let mut row = StockPrice::new(symbol, price, 1.27);
        row.dividend_yield_hourly = hourly_yield;
        service.store.read(|t| t.upsert_price(&row)).unwrap();
    }

    fn cash(service: &LedgerService, owner: &str) -> f64 {
        service.account(owner).unwrap().cash_balance
    }

    #[test]
    fn test_new_account_gets_initial_balance() {
        let service = create_test_service();
        let account = service.account("alice").unwrap();
        assert_eq!(account.cash_balance, 10_000.0);
        assert_eq!(account.initial_balance, 10_000.0);
    }

    #[test]
    fn test_buy_twice_then_sell_all() {
        let service = create_test_service();
        set_price(&service, "AAPL", 150.0, 0.0);
        service.buy("alice", "AAPL", 10.0, None).unwrap();
        assert_eq!(cash(&service, "alice"), 8_500.0);

        set_price(&service, "AAPL", 180.0, 0.0);
        let receipt = service.buy("alice", "AAPL", 5.0, None).unwrap();
        assert_eq!(receipt.holding.shares, 15.0);
        assert!((receipt.holding.average_buy_price - 160.0).abs() < 1e-9);
        assert_eq!(cash(&service, "alice"), 7_600.0);

        set_price(&service, "AAPL", 200.0, 0.0);
        let sale = service.sell("alice", "AAPL", 15.0, None).unwrap();
        assert!(sale.holding.is_none());
        assert!((sale.profit_loss - 600.0).abs() < 1e-9);
        assert_eq!(cash(&service, "alice"), 10_600.0);

        assert!(service.holdings_view("alice").unwrap().is_empty());
        let log = service.transactions("alice", 10).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].transaction_type, TransactionType::Sell);
        assert_eq!(service.history("alice", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_partial_sell_keeps_average() {
        let service = create_test_service();
        set_price(&service, "MSFT", 300.0, 0.0);
        service.buy("bob", "MSFT", 4.0, None).unwrap();
        set_price(&service, "MSFT", 330.0, 0.0);
        let sale = service.sell("bob", "MSFT", 1.0, None).unwrap();

        let holding = sale.holding.unwrap();
        assert_eq!(holding.shares, 3.0);
        assert_eq!(holding.average_buy_price, 300.0);
    }

    #[test]
    fn test_stored_price_beats_client_quote() {
        let service = create_test_service();
        set_price(&service, "AAPL", 150.0, 0.0);
        let receipt = service.buy("alice", "AAPL", 1.0, Some(1.0)).unwrap();
        assert_eq!(receipt.transaction.price_per_share, 150.0);

        // Unknown symbol falls back to the client quote
        let receipt = service.buy("alice", "NEWCO", 2.0, Some(12.5)).unwrap();
        assert_eq!(receipt.transaction.total_amount, 25.0);

        let err = service.buy("alice", "GHOST", 1.0, None).unwrap_err();
        assert!(matches!(err, LedgerError::NoPriceData(_)));
    }

    #[test]
    fn test_rejected_buy_changes_nothing() {
        let service = create_test_service();
        set_price(&service, "NVDA", 350.0, 0.0);
        let err = service.buy("carol", "NVDA", 1_000.0, None).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(cash(&service, "carol"), 10_000.0);
        assert!(service.holdings_view("carol").unwrap().is_empty());
        assert!(service.transactions("carol", 10).unwrap().is_empty());

        assert!(matches!(
            service.buy("carol", "NVDA", 0.0, None).unwrap_err(),
            LedgerError::InvalidRequest(_)
        ));
        assert!(matches!(
            service.buy("carol", "NVDA", f64::NAN, None).unwrap_err(),
            LedgerError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_cannot_oversell_or_sell_unheld() {
        let service = create_test_service();
        set_price(&service, "BP", 4.85, 0.0);
        assert!(matches!(
            service.sell("dave", "BP", 1.0, None).unwrap_err(),
            LedgerError::HoldingNotFound(_)
        ));

        service.buy("dave", "BP", 10.0, None).unwrap();
        let before = cash(&service, "dave");
        assert!(matches!(
            service.sell("dave", "BP", 10.5, None).unwrap_err(),
            LedgerError::InsufficientShares { .. }
        ));
        assert_eq!(cash(&service, "dave"), before);
        assert_eq!(service.holdings_view("dave").unwrap()[0].holding.shares, 10.0);
    }

    #[test]
    fn test_buy_exactly_all_cash() {
        let service = create_test_service();
        set_price(&service, "TSLA", 200.0, 0.0);
        service.buy("erin", "TSLA", 50.0, None).unwrap();
        assert!(is_zero(cash(&service, "erin")));
    }

    #[test]
    fn test_transfer_moves_cash_and_logs_both_sides() {
        let service = create_test_service();
        service.account("a").unwrap();
        service.account("b").unwrap();
        service.store.read(|t| t.set_cash("a", 2_000.0)).unwrap();
        service.store.read(|t| t.set_cash("b", 500.0)).unwrap();

        let receipt = service.transfer("a", "b", 500.0).unwrap();
        assert_eq!(receipt.sender.cash_balance, 1_500.0);
        assert_eq!(receipt.recipient.cash_balance, 1_000.0);

        let a_log = service.transactions("a", 10).unwrap();
        let b_log = service.transactions("b", 10).unwrap();
        assert_eq!(a_log.len(), 1);
        assert_eq!(b_log.len(), 1);
        assert_eq!(a_log[0].symbol, TRANSFER_SYMBOL);
        assert_eq!(a_log[0].transaction_type, TransactionType::Sell);
        assert_eq!(b_log[0].transaction_type, TransactionType::Buy);
        assert_eq!(a_log[0].total_amount, 500.0);
        assert_eq!(b_log[0].total_amount, 500.0);
    }

    #[test]
    fn test_transfer_rejections() {
        let service = create_test_service();
        service.account("a").unwrap();
        assert!(matches!(
            service.transfer("a", "nobody", 10.0).unwrap_err(),
            LedgerError::AccountNotFound(_)
        ));
        assert!(matches!(
            service.transfer("a", "a", 10.0).unwrap_err(),
            LedgerError::InvalidRequest(_)
        ));
        service.account("b").unwrap();
        assert!(matches!(
            service.transfer("a", "b", 10_000.01).unwrap_err(),
            LedgerError::InsufficientFunds { .. }
        ));
        assert_eq!(cash(&service, "a"), 10_000.0);
        assert_eq!(cash(&service, "b"), 10_000.0);
    }

    #[test]
    fn test_owners_differing_in_case_are_distinct() {
        let service = create_test_service();
        service.account("alice").unwrap();
        service.account("Alice").unwrap();

        service.transfer("Alice", "alice", 250.0).unwrap();
        assert_eq!(cash(&service, "Alice"), 9_750.0);
        assert_eq!(cash(&service, "alice"), 10_250.0);

        let ct = service.start_copy_trade("alice", "Alice", 100.0).unwrap();
        assert_eq!(ct.leader_owner, "Alice");
    }

    #[test]
    fn test_copy_trade_commission_and_value() {
        let service = create_test_service();
        service.account("leader").unwrap();

        let ct = service.start_copy_trade("follower", "leader", 1_000.0).unwrap();
        assert!((ct.investment_amount - 800.0).abs() < 1e-9);
        assert!((cash(&service, "follower") - 9_000.0).abs() < 1e-9);
        assert!((cash(&service, "leader") - 10_200.0).abs() < 1e-9);

        // Leader is up 2% from the commission alone
        let view = service.copy_trade_value(&ct).unwrap();
        assert!((view.leader_return - 0.02).abs() < 1e-9);
        assert!((view.current_value - 816.0).abs() < 1e-9);

        let log = service.transactions("follower", 10).unwrap();
        assert_eq!(log[0].symbol, COPY_SYMBOL);
        assert_eq!(log[0].transaction_type, TransactionType::Buy);
    }

    #[test]
    fn test_copy_trade_rejections() {
        let service = create_test_service();
        assert!(matches!(
            service.start_copy_trade("f", "ghost", 100.0).unwrap_err(),
            LedgerError::LeaderNotFound(_)
        ));
        assert!(matches!(
            service.start_copy_trade("f", "f", 100.0).unwrap_err(),
            LedgerError::InvalidRequest(_)
        ));
        service.account("l").unwrap();
        assert!(matches!(
            service.start_copy_trade("f", "l", 20_000.0).unwrap_err(),
            LedgerError::InsufficientFunds { .. }
        ));
        assert_eq!(cash(&service, "l"), 10_000.0);
    }

    #[test]
    fn test_stop_copy_trade_credits_value() {
        let service = create_test_service();
        service.account("leader").unwrap();
        let ct = service.start_copy_trade("follower", "leader", 1_000.0).unwrap();

        let receipt = service.stop_copy_trade("follower", Some(&ct.id)).unwrap();
        assert_eq!(receipt.stopped.len(), 1);
        assert!((receipt.credited - 816.0).abs() < 1e-9);
        assert!((cash(&service, "follower") - 9_816.0).abs() < 1e-9);

        let trades = service.copy_trades("follower").unwrap();
        assert!(!trades[0].copy_trade.is_active);

        assert!(matches!(
            service.stop_copy_trade("follower", Some(&ct.id)).unwrap_err(),
            LedgerError::CopyTradeNotFound(_)
        ));
        assert_eq!(service.stop_copy_trade("follower", None).unwrap().credited, 0.0);
    }

    #[tokio::test]
    async fn test_dividends_credit_each_account_once() {
        let service = create_test_service();
        set_price(&service, "VOD", 100.0, 0.01);
        set_price(&service, "BP", 50.0, 0.02);
        set_price(&service, "AAPL", 150.0, 0.0);
        service.buy("alice", "VOD", 10.0, None).unwrap();
        service.buy("alice", "BP", 10.0, None).unwrap();
        service.buy("alice", "AAPL", 1.0, None).unwrap();
        service.buy("bob", "VOD", 5.0, None).unwrap();
        let alice_before = cash(&service, "alice");

        let sweep = service.pay_dividends().await.unwrap();
        // alice: 10*100*0.0001 + 10*50*0.0002 = 0.1 + 0.1
        // bob: 5*100*0.0001 = 0.05
        assert_eq!(sweep.payouts_count, 2);
        assert!((sweep.total_payouts - 0.25).abs() < 1e-9);
        assert!((cash(&service, "alice") - (alice_before + 0.2)).abs() < 1e-9);

        let vod = service
            .holdings_view("alice")
            .unwrap()
            .into_iter()
            .find(|h| h.holding.symbol == "VOD")
            .unwrap();
        assert!((vod.holding.total_dividends_earned - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dividends_batch_many_accounts() {
        let service = create_test_service();
        set_price(&service, "HSBA", 6.2, 0.0003);
        for i in 0..25 {
            service.buy(&format!("user{}", i), "HSBA", 100.0, None).unwrap();
        }
        let sweep = service.pay_dividends().await.unwrap();
        assert_eq!(sweep.payouts_count, 25);
        assert!(sweep.updates.iter().all(|p| p.amount > 0.0));
    }

    #[tokio::test]
    async fn test_dividends_with_no_yields_pay_nothing() {
        let service = create_test_service();
        set_price(&service, "AAPL", 150.0, 0.0);
        service.buy("alice", "AAPL", 1.0, None).unwrap();
        let sweep = service.pay_dividends().await.unwrap();
        assert_eq!(sweep.payouts_count, 0);
        assert_eq!(sweep.total_payouts, 0.0);
    }

    #[test]
    fn test_leaderboard_ranks_by_total_value() {
        let service = create_test_service();
        set_price(&service, "AAPL", 100.0, 0.0);
        service.account("flat").unwrap();
        service.buy("winner", "AAPL", 10.0, None).unwrap();
        set_price(&service, "AAPL", 200.0, 0.0);

        let board = service.leaderboard().unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].owner, "winner");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].total_value, 11_000.0);
        assert_eq!(board[0].percentage_return, 10.0);
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn test_events_are_broadcast() {
        let service = create_test_service();
        let mut rx = service.subscribe();
        set_price(&service, "AAPL", 150.0, 0.0);
        service.buy("alice", "AAPL", 1.0, None).unwrap();

        match rx.try_recv().unwrap() {
            LedgerEvent::BuyConfirmed { owner, symbol, .. } => {
                assert_eq!(owner, "alice");
                assert_eq!(symbol, "AAPL");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_reset_all() {
        let service = create_test_service();
        set_price(&service, "AAPL", 150.0, 0.0);
        service.buy("alice", "AAPL", 3.0, None).unwrap();
        assert_eq!(service.reset_all().unwrap(), 1);
        assert_eq!(cash(&service, "alice"), 10_000.0);
        assert!(service.holdings_view("alice").unwrap().is_empty());
        assert!(service.transactions("alice", 10).unwrap().is_empty());
    }
}
