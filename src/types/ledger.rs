//! Ledger Types
//!
//! Accounts, holdings, the append-only transaction log, copy trades and the
//! portfolio history used for performance charting.

use serde::{Deserialize, Serialize};

/// Synthetic symbol used for cash transfers between accounts.
pub const TRANSFER_SYMBOL: &str = "TRANSFER";

/// Synthetic symbol used for copy-trade stakes.
pub const COPY_SYMBOL: &str = "COPY";

// =============================================================================
// Enums
// =============================================================================

/// Direction of a logged transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(TransactionType::Buy),
            "sell" => Some(TransactionType::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A player's cash account. One row per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Owner identifier (email or user id)
    pub owner: String,
    /// Spendable cash in GBP
    pub cash_balance: f64,
    /// Balance the account started with, used for returns
    pub initial_balance: f64,
    /// Free stock grants still available to the player
    pub free_stocks_available: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserAccount {
    /// Create a new account funded with `initial_balance`.
    pub fn new(owner: impl Into<String>, initial_balance: f64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            owner: owner.into(),
            cash_balance: initial_balance,
            initial_balance,
            free_stocks_available: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A position in one symbol. Zero or one row per (owner, symbol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub owner: String,
    pub symbol: String,
    pub shares: f64,
    /// Weighted-average purchase price, updated only on buys
    pub average_buy_price: f64,
    pub total_dividends_earned: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Holding {
    /// Open a new holding from a first purchase.
    pub fn new(owner: impl Into<String>, symbol: impl Into<String>, shares: f64, price: f64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.into(),
            symbol: symbol.into(),
            shares,
            average_buy_price: price,
            total_dividends_earned: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold another purchase into the weighted-average cost.
    pub fn add_purchase(&mut self, shares: f64, price: f64) {
        let total_shares = self.shares + shares;
        self.average_buy_price =
            (self.shares * self.average_buy_price + shares * price) / total_shares;
        self.shares = total_shares;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Total amount paid for the shares still held.
    pub fn cost_basis(&self) -> f64 {
        self.shares * self.average_buy_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }
}

/// Append-only audit record of a money movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub owner: String,
    /// Real symbol, or [`TRANSFER_SYMBOL`] / [`COPY_SYMBOL`]
    pub symbol: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_amount: f64,
    pub created_at: i64,
}

impl Transaction {
    pub fn new(
        owner: impl Into<String>,
        symbol: impl Into<String>,
        transaction_type: TransactionType,
        shares: f64,
        price_per_share: f64,
        total_amount: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.into(),
            symbol: symbol.into(),
            transaction_type,
            shares,
            price_per_share,
            total_amount,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// One side of a cash transfer. Money movements log a single unit priced at the amount.
    pub fn cash_movement(
        owner: impl Into<String>,
        symbol: &str,
        transaction_type: TransactionType,
        amount: f64,
    ) -> Self {
        Self::new(owner, symbol, transaction_type, 1.0, amount, amount)
    }
}

/// A follower's notional stake mirroring a leader's percentage return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTrade {
    pub id: String,
    pub follower_owner: String,
    pub leader_owner: String,
    /// Stake after commission. Not escrowed anywhere.
    pub investment_amount: f64,
    pub is_active: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
}

impl CopyTrade {
    pub fn new(
        follower_owner: impl Into<String>,
        leader_owner: impl Into<String>,
        investment_amount: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            follower_owner: follower_owner.into(),
            leader_owner: leader_owner.into(),
            investment_amount,
            is_active: true,
            created_at: chrono::Utc::now().timestamp_millis(),
            closed_at: None,
        }
    }
}

/// Snapshot appended after every trade, for performance-over-time charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHistoryEntry {
    pub id: String,
    pub owner: String,
    pub symbol: String,
    pub action: TransactionType,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_amount: f64,
    pub cash_balance_after: f64,
    pub portfolio_value_after: f64,
    pub created_at: i64,
}

// =============================================================================
// Computed views
// =============================================================================

/// Leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub owner: String,
    pub total_value: f64,
    pub percentage_return: f64,
    pub rank: u32,
}

/// Holding with its current market valuation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingView {
    #[serde(flatten)]
    pub holding: Holding,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

/// Copy trade with its value computed from the leader's current return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeView {
    #[serde(flatten)]
    pub copy_trade: CopyTrade,
    pub leader_return: f64,
    pub current_value: f64,
}

/// One account's credit from a dividend sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendPayout {
    pub owner: String,
    pub amount: f64,
    pub new_balance: f64,
}

/// Result of an hourly dividend sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendSweep {
    pub total_payouts: f64,
    pub payouts_count: usize,
    pub updates: Vec<DividendPayout>,
}

/// Ledger notifications, delivered best-effort to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    BuyConfirmed {
        owner: String,
        symbol: String,
        shares: f64,
        price: f64,
    },
    SaleConfirmed {
        owner: String,
        symbol: String,
        shares: f64,
        price: f64,
        profit_loss: f64,
    },
    TransferCompleted {
        sender: String,
        recipient: String,
        amount: f64,
    },
    CopyTradeStarted {
        follower: String,
        leader: String,
        commission: f64,
    },
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/trading/buy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    pub symbol: String,
    pub shares: f64,
    /// Client-side quote, used only when the symbol has no stored price
    #[serde(default)]
    pub price: Option<f64>,
}

/// Stock reference carried inside a trade request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRef {
    pub symbol: String,
    #[serde(default, alias = "priceGbp")]
    pub price: Option<f64>,
}

/// Body of `POST /api/trading/trade`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    #[serde(rename = "type")]
    pub trade_type: TransactionType,
    pub stock: StockRef,
    pub shares: f64,
}

/// Body of `POST /api/transfers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(rename = "recipientEmail", alias = "recipient")]
    pub recipient: String,
    pub amount: f64,
}

/// Body of `POST /api/copy-trades`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCopyTradeRequest {
    #[serde(rename = "leaderEmail", alias = "leader")]
    pub leader: String,
    pub amount: f64,
}

/// Body of `POST /api/copy-trades/stop`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCopyTradeRequest {
    #[serde(default)]
    pub copy_trade_id: Option<String>,
}
