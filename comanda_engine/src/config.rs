use comanda_common::Money;

pub const DEFAULT_REWARD_RATE: Money = Money::from_minor(1_000);
pub const DEFAULT_MINIMUM_CHARGE: Money = Money::from_minor(50);
pub const DEFAULT_AMOUNT_TOLERANCE: Money = Money::from_minor(1);
pub const DEFAULT_CURRENCY: &str = "usd";

/// Business rules that the order flow applies. The server populates these from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFlowConfig {
    /// Amount that must be spent to earn one loyalty point
    pub reward_rate: Money,
    /// Smallest amount for which a payment intent can be opened
    pub minimum_charge: Money,
    /// Largest allowed difference between a settled payment and the order total it pays for
    pub amount_tolerance: Money,
    /// The single settlement currency, in the gateway's lowercase ISO format
    pub currency: String,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            reward_rate: DEFAULT_REWARD_RATE,
            minimum_charge: DEFAULT_MINIMUM_CHARGE,
            amount_tolerance: DEFAULT_AMOUNT_TOLERANCE,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}
