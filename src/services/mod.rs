pub mod carts;
pub mod checkout;
pub mod conversations;
pub mod orders;
pub mod payment_gateway;
pub mod payments;
pub mod products;
pub mod reports;
pub mod reviews;
pub mod users;
pub mod webhooks;
pub mod wishlists;

use rust_decimal::Decimal;

/// Normalizes a monetary amount to exactly two decimal places. The SQLite
/// backend stores Decimal columns as REAL, which loses trailing zeros;
/// services rescale every amount on the way out so `35.50` never
/// serializes as `35.5`.
pub(crate) fn money(mut amount: Decimal) -> Decimal {
    amount.rescale(2);
    amount
}

#[cfg(test)]
mod tests {
    use super::money;
    use rust_decimal_macros::dec;

    #[test]
    fn money_pads_to_two_decimal_places() {
        assert_eq!(money(dec!(35.5)).to_string(), "35.50");
        assert_eq!(money(dec!(20)).to_string(), "20.00");
        assert_eq!(money(dec!(19.99)).to_string(), "19.99");
    }
}
