//! Checkout Session creation.

use kedai_core::{CurrencyCode, Price};

use super::{CheckoutSession, StripeClient, StripeError};

/// One line on the hosted payment page.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// Everything needed to open a Checkout Session for a pending order.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub order_id: String,
    pub order_number: String,
    pub customer_email: String,
    pub currency: CurrencyCode,
    pub lines: Vec<CheckoutLine>,
    pub shipping: Price,
    pub tax: Price,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionParams {
    /// Encode as Stripe's bracketed form fields.
    ///
    /// Shipping and tax become their own lines when non-zero so the hosted
    /// page total matches the order total exactly.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidAmount` for negative or overflowing amounts.
    pub fn to_form(&self) -> Result<Vec<(String, String)>, StripeError> {
        let mut form = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("success_url".to_owned(), self.success_url.clone()),
            ("cancel_url".to_owned(), self.cancel_url.clone()),
            ("client_reference_id".to_owned(), self.order_id.clone()),
            ("customer_email".to_owned(), self.customer_email.clone()),
            ("metadata[order_id]".to_owned(), self.order_id.clone()),
            ("metadata[order_number]".to_owned(), self.order_number.clone()),
            (
                "payment_intent_data[metadata][order_id]".to_owned(),
                self.order_id.clone(),
            ),
        ];

        let extras = [("Shipping", self.shipping), ("Tax", self.tax)];
        let extra_lines = extras
            .iter()
            .filter(|(_, price)| !price.amount.is_zero())
            .map(|(name, price)| CheckoutLine {
                name: (*name).to_owned(),
                unit_price: *price,
                quantity: 1,
            });

        for (i, line) in self.lines.iter().cloned().chain(extra_lines).enumerate() {
            let unit_amount = line
                .unit_price
                .to_minor_units()
                .map_err(|e| StripeError::InvalidAmount(format!("{}: {e}", line.name)))?;
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.stripe_code().to_owned(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name,
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                unit_amount.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        Ok(form)
    }
}

impl StripeClient {
    /// Create a Checkout Session. The order ID doubles as idempotency key,
    /// so a retried request for the same order returns the same session.
    ///
    /// # Errors
    ///
    /// Returns error if the amounts are invalid or the API request fails.
    #[tracing::instrument(skip(self, params), fields(order_number = %params.order_number))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, StripeError> {
        let form = params.to_form()?;
        self.post_form("/v1/checkout/sessions", &form, &params.order_id)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn myr(amount: &str) -> Price {
        Price::new(amount.parse().unwrap(), CurrencyCode::MYR)
    }

    fn params(shipping: &str, tax: &str) -> CheckoutSessionParams {
        CheckoutSessionParams {
            order_id: "order-1".to_owned(),
            order_number: "KD-20250101-ABCDEF".to_owned(),
            customer_email: "buyer@example.my".to_owned(),
            currency: CurrencyCode::MYR,
            lines: vec![CheckoutLine {
                name: "Kopi Tarik - 250g".to_owned(),
                unit_price: myr("12.50"),
                quantity: 2,
            }],
            shipping: myr(shipping),
            tax: myr(tax),
            success_url: "https://shop.test/checkout/success".to_owned(),
            cancel_url: "https://shop.test/cart".to_owned(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_carries_order_reference() {
        let form = params("8.00", "0").to_form().unwrap();
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "client_reference_id"), Some("order-1"));
        assert_eq!(value(&form, "metadata[order_id]"), Some("order-1"));
        assert_eq!(
            value(&form, "metadata[order_number]"),
            Some("KD-20250101-ABCDEF")
        );
    }

    #[test]
    fn test_form_line_items_in_minor_units() {
        let form = params("8.00", "1.50").to_form().unwrap();
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("myr"));
        assert_eq!(
            value(&form, "line_items[1][price_data][product_data][name]"),
            Some("Shipping")
        );
        assert_eq!(value(&form, "line_items[1][price_data][unit_amount]"), Some("800"));
        assert_eq!(value(&form, "line_items[2][price_data][unit_amount]"), Some("150"));
    }

    #[test]
    fn test_free_shipping_and_no_tax_add_no_lines() {
        let form = params("0", "0").to_form().unwrap();
        assert!(value(&form, "line_items[1][quantity]").is_none());
    }
}
