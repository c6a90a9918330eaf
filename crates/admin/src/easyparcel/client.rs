//! EasyParcel HTTP client.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::EasyParcelError;
use super::types::{
    Envelope, PaidParcel, PayResult, Rate, RateRequest, RateResult, SubmitOrderRequest,
    SubmitResult, SubmittedOrder,
};
use crate::config::EasyParcelConfig;

/// EasyParcel API client.
#[derive(Clone)]
pub struct EasyParcelClient {
    inner: Arc<EasyParcelClientInner>,
}

struct EasyParcelClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl EasyParcelClient {
    /// Create a new EasyParcel client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &EasyParcelConfig) -> Result<Self, EasyParcelError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(EasyParcelClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Quote courier services for a route, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `EasyParcelError::NoRates` when no courier serves the route.
    #[instrument(skip(self, request), fields(send_postcode = %request.send_postcode))]
    pub async fn rate_check(&self, request: &RateRequest) -> Result<Vec<Rate>, EasyParcelError> {
        let envelope: Envelope<RateResult> =
            self.call("EPRateCheckingBulk", request.to_form()).await?;

        let result = envelope
            .result
            .into_iter()
            .next()
            .ok_or(EasyParcelError::NoRates)?;
        if !result.is_ok() {
            return Err(EasyParcelError::Failed(result.remarks));
        }

        let mut rates = result.rates;
        if rates.is_empty() {
            return Err(EasyParcelError::NoRates);
        }
        rates.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(rates)
    }

    /// Create a booking for a quoted service.
    ///
    /// # Errors
    ///
    /// Returns `EasyParcelError::Failed` when EasyParcel refuses the booking.
    #[instrument(skip(self, request), fields(reference = %request.reference, service_id = %request.service_id))]
    pub async fn submit_order(
        &self,
        request: &SubmitOrderRequest,
    ) -> Result<SubmittedOrder, EasyParcelError> {
        let envelope: Envelope<SubmitResult> =
            self.call("EPSubmitOrderBulk", request.to_form()).await?;

        let result = envelope
            .result
            .into_iter()
            .next()
            .ok_or_else(|| EasyParcelError::Parse("empty submit result".to_owned()))?;
        if !result.is_ok() {
            return Err(EasyParcelError::Failed(result.remarks));
        }

        let order_number = result
            .order_number
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EasyParcelError::Parse("submit result has no order number".to_owned()))?;

        tracing::info!(easyparcel_order = %order_number, "EasyParcel order submitted");
        Ok(SubmittedOrder {
            order_number,
            price: result.price,
            courier: result.courier,
        })
    }

    /// Pay a submitted booking from account credit.
    ///
    /// # Errors
    ///
    /// Returns `EasyParcelError::Failed` when payment did not produce an AWB
    /// (e.g. insufficient credit).
    #[instrument(skip(self))]
    pub async fn pay_order(&self, order_number: &str) -> Result<PaidParcel, EasyParcelError> {
        let form = vec![("bulk[0][order_no]".to_owned(), order_number.to_owned())];
        let envelope: Envelope<PayResult> = self.call("EPPayOrderBulk", form).await?;

        let result = envelope
            .result
            .into_iter()
            .next()
            .ok_or_else(|| EasyParcelError::Parse("empty payment result".to_owned()))?;

        let paid = result
            .into_paid(order_number)
            .map_err(EasyParcelError::Failed)?;
        tracing::info!(awb = ?paid.awb_no, "EasyParcel order paid");
        Ok(paid)
    }

    /// POST a bulk action and unwrap the envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        mut form: Vec<(String, String)>,
    ) -> Result<Envelope<T>, EasyParcelError> {
        form.push(("api".to_owned(), self.inner.api_key.expose_secret().to_owned()));

        let url = format!("{}/?ac={action}", self.inner.base_url);
        let response = self.inner.client.post(&url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EasyParcelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| EasyParcelError::Parse(format!("Failed to parse response: {e}")))?;

        if !envelope.is_success() {
            tracing::warn!(action, remark = %envelope.error_remark, "EasyParcel call rejected");
            return Err(EasyParcelError::Rejected(envelope.error_remark));
        }
        Ok(envelope)
    }
}

impl std::fmt::Debug for EasyParcelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EasyParcelClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}
