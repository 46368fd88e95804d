use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RazorpayConfig;
use crate::payments::gateway::{
    verify_payment_signature, GatewayOrder, PaymentGateway, PaymentMethod, PaymentProof,
};

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

pub struct RazorpayGateway {
    http: reqwest::Client,
    cfg: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(cfg: RazorpayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build razorpay http client")?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, amount_paise: i64, receipt: &str) -> anyhow::Result<GatewayOrder> {
        let url = format!("{}/v1/orders", self.cfg.base_url.trim_end_matches('/'));
        let order: OrderResponse = self
            .http
            .post(&url)
            .basic_auth(&self.cfg.key_id, Some(&self.cfg.key_secret))
            .json(&CreateOrderBody {
                amount: amount_paise,
                currency: "INR",
                receipt,
            })
            .send()
            .await
            .context("razorpay create order request")?
            .error_for_status()
            .context("razorpay create order status")?
            .json()
            .await
            .context("razorpay create order body")?;
        debug!(order_id = %order.id, amount = order.amount, "razorpay order created");
        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }

    async fn collect(
        &self,
        _order: &GatewayOrder,
        _method: PaymentMethod,
    ) -> anyhow::Result<Option<PaymentProof>> {
        Ok(None)
    }

    async fn verify(&self, order_id: &str, proof: &PaymentProof) -> bool {
        let ok = verify_payment_signature(
            &self.cfg.key_secret,
            order_id,
            &proof.payment_id,
            &proof.signature,
        );
        if !ok {
            warn!(%order_id, payment_id = %proof.payment_id, "razorpay signature mismatch");
        }
        ok
    }
}
