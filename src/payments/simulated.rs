use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::payments::gateway::{
    sign_payment, verify_payment_signature, GatewayOrder, PaymentGateway, PaymentMethod,
    PaymentProof,
};

/// Offline gateway: accepts every payment after an artificial delay and signs
/// it with a local secret, so verification runs the same HMAC check as live.
pub struct SimulatedGateway {
    secret: String,
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new(secret: impl Into<String>, latency: Duration) -> Self {
        Self {
            secret: secret.into(),
            latency,
        }
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_order(&self, amount_paise: i64, receipt: &str) -> anyhow::Result<GatewayOrder> {
        self.delay().await;
        let id = format!("order_sim_{}", Uuid::new_v4().simple());
        debug!(order_id = %id, %receipt, amount = amount_paise, "simulated order created");
        Ok(GatewayOrder {
            id,
            amount: amount_paise,
            currency: "INR".into(),
        })
    }

    async fn collect(
        &self,
        order: &GatewayOrder,
        method: PaymentMethod,
    ) -> anyhow::Result<Option<PaymentProof>> {
        let payment_id = format!("pay_sim_{}", Uuid::new_v4().simple());
        let signature = sign_payment(&self.secret, &order.id, &payment_id)?;
        debug!(order_id = %order.id, %payment_id, method = method.as_str(), "simulated payment collected");
        Ok(Some(PaymentProof {
            payment_id,
            signature,
        }))
    }

    async fn verify(&self, order_id: &str, proof: &PaymentProof) -> bool {
        self.delay().await;
        let ok = verify_payment_signature(&self.secret, order_id, &proof.payment_id, &proof.signature);
        if !ok {
            warn!(%order_id, payment_id = %proof.payment_id, "simulated signature mismatch");
        }
        ok
    }
}
