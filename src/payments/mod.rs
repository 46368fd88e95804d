pub mod gateway;
pub mod razorpay;
pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use crate::config::PaymentConfig;
use gateway::PaymentGateway;

/// Live Razorpay when credentials are configured, the simulator otherwise.
pub fn from_config(cfg: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let gw: Arc<dyn PaymentGateway> = match &cfg.razorpay {
        Some(rzp) => Arc::new(razorpay::RazorpayGateway::new(rzp.clone())?),
        None => Arc::new(simulated::SimulatedGateway::new(
            cfg.sim_secret.clone(),
            Duration::from_millis(cfg.sim_latency_ms),
        )),
    };
    tracing::info!(gateway = gw.name(), "payment gateway selected");
    Ok(gw)
}
