use serde::Serialize;
use thiserror::Error;

use crate::checkout::validation::{CustomerInfo, ValidCustomerInfo};
use crate::error::FieldError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    CustomerInfo,
    PhoneVerification,
    PaymentDetails,
    Confirmation,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("checkout is at {at:?}, cannot {action}")]
    OutOfOrder {
        at: CheckoutStep,
        action: &'static str,
    },
    #[error("invalid customer info")]
    Invalid(Vec<FieldError>),
}

/// Linear checkout flow. Every transition checks the current step, so a
/// request can't skip phone verification or settle a payment twice.
#[derive(Debug, Clone)]
pub struct Checkout {
    step: CheckoutStep,
}

impl Checkout {
    pub fn new() -> Self {
        Self {
            step: CheckoutStep::CustomerInfo,
        }
    }

    /// Rebuild a checkout whose campaign exists and still awaits payment.
    pub fn awaiting_payment() -> Self {
        Self {
            step: CheckoutStep::PaymentDetails,
        }
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    fn expect(&self, at: CheckoutStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == at {
            Ok(())
        } else {
            Err(WizardError::OutOfOrder {
                at: self.step,
                action,
            })
        }
    }

    /// CustomerInfo → PhoneVerification.
    pub fn submit_info(&mut self, raw: &CustomerInfo) -> Result<ValidCustomerInfo, WizardError> {
        self.expect(CheckoutStep::CustomerInfo, "submit customer info")?;
        let valid = raw.validate().map_err(WizardError::Invalid)?;
        self.step = CheckoutStep::PhoneVerification;
        Ok(valid)
    }

    /// PhoneVerification → PaymentDetails, once the phone's OTP is verified.
    pub fn phone_verified(&mut self) -> Result<(), WizardError> {
        self.expect(CheckoutStep::PhoneVerification, "confirm phone")?;
        self.step = CheckoutStep::PaymentDetails;
        Ok(())
    }

    /// PaymentDetails → Confirmation | Failed.
    pub fn payment_decided(&mut self, accepted: bool) -> Result<(), WizardError> {
        self.expect(CheckoutStep::PaymentDetails, "settle payment")?;
        self.step = if accepted {
            CheckoutStep::Confirmation
        } else {
            CheckoutStep::Failed
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::validation::tests::good;

    #[test]
    fn happy_path() {
        let mut c = Checkout::new();
        assert_eq!(c.step(), CheckoutStep::CustomerInfo);
        let info = c.submit_info(&good()).unwrap();
        assert_eq!(info.name, "Priya Sharma");
        assert_eq!(c.step(), CheckoutStep::PhoneVerification);
        c.phone_verified().unwrap();
        assert_eq!(c.step(), CheckoutStep::PaymentDetails);
        c.payment_decided(true).unwrap();
        assert_eq!(c.step(), CheckoutStep::Confirmation);
    }

    #[test]
    fn invalid_info_stays_on_first_step() {
        let mut c = Checkout::new();
        let mut info = good();
        info.pincode = "012345".into();
        match c.submit_info(&info) {
            Err(WizardError::Invalid(fields)) => assert_eq!(fields[0].field, "pincode"),
            other => panic!("expected invalid, got {other:?}"),
        }
        assert_eq!(c.step(), CheckoutStep::CustomerInfo);
    }

    #[test]
    fn cannot_pay_before_phone_verification() {
        let mut c = Checkout::new();
        c.submit_info(&good()).unwrap();
        let err = c.payment_decided(true).unwrap_err();
        assert_eq!(
            err,
            WizardError::OutOfOrder {
                at: CheckoutStep::PhoneVerification,
                action: "settle payment"
            }
        );
    }

    #[test]
    fn payment_settles_once() {
        let mut c = Checkout::awaiting_payment();
        c.payment_decided(false).unwrap();
        assert_eq!(c.step(), CheckoutStep::Failed);
        assert!(c.payment_decided(true).is_err());
    }
}
