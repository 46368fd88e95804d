use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::checkout::pricing::{BottleType, MIN_QUANTITY, QUANTITY_STEP};
use crate::error::FieldError;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z ]{1,49}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[6-9]\d{9}$").unwrap();
    static ref CITY_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z ]{1,49}$").unwrap();
    static ref PINCODE_RE: Regex = Regex::new(r"^[1-9]\d{5}$").unwrap();
}

/// Customer details as submitted on the first checkout step.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub bottle_type: String,
    pub quantity: i32,
}

/// Customer details that passed every field rule, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub bottle_type: BottleType,
    pub quantity: i32,
}

impl CustomerInfo {
    /// Collects every failing field rather than stopping at the first.
    pub fn validate(&self) -> Result<ValidCustomerInfo, Vec<FieldError>> {
        let mut errors = Vec::new();
        let name = self.name.trim();
        let phone = self.phone.trim();
        let address = self.address.trim();
        let city = self.city.trim();
        let pincode = self.pincode.trim();

        if !NAME_RE.is_match(name) {
            errors.push(FieldError {
                field: "name",
                message: "Name must be 2-50 letters",
            });
        }
        if !PHONE_RE.is_match(phone) {
            errors.push(FieldError {
                field: "phone",
                message: "Enter a valid 10-digit mobile number",
            });
        }
        let address_len = address.chars().count();
        if !(10..=200).contains(&address_len) {
            errors.push(FieldError {
                field: "address",
                message: "Address must be 10-200 characters",
            });
        }
        if !CITY_RE.is_match(city) {
            errors.push(FieldError {
                field: "city",
                message: "Enter a valid city name",
            });
        }
        if !PINCODE_RE.is_match(pincode) {
            errors.push(FieldError {
                field: "pincode",
                message: "Pincode must be 6 digits and cannot start with 0",
            });
        }
        let bottle_type = self.bottle_type.trim().parse::<BottleType>().ok();
        if bottle_type.is_none() {
            errors.push(FieldError {
                field: "bottle_type",
                message: "Select a bottle type",
            });
        }
        if self.quantity < MIN_QUANTITY || self.quantity % QUANTITY_STEP != 0 {
            errors.push(FieldError {
                field: "quantity",
                message: "Quantity must be at least 100, in multiples of 100",
            });
        }

        match bottle_type {
            Some(bottle_type) if errors.is_empty() => Ok(ValidCustomerInfo {
                name: name.to_string(),
                phone: phone.to_string(),
                address: address.to_string(),
                city: city.to_string(),
                pincode: pincode.to_string(),
                bottle_type,
                quantity: self.quantity,
            }),
            _ => Err(errors),
        }
    }
}
