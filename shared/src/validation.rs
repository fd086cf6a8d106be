//! Validation utilities for StockCloud
//!
//! Includes Peru-specific identifier checks (DNI, RUC) used when registering
//! clients and suppliers.

use rust_decimal::Decimal;

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate a quantity moved in or out of stock
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a minimum stock threshold or initial stock
pub fn validate_stock_level(level: i32) -> Result<(), &'static str> {
    if level < 0 {
        return Err("Stock level cannot be negative");
    }
    Ok(())
}

pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

pub fn validate_required(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value cannot be blank");
    }
    Ok(())
}

// ============================================================================
// Peru-Specific Validations
// ============================================================================

/// Validate a DNI (Documento Nacional de Identidad): exactly 8 digits
pub fn validate_dni(dni: &str) -> Result<(), &'static str> {
    if dni.len() != 8 || !dni.chars().all(|c| c.is_ascii_digit()) {
        return Err("DNI must be exactly 8 digits");
    }
    Ok(())
}

/// Validate a RUC (Registro Único de Contribuyentes): exactly 11 digits
/// starting with 10, 15, 17 or 20
pub fn validate_ruc(ruc: &str) -> Result<(), &'static str> {
    if ruc.len() != 11 || !ruc.chars().all(|c| c.is_ascii_digit()) {
        return Err("RUC must be exactly 11 digits");
    }
    if !["10", "15", "17", "20"].iter().any(|p| ruc.starts_with(p)) {
        return Err("RUC must start with 10, 15, 17 or 20");
    }
    Ok(())
}

/// Validate Peruvian phone number format
/// Accepts: 987654321, 987 654 321, +51987654321, and 7-digit Lima landlines
pub fn validate_peru_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // Mobile: 9 digits starting with 9
    if digits.len() == 9 && digits.starts_with('9') {
        return Ok(());
    }
    // With country code
    if digits.len() == 11 && digits.starts_with("519") {
        return Ok(());
    }
    // Lima landline
    if digits.len() == 7 {
        return Ok(());
    }

    Err("Invalid Peruvian phone number format")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(-1).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ventas@bodega.pe").is_ok());
        assert!(validate_email("invalid").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secreto123").is_ok());
        assert!(validate_password("corto").is_err());
    }

    #[test]
    fn test_validate_dni() {
        assert!(validate_dni("12345678").is_ok());
        assert!(validate_dni("1234567").is_err());
        assert!(validate_dni("1234567A").is_err());
    }

    #[test]
    fn test_validate_ruc() {
        assert!(validate_ruc("20123456789").is_ok());
        assert!(validate_ruc("10456789012").is_ok());
        assert!(validate_ruc("30123456789").is_err());
        assert!(validate_ruc("2012345678").is_err());
    }

    #[test]
    fn test_validate_peru_phone() {
        assert!(validate_peru_phone("987654321").is_ok());
        assert!(validate_peru_phone("987 654 321").is_ok());
        assert!(validate_peru_phone("+51 987654321").is_ok());
        assert!(validate_peru_phone("4251234").is_ok());
        assert!(validate_peru_phone("12345").is_err());
    }

    proptest! {
        #[test]
        fn prop_any_eight_digits_is_dni(n in 0u32..100_000_000) {
            let dni = format!("{:08}", n);
            prop_assert!(validate_dni(&dni).is_ok());
        }

        #[test]
        fn prop_business_ruc_accepted(n in 0u64..1_000_000_000) {
            let ruc = format!("20{:09}", n);
            prop_assert!(validate_ruc(&ruc).is_ok());
        }
    }
}
