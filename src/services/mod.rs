// Domain services
pub mod inventory;
pub mod staff;

// Append-only event log shared by the domain services
pub mod transactions;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::MAX_AMOUNT;
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;
use validator::ValidationError;

/// Future returned by one attempt of [`retry_in_transaction`].
pub type AttemptFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'c>>;

/// Runs `attempt` in a fresh transaction and commits what it returns.
///
/// When an attempt fails with a retryable error its transaction is rolled
/// back and the whole attempt runs again, at most `max_retries` more times.
pub async fn retry_in_transaction<T, F>(
    db: &DbPool,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, ServiceError>
where
    T: Send,
    F: for<'c> FnMut(&'c DatabaseTransaction) -> AttemptFuture<'c, T> + Send,
{
    let mut tries: u32 = 0;
    loop {
        tries += 1;
        let txn = db.begin().await?;
        match attempt(&txn).await {
            Ok(value) => {
                txn.commit().await?;
                return Ok(value);
            }
            Err(e) => {
                txn.rollback().await?;
                if !e.is_retryable() || tries > max_retries {
                    return Err(e);
                }
                warn!(attempt = tries, error = %e, "transaction conflicted, retrying");
            }
        }
    }
}

fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("Value must not be negative".into());
        return Err(err);
    }
    if *value > MAX_AMOUNT {
        let mut err = ValidationError::new("range");
        err.message = Some(format!("Value must not exceed {}", MAX_AMOUNT).into());
        return Err(err);
    }
    Ok(())
}

/// Rejects a quantity whose magnitude is zero or above [`MAX_AMOUNT`].
fn check_quantity(quantity: Decimal, what: &str) -> Result<(), ServiceError> {
    if quantity.is_zero() {
        return Err(ServiceError::InvalidInput(format!("{} must not be zero", what)));
    }
    if quantity.abs() > MAX_AMOUNT {
        return Err(ServiceError::InvalidInput(format!(
            "{} must not exceed {}",
            what, MAX_AMOUNT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_inputs_are_bounded() {
        assert!(validate_non_negative_decimal(&Decimal::ZERO).is_ok());
        assert!(validate_non_negative_decimal(&MAX_AMOUNT).is_ok());
        assert!(validate_non_negative_decimal(&dec!(-0.01)).is_err());
        assert!(validate_non_negative_decimal(&(MAX_AMOUNT + Decimal::ONE)).is_err());
        assert!(validate_non_negative_decimal(&Decimal::MAX).is_err());
    }

    #[test]
    fn quantities_must_be_nonzero_and_bounded() {
        assert!(check_quantity(dec!(-5), "Quantity").is_ok());
        assert!(matches!(
            check_quantity(Decimal::ZERO, "Quantity"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            check_quantity(-Decimal::MAX, "Quantity"),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
