use std::str::FromStr;
use ethers::types::{I256, U256};
use eyre::{Result, WrapErr};
use rust_decimal::Decimal;

pub fn u256_to_decimal_scaled_decimals(val: U256, decimals: u32) -> Result<Decimal> {
    let formatted = ethers::utils::format_units(val, decimals as usize)?;
    Decimal::from_str(&formatted).wrap_err_with(|| format!("{formatted} does not fit a decimal"))
}

pub fn i256_to_decimal_scaled_decimals(val: I256, decimals: u32) -> Result<Decimal> {
    let formatted = ethers::utils::format_units(val, decimals as usize)?;
    Decimal::from_str(&formatted).wrap_err_with(|| format!("{formatted} does not fit a decimal"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn scales_fixed_point_integers() {
        let raw = U256::from_dec_str("1234567890000000000").unwrap();
        assert_eq!(u256_to_decimal_scaled_decimals(raw, 18).unwrap(), dec!(1.23456789));

        let answer = I256::from(6_512_345_678_901i64);
        assert_eq!(i256_to_decimal_scaled_decimals(answer, 8).unwrap(), dec!(65123.45678901));
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(u256_to_decimal_scaled_decimals(U256::zero(), 18).unwrap(), Decimal::ZERO);
    }
}
