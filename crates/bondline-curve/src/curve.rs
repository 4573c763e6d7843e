//! # Quadratic Bonding Curve
//!
//! ```text
//!   price(S)    = basePrice + k · S² / P²
//!   integral(S) = basePrice · S / P + k · S³ / (3 · P³)
//! ```
//!
//! `P` is the 1e18 fixed-point scale and `k` the curve coefficient. All
//! intermediates are widened to 512 bits, so neither formula wraps for any
//! supply a token can realistically reach.
//!
//! ## Quoting
//!
//! Mint and burn quotes are slice sums, not closed-form inverses: the trade
//! is cut into at most `steps` equal slices and each slice is priced at the
//! simulated supply. Slices are priced at their expensive end for buys and at
//! their cheap end for sells, so a quote always under-delivers against the
//! exact integral. Larger trades relative to supply see a coarser step and a
//! larger (still one-sided) deviation.
//!
//! `integral` is exact and is only used for backing-ratio checks.

use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Multiply then divide through a 512-bit intermediate.
pub(crate) fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(BondlineError::ArithmeticOverflow);
    }
    let wide = a.full_mul(b) / U512::from(denominator);
    U256::try_from(wide).map_err(|_| BondlineError::ArithmeticOverflow)
}

fn narrow(value: U512) -> Result<U256> {
    U256::try_from(value).map_err(|_| BondlineError::ArithmeticOverflow)
}

/// Result of quoting a buy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Tokens credited for the currency
    pub tokens_out: U256,
    /// Average price paid per whole token
    pub effective_price: U256,
    /// Spot price at the post-trade supply
    pub end_price: U256,
}

/// Result of quoting a sell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnQuote {
    /// Currency released before fees
    pub gross_out: U256,
    /// Average price received per whole token
    pub effective_price: U256,
    /// Spot price at the post-trade supply
    pub end_price: U256,
}

/// Immutable curve parameters plus the quoting step count
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondingCurve {
    base_price: U256,
    coefficient: U256,
    steps: u32,
}

impl BondingCurve {
    /// Create a curve. Only `base_price > 0` is required here; launch bounds
    /// are enforced by the engine and the registry.
    pub fn new(base_price: U256, coefficient: U256) -> Result<Self> {
        if base_price.is_zero() {
            return Err(BondlineError::InvalidParameter(
                "base price must be greater than zero".into(),
            ));
        }
        Ok(Self {
            base_price,
            coefficient,
            steps: QUOTE_STEPS,
        })
    }

    /// Override the number of quoting slices
    pub fn with_steps(mut self, steps: u32) -> Result<Self> {
        if steps == 0 {
            return Err(BondlineError::InvalidParameter(
                "quote steps must be at least 1".into(),
            ));
        }
        self.steps = steps;
        Ok(self)
    }

    pub fn base_price(&self) -> U256 {
        self.base_price
    }

    pub fn coefficient(&self) -> U256 {
        self.coefficient
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// A zero coefficient gives a constant price.
    pub fn is_flat(&self) -> bool {
        self.coefficient.is_zero()
    }

    /// Spot price at `supply`
    pub fn price_at(&self, supply: U256) -> Result<U256> {
        if supply.is_zero() || self.is_flat() {
            return Ok(self.base_price);
        }
        let scaled = supply
            .full_mul(supply)
            .checked_mul(U512::from(self.coefficient))
            .ok_or(BondlineError::ArithmeticOverflow)?;
        let precision_sq = U512::from(PRECISION) * U512::from(PRECISION);
        let premium = narrow(scaled / precision_sq)?;
        self.base_price
            .checked_add(premium)
            .ok_or(BondlineError::ArithmeticOverflow)
    }

    /// Exact area under the curve from 0 to `supply`
    pub fn integral(&self, supply: U256) -> Result<U256> {
        if supply.is_zero() {
            return Ok(U256::zero());
        }
        let linear = mul_div(self.base_price, supply, PRECISION)?;
        if self.is_flat() {
            return Ok(linear);
        }

        let cube_scaled = supply
            .full_mul(supply)
            .checked_mul(U512::from(supply))
            .and_then(|cube| cube.checked_mul(U512::from(self.coefficient)))
            .ok_or(BondlineError::ArithmeticOverflow)?;
        let precision = U512::from(PRECISION);
        let denominator = U512::from(3u8) * precision * precision * precision;
        let cubic = narrow(cube_scaled / denominator)?;

        linear
            .checked_add(cubic)
            .ok_or(BondlineError::ArithmeticOverflow)
    }

    fn slice_count(&self, amount: U256) -> U256 {
        let steps = U256::from(self.steps);
        if self.is_flat() || amount < steps {
            U256::one()
        } else {
            steps
        }
    }

    /// Tokens obtained for `ton_in` currency at `supply`.
    ///
    /// Each currency slice is sized at the slice's starting price, then bought
    /// at the price of the estimated end supply. A zero `tokens_out` is a
    /// valid quote; the engine decides whether that is an error.
    pub fn mint_quote(&self, supply: U256, ton_in: U256) -> Result<MintQuote> {
        if ton_in.is_zero() {
            return Err(BondlineError::ZeroAmount);
        }

        let slices = self.slice_count(ton_in);
        let chunk = ton_in / slices;
        let mut remaining = ton_in;
        let mut simulated = supply;
        let mut tokens_out = U256::zero();
        let mut slice = U256::zero();

        while slice < slices {
            slice += U256::one();
            let spend = if slice == slices { remaining } else { chunk };
            remaining -= spend;

            let start_price = self.price_at(simulated)?;
            let price = if self.is_flat() {
                start_price
            } else {
                let estimate = mul_div(spend, PRECISION, start_price)?;
                let end_supply = simulated
                    .checked_add(estimate)
                    .ok_or(BondlineError::ArithmeticOverflow)?;
                self.price_at(end_supply)?
            };

            let bought = mul_div(spend, PRECISION, price)?;
            tokens_out = tokens_out
                .checked_add(bought)
                .ok_or(BondlineError::ArithmeticOverflow)?;
            simulated = simulated
                .checked_add(bought)
                .ok_or(BondlineError::ArithmeticOverflow)?;
        }

        tracing::trace!(%supply, %ton_in, %tokens_out, slices = %slices, "mint quote");
        let end_price = self.price_at(simulated)?;
        let effective_price = if tokens_out.is_zero() {
            self.price_at(supply)?
        } else {
            mul_div(ton_in, PRECISION, tokens_out)?
        };

        Ok(MintQuote {
            tokens_out,
            effective_price,
            end_price,
        })
    }

    /// Currency released for burning `tokens_in` at `supply`.
    ///
    /// Each token slice is paid at the price after the slice is removed.
    pub fn burn_quote(&self, supply: U256, tokens_in: U256) -> Result<BurnQuote> {
        if tokens_in.is_zero() {
            return Err(BondlineError::ZeroAmount);
        }
        if tokens_in > supply {
            return Err(BondlineError::ExceedsSupply {
                requested: tokens_in,
                supply,
            });
        }

        let slices = self.slice_count(tokens_in);
        let chunk = tokens_in / slices;
        let mut remaining = tokens_in;
        let mut simulated = supply;
        let mut gross_out = U256::zero();
        let mut slice = U256::zero();

        while slice < slices {
            slice += U256::one();
            let sold = if slice == slices { remaining } else { chunk };
            remaining -= sold;
            simulated -= sold;

            let price = self.price_at(simulated)?;
            let value = mul_div(sold, price, PRECISION)?;
            gross_out = gross_out
                .checked_add(value)
                .ok_or(BondlineError::ArithmeticOverflow)?;
        }

        tracing::trace!(%supply, %tokens_in, %gross_out, slices = %slices, "burn quote");
        Ok(BurnQuote {
            gross_out,
            effective_price: mul_div(gross_out, PRECISION, tokens_in)?,
            end_price: self.price_at(simulated)?,
        })
    }
}
