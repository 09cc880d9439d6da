use crate::domain::model::{CifRatioResult, CostBasisResult, ItemDuty, ShipmentCostInput};
use crate::utils::error::{Result, TariffError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 부가가치세율 10%
pub const VAT_RATE: Decimal = dec!(0.10);

const HUNDRED: Decimal = dec!(100);

fn overflow(what: &str) -> TariffError {
    TariffError::invalid_input(format!("{} is too large to compute", what))
}

/// Two-stage duty computation. Duty and VAT can only be computed from a
/// [`CifRatioResult`] produced by the first stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostBasisCalculator;

impl CostBasisCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_cif_ratio(&self, input: &ShipmentCostInput) -> Result<CifRatioResult> {
        if input.invoice_usd <= Decimal::ZERO {
            return Err(TariffError::invalid_input(format!(
                "invoice total must be positive, got {} USD",
                input.invoice_usd
            )));
        }
        if input.fx_rate <= Decimal::ZERO {
            return Err(TariffError::invalid_input(format!(
                "exchange rate must be positive, got {}",
                input.fx_rate
            )));
        }

        let adjusted_krw = if input.incoterm.nets_out_other_costs() {
            -input.other_costs_krw.abs()
        } else {
            input.other_costs_krw
        };
        let cif_krw = input
            .invoice_usd
            .checked_mul(input.fx_rate)
            .and_then(|krw| krw.checked_add(adjusted_krw))
            .ok_or_else(|| overflow("CIF amount"))?;
        let cif_ratio = cif_krw
            .checked_div(input.invoice_usd)
            .ok_or_else(|| overflow("CIF ratio"))?;

        tracing::debug!(
            "CIF basis ({}): {} USD x {} + ({}) KRW = {} KRW, ratio {}",
            input.incoterm,
            input.invoice_usd,
            input.fx_rate,
            adjusted_krw,
            cif_krw,
            cif_ratio
        );

        Ok(CifRatioResult {
            incoterm: input.incoterm,
            invoice_usd: input.invoice_usd,
            fx_rate: input.fx_rate,
            other_costs_krw: input.other_costs_krw,
            adjusted_krw,
            cif_krw,
            cif_ratio,
        })
    }

    pub fn compute_duty_and_vat(
        &self,
        input: &ShipmentCostInput,
        ratio: &CifRatioResult,
    ) -> Result<CostBasisResult> {
        if ratio.invoice_usd != input.invoice_usd
            || ratio.incoterm != input.incoterm
            || ratio.fx_rate != input.fx_rate
            || ratio.other_costs_krw != input.other_costs_krw
        {
            return Err(TariffError::invalid_input(
                "CIF ratio was computed for a different shipment",
            ));
        }

        let line_items_usd = input
            .line_items_usd()
            .ok_or_else(|| overflow("line item total"))?;
        if line_items_usd != input.invoice_usd {
            return Err(TariffError::LineItemMismatch {
                invoice_usd: input.invoice_usd,
                line_items_usd,
            });
        }

        let mut items = Vec::with_capacity(input.line_items.len());
        for item in &input.line_items {
            let cif_krw = item
                .product_usd
                .checked_mul(ratio.cif_ratio)
                .ok_or_else(|| overflow("line item CIF amount"))?;
            let duty = match item.rates.duty_entry() {
                Some(entry) => {
                    let rate_percent = entry.rate_percent();
                    let duty_krw = cif_krw
                        .checked_mul(rate_percent)
                        .map(|d| d / HUNDRED)
                        .ok_or_else(|| overflow("duty"))?;
                    ItemDuty {
                        ten_digit_code: item.rates.ten_digit_code.clone(),
                        product_usd: item.product_usd,
                        cif_krw,
                        rate_type: entry.rate_type,
                        rate_percent,
                        duty_krw,
                        unratable: false,
                    }
                }
                None => {
                    tracing::warn!(
                        "No agreement or basic rate for {}, duty counted as 0",
                        item.rates.ten_digit_code
                    );
                    ItemDuty {
                        ten_digit_code: item.rates.ten_digit_code.clone(),
                        product_usd: item.product_usd,
                        cif_krw,
                        rate_type: None,
                        rate_percent: Decimal::ZERO,
                        duty_krw: Decimal::ZERO,
                        unratable: true,
                    }
                }
            };
            items.push(duty);
        }

        let total_duty = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.duty_krw))
            .ok_or_else(|| overflow("total duty"))?;
        let total_vat = ratio
            .cif_krw
            .checked_add(total_duty)
            .and_then(|base| base.checked_mul(VAT_RATE))
            .ok_or_else(|| overflow("VAT"))?;
        // summary() adds the two totals
        total_duty
            .checked_add(total_vat)
            .ok_or_else(|| overflow("total tax"))?;

        tracing::info!(
            "🧾 Duty {} KRW, VAT {} KRW over {} line items",
            total_duty.round_dp(0),
            total_vat.round_dp(0),
            items.len()
        );

        Ok(CostBasisResult {
            cif_ratio: ratio.cif_ratio,
            cif_krw: ratio.cif_krw,
            items,
            total_duty,
            total_vat,
        })
    }
}
