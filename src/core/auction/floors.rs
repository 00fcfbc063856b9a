use crate::core::currency::{ConvertError, CurrencyService};
use crate::core::spec::openrtb::Imp;

/// The impression floor converted to the exchange default currency.
/// An empty bidfloorcur means the floor was already quoted in the
/// default currency.
pub fn imp_floor(currency: &CurrencyService, imp: &Imp) -> Result<f64, ConvertError> {
    if imp.bidfloor <= 0.0 {
        return Ok(0.0);
    }

    let cur = if imp.bidfloorcur.is_empty() {
        currency.base()
    } else {
        imp.bidfloorcur.as_str()
    };

    currency.convert(imp.bidfloor, cur, currency.base())
}

/// Effective floor for one partner on one impression: the converted
/// impression floor raised by any partner-specific adjustment from the
/// publisher config.
pub fn effective_floor(converted_imp_floor: f64, partner_adjustment: f64) -> f64 {
    converted_imp_floor.max(partner_adjustment).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyConfig;

    fn usd_service() -> CurrencyService {
        let mut cfg = CurrencyConfig::default();
        cfg.static_rates.insert("EUR".to_string(), 1.0 / 1.08);
        CurrencyService::new(cfg).unwrap()
    }

    #[test]
    fn test_floor_converted_to_default_currency() {
        let currency = usd_service();
        let imp = Imp {
            bidfloor: 1.0,
            bidfloorcur: "EUR".to_string(),
            ..Default::default()
        };

        let floor = imp_floor(&currency, &imp).unwrap();
        assert!((floor - 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_empty_floor_currency_means_default() {
        let currency = usd_service();
        let imp = Imp {
            bidfloor: 0.25,
            ..Default::default()
        };

        assert_eq!(imp_floor(&currency, &imp).unwrap(), 0.25);
    }

    #[test]
    fn test_zero_floor_never_consults_table() {
        let currency = CurrencyService::new(CurrencyConfig::default()).unwrap();
        let imp = Imp {
            bidfloorcur: "EUR".to_string(),
            ..Default::default()
        };

        assert_eq!(imp_floor(&currency, &imp).unwrap(), 0.0);
    }

    #[test]
    fn test_partner_adjustment_raises_floor() {
        assert_eq!(effective_floor(0.5, 1.2), 1.2);
        assert_eq!(effective_floor(1.5, 1.2), 1.5);
        assert_eq!(effective_floor(0.0, 0.0), 0.0);
        assert_eq!(effective_floor(-1.0, 0.0), 0.0);
    }
}
