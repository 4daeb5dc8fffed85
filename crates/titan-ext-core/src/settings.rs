//! # Module Settings
//!
//! Options the host shows on its settings page. Defaults live here; stored
//! overrides come from the `module_settings` table as `(key, value)` text
//! pairs.
//!
//! ## Keys
//! ```text
//! ┌──────────────────────────────────────┬──────────┬──────────────────────┐
//! │ key                                  │ default  │ meaning              │
//! ├──────────────────────────────────────┼──────────┼──────────────────────┤
//! │ containers.enabled                   │ true     │ module switch        │
//! │ containers.allow_negative_inventory  │ true     │ give beyond stock    │
//! │ manufacturing.enabled                │ true     │ module switch        │
//! │ loyalty.enabled                      │ true     │ module switch        │
//! │ loyalty.discount_bps                 │ 500      │ special discount 5%  │
//! │ loyalty.cashback_bps                 │ 200      │ yearly cashback 2%   │
//! │ loyalty.min_annual_purchases_cents   │ 0        │ cashback threshold   │
//! └──────────────────────────────────────┴──────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::hooks::{ExtModule, OptionField, OptionSection};
use crate::money::Money;
use crate::types::Rate;
use crate::validation::{validate_cents, validate_rate_bps};

pub const CONTAINERS_ENABLED: &str = "containers.enabled";
pub const ALLOW_NEGATIVE_INVENTORY: &str = "containers.allow_negative_inventory";
pub const MANUFACTURING_ENABLED: &str = "manufacturing.enabled";
pub const LOYALTY_ENABLED: &str = "loyalty.enabled";
pub const DISCOUNT_BPS: &str = "loyalty.discount_bps";
pub const CASHBACK_BPS: &str = "loyalty.cashback_bps";
pub const MIN_ANNUAL_PURCHASES_CENTS: &str = "loyalty.min_annual_purchases_cents";

/// Every key accepted by [`ModuleSettings::set`].
pub const KEYS: [&str; 7] = [
    CONTAINERS_ENABLED,
    ALLOW_NEGATIVE_INVENTORY,
    MANUFACTURING_ENABLED,
    LOYALTY_ENABLED,
    DISCOUNT_BPS,
    CASHBACK_BPS,
    MIN_ANNUAL_PURCHASES_CENTS,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContainerSettings {
    pub enabled: bool,
    pub allow_negative_inventory: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        ContainerSettings {
            enabled: true,
            allow_negative_inventory: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManufacturingSettings {
    pub enabled: bool,
}

impl Default for ManufacturingSettings {
    fn default() -> Self {
        ManufacturingSettings { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltySettings {
    pub enabled: bool,
    pub discount_bps: u32,
    pub cashback_bps: u32,
    pub min_annual_purchases_cents: i64,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            enabled: true,
            discount_bps: 500,
            cashback_bps: 200,
            min_annual_purchases_cents: 0,
        }
    }
}

impl LoyaltySettings {
    pub fn discount_rate(&self) -> Rate {
        Rate::from_bps(self.discount_bps)
    }

    pub fn cashback_rate(&self) -> Rate {
        Rate::from_bps(self.cashback_bps)
    }

    pub fn min_annual_purchases(&self) -> Money {
        Money::from_cents(self.min_annual_purchases_cents)
    }
}

/// Effective settings of all modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModuleSettings {
    pub containers: ContainerSettings,
    pub manufacturing: ManufacturingSettings,
    pub loyalty: LoyaltySettings,
}

impl ModuleSettings {
    /// Defaults overridden by stored pairs. Unknown keys are ignored so an
    /// older binary can read a newer table.
    pub fn from_pairs<I, K, V>(pairs: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = ModuleSettings::default();
        for (key, value) in pairs {
            if KEYS.contains(&key.as_ref()) {
                settings.set(key.as_ref(), value.as_ref())?;
            }
        }
        Ok(settings)
    }

    /// Parses and applies one setting.
    pub fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        let value = value.trim();
        match key {
            CONTAINERS_ENABLED => self.containers.enabled = parse_bool(key, value)?,
            ALLOW_NEGATIVE_INVENTORY => {
                self.containers.allow_negative_inventory = parse_bool(key, value)?
            }
            MANUFACTURING_ENABLED => self.manufacturing.enabled = parse_bool(key, value)?,
            LOYALTY_ENABLED => self.loyalty.enabled = parse_bool(key, value)?,
            DISCOUNT_BPS => self.loyalty.discount_bps = parse_bps(key, value)?,
            CASHBACK_BPS => self.loyalty.cashback_bps = parse_bps(key, value)?,
            MIN_ANNUAL_PURCHASES_CENTS => {
                let cents = parse_i64(key, value)?;
                validate_cents(key, cents)?;
                self.loyalty.min_annual_purchases_cents = cents;
            }
            _ => {
                return Err(ValidationError::NotAllowed {
                    field: "key".to_string(),
                    allowed: KEYS.iter().map(|k| k.to_string()).collect(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Current value of `key` rendered as stored text.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            CONTAINERS_ENABLED => self.containers.enabled.to_string(),
            ALLOW_NEGATIVE_INVENTORY => self.containers.allow_negative_inventory.to_string(),
            MANUFACTURING_ENABLED => self.manufacturing.enabled.to_string(),
            LOYALTY_ENABLED => self.loyalty.enabled.to_string(),
            DISCOUNT_BPS => self.loyalty.discount_bps.to_string(),
            CASHBACK_BPS => self.loyalty.cashback_bps.to_string(),
            MIN_ANNUAL_PURCHASES_CENTS => self.loyalty.min_annual_purchases_cents.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn is_enabled(&self, module: ExtModule) -> bool {
        match module {
            ExtModule::Containers => self.containers.enabled,
            ExtModule::Manufacturing => self.manufacturing.enabled,
            ExtModule::Loyalty => self.loyalty.enabled,
        }
    }

    /// Sections contributed to the host's options page.
    pub fn option_sections(&self) -> Vec<OptionSection> {
        let field = |key: &str, label: &str| OptionField {
            key: key.to_string(),
            label: label.to_string(),
            value: self.get(key).unwrap_or_default(),
        };

        vec![
            OptionSection {
                module: ExtModule::Containers,
                label: "Container deposits".to_string(),
                fields: vec![
                    field(CONTAINERS_ENABLED, "Enable container deposits"),
                    field(
                        ALLOW_NEGATIVE_INVENTORY,
                        "Allow giving containers beyond inventory",
                    ),
                ],
            },
            OptionSection {
                module: ExtModule::Manufacturing,
                label: "Manufacturing".to_string(),
                fields: vec![field(MANUFACTURING_ENABLED, "Enable manufacturing")],
            },
            OptionSection {
                module: ExtModule::Loyalty,
                label: "Special customers".to_string(),
                fields: vec![
                    field(LOYALTY_ENABLED, "Enable special customers"),
                    field(DISCOUNT_BPS, "Discount (basis points)"),
                    field(CASHBACK_BPS, "Yearly cashback (basis points)"),
                    field(
                        MIN_ANNUAL_PURCHASES_CENTS,
                        "Minimum yearly purchases for cashback (cents)",
                    ),
                ],
            },
        ]
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::InvalidFormat {
            field: key.to_string(),
            reason: "must be true or false".to_string(),
        }),
    }
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ValidationError> {
    value.parse::<i64>().map_err(|_| ValidationError::InvalidFormat {
        field: key.to_string(),
        reason: "must be an integer".to_string(),
    })
}

fn parse_bps(key: &str, value: &str) -> Result<u32, ValidationError> {
    let bps = parse_i64(key, value)?;
    validate_rate_bps(key, bps)?;
    Ok(bps as u32)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ModuleSettings::default();
        assert_eq!(settings.loyalty.discount_rate().bps(), 500);
        assert_eq!(settings.loyalty.cashback_rate().bps(), 200);
        assert!(settings.loyalty.min_annual_purchases().is_zero());
        assert!(settings.containers.allow_negative_inventory);
    }

    #[test]
    fn test_from_pairs_overrides() {
        let settings = ModuleSettings::from_pairs([
            (CASHBACK_BPS, "300"),
            (ALLOW_NEGATIVE_INVENTORY, "false"),
            ("legacy.unknown", "x"),
        ])
        .unwrap();

        assert_eq!(settings.loyalty.cashback_bps, 300);
        assert!(!settings.containers.allow_negative_inventory);
        assert_eq!(settings.loyalty.discount_bps, 500);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut settings = ModuleSettings::default();
        assert!(settings.set(DISCOUNT_BPS, "10001").is_err());
        assert!(settings.set(DISCOUNT_BPS, "abc").is_err());
        assert!(settings.set(MIN_ANNUAL_PURCHASES_CENTS, "-5").is_err());
        assert!(settings.set(LOYALTY_ENABLED, "maybe").is_err());
        assert!(settings.set("nope", "1").is_err());
    }

    #[test]
    fn test_module_switches() {
        let mut settings = ModuleSettings::default();
        settings.set(MANUFACTURING_ENABLED, "off").unwrap();
        assert!(!settings.is_enabled(ExtModule::Manufacturing));
        assert!(settings.is_enabled(ExtModule::Loyalty));
    }

    #[test]
    fn test_option_sections_carry_current_values() {
        let mut settings = ModuleSettings::default();
        settings.set(DISCOUNT_BPS, "750").unwrap();

        let sections = settings.option_sections();
        assert_eq!(sections.len(), 3);

        let loyalty = sections
            .iter()
            .find(|s| s.module == ExtModule::Loyalty)
            .unwrap();
        let discount = loyalty.fields.iter().find(|f| f.key == DISCOUNT_BPS).unwrap();
        assert_eq!(discount.value, "750");
    }
}
